// Flat 16-bit DFA table packing with sub-array deduplication, mirroring
// the layout spec.md 4.6 describes for the parse tables (linear scan for
// an existing occurrence, append otherwise).

use crate::dfa::Dfa;
use crate::nfa::TermId;

pub const END_SENTINEL: u16 = 0xFFFF;

#[derive(Debug, Default, Clone)]
pub struct LexTables {
    /// Per-state transition data offset into `transitions`.
    pub state_offsets: Vec<u16>,
    /// Concatenated `(lo, hi, target)` triples per state, `END_SENTINEL`-terminated.
    pub transitions: Vec<u16>,
    /// Per-state accepting term list offset into `accepts`.
    pub accept_offsets: Vec<u16>,
    /// Concatenated accepted term ids per state, `END_SENTINEL`-terminated.
    pub accepts: Vec<u16>,
    pub start: u16,
}

fn find_or_append(buffer: &mut Vec<u16>, run: &[u16]) -> u16 {
    if let Some(pos) = buffer
        .windows(run.len().max(1))
        .position(|window| window == run)
    {
        return pos as u16;
    }
    let offset = buffer.len() as u16;
    buffer.extend_from_slice(run);
    offset
}

pub fn pack(dfa: &Dfa) -> LexTables {
    let mut tables = LexTables::default();
    tables.start = dfa.start as u16;

    for state in dfa.states.iter() {
        let mut run: Vec<u16> = Vec::new();
        for (set, target) in state.edges.iter() {
            for &(lo, hi) in set.ranges() {
                run.push(lo as u16);
                run.push(hi as u16);
                run.push(*target as u16);
            }
        }
        run.push(END_SENTINEL);
        let offset = find_or_append(&mut tables.transitions, &run);
        tables.state_offsets.push(offset);

        let mut accept_run: Vec<u16> = state
            .accepting
            .iter()
            .map(|(term, _)| *term as u16)
            .collect();
        accept_run.push(END_SENTINEL);
        let accept_offset = find_or_append(&mut tables.accepts, &accept_run);
        tables.accept_offsets.push(accept_offset);
    }
    tables
}

/// Walk a packed DFA over `text`, returning the longest accepted term and
/// the length (in `char`s) it matched, if any. This exists only so tests
/// can exercise the packed tables end-to-end; it is not the runtime.
pub fn longest_match(tables: &LexTables, text: &str) -> Option<(TermId, usize)> {
    let mut state = tables.start;
    let mut best: Option<(TermId, usize)> = None;
    let mut consumed = 0usize;
    let chars: Vec<char> = text.chars().collect();
    loop {
        if let Some(term) = first_accept(tables, state) {
            best = Some((term, consumed));
        }
        if consumed >= chars.len() {
            break;
        }
        let ch = chars[consumed] as u16;
        let Some(next) = step(tables, state, ch) else {
            break;
        };
        state = next;
        consumed += 1;
    }
    best
}

fn first_accept(tables: &LexTables, state: u16) -> Option<TermId> {
    let offset = tables.accept_offsets[state as usize] as usize;
    let value = tables.accepts[offset];
    if value == END_SENTINEL {
        None
    } else {
        Some(value as TermId)
    }
}

fn step(tables: &LexTables, state: u16, ch: u16) -> Option<u16> {
    let mut offset = tables.state_offsets[state as usize] as usize;
    loop {
        let lo = tables.transitions[offset];
        if lo == END_SENTINEL {
            return None;
        }
        let hi = tables.transitions[offset + 1];
        let target = tables.transitions[offset + 2];
        if ch >= lo && ch <= hi {
            return Some(target);
        }
        offset += 3;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::ASCII_LETTER;
    use crate::nfa::{build as build_nfa, TokenExpr, TokenRule};

    #[test]
    fn packs_and_matches_longest() {
        let rules = vec![TokenRule {
            name: "kw_or_id".to_string(),
            body: TokenExpr::Choice(vec![
                TokenExpr::Literal("if".to_string()),
                TokenExpr::Plus(Box::new(TokenExpr::CharSet(ASCII_LETTER.clone()))),
            ]),
        }];
        let nfa = build_nfa(&rules, &[(7, "kw_or_id".to_string(), 1)]).unwrap();
        let mut dfa = crate::dfa::build(&nfa);
        let mut graph = crate::conflicts::PrecedenceGraph::new();
        graph.declare(7);
        let priority = graph.topological_priority().unwrap();
        crate::dfa::annotate_accepting(&mut dfa, &nfa, &priority);
        let tables = pack(&dfa);
        assert_eq!(longest_match(&tables, "iffy"), Some((7, 4)));
        assert_eq!(longest_match(&tables, "if"), Some((7, 2)));
    }
}
