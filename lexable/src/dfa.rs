// Subset construction (NFA -> DFA) — spec.md 4.4 "Determinization".

use crate::charset::CharSet;
use crate::nfa::{epsilon_closure, Nfa, TermId};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct DfaState {
    pub nfa_states: BTreeSet<usize>,
    pub edges: Vec<(CharSet, usize)>,
    /// Accepted terms, ordered by descending token precedence (spec.md
    /// 4.4: "accepting list ordered by token precedence").
    pub accepting: Vec<(TermId, i32)>,
}

#[derive(Debug, Default, Clone)]
pub struct Dfa {
    pub states: Vec<DfaState>,
    pub start: usize,
}

/// Partition `[0, MAX_CHAR]` into the maximal set of disjoint ranges over
/// which every edge in `edges` is constant, i.e. the coarsest common
/// refinement of all edge character sets. This is what lets a DFA state
/// have deterministic, non-overlapping outgoing edges.
fn split_points(edges: &[(CharSet, usize)]) -> Vec<u32> {
    let mut points = BTreeSet::new();
    for (set, _) in edges {
        for &(lo, hi) in set.ranges() {
            points.insert(lo);
            if hi < crate::charset::MAX_CHAR {
                points.insert(hi + 1);
            }
        }
    }
    points.into_iter().collect()
}

pub fn build(nfa: &Nfa) -> Dfa {
    let start_set = epsilon_closure(&nfa.states, &[nfa.start]);
    let mut states: Vec<DfaState> = Vec::new();
    let mut index_of: BTreeMap<BTreeSet<usize>, usize> = BTreeMap::new();
    let start_index = intern(&mut states, &mut index_of, start_set);
    let mut worklist = vec![start_index];

    while let Some(current) = worklist.pop() {
        let nfa_states: Vec<usize> = states[current].nfa_states.iter().cloned().collect();
        let mut all_edges: Vec<(CharSet, usize)> = Vec::new();
        for &s in nfa_states.iter() {
            for (set, target) in nfa.states[s].edges.iter() {
                all_edges.push((set.clone(), *target));
            }
        }
        let points = split_points(&all_edges);
        for window in points.windows(2) {
            let (lo, next) = (window[0], window[1]);
            let hi = next - 1;
            let probe = CharSet::empty().add_range(
                char::from_u32(lo).unwrap_or('\0'),
                char::from_u32(hi).unwrap_or('\0'),
            );
            let mut target_nfa_states = BTreeSet::new();
            for (set, target) in all_edges.iter() {
                if set.does_intersect(&probe) {
                    target_nfa_states.insert(*target);
                }
            }
            if target_nfa_states.is_empty() {
                continue;
            }
            let closure = epsilon_closure(&nfa.states, &target_nfa_states.into_iter().collect::<Vec<_>>());
            let target_index = intern(&mut states, &mut index_of, closure);
            if states[target_index].edges.is_empty() && !worklist.contains(&target_index) {
                worklist.push(target_index);
            }
            states[current].edges.push((probe, target_index));
        }
        // handle the half-open tail beyond the last split point
        if let Some(&last) = points.last() {
            handle_tail(nfa, &mut states, &mut index_of, &mut worklist, current, last, &all_edges);
        }
    }
    Dfa {
        states,
        start: start_index,
    }
}

fn handle_tail(
    nfa: &Nfa,
    states: &mut Vec<DfaState>,
    index_of: &mut BTreeMap<BTreeSet<usize>, usize>,
    worklist: &mut Vec<usize>,
    current: usize,
    from: u32,
    all_edges: &[(CharSet, usize)],
) {
    let probe = CharSet::empty().add_range(
        char::from_u32(from).unwrap_or('\0'),
        char::from_u32(crate::charset::MAX_CHAR).unwrap_or('\u{10FFFF}'),
    );
    let mut target_nfa_states = BTreeSet::new();
    for (set, target) in all_edges.iter() {
        if set.does_intersect(&probe) {
            target_nfa_states.insert(*target);
        }
    }
    if target_nfa_states.is_empty() {
        return;
    }
    let closure = epsilon_closure(&nfa.states, &target_nfa_states.into_iter().collect::<Vec<_>>());
    let target_index = intern(states, index_of, closure);
    if !worklist.contains(&target_index) {
        worklist.push(target_index);
    }
    states[current].edges.push((probe, target_index));
}

fn intern(
    states: &mut Vec<DfaState>,
    index_of: &mut BTreeMap<BTreeSet<usize>, usize>,
    nfa_states: BTreeSet<usize>,
) -> usize {
    if let Some(&index) = index_of.get(&nfa_states) {
        return index;
    }
    let index = states.len();
    index_of.insert(nfa_states.clone(), index);
    states.push(DfaState {
        nfa_states,
        edges: Vec::new(),
        accepting: Vec::new(),
    });
    index
}

/// Fill in each DFA state's `accepting` list from its member NFA states,
/// ordered by descending precedence (spec.md 4.4). Separate from `build`
/// because accepting order depends on the token priority DAG's topo sort
/// (`conflicts::priority_order`), computed after all DFAs are built.
pub fn annotate_accepting(dfa: &mut Dfa, nfa: &Nfa, priority: &BTreeMap<TermId, usize>) {
    for state in dfa.states.iter_mut() {
        let mut accepted: Vec<(TermId, i32)> = Vec::new();
        for &s in state.nfa_states.iter() {
            if let Some(acc) = nfa.states[s].accept {
                accepted.push(acc);
            }
        }
        accepted.sort_by_key(|(term, _)| priority.get(term).cloned().unwrap_or(usize::MAX));
        state.accepting = accepted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::{build as build_nfa, TokenExpr, TokenRule};

    #[test]
    fn determinizes_simple_alternation() {
        let rules = vec![TokenRule {
            name: "kw_or_id".to_string(),
            body: TokenExpr::Choice(vec![
                TokenExpr::Literal("if".to_string()),
                TokenExpr::Plus(Box::new(TokenExpr::CharSet(
                    crate::builtins::ASCII_LETTER.clone(),
                ))),
            ]),
        }];
        let nfa = build_nfa(&rules, &[(0, "kw_or_id".to_string(), 0)]).unwrap();
        let dfa = build(&nfa);
        assert!(!dfa.states.is_empty());
        assert!(dfa.states[dfa.start].edges.len() >= 1);
    }
}
