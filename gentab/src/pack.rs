// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>
//
// Flat 16-bit action/goto table packer (spec.md 4.6). Shares the
// sub-array-dedup shape of `lexable::pack` but over LALR states instead
// of DFA states.

use std::collections::BTreeMap;

use crate::lalr::CollapsedState;
use crate::lr1::automaton::Action;
use crate::rule::Rule;
use crate::symbol::term::Term;

pub const END_SENTINEL: u16 = 0xFFFF;
pub const REDUCE_FLAG: u16 = 0x8000;
pub const REPEAT_FLAG: u16 = 0x4000;
pub const STAY_FLAG: u16 = 0x2000;
pub const REDUCE_DEPTH_SHIFT: u16 = 8;

pub const FLAG_HAS_RECOVER: u16 = 1 << 0;
pub const FLAG_HAS_DEFAULT_REDUCE: u16 = 1 << 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    pub flags: u16,
    pub action_offset: u16,
    pub recover_offset: u16,
    pub skip_offset: u16,
    pub tokenizer_mask: u16,
    pub default_reduce: u16,
    pub forced_reduce: u16,
}

#[derive(Debug, Default, Clone)]
pub struct Tables {
    pub states: Vec<StateRecord>,
    pub action_data: Vec<u16>,
    pub goto_data: Vec<u16>,
    pub goto_offset_by_term: BTreeMap<u32, u16>,
    /// `(state id, skip term)` pairs for states whose active `@skip` rule
    /// self-recurses (spec.md 4.5 "Skip interaction": "genuinely stateful
    /// skips inject their states into the table") — that injection isn't
    /// implemented, so the caller is left to turn this into a diagnostic
    /// rather than have it silently vanish.
    pub stateful_skips: Vec<(usize, Term)>,
}

/// The skip term active for a state: the `skip` field every item in its
/// core shares, since a state is only ever reached while parsing under
/// one skip scope.
fn state_skip(state: &CollapsedState) -> Option<Term> {
    state.core.iter().find_map(|item| item.rule().skip().cloned())
}

/// A "skip once, then revert" skip rule does not refer to itself; one
/// that does (e.g. a nested-comment skip tracking depth) is "genuinely
/// stateful" per spec.md 4.5 and needs its own injected tokenizer states
/// instead of a `StayFlag` action (spec.md 4.5 "Skip interaction").
fn skip_is_stateful(skip: &Term, rules: &[Rule]) -> bool {
    rules
        .iter()
        .filter(|r| r.lhs() == skip)
        .any(|r| r.parts().iter().any(|t| t == skip))
}

fn find_or_append(data: &mut Vec<u16>, triple: &[u16]) -> u16 {
    if let Some(pos) = data
        .windows(triple.len())
        .position(|window| window == triple)
    {
        return pos as u16;
    }
    let offset = data.len() as u16;
    data.extend_from_slice(triple);
    offset
}

fn rule_lhs_id(rule: &Rule, term_ids: &BTreeMap<Term, u32>) -> u32 {
    *term_ids
        .get(rule.lhs())
        .expect("every rule lhs must have a term id")
}

/// A state has a default reduce iff every lookahead in it maps to the
/// same single reduce action (spec.md 4.6).
fn default_reduce(state: &CollapsedState) -> Option<Rule> {
    let mut rules = state.actions.values().filter_map(|(action, _)| match action {
        Action::Reduce(rule) => Some(rule.clone()),
        Action::Shift(_) => None,
    });
    let first = rules.next()?;
    if state.actions.values().all(|(action, _)| match action {
        Action::Reduce(r) => r.ident() == first.ident(),
        Action::Shift(_) => false,
    }) {
        Some(first)
    } else {
        None
    }
}

/// The item (of any kind, not only already-reduced ones) with the
/// smallest remaining suffix — closest to the dot reaching the end of
/// its rule — ties broken by the longest rule (spec.md 4.6
/// "forced-reduce"). Only a reducible winner can actually seed a forced
/// reduction, so shift-only ties yield `None`.
fn forced_reduce(state: &CollapsedState) -> Option<Rule> {
    let winner = state
        .core
        .iter()
        .min_by_key(|item| (item.rule().len() - item.dot(), std::cmp::Reverse(item.rule().len())))?;
    if winner.is_reducible() {
        Some(winner.rule().clone())
    } else {
        None
    }
}

fn encode_action(
    action: &Action,
    term_ids: &BTreeMap<Term, u32>,
    repeat_flag: u16,
    stay_flag: u16,
) -> (u16, u16, u16) {
    match action {
        Action::Shift(target) => (0, *target as u16, 0),
        Action::Reduce(rule) => {
            let lhs_id = rule_lhs_id(rule, term_ids);
            let depth = rule.len() as u16;
            let packed = lhs_id as u32
                | (REDUCE_FLAG as u32)
                | (repeat_flag as u32)
                | (stay_flag as u32)
                | ((depth as u32) << REDUCE_DEPTH_SHIFT);
            (0, (packed & 0xffff) as u16, (packed >> 16) as u16)
        }
    }
}

/// Build action data for one state: `(term, lo16, hi16)` triples
/// terminated by `End`, with sub-array dedup. A trailing entry for the
/// state's active simple skip rule (if any) is appended with `StayFlag`
/// set (spec.md 4.5 "Skip interaction"); the return's second element
/// reports whether the state's skip was instead "genuinely stateful" and
/// so left unrepresented here.
fn pack_actions(
    state: &CollapsedState,
    term_ids: &BTreeMap<Term, u32>,
    rules: &[Rule],
    action_data: &mut Vec<u16>,
) -> (u16, Option<Term>) {
    let mut triple = Vec::with_capacity(state.actions.len() * 3 + 4);
    for (term, (action, _)) in state.actions.iter() {
        let term_id = *term_ids.get(term).expect("term id");
        // RepeatFlag marks a reduce of a rule minted by `E*`/`E+`
        // expansion, so the runtime can flatten it into its enclosing
        // list rather than emit a nested node (spec.md 4.6).
        let repeat_flag = match action {
            Action::Reduce(rule) if rule.lhs().flags() & crate::symbol::term::REPEATED != 0 => {
                REPEAT_FLAG
            }
            _ => 0,
        };
        let (_, lo, hi) = encode_action(action, term_ids, repeat_flag, 0);
        triple.push(term_id as u16);
        triple.push(lo);
        triple.push(hi);
    }

    let mut stateful = None;
    if let Some(skip) = state_skip(state) {
        if let Some(&skip_id) = term_ids.get(&skip) {
            if skip_is_stateful(&skip, rules) {
                stateful = Some(skip);
            } else {
                let depth = rules
                    .iter()
                    .find(|r| r.lhs() == &skip)
                    .map(|r| r.len())
                    .unwrap_or(0) as u16;
                let packed = (skip_id as u32)
                    | (REDUCE_FLAG as u32)
                    | (STAY_FLAG as u32)
                    | ((depth as u32) << REDUCE_DEPTH_SHIFT);
                triple.push(skip_id as u16);
                triple.push((packed & 0xffff) as u16);
                triple.push((packed >> 16) as u16);
            }
        }
    }

    triple.push(END_SENTINEL);
    (find_or_append(action_data, &triple), stateful)
}

/// Build goto data for all states: indexed by term id, each a
/// `(count<<1 | lastBit, targetStateId, sourceStateIds...)` record
/// (spec.md 4.6).
fn pack_goto(
    states: &[CollapsedState],
    term_ids: &BTreeMap<Term, u32>,
) -> (Vec<u16>, BTreeMap<u32, u16>) {
    let mut by_term: BTreeMap<u32, Vec<(u16, Vec<u16>)>> = BTreeMap::new();
    for state in states {
        for (term, &target) in state.goto.iter() {
            let term_id = *term_ids.get(term).expect("term id");
            let entry = by_term.entry(term_id).or_default();
            if let Some(existing) = entry.iter_mut().find(|(t, _)| *t as usize == target) {
                existing.1.push(state.id as u16);
            } else {
                entry.push((target as u16, vec![state.id as u16]));
            }
        }
    }

    let mut data = Vec::new();
    let mut offsets = BTreeMap::new();
    for (term_id, records) in by_term {
        let offset = data.len() as u16;
        offsets.insert(term_id, offset);
        let last_index = records.len().saturating_sub(1);
        for (index, (target, sources)) in records.into_iter().enumerate() {
            let last_bit = if index == last_index { 1 } else { 0 };
            let count = sources.len() as u16;
            data.push((count << 1) | last_bit);
            data.push(target);
            data.extend(sources);
        }
    }
    (data, offsets)
}

pub fn pack(states: &[CollapsedState], rules: &[Rule], term_ids: &BTreeMap<Term, u32>) -> Tables {
    let mut action_data = Vec::new();
    let mut records = Vec::with_capacity(states.len());
    let mut stateful_skips = Vec::new();
    for state in states {
        let (action_offset, stateful) = pack_actions(state, term_ids, rules, &mut action_data);
        if let Some(skip) = stateful {
            stateful_skips.push((state.id, skip));
        }
        let mut flags = 0u16;
        let default = default_reduce(state);
        if default.is_some() {
            flags |= FLAG_HAS_DEFAULT_REDUCE;
        }
        let default_reduce_id = default
            .as_ref()
            .map(|r| rule_lhs_id(r, term_ids) as u16)
            .unwrap_or(END_SENTINEL);
        let forced_reduce_id = forced_reduce(state)
            .map(|r| rule_lhs_id(&r, term_ids) as u16)
            .unwrap_or(END_SENTINEL);
        records.push(StateRecord {
            flags,
            action_offset,
            recover_offset: END_SENTINEL,
            skip_offset: END_SENTINEL,
            tokenizer_mask: 0,
            default_reduce: default_reduce_id,
            forced_reduce: forced_reduce_id,
        });
    }
    let (goto_data, goto_offset_by_term) = pack_goto(states, term_ids);
    Tables {
        states: records,
        action_data,
        goto_data,
        goto_offset_by_term,
        stateful_skips,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lalr::collapse;
    use crate::rule::Conflict;
    use crate::symbol::SymbolTable;
    use lexable::Location;

    #[test]
    fn packs_trivial_automaton() {
        let loc = Location::new("g", 1, 1);
        let mut symbols = SymbolTable::new();
        let top = symbols.top();
        let eof = symbols.eof();
        let num = symbols.new_literal_terminal("num", "num", &loc).unwrap();
        let top_rule = Rule::with_conflicts(
            0,
            top.clone(),
            vec![num.clone(), eof.clone()],
            vec![Conflict::empty(), Conflict::empty(), Conflict::empty()],
            None,
        );
        let rules = vec![top_rule];
        let automaton = crate::lr1::automaton::build(&rules, &top, &eof).unwrap();
        let collapsed = collapse(&automaton);
        let mut term_ids = BTreeMap::new();
        for (index, term) in [top.clone(), eof.clone(), num.clone()].into_iter().enumerate() {
            term_ids.insert(term, index as u32);
        }
        let tables = pack(&collapsed, &rules, &term_ids);
        assert_eq!(tables.states.len(), collapsed.len());
        assert!(tables.action_data.contains(&END_SENTINEL));
    }
}
