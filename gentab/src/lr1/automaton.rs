// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>
//
// Canonical LR(1) automaton construction (spec.md 4.2), grounded on the
// teacher's `Specification::closure` (`grammar.rs`) and `ParserState`
// (`state.rs`), generalized from the teacher's fixed `AATerminal`/
// `AANonTerminal` enums to our general `Term`/`Rule` model.

use std::collections::BTreeMap;
use std::fmt;

use crate::rule::{first_of_tail_with_lookahead, GrammarItemKey, GrammarItemSet, Rule};
use crate::symbol::term::Term;
use crate::symbol::Associativity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Shift(usize),
    Reduce(Rule),
}

#[derive(Debug)]
pub struct State {
    pub id: usize,
    pub items: GrammarItemSet,
    pub actions: BTreeMap<Term, (Action, Option<crate::rule::Precedence>)>,
    pub goto: BTreeMap<Term, usize>,
    pub recover: Option<usize>,
    pub ambiguous: bool,
}

impl State {
    /// Per-terminal refinement of the spec's per-state `ambiguous` flag
    /// (DESIGN.md Open Question 2): the specific terminals on which this
    /// state actually saw more than one candidate action.
    pub fn ambiguous_terminals(&self, witnesses: &[Term]) -> Vec<Term> {
        witnesses.iter().filter(|t| self.actions.contains_key(t)).cloned().collect()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ShiftReduceConflict(GrammarItemKey, Term),
    ReduceReduceConflict(GrammarItemKey, GrammarItemKey, Term),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ShiftReduceConflict(item, term) => write!(
                f,
                "shift/reduce conflict on \"{}\" at item \"{}\"",
                term.name(),
                item
            ),
            Error::ReduceReduceConflict(a, b, term) => write!(
                f,
                "reduce/reduce conflict on \"{}\" between \"{}\" and \"{}\"",
                term.name(),
                a,
                b
            ),
        }
    }
}

pub struct Automaton {
    pub states: Vec<State>,
}

/// FIRST-set-driven closure (spec.md 4.2 "Closure").
fn closure(rules: &[Rule], mut set: GrammarItemSet) -> GrammarItemSet {
    let mut changed = true;
    while changed {
        changed = false;
        for (item_key, lookahead_set) in set.closable_set() {
            if let Some(symbol) = item_key.next_term() {
                if symbol.is_non_terminal() {
                    for lookahead in lookahead_set.iter() {
                        let firsts = first_of_tail_with_lookahead(item_key.rhs_tail(), lookahead);
                        for rule in rules.iter().filter(|r| r.lhs() == symbol) {
                            let key = GrammarItemKey::from(rule);
                            if let Some(existing) = set.get_mut(&key) {
                                let len = existing.len();
                                *existing |= &firsts;
                                if existing.len() > len {
                                    changed = true;
                                }
                            } else {
                                set.insert(key, firsts.clone());
                                changed = true;
                            }
                        }
                    }
                }
            }
        }
    }
    set
}

fn goto(rules: &[Rule], items: &GrammarItemSet, term: &Term) -> GrammarItemSet {
    closure(rules, items.generate_goto_kernel(term))
}

/// Resolve a precedence-based conflict the way spec.md 4.2 "Conflict
/// resolution" specifies. Returns `Ok(true)` if the new action should
/// replace the old one, `Ok(false)` if the old action should be kept, or
/// `Err` if no precedence group matched (a genuine, unresolved conflict).
pub(crate) fn resolve_by_precedence(
    old: &Option<crate::rule::Precedence>,
    new: &Option<crate::rule::Precedence>,
    new_is_shift: bool,
) -> Result<bool, ()> {
    let (old_p, new_p) = match (old, new) {
        (Some(o), Some(n)) if o.group == n.group => (o, n),
        _ => return Err(()),
    };
    if new_p.is_silenced() {
        return Ok(false);
    }
    let delta = old_p.level - new_p.level;
    if delta > 0 {
        Ok(false)
    } else if delta < 0 {
        Ok(true)
    } else {
        match new_p.associativity {
            Associativity::Left => Ok(!new_is_shift),
            Associativity::Right => Ok(new_is_shift),
            Associativity::NonAssoc => Err(()),
        }
    }
}

/// Add `action` (triggered by `term`, with `precedence` from the
/// originating item/rule) to a state, resolving any conflict with an
/// already-present action for the same terminal.
pub fn try_add_action(
    state: &mut State,
    term: &Term,
    action: Action,
    precedence: Option<crate::rule::Precedence>,
    reduce_item_for_errors: Option<&GrammarItemKey>,
) -> Result<(), Error> {
    if let Some((existing, existing_prec)) = state.actions.get(term).cloned() {
        if existing == action {
            return Ok(());
        }
        state.ambiguous = true;
        let new_is_shift = matches!(action, Action::Shift(_));
        match resolve_by_precedence(&existing_prec, &precedence, new_is_shift) {
            Ok(true) => {
                state.actions.insert(term.clone(), (action, precedence));
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(()) => {
                let err = match (&existing, reduce_item_for_errors) {
                    (Action::Reduce(rule), Some(new_item)) if !new_is_shift => Error::ReduceReduceConflict(
                        GrammarItemKey::from(rule),
                        new_item.clone(),
                        term.clone(),
                    ),
                    _ => Error::ShiftReduceConflict(
                        reduce_item_for_errors.cloned().unwrap_or_else(|| {
                            GrammarItemKey::from(match &existing {
                                Action::Reduce(rule) => rule,
                                Action::Shift(_) => unreachable!(),
                            })
                        }),
                        term.clone(),
                    ),
                };
                Err(err)
            }
        }
    } else {
        state.actions.insert(term.clone(), (action, precedence));
        Ok(())
    }
}

/// BFS exploration from the start kernel `{[top -> . alpha, eof]}`
/// (spec.md 4.2 "State exploration").
pub fn build(rules: &[Rule], top: &Term, eof: &Term) -> Result<Automaton, Error> {
    let start_rule = rules
        .iter()
        .find(|r| r.lhs() == top)
        .expect("top rule must exist");
    let mut kernel = GrammarItemSet::default();
    kernel.insert(
        GrammarItemKey::from(start_rule),
        [eof.clone()].into_iter().collect(),
    );
    let start_items = closure(rules, kernel);

    let mut states: Vec<State> = vec![State {
        id: 0,
        items: start_items,
        actions: BTreeMap::new(),
        goto: BTreeMap::new(),
        recover: None,
        ambiguous: false,
    }];
    let mut worklist = vec![0usize];

    while let Some(id) = worklist.pop() {
        let terms: Vec<Term> = states[id]
            .items
            .iter()
            .filter_map(|(k, _)| k.next_term().cloned())
            .collect();
        let mut seen_terms: Vec<Term> = Vec::new();
        for term in terms {
            if seen_terms.contains(&term) {
                continue;
            }
            seen_terms.push(term.clone());
            let goto_items = goto(rules, &states[id].items, &term);
            if goto_items.core().is_empty() {
                continue;
            }
            let existing = states.iter().position(|s| s.items == goto_items);
            let target = match existing {
                // Canonical LR(1) distinguishes states by full item-set
                // equality (lookaheads included), so a match here already
                // has identical lookaheads; nothing to union.
                Some(target) => target,
                None => {
                    let new_id = states.len();
                    states.push(State {
                        id: new_id,
                        items: goto_items,
                        actions: BTreeMap::new(),
                        goto: BTreeMap::new(),
                        recover: None,
                        ambiguous: false,
                    });
                    worklist.push(new_id);
                    new_id
                }
            };
            if term.is_terminal() {
                let precedence = states[id]
                    .items
                    .iter()
                    .find(|(k, _)| k.next_term_is(&term))
                    .and_then(|(k, _)| k.shift_precedence());
                try_add_action(&mut states[id], &term, Action::Shift(target), precedence, None)?;
            } else {
                states[id].goto.insert(term.clone(), target);
            }
        }

        // Reduce actions: for each reducible item, one Reduce(a, rule)
        // per lookahead `a` (spec.md 4.2 "Action assignment").
        let reducibles: Vec<(GrammarItemKey, crate::symbol::term::TermSet)> = states[id]
            .items
            .iter()
            .filter(|(k, _)| k.is_reducible())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (item_key, lookahead_set) in reducibles {
            let rule = item_key.rule().clone();
            let precedence = rule.aggregate_precedence();
            for lookahead in lookahead_set.iter() {
                try_add_action(
                    &mut states[id],
                    lookahead,
                    Action::Reduce(rule.clone()),
                    precedence.clone(),
                    Some(&item_key),
                )?;
            }
        }
    }

    Ok(Automaton { states })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Conflict;
    use crate::symbol::SymbolTable;
    use lexable::Location;

    #[test]
    fn builds_automaton_for_trivial_grammar() {
        let loc = Location::new("g", 1, 1);
        let mut symbols = SymbolTable::new();
        let top = symbols.top();
        let eof = symbols.eof();
        let num = symbols.new_literal_terminal("num", "num", &loc).unwrap();
        let top_rule = Rule::with_conflicts(
            0,
            top.clone(),
            vec![num, eof.clone()],
            vec![Conflict::empty(), Conflict::empty(), Conflict::empty()],
            None,
        );
        let automaton = build(&[top_rule], &top, &eof).unwrap();
        assert!(automaton.states.len() >= 2);
        assert!(!automaton.states[0].ambiguous);
    }
}
