// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>
//
// Rule/Conflict/Precedence and the LR item types built on top of them
// (spec.md 3 "Rule"/"Precedence"/"LR Item"). Grounded on the teacher's
// `production.rs` (`Production`/`ProductionTail`/`GrammarItemKey`/
// `GrammarItemSet`), generalized: the teacher's tail held a single
// associativity/precedence pair per production; here every inter-term
// position carries its own `Conflict` record as spec.md 3 requires.

use std::cmp::Ordering;
use std::collections::{btree_map, BTreeMap, BTreeSet};
use std::ops::Index;
use std::rc::Rc;

use crate::symbol::term::{Term, TermSet};
use crate::symbol::Associativity;

/// `(group, level, associativity)`. `level < 0` marks an intentional,
/// silenced conflict (spec.md 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precedence {
    pub group: String,
    pub level: i32,
    pub associativity: Associativity,
}

impl Precedence {
    pub fn new(group: &str, level: i32, associativity: Associativity) -> Self {
        Self {
            group: group.to_string(),
            level,
            associativity,
        }
    }

    pub fn is_silenced(&self) -> bool {
        self.level < 0
    }
}

/// One entry of a rule's `conflicts` list (length `len(parts) + 1`): the
/// precedence declared at this inter-term position, any ambiguity-group
/// tags, and whether a `~cut` marker was present.
#[derive(Debug, Clone, Default)]
pub struct Conflict {
    pub precedence: Option<Precedence>,
    pub ambiguity_groups: Vec<String>,
    pub cut: bool,
}

impl Conflict {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_precedence(precedence: Precedence) -> Self {
        Self {
            precedence: Some(precedence),
            ambiguity_groups: Vec::new(),
            cut: false,
        }
    }
}

#[derive(Debug)]
struct RuleData {
    ident: u32,
    lhs: Term,
    parts: Vec<Term>,
    conflicts: Vec<Conflict>,
    skip: Option<Term>,
}

/// A grammar production: cheap-to-clone `Rc` handle, ordered/compared by
/// `ident` (mirrors the teacher's `Production`).
#[derive(Debug, Clone)]
pub struct Rule(Rc<RuleData>);

impl Rule {
    pub fn new(ident: u32, lhs: Term, parts: Vec<Term>, skip: Option<Term>) -> Self {
        let mut conflicts = Vec::with_capacity(parts.len() + 1);
        conflicts.resize_with(parts.len() + 1, Conflict::empty);
        Self(Rc::new(RuleData {
            ident,
            lhs,
            parts,
            conflicts,
            skip,
        }))
    }

    pub fn with_conflicts(
        ident: u32,
        lhs: Term,
        parts: Vec<Term>,
        conflicts: Vec<Conflict>,
        skip: Option<Term>,
    ) -> Self {
        debug_assert_eq!(conflicts.len(), parts.len() + 1);
        Self(Rc::new(RuleData {
            ident,
            lhs,
            parts,
            conflicts,
            skip,
        }))
    }

    pub fn ident(&self) -> u32 {
        self.0.ident
    }

    pub fn lhs(&self) -> &Term {
        &self.0.lhs
    }

    pub fn parts(&self) -> &[Term] {
        &self.0.parts
    }

    pub fn len(&self) -> usize {
        self.0.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn skip(&self) -> Option<&Term> {
        self.0.skip.as_ref()
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.0.conflicts
    }

    pub fn conflict_at(&self, pos: usize) -> &Conflict {
        &self.0.conflicts[pos]
    }

    /// Rule-level precedence used for reduce actions: the union of all
    /// per-position precedences, taking the highest (group, level) found
    /// (spec.md 4.2 "Action assignment": "the rule's aggregate precedence
    /// (union of all per-position precedences)").
    pub fn aggregate_precedence(&self) -> Option<Precedence> {
        self.0
            .conflicts
            .iter()
            .filter_map(|c| c.precedence.clone())
            .max_by_key(|p| p.level)
    }

    /// Equality used by `normalize::merge`: same lhs-independent shape,
    /// right-hand-side terms only — conflict-list length/content is
    /// deliberately excluded (see DESIGN.md Open Question 1).
    pub fn rhs_equal(&self, other: &Rule) -> bool {
        self.0.parts == other.0.parts
    }

    pub fn has_error_recovery_tail(&self) -> bool {
        self.0
            .parts
            .last()
            .map(|t| t.is_error())
            .unwrap_or(false)
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.0.ident == other.0.ident
    }
}

impl Eq for Rule {}

impl PartialOrd for Rule {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.0.ident.partial_cmp(&other.0.ident)
    }
}

impl Ord for Rule {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap()
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:", self.lhs().name())?;
        if self.0.parts.is_empty() {
            write!(f, " <empty>")?;
        } else {
            for part in self.0.parts.iter() {
                write!(f, " {}", part)?;
            }
        }
        Ok(())
    }
}

/// `(rule, dotPos)`. Two items are "core-equal" iff they agree on this
/// pair (spec.md 3: lookahead and precStack excluded).
#[derive(Debug, PartialOrd, Ord, PartialEq, Eq, Clone)]
pub struct GrammarItemKey {
    rule: Rule,
    dot: usize,
}

impl From<&Rule> for GrammarItemKey {
    fn from(rule: &Rule) -> Self {
        Self {
            rule: rule.clone(),
            dot: 0,
        }
    }
}

impl std::fmt::Display for GrammarItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:", self.rule.lhs().name())?;
        if self.rule.parts().is_empty() {
            write!(f, " . <empty>")?;
        } else {
            for (index, part) in self.rule.parts().iter().enumerate() {
                if index == self.dot {
                    write!(f, " . {}", part)?;
                } else {
                    write!(f, " {}", part)?;
                }
            }
            if self.dot >= self.rule.parts().len() {
                write!(f, " . ")?;
            }
        }
        Ok(())
    }
}

impl GrammarItemKey {
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn dot(&self) -> usize {
        self.dot
    }

    pub fn shifted(&self) -> Self {
        debug_assert!(self.dot < self.rule.len());
        Self {
            rule: self.rule.clone(),
            dot: self.dot + 1,
        }
    }

    pub fn is_closable(&self) -> bool {
        self.rule
            .parts()
            .get(self.dot)
            .map(|t| t.is_non_terminal())
            .unwrap_or(false)
    }

    pub fn is_kernel_item(&self) -> bool {
        self.dot > 0 || self.rule.lhs().is_top()
    }

    pub fn is_reducible(&self) -> bool {
        self.dot >= self.rule.len()
    }

    pub fn next_term(&self) -> Option<&Term> {
        self.rule.parts().get(self.dot)
    }

    pub fn next_term_is(&self, term: &Term) -> bool {
        self.next_term().map(|t| t == term).unwrap_or(false)
    }

    pub fn rhs_tail(&self) -> &[Term] {
        &self.rule.parts()[self.dot + 1..]
    }

    /// Precedence declared at the originating dot position, for Shift
    /// actions (spec.md 4.2 "Action assignment").
    pub fn shift_precedence(&self) -> Option<Precedence> {
        self.rule.conflict_at(self.dot).precedence.clone()
    }

    pub fn has_reducible_error_recovery_tail(&self) -> bool {
        self.is_reducible() && self.rule.has_error_recovery_tail()
    }
}

/// FIRST(β a): FIRST of the terms following the dot, extended with `a`
/// when the tail is fully nullable (spec.md 4.2 "Closure").
pub fn first_of_tail_with_lookahead(tail: &[Term], lookahead: &Term) -> TermSet {
    let mut result = TermSet::new();
    let mut all_nullable = true;
    for term in tail {
        if term.is_terminal() {
            result.insert(term);
            all_nullable = false;
            break;
        }
        if let Some(firsts) = term.firsts() {
            for t in firsts.iter() {
                result.insert(t);
            }
            if !term.derives_empty() {
                all_nullable = false;
                break;
            }
        } else {
            all_nullable = false;
            break;
        }
    }
    if all_nullable {
        result.insert(lookahead);
    }
    result
}

#[derive(Debug, Default)]
pub struct Reductions {
    reductions: BTreeMap<BTreeSet<Rule>, TermSet>,
    expected_terms: TermSet,
}

impl Reductions {
    pub fn reductions(&self) -> impl Iterator<Item = (&BTreeSet<Rule>, &TermSet)> {
        self.reductions.iter()
    }

    pub fn expected_terms(&self) -> &TermSet {
        &self.expected_terms
    }
}

/// A closed set of LR(1) items with their lookahead sets (spec.md 3
/// "State"'s `itemSet`), grounded on the teacher's `GrammarItemSet`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GrammarItemSet(BTreeMap<GrammarItemKey, TermSet>);

impl From<BTreeMap<GrammarItemKey, TermSet>> for GrammarItemSet {
    fn from(map: BTreeMap<GrammarItemKey, TermSet>) -> Self {
        Self(map)
    }
}

impl Index<&GrammarItemKey> for GrammarItemSet {
    type Output = TermSet;

    fn index(&self, key: &GrammarItemKey) -> &TermSet {
        self.0.index(key)
    }
}

impl GrammarItemSet {
    pub fn iter(&self) -> btree_map::Iter<GrammarItemKey, TermSet> {
        self.0.iter()
    }

    pub fn closable_set(&self) -> Vec<(GrammarItemKey, TermSet)> {
        self.0
            .iter()
            .filter(|(k, _)| k.is_closable())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn generate_goto_kernel(&self, term: &Term) -> GrammarItemSet {
        let mut map = BTreeMap::new();
        for (key, lookahead) in self.0.iter() {
            if key.next_term_is(term) {
                map.insert(key.shifted(), lookahead.clone());
            }
        }
        GrammarItemSet(map)
    }

    pub fn kernel_key_set(&self) -> BTreeSet<GrammarItemKey> {
        self.0
            .keys()
            .filter(|k| k.is_kernel_item())
            .cloned()
            .collect()
    }

    pub fn core(&self) -> BTreeSet<GrammarItemKey> {
        self.0.keys().cloned().collect()
    }

    pub fn reducible_key_set(&self) -> BTreeSet<GrammarItemKey> {
        self.0.keys().filter(|k| k.is_reducible()).cloned().collect()
    }

    pub fn get_mut(&mut self, key: &GrammarItemKey) -> Option<&mut TermSet> {
        self.0.get_mut(key)
    }

    pub fn insert(&mut self, key: GrammarItemKey, lookahead: TermSet) -> Option<TermSet> {
        self.0.insert(key, lookahead)
    }

    pub fn reducible_lookahead_set(&self) -> TermSet {
        let mut set = TermSet::new();
        for (_, lookahead) in self.0.iter().filter(|(k, _)| k.is_reducible()) {
            set |= lookahead;
        }
        set
    }

    pub fn reductions(&self) -> Reductions {
        let expected_terms = self.reducible_lookahead_set();
        let mut reductions: BTreeMap<BTreeSet<Rule>, TermSet> = BTreeMap::new();
        for term in expected_terms.iter() {
            let mut rules: BTreeSet<Rule> = BTreeSet::new();
            for (key, lookahead) in self.0.iter().filter(|(k, _)| k.is_reducible()) {
                if lookahead.contains(term) {
                    rules.insert(key.rule().clone());
                }
            }
            reductions
                .entry(rules)
                .or_insert_with(TermSet::new)
                .insert(term);
        }
        Reductions {
            reductions,
            expected_terms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexable::Location;

    fn term(name: &str, terminal: bool) -> Term {
        let loc = Location::new("g", 1, 1);
        if terminal {
            Term::new_terminal(name, &loc)
        } else {
            Term::new_non_terminal(name, &loc)
        }
    }

    #[test]
    fn rule_aggregate_precedence_picks_highest_level() {
        let lhs = term("Expr", false);
        let plus = term("+", true);
        let num = term("num", true);
        let mut conflicts = vec![Conflict::empty(); 4];
        conflicts[1] = Conflict::with_precedence(Precedence::new("arith", 1, Associativity::Left));
        conflicts[2] = Conflict::with_precedence(Precedence::new("arith", 5, Associativity::Left));
        let rule = Rule::with_conflicts(
            1,
            lhs,
            vec![num.clone(), plus, num],
            conflicts,
            None,
        );
        assert_eq!(rule.aggregate_precedence().unwrap().level, 5);
    }

    #[test]
    fn item_key_shift_and_reduce() {
        let lhs = term("Expr", false);
        let num = term("num", true);
        let rule = Rule::new(1, lhs, vec![num], None);
        let key = GrammarItemKey::from(&rule);
        assert!(!key.is_reducible());
        let shifted = key.shifted();
        assert!(shifted.is_reducible());
    }
}
