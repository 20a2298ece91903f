// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>
//
// Terminals and non-terminals share one namespace (spec.md 3), so unlike
// the teacher's split `symbol::terminal::Token` / `symbol::non_terminal::
// NonTerminal`, this crate has one `Term` type distinguished by its flag
// bitset.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{btree_set, BTreeSet};
use std::fmt;
use std::iter::FromIterator;
use std::ops::{BitOr, BitOrAssign};
use std::rc::Rc;

use lexable::Location;

use crate::rule::Rule;
use crate::symbol::tag::Tag;
use crate::symbol::Associativity;

pub type TermFlags = u16;

pub const TERMINAL: TermFlags = 1 << 0;
pub const EOF: TermFlags = 1 << 1;
pub const ERROR: TermFlags = 1 << 2;
pub const TOP: TermFlags = 1 << 3;
pub const REPEATED: TermFlags = 1 << 4;
pub const PRESERVE: TermFlags = 1 << 5;

#[derive(Debug, Default)]
pub struct TermData {
    name: String,
    flags: Cell<TermFlags>,
    tag: RefCell<Option<Tag>>,
    defined_at: RefCell<Vec<Location>>,
    used_at: RefCell<Vec<Location>>,
    associativity: Cell<Associativity>,
    precedence: Cell<u16>,
    /// Lazily computed once all rules are known (spec.md 4.2 FIRST sets).
    firsts: RefCell<Option<TermSet>>,
}

/// A grammar symbol: cheap-to-clone handle around a reference-counted,
/// interior-mutable data block, compared and ordered by identity of its
/// name (mirrors the teacher's `Rc<Data>`-newtype idiom).
#[derive(Debug, Clone)]
pub struct Term(Rc<TermData>);

impl Term {
    fn new(name: &str, flags: TermFlags, defined_at: Option<&Location>) -> Self {
        let data = TermData {
            name: name.to_string(),
            flags: Cell::new(flags),
            tag: RefCell::new(None),
            defined_at: RefCell::new(defined_at.cloned().into_iter().collect()),
            used_at: RefCell::new(Vec::new()),
            associativity: Cell::new(Associativity::NonAssoc),
            precedence: Cell::new(0),
            firsts: RefCell::new(None),
        };
        Term(Rc::new(data))
    }

    pub fn new_terminal(name: &str, defined_at: &Location) -> Self {
        Self::new(name, TERMINAL, Some(defined_at))
    }

    pub fn new_non_terminal(name: &str, defined_at: &Location) -> Self {
        Self::new(name, 0, Some(defined_at))
    }

    pub fn new_top() -> Self {
        Self::new("AAStart", TOP, None)
    }

    pub fn new_eof() -> Self {
        Self::new("AAEnd", TERMINAL | EOF, None)
    }

    pub fn new_error() -> Self {
        Self::new("AAError", ERROR, None)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn flags(&self) -> TermFlags {
        self.0.flags.get()
    }

    pub fn set_flag(&self, flag: TermFlags) {
        self.0.flags.set(self.0.flags.get() | flag)
    }

    pub fn is_terminal(&self) -> bool {
        self.flags() & TERMINAL != 0
    }

    pub fn is_non_terminal(&self) -> bool {
        !self.is_terminal()
    }

    pub fn is_eof(&self) -> bool {
        self.flags() & EOF != 0
    }

    pub fn is_error(&self) -> bool {
        self.flags() & ERROR != 0
    }

    pub fn is_top(&self) -> bool {
        self.flags() & TOP != 0
    }

    pub fn is_preserved(&self) -> bool {
        self.flags() & PRESERVE != 0
    }

    pub fn mark_preserved(&self) {
        self.set_flag(PRESERVE)
    }

    pub fn tag(&self) -> Option<Tag> {
        self.0.tag.borrow().clone()
    }

    pub fn set_tag(&self, tag: Tag) {
        *self.0.tag.borrow_mut() = Some(tag);
    }

    pub fn defined_at(&self) -> Vec<Location> {
        self.0.defined_at.borrow().clone()
    }

    pub fn add_defined_at(&self, location: &Location) {
        self.0.defined_at.borrow_mut().push(location.clone());
    }

    pub fn first_definition(&self) -> Option<Location> {
        self.0.defined_at.borrow().first().cloned()
    }

    pub fn is_undefined(&self) -> bool {
        self.0.defined_at.borrow().is_empty()
    }

    pub fn add_used_at(&self, location: &Location) {
        self.0.used_at.borrow_mut().push(location.clone());
    }

    pub fn used_at(&self) -> Vec<Location> {
        self.0.used_at.borrow().clone()
    }

    pub fn is_unused(&self) -> bool {
        self.0.used_at.borrow().is_empty()
    }

    pub fn associativity(&self) -> Associativity {
        self.0.associativity.get()
    }

    pub fn set_associativity(&self, associativity: Associativity) {
        self.0.associativity.set(associativity)
    }

    pub fn precedence(&self) -> u16 {
        self.0.precedence.get()
    }

    pub fn set_precedence(&self, precedence: u16) {
        self.0.precedence.set(precedence)
    }

    pub fn precedence_has_been_set(&self) -> bool {
        self.0.precedence.get() > 0
    }

    pub fn firsts(&self) -> Option<TermSet> {
        self.0.firsts.borrow().clone()
    }

    /// Naive fixpoint over productions (spec.md 4.2 "FIRST sets").
    pub fn set_firsts_data(&self, rules: &[Rule]) {
        let mut firsts = TermSet::new();
        let mut nullable = false;
        let mut changed = true;
        while changed {
            changed = false;
            for rule in rules.iter().filter(|r| r.lhs() == self) {
                let mut all_nullable = true;
                for part in rule.parts() {
                    if part == self {
                        if !nullable {
                            all_nullable = false;
                        }
                        break;
                    }
                    if part.is_terminal() {
                        if firsts.insert(part) {
                            changed = true;
                        }
                        all_nullable = false;
                        break;
                    } else {
                        let part_firsts = part.firsts().unwrap_or_default();
                        for term in part_firsts.iter() {
                            if firsts.insert(term) {
                                changed = true;
                            }
                        }
                        if !part.derives_empty() {
                            all_nullable = false;
                            break;
                        }
                    }
                }
                if all_nullable && !nullable {
                    nullable = true;
                    changed = true;
                }
            }
        }
        firsts.set_nullable(nullable);
        *self.0.firsts.borrow_mut() = Some(firsts);
    }

    pub fn derives_empty(&self) -> bool {
        self.0
            .firsts
            .borrow()
            .as_ref()
            .map(|s| s.nullable())
            .unwrap_or(false)
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for Term {}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.name().partial_cmp(other.name())
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap()
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// FIRST set of terminals, plus a separate nullability bit rather than an
/// in-band epsilon member (clearer than overloading set membership).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TermSet {
    terms: BTreeSet<Term>,
    nullable: bool,
}

impl TermSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn set_nullable(&mut self, nullable: bool) {
        self.nullable = nullable;
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn contains(&self, term: &Term) -> bool {
        self.terms.contains(term)
    }

    pub fn insert(&mut self, term: &Term) -> bool {
        self.terms.insert(term.clone())
    }

    pub fn remove(&mut self, term: &Term) -> bool {
        self.terms.remove(term)
    }

    pub fn difference<'a>(&'a self, other: &'a Self) -> btree_set::Difference<'a, Term> {
        self.terms.difference(&other.terms)
    }

    pub fn intersection<'a>(&'a self, other: &'a Self) -> btree_set::Intersection<'a, Term> {
        self.terms.intersection(&other.terms)
    }

    pub fn iter(&self) -> btree_set::Iter<Term> {
        self.terms.iter()
    }
}

impl BitOrAssign<&Self> for TermSet {
    fn bitor_assign(&mut self, rhs: &Self) {
        self.terms = self.terms.bitor(&rhs.terms);
        self.nullable = self.nullable || rhs.nullable;
    }
}

impl FromIterator<Term> for TermSet {
    fn from_iter<T: IntoIterator<Item = Term>>(iter: T) -> Self {
        Self {
            terms: BTreeSet::from_iter(iter),
            nullable: false,
        }
    }
}

impl fmt::Display for TermSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (index, term) in self.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", term.name())?;
        }
        if self.nullable {
            write!(f, "{}ε", if self.is_empty() { "" } else { ", " })?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_compare_by_name() {
        let loc = Location::new("t", 1, 1);
        let a = Term::new_terminal("a", &loc);
        let b = Term::new_terminal("a", &loc);
        assert_eq!(a, b);
        assert_ne!(a, Term::new_terminal("b", &loc));
    }

    #[test]
    fn top_eof_error_flags() {
        assert!(Term::new_top().is_top());
        assert!(Term::new_eof().is_eof());
        assert!(Term::new_error().is_error());
    }
}
