// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

use std::collections::BTreeMap;
use std::fmt;

use lexable::Location;

use crate::symbol::tag::Tag;
use crate::symbol::term::Term;

pub mod tag;
pub mod term;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    NonAssoc,
    Left,
    Right,
}

impl Default for Associativity {
    fn default() -> Self {
        Associativity::NonAssoc
    }
}

impl fmt::Display for Associativity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Associativity::*;
        match self {
            NonAssoc => write!(f, "NonAssoc"),
            Left => write!(f, "Left"),
            Right => write!(f, "Right"),
        }
    }
}

#[derive(Debug)]
pub enum Error {
    DuplicateTag(Tag),
    DuplicateTerm(Term),
    DuplicateSkipRule(String),
    DuplicateSpecialization(String),
    SpecializeExtendClash(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::DuplicateTag(tag) => write!(f, "Tag \"{}\" already defined", tag.name()),
            Error::DuplicateTerm(term) => {
                write!(f, "Term \"{}\" already defined", term.name())
            }
            Error::DuplicateSkipRule(name) => {
                write!(f, "Skip rule \"{}\" already defined", name)
            }
            Error::DuplicateSpecialization(value) => {
                write!(f, "Specialization for \"{}\" already defined", value)
            }
            Error::SpecializeExtendClash(value) => write!(
                f,
                "\"{}\" declared as both specialize and extend",
                value
            ),
        }
    }
}

/// Owns the namespace of terms and tags for one grammar build. Terminals
/// and non-terminals share the `terms` map (spec.md 3: "share one
/// namespace but are disjoint").
#[derive(Debug)]
pub struct SymbolTable {
    tags: BTreeMap<String, Tag>,
    terms: BTreeMap<String, Term>,
    literal_terminals: BTreeMap<String, Term>,
    /// value -> (is_extend, terminal) for `@specialize`/`@extend`.
    specializations: BTreeMap<String, (bool, Term)>,
    skip_rules: Vec<String>,
    next_precedence: u16,
    top: Term,
    eof: Term,
    error: Term,
    /// `@punctuation "()[]"` (spec.md 4.1): standard tag label per
    /// declared punctuation character, consulted by the detect-delim
    /// post-pass.
    punctuation: BTreeMap<char, Tag>,
    /// `@tags { ... @detect-delim }` (spec.md 6, GLOSSARY "Detect-delim").
    detect_delim: bool,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self {
            tags: BTreeMap::new(),
            terms: BTreeMap::new(),
            literal_terminals: BTreeMap::new(),
            specializations: BTreeMap::new(),
            skip_rules: Vec::new(),
            next_precedence: u16::MAX,
            top: Term::new_top(),
            eof: Term::new_eof(),
            error: Term::new_error(),
            punctuation: BTreeMap::new(),
            detect_delim: false,
        }
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn top(&self) -> Term {
        self.top.clone()
    }

    pub fn eof(&self) -> Term {
        self.eof.clone()
    }

    pub fn error(&self) -> Term {
        self.error.clone()
    }

    pub fn new_tag(&mut self, dotted: &str) -> Result<Tag, Error> {
        let tag = Tag::new(dotted);
        if let Some(other) = self.tags.insert(dotted.to_string(), tag.clone()) {
            Err(Error::DuplicateTag(other))
        } else {
            Ok(tag)
        }
    }

    pub fn get_tag(&self, dotted: &str) -> Option<&Tag> {
        self.tags.get(dotted)
    }

    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    pub fn new_literal_terminal(
        &mut self,
        name: &str,
        text: &str,
        defined_at: &Location,
    ) -> Result<Term, Error> {
        let term = Term::new_terminal(name, defined_at);
        if let Some(other) = self.terms.insert(name.to_string(), term.clone()) {
            return Err(Error::DuplicateTerm(other));
        }
        self.literal_terminals.insert(text.to_string(), term.clone());
        Ok(term)
    }

    pub fn get_literal_terminal(&self, lexeme: &str) -> Option<&Term> {
        self.literal_terminals.get(lexeme)
    }

    /// Reverse lookup used by the detect-delim post-pass: the literal
    /// text a terminal was registered under, if any.
    pub fn literal_text_of(&self, term: &Term) -> Option<&str> {
        self.literal_terminals
            .iter()
            .find(|(_, t)| *t == term)
            .map(|(text, _)| text.as_str())
    }

    pub fn term_defined_at(&mut self, name: &str, defined_at: &Location, is_terminal: bool) -> Term {
        if let Some(term) = self.terms.get(name) {
            term.add_defined_at(defined_at);
            term.clone()
        } else {
            let term = if is_terminal {
                Term::new_terminal(name, defined_at)
            } else {
                Term::new_non_terminal(name, defined_at)
            };
            self.terms.insert(name.to_string(), term.clone());
            term
        }
    }

    pub fn term_used_at(&mut self, name: &str, used_at: &Location) -> Term {
        if let Some(term) = self.terms.get(name) {
            term.add_used_at(used_at);
            term.clone()
        } else {
            let term = Term::new_non_terminal(name, used_at);
            term.add_used_at(used_at);
            self.terms.insert(name.to_string(), term.clone());
            term
        }
    }

    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.terms.values()
    }

    pub fn add_skip_rule(&mut self, name: &str) -> Result<(), Error> {
        if self.skip_rules.iter().any(|s| s == name) {
            Err(Error::DuplicateSkipRule(name.to_string()))
        } else {
            self.skip_rules.push(name.to_string());
            Ok(())
        }
    }

    /// `@specialize<tok, "lit">` / `@extend<tok, "lit">` (spec.md 4.1):
    /// duplicate specializations of the same value must share a term;
    /// declaring both forms for the same value is an error.
    pub fn specialize(
        &mut self,
        value: &str,
        base: &Term,
        is_extend: bool,
        defined_at: &Location,
    ) -> Result<Term, Error> {
        if let Some((existing_is_extend, existing_term)) = self.specializations.get(value) {
            if *existing_is_extend != is_extend {
                return Err(Error::SpecializeExtendClash(value.to_string()));
            }
            return Ok(existing_term.clone());
        }
        let name = format!("{}__{}", base.name(), value);
        let term = Term::new_terminal(&name, defined_at);
        self.specializations
            .insert(value.to_string(), (is_extend, term.clone()));
        Ok(term)
    }

    /// `@punctuation "()[]"` (spec.md 4.1): register a standard tag
    /// label for each listed character, keyed for the detect-delim
    /// post-pass to look bracket pairs up by literal text.
    pub fn declare_punctuation(&mut self, chars: &str) {
        for (ch, tag) in crate::symbol::tag::punctuation_tags(chars) {
            self.punctuation.entry(ch).or_insert(tag);
        }
    }

    pub fn punctuation_tag(&self, ch: char) -> Option<&Tag> {
        self.punctuation.get(&ch)
    }

    /// `@detect-delim` (spec.md 6, GLOSSARY): enable the post-pass that
    /// appends `delim="( )"` metadata to a tagged sequence whose first
    /// and last terms are a matching declared punctuation pair.
    pub fn enable_detect_delim(&mut self) {
        self.detect_delim = true;
    }

    pub fn detect_delim_enabled(&self) -> bool {
        self.detect_delim
    }

    pub fn set_precedences(&mut self, associativity: Associativity, terms: &[PrecedenceTarget]) {
        let precedence = self.next_precedence;
        self.next_precedence = self.next_precedence.saturating_sub(1);
        for target in terms {
            match target {
                PrecedenceTarget::Term(term) => {
                    term.set_associativity(associativity);
                    term.set_precedence(precedence);
                }
                PrecedenceTarget::Tag(_) => (),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum PrecedenceTarget {
    Term(Term),
    Tag(Tag),
}
