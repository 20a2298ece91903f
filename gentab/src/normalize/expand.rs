// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>
//
// Expression -> Rule list expansion (spec.md 4.1). Each surface
// expression is turned into one or more `Rule`s headed by a (possibly
// freshly minted) non-terminal `Term`; the caller gets back the `Term`
// that stands for the expression's value.

use std::collections::BTreeMap;
use std::fmt;

use lexable::Location;

use crate::ast::{ConflictMarker, Expression, Rule as AstRule, Spec, TopLevelItem};
use crate::rule::{Conflict, Precedence, Rule};
use crate::symbol::term::Term;
use crate::symbol::SymbolTable;

/// Forces right-leaning trees for `E*`/`E+` without reporting a conflict
/// (spec.md 4.1: "an internal precedence `PREC_REPEAT` on the right edge
/// and `PREC_REPEAT-1` on the left").
const PREC_REPEAT: i32 = 1;
const PREC_REPEAT_GROUP: &str = "__repeat";

/// All conflict markers that name a declared `@precedence` entry share
/// this single group, so a `"+"` marker and a `"*"` marker compare
/// against each other exactly as the teacher's single monotonic
/// `next_precedence` counter treats them (spec.md 4.1 "conflict
/// markers ... resolved against the declared precedence/associativity").
const NAMED_PRECEDENCE_GROUP: &str = "__named";

#[derive(Debug)]
pub enum Error {
    UnknownReference(String),
    ArgumentCountMismatch(String, usize, usize),
    ArgumentToNonParameterized(String),
    UndefinedParameter(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnknownReference(name) => write!(f, "reference to unknown rule \"{}\"", name),
            Error::ArgumentCountMismatch(name, want, got) => write!(
                f,
                "rule \"{}\" expects {} argument(s), got {}",
                name, want, got
            ),
            Error::ArgumentToNonParameterized(name) => write!(
                f,
                "Passing arguments to a parameter that already has arguments: \"{}\"",
                name
            ),
            Error::UndefinedParameter(name) => {
                write!(f, "undefined parameter \"${}\"", name)
            }
        }
    }
}

struct Expander<'a, 'd> {
    symbols: &'a mut SymbolTable,
    rules: Vec<Rule>,
    next_ident: u32,
    next_anon: u32,
    /// Memoized repeat sub-grammars, keyed by structural equality of the
    /// repeated expression (spec.md 9 "Memoization keys"): `(kind, debug
    /// text of E)` -> the outer non-terminal standing for `E*`/`E+`.
    repeat_memo: BTreeMap<(&'static str, String), Term>,
    rule_defs: BTreeMap<String, &'a AstRule>,
    location: Location,
    /// Name -> (level, associativity) resolved from `@precedence`
    /// blocks in declaration order (earliest block binds tightest),
    /// consulted by `expand_seq` when a position carries a conflict
    /// marker (spec.md 4.1).
    precedence_table: BTreeMap<String, (i32, crate::symbol::Associativity)>,
    diagnostics: &'d mut crate::diagnostics::Diagnostics,
    /// The skip-rule term active for whatever rule is currently being
    /// expanded (spec.md 3 "Rule"'s `skip` field; 6 "`@skip { expr }`
    /// either global or followed by `{ rules }` for a scoped skip").
    /// Every synthetic sub-rule minted while expanding a production
    /// inherits this, matching "skip names the skip-rule active inside
    /// this production".
    current_skip: Option<Term>,
}

impl<'a, 'd> Expander<'a, 'd> {
    fn new_rule(&mut self, lhs: Term, parts: Vec<Term>, conflicts: Vec<Conflict>) -> Term {
        let ident = self.next_ident;
        self.next_ident += 1;
        self.rules.push(Rule::with_conflicts(
            ident,
            lhs.clone(),
            parts,
            conflicts,
            self.current_skip.clone(),
        ));
        lhs
    }

    fn fresh_non_terminal(&mut self, hint: &str) -> Term {
        self.next_anon += 1;
        let name = format!("__{}_{}", hint, self.next_anon);
        self.symbols.term_defined_at(&name, &self.location, false)
    }

    fn expand_seq(
        &mut self,
        seq: &[(Expression, Option<ConflictMarker>)],
        args: &BTreeMap<String, Expression>,
    ) -> Result<Vec<(Term, Conflict)>, Error> {
        // Sequences distribute over choice: if any position's expression
        // is itself a Choice, expand this into independent alternatives
        // rather than attempt to thread choice-of-term through a single
        // rule's parts.
        let mut out = Vec::with_capacity(seq.len());
        for (expr, marker) in seq {
            let term = self.expand(expr, args)?;
            let conflict = if let Some(marker) = marker {
                Conflict::with_precedence(self.resolve_marker_precedence(marker))
            } else {
                Conflict::empty()
            };
            out.push((term, conflict));
        }
        Ok(out)
    }

    /// Turn a `!name`/`~name` conflict marker into a `Precedence`. A
    /// name declared in a `@precedence` block resolves to that block's
    /// level and associativity, in the single group shared by every
    /// named marker, so `"+"` and `"*"` compare against each other
    /// instead of only against themselves. A name with no declaration
    /// falls back to its own private group at its own literal level,
    /// non-associative, matching the pre-declaration behavior of a
    /// stray marker the generator can't relate to anything else.
    fn resolve_marker_precedence(&mut self, marker: &ConflictMarker) -> Precedence {
        match self.precedence_table.get(&marker.name) {
            Some(&(level, associativity)) => Precedence::new(
                NAMED_PRECEDENCE_GROUP,
                if marker.silenced { -1 } else { level },
                associativity,
            ),
            None => {
                self.diagnostics.warn(
                    None,
                    format!(
                        "conflict marker \"{}\" names no declared precedence",
                        marker.name
                    ),
                );
                Precedence::new(
                    &marker.name,
                    marker.level,
                    crate::symbol::Associativity::NonAssoc,
                )
            }
        }
    }

    /// Each alternative reduces to a single `Term` through `expand` (a
    /// nested `Seq` mints its own synthetic non-terminal exactly the way
    /// any other sub-expression does), so distributing a sequence over an
    /// enclosing choice falls out of the recursion instead of needing an
    /// explicit cross product.
    fn build_choice_rules(
        &mut self,
        lhs: Term,
        alternatives: &[Expression],
        args: &BTreeMap<String, Expression>,
    ) -> Result<(), Error> {
        for alt in alternatives {
            let term = self.expand(alt, args)?;
            self.new_rule(lhs.clone(), vec![term], vec![Conflict::empty(), Conflict::empty()]);
        }
        Ok(())
    }

    fn expand(&mut self, expr: &Expression, args: &BTreeMap<String, Expression>) -> Result<Term, Error> {
        match expr {
            Expression::Literal(text) => {
                if let Some(term) = self.symbols.get_literal_terminal(text) {
                    return Ok(term.clone());
                }
                let name = format!("__lit_{}", self.next_anon);
                self.next_anon += 1;
                Ok(self
                    .symbols
                    .new_literal_terminal(&name, text, &self.location)
                    .unwrap_or_else(|_| self.symbols.term_defined_at(&name, &self.location, true)))
            }
            Expression::AnyChar => Ok(self.symbols.term_defined_at("__any_char", &self.location, true)),
            Expression::CharSet(_pattern) => {
                let name = format!("__charset_{}", self.next_anon);
                self.next_anon += 1;
                Ok(self.symbols.term_defined_at(&name, &self.location, true))
            }
            Expression::Reference { name, args: call_args } => {
                if let Some(arg_expr) = args.get(name) {
                    if !call_args.is_empty() {
                        return Err(Error::ArgumentToNonParameterized(name.clone()));
                    }
                    return self.expand(arg_expr, &BTreeMap::new());
                }
                if let Some(rule_def) = self.rule_defs.get(name).copied() {
                    if rule_def.params.len() != call_args.len() {
                        return Err(Error::ArgumentCountMismatch(
                            name.clone(),
                            rule_def.params.len(),
                            call_args.len(),
                        ));
                    }
                    if rule_def.params.is_empty() {
                        // A zero-arg named rule already got its own lhs
                        // rule built once, up front (see `expand` below);
                        // a reference reuses that term rather than
                        // re-expanding the body inline (spec.md 4.1:
                        // substitution only applies to *parameterized*
                        // rules). This is also what makes direct
                        // self-recursion in a named rule terminate here
                        // instead of looping forever.
                        let lhs = self
                            .symbols
                            .terms()
                            .find(|t| t.name() == name.as_str())
                            .cloned()
                            .expect("every rule_def's lhs is registered before bodies are expanded");
                        lhs.add_used_at(&self.location);
                        return Ok(lhs);
                    }
                    let mut bound = BTreeMap::new();
                    for (param, arg) in rule_def.params.iter().zip(call_args.iter()) {
                        bound.insert(param.clone(), arg.clone());
                    }
                    return self.expand(&rule_def.body.clone(), &bound);
                }
                Ok(self.symbols.term_used_at(name, &self.location))
            }
            Expression::Seq(parts) => {
                let lhs = self.fresh_non_terminal("seq");
                let expanded = self.expand_seq(parts, args)?;
                let mut conflicts = Vec::with_capacity(expanded.len() + 1);
                conflicts.push(Conflict::empty());
                let mut terms = Vec::with_capacity(expanded.len());
                for (term, conflict) in expanded {
                    terms.push(term);
                    conflicts.push(conflict);
                }
                self.new_rule(lhs.clone(), terms, conflicts);
                Ok(lhs)
            }
            Expression::Choice(alternatives) => {
                let lhs = self.fresh_non_terminal("choice");
                self.build_choice_rules(lhs.clone(), alternatives, args)?;
                Ok(lhs)
            }
            Expression::Optional(inner) => {
                // E? -> ε | E inline in the enclosing choice.
                let lhs = self.fresh_non_terminal("opt");
                self.new_rule(lhs.clone(), vec![], vec![Conflict::empty(), Conflict::empty()]);
                let inner_term = self.expand(inner, args)?;
                self.new_rule(
                    lhs.clone(),
                    vec![inner_term],
                    vec![Conflict::empty(), Conflict::empty()],
                );
                Ok(lhs)
            }
            Expression::Star(inner) => self.expand_repeat(inner, args, true),
            Expression::Plus(inner) => self.expand_repeat(inner, args, false),
            Expression::Tagged { tag, body } => {
                let term = self.expand(body, args)?;
                if let Ok(t) = self.symbols.new_tag(tag) {
                    term.set_tag(t);
                } else if let Some(existing) = self.symbols.get_tag(tag) {
                    term.set_tag(existing.clone());
                }
                Ok(term)
            }
            Expression::Named { name, body } => {
                let term = self.expand(body, args)?;
                let _ = name;
                Ok(term)
            }
            Expression::Specialize {
                base,
                literal,
                is_extend,
            } => {
                let base_term = self
                    .symbols
                    .terms()
                    .find(|t| t.name() == base)
                    .cloned()
                    .unwrap_or_else(|| self.symbols.term_defined_at(base, &self.location, true));
                self.symbols
                    .specialize(literal, &base_term, *is_extend, &self.location)
                    .map_err(|_| Error::UnknownReference(literal.clone()))
            }
            Expression::Nested {
                name,
                args: nested_args,
                end_token,
            } => {
                let _ = nested_args;
                let placeholder = self
                    .symbols
                    .term_defined_at(&format!("__nest_{}", name), &self.location, false);
                let _end = self.expand(end_token, args)?;
                Ok(placeholder)
            }
        }
    }

    /// `E*`/`E+` (spec.md 4.1): **outer** -> ε | inner (star only),
    /// **inner** -> E | inner inner, with `PREC_REPEAT` forcing a
    /// right-leaning parse. Memoized by structural equality of `E` so
    /// both shapes are produced exactly once per distinct repeated
    /// expression.
    fn expand_repeat(
        &mut self,
        inner_expr: &Expression,
        args: &BTreeMap<String, Expression>,
        allow_empty: bool,
    ) -> Result<Term, Error> {
        let kind = if allow_empty { "star" } else { "plus" };
        let key = (kind, format!("{:?}", inner_expr));
        if let Some(existing) = self.repeat_memo.get(&key) {
            return Ok(existing.clone());
        }
        let outer = self.fresh_non_terminal("repeat_outer");
        let inner = self.fresh_non_terminal("repeat_inner");
        outer.set_flag(crate::symbol::term::REPEATED);
        inner.set_flag(crate::symbol::term::REPEATED);
        self.repeat_memo.insert(key, outer.clone());

        if allow_empty {
            self.new_rule(outer.clone(), vec![], vec![Conflict::empty(), Conflict::empty()]);
        }
        self.new_rule(
            outer.clone(),
            vec![inner.clone()],
            vec![Conflict::empty(), Conflict::empty()],
        );

        let left = Conflict::with_precedence(Precedence::new(
            PREC_REPEAT_GROUP,
            PREC_REPEAT - 1,
            crate::symbol::Associativity::Left,
        ));
        let right = Conflict::with_precedence(Precedence::new(
            PREC_REPEAT_GROUP,
            PREC_REPEAT,
            crate::symbol::Associativity::Right,
        ));

        // The base case's leading position (the shift that starts a fresh
        // `inner`) must carry the same `PREC_REPEAT_GROUP`/level/assoc as
        // the recursive rule's trailing position: that's the position the
        // automaton actually compares against the `inner -> inner inner .`
        // reduce once two `inner`s are on the stack (spec.md 4.2 "Conflict
        // resolution" only adjudicates when both sides share a group).
        // Without it the shift side carries no precedence at all, the
        // comparison falls through to `Err(())`, and every `E*`/`E+`
        // grammar fails to build with a spurious shift/reduce conflict.
        let e_term = self.expand(inner_expr, args)?;
        self.new_rule(
            inner.clone(),
            vec![e_term],
            vec![right.clone(), Conflict::empty()],
        );

        self.new_rule(
            inner.clone(),
            vec![inner.clone(), inner.clone()],
            vec![Conflict::empty(), left, right],
        );
        Ok(outer)
    }
}

/// Expand the full surface specification into a flat rule list headed by
/// a synthetic `top` rule wrapping `@top { expr }`. `diagnostics` receives
/// a warning (spec.md 7) for every precedence group name that names no
/// known token at the time the precedence section is processed.
/// Every named-rule definition reachable from the top level, including
/// those nested inside a `@skip { expr } { rules }` scoped-skip block
/// (spec.md 6): the scoped rules are declared only inside their owning
/// `TopLevelItem::Skip`, not as independent top-level items.
fn all_rule_defs(spec: &Spec) -> Vec<&AstRule> {
    let mut out = Vec::new();
    for item in &spec.items {
        match item {
            TopLevelItem::GrammarRule(rule) => out.push(rule),
            TopLevelItem::Skip { scoped_rules, .. } => out.extend(scoped_rules.iter()),
            _ => {}
        }
    }
    out
}

pub fn expand(
    spec: &Spec,
    symbols: &mut SymbolTable,
    diagnostics: &mut crate::diagnostics::Diagnostics,
) -> Result<Vec<Rule>, Error> {
    let location = Location::new("grammar", 1, 1);
    let all_rules = all_rule_defs(spec);
    let mut rule_defs = BTreeMap::new();
    for rule in &all_rules {
        rule_defs.insert(rule.name.clone(), *rule);
    }

    // `@tags { term = :tag; @export name :tag; @punctuation "..."; }` and
    // `@external-tokens` (spec.md 6): these name terms independently of
    // the grammar-rule/token-rule bodies below, so they are resolved in
    // their own pass first.
    for item in &spec.items {
        match item {
            TopLevelItem::TagDecl { name, tag } => {
                let term = symbols
                    .terms()
                    .find(|t| t.name() == name.as_str())
                    .cloned()
                    .unwrap_or_else(|| symbols.term_defined_at(name, &location, true));
                if let Ok(t) = symbols.new_tag(tag) {
                    term.set_tag(t);
                } else if let Some(existing) = symbols.get_tag(tag) {
                    term.set_tag(existing.clone());
                }
            }
            TopLevelItem::ExportTag { name, tag } => {
                let term = symbols.term_defined_at(name, &location, false);
                term.mark_preserved();
                if let Ok(t) = symbols.new_tag(tag) {
                    term.set_tag(t);
                } else if let Some(existing) = symbols.get_tag(tag) {
                    term.set_tag(existing.clone());
                }
            }
            TopLevelItem::Punctuation(chars) => symbols.declare_punctuation(chars),
            TopLevelItem::DetectDelim => symbols.enable_detect_delim(),
            TopLevelItem::ExternalTokens { ids, .. } => {
                for (name, tag) in ids {
                    let term = symbols.term_defined_at(name, &location, true);
                    if let Some(tag) = tag {
                        if let Ok(t) = symbols.new_tag(tag) {
                            term.set_tag(t);
                        } else if let Some(existing) = symbols.get_tag(tag) {
                            term.set_tag(existing.clone());
                        }
                    }
                }
            }
            _ => {}
        }
    }

    // Pre-register every named rule's lhs term before any body is
    // expanded, so a reference to a rule that is declared later in
    // source order (forward reference) or whose only defining rule is
    // processed later resolves instead of panicking (also covers plain
    // self-recursion, a special case of the same requirement).
    for rule in &all_rules {
        let lhs = symbols.term_defined_at(&rule.name, &rule.defined_at, false);
        if rule.exported {
            lhs.mark_preserved();
        }
        if let Some(tag) = &rule.tag {
            if let Ok(t) = symbols.new_tag(tag) {
                lhs.set_tag(t);
            } else if let Some(existing) = symbols.get_tag(tag) {
                lhs.set_tag(existing.clone());
            }
        }
    }

    let groups: Vec<_> = spec.precedence_groups().collect();
    let mut precedence_table = BTreeMap::new();
    let total = groups.len();
    for (index, group) in groups.iter().enumerate() {
        // Earliest-declared group binds tightest, mirroring the
        // teacher's `set_precedences` decrementing a single counter
        // once per call (spec.md 4.1).
        let level = (total - index) as i32;
        for name in &group.names {
            precedence_table.insert(name.clone(), (level, group.associativity));
            match symbols.terms().find(|t| t.name() == name).cloned() {
                Some(term) => term.set_associativity(group.associativity),
                None => diagnostics.warn(
                    None,
                    format!("precedence specified for unknown token \"{}\"", name),
                ),
            }
        }
    }

    let mut expander = Expander {
        symbols,
        rules: Vec::new(),
        next_ident: 1,
        next_anon: 0,
        repeat_memo: BTreeMap::new(),
        rule_defs,
        location,
        precedence_table,
        diagnostics,
        current_skip: None,
    };

    // `@skip { expr }` (global, no scoped rules) vs `@skip { expr } {
    // rules }` (scoped, spec.md 6): expand each skip expression once into
    // a skip term, then record which named rules it applies to.
    let mut global_skip: Option<Term> = None;
    let mut rule_skip: BTreeMap<String, Term> = BTreeMap::new();
    for item in spec.items.iter() {
        if let TopLevelItem::Skip { expr, scoped_rules } = item {
            let skip_term = expander.expand(expr, &BTreeMap::new())?;
            if scoped_rules.is_empty() {
                global_skip = Some(skip_term);
            } else {
                for rule in scoped_rules {
                    rule_skip.insert(rule.name.clone(), skip_term.clone());
                }
            }
        }
    }

    for rule in all_rules.iter() {
        let lhs = expander
            .symbols
            .terms()
            .find(|t| t.name() == rule.name.as_str())
            .cloned()
            .expect("pre-registration pass already created every named rule's lhs term");
        expander.current_skip = rule_skip.get(&rule.name).cloned().or_else(|| global_skip.clone());
        if rule.params.is_empty() {
            let body_term = expander.expand(&rule.body, &BTreeMap::new())?;
            expander.new_rule(
                lhs,
                vec![body_term],
                vec![Conflict::empty(), Conflict::empty()],
            );
        }
    }

    if let Some(top_expr) = spec.top() {
        expander.current_skip = global_skip.clone();
        let top = expander.symbols.top();
        let body_term = expander.expand(top_expr, &BTreeMap::new())?;
        let eof = expander.symbols.eof();
        expander.new_rule(
            top,
            vec![body_term, eof],
            vec![Conflict::empty(), Conflict::empty(), Conflict::empty()],
        );
    }

    if expander.symbols.detect_delim_enabled() {
        detect_delim(&expander.rules, expander.symbols);
    }

    Ok(expander.rules)
}

/// `@detect-delim` (spec.md 6, GLOSSARY "Detect-delim"): for every rule
/// whose lhs carries a tag, if its first and last parts are literal
/// terminals forming a declared punctuation open/close pair, attach
/// `delim="( )"`-style metadata to that tag.
fn detect_delim(rules: &[Rule], symbols: &SymbolTable) {
    for rule in rules {
        let tag = match rule.lhs().tag() {
            Some(tag) => tag,
            None => continue,
        };
        if rule.len() < 2 {
            continue;
        }
        let first = &rule.parts()[0];
        let last = &rule.parts()[rule.len() - 1];
        let (Some(first_text), Some(last_text)) = (
            symbols.literal_text_of(first),
            symbols.literal_text_of(last),
        ) else {
            continue;
        };
        let (mut first_chars, mut last_chars) = (first_text.chars(), last_text.chars());
        let (Some(open), None) = (first_chars.next(), first_chars.next()) else {
            continue;
        };
        let (Some(close), None) = (last_chars.next(), last_chars.next()) else {
            continue;
        };
        if crate::symbol::tag::matching_close(open) == Some(close) {
            tag.set_delim(open, close);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TopLevelItem;

    #[test]
    fn star_produces_outer_and_inner_rules_once() {
        let mut symbols = SymbolTable::new();
        let mut spec = Spec::new();
        let loc = Location::new("g", 1, 1);
        symbols.new_literal_terminal("item", "item", &loc).unwrap();
        let item_ref = Expression::Reference {
            name: "item".to_string(),
            args: vec![],
        };
        spec.push(TopLevelItem::Top(Expression::Star(Box::new(item_ref))));
        let mut diagnostics = crate::diagnostics::Diagnostics::collecting();
        let rules = expand(&spec, &mut symbols, &mut diagnostics).unwrap();
        // outer (empty + non-empty), inner (single + recursive), top: 5 rules
        assert_eq!(rules.len(), 5);
    }

    #[test]
    fn optional_expands_to_empty_and_inner_alternatives() {
        let mut symbols = SymbolTable::new();
        let mut spec = Spec::new();
        let loc = Location::new("g", 1, 1);
        symbols.new_literal_terminal("x", "x", &loc).unwrap();
        let x_ref = Expression::Reference {
            name: "x".to_string(),
            args: vec![],
        };
        spec.push(TopLevelItem::Top(Expression::Optional(Box::new(x_ref))));
        let mut diagnostics = crate::diagnostics::Diagnostics::collecting();
        let rules = expand(&spec, &mut symbols, &mut diagnostics).unwrap();
        // opt-empty, opt-x, top: 3 rules
        assert_eq!(rules.len(), 3);
    }
}
