// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>
//
// Surface expression tree accepted as input to the normalizer (spec.md
// 4.1). The grammar-file lexer/parser that would ordinarily build this
// tree is out of scope (spec.md 1); this module is the builder API a
// front-end would call into instead, so callers can construct a grammar
// programmatically (see `normalize` tests and `main.rs`'s demo grammar).

use lexable::Location;

/// A conflict marker attached to one position in a `Seq` (spec.md 4.1
/// "conflict markers on the right-recursive production..."; 6 "`~name`
/// and `!name` conflict markers").
#[derive(Debug, Clone)]
pub struct ConflictMarker {
    pub name: String,
    pub level: i32,
    pub silenced: bool,
}

#[derive(Debug, Clone)]
pub enum Expression {
    Literal(String),
    AnyChar,
    CharSet(String),
    /// `id<args>`, possibly namespaced (`ns.id`).
    Reference {
        name: String,
        args: Vec<Expression>,
    },
    Seq(Vec<(Expression, Option<ConflictMarker>)>),
    Choice(Vec<Expression>),
    Star(Box<Expression>),
    Plus(Box<Expression>),
    Optional(Box<Expression>),
    Tagged {
        tag: String,
        body: Box<Expression>,
    },
    /// `@specialize<tok, "lit">` / `@extend<tok, "lit">`.
    Specialize {
        base: String,
        literal: String,
        is_extend: bool,
    },
    /// `nest.NAME<args>` — nested-grammar placeholder (out of scope to
    /// resolve; this crate only records the reference, per spec.md 6).
    Nested {
        name: String,
        args: Vec<Expression>,
        end_token: Box<Expression>,
    },
    /// Inline naming, `expr = name`.
    Named {
        name: String,
        body: Box<Expression>,
    },
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub params: Vec<String>,
    pub exported: bool,
    pub tag: Option<String>,
    pub body: Expression,
    pub defined_at: Location,
}

#[derive(Debug, Clone)]
pub struct PrecedenceGroup {
    pub associativity: crate::symbol::Associativity,
    pub names: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum TopLevelItem {
    Top(Expression),
    TokenRule(Rule),
    Precedence(PrecedenceGroup),
    ExternalTokens {
        name: String,
        source: String,
        ids: Vec<(String, Option<String>)>,
    },
    ExternalGrammar {
        name: String,
        alias: Option<String>,
        source: Option<String>,
    },
    Skip {
        expr: Expression,
        scoped_rules: Vec<Rule>,
    },
    TagDecl {
        name: String,
        tag: String,
    },
    ExportTag {
        name: String,
        tag: String,
    },
    Punctuation(String),
    DetectDelim,
    GrammarRule(Rule),
}

/// The full surface specification: an ordered list of top-level items,
/// the moral equivalent of what a grammar-file parser would hand to the
/// normalizer (spec.md 6).
#[derive(Debug, Clone, Default)]
pub struct Spec {
    pub items: Vec<TopLevelItem>,
}

impl Spec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: TopLevelItem) -> &mut Self {
        self.items.push(item);
        self
    }

    pub fn top(&self) -> Option<&Expression> {
        self.items.iter().find_map(|item| match item {
            TopLevelItem::Top(expr) => Some(expr),
            _ => None,
        })
    }

    pub fn token_rules(&self) -> impl Iterator<Item = &Rule> {
        self.items.iter().filter_map(|item| match item {
            TopLevelItem::TokenRule(rule) => Some(rule),
            _ => None,
        })
    }

    pub fn grammar_rules(&self) -> impl Iterator<Item = &Rule> {
        self.items.iter().filter_map(|item| match item {
            TopLevelItem::GrammarRule(rule) => Some(rule),
            _ => None,
        })
    }

    pub fn precedence_groups(&self) -> impl Iterator<Item = &PrecedenceGroup> {
        self.items.iter().filter_map(|item| match item {
            TopLevelItem::Precedence(group) => Some(group),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_finds_top_expression() {
        let mut spec = Spec::new();
        spec.push(TopLevelItem::Top(Expression::Literal("x".to_string())));
        assert!(matches!(spec.top(), Some(Expression::Literal(_))));
    }
}
