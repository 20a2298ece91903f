// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>
//
// Grammar normalizer (spec.md 4.1): expand the surface expression tree
// into a flat rule list, then inline and merge to fixpoint.

pub mod expand;
pub mod inline;
pub mod merge;

use crate::ast::Spec;
use crate::diagnostics::Diagnostics;
use crate::rule::Rule;
use crate::symbol::SymbolTable;
use std::fmt;

#[derive(Debug)]
pub enum Error {
    Expand(expand::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Expand(e) => write!(f, "{}", e),
        }
    }
}

impl From<expand::Error> for Error {
    fn from(e: expand::Error) -> Self {
        Error::Expand(e)
    }
}

/// Run the three normalization passes to fixpoint, in order: expand,
/// inline, merge (spec.md 4.1: "Runs after inlining, to fixpoint").
pub fn normalize(
    spec: &Spec,
    symbols: &mut SymbolTable,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Rule>, Error> {
    let rules = expand::expand(spec, symbols, diagnostics)?;
    let rules = inline::inline_to_fixpoint(rules);
    let rules = merge::merge_to_fixpoint(rules);
    Ok(rules)
}
