// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>
//
//! LR(1)/LALR table generation: the term/rule model, grammar normalizer,
//! canonical LR(1) automaton builder, LALR collapser, and the flat-array
//! table packer that turns all of it into the numeric arrays a runtime
//! parser loads (spec.md 2 "System overview"). The tokenizer NFA/DFA and
//! token-group partitioner this crate drives live in the sibling
//! `lexable` crate.

pub mod ast;
pub mod diagnostics;
pub mod driver;
pub mod lalr;
pub mod lr1;
pub mod normalize;
pub mod pack;
pub mod rule;
pub mod symbol;

pub use diagnostics::Diagnostics;
pub use driver::{build, Error, GeneratedArtifact, TokenizerInput};
