// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>

pub mod automaton;

pub use automaton::{Action, Automaton, Error, State};
