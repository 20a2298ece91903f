// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>
//
// Warning/error sink (spec.md 5 "Shared resources": "warnings are routed
// through an injected function or a default logger"; spec.md 9 "Warning
// sink: a function-typed dependency, not a global"). Grounded on the
// teacher's `grammar.rs::report_error`/`report_warning` free functions,
// generalized from module-level statics into an injected closure so a
// caller embedding this crate can route diagnostics anywhere (a test
// harness collecting them into a `Vec`, a language server pushing LSP
// diagnostics, etc.) instead of always hitting stderr.

use std::fmt;
use std::io::{stderr, Write};

use lexable::Location;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub location: Option<Location>,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{}: {}", loc, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Fatal error with an optional source position (spec.md 6 "Diagnostics":
/// "`message (file line:col)` when positions are known").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalError {
    pub location: Option<Location>,
    pub message: String,
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{} ({})", self.message, loc),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for FatalError {}

fn default_sink(warning: &Warning) {
    writeln!(stderr(), "Warning: {}", warning).expect("stderr write failed");
}

/// A process-wide error collector is optional per spec.md 5; this is the
/// per-build version of it, held by `driver::build` for the duration of
/// one generator invocation and discarded afterwards.
pub struct Diagnostics {
    sink: Box<dyn FnMut(&Warning)>,
    warnings: Vec<Warning>,
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("warnings", &self.warnings)
            .finish()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(default_sink)
    }
}

impl Diagnostics {
    pub fn new(sink: impl FnMut(&Warning) + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            warnings: Vec::new(),
        }
    }

    /// Build a `Diagnostics` that accumulates warnings silently instead
    /// of printing, for callers (tests, editors) that want to inspect
    /// them rather than have them routed to stderr.
    pub fn collecting() -> Self {
        Self::new(|_| {})
    }

    pub fn warn(&mut self, location: Option<Location>, message: impl Into<String>) {
        let warning = Warning {
            location,
            message: message.into(),
        };
        (self.sink)(&warning);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn collecting_sink_records_without_printing() {
        let mut diagnostics = Diagnostics::collecting();
        diagnostics.warn(None, "unused rule \"foo\"");
        assert_eq!(diagnostics.warning_count(), 1);
        assert_eq!(diagnostics.warnings()[0].message, "unused rule \"foo\"");
    }

    #[test]
    fn custom_sink_is_invoked() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let mut diagnostics = Diagnostics::new(move |w: &Warning| {
            seen_clone.borrow_mut().push(w.message.clone());
        });
        diagnostics.warn(None, "precedence for unknown token \"xyz\"");
        assert_eq!(seen.borrow().as_slice(), ["precedence for unknown token \"xyz\""]);
    }
}
