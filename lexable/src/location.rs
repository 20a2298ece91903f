// Source position tracking, in the shape of the teacher's `lexan::Location`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    label: String,
    line: usize,
    column: usize,
}

impl Location {
    pub fn new(label: &str, line: usize, column: usize) -> Self {
        Self {
            label: label.to_string(),
            line,
            column,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    /// Advance past `text`, tracking newlines, to derive the location that
    /// follows a matched lexeme.
    pub fn advanced_by(&self, text: &str) -> Self {
        let mut line = self.line;
        let mut column = self.column;
        for ch in text.chars() {
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Self {
            label: self.label.clone(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.label.is_empty() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "{} {}:{}", self.label, self.line, self.column)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_across_newlines() {
        let start = Location::new("g.grammar", 1, 1);
        let end = start.advanced_by("ab\ncd");
        assert_eq!(end.line(), 2);
        assert_eq!(end.column(), 3);
    }

    #[test]
    fn display_includes_label() {
        let loc = Location::new("g.grammar", 4, 9);
        assert_eq!(loc.to_string(), "g.grammar 4:9");
    }
}
