// Copyright 2021 Peter Williams <pwil3058@gmail.com> <pwil3058@bigpond.net.au>
//
// Dotted tag labels used to label output tree nodes, e.g.
// `variable.name.delim="( )"` (spec.md 3, 6 "@tags").

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Default)]
struct TagData {
    segments: Vec<String>,
    delim: RefCell<Option<(char, char)>>,
}

#[derive(Debug, Clone)]
pub struct Tag(Rc<TagData>);

impl Tag {
    pub fn new(dotted: &str) -> Self {
        let segments = dotted.split('.').map(|s| s.to_string()).collect();
        Tag(Rc::new(TagData {
            segments,
            delim: RefCell::new(None),
        }))
    }

    pub fn name(&self) -> String {
        self.0.segments.join(".")
    }

    pub fn segments(&self) -> &[String] {
        &self.0.segments
    }

    pub fn delim(&self) -> Option<(char, char)> {
        *self.0.delim.borrow()
    }

    /// Detect-delim post-pass (spec.md GLOSSARY "Detect-delim"): when a
    /// tagged sequence's first and last terms are matching bracket
    /// literals, attach `delim="( )"`-style metadata.
    pub fn set_delim(&self, open: char, close: char) {
        *self.0.delim.borrow_mut() = Some((open, close));
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.0.segments == other.0.segments
    }
}

impl Eq for Tag {}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())?;
        if let Some((open, close)) = self.delim() {
            write!(f, " delim=\"{} {}\"", open, close)?;
        }
        Ok(())
    }
}

pub const STANDARD_PUNCTUATION_TAGS: &[(char, &str)] = &[
    ('(', "lparen"),
    (')', "rparen"),
    ('[', "lbracket"),
    (']', "rbracket"),
    ('{', "lbrace"),
    ('}', "rbrace"),
    ('<', "langle"),
    ('>', "rangle"),
];

/// Open/close pairs recognized by the detect-delim post-pass (spec.md
/// GLOSSARY "Detect-delim").
pub const BRACKET_PAIRS: &[(char, char)] = &[('(', ')'), ('[', ']'), ('{', '}'), ('<', '>')];

/// If `open` is a known opening bracket, its matching close.
pub fn matching_close(open: char) -> Option<char> {
    BRACKET_PAIRS
        .iter()
        .find(|(o, _)| *o == open)
        .map(|(_, c)| *c)
}

/// `@punctuation "()[]"` (spec.md 4.1): declare a standard tag label for
/// each listed punctuation character, paired as open/close by position.
pub fn punctuation_tags(chars: &str) -> Vec<(char, Tag)> {
    chars
        .chars()
        .map(|ch| {
            let name = STANDARD_PUNCTUATION_TAGS
                .iter()
                .find(|(c, _)| *c == ch)
                .map(|(_, name)| *name)
                .unwrap_or("punct");
            (ch, Tag::new(name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_segments_split() {
        let tag = Tag::new("variable.name");
        assert_eq!(tag.segments(), &["variable".to_string(), "name".to_string()]);
    }

    #[test]
    fn delim_renders_in_display() {
        let tag = Tag::new("call");
        tag.set_delim('(', ')');
        assert_eq!(tag.to_string(), "call delim=\"( )\"");
    }

    #[test]
    fn punctuation_maps_known_brackets() {
        let tags = punctuation_tags("()");
        assert_eq!(tags[0].1.name(), "lparen");
        assert_eq!(tags[1].1.name(), "rparen");
    }
}
