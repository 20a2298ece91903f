// `std.asciiLetter`, `std.digit`, `std.whitespace`, etc. — spec.md 4.4
// "Built-ins". Static tables, following the teacher's `lazy_static!`
// static-table idiom (grammar.rs's `AALEXAN`).

use crate::charset::CharSet;
use lazy_static::lazy_static;

lazy_static! {
    pub static ref ASCII_LETTER: CharSet = CharSet::empty()
        .add_range('a', 'z')
        .add_range('A', 'Z');
    pub static ref DIGIT: CharSet = CharSet::empty().add_range('0', '9');
    pub static ref ASCII_LETTER_OR_DIGIT: CharSet =
        CharSet::union(&ASCII_LETTER, &DIGIT);
    pub static ref WHITESPACE: CharSet = CharSet::empty()
        .add_char(' ')
        .add_char('\t')
        .add_char('\n')
        .add_char('\r')
        .add_char('\u{0b}')
        .add_char('\u{0c}');
    pub static ref HEX_DIGIT: CharSet = CharSet::union(&DIGIT, &CharSet::empty().add_range('a', 'f').add_range('A', 'F'));
}

/// Resolve a dotted `std.*` built-in name to its character set.
pub fn lookup(name: &str) -> Option<CharSet> {
    match name {
        "asciiLetter" => Some(ASCII_LETTER.clone()),
        "digit" => Some(DIGIT.clone()),
        "asciiLetterOrDigit" => Some(ASCII_LETTER_OR_DIGIT.clone()),
        "whitespace" => Some(WHITESPACE.clone()),
        "hexDigit" => Some(HEX_DIGIT.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_builtins() {
        assert!(lookup("digit").unwrap().contains('5'));
        assert!(!lookup("digit").unwrap().contains('a'));
        assert!(lookup("whitespace").unwrap().contains(' '));
        assert!(lookup("nope").is_none());
    }
}
