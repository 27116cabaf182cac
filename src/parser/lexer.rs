//! G-code Scanner
//!
//! Turns one raw line into `(letter, number literal)` pairs.
//! Comments and whitespace are dropped and the remainder is lowercased
//! before matching, so `G1 X10 ; move` and `g1x10` scan identically.

use regex::Regex;
use std::sync::LazyLock;

/// Letters that start a new instruction unit.
pub const COMMAND_LETTERS: &[char] = &['g', 'm', 't', 'n', 'd'];

/// Letters that can only follow a command letter.
pub const PARAMETER_LETTERS: &[char] = &['x', 'y', 'z', 'i', 'j', 'e', 'f', 'h', 'r', 's'];

// Parenthesized comments, semicolon comments and whitespace
static INSIGNIFICANT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)|;.*|\s+").expect("valid comment pattern"));

// Capture groups: 1 - letter, 2 - optional signed decimal literal
static FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([-+]?[0-9]*\.?[0-9]*)").expect("valid field pattern"));

/// Classification of a token by its letter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Command like "g1", "m104"
    Command,
    /// Parameter like "x10", "s200"
    Parameter,
    /// Any other letter
    Unrecognized,
}

/// A single G-code field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub letter: char,
    /// Number literal as written, `None` when the letter stands alone
    pub literal: Option<String>,
}

impl Token {
    pub fn new(letter: char, literal: Option<&str>) -> Self {
        Self {
            letter,
            literal: literal.map(str::to_string),
        }
    }

    pub fn kind(&self) -> TokenKind {
        if is_command_letter(self.letter) {
            TokenKind::Command
        } else if is_parameter_letter(self.letter) {
            TokenKind::Parameter
        } else {
            TokenKind::Unrecognized
        }
    }

    /// Literal text, empty when absent.
    pub fn literal_str(&self) -> &str {
        self.literal.as_deref().unwrap_or("")
    }
}

/// Tokenize a line of G-code.
///
/// Empty and comment-only lines produce no tokens. Characters that cannot
/// start a field (stray digits, checksums) are ignored; malformed literals
/// such as a lone `-` are kept verbatim and rejected during command
/// construction.
pub fn tokenize_line(line: &str) -> Vec<Token> {
    let sanitized = sanitize(line);

    FIELD
        .captures_iter(&sanitized)
        .filter_map(|caps| {
            let letter = caps.get(1)?.as_str().chars().next()?;
            let literal = caps.get(2).map(|m| m.as_str()).filter(|s| !s.is_empty());
            Some(Token::new(letter, literal))
        })
        .collect()
}

/// Strip comments and whitespace and lowercase the rest.
fn sanitize(line: &str) -> String {
    INSIGNIFICANT.replace_all(line, "").to_lowercase()
}

pub fn is_command_letter(letter: char) -> bool {
    COMMAND_LETTERS.contains(&letter)
}

pub fn is_parameter_letter(letter: char) -> bool {
    PARAMETER_LETTERS.contains(&letter)
}
