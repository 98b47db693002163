//! Move-by-marker expressions.
//!
//! A line containing the configured prefix (default `&%&%`) followed by one of
//!
//! ```text
//! moveThisFileTo('../other/dir')
//! moveThisFolderTo("../elsewhere")
//! undoLastMove()
//! ```
//!
//! is a request to move the file (or its folder). The call is scanned, never
//! evaluated; anything that is not exactly one of these calls is rejected.

use std::ops::Range;

use crate::error::{RefactorError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerCommand {
    MoveFileTo(String),
    MoveFolderTo(String),
    UndoLastMove,
}

impl MarkerCommand {
    pub fn description(&self) -> String {
        match self {
            MarkerCommand::MoveFileTo(dest) => format!("Move this file to {}", dest),
            MarkerCommand::MoveFolderTo(dest) => format!("Move this folder to {}", dest),
            MarkerCommand::UndoLastMove => "Undo last move".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub command: MarkerCommand,
    /// Zero-based line of the marker.
    pub line: usize,
    /// Byte range of the whole line, newline included.
    pub line_range: Range<usize>,
}

/// The first marker line in `text`. A prefixed line whose call does not parse
/// is an error, not a silent miss.
pub fn find_marker(text: &str, prefix: &str) -> Result<Option<Marker>> {
    let mut offset = 0;
    for (line_no, line) in text.split_inclusive('\n').enumerate() {
        let start = offset;
        offset += line.len();
        let Some(at) = line.find(prefix) else {
            continue;
        };
        let call = line[at + prefix.len()..].trim_end_matches(['\n', '\r']);
        let command = parse_command(call)?;
        return Ok(Some(Marker {
            command,
            line: line_no,
            line_range: start..offset,
        }));
    }
    Ok(None)
}

fn invalid(call: &str, reason: &str) -> RefactorError {
    RefactorError::InvalidConfiguration(format!("marker `{}`: {}", call.trim(), reason))
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn skip_whitespace(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn identifier(&mut self) -> &'a str {
        let rest = &self.src[self.pos..];
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
            .unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn eat(&mut self, c: char) -> bool {
        if self.src[self.pos..].starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    /// A single- or double-quoted literal; `\` escapes the next character.
    fn string_literal(&mut self) -> Option<String> {
        let rest = &self.src[self.pos..];
        let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
        let mut out = String::new();
        let mut chars = rest.char_indices().skip(1);
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => out.push(chars.next()?.1),
                c if c == quote => {
                    self.pos += i + c.len_utf8();
                    return Some(out);
                }
                c => out.push(c),
            }
        }
        None
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }
}

/// Parses the call that follows the prefix.
pub fn parse_command(call: &str) -> Result<MarkerCommand> {
    let mut scanner = Scanner { src: call, pos: 0 };
    scanner.skip_whitespace();
    let name = scanner.identifier();
    scanner.skip_whitespace();
    if !scanner.eat('(') {
        return Err(invalid(call, "expected `(`"));
    }
    scanner.skip_whitespace();
    let argument = if scanner.rest().starts_with(['\'', '"']) {
        Some(
            scanner
                .string_literal()
                .ok_or_else(|| invalid(call, "unterminated string"))?,
        )
    } else {
        None
    };
    scanner.skip_whitespace();
    if !scanner.eat(')') {
        return Err(invalid(call, "expected `)`"));
    }
    scanner.eat(';');
    let trailing = scanner.rest().trim();
    if !(trailing.is_empty() || trailing == "*/") {
        return Err(invalid(call, "unexpected text after call"));
    }

    match (name, argument) {
        ("moveThisFileTo", Some(dest)) if !dest.is_empty() => Ok(MarkerCommand::MoveFileTo(dest)),
        ("moveThisFolderTo", Some(dest)) if !dest.is_empty() => Ok(MarkerCommand::MoveFolderTo(dest)),
        ("undoLastMove", None) => Ok(MarkerCommand::UndoLastMove),
        ("moveThisFileTo" | "moveThisFolderTo", _) => Err(invalid(call, "expected a non-empty path argument")),
        ("undoLastMove", Some(_)) => Err(invalid(call, "undoLastMove takes no argument")),
        (other, _) => Err(invalid(call, &format!("unknown command `{}`", other))),
    }
}
