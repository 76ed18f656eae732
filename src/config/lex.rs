//! Tokenizer internals for the configuration file format
// (c) 2025 Ross Younger

use anyhow::{bail, Result};

/// Longest token we will accept, in bytes. Exceeding it is a parse error,
/// not a crash; real configuration tokens are nowhere near this long.
pub(super) const MAX_TOKEN_LEN: usize = 4096;

/// Character-level scanner over a configuration source.
///
/// We need to index over the characters of the input, but also need to be
/// able to peek at the next one without consuming it (token terminators are
/// left in place for the parser to act on). Tracks the current 1-based line
/// number so errors and committed entries can name it.
#[derive(Debug)]
pub(super) struct Scanner {
    input: Vec<char>,
    pos: usize,
    line: usize,
}

impl Scanner {
    pub(super) fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    /// Current 1-based line number
    pub(super) fn line(&self) -> usize {
        self.line
    }

    /// Looks at the next character without consuming it
    pub(super) fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    /// Consumes and returns the next character, counting lines
    pub(super) fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    /// Consumes the next character only if it is exactly `wanted`
    pub(super) fn eat(&mut self, wanted: char) -> bool {
        if self.peek() == Some(wanted) {
            let _ = self.advance();
            true
        } else {
            false
        }
    }

    /// Advances over whitespace, returning the first non-whitespace
    /// character (unconsumed), or None at end of input.
    pub(super) fn skip_whitespace(&mut self) -> Option<char> {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    let _ = self.advance();
                }
                other => return other,
            }
        }
    }

    /// Consumes the remainder of the current line, newline included.
    /// This is how `#` comments are discarded.
    pub(super) fn skip_line(&mut self) {
        while let Some(c) = self.advance() {
            if c == '\n' {
                break;
            }
        }
    }

    /// Reads a quoted token; the caller has already consumed the opening `"`.
    ///
    /// Backslash escapes the following character, whatever it is. A bare
    /// newline is legal inside the quotes and bumps the line count.
    pub(super) fn read_quoted(&mut self) -> Result<String> {
        let start_line = self.line;
        let mut token = String::new();
        loop {
            let Some(ch) = self.advance() else {
                bail!("end of file looking for closing '\"' (opened at line {start_line})");
            };
            match ch {
                '"' => return Ok(token),
                '\\' => self.push_escaped(&mut token)?,
                c => self.push_capped(&mut token, c)?,
            }
        }
    }

    /// Reads an unquoted token starting at the current position.
    ///
    /// Terminates (without consuming) at whitespace, `;`, or a structural
    /// character; the same escape rules as quoted tokens apply. Running out
    /// of input mid-token is an error, so a source must end its final token
    /// with a terminator (a trailing newline suffices).
    pub(super) fn read_unquoted(&mut self) -> Result<String> {
        let mut token = String::new();
        loop {
            let Some(ch) = self.peek() else {
                bail!("unexpected end of file at line {}", self.line);
            };
            if is_boundary(ch) {
                return Ok(token);
            }
            let _ = self.advance();
            if ch == '\\' {
                self.push_escaped(&mut token)?;
            } else {
                self.push_capped(&mut token, ch)?;
            }
        }
    }

    // A backslash at end of input stands for itself. An escaped newline is
    // embedded without bumping the line count.
    fn push_escaped(&mut self, token: &mut String) -> Result<()> {
        let ch = match self.input.get(self.pos) {
            Some(c) => {
                let c = *c;
                self.pos += 1;
                c
            }
            None => '\\',
        };
        self.push_capped(token, ch)
    }

    fn push_capped(&self, token: &mut String, ch: char) -> Result<()> {
        anyhow::ensure!(
            token.len() < MAX_TOKEN_LEN,
            "token exceeds {MAX_TOKEN_LEN} bytes at line {}",
            self.line
        );
        token.push(ch);
        Ok(())
    }
}

/// Characters that end an unquoted token
pub(super) fn is_boundary(ch: char) -> bool {
    ch.is_ascii_whitespace() || matches!(ch, ';' | '{' | '}' | '"' | '=' | '#')
}

///////////////////////////////////////////////////////////////////////////////////////
