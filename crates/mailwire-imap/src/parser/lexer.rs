//! IMAP lexer for tokenizing response lines.
//!
//! Breaks one framed response (line plus any literals) into the tokens of the
//! RFC 3501 grammar that named responses are built from.

#![allow(clippy::missing_errors_doc)]

use crate::{Error, Result};

/// Token types produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom, including digit-only atoms and `BODY[...]`-style sections.
    Atom(&'a str),
    /// Quoted string with escapes resolved.
    Quoted(String),
    /// Literal data following a `{n}` prefix.
    Literal(Vec<u8>),
    /// NIL.
    Nil,
    /// Opening parenthesis.
    LParen,
    /// Closing parenthesis.
    RParen,
    /// Asterisk (untagged response prefix).
    Asterisk,
    /// Plus (continuation response prefix).
    Plus,
    /// Space character.
    Space,
    /// CRLF line ending.
    Crlf,
    /// End of input.
    Eof,
}

/// IMAP lexer state.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Returns the current position in the input.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns true if at end of input.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Peeks at the current byte without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Returns the rest of the line, without the trailing CRLF, and consumes it.
    pub fn rest_of_line(&mut self) -> &'a str {
        let rest = &self.input[self.pos..];
        let end = rest
            .windows(2)
            .position(|w| w == b"\r\n")
            .unwrap_or(rest.len());
        self.pos += end;
        std::str::from_utf8(&rest[..end]).unwrap_or_default()
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        let token = match byte {
            b'\r' => {
                if self.input.get(self.pos + 1) != Some(&b'\n') {
                    return Err(self.error("Expected LF after CR"));
                }
                self.pos += 2;
                Token::Crlf
            }
            b' ' => self.single(Token::Space),
            b'(' => self.single(Token::LParen),
            b')' => self.single(Token::RParen),
            b'*' => self.single(Token::Asterisk),
            b'+' => self.single(Token::Plus),
            b'"' => self.read_quoted()?,
            b'{' => self.read_literal()?,
            _ if is_atom_char(byte) => self.read_atom()?,
            _ => return Err(self.error(&format!("Unexpected character: {byte:#04x}"))),
        };

        Ok(token)
    }

    /// Expects and consumes a space.
    pub fn expect_space(&mut self) -> Result<()> {
        match self.next_token()? {
            Token::Space => Ok(()),
            token => Err(self.error(&format!("Expected space, got {token:?}"))),
        }
    }

    fn single(&mut self, token: Token<'a>) -> Token<'a> {
        self.pos += 1;
        token
    }

    fn read_quoted(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let mut out = Vec::new();

        loop {
            let Some(b) = self.peek() else {
                return Err(self.error("Unexpected EOF in quoted string"));
            };
            self.pos += 1;
            match b {
                b'"' => break,
                b'\\' => match self.peek() {
                    Some(escaped @ (b'"' | b'\\')) => {
                        self.pos += 1;
                        out.push(escaped);
                    }
                    Some(c) => return Err(self.error(&format!("Invalid escape: \\{}", c as char))),
                    None => return Err(self.error("Unexpected EOF in quoted string")),
                },
                b'\r' | b'\n' => return Err(self.error("Line break in quoted string")),
                _ => out.push(b),
            }
        }

        String::from_utf8(out)
            .map(Token::Quoted)
            .map_err(|_| self.error("Invalid UTF-8 in quoted string"))
    }

    /// Reads `{n}CRLF` (or the LITERAL+ form `{n+}CRLF`) and the `n` bytes after it.
    fn read_literal(&mut self) -> Result<Token<'a>> {
        let close = self.input[self.pos..]
            .iter()
            .position(|&b| b == b'}')
            .ok_or_else(|| self.error("Unterminated literal size"))?;
        let header = &self.input[self.pos + 1..self.pos + close];
        let digits = header.strip_suffix(b"+").unwrap_or(header);
        let size: usize = std::str::from_utf8(digits)
            .ok()
            .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("Invalid literal size"))?;
        self.pos += close + 1;

        if !self.input[self.pos..].starts_with(b"\r\n") {
            return Err(self.error("Expected CRLF after literal size"));
        }
        self.pos += 2;

        let data = self
            .input
            .get(self.pos..self.pos + size)
            .ok_or_else(|| self.error("Incomplete literal data"))?
            .to_vec();
        self.pos += size;

        Ok(Token::Literal(data))
    }

    /// Reads an atom. A `[` inside an atom opens a section that runs to the
    /// matching `]`, so `BODY[HEADER.FIELDS (DATE)]` stays one token.
    fn read_atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;

        while let Some(b) = self.peek() {
            if is_atom_char(b) {
                self.pos += 1;
            } else if b == b'[' {
                let close = self.input[self.pos..]
                    .iter()
                    .position(|&b| b == b']')
                    .ok_or_else(|| self.error("Unterminated section in atom"))?;
                self.pos += close + 1;
            } else {
                break;
            }
        }

        let s = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("Invalid UTF-8 in atom"))?;

        if s.eq_ignore_ascii_case("NIL") {
            Ok(Token::Nil)
        } else {
            Ok(Token::Atom(s))
        }
    }

    /// Creates a parse error at the current position.
    fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }
}

/// Returns true if the byte may appear in an atom.
///
/// `\` is accepted so that flags and mailbox attributes such as `\Seen` lex
/// as single atoms. `[` and `]` are handled by the section rule instead.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    matches!(b, 0x21..=0x7E)
        && !matches!(b, b'(' | b')' | b'{' | b'"' | b'%' | b'*' | b'[' | b']')
}
