//! Named untagged responses.
//!
//! Every untagged data response has the shape `* NAME field field ...` (or
//! `* <n> NAME ...` for message data). [`NamedResponse`] captures that shape
//! without interpreting the fields, so response handlers can claim lines by
//! name and decode only the ones they own.

use crate::parser::lexer::{Lexer, Token};
use crate::{Error, Result};

/// Untagged responses whose remainder is free-form response text.
const STATUS_NAMES: [&str; 5] = ["OK", "NO", "BAD", "BYE", "PREAUTH"];

/// An untyped response field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// Atom, including numbers and flags.
    Atom(String),
    /// Quoted string.
    Quoted(String),
    /// Literal data.
    Literal(Vec<u8>),
    /// NIL.
    Nil,
    /// Parenthesised list.
    List(Vec<Field>),
    /// Free-form response text (status responses only).
    Text(String),
}

impl Field {
    /// Creates a string field, choosing the cheapest wire form that can
    /// carry `s`: atom, quoted string, or literal.
    #[must_use]
    pub fn astring(s: impl Into<String>) -> Self {
        let s = s.into();
        if crate::format::is_atom(&s) {
            Self::Atom(s)
        } else if crate::format::is_quotable(&s) {
            Self::Quoted(s)
        } else {
            Self::Literal(s.into_bytes())
        }
    }

    /// Returns the atom text, if this field is an atom.
    #[must_use]
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Self::Atom(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the string value of an atom, quoted string or UTF-8 literal.
    #[must_use]
    pub fn as_astring(&self) -> Option<&str> {
        match self {
            Self::Atom(s) | Self::Quoted(s) => Some(s),
            Self::Literal(data) => std::str::from_utf8(data).ok(),
            _ => None,
        }
    }

    /// Returns the numeric value of an all-digit atom.
    #[must_use]
    pub fn as_number(&self) -> Option<u32> {
        self.as_atom()
            .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse().ok())
    }

    /// Returns the items of a parenthesised list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns `true` for NIL.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }
}

/// An untagged response split into its name and fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedResponse {
    name: String,
    fields: Vec<Field>,
    numbered: bool,
}

impl NamedResponse {
    /// Creates a response from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
            numbered: false,
        }
    }

    /// Creates message data (`* <number> NAME ...`); the number becomes the
    /// first field.
    #[must_use]
    pub fn message_data(number: u32, name: impl Into<String>, mut fields: Vec<Field>) -> Self {
        fields.insert(0, Field::Atom(number.to_string()));
        Self {
            name: name.into(),
            fields,
            numbered: true,
        }
    }

    /// Parses one framed untagged response.
    ///
    /// `* 12 EXISTS` becomes name `EXISTS` with the number as first field.
    /// Status responses (`* OK [ALERT] text`) carry their response text as a
    /// single [`Field::Text`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the line is not a well-formed untagged
    /// response.
    pub fn parse(line: &[u8]) -> Result<Self> {
        let mut lexer = Lexer::new(line);

        match lexer.next_token()? {
            Token::Asterisk => {}
            token => {
                return Err(Error::Parse {
                    position: 0,
                    message: format!("Expected untagged response, got {token:?}"),
                });
            }
        }
        lexer.expect_space()?;

        let first = match lexer.next_token()? {
            Token::Atom(s) => s,
            token => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("Expected response name, got {token:?}"),
                });
            }
        };

        let mut fields = Vec::new();
        let numbered = first.bytes().all(|b| b.is_ascii_digit());
        let name = if numbered {
            lexer.expect_space()?;
            let keyword = match lexer.next_token()? {
                Token::Atom(s) => s,
                token => {
                    return Err(Error::Parse {
                        position: lexer.position(),
                        message: format!("Expected message data keyword, got {token:?}"),
                    });
                }
            };
            fields.push(Field::Atom(first.to_string()));
            keyword
        } else {
            first
        };

        if STATUS_NAMES.iter().any(|s| s.eq_ignore_ascii_case(name)) {
            if lexer.peek() == Some(b' ') {
                lexer.expect_space()?;
            }
            fields.push(Field::Text(lexer.rest_of_line().to_string()));
            expect_end(&mut lexer)?;
        } else {
            parse_fields(&mut lexer, &mut fields, false)?;
        }

        Ok(Self {
            name: name.to_string(),
            fields,
            numbered,
        })
    }

    /// Returns the response name as sent.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the response is called `name` (ASCII case-insensitive).
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Returns the fields after the name.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Splits the response into name and fields.
    #[must_use]
    pub fn into_parts(self) -> (String, Vec<Field>) {
        (self.name, self.fields)
    }

    /// Serializes the response as one untagged wire line.
    #[must_use]
    pub fn to_line(&self) -> Vec<u8> {
        match self.fields.split_first() {
            Some((first, rest)) if self.numbered => match first.as_number() {
                Some(n) => crate::format::message_data_line(n, &self.name, rest),
                None => crate::format::untagged_line(&self.name, &self.fields),
            },
            _ => crate::format::untagged_line(&self.name, &self.fields),
        }
    }
}

/// Parses space-separated fields up to CRLF, or up to `)` when `nested`.
fn parse_fields(lexer: &mut Lexer<'_>, out: &mut Vec<Field>, nested: bool) -> Result<()> {
    loop {
        let field = match lexer.next_token()? {
            Token::Space => continue,
            Token::Atom(s) => Field::Atom(s.to_string()),
            Token::Quoted(s) => Field::Quoted(s),
            Token::Literal(data) => Field::Literal(data),
            Token::Nil => Field::Nil,
            Token::LParen => {
                let mut items = Vec::new();
                parse_fields(lexer, &mut items, true)?;
                Field::List(items)
            }
            Token::RParen if nested => return Ok(()),
            Token::Crlf | Token::Eof if !nested => return expect_end_after(lexer),
            token => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("Unexpected token in response fields: {token:?}"),
                });
            }
        };
        out.push(field);
    }
}

fn expect_end(lexer: &mut Lexer<'_>) -> Result<()> {
    match lexer.next_token()? {
        Token::Crlf | Token::Eof => expect_end_after(lexer),
        token => Err(Error::Parse {
            position: lexer.position(),
            message: format!("Expected end of line, got {token:?}"),
        }),
    }
}

fn expect_end_after(lexer: &Lexer<'_>) -> Result<()> {
    if lexer.is_eof() {
        Ok(())
    } else {
        Err(Error::Parse {
            position: lexer.position(),
            message: "Trailing data after end of response".to_string(),
        })
    }
}
