//! Wire formatting helpers.
//!
//! Strings are written in the cheapest form that round-trips: a bare atom,
//! a quoted string, or a literal for anything a quoted string cannot carry
//! (line breaks, 8-bit data).

use crate::parser::Field;

/// Returns true if `s` can be sent as a bare atom.
#[must_use]
pub fn is_atom(s: &str) -> bool {
    !s.is_empty()
        && !s.eq_ignore_ascii_case("NIL")
        && s.bytes().all(crate::parser::lexer::is_atom_char)
}

/// Returns true if `s` can be sent as a quoted string.
#[must_use]
pub fn is_quotable(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, 0x20..=0x7E))
}

/// Writes a quoted string, escaping `"` and `\`.
pub fn write_quoted(buf: &mut Vec<u8>, s: &str) {
    buf.push(b'"');
    for b in s.bytes() {
        if b == b'"' || b == b'\\' {
            buf.push(b'\\');
        }
        buf.push(b);
    }
    buf.push(b'"');
}

/// Writes a synchronizing literal.
pub fn write_literal(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(format!("{{{}}}\r\n", data.len()).as_bytes());
    buf.extend_from_slice(data);
}

/// Writes an astring (atom, quoted string, or literal).
pub fn write_astring(buf: &mut Vec<u8>, s: &str) {
    if is_atom(s) {
        buf.extend_from_slice(s.as_bytes());
    } else if is_quotable(s) {
        write_quoted(buf, s);
    } else {
        write_literal(buf, s.as_bytes());
    }
}

/// Writes one field.
pub fn write_field(buf: &mut Vec<u8>, field: &Field) {
    match field {
        Field::Atom(s) | Field::Text(s) => buf.extend_from_slice(s.as_bytes()),
        Field::Quoted(s) => write_quoted(buf, s),
        Field::Literal(data) => write_literal(buf, data),
        Field::Nil => buf.extend_from_slice(b"NIL"),
        Field::List(items) => {
            buf.push(b'(');
            write_fields(buf, items);
            buf.push(b')');
        }
    }
}

/// Writes space-separated fields.
pub fn write_fields(buf: &mut Vec<u8>, fields: &[Field]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        write_field(buf, field);
    }
}

/// Builds `* NAME fields...\r\n`.
#[must_use]
pub fn untagged_line(name: &str, fields: &[Field]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(b"* ");
    buf.extend_from_slice(name.as_bytes());
    if !fields.is_empty() {
        buf.push(b' ');
        write_fields(&mut buf, fields);
    }
    buf.extend_from_slice(b"\r\n");
    buf
}

/// Builds `* <number> NAME fields...\r\n` for message data such as EXPUNGE.
#[must_use]
pub fn message_data_line(number: u32, name: &str, fields: &[Field]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(format!("* {number} {name}").as_bytes());
    if !fields.is_empty() {
        buf.push(b' ');
        write_fields(&mut buf, fields);
    }
    buf.extend_from_slice(b"\r\n");
    buf
}
