// Copyright 2022 Bryant Luk
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Replaces character and entity references.

use std::borrow::Cow;

use crate::error::{MalformedInputError, MalformedKind};

/// Where the decoded value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Context {
    /// Character content: line endings become `\n`.
    Text,
    /// Attribute values: line endings and tabs become a space.
    AttributeValue,
}

impl Context {
    #[inline]
    const fn needs_work(self, byte: u8) -> bool {
        match self {
            Context::Text => matches!(byte, b'&' | b'\r'),
            Context::AttributeValue => matches!(byte, b'&' | b'\r' | b'\n' | b'\t'),
        }
    }

    #[inline]
    const fn line_break(self) -> char {
        match self {
            Context::Text => '\n',
            Context::AttributeValue => ' ',
        }
    }
}

/// Decodes `raw`, borrowing it when there is nothing to replace.
///
/// `offset` is the position of `raw` in the input and is only used for errors.
pub(super) fn decode(
    raw: &str,
    offset: usize,
    context: Context,
) -> Result<Cow<'_, str>, MalformedInputError> {
    check_chars(raw, offset)?;

    let bytes = raw.as_bytes();
    if !bytes.iter().any(|b| context.needs_work(*b)) {
        return Ok(Cow::Borrowed(raw));
    }

    let mut out = String::with_capacity(raw.len());
    let mut last = 0;
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'&' => {
                out.push_str(&raw[last..index]);
                let end = raw[index..]
                    .find(';')
                    .map(|len| index + len)
                    .ok_or_else(|| {
                        MalformedInputError::new(offset + index, MalformedKind::UnterminatedReference)
                    })?;
                let ch = resolve(&raw[index + 1..end])
                    .map_err(|kind| MalformedInputError::new(offset + index, kind))?;
                out.push(ch);
                index = end + 1;
                last = index;
                continue;
            }
            b'\r' => {
                out.push_str(&raw[last..index]);
                out.push(context.line_break());
                if bytes.get(index + 1) == Some(&b'\n') {
                    index += 1;
                }
            }
            b'\n' | b'\t' if context == Context::AttributeValue => {
                out.push_str(&raw[last..index]);
                out.push(' ');
            }
            _ => {
                index += 1;
                continue;
            }
        }

        index += 1;
        last = index;
    }
    out.push_str(&raw[last..]);

    Ok(Cow::Owned(out))
}

/// Replaces `\r\n` and lone `\r` with `\n` in content without references.
pub(super) fn normalize_line_endings(
    raw: &str,
    offset: usize,
) -> Result<Cow<'_, str>, MalformedInputError> {
    check_chars(raw, offset)?;

    if raw.contains('\r') {
        Ok(Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n")))
    } else {
        Ok(Cow::Borrowed(raw))
    }
}

/// Rejects literal characters which may not appear in a document.
fn check_chars(raw: &str, offset: usize) -> Result<(), MalformedInputError> {
    match raw.char_indices().find(|(_, ch)| !is_xml_char(*ch)) {
        Some((index, ch)) => Err(MalformedInputError::new(
            offset + index,
            MalformedKind::InvalidCharacter(ch),
        )),
        None => Ok(()),
    }
}

/// Resolves the name between `&` and `;`.
fn resolve(name: &str) -> Result<char, MalformedKind> {
    match name {
        "lt" => return Ok('<'),
        "gt" => return Ok('>'),
        "amp" => return Ok('&'),
        "quot" => return Ok('"'),
        "apos" => return Ok('\''),
        _ => {}
    }

    let Some(number) = name.strip_prefix('#') else {
        return Err(MalformedKind::UnknownEntity(name.to_string()));
    };

    let code_point = match number.strip_prefix('x') {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => number.parse::<u32>(),
    };

    code_point
        .ok()
        .filter(|_| !number.starts_with('+') && !number.starts_with("x+"))
        .and_then(char::from_u32)
        .filter(|ch| is_xml_char(*ch))
        .ok_or_else(|| MalformedKind::InvalidCharacterReference(name.to_string()))
}

#[inline]
#[must_use]
const fn is_xml_char(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn borrows_plain_values() {
        let decoded = decode("plain text", 0, Context::Text).unwrap();
        assert!(matches!(decoded, Cow::Borrowed("plain text")));

        let decoded = decode("a\nb", 0, Context::Text).unwrap();
        assert!(matches!(decoded, Cow::Borrowed("a\nb")));
    }

    #[test]
    fn predefined_entities() {
        let decoded = decode("&lt;b&gt; &amp; &quot;&apos;", 0, Context::Text).unwrap();
        assert_eq!(decoded, "<b> & \"'");
    }

    #[test]
    fn character_references() {
        let decoded = decode("&#65;&#x42;&#x1F600;", 0, Context::Text).unwrap();
        assert_eq!(decoded, "AB\u{1F600}");

        let decoded = decode("&#10;&#13;", 0, Context::AttributeValue).unwrap();
        assert_eq!(decoded, "\n\r");
    }

    #[test]
    fn line_endings() {
        assert_eq!(decode("a\r\nb\rc", 0, Context::Text).unwrap(), "a\nb\nc");
        assert_eq!(
            decode("a\r\nb\tc\nd", 0, Context::AttributeValue).unwrap(),
            "a b c d"
        );
    }

    #[test]
    fn normalizes_without_decoding() {
        assert_eq!(normalize_line_endings("a&amp;\r\nb\r", 0).unwrap(), "a&amp;\nb\n");
        assert!(matches!(
            normalize_line_endings("a\nb", 0).unwrap(),
            Cow::Borrowed("a\nb")
        ));
    }

    #[test]
    fn rejects_literal_invalid_characters() {
        let err = decode("ab\u{0}", 5, Context::Text).unwrap_err();
        assert_eq!(err.offset(), 7);
        assert_eq!(err.kind(), &MalformedKind::InvalidCharacter('\u{0}'));

        let err = decode("x\u{1b}[31m", 0, Context::AttributeValue).unwrap_err();
        assert_eq!(err.kind(), &MalformedKind::InvalidCharacter('\u{1b}'));

        let err = decode("\u{FFFE}", 0, Context::Text).unwrap_err();
        assert_eq!(err.kind(), &MalformedKind::InvalidCharacter('\u{FFFE}'));

        let err = normalize_line_endings("a\u{8}", 3).unwrap_err();
        assert_eq!(err.offset(), 4);

        assert_eq!(decode("\t\u{e9}\u{1F600}", 0, Context::Text).unwrap(), "\t\u{e9}\u{1F600}");
    }

    #[test]
    fn rejects_unknown_entities() {
        let err = decode("a &nbsp; b", 10, Context::Text).unwrap_err();
        assert_eq!(err.offset(), 12);
        assert_eq!(
            err.kind(),
            &MalformedKind::UnknownEntity("nbsp".to_string())
        );
    }

    #[test]
    fn rejects_bad_references() {
        let err = decode("&#0;", 0, Context::Text).unwrap_err();
        assert!(matches!(err.kind(), MalformedKind::InvalidCharacterReference(_)));

        let err = decode("&#xD800;", 0, Context::Text).unwrap_err();
        assert!(matches!(err.kind(), MalformedKind::InvalidCharacterReference(_)));

        let err = decode("&#+65;", 0, Context::Text).unwrap_err();
        assert!(matches!(err.kind(), MalformedKind::InvalidCharacterReference(_)));

        let err = decode("&#;", 0, Context::Text).unwrap_err();
        assert!(matches!(err.kind(), MalformedKind::InvalidCharacterReference(_)));

        let err = decode("AT&T", 0, Context::Text).unwrap_err();
        assert_eq!(err.kind(), &MalformedKind::UnterminatedReference);
    }
}
