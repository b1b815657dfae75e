// Copyright 2022 Bryant Luk
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Scans byte sequences for the extent of the next token.

use crate::bytes::QuoteState;

/// The kind of markup found by [`scan()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Markup {
    /// `<name ...>` or `<name .../>`
    StartOrEmptyTag,
    /// `</name>`
    EndTag,
    /// `<?target ...?>`
    ProcessingInstruction,
    /// `<!DOCTYPE ...>`
    Declaration,
    /// `<!-- ... -->`
    Comment,
    /// `<![CDATA[ ... ]]>`
    Cdata,
    /// Character content up to the next `<`.
    Text,
}

/// Find the next `>` while being aware of quoted text.
#[inline]
#[must_use]
const fn find_close_tag_char_with_quotes(input: &[u8], offset: usize) -> Option<usize> {
    let mut quote_state = QuoteState::None;
    let mut index = offset;
    loop {
        if input.len() <= index {
            return None;
        }

        let byte = input[index];
        if byte == b'>' && matches!(quote_state, QuoteState::None) {
            return Some(index + 1);
        }
        quote_state = quote_state.advance(byte);

        index += 1;
    }
}

/// Find the next `>` while being aware of quoted text and the number of bracket delimiters used.
#[inline]
#[must_use]
const fn find_close_tag_char_with_brackets_and_quotes(
    input: &[u8],
    offset: usize,
) -> Option<usize> {
    let mut bracket_cnt = 0;
    let mut quote_state = QuoteState::None;

    let mut index = offset;
    loop {
        if input.len() <= index {
            return None;
        }

        let byte = input[index];

        if matches!(quote_state, QuoteState::None) {
            match byte {
                b'[' => bracket_cnt += 1,
                b']' => {
                    if bracket_cnt > 0 {
                        bracket_cnt -= 1;
                    }
                }
                b'>' => {
                    if bracket_cnt == 0 {
                        return Some(index + 1);
                    }
                }
                _ => {}
            }
        }
        quote_state = quote_state.advance(byte);

        index += 1;
    }
}

/// Find the end of the first occurrence of a 3 byte terminator at or after `offset`.
#[inline]
#[must_use]
const fn find_terminator(input: &[u8], offset: usize, terminator: &[u8; 3]) -> Option<usize> {
    let mut index = offset + 2;
    loop {
        if input.len() <= index {
            return None;
        }

        if input[index] == terminator[2]
            && input[index - 1] == terminator[1]
            && input[index - 2] == terminator[0]
        {
            return Some(index + 1);
        }

        index += 1;
    }
}

#[inline]
#[must_use]
const fn scan_text_content(input: &[u8], pos: usize) -> usize {
    debug_assert!(pos < input.len());
    debug_assert!(input[pos] != b'<');

    let mut index = pos + 1;
    loop {
        if index == input.len() || input[index] == b'<' {
            return index;
        }

        index += 1;
    }
}

#[inline]
#[must_use]
const fn scan_markup(input: &[u8], pos: usize) -> Option<(Markup, usize)> {
    debug_assert!(pos < input.len());
    debug_assert!(input[pos] == b'<');

    let peek = pos + 1;
    if input.len() <= peek {
        return None;
    }

    match input[peek] {
        // Skip the head '</'
        b'/' => match find_close_tag_char_with_quotes(input, pos + 2) {
            Some(end) => Some((Markup::EndTag, end)),
            None => None,
        },
        // At the minimum, it must be `<??>`. It cannot be `<?>`.
        b'?' => match find_pi_end(input, pos + 3) {
            Some(end) => Some((Markup::ProcessingInstruction, end)),
            None => None,
        },
        b'!' => scan_declaration_comment_or_cdata(input, pos),
        // Skip the head '<'
        _ => match find_close_tag_char_with_quotes(input, pos + 1) {
            Some(end) => Some((Markup::StartOrEmptyTag, end)),
            None => None,
        },
    }
}

/// Find the `?>` of a processing instruction where `offset` is the earliest `>` position.
#[inline]
#[must_use]
const fn find_pi_end(input: &[u8], offset: usize) -> Option<usize> {
    let mut index = offset;
    loop {
        if input.len() <= index {
            return None;
        }

        if input[index] == b'>' && input[index - 1] == b'?' {
            return Some(index + 1);
        }

        index += 1;
    }
}

#[inline]
#[must_use]
const fn scan_declaration_comment_or_cdata(input: &[u8], pos: usize) -> Option<(Markup, usize)> {
    const COMMENT: &[u8] = b"<!--";
    const CDATA: &[u8] = b"<![CDATA[";

    debug_assert!(pos + 1 < input.len());
    debug_assert!(input[pos] == b'<');
    debug_assert!(input[pos + 1] == b'!');

    if starts_with_at(input, pos, COMMENT) {
        // At the minimum, it must be `<!---->`. It cannot be `<!-->`.
        return match find_terminator(input, pos + COMMENT.len(), b"-->") {
            Some(end) => Some((Markup::Comment, end)),
            None => None,
        };
    }

    if starts_with_at(input, pos, CDATA) {
        return match find_terminator(input, pos + CDATA.len(), b"]]>") {
            Some(end) => Some((Markup::Cdata, end)),
            None => None,
        };
    }

    // Skip the head '<!'
    match find_close_tag_char_with_brackets_and_quotes(input, pos + 2) {
        Some(end) => Some((Markup::Declaration, end)),
        None => None,
    }
}

#[inline]
#[must_use]
const fn starts_with_at(input: &[u8], pos: usize, expected: &[u8]) -> bool {
    if input.len() < pos + expected.len() {
        return false;
    }

    let mut index = 0;
    loop {
        if index == expected.len() {
            return true;
        }

        if input[pos + index] != expected[index] {
            return false;
        }

        index += 1;
    }
}

/// Scans the input at `pos` and returns the kind of token found and the
/// index after its last byte.
///
/// If a token is not found, then the markup starting at `pos` is never
/// terminated. There is no more input to wait for, so the caller should treat
/// it as malformed.
///
/// The function does not carry any state.
#[inline]
#[must_use]
pub(super) const fn scan(input: &[u8], pos: usize) -> Option<(Markup, usize)> {
    match input[pos] {
        b'<' => scan_markup(input, pos),
        _ => Some((Markup::Text, scan_text_content(input, pos))),
    }
}
