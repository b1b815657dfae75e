// Copyright 2022 Bryant Luk
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Internal byte slice helpers shared by the scanner and attribute parser.

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub(crate) enum QuoteState {
    None,
    Single,
    Double,
}

impl QuoteState {
    /// Returns the state after seeing `byte`.
    #[inline]
    #[must_use]
    pub(crate) const fn advance(self, byte: u8) -> Self {
        match (self, byte) {
            (QuoteState::None, b'"') => QuoteState::Double,
            (QuoteState::None, b'\'') => QuoteState::Single,
            (QuoteState::Double, b'"') | (QuoteState::Single, b'\'') => QuoteState::None,
            (state, _) => state,
        }
    }
}

#[inline]
#[must_use]
pub(crate) const fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n')
}

/// Returns true if the string only contains XML whitespace.
#[inline]
#[must_use]
pub(crate) fn is_blank(value: &str) -> bool {
    value.bytes().all(is_space)
}

#[inline]
#[must_use]
const fn is_name_start_byte(byte: u8) -> bool {
    // Any non-ASCII byte is accepted so multi-byte names pass through.
    matches!(byte, b'A'..=b'Z' | b'a'..=b'z' | b'_' | 0x80..=0xFF)
}

#[inline]
#[must_use]
const fn is_name_byte(byte: u8) -> bool {
    is_name_start_byte(byte) || matches!(byte, b'0'..=b'9' | b'-' | b'.')
}

/// Returns true if the value is a valid `NCName` (a name without a colon).
#[must_use]
pub(crate) const fn is_ncname(value: &[u8]) -> bool {
    if value.is_empty() || !is_name_start_byte(value[0]) {
        return false;
    }

    let mut index = 1;
    loop {
        if index == value.len() {
            return true;
        }

        if !is_name_byte(value[index]) {
            return false;
        }

        index += 1;
    }
}

/// Returns true if the value is `NCName` or `NCName:NCName`.
#[must_use]
pub(crate) fn is_qname(value: &str) -> bool {
    match value.split_once(':') {
        Some((prefix, local)) => is_ncname(prefix.as_bytes()) && is_ncname(local.as_bytes()),
        None => is_ncname(value.as_bytes()),
    }
}
