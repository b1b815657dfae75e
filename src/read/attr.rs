// Copyright 2022 Bryant Luk
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Splits the attribute region of a start tag into name and raw value pairs.

use crate::{
    bytes::{is_qname, is_space},
    error::{MalformedInputError, MalformedKind},
};

/// An attribute before namespace resolution and reference replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct RawAttribute<'a> {
    pub(super) name: &'a str,
    pub(super) value: &'a str,
    /// Position of the value in the input.
    pub(super) value_offset: usize,
}

/// An iterator over the attributes in the text after a tag's name.
#[derive(Debug, Clone)]
pub(super) struct RawAttributes<'a> {
    region: &'a str,
    /// Position of `region` in the input.
    offset: usize,
    index: usize,
}

impl<'a> RawAttributes<'a> {
    #[inline]
    #[must_use]
    pub(super) const fn new(region: &'a str, offset: usize) -> Self {
        Self {
            region,
            offset,
            index: 0,
        }
    }

    #[inline]
    fn skip_space(&mut self) {
        let bytes = self.region.as_bytes();
        while self.index < bytes.len() && is_space(bytes[self.index]) {
            self.index += 1;
        }
    }

    #[inline]
    fn error(&self, kind: MalformedKind) -> MalformedInputError {
        MalformedInputError::new(self.offset + self.index, kind)
    }

    fn parse_next(&mut self) -> Result<Option<RawAttribute<'a>>, MalformedInputError> {
        let bytes = self.region.as_bytes();

        self.skip_space();
        if self.index == bytes.len() {
            return Ok(None);
        }

        let name_begin = self.index;
        while self.index < bytes.len() && bytes[self.index] != b'=' && !is_space(bytes[self.index])
        {
            self.index += 1;
        }
        let name = &self.region[name_begin..self.index];
        if !is_qname(name) {
            self.index = name_begin;
            return Err(self.error(MalformedKind::InvalidName(name.to_string())));
        }

        self.skip_space();
        if bytes.get(self.index) != Some(&b'=') {
            return Err(self.error(MalformedKind::MissingAttributeValue(name.to_string())));
        }
        self.index += 1;

        self.skip_space();
        let quote = match bytes.get(self.index) {
            Some(quote @ (b'"' | b'\'')) => *quote,
            _ => return Err(self.error(MalformedKind::MissingAttributeValue(name.to_string()))),
        };
        self.index += 1;

        let value_begin = self.index;
        let Some(len) = bytes[value_begin..].iter().position(|b| *b == quote) else {
            return Err(self.error(MalformedKind::UnterminatedMarkup));
        };
        self.index = value_begin + len + 1;

        Ok(Some(RawAttribute {
            name,
            value: &self.region[value_begin..value_begin + len],
            value_offset: self.offset + value_begin,
        }))
    }
}

impl<'a> Iterator for RawAttributes<'a> {
    type Item = Result<RawAttribute<'a>, MalformedInputError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.parse_next() {
            Ok(attr) => attr.map(Ok),
            Err(err) => {
                // Stop after the first error.
                self.index = self.region.len();
                Some(Err(err))
            }
        }
    }
}
