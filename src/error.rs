// Copyright 2022 Bryant Luk
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Errors returned while reading, filtering, or writing markup.

use std::{io, string::FromUtf8Error};

use thiserror::Error;

/// Any error returned by [`filter()`][crate::filter()] and friends.
#[derive(Debug, Error)]
pub enum Error {
    /// The input could not be tokenized.
    #[error(transparent)]
    MalformedInput(#[from] MalformedInputError),
    /// The output sink failed.
    #[error(transparent)]
    Emitter(#[from] EmitterError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// The input could not be tokenized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed input at byte {offset}: {kind}")]
pub struct MalformedInputError {
    offset: usize,
    kind: MalformedKind,
}

impl MalformedInputError {
    #[inline]
    #[must_use]
    pub(crate) const fn new(offset: usize, kind: MalformedKind) -> Self {
        Self { offset, kind }
    }

    /// The byte offset into the tokenized input where the problem was found.
    ///
    /// When a fragment is wrapped in a synthetic root, the offset is relative
    /// to the wrapped input.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// The kind of problem.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &MalformedKind {
        &self.kind
    }
}

/// The kind of [`MalformedInputError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedKind {
    /// A `<` was found without the rest of its markup.
    #[error("unterminated markup")]
    UnterminatedMarkup,
    /// A tag or attribute name is not a valid XML name.
    #[error("invalid name `{0}`")]
    InvalidName(String),
    /// An attribute has no quoted value.
    #[error("attribute `{0}` has no quoted value")]
    MissingAttributeValue(String),
    /// An end tag does not close the innermost open element.
    #[error("end tag `{found}` does not match start tag `{expected}`")]
    MismatchedEndTag {
        /// The name of the innermost open element.
        expected: String,
        /// The name in the end tag.
        found: String,
    },
    /// An end tag was found with no open element.
    #[error("end tag `{0}` has no matching start tag")]
    UnexpectedEndTag(String),
    /// The input ended while an element was still open.
    #[error("element `{0}` is not closed")]
    UnclosedElement(String),
    /// A prefix is used without an `xmlns:` declaration in scope.
    #[error("namespace prefix `{0}` is not bound")]
    UnboundPrefix(String),
    /// An entity reference other than the predefined ones.
    #[error("unknown entity `&{0};`")]
    UnknownEntity(String),
    /// A character reference which does not name a legal character.
    #[error("invalid character reference `&{0};`")]
    InvalidCharacterReference(String),
    /// A character which is not allowed anywhere in a document, like `U+0000`.
    #[error("invalid character {0:?}")]
    InvalidCharacter(char),
    /// A `&` without a terminating `;`.
    #[error("unterminated reference")]
    UnterminatedReference,
    /// A document (no synthetic root) without any element.
    #[error("no root element")]
    NoRootElement,
    /// A document (no synthetic root) with more than one top level element.
    #[error("more than one root element")]
    MultipleRootElements,
    /// Non-whitespace text outside of the root element.
    #[error("text outside of the root element")]
    TextOutsideRoot,
}

/// The output sink failed.
#[derive(Debug, Error)]
pub enum EmitterError {
    /// The underlying writer failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
    /// The written bytes were not UTF-8.
    #[error("output is not UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
    /// An end element was written without an open element.
    #[error("end element written without an open element")]
    Unbalanced,
    /// An attribute was written after the start tag was already closed.
    #[error("attribute written without an open start tag")]
    NoOpenStartTag,
    /// An element or attribute name which would not be read back as a name.
    #[error("invalid name `{0}`")]
    InvalidName(String),
    /// A prefix was bound to two different namespaces on the same element.
    #[error("prefix `{0}` is already bound to another namespace on this element")]
    ConflictingPrefix(String),
}
