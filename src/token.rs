// Copyright 2022 Bryant Luk
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tokens pulled from a token source and pushed through the filter.
//!
//! [`Token`] is the main type. Names and values are [`Cow`]s: the
//! [`Reader`][crate::Reader] borrows them from the input whenever no entity
//! decoding was needed, while hand-built tokens may own their strings.

use std::borrow::Cow;

/// A possibly namespaced name of an element or attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName<'a> {
    local: Cow<'a, str>,
    prefix: Option<Cow<'a, str>>,
    namespace_uri: Option<Cow<'a, str>>,
}

impl<'a> QName<'a> {
    /// Instantiates a name without a prefix or namespace.
    #[inline]
    #[must_use]
    pub fn new(local: impl Into<Cow<'a, str>>) -> Self {
        Self {
            local: local.into(),
            prefix: None,
            namespace_uri: None,
        }
    }

    /// Instantiates a name with an optional prefix bound to a namespace.
    #[must_use]
    pub fn namespaced(
        prefix: Option<Cow<'a, str>>,
        namespace_uri: impl Into<Cow<'a, str>>,
        local: impl Into<Cow<'a, str>>,
    ) -> Self {
        Self {
            local: local.into(),
            prefix,
            namespace_uri: Some(namespace_uri.into()),
        }
    }

    /// The local part of the name.
    ///
    /// For example, if `svg:rect` was the name, then `rect` would be the
    /// local part of the name.
    #[inline]
    #[must_use]
    pub fn local(&self) -> &str {
        &self.local
    }

    /// The namespace prefix if one was written.
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// The namespace the name is bound to, if any.
    #[inline]
    #[must_use]
    pub fn namespace_uri(&self) -> Option<&str> {
        self.namespace_uri.as_deref()
    }

    /// Returns true if the name was written with a non-empty prefix.
    #[inline]
    #[must_use]
    pub fn is_prefixed(&self) -> bool {
        self.prefix.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// An attribute of a start tag.
///
/// The value has already had character and entity references replaced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute<'a> {
    name: QName<'a>,
    value: Cow<'a, str>,
}

impl<'a> Attribute<'a> {
    /// Instantiates an attribute without a namespace.
    #[inline]
    #[must_use]
    pub fn new(local: impl Into<Cow<'a, str>>, value: impl Into<Cow<'a, str>>) -> Self {
        Self {
            name: QName::new(local),
            value: value.into(),
        }
    }

    /// Instantiates an attribute with the given name.
    #[inline]
    #[must_use]
    pub fn with_name(name: QName<'a>, value: impl Into<Cow<'a, str>>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }

    /// The attribute's name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &QName<'a> {
        &self.name
    }

    /// The local part of the attribute's name.
    #[inline]
    #[must_use]
    pub fn local(&self) -> &str {
        self.name.local()
    }

    /// The attribute's value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// A start tag with its attributes in source order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StartTag<'a> {
    name: QName<'a>,
    attributes: Vec<Attribute<'a>>,
}

impl<'a> StartTag<'a> {
    /// Instantiates a start tag without attributes.
    #[inline]
    #[must_use]
    pub fn new(local: impl Into<Cow<'a, str>>) -> Self {
        Self::with_name(QName::new(local))
    }

    /// Instantiates a start tag with the given name and no attributes.
    #[inline]
    #[must_use]
    pub const fn with_name(name: QName<'a>) -> Self {
        Self {
            name,
            attributes: Vec::new(),
        }
    }

    /// Appends an attribute.
    #[inline]
    #[must_use]
    pub fn attribute(mut self, attribute: Attribute<'a>) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub(crate) fn push_attribute(&mut self, attribute: Attribute<'a>) {
        self.attributes.push(attribute);
    }

    /// The name of the tag.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &QName<'a> {
        &self.name
    }

    /// The local part of the tag's name.
    #[inline]
    #[must_use]
    pub fn local(&self) -> &str {
        self.name.local()
    }

    /// The attributes of the tag.
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &[Attribute<'a>] {
        &self.attributes
    }
}

/// An end tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndTag<'a> {
    name: QName<'a>,
}

impl<'a> EndTag<'a> {
    /// Instantiates an end tag.
    #[inline]
    #[must_use]
    pub fn new(local: impl Into<Cow<'a, str>>) -> Self {
        Self::with_name(QName::new(local))
    }

    /// Instantiates an end tag with the given name.
    #[inline]
    #[must_use]
    pub const fn with_name(name: QName<'a>) -> Self {
        Self { name }
    }

    /// The name of the tag.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &QName<'a> {
        &self.name
    }

    /// The local part of the tag's name.
    #[inline]
    #[must_use]
    pub fn local(&self) -> &str {
        self.name.local()
    }
}

/// Type of token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token<'a> {
    /// A start tag like `<a href="https://example.com">`.
    StartTag(StartTag<'a>),
    /// An end tag like `</a>`.
    EndTag(EndTag<'a>),
    /// Decoded character content between markup.
    Characters(Cow<'a, str>),
    /// The end of the token stream.
    EndOfStream,
}

impl<'a> Token<'a> {
    /// Instantiates a [`Token::Characters`].
    #[inline]
    #[must_use]
    pub fn characters(text: impl Into<Cow<'a, str>>) -> Self {
        Token::Characters(text.into())
    }

    /// Instantiates a [`Token::EndTag`] with a local name.
    #[inline]
    #[must_use]
    pub fn end_tag(local: impl Into<Cow<'a, str>>) -> Self {
        Token::EndTag(EndTag::new(local))
    }
}

impl<'a> From<StartTag<'a>> for Token<'a> {
    #[inline]
    fn from(value: StartTag<'a>) -> Self {
        Token::StartTag(value)
    }
}

impl<'a> From<EndTag<'a>> for Token<'a> {
    #[inline]
    fn from(value: EndTag<'a>) -> Self {
        Token::EndTag(value)
    }
}
