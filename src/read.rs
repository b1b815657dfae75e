// Copyright 2022 Bryant Luk
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Reader for `&str`.

use std::borrow::Cow;

use crate::{
    bytes::{is_blank, is_qname, is_space},
    error::{Error, MalformedInputError, MalformedKind},
    token::{Attribute, EndTag, QName, StartTag, Token},
};

mod attr;
mod entity;
mod scanner;

use attr::{RawAttribute, RawAttributes};
use entity::{decode, Context};
use scanner::{scan, Markup};

const XML_PREFIX: &str = "xml";
const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
const XMLNS: &str = "xmlns";

const LOG_TARGET: &str = "markup_filter::read";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenElement<'a> {
    /// The qualified name as written in the start tag.
    name: &'a str,
    /// Number of namespace declarations made by the start tag.
    declared: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Reading,
    Done,
}

/// Pulls [`Token`]s from a complete XML document held in a `&str`.
///
/// The reader is the token source used by [`filter()`][crate::filter()]. It
/// only yields the token types the filter understands:
///
/// * Empty element tags like `<br/>` are yielded as a start tag immediately
///   followed by the matching end tag.
/// * Comments, processing instructions, and declarations are skipped.
/// * CDATA sections are yielded as characters.
/// * Character and entity references are replaced.
/// * `xmlns` attributes are consumed as namespace declarations and the names
///   of elements and attributes are resolved against them.
///
/// The stream ends with a single [`Token::EndOfStream`]. Malformed input such
/// as mismatched tags, unknown entities, or more than one root element is
/// reported as an error, after which the iterator is finished.
///
/// # Examples
///
/// ```
/// use markup_filter::{Reader, token::Token};
///
/// let input = r#"<p>Hi <b class="x">there</b><br/></p>"#;
///
/// let mut names = Vec::new();
/// for token in Reader::new(input) {
///     match token? {
///         Token::StartTag(tag) => names.push(format!("<{}>", tag.local())),
///         Token::EndTag(tag) => names.push(format!("</{}>", tag.local())),
///         Token::Characters(text) => names.push(text.into_owned()),
///         Token::EndOfStream => names.push("EOS".to_string()),
///     }
/// }
///
/// assert_eq!(
///     names,
///     ["<p>", "Hi ", "<b>", "there", "</b>", "<br>", "</br>", "</p>", "EOS"]
/// );
/// # Ok::<(), markup_filter::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    input: &'a str,
    pos: usize,
    open: Vec<OpenElement<'a>>,
    namespaces: Vec<(&'a str, Cow<'a, str>)>,
    pending_end: Option<EndTag<'a>>,
    seen_root: bool,
    state: State,
}

impl<'a> Reader<'a> {
    /// Creates a new instance with the given UTF-8 string input.
    #[inline]
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            open: Vec::new(),
            namespaces: Vec::new(),
            pending_end: None,
            seen_root: false,
            state: State::Reading,
        }
    }

    /// The byte index of the next unread markup.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// The number of currently open elements.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Return the underlying input being tokenized.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> &'a str {
        self.input
    }

    /// Reads the next token.
    ///
    /// Returns `Ok(None)` after [`Token::EndOfStream`] was returned or after
    /// an error.
    ///
    /// # Errors
    ///
    /// If the input is not a well-formed document.
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>, MalformedInputError> {
        self.next_token_skipping(|_| false)
    }

    /// Reads the next token, leaving out every element whose local name
    /// `skip` returns true for.
    ///
    /// `skip` is called with the local name of a start tag before anything
    /// else in the tag is read. A skipped element and everything inside of it
    /// are not returned. Its content is only checked for balanced tags:
    /// references are not replaced and prefixes are not resolved.
    ///
    /// # Examples
    ///
    /// ```
    /// use markup_filter::{Reader, token::Token};
    ///
    /// let mut reader = Reader::new("<p>a<script src='&bogus;'>b</script>c</p>");
    ///
    /// let mut text = String::new();
    /// while let Some(token) = reader.next_token_skipping(|name| name == "script")? {
    ///     if let Token::Characters(chars) = token {
    ///         text.push_str(&chars);
    ///     }
    /// }
    ///
    /// assert_eq!(text, "ac");
    /// # Ok::<(), markup_filter::MalformedInputError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// If the input is not a well-formed document.
    pub fn next_token_skipping<F>(
        &mut self,
        mut skip: F,
    ) -> Result<Option<Token<'a>>, MalformedInputError>
    where
        F: FnMut(&str) -> bool,
    {
        if let Some(end) = self.pending_end.take() {
            return Ok(Some(Token::EndTag(end)));
        }

        while self.state == State::Reading {
            match self.read(&mut skip) {
                Ok(Some(token)) => return Ok(Some(token)),
                Ok(None) => {}
                Err(err) => {
                    log::debug!(target: LOG_TARGET, "malformed input: {err}");
                    self.state = State::Done;
                    self.open.clear();
                    self.namespaces.clear();
                    return Err(err);
                }
            }
        }

        Ok(None)
    }

    /// Reads markup at the current position. `Ok(None)` means the markup was
    /// skipped.
    fn read<F>(&mut self, skip: &mut F) -> Result<Option<Token<'a>>, MalformedInputError>
    where
        F: FnMut(&str) -> bool,
    {
        let input = self.input;
        let offset = self.pos;

        if offset == input.len() {
            return self.read_end_of_input();
        }

        let Some((markup, end)) = scan(input.as_bytes(), offset) else {
            return Err(MalformedInputError::new(
                offset,
                MalformedKind::UnterminatedMarkup,
            ));
        };
        self.pos = end;

        let text = &input[offset..end];
        match markup {
            Markup::Text => {
                if self.open.is_empty() {
                    if is_blank(text) {
                        return Ok(None);
                    }
                    return Err(MalformedInputError::new(
                        offset,
                        MalformedKind::TextOutsideRoot,
                    ));
                }
                decode(text, offset, Context::Text).map(|text| Some(Token::Characters(text)))
            }
            Markup::Cdata => {
                if self.open.is_empty() {
                    return Err(MalformedInputError::new(
                        offset,
                        MalformedKind::TextOutsideRoot,
                    ));
                }
                let content = &text["<![CDATA[".len()..text.len() - "]]>".len()];
                if content.is_empty() {
                    return Ok(None);
                }
                let content_offset = offset + "<![CDATA[".len();
                entity::normalize_line_endings(content, content_offset)
                    .map(|text| Some(Token::Characters(text)))
            }
            Markup::Comment | Markup::ProcessingInstruction | Markup::Declaration => Ok(None),
            Markup::StartOrEmptyTag => self.read_start_tag(text, offset, skip),
            Markup::EndTag => self.read_end_tag(text, offset).map(Some),
        }
    }

    fn read_end_of_input(&mut self) -> Result<Option<Token<'a>>, MalformedInputError> {
        if let Some(open) = self.open.last() {
            return Err(MalformedInputError::new(
                self.pos,
                MalformedKind::UnclosedElement(open.name.to_string()),
            ));
        }

        if !self.seen_root {
            return Err(MalformedInputError::new(
                self.pos,
                MalformedKind::NoRootElement,
            ));
        }

        self.state = State::Done;
        Ok(Some(Token::EndOfStream))
    }

    fn read_start_tag<F>(
        &mut self,
        text: &'a str,
        offset: usize,
        skip: &mut F,
    ) -> Result<Option<Token<'a>>, MalformedInputError>
    where
        F: FnMut(&str) -> bool,
    {
        let tag = RawStartTag::split(text, offset)?;

        if self.open.is_empty() {
            if self.seen_root {
                return Err(MalformedInputError::new(
                    offset,
                    MalformedKind::MultipleRootElements,
                ));
            }
            self.seen_root = true;
        }

        if skip(local_part(tag.name)) {
            log::trace!(target: LOG_TARGET, "skipping <{}> at byte {offset}", tag.name);
            for raw in tag.attributes {
                raw?;
            }
            if !tag.is_empty {
                self.skip_element(tag.name)?;
            }
            return Ok(None);
        }

        // Declarations apply to the element's own name and attributes, so
        // they are collected before anything is resolved.
        let mut declared = 0;
        let mut raw_attributes = Vec::new();
        for raw in tag.attributes {
            let raw = raw?;
            let prefix = if raw.name == XMLNS {
                ""
            } else if let Some(prefix) = raw.name.strip_prefix("xmlns:") {
                prefix
            } else {
                raw_attributes.push(raw);
                continue;
            };
            let uri = decode(raw.value, raw.value_offset, Context::AttributeValue)?;
            self.namespaces.push((prefix, uri));
            declared += 1;
        }
        self.open.push(OpenElement {
            name: tag.name,
            declared,
        });

        let mut start = StartTag::with_name(self.resolve(tag.name, offset + 1, true)?);
        for raw in raw_attributes {
            start.push_attribute(self.resolve_attribute(raw)?);
        }

        if tag.is_empty {
            self.pending_end = Some(EndTag::with_name(start.name().clone()));
            self.pop_open();
        }

        Ok(Some(Token::StartTag(start)))
    }

    fn read_end_tag(
        &mut self,
        text: &'a str,
        offset: usize,
    ) -> Result<Token<'a>, MalformedInputError> {
        let raw_name = end_tag_name(text, offset)?;

        match self.open.last() {
            None => {
                return Err(MalformedInputError::new(
                    offset,
                    MalformedKind::UnexpectedEndTag(raw_name.to_string()),
                ))
            }
            Some(open) if open.name != raw_name => {
                return Err(MalformedInputError::new(
                    offset,
                    MalformedKind::MismatchedEndTag {
                        expected: open.name.to_string(),
                        found: raw_name.to_string(),
                    },
                ))
            }
            Some(_) => {}
        }

        let name = self.resolve(raw_name, offset + 2, true)?;
        self.pop_open();
        Ok(Token::EndTag(EndTag::with_name(name)))
    }

    /// Moves past the content and the end tag of the element `name` whose
    /// start tag was just read.
    fn skip_element(&mut self, name: &'a str) -> Result<(), MalformedInputError> {
        let input = self.input;
        let mut open = vec![name];

        while let Some(&expected) = open.last() {
            let offset = self.pos;
            if offset == input.len() {
                return Err(MalformedInputError::new(
                    offset,
                    MalformedKind::UnclosedElement(expected.to_string()),
                ));
            }

            let Some((markup, end)) = scan(input.as_bytes(), offset) else {
                return Err(MalformedInputError::new(
                    offset,
                    MalformedKind::UnterminatedMarkup,
                ));
            };
            self.pos = end;

            let text = &input[offset..end];
            match markup {
                Markup::StartOrEmptyTag => {
                    let tag = RawStartTag::split(text, offset)?;
                    if !tag.is_empty {
                        open.push(tag.name);
                    }
                }
                Markup::EndTag => {
                    let found = end_tag_name(text, offset)?;
                    if found != expected {
                        return Err(MalformedInputError::new(
                            offset,
                            MalformedKind::MismatchedEndTag {
                                expected: expected.to_string(),
                                found: found.to_string(),
                            },
                        ));
                    }
                    open.pop();
                }
                Markup::Text
                | Markup::Cdata
                | Markup::Comment
                | Markup::ProcessingInstruction
                | Markup::Declaration => {}
            }
        }

        Ok(())
    }

    fn pop_open(&mut self) {
        if let Some(open) = self.open.pop() {
            let len = self.namespaces.len() - open.declared;
            self.namespaces.truncate(len);
        }
    }

    fn resolve_attribute(
        &self,
        raw: RawAttribute<'a>,
    ) -> Result<Attribute<'a>, MalformedInputError> {
        // Unprefixed attributes are never in the default namespace.
        let name = self.resolve(raw.name, raw.value_offset, false)?;
        let value = decode(raw.value, raw.value_offset, Context::AttributeValue)?;
        Ok(Attribute::with_name(name, value))
    }

    fn resolve(
        &self,
        raw_name: &'a str,
        offset: usize,
        use_default: bool,
    ) -> Result<QName<'a>, MalformedInputError> {
        match raw_name.split_once(':') {
            Some((prefix, local)) => match self.lookup(prefix) {
                Some(uri) if !uri.is_empty() => Ok(QName::namespaced(
                    Some(Cow::Borrowed(prefix)),
                    uri,
                    local,
                )),
                _ => Err(MalformedInputError::new(
                    offset,
                    MalformedKind::UnboundPrefix(prefix.to_string()),
                )),
            },
            None if use_default => match self.lookup("") {
                Some(uri) if !uri.is_empty() => Ok(QName::namespaced(None, uri, raw_name)),
                _ => Ok(QName::new(raw_name)),
            },
            None => Ok(QName::new(raw_name)),
        }
    }

    fn lookup(&self, prefix: &str) -> Option<Cow<'a, str>> {
        if prefix == XML_PREFIX {
            return Some(Cow::Borrowed(XML_NAMESPACE));
        }

        self.namespaces
            .iter()
            .rev()
            .find(|(declared, _)| *declared == prefix)
            .map(|(_, uri)| uri.clone())
    }
}

impl<'a> Iterator for Reader<'a> {
    type Item = Result<Token<'a>, Error>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().map_err(Error::from).transpose()
    }
}

impl core::iter::FusedIterator for Reader<'_> {}

/// A start tag split into its name and attribute region.
#[derive(Debug, Clone)]
struct RawStartTag<'a> {
    name: &'a str,
    attributes: RawAttributes<'a>,
    is_empty: bool,
}

impl<'a> RawStartTag<'a> {
    fn split(text: &'a str, offset: usize) -> Result<Self, MalformedInputError> {
        let is_empty = text.ends_with("/>");
        let inner = &text[1..text.len() - if is_empty { 2 } else { 1 }];

        let name_len = inner
            .bytes()
            .position(is_space)
            .unwrap_or(inner.len());
        let name = &inner[..name_len];
        if !is_qname(name) {
            return Err(MalformedInputError::new(
                offset + 1,
                MalformedKind::InvalidName(name.to_string()),
            ));
        }

        Ok(Self {
            name,
            attributes: RawAttributes::new(&inner[name_len..], offset + 1 + name_len),
            is_empty,
        })
    }
}

fn end_tag_name(text: &str, offset: usize) -> Result<&str, MalformedInputError> {
    let name = text[2..text.len() - 1]
        .trim_end_matches(|c: char| c.is_ascii() && is_space(c as u8));
    if is_qname(name) {
        Ok(name)
    } else {
        Err(MalformedInputError::new(
            offset + 2,
            MalformedKind::InvalidName(name.to_string()),
        ))
    }
}

#[inline]
fn local_part(name: &str) -> &str {
    name.split_once(':').map_or(name, |(_, local)| local)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Result<Vec<Token<'_>>, MalformedInputError> {
        let mut reader = Reader::new(input);
        let mut tokens = Vec::new();
        while let Some(token) = reader.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn kind(input: &str) -> MalformedKind {
        tokens(input).unwrap_err().kind().clone()
    }

    #[test]
    fn empty_element_is_start_and_end() {
        assert_eq!(
            tokens("<br/>").unwrap(),
            [
                Token::StartTag(StartTag::new("br")),
                Token::end_tag("br"),
                Token::EndOfStream,
            ]
        );
    }

    #[test]
    fn skips_comments_declarations_and_instructions() {
        let input = "<?xml version=\"1.0\"?>\n<!DOCTYPE p>\n<p><!-- x -->a<?pi?>b</p>\n";
        assert_eq!(
            tokens(input).unwrap(),
            [
                Token::StartTag(StartTag::new("p")),
                Token::characters("a"),
                Token::characters("b"),
                Token::end_tag("p"),
                Token::EndOfStream,
            ]
        );
    }

    #[test]
    fn cdata_is_characters() {
        assert_eq!(
            tokens("<p><![CDATA[<b>&amp;]]><![CDATA[]]></p>").unwrap(),
            [
                Token::StartTag(StartTag::new("p")),
                Token::characters("<b>&amp;"),
                Token::end_tag("p"),
                Token::EndOfStream,
            ]
        );
    }

    #[test]
    fn decodes_attribute_values() {
        let tokens = tokens(r#"<a href="?a=1&amp;b=2" title='x&#10;y'></a>"#).unwrap();
        let Token::StartTag(tag) = &tokens[0] else {
            panic!("expected a start tag");
        };
        assert_eq!(tag.attributes()[0].value(), "?a=1&b=2");
        assert_eq!(tag.attributes()[1].value(), "x\ny");
    }

    #[test]
    fn resolves_namespaces() {
        let input = r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink"><use xlink:href="#a" x="1"/></svg>"##;
        let tokens = tokens(input).unwrap();

        let Token::StartTag(svg) = &tokens[0] else {
            panic!("expected a start tag");
        };
        assert_eq!(svg.local(), "svg");
        assert_eq!(svg.name().namespace_uri(), Some("http://www.w3.org/2000/svg"));
        assert_eq!(svg.name().prefix(), None);
        assert!(svg.attributes().is_empty());

        let Token::StartTag(used) = &tokens[1] else {
            panic!("expected a start tag");
        };
        let href = &used.attributes()[0];
        assert_eq!(href.name().prefix(), Some("xlink"));
        assert_eq!(
            href.name().namespace_uri(),
            Some("http://www.w3.org/1999/xlink")
        );
        assert_eq!(href.local(), "href");
        assert_eq!(used.attributes()[1].name().namespace_uri(), None);
    }

    #[test]
    fn namespace_scope_ends_with_element() {
        assert_eq!(
            kind(r#"<r><a xmlns:p="urn:p"><p:b/></a><p:c/></r>"#),
            MalformedKind::UnboundPrefix("p".to_string())
        );
    }

    #[test]
    fn xml_prefix_is_predefined() {
        let tokens = tokens(r#"<p xml:lang="en"></p>"#).unwrap();
        let Token::StartTag(tag) = &tokens[0] else {
            panic!("expected a start tag");
        };
        assert_eq!(tag.attributes()[0].name().namespace_uri(), Some(XML_NAMESPACE));
    }

    #[test]
    fn malformed_documents() {
        assert_eq!(kind(""), MalformedKind::NoRootElement);
        assert_eq!(kind("  "), MalformedKind::NoRootElement);
        assert_eq!(kind("<a></a><b></b>"), MalformedKind::MultipleRootElements);
        assert_eq!(kind("text<a></a>"), MalformedKind::TextOutsideRoot);
        assert_eq!(kind("<a>"), MalformedKind::UnclosedElement("a".to_string()));
        assert_eq!(kind("<a></b>"), MalformedKind::MismatchedEndTag {
            expected: "a".to_string(),
            found: "b".to_string(),
        });
        assert_eq!(kind("</a>"), MalformedKind::UnexpectedEndTag("a".to_string()));
        assert_eq!(kind("<a>&nbsp;</a>"), MalformedKind::UnknownEntity("nbsp".to_string()));
        assert_eq!(kind("<a b></a>"), MalformedKind::MissingAttributeValue("b".to_string()));
        assert_eq!(kind("<a><b</a>"), MalformedKind::InvalidName("b</a".to_string()));
        assert_eq!(kind("<a>x<"), MalformedKind::UnterminatedMarkup);
        assert_eq!(kind("<p:a></p:a>"), MalformedKind::UnboundPrefix("p".to_string()));
    }

    #[test]
    fn iterator_is_fused_after_error() {
        let mut reader = Reader::new("<a></b>");
        assert!(matches!(reader.next(), Some(Ok(Token::StartTag(_)))));
        assert!(matches!(reader.next(), Some(Err(Error::MalformedInput(_)))));
        assert!(reader.next().is_none());
        assert_eq!(reader.into_inner(), "<a></b>");
    }

    fn tokens_skipping<'a>(
        input: &'a str,
        skipped: &[&str],
        asked: &mut Vec<String>,
    ) -> Result<Vec<Token<'a>>, MalformedInputError> {
        let mut reader = Reader::new(input);
        let mut tokens = Vec::new();
        while let Some(token) = reader.next_token_skipping(|name| {
            asked.push(name.to_string());
            skipped.contains(&name)
        })? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    #[test]
    fn skipped_elements_are_not_decoded() {
        let input = r#"<r><script type="&bogus;"><y:x a="&nbsp;">&bogus;<![CDATA[x]]></y:x><br/></script><p>k</p><script/></r>"#;
        let mut asked = Vec::new();
        assert_eq!(
            tokens_skipping(input, &["script"], &mut asked).unwrap(),
            [
                Token::StartTag(StartTag::new("r")),
                Token::StartTag(StartTag::new("p")),
                Token::characters("k"),
                Token::end_tag("p"),
                Token::end_tag("r"),
                Token::EndOfStream,
            ]
        );
        assert_eq!(asked, ["r", "script", "p", "script"]);
    }

    #[test]
    fn skipped_elements_use_the_local_name() {
        let mut asked = Vec::new();
        let tokens = tokens_skipping(
            r#"<r xmlns:s="urn:s"><s:script>x</s:script>y</r>"#,
            &["script"],
            &mut asked,
        )
        .unwrap();
        assert_eq!(tokens[1], Token::characters("y"));
        assert_eq!(asked, ["r", "script"]);
    }

    #[test]
    fn skipped_elements_must_be_balanced() {
        let kind = |input| {
            tokens_skipping(input, &["script"], &mut Vec::new())
                .unwrap_err()
                .kind()
                .clone()
        };
        assert_eq!(
            kind("<r><script><a></b></script></r>"),
            MalformedKind::MismatchedEndTag {
                expected: "a".to_string(),
                found: "b".to_string(),
            }
        );
        assert_eq!(
            kind("<r><script><a>"),
            MalformedKind::UnclosedElement("a".to_string())
        );
        assert_eq!(
            kind("<r><script a=1></script></r>"),
            MalformedKind::MissingAttributeValue("a".to_string())
        );
        assert_eq!(kind("<r><script><!-- x"), MalformedKind::UnterminatedMarkup);
        assert_eq!(
            kind("<script></script><p></p>"),
            MalformedKind::MultipleRootElements
        );
    }

    #[test]
    fn literal_invalid_characters() {
        assert_eq!(kind("<a>\u{0}</a>"), MalformedKind::InvalidCharacter('\u{0}'));
        assert_eq!(
            kind("<a b=\"\u{7}\"></a>"),
            MalformedKind::InvalidCharacter('\u{7}')
        );
        assert_eq!(
            kind("<a><![CDATA[\u{1b}]]></a>"),
            MalformedKind::InvalidCharacter('\u{1b}')
        );
    }

    #[test]
    fn error_offsets() {
        let err = tokens("<a>ok</b>").unwrap_err();
        assert_eq!(err.offset(), 5);
    }
}
