// Copyright 2022 Bryant Luk
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Streams tokens through a [`Policy`].
//!
//! Filtering is a single pass in two stages. The acceptance stage drops
//! disallowed elements together with everything inside them. The rewrite
//! stage sees only accepted tokens; it removes blank elements, removes
//! disallowed attributes, and writes what is left to an [`Emitter`].

use crate::{
    bytes::is_ncname,
    error::{EmitterError, Error, MalformedInputError, MalformedKind, Result},
    policy::Policy,
    read::Reader,
    token::Token,
    write::{Emitter, XmlWriter},
};

mod accept;
mod rewrite;

use accept::Acceptance;
use rewrite::Rewriter;

const LOG_TARGET: &str = "markup_filter::filter";

/// The state of a single filter pass.
///
/// A new state is created for each call to [`filter()`] or
/// [`filter_tokens()`]. The stages can also be driven by hand:
///
/// ```
/// use markup_filter::{
///     token::{StartTag, Token},
///     FilterRunState, HtmlPolicy, XmlWriter,
/// };
///
/// let policy = HtmlPolicy::default();
/// let mut state = FilterRunState::new();
/// let mut writer = XmlWriter::new(Vec::new());
///
/// for token in [
///     Token::from(StartTag::new("script")),
///     Token::characters("alert(1)"),
///     Token::end_tag("script"),
///     Token::characters("safe"),
///     Token::EndOfStream,
/// ] {
///     if state.accept(&token, &policy)? {
///         state.process(token, &policy, &mut writer)?;
///     }
/// }
///
/// assert_eq!(writer.into_inner(), b"safe");
/// # Ok::<(), markup_filter::Error>(())
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterRunState {
    acceptance: Acceptance,
    rewriter: Rewriter,
}

impl FilterRunState {
    /// Instantiates a fresh state.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of disallowed elements the stream is currently inside of.
    #[inline]
    #[must_use]
    pub const fn ignore_depth(&self) -> usize {
        self.acceptance.ignore_depth()
    }

    /// The blank candidate start tag which has not been written yet.
    #[inline]
    #[must_use]
    pub fn pending_open_tag(&self) -> Option<&str> {
        self.rewriter.pending_open_tag()
    }

    /// Runs the acceptance stage. Returns true if the token should be passed
    /// to [`process()`][FilterRunState::process].
    ///
    /// # Errors
    ///
    /// If a disallowed end tag has no matching start tag.
    pub fn accept<P>(&mut self, token: &Token<'_>, policy: &P) -> Result<bool>
    where
        P: Policy + ?Sized,
    {
        Ok(self.acceptance.accept(token, policy)?)
    }

    /// Runs the rewrite stage on an accepted token.
    ///
    /// # Errors
    ///
    /// If the emitter fails.
    pub fn process<P, E>(&mut self, token: Token<'_>, policy: &P, emitter: &mut E) -> Result<()>
    where
        P: Policy + ?Sized,
        E: Emitter + ?Sized,
    {
        Ok(self.rewriter.process(token, policy, emitter)?)
    }
}

/// Filters a markup fragment.
///
/// If the policy has a [fake root][Policy::fake_root_name], the fragment is
/// wrapped in it first, so fragments with several top level elements or with
/// top level text are accepted. Otherwise the fragment must be a document
/// with a single root element.
///
/// # Examples
///
/// ```
/// use markup_filter::{filter, HtmlPolicy};
///
/// let output = filter(
///     r#"<b>Hi</b> <img src="https://example.com/a.png" onerror="x()"/><span></span><i></i>"#,
///     HtmlPolicy::shared(),
/// )?;
/// assert_eq!(
///     output,
///     r#"<b>Hi</b> <img src="https://example.com/a.png"/><span></span>"#
/// );
/// # Ok::<(), markup_filter::Error>(())
/// ```
///
/// # Errors
///
/// If the fragment is not well-formed, or if the policy's fake root is not a
/// valid element name.
pub fn filter<P>(fragment: &str, policy: &P) -> Result<String>
where
    P: Policy + ?Sized,
{
    let wrapped;
    let input = match policy.fake_root_name() {
        Some(root) => {
            if !is_ncname(root.as_bytes()) {
                return Err(Error::from(MalformedInputError::new(
                    0,
                    MalformedKind::InvalidName(root.to_string()),
                )));
            }
            wrapped = format!("<{root}>{fragment}</{root}>");
            wrapped.as_str()
        }
        None => fragment,
    };

    // Disallowed elements are skipped by the reader before their attributes
    // are read. The fake root is never passed to the policy.
    let fake_root = policy.fake_root_name();
    let mut reader = Reader::new(input);
    let tokens = core::iter::from_fn(|| {
        reader
            .next_token_skipping(|name| {
                let skip = fake_root != Some(name) && !policy.is_allowed_tag(name);
                if skip {
                    log::debug!(target: LOG_TARGET, "dropping <{name}> and its content");
                }
                skip
            })
            .map_err(Error::from)
            .transpose()
    });

    let mut writer = XmlWriter::new(Vec::with_capacity(fragment.len()));
    filter_tokens(tokens, policy, &mut writer)?;
    let output = String::from_utf8(writer.into_inner()).map_err(EmitterError::from)?;
    Ok(output)
}

/// Filters tokens from any source into any [`Emitter`].
///
/// The emitter is finished when [`Token::EndOfStream`] arrives, or when the
/// source ends without one.
///
/// # Examples
///
/// ```
/// use markup_filter::{filter_tokens, token::{Attribute, StartTag, Token}, HtmlPolicy, XmlWriter};
///
/// let tokens = vec![
///     Ok(StartTag::new("a")
///         .attribute(Attribute::new("href", "javascript:alert(1)"))
///         .attribute(Attribute::new("title", "t"))
///         .into()),
///     Ok(Token::characters("link")),
///     Ok(Token::end_tag("a")),
/// ];
///
/// let mut writer = XmlWriter::new(Vec::new());
/// filter_tokens(tokens, &HtmlPolicy::default(), &mut writer)?;
/// assert_eq!(writer.into_inner(), b"<a>link</a>");
/// # Ok::<(), markup_filter::Error>(())
/// ```
///
/// # Errors
///
/// If the source yields an error, if a disallowed end tag has no matching
/// start tag, or if the emitter fails.
pub fn filter_tokens<'a, I, P, E>(tokens: I, policy: &P, emitter: &mut E) -> Result<()>
where
    I: IntoIterator<Item = Result<Token<'a>>>,
    P: Policy + ?Sized,
    E: Emitter + ?Sized,
{
    let mut state = FilterRunState::new();

    for token in tokens {
        let token = token?;
        let accepted = state.accept(&token, policy)?;
        log::trace!(target: LOG_TARGET, "{token:?} accepted={accepted}");

        if matches!(token, Token::EndOfStream) {
            break;
        }
        if accepted {
            state.process(token, policy, emitter)?;
        }
    }

    state.process(Token::EndOfStream, policy, emitter)
}

/// Owns a policy and filters fragments with it.
///
/// ```
/// use std::{sync::Arc, thread};
///
/// use markup_filter::{HtmlPolicy, Sanitizer};
///
/// let sanitizer = Arc::new(Sanitizer::new(HtmlPolicy::default()));
///
/// let handles = (0..4)
///     .map(|n| {
///         let sanitizer = Arc::clone(&sanitizer);
///         thread::spawn(move || sanitizer.clean(&format!("<p>{n}<script>x</script></p>")))
///     })
///     .collect::<Vec<_>>();
///
/// for (n, handle) in handles.into_iter().enumerate() {
///     assert_eq!(handle.join().unwrap()?, format!("<p>{n}</p>"));
/// }
/// # Ok::<(), markup_filter::Error>(())
/// ```
#[derive(Debug, Default, Clone)]
pub struct Sanitizer<P> {
    policy: P,
}

impl<P: Policy> Sanitizer<P> {
    /// Instantiates with a fully built policy.
    #[inline]
    #[must_use]
    pub const fn new(policy: P) -> Self {
        Self { policy }
    }

    /// The policy used to filter.
    #[inline]
    #[must_use]
    pub const fn policy(&self) -> &P {
        &self.policy
    }

    /// Returns the policy.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> P {
        self.policy
    }

    /// Filters a fragment with the policy.
    ///
    /// # Errors
    ///
    /// See [`filter()`].
    #[inline]
    pub fn clean(&self, fragment: &str) -> Result<String> {
        filter(fragment, &self.policy)
    }
}
