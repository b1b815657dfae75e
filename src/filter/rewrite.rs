// Copyright 2022 Bryant Luk
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Writes accepted tokens, removing blank elements and disallowed attributes.

use crate::{
    error::EmitterError,
    policy::Policy,
    token::{Attribute, StartTag, Token},
    write::Emitter,
};

use super::LOG_TARGET;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(super) struct Rewriter {
    /// A blank candidate start tag which has not been written yet.
    pending: Option<String>,
}

impl Rewriter {
    #[inline]
    #[must_use]
    pub(super) fn pending_open_tag(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub(super) fn process<P, E>(
        &mut self,
        token: Token<'_>,
        policy: &P,
        emitter: &mut E,
    ) -> Result<(), EmitterError>
    where
        P: Policy + ?Sized,
        E: Emitter + ?Sized,
    {
        if let Some(pending) = self.pending.take() {
            if matches!(&token, Token::EndTag(tag) if tag.local() == pending) {
                log::trace!(target: LOG_TARGET, "removed blank <{pending}>");
                return Ok(());
            }
            emitter.write_start_element(&pending)?;
        }

        match token {
            Token::StartTag(tag) => self.start_tag(&tag, policy, emitter),
            Token::EndTag(tag) => {
                if !policy.is_self_closing_element(tag.local()) {
                    emitter.write_characters("")?;
                }
                emitter.write_end_element()
            }
            Token::Characters(text) => emitter.write_characters(&text),
            Token::EndOfStream => emitter.finish(),
        }
    }

    fn start_tag<P, E>(
        &mut self,
        tag: &StartTag<'_>,
        policy: &P,
        emitter: &mut E,
    ) -> Result<(), EmitterError>
    where
        P: Policy + ?Sized,
        E: Emitter + ?Sized,
    {
        let name = tag.local();

        // Blank means no attributes as written, before any are removed.
        if tag.attributes().is_empty() && policy.is_ignore_blank_tag(name) {
            self.pending = Some(name.to_string());
            return Ok(());
        }

        emitter.write_start_element(name)?;
        for attribute in tag.attributes() {
            if is_allowed(name, attribute, policy) {
                write_attribute(attribute, emitter)?;
            } else {
                log::debug!(
                    target: LOG_TARGET,
                    "removed attribute `{}` from <{name}>",
                    attribute.local()
                );
            }
        }
        Ok(())
    }
}

fn is_allowed<P>(tag: &str, attribute: &Attribute<'_>, policy: &P) -> bool
where
    P: Policy + ?Sized,
{
    let name = attribute.name();
    match name.prefix().filter(|_| name.is_prefixed()) {
        Some(prefix) => policy.is_allowed_namespaced_attribute(
            tag,
            prefix,
            name.namespace_uri().unwrap_or_default(),
            name.local(),
            attribute.value(),
        ),
        None => policy.is_allowed_attribute(tag, name.local(), attribute.value()),
    }
}

fn write_attribute<E>(attribute: &Attribute<'_>, emitter: &mut E) -> Result<(), EmitterError>
where
    E: Emitter + ?Sized,
{
    let name = attribute.name();
    match name.prefix().filter(|_| name.is_prefixed()) {
        Some(prefix) => emitter.write_namespaced_attribute(
            prefix,
            name.namespace_uri().unwrap_or_default(),
            name.local(),
            attribute.value(),
        ),
        None => emitter.write_attribute(name.local(), attribute.value()),
    }
}
