// Copyright 2022 Bryant Luk
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The questions the filter asks about tags and attributes.
//!
//! A [`Policy`] is a set of pure predicates. The filter never mutates a
//! policy, so a fully built policy can be shared by any number of concurrent
//! filter calls.
//!
//! # Default-deny
//!
//! Every predicate must answer for *any* input, including tag and attribute
//! names the policy has never heard of. The answer for an unknown name must be
//! `false`. A policy which panics on an unknown name is a bug in the policy;
//! the filter does not try to recover from it.

use std::{rc::Rc, sync::Arc};

pub mod html;

pub use html::{HtmlPolicy, HtmlPolicyBuilder, PolicyConfig, PolicyError};

/// Decides which tags and attributes survive filtering.
///
/// Tag names are always the local part of the element's name.
///
/// # Examples
///
/// ```
/// use markup_filter::{filter, Policy};
///
/// struct TextOnly;
///
/// impl Policy for TextOnly {
///     fn is_allowed_tag(&self, tag: &str) -> bool {
///         matches!(tag, "b" | "i")
///     }
///
///     fn is_allowed_attribute(&self, _tag: &str, _attribute: &str, _value: &str) -> bool {
///         false
///     }
///
///     fn is_self_closing_element(&self, _tag: &str) -> bool {
///         false
///     }
///
///     fn is_ignore_blank_tag(&self, _tag: &str) -> bool {
///         true
///     }
///
///     fn fake_root_name(&self) -> Option<&str> {
///         Some("root")
///     }
/// }
///
/// let output = filter(r#"<b id="x">bold</b><i></i> and <u><b>gone</b></u>"#, &TextOnly)?;
/// assert_eq!(output, "<b>bold</b> and ");
/// # Ok::<(), markup_filter::Error>(())
/// ```
pub trait Policy {
    /// Returns true if elements with the tag may appear in the output.
    ///
    /// A disallowed element is removed together with everything inside it.
    fn is_allowed_tag(&self, tag: &str) -> bool;

    /// Returns true if an attribute without a namespace prefix may be kept.
    fn is_allowed_attribute(&self, tag: &str, attribute: &str, value: &str) -> bool;

    /// Returns true if a prefixed attribute may be kept.
    ///
    /// The default implementation disallows every namespaced attribute.
    #[allow(unused_variables)]
    fn is_allowed_namespaced_attribute(
        &self,
        tag: &str,
        prefix: &str,
        namespace_uri: &str,
        attribute: &str,
        value: &str,
    ) -> bool {
        false
    }

    /// Returns true if an empty element with the tag may be written in the
    /// self-closed form like `<br/>`.
    fn is_self_closing_element(&self, tag: &str) -> bool;

    /// Returns true if an element with the tag is removed when it has no
    /// attributes and no content, like `<b></b>`.
    fn is_ignore_blank_tag(&self, tag: &str) -> bool;

    /// The name of a synthetic root element wrapped around the fragment
    /// before it is read.
    ///
    /// Wrapping lets fragments with several top level elements or with top
    /// level text be filtered. The root is never written to the output and
    /// is never passed to any other predicate.
    fn fake_root_name(&self) -> Option<&str> {
        None
    }
}

macro_rules! forward_policy {
    ($ty:ty) => {
        impl<P: Policy + ?Sized> Policy for $ty {
            #[inline]
            fn is_allowed_tag(&self, tag: &str) -> bool {
                (**self).is_allowed_tag(tag)
            }

            #[inline]
            fn is_allowed_attribute(&self, tag: &str, attribute: &str, value: &str) -> bool {
                (**self).is_allowed_attribute(tag, attribute, value)
            }

            #[inline]
            fn is_allowed_namespaced_attribute(
                &self,
                tag: &str,
                prefix: &str,
                namespace_uri: &str,
                attribute: &str,
                value: &str,
            ) -> bool {
                (**self).is_allowed_namespaced_attribute(tag, prefix, namespace_uri, attribute, value)
            }

            #[inline]
            fn is_self_closing_element(&self, tag: &str) -> bool {
                (**self).is_self_closing_element(tag)
            }

            #[inline]
            fn is_ignore_blank_tag(&self, tag: &str) -> bool {
                (**self).is_ignore_blank_tag(tag)
            }

            #[inline]
            fn fake_root_name(&self) -> Option<&str> {
                (**self).fake_root_name()
            }
        }
    };
}

forward_policy!(&P);
forward_policy!(Box<P>);
forward_policy!(Rc<P>);
forward_policy!(Arc<P>);
