// Copyright 2022 Bryant Luk
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! MarkupFilter removes everything but an allow-list of elements and
//! attributes from untrusted [XML][xml]-like markup fragments.
//!
//! The library does 3 things:
//!
//! 1. A [`Reader`] turns a `&str` into a pull iterator of [`Token`]s like
//!    start tags, end tags, and character content.
//!
//! 2. The filter passes the tokens through a [`Policy`]. A disallowed
//!    element is removed together with everything inside of it. Disallowed
//!    attributes are removed from allowed elements. Blank elements like
//!    `<b></b>` can be removed entirely.
//!
//! 3. An [`Emitter`] like [`XmlWriter`] writes the remaining tokens back out
//!    as markup.
//!
//! # Usage
//!
//! In most cases, call [`filter()`] with a fragment and a policy.
//! [`HtmlPolicy`] is a conservative profile for user supplied HTML; it can be
//! changed with a [builder][HtmlPolicyBuilder] or loaded from a
//! [`PolicyConfig`].
//!
//! ```
//! use markup_filter::{filter, HtmlPolicy};
//!
//! let output = filter(
//!     r#"<p style="color: red" onmouseover="steal()">Hello
//! <a href="https://example.com">world</a><a href="javascript:steal()">!</a>
//! <script>steal()</script><b></b></p>"#,
//!     HtmlPolicy::shared(),
//! )?;
//!
//! assert_eq!(
//!     output,
//!     r#"<p style="color: red">Hello
//! <a href="https://example.com">world</a><a>!</a>
//! </p>"#
//! );
//! # Ok::<(), markup_filter::Error>(())
//! ```
//!
//! The lower level [`filter_tokens()`] accepts any token source and any
//! emitter.
//!
//! # Input
//!
//! Fragments are read as XML, not as HTML. Every element must be closed
//! (`<br/>`, not `<br>`), attribute values must be quoted, and only the
//! predefined entities (`&lt;`, `&gt;`, `&amp;`, `&quot;`, `&apos;`) and
//! character references like `&#160;` are understood. Input which is not
//! well-formed is rejected with an error instead of being repaired.
//!
//! [xml]: https://www.w3.org/TR/2006/REC-xml11-20060816/

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unused_lifetimes,
    unused_qualifications
)]

pub(crate) mod bytes;
mod error;
mod filter;
pub mod policy;
mod read;
pub mod token;
mod write;

pub use error::{EmitterError, Error, MalformedInputError, MalformedKind, Result};
pub use filter::{filter, filter_tokens, FilterRunState, Sanitizer};
pub use policy::{HtmlPolicy, HtmlPolicyBuilder, Policy, PolicyConfig, PolicyError};
pub use read::Reader;
pub use token::Token;
pub use write::{Emitter, XmlWriter};
