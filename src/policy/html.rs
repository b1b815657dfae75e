// Copyright 2022 Bryant Luk
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A table backed policy for a conservative subset of HTML.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::OnceLock,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Policy;
use crate::bytes::is_ncname;

const FRAME_TAG: &str = "iframe";
const IMAGE_TAG: &str = "img";
const INLINE_DATA_PREFIX: &str = "data:";

const NO_ATTRIBUTES: &[&str] = &[];
const STYLE_ATTRIBUTES: &[&str] = &["style"];

const DEFAULT_TAGS: &[(&str, &[&str])] = &[
    ("h1", NO_ATTRIBUTES),
    ("h2", NO_ATTRIBUTES),
    ("h3", NO_ATTRIBUTES),
    ("h4", NO_ATTRIBUTES),
    ("h5", NO_ATTRIBUTES),
    ("h6", NO_ATTRIBUTES),
    ("details", NO_ATTRIBUTES),
    ("summary", NO_ATTRIBUTES),
    ("table", &["cellpadding", "cellspacing", "style"]),
    ("td", NO_ATTRIBUTES),
    ("th", NO_ATTRIBUTES),
    ("tr", NO_ATTRIBUTES),
    ("tbody", NO_ATTRIBUTES),
    ("a", &["href"]),
    ("img", &["src", "width", "height", "alt", "style"]),
    ("b", NO_ATTRIBUTES),
    ("strong", NO_ATTRIBUTES),
    ("i", NO_ATTRIBUTES),
    ("em", NO_ATTRIBUTES),
    ("cite", NO_ATTRIBUTES),
    ("blockquote", NO_ATTRIBUTES),
    ("abbr", NO_ATTRIBUTES),
    ("acronym", NO_ATTRIBUTES),
    ("sub", NO_ATTRIBUTES),
    ("sup", NO_ATTRIBUTES),
    ("pre", NO_ATTRIBUTES),
    ("address", NO_ATTRIBUTES),
    ("object", &["width", "height", "style", "data", "type"]),
    ("iframe", &["width", "height", "style", "src"]),
    ("span", STYLE_ATTRIBUTES),
    ("div", &["width", "height", "style"]),
    ("p", STYLE_ATTRIBUTES),
    ("ul", STYLE_ATTRIBUTES),
    ("ol", STYLE_ATTRIBUTES),
    ("li", NO_ATTRIBUTES),
    ("br", NO_ATTRIBUTES),
];

const DEFAULT_SELF_CLOSING_TAGS: &[&str] = &["img", "br"];

const DEFAULT_IGNORE_BLANK_TAGS: &[&str] = &["p", "a", "b", "i", "u", "em", "strong", "img"];

const DEFAULT_PROTOCOL_ATTRIBUTES: &[&str] = &["href", "src", "rel"];

const DEFAULT_PROTOCOLS: &[&str] = &["http", "https", "mailto"];

const DEFAULT_IFRAME_SOURCES: &[&str] = &[
    "http://www.youtube.com/embed/",
    "https://www.youtube.com/embed/",
    "http://player.vimeo.com/video/",
    "https://player.vimeo.com/video/",
];

const DEFAULT_FAKE_ROOT: &str = "html";

/// A policy could not be built from its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// The synthetic root name is not a valid element name.
    #[error("fake root `{0}` is not a valid element name")]
    InvalidFakeRoot(String),
    /// An allowed protocol is empty.
    #[error("allowed protocols must not be empty strings")]
    EmptyProtocol,
}

/// The plain data behind an [`HtmlPolicy`].
///
/// The configuration can be serialized, so a profile can be kept in a file
/// and loaded with any serde format:
///
/// ```
/// use markup_filter::{filter, HtmlPolicy, PolicyConfig};
///
/// let config: PolicyConfig = serde_json::from_str(r#"{
///     "fake_root": "root",
///     "allowed_tags": { "p": [], "a": ["href"] },
///     "protocol_attributes": ["href"],
///     "allowed_protocols": ["https"]
/// }"#)?;
/// let policy = HtmlPolicy::from_config(config)?;
///
/// let output = filter(r#"<p><a href="http://x">x</a><a href="https://y">y</a></p>"#, &policy)?;
/// assert_eq!(output, r#"<p><a>x</a><a href="https://y">y</a></p>"#);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Name of the synthetic root wrapped around fragments.
    pub fake_root: Option<String>,
    /// Allowed tags mapped to the attributes allowed on them.
    pub allowed_tags: BTreeMap<String, BTreeSet<String>>,
    /// Tags which are written as `<tag/>` when empty.
    pub self_closing_tags: BTreeSet<String>,
    /// Tags which are removed when they have no attributes and no content.
    pub ignore_blank_tags: BTreeSet<String>,
    /// Attributes whose values must start with an allowed protocol.
    pub protocol_attributes: BTreeSet<String>,
    /// Allowed URL schemes like `https`.
    pub allowed_protocols: BTreeSet<String>,
    /// Allowed prefixes for `src` on `iframe`.
    pub allowed_iframe_sources: BTreeSet<String>,
}

/// A table backed [`Policy`] for user supplied HTML.
///
/// [`HtmlPolicy::default()`] is a conservative profile allowing basic text
/// formatting, lists, tables, links, images, and embedded video from a few
/// well known hosts. Fragments are wrapped in a synthetic `html` root.
///
/// # Attribute values
///
/// Attributes listed as protocol attributes (`href`, `src`, and `rel` by
/// default) are decided by their value alone:
///
/// * on `iframe`, the value must start with an allowed iframe source;
/// * on `img`, a value starting with `data:` is allowed;
/// * otherwise, the value must start with an allowed protocol followed by a
///   `:` (e.g. `https:`).
///
/// Every other attribute is allowed only if it is listed for the tag.
///
/// # Examples
///
/// ```
/// use markup_filter::{filter, HtmlPolicy};
///
/// let policy = HtmlPolicy::default();
///
/// let output = filter(
///     r#"<p onclick="x()">Hello <a href="javascript:alert(1)">there</a></p><script>evil()</script>"#,
///     &policy,
/// )?;
/// assert_eq!(output, "<p>Hello <a>there</a></p>");
/// # Ok::<(), markup_filter::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlPolicy {
    fake_root: Option<String>,
    allowed_tags: BTreeMap<String, BTreeSet<String>>,
    self_closing_tags: BTreeSet<String>,
    ignore_blank_tags: BTreeSet<String>,
    protocol_attributes: BTreeSet<String>,
    /// Stored with the trailing `:`.
    allowed_protocols: BTreeSet<String>,
    allowed_iframe_sources: BTreeSet<String>,
}

impl HtmlPolicy {
    /// Returns a builder for a policy which allows nothing.
    #[inline]
    #[must_use]
    pub fn builder() -> HtmlPolicyBuilder {
        HtmlPolicyBuilder::default()
    }

    /// Returns a builder initialized with this policy's tables.
    #[must_use]
    pub fn to_builder(&self) -> HtmlPolicyBuilder {
        HtmlPolicyBuilder {
            config: self.to_config(),
        }
    }

    /// Returns a process wide instance of the default profile.
    ///
    /// The instance is built on first use and never changes afterwards.
    #[must_use]
    pub fn shared() -> &'static HtmlPolicy {
        static SHARED: OnceLock<HtmlPolicy> = OnceLock::new();
        SHARED.get_or_init(HtmlPolicy::default)
    }

    /// Builds a policy from plain configuration data.
    ///
    /// # Errors
    ///
    /// If the fake root is not a valid element name or a protocol is empty.
    pub fn from_config(config: PolicyConfig) -> Result<Self, PolicyError> {
        if let Some(root) = &config.fake_root {
            if !is_ncname(root.as_bytes()) {
                return Err(PolicyError::InvalidFakeRoot(root.clone()));
            }
        }

        let allowed_protocols = config
            .allowed_protocols
            .into_iter()
            .map(|protocol| {
                let scheme = bare_scheme(&protocol);
                if scheme.is_empty() {
                    Err(PolicyError::EmptyProtocol)
                } else {
                    Ok(format!("{scheme}:"))
                }
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            fake_root: config.fake_root,
            allowed_tags: config.allowed_tags,
            self_closing_tags: config.self_closing_tags,
            ignore_blank_tags: config.ignore_blank_tags,
            protocol_attributes: config.protocol_attributes,
            allowed_protocols,
            allowed_iframe_sources: config.allowed_iframe_sources,
        })
    }

    /// Returns the plain data behind the policy.
    #[must_use]
    pub fn to_config(&self) -> PolicyConfig {
        PolicyConfig {
            fake_root: self.fake_root.clone(),
            allowed_tags: self.allowed_tags.clone(),
            self_closing_tags: self.self_closing_tags.clone(),
            ignore_blank_tags: self.ignore_blank_tags.clone(),
            protocol_attributes: self.protocol_attributes.clone(),
            allowed_protocols: self
                .allowed_protocols
                .iter()
                .map(|protocol| protocol.trim_end_matches(':').to_string())
                .collect(),
            allowed_iframe_sources: self.allowed_iframe_sources.clone(),
        }
    }

    #[inline]
    fn has_allowed_protocol(&self, value: &str) -> bool {
        self.allowed_protocols
            .iter()
            .any(|protocol| value.starts_with(protocol.as_str()))
    }

    #[inline]
    fn has_allowed_iframe_source(&self, value: &str) -> bool {
        self.allowed_iframe_sources
            .iter()
            .any(|source| value.starts_with(source.as_str()))
    }
}

impl Default for HtmlPolicy {
    fn default() -> Self {
        let mut builder = HtmlPolicy::builder();
        for (tag, attributes) in DEFAULT_TAGS {
            builder.allow_tag(*tag, attributes.iter().copied());
        }
        builder
            .self_closing_tags(DEFAULT_SELF_CLOSING_TAGS.iter().copied())
            .ignore_blank_tags(DEFAULT_IGNORE_BLANK_TAGS.iter().copied())
            .protocol_attributes(DEFAULT_PROTOCOL_ATTRIBUTES.iter().copied())
            .allowed_protocols(DEFAULT_PROTOCOLS.iter().copied())
            .allowed_iframe_sources(DEFAULT_IFRAME_SOURCES.iter().copied())
            .fake_root(Some(DEFAULT_FAKE_ROOT));

        match builder.build() {
            Ok(policy) => policy,
            Err(err) => unreachable!("default policy tables are valid: {err}"),
        }
    }
}

impl Policy for HtmlPolicy {
    fn is_allowed_tag(&self, tag: &str) -> bool {
        self.allowed_tags.contains_key(tag)
    }

    fn is_allowed_attribute(&self, tag: &str, attribute: &str, value: &str) -> bool {
        if self.protocol_attributes.contains(attribute) {
            if tag == FRAME_TAG {
                return self.has_allowed_iframe_source(value);
            }

            if tag == IMAGE_TAG && value.starts_with(INLINE_DATA_PREFIX) {
                return true;
            }

            return self.has_allowed_protocol(value);
        }

        // Unknown tags have no allowed attributes.
        self.allowed_tags
            .get(tag)
            .is_some_and(|attributes| attributes.contains(attribute))
    }

    fn is_self_closing_element(&self, tag: &str) -> bool {
        self.self_closing_tags.contains(tag)
    }

    fn is_ignore_blank_tag(&self, tag: &str) -> bool {
        self.ignore_blank_tags.contains(tag)
    }

    fn fake_root_name(&self) -> Option<&str> {
        self.fake_root.as_deref()
    }
}

/// Builds an [`HtmlPolicy`].
///
/// ```
/// use markup_filter::{filter, HtmlPolicy};
///
/// let mut builder = HtmlPolicy::default().to_builder();
/// builder
///     .allow_tag("code", ["class"])
///     .deny_tag("iframe")
///     .allowed_protocols(["ftp"]);
/// let policy = builder.build()?;
///
/// let output = filter(
///     r#"<code class="rust">fn</code><iframe src="https://www.youtube.com/embed/x"></iframe>"#,
///     &policy,
/// )?;
/// assert_eq!(output, r#"<code class="rust">fn</code>"#);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct HtmlPolicyBuilder {
    config: PolicyConfig,
}

impl HtmlPolicyBuilder {
    /// Allows a tag along with the given attributes.
    ///
    /// If the tag is already allowed, the attributes are added to the ones
    /// already allowed.
    pub fn allow_tag<I, S>(&mut self, tag: impl Into<String>, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .allowed_tags
            .entry(tag.into())
            .or_default()
            .extend(attributes.into_iter().map(Into::into));
        self
    }

    /// Disallows a tag and forgets its allowed attributes.
    pub fn deny_tag(&mut self, tag: &str) -> &mut Self {
        self.config.allowed_tags.remove(tag);
        self
    }

    /// Disallows an attribute on a tag.
    pub fn deny_attribute(&mut self, tag: &str, attribute: &str) -> &mut Self {
        if let Some(attributes) = self.config.allowed_tags.get_mut(tag) {
            attributes.remove(attribute);
        }
        self
    }

    /// Adds tags which are written in the self-closed form when empty.
    pub fn self_closing_tags<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .self_closing_tags
            .extend(tags.into_iter().map(Into::into));
        self
    }

    /// Adds tags which are removed when they are blank.
    pub fn ignore_blank_tags<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .ignore_blank_tags
            .extend(tags.into_iter().map(Into::into));
        self
    }

    /// Removes a tag from the blank tags.
    pub fn keep_blank_tag(&mut self, tag: &str) -> &mut Self {
        self.config.ignore_blank_tags.remove(tag);
        self
    }

    /// Adds attributes whose values are checked against the allowed protocols.
    pub fn protocol_attributes<I, S>(&mut self, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .protocol_attributes
            .extend(attributes.into_iter().map(Into::into));
        self
    }

    /// Adds allowed protocols like `https`.
    pub fn allowed_protocols<I, S>(&mut self, protocols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_protocols.extend(protocols.into_iter().map(|protocol| {
            let protocol = protocol.into();
            bare_scheme(&protocol).to_string()
        }));
        self
    }

    /// Removes an allowed protocol.
    pub fn deny_protocol(&mut self, protocol: &str) -> &mut Self {
        self.config.allowed_protocols.remove(bare_scheme(protocol));
        self
    }

    /// Adds allowed prefixes for `src` on `iframe`.
    pub fn allowed_iframe_sources<I, S>(&mut self, sources: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .allowed_iframe_sources
            .extend(sources.into_iter().map(Into::into));
        self
    }

    /// Sets or clears the synthetic root wrapped around fragments.
    pub fn fake_root<S: Into<String>>(&mut self, root: Option<S>) -> &mut Self {
        self.config.fake_root = root.map(Into::into);
        self
    }

    /// Builds the policy.
    ///
    /// # Errors
    ///
    /// If the fake root is not a valid element name or a protocol is empty.
    pub fn build(&self) -> Result<HtmlPolicy, PolicyError> {
        HtmlPolicy::from_config(self.config.clone())
    }
}

/// `https:` and `https` name the same protocol.
#[inline]
fn bare_scheme(protocol: &str) -> &str {
    protocol.strip_suffix(':').unwrap_or(protocol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tags() {
        let policy = HtmlPolicy::default();
        assert!(policy.is_allowed_tag("p"));
        assert!(policy.is_allowed_tag("iframe"));
        assert!(!policy.is_allowed_tag("script"));
        assert!(!policy.is_allowed_tag("u"));
        assert!(!policy.is_allowed_tag("P"));
        assert_eq!(policy.fake_root_name(), Some("html"));
        assert!(!policy.is_allowed_tag("html"));
    }

    #[test]
    fn default_attributes() {
        let policy = HtmlPolicy::default();
        assert!(policy.is_allowed_attribute("table", "cellpadding", "2"));
        assert!(policy.is_allowed_attribute("img", "alt", "x"));
        assert!(!policy.is_allowed_attribute("p", "onclick", "x()"));
        assert!(!policy.is_allowed_attribute("b", "style", "color: red"));
    }

    #[test]
    fn unknown_tag_attributes_are_denied() {
        let policy = HtmlPolicy::default();
        assert!(!policy.is_allowed_attribute("script", "type", "text/javascript"));
        assert!(!policy.is_allowed_attribute("", "", ""));
    }

    #[test]
    fn protocols() {
        let policy = HtmlPolicy::default();
        assert!(policy.is_allowed_attribute("a", "href", "http://example"));
        assert!(policy.is_allowed_attribute("a", "href", "https://example"));
        assert!(policy.is_allowed_attribute("a", "href", "mailto:a@b"));
        assert!(!policy.is_allowed_attribute("a", "href", "javascript:alert(1)"));
        assert!(!policy.is_allowed_attribute("a", "href", "httpx://example"));
        assert!(!policy.is_allowed_attribute("a", "href", "/relative"));
        assert!(!policy.is_allowed_attribute("a", "href", "HTTP://example"));
    }

    #[test]
    fn inline_images() {
        let policy = HtmlPolicy::default();
        assert!(policy.is_allowed_attribute("img", "src", "data:image/png;base64,AAAA"));
        assert!(!policy.is_allowed_attribute("a", "href", "data:text/html,x"));
    }

    #[test]
    fn iframe_sources() {
        let policy = HtmlPolicy::default();
        assert!(policy.is_allowed_attribute("iframe", "src", "https://www.youtube.com/embed/abc"));
        assert!(policy.is_allowed_attribute("iframe", "src", "http://player.vimeo.com/video/1"));
        assert!(!policy.is_allowed_attribute("iframe", "src", "https://evil.example/embed/"));
        assert!(!policy.is_allowed_attribute("iframe", "src", "data:text/html,x"));
        assert!(policy.is_allowed_attribute("iframe", "width", "640"));
    }

    #[test]
    fn namespaced_attributes_are_denied() {
        let policy = HtmlPolicy::default();
        assert!(!policy.is_allowed_namespaced_attribute(
            "a",
            "xlink",
            "http://www.w3.org/1999/xlink",
            "href",
            "https://example"
        ));
    }

    #[test]
    fn config_round_trip_keeps_schemes_bare() {
        let config = HtmlPolicy::default().to_config();
        assert!(config.allowed_protocols.contains("https"));
        assert!(!config.allowed_protocols.contains("https:"));
        assert_eq!(HtmlPolicy::from_config(config).unwrap(), HtmlPolicy::default());
    }

    #[test]
    fn protocols_may_be_written_with_colon() {
        let policy = HtmlPolicy::builder()
            .allow_tag("a", ["href"])
            .protocol_attributes(["href"])
            .allowed_protocols(["https:"])
            .build()
            .unwrap();
        assert!(policy.is_allowed_attribute("a", "href", "https://example"));
        assert!(!policy.is_allowed_attribute("a", "href", "https"));
    }

    #[test]
    fn deny_protocol_ignores_colon() {
        let policy = HtmlPolicy::builder()
            .allow_tag("a", ["href"])
            .protocol_attributes(["href"])
            .allowed_protocols(["https:", "mailto"])
            .deny_protocol("https")
            .deny_protocol("mailto:")
            .build()
            .unwrap();
        assert!(!policy.is_allowed_attribute("a", "href", "https://example"));
        assert!(!policy.is_allowed_attribute("a", "href", "mailto:a@example"));
        assert!(policy.to_config().allowed_protocols.is_empty());
    }

    #[test]
    fn rejects_invalid_config() {
        let err = HtmlPolicy::builder().fake_root(Some("a b")).build().unwrap_err();
        assert_eq!(err, PolicyError::InvalidFakeRoot("a b".to_string()));

        let err = HtmlPolicy::builder().allowed_protocols([":"]).build().unwrap_err();
        assert_eq!(err, PolicyError::EmptyProtocol);
    }

    #[test]
    fn builder_edits_tables() {
        let policy = HtmlPolicy::default()
            .to_builder()
            .deny_tag("iframe")
            .deny_attribute("img", "style")
            .keep_blank_tag("p")
            .deny_protocol("mailto")
            .fake_root(None::<String>)
            .build()
            .unwrap();

        assert!(!policy.is_allowed_tag("iframe"));
        assert!(!policy.is_allowed_attribute("img", "style", "x"));
        assert!(policy.is_allowed_attribute("img", "alt", "x"));
        assert!(!policy.is_ignore_blank_tag("p"));
        assert!(!policy.is_allowed_attribute("a", "href", "mailto:a@b"));
        assert_eq!(policy.fake_root_name(), None);
    }

    #[test]
    fn shared_is_default() {
        assert_eq!(HtmlPolicy::shared(), &HtmlPolicy::default());
        assert!(core::ptr::eq(HtmlPolicy::shared(), HtmlPolicy::shared()));
    }
}
