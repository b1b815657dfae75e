// Copyright 2022 Bryant Luk
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Writes filtered tokens back out as markup.

use std::io;

use crate::{bytes::is_ncname, error::EmitterError};

const XML_PREFIX: &str = "xml";

/// A sink for the events the filter produces.
///
/// The calls made by the filter are always balanced: every start element is
/// eventually matched by [`write_end_element()`][Emitter::write_end_element],
/// and attributes are only written directly after a start element.
pub trait Emitter {
    /// Opens an element with an unprefixed name.
    ///
    /// # Errors
    ///
    /// If the name is invalid or the underlying sink fails.
    fn write_start_element(&mut self, local: &str) -> Result<(), EmitterError>;

    /// Opens an element with a prefixed name in a namespace.
    ///
    /// # Errors
    ///
    /// If the name is invalid or the underlying sink fails.
    fn write_namespaced_start_element(
        &mut self,
        prefix: &str,
        namespace_uri: &str,
        local: &str,
    ) -> Result<(), EmitterError>;

    /// Writes an unprefixed attribute on the element just opened.
    ///
    /// # Errors
    ///
    /// If no start element is open, the name is invalid, or the underlying
    /// sink fails.
    fn write_attribute(&mut self, local: &str, value: &str) -> Result<(), EmitterError>;

    /// Writes a prefixed attribute on the element just opened.
    ///
    /// # Errors
    ///
    /// If no start element is open, the name is invalid, or the underlying
    /// sink fails.
    fn write_namespaced_attribute(
        &mut self,
        prefix: &str,
        namespace_uri: &str,
        local: &str,
        value: &str,
    ) -> Result<(), EmitterError>;

    /// Writes character content. Writing empty content still ends the
    /// current start tag.
    ///
    /// # Errors
    ///
    /// If the underlying sink fails.
    fn write_characters(&mut self, text: &str) -> Result<(), EmitterError>;

    /// Closes the innermost open element.
    ///
    /// # Errors
    ///
    /// If there is no open element or the underlying sink fails.
    fn write_end_element(&mut self) -> Result<(), EmitterError>;

    /// Closes every open element and flushes the output.
    ///
    /// # Errors
    ///
    /// If the underlying sink fails.
    fn finish(&mut self) -> Result<(), EmitterError>;
}

impl<E: Emitter + ?Sized> Emitter for &mut E {
    #[inline]
    fn write_start_element(&mut self, local: &str) -> Result<(), EmitterError> {
        (**self).write_start_element(local)
    }

    #[inline]
    fn write_namespaced_start_element(
        &mut self,
        prefix: &str,
        namespace_uri: &str,
        local: &str,
    ) -> Result<(), EmitterError> {
        (**self).write_namespaced_start_element(prefix, namespace_uri, local)
    }

    #[inline]
    fn write_attribute(&mut self, local: &str, value: &str) -> Result<(), EmitterError> {
        (**self).write_attribute(local, value)
    }

    #[inline]
    fn write_namespaced_attribute(
        &mut self,
        prefix: &str,
        namespace_uri: &str,
        local: &str,
        value: &str,
    ) -> Result<(), EmitterError> {
        (**self).write_namespaced_attribute(prefix, namespace_uri, local, value)
    }

    #[inline]
    fn write_characters(&mut self, text: &str) -> Result<(), EmitterError> {
        (**self).write_characters(text)
    }

    #[inline]
    fn write_end_element(&mut self) -> Result<(), EmitterError> {
        (**self).write_end_element()
    }

    #[inline]
    fn finish(&mut self) -> Result<(), EmitterError> {
        (**self).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenElement {
    /// The name as written, including any prefix.
    name: String,
    /// Prefixes declared on the element and their namespaces.
    declared: Vec<(String, String)>,
}

/// Writes markup to an [`io::Write`] sink.
///
/// A start tag is kept open until the next call decides how it ends. If the
/// element is closed right away, it is written in the self-closed form
/// (`<br/>`). Writing text, even empty text, ends the start tag with `>` so
/// the element gets an explicit end tag (`<span></span>`).
///
/// Text and attribute values are escaped so reading the output yields the
/// written values.
///
/// # Examples
///
/// ```
/// use markup_filter::{Emitter, XmlWriter};
///
/// let mut writer = XmlWriter::new(Vec::new());
/// writer.write_start_element("p")?;
/// writer.write_attribute("title", "a \"quote\"")?;
/// writer.write_characters("1 < 2")?;
/// writer.write_start_element("br")?;
/// writer.write_end_element()?;
/// writer.write_start_element("span")?;
/// writer.write_characters("")?;
/// writer.finish()?;
///
/// assert_eq!(
///     writer.into_inner(),
///     br#"<p title="a &quot;quote&quot;">1 &lt; 2<br/><span></span></p>"#
/// );
/// # Ok::<(), markup_filter::EmitterError>(())
/// ```
#[derive(Debug)]
pub struct XmlWriter<W> {
    writer: W,
    open: Vec<OpenElement>,
    in_start_tag: bool,
}

impl<W: io::Write> XmlWriter<W> {
    /// Creates a new instance writing to `writer`.
    #[inline]
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            open: Vec::new(),
            in_start_tag: false,
        }
    }

    /// The number of currently open elements.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Returns the underlying sink.
    ///
    /// Elements which are still open are not closed. Call
    /// [`finish()`][Emitter::finish] first.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn end_start_tag(&mut self) -> io::Result<()> {
        if self.in_start_tag {
            self.in_start_tag = false;
            self.writer.write_all(b">")?;
        }
        Ok(())
    }

    fn open_element(&mut self, name: String) -> Result<(), EmitterError> {
        self.end_start_tag()?;
        self.writer.write_all(b"<")?;
        self.writer.write_all(name.as_bytes())?;
        self.open.push(OpenElement {
            name,
            declared: Vec::new(),
        });
        self.in_start_tag = true;
        Ok(())
    }

    fn write_attribute_raw(&mut self, name: &str, value: &str) -> io::Result<()> {
        self.writer.write_all(b" ")?;
        self.writer.write_all(name.as_bytes())?;
        self.writer.write_all(b"=\"")?;
        write_escaped(&mut self.writer, value, true)?;
        self.writer.write_all(b"\"")
    }

    fn lookup(&self, prefix: &str) -> Option<&str> {
        self.open
            .iter()
            .rev()
            .flat_map(|element| element.declared.iter().rev())
            .find(|(declared, _)| declared == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Declares `prefix` on the current element unless it is already bound to
    /// `namespace_uri`. An empty prefix is the default namespace.
    fn declare(&mut self, prefix: &str, namespace_uri: &str) -> Result<(), EmitterError> {
        if prefix == XML_PREFIX || self.lookup(prefix) == Some(namespace_uri) {
            return Ok(());
        }

        let Some(current) = self.open.last_mut() else {
            return Err(EmitterError::NoOpenStartTag);
        };
        if current.declared.iter().any(|(declared, _)| declared == prefix) {
            return Err(EmitterError::ConflictingPrefix(prefix.to_string()));
        }
        current
            .declared
            .push((prefix.to_string(), namespace_uri.to_string()));

        if prefix.is_empty() {
            self.write_attribute_raw("xmlns", namespace_uri)?;
        } else {
            self.write_attribute_raw(&format!("xmlns:{prefix}"), namespace_uri)?;
        }
        Ok(())
    }
}

impl<W: io::Write> Emitter for XmlWriter<W> {
    fn write_start_element(&mut self, local: &str) -> Result<(), EmitterError> {
        check_name(local)?;
        self.open_element(local.to_string())
    }

    fn write_namespaced_start_element(
        &mut self,
        prefix: &str,
        namespace_uri: &str,
        local: &str,
    ) -> Result<(), EmitterError> {
        check_name(local)?;
        if prefix.is_empty() {
            self.open_element(local.to_string())?;
        } else {
            check_name(prefix)?;
            self.open_element(format!("{prefix}:{local}"))?;
        }
        self.declare(prefix, namespace_uri)
    }

    fn write_attribute(&mut self, local: &str, value: &str) -> Result<(), EmitterError> {
        if !self.in_start_tag {
            return Err(EmitterError::NoOpenStartTag);
        }
        check_name(local)?;
        self.write_attribute_raw(local, value)?;
        Ok(())
    }

    fn write_namespaced_attribute(
        &mut self,
        prefix: &str,
        namespace_uri: &str,
        local: &str,
        value: &str,
    ) -> Result<(), EmitterError> {
        if prefix.is_empty() {
            return self.write_attribute(local, value);
        }
        if !self.in_start_tag {
            return Err(EmitterError::NoOpenStartTag);
        }
        check_name(prefix)?;
        check_name(local)?;
        self.declare(prefix, namespace_uri)?;
        self.write_attribute_raw(&format!("{prefix}:{local}"), value)?;
        Ok(())
    }

    fn write_characters(&mut self, text: &str) -> Result<(), EmitterError> {
        self.end_start_tag()?;
        write_escaped(&mut self.writer, text, false)?;
        Ok(())
    }

    fn write_end_element(&mut self) -> Result<(), EmitterError> {
        let Some(element) = self.open.pop() else {
            return Err(EmitterError::Unbalanced);
        };

        if self.in_start_tag {
            self.in_start_tag = false;
            self.writer.write_all(b"/>")?;
        } else {
            self.writer.write_all(b"</")?;
            self.writer.write_all(element.name.as_bytes())?;
            self.writer.write_all(b">")?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EmitterError> {
        while !self.open.is_empty() {
            self.write_end_element()?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[inline]
fn check_name(name: &str) -> Result<(), EmitterError> {
    if is_ncname(name.as_bytes()) {
        Ok(())
    } else {
        Err(EmitterError::InvalidName(name.to_string()))
    }
}

fn write_escaped<W: io::Write>(writer: &mut W, text: &str, in_attribute: bool) -> io::Result<()> {
    let mut last = 0;
    for (index, byte) in text.bytes().enumerate() {
        let replacement: &[u8] = match byte {
            b'&' => b"&amp;",
            b'<' => b"&lt;",
            b'>' => b"&gt;",
            b'\r' => b"&#13;",
            b'"' if in_attribute => b"&quot;",
            b'\t' if in_attribute => b"&#9;",
            b'\n' if in_attribute => b"&#10;",
            _ => continue,
        };
        writer.write_all(&text.as_bytes()[last..index])?;
        writer.write_all(replacement)?;
        last = index + 1;
    }
    writer.write_all(&text.as_bytes()[last..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(f: impl FnOnce(&mut XmlWriter<Vec<u8>>) -> Result<(), EmitterError>) -> String {
        let mut writer = XmlWriter::new(Vec::new());
        f(&mut writer).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn empty_element_is_self_closed() {
        let out = written(|w| {
            w.write_start_element("br")?;
            w.write_end_element()
        });
        assert_eq!(out, "<br/>");
    }

    #[test]
    fn empty_text_forces_end_tag() {
        let out = written(|w| {
            w.write_start_element("span")?;
            w.write_characters("")?;
            w.write_end_element()
        });
        assert_eq!(out, "<span></span>");
    }

    #[test]
    fn nested_elements() {
        let out = written(|w| {
            w.write_start_element("p")?;
            w.write_attribute("style", "x")?;
            w.write_start_element("b")?;
            w.write_characters("bold")?;
            w.write_end_element()?;
            w.write_characters("!")?;
            w.write_end_element()
        });
        assert_eq!(out, r#"<p style="x"><b>bold</b>!</p>"#);
    }

    #[test]
    fn text_outside_elements() {
        let out = written(|w| {
            w.write_characters("a ")?;
            w.write_start_element("i")?;
            w.write_characters("b")?;
            w.write_end_element()?;
            w.write_characters(" c")
        });
        assert_eq!(out, "a <i>b</i> c");
    }

    #[test]
    fn escapes_text() {
        let out = written(|w| w.write_characters("<a> & \"b\"\r\n\t'"));
        assert_eq!(out, "&lt;a&gt; &amp; \"b\"&#13;\n\t'");
    }

    #[test]
    fn escapes_attribute_values() {
        let out = written(|w| {
            w.write_start_element("a")?;
            w.write_attribute("title", "<\"&'>\t\n\r")?;
            w.write_end_element()
        });
        assert_eq!(out, r#"<a title="&lt;&quot;&amp;'&gt;&#9;&#10;&#13;"/>"#);
    }

    #[test]
    fn declares_attribute_namespaces() {
        let out = written(|w| {
            w.write_start_element("a")?;
            w.write_namespaced_attribute("x", "urn:x", "one", "1")?;
            w.write_namespaced_attribute("x", "urn:x", "two", "2")?;
            w.write_namespaced_attribute("xml", "http://www.w3.org/XML/1998/namespace", "lang", "en")?;
            w.write_start_element("b")?;
            w.write_namespaced_attribute("x", "urn:x", "three", "3")?;
            w.write_end_element()?;
            w.write_end_element()?;
            w.write_start_element("c")?;
            w.write_namespaced_attribute("x", "urn:x", "four", "4")?;
            w.write_end_element()
        });
        assert_eq!(
            out,
            concat!(
                r#"<a xmlns:x="urn:x" x:one="1" x:two="2" xml:lang="en">"#,
                r#"<b x:three="3"/></a>"#,
                r#"<c xmlns:x="urn:x" x:four="4"/>"#,
            )
        );
    }

    #[test]
    fn namespaced_elements() {
        let out = written(|w| {
            w.write_namespaced_start_element("svg", "http://www.w3.org/2000/svg", "svg")?;
            w.write_namespaced_start_element("", "urn:d", "g")?;
            w.write_end_element()?;
            w.write_end_element()
        });
        assert_eq!(
            out,
            r#"<svg:svg xmlns:svg="http://www.w3.org/2000/svg"><g xmlns="urn:d"/></svg:svg>"#
        );
    }

    #[test]
    fn conflicting_prefix() {
        let mut writer = XmlWriter::new(Vec::new());
        writer.write_start_element("a").unwrap();
        writer.write_namespaced_attribute("x", "urn:1", "b", "").unwrap();
        let err = writer
            .write_namespaced_attribute("x", "urn:2", "c", "")
            .unwrap_err();
        assert!(matches!(err, EmitterError::ConflictingPrefix(prefix) if prefix == "x"));
    }

    #[test]
    fn finish_closes_open_elements() {
        let out = written(|w| {
            w.write_start_element("a")?;
            w.write_start_element("b")?;
            w.write_characters("x")?;
            w.write_start_element("c")?;
            w.finish()
        });
        assert_eq!(out, "<a><b>x<c/></b></a>");
    }

    #[test]
    fn unbalanced() {
        let mut writer = XmlWriter::new(Vec::new());
        assert!(matches!(
            writer.write_end_element(),
            Err(EmitterError::Unbalanced)
        ));
    }

    #[test]
    fn attribute_after_content() {
        let mut writer = XmlWriter::new(Vec::new());
        assert!(matches!(
            writer.write_attribute("a", "b"),
            Err(EmitterError::NoOpenStartTag)
        ));

        writer.write_start_element("p").unwrap();
        writer.write_characters("x").unwrap();
        assert!(matches!(
            writer.write_attribute("a", "b"),
            Err(EmitterError::NoOpenStartTag)
        ));
    }

    #[test]
    fn rejects_invalid_names() {
        let mut writer = XmlWriter::new(Vec::new());
        assert!(matches!(
            writer.write_start_element("a onclick=\"x()\""),
            Err(EmitterError::InvalidName(_))
        ));
        assert!(matches!(
            writer.write_start_element(""),
            Err(EmitterError::InvalidName(_))
        ));
        writer.write_start_element("a").unwrap();
        assert!(matches!(
            writer.write_attribute("x:y", "z"),
            Err(EmitterError::InvalidName(_))
        ));
        assert_eq!(writer.depth(), 1);
    }

    #[test]
    fn forwards_through_mut_ref() {
        fn emit_break(mut emitter: impl Emitter) -> Result<(), EmitterError> {
            emitter.write_start_element("br")?;
            emitter.finish()
        }

        let mut writer = XmlWriter::new(Vec::new());
        emit_break(&mut writer).unwrap();
        assert_eq!(writer.into_inner(), b"<br/>");
    }

    #[test]
    fn io_errors() {
        struct Broken;

        impl io::Write for Broken {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "broken"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut writer = XmlWriter::new(Broken);
        assert!(matches!(
            writer.write_start_element("a"),
            Err(EmitterError::Io(_))
        ));
    }
}
