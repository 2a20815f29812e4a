//! Placeholder templates over precompressed fragments.
//!
//! A template is parsed once: the static texts between `start`/`end` tag
//! markers are DEFLATE-compressed up front, and every render stitches the
//! compressed texts together with the substituted values framed as stored
//! blocks. Rendering therefore never runs the compressor, and substituted
//! values never influence the output length of anything else in the stream,
//! which keeps secrets out of reach of compression-ratio side channels.
//! The rendered output is one complete raw RFC 1951 stream.

use std::collections::HashMap;
use std::io::{self, Write};

use thiserror::Error;

use crate::deflate::Deflater;
use crate::error::BuildError;
use crate::level::CompressionLevel;
use crate::sink::CountingWriter;
use crate::stored::StoredBlockWriter;

/// Errors reported while parsing a template.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TemplateError {
    /// Tag markers must be non-empty.
    #[error("template: start and end tag markers must not be empty")]
    EmptyTagMarker,

    /// A start marker had no matching end marker.
    #[error("template: missing end tag {end_tag:?} for the tag starting at byte {offset}")]
    MissingEndTag {
        /// The end marker that was searched for.
        end_tag: String,
        /// Byte offset of the unterminated tag's content.
        offset: usize,
    },

    /// The compression level is outside `[-2, 9]`.
    #[error(transparent)]
    Level(#[from] BuildError),

    /// The DEFLATE primitive failed while compressing a static text.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A parsed template whose static texts are compressed once.
///
/// Parsed templates are immutable and safe to render from many threads at
/// once.
#[derive(Debug)]
pub struct Template {
    /// The whole text, compressed and closed, when it contains no tags.
    template: Vec<u8>,
    /// Static texts around the tags; all sync-flushed except the last,
    /// which carries the stream's final block.
    texts: Vec<Vec<u8>>,
    tags: Vec<String>,
}

impl Template {
    /// Parses `template`, treating `start_tag`/`end_tag` as the placeholder
    /// markers and compressing the static texts at `level`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] for empty markers, an unterminated tag, an
    /// out-of-range level or a compressor failure.
    pub fn new(
        template: &str,
        start_tag: &str,
        end_tag: &str,
        level: i32,
    ) -> Result<Self, TemplateError> {
        let mut parsed = Self {
            template: Vec::new(),
            texts: Vec::new(),
            tags: Vec::new(),
        };
        parsed.reset(template, start_tag, end_tag, level)?;
        Ok(parsed)
    }

    /// Re-parses in place, reusing the existing allocations.
    ///
    /// On error the template's contents are unspecified; reset it again
    /// before rendering.
    ///
    /// # Errors
    ///
    /// As [`Template::new`].
    pub fn reset(
        &mut self,
        template: &str,
        start_tag: &str,
        end_tag: &str,
        level: i32,
    ) -> Result<(), TemplateError> {
        self.template.clear();
        self.texts.clear();
        self.tags.clear();

        if start_tag.is_empty() || end_tag.is_empty() {
            return Err(TemplateError::EmptyTagMarker);
        }
        let level = CompressionLevel::from_numeric(level)?;
        let mut deflater = Deflater::new(level);

        if !template.contains(start_tag) {
            deflater.write(&mut self.template, template.as_bytes())?;
            deflater.finish(&mut self.template)?;
            return Ok(());
        }

        let mut rest = template;
        loop {
            let mut text = Vec::new();
            deflater.reset();

            let Some(start) = rest.find(start_tag) else {
                deflater.write(&mut text, rest.as_bytes())?;
                deflater.finish(&mut text)?;
                self.texts.push(text);
                return Ok(());
            };

            deflater.write(&mut text, rest[..start].as_bytes())?;
            deflater.flush(&mut text)?;
            self.texts.push(text);

            rest = &rest[start + start_tag.len()..];
            let Some(end) = rest.find(end_tag) else {
                return Err(TemplateError::MissingEndTag {
                    end_tag: end_tag.to_string(),
                    offset: template.len() - rest.len(),
                });
            };
            self.tags.push(rest[..end].to_string());
            rest = &rest[end + end_tag.len()..];
        }
    }

    /// Renders the template into `writer`, substituting each tag with its
    /// entry in `values`.
    ///
    /// Tags without an entry substitute nothing. Returns the number of
    /// bytes written.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from `writer`.
    pub fn render<W: Write>(
        &self,
        writer: &mut W,
        values: &HashMap<&str, &[u8]>,
    ) -> io::Result<u64> {
        self.render_with(writer, |out, tag| match values.get(tag) {
            Some(value) => out.write_all(value),
            None => Ok(()),
        })
    }

    /// Renders the template, calling `substitute` for every tag occurrence.
    ///
    /// Everything the callback writes is framed as stored blocks, one per
    /// `write` call, split where a chunk exceeds the 64 KiB block limit.
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from `writer` or the callback.
    pub fn render_with<W, F>(&self, writer: &mut W, mut substitute: F) -> io::Result<u64>
    where
        W: Write,
        F: FnMut(&mut dyn Write, &str) -> io::Result<()>,
    {
        if self.texts.is_empty() {
            writer.write_all(&self.template)?;
            return Ok(self.template.len() as u64);
        }

        let mut counting = CountingWriter::new(writer);
        let last = self.texts.len() - 1;
        for (text, tag) in self.texts[..last].iter().zip(&self.tags) {
            counting.write_all(text)?;
            let mut framed = StoredBlockWriter::new(&mut counting);
            substitute(&mut framed, tag)?;
        }
        counting.write_all(&self.texts[last])?;
        Ok(counting.bytes())
    }

    /// Renders into a fresh buffer.
    ///
    /// # Errors
    ///
    /// As [`Template::render`].
    pub fn render_to_vec(&self, values: &HashMap<&str, &[u8]>) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.render(&mut out, values)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    use flate2::read::DeflateDecoder;

    use crate::level::DEFAULT_COMPRESSION;

    fn inflate(bytes: &[u8]) -> Vec<u8> {
        let mut decoded = Vec::new();
        DeflateDecoder::new(bytes)
            .read_to_end(&mut decoded)
            .expect("valid deflate stream");
        decoded
    }

    fn values<'a>(pairs: &[(&'a str, &'a [u8])]) -> HashMap<&'a str, &'a [u8]> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn renders_without_tags() {
        let template =
            Template::new("no placeholders here", "{", "}", DEFAULT_COMPRESSION).expect("parse");
        let out = template.render_to_vec(&HashMap::new()).expect("render");
        assert_eq!(inflate(&out), b"no placeholders here");
    }

    #[test]
    fn substitutes_tags_in_order() {
        let template =
            Template::new("Hello {name}, welcome to {place}!", "{", "}", DEFAULT_COMPRESSION)
                .expect("parse");
        let out = template
            .render_to_vec(&values(&[("name", b"Ada"), ("place", b"the archive")]))
            .expect("render");
        assert_eq!(inflate(&out), b"Hello Ada, welcome to the archive!");
    }

    #[test]
    fn missing_values_substitute_nothing() {
        let template = Template::new("a[x]b", "[", "]", DEFAULT_COMPRESSION).expect("parse");
        let out = template.render_to_vec(&HashMap::new()).expect("render");
        assert_eq!(inflate(&out), b"ab");
    }

    #[test]
    fn handles_adjacent_and_trailing_tags() {
        let template = Template::new("{a}{b} tail {c}", "{", "}", DEFAULT_COMPRESSION)
            .expect("parse");
        let out = template
            .render_to_vec(&values(&[("a", b"1"), ("b", b"2"), ("c", b"3")]))
            .expect("render");
        assert_eq!(inflate(&out), b"12 tail 3");
    }

    #[test]
    fn oversize_values_split_into_multiple_blocks() {
        let template = Template::new("<%v%>", "<%", "%>", DEFAULT_COMPRESSION).expect("parse");
        let big = vec![0x42u8; 70_000];
        let out = template
            .render_to_vec(&values(&[("v", big.as_slice())]))
            .expect("render");
        assert_eq!(inflate(&out), big);
    }

    #[test]
    fn render_reports_bytes_written() {
        let template = Template::new("x{t}y", "{", "}", DEFAULT_COMPRESSION).expect("parse");
        let mut out = Vec::new();
        let written = template
            .render(&mut out, &values(&[("t", b"value")]))
            .expect("render");
        assert_eq!(written, out.len() as u64);
    }

    #[test]
    fn unterminated_tag_is_an_error() {
        let err = Template::new("intro {tag without end", "{", "}", DEFAULT_COMPRESSION)
            .expect_err("parse failure");
        assert!(matches!(err, TemplateError::MissingEndTag { .. }));
    }

    #[test]
    fn empty_markers_are_an_error() {
        let err = Template::new("text", "", "}", DEFAULT_COMPRESSION).expect_err("parse failure");
        assert!(matches!(err, TemplateError::EmptyTagMarker));
    }

    #[test]
    fn invalid_level_is_an_error() {
        let err = Template::new("text", "{", "}", 64).expect_err("parse failure");
        assert!(matches!(
            err,
            TemplateError::Level(BuildError::InvalidCompressionLevel(64))
        ));
    }

    #[test]
    fn reset_reuses_the_template() {
        let mut template = Template::new("first {t}", "{", "}", DEFAULT_COMPRESSION)
            .expect("parse");
        template
            .reset("second {t}!", "{", "}", DEFAULT_COMPRESSION)
            .expect("reparse");
        let out = template
            .render_to_vec(&values(&[("t", b"run")]))
            .expect("render");
        assert_eq!(inflate(&out), b"second run!");
    }

    #[test]
    fn render_with_callback_substitution() {
        let template = Template::new("[[who]] says [[what]]", "[[", "]]", DEFAULT_COMPRESSION)
            .expect("parse");
        let mut out = Vec::new();
        template
            .render_with(&mut out, |w, tag| {
                w.write_all(tag.to_uppercase().as_bytes())
            })
            .expect("render");
        assert_eq!(inflate(&out), b"WHO says WHAT");
    }
}
