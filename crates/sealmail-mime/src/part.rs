//! Owned MIME tree with canonical serialization
//!
//! Bodies are stored decoded. [`MimePart::to_bytes`] applies the declared
//! `Content-Transfer-Encoding` and always emits CRLF line endings, so the
//! same tree serializes to the same bytes every time. Signatures are
//! computed over that output.

use crate::content_type::ContentType;
use crate::error::{MimeError, Result};
use base64::Engine;
use mail_parser::{MessageParser, MimeHeaders, PartType};
use tracing::{debug, trace};

const BASE64_LINE_LENGTH: usize = 76;
const QP_LINE_LENGTH: usize = 76;

/// A single header field, value stored unfolded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Case-insensitive name comparison
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// `Content-*` headers describe the entity rather than the message
    pub fn is_content_header(&self) -> bool {
        self.name
            .get(..8)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("content-"))
    }
}

/// Children of a multipart entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    /// Subtype such as `mixed` or `signed`
    pub subtype: String,
    pub boundary: String,
    pub parts: Vec<MimePart>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Decoded leaf content
    Bytes(Vec<u8>),
    Multipart(Multipart),
}

impl Default for Body {
    fn default() -> Self {
        Self::Bytes(Vec::new())
    }
}

/// A MIME entity: ordered headers plus a body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimePart {
    headers: Vec<Header>,
    body: Body,
}

impl MimePart {
    pub fn new(headers: Vec<Header>, body: Body) -> Self {
        Self { headers, body }
    }

    /// Single-part entity with the given `Content-Type`
    pub fn leaf(content_type: &str, content: impl Into<Vec<u8>>) -> Self {
        Self {
            headers: vec![Header::new("Content-Type", content_type)],
            body: Body::Bytes(content.into()),
        }
    }

    /// Multipart entity; the `Content-Type` carries the boundary
    pub fn multipart(subtype: &str, boundary: &str, parts: Vec<Self>) -> Self {
        Self {
            headers: vec![Header::new(
                "Content-Type",
                format!("multipart/{subtype}; boundary=\"{boundary}\""),
            )],
            body: Body::Multipart(Multipart {
                subtype: subtype.to_string(),
                boundary: boundary.to_string(),
                parts,
            }),
        }
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// First value of a header, by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.is(name))
            .map(|h| h.value.as_str())
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push(Header::new(name, value));
    }

    /// Replace every occurrence of a header with a single value
    ///
    /// The header keeps the position of its first occurrence.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.headers.iter().position(|h| h.is(name)) {
            Some(index) => {
                self.headers[index].value = value;
                let mut seen = 0usize;
                self.headers.retain(|h| {
                    if h.is(name) {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.headers.push(Header::new(name, value)),
        }
    }

    /// Remove every occurrence of a header, returning how many were removed
    pub fn remove_header(&mut self, name: &str) -> usize {
        let before = self.headers.len();
        self.headers.retain(|h| !h.is(name));
        before - self.headers.len()
    }

    pub fn retain_headers(&mut self, keep: impl FnMut(&Header) -> bool) {
        self.headers.retain(keep);
    }

    /// Parsed `Content-Type`, `text/plain` when absent
    pub fn content_type(&self) -> ContentType {
        self.header("Content-Type")
            .map(ContentType::parse)
            .unwrap_or_default()
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    /// Child parts when this is a multipart entity
    pub fn children(&self) -> &[Self] {
        match &self.body {
            Body::Multipart(multipart) => &multipart.parts,
            Body::Bytes(_) => &[],
        }
    }

    /// Canonical wire form of this entity
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut Vec<u8>) {
        for header in &self.headers {
            out.extend_from_slice(header.name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(header.value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");

        match &self.body {
            Body::Bytes(content) => {
                let encoding = self
                    .header("Content-Transfer-Encoding")
                    .map(|e| e.trim().to_ascii_lowercase());
                encode_body(out, content, encoding.as_deref());
            }
            Body::Multipart(multipart) => {
                for part in &multipart.parts {
                    out.extend_from_slice(b"--");
                    out.extend_from_slice(multipart.boundary.as_bytes());
                    out.extend_from_slice(b"\r\n");
                    part.write_into(out);
                    out.extend_from_slice(b"\r\n");
                }
                out.extend_from_slice(b"--");
                out.extend_from_slice(multipart.boundary.as_bytes());
                out.extend_from_slice(b"--\r\n");
            }
        }
    }

    /// Every boundary used in this tree, outermost first
    pub fn boundaries(&self) -> Vec<&str> {
        let mut found = Vec::new();
        collect_boundaries(self, &mut found);
        found
    }

    /// Parse a raw RFC 5322 message or MIME entity
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let message = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| MimeError::Parse("Failed to parse MIME message".to_string()))?;

        trace!(
            "Parsed MIME message: {} bytes, {} parts",
            raw.len(),
            message.parts.len()
        );

        let root = message
            .parts
            .first()
            .ok_or_else(|| MimeError::Parse("MIME message has no parts".to_string()))?;

        let part = convert_part(raw, &message, root)?;
        debug!("Converted MIME tree with {} top-level children", part.children().len());
        Ok(part)
    }
}

fn collect_boundaries<'a>(part: &'a MimePart, found: &mut Vec<&'a str>) {
    if let Body::Multipart(multipart) = &part.body {
        found.push(&multipart.boundary);
        for child in &multipart.parts {
            collect_boundaries(child, found);
        }
    }
}

fn convert_part(
    raw: &[u8],
    message: &mail_parser::Message<'_>,
    part: &mail_parser::MessagePart<'_>,
) -> Result<MimePart> {
    let headers = part
        .headers
        .iter()
        .map(|h| Header::new(h.name.as_str(), raw_header_value(raw, h)))
        .collect::<Vec<_>>();

    let body = match &part.body {
        PartType::Multipart(ids) => {
            let content_type = part
                .content_type()
                .map(ContentType::from)
                .unwrap_or_default();
            let boundary = content_type.boundary().ok_or_else(|| {
                MimeError::Parse("Multipart entity without boundary".to_string())
            })?;

            let parts = ids
                .iter()
                .map(|id| {
                    let child = message.parts.get(*id as usize).ok_or_else(|| {
                        MimeError::Parse(format!("Missing MIME part {id}"))
                    })?;
                    convert_part(raw, message, child)
                })
                .collect::<Result<Vec<_>>>()?;

            Body::Multipart(Multipart {
                subtype: content_type.subtype().to_string(),
                boundary: boundary.to_string(),
                parts,
            })
        }
        _ => Body::Bytes(part.contents().to_vec()),
    };

    Ok(MimePart { headers, body })
}

/// Header value exactly as written, unfolded and trimmed
fn raw_header_value(raw: &[u8], header: &mail_parser::Header<'_>) -> String {
    let start = header.offset_start as usize;
    let end = header.offset_end as usize;
    raw.get(start..end)
        .map(|bytes| {
            String::from_utf8_lossy(bytes)
                .replace("\r\n", "")
                .replace('\n', "")
                .trim()
                .to_string()
        })
        .unwrap_or_default()
}

fn encode_body(out: &mut Vec<u8>, content: &[u8], encoding: Option<&str>) {
    match encoding {
        Some("base64") => encode_base64(out, content),
        Some("quoted-printable") => encode_quoted_printable(out, content),
        Some("binary") => out.extend_from_slice(content),
        _ => canonicalize_line_endings(out, content),
    }
}

fn encode_base64(out: &mut Vec<u8>, content: &[u8]) {
    let encoded = base64::engine::general_purpose::STANDARD.encode(content);
    for line in encoded.as_bytes().chunks(BASE64_LINE_LENGTH) {
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
    }
}

/// Convert bare LF and bare CR to CRLF
fn canonicalize_line_endings(out: &mut Vec<u8>, content: &[u8]) {
    let mut iter = content.iter().copied().peekable();
    while let Some(byte) = iter.next() {
        match byte {
            b'\r' => {
                if iter.peek() == Some(&b'\n') {
                    iter.next();
                }
                out.extend_from_slice(b"\r\n");
            }
            b'\n' => out.extend_from_slice(b"\r\n"),
            other => out.push(other),
        }
    }
}

fn encode_quoted_printable(out: &mut Vec<u8>, content: &[u8]) {
    let mut canonical = Vec::with_capacity(content.len());
    canonicalize_line_endings(&mut canonical, content);

    let mut lines = canonical.split(|&b| b == b'\n').peekable();
    while let Some(line) = lines.next() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let is_last = lines.peek().is_none();
        if is_last && line.is_empty() {
            break;
        }

        let mut column = 0;
        for (i, &byte) in line.iter().enumerate() {
            let at_end = i + 1 == line.len();
            let literal = matches!(byte, b'!'..=b'<' | b'>'..=b'~')
                || (matches!(byte, b' ' | b'\t') && !at_end);
            let width = if literal { 1 } else { 3 };

            // Leave room for the soft break marker
            if column + width > QP_LINE_LENGTH - 1 {
                out.extend_from_slice(b"=\r\n");
                column = 0;
            }

            if literal {
                out.push(byte);
            } else {
                out.extend_from_slice(format!("={byte:02X}").as_bytes());
            }
            column += width;
        }

        if !is_last {
            out.extend_from_slice(b"\r\n");
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut part = MimePart::leaf("text/plain", "hi");
        part.add_header("X-Test", "1");
        assert_eq!(part.header("content-type"), Some("text/plain"));
        assert_eq!(part.header("x-test"), Some("1"));

        part.add_header("x-test", "2");
        part.set_header("X-TEST", "3");
        assert_eq!(part.header("X-Test"), Some("3"));
        assert_eq!(part.headers().len(), 2);

        assert_eq!(part.remove_header("x-test"), 1);
        assert_eq!(part.header("X-Test"), None);
    }

    #[test]
    fn test_serialize_canonicalizes_line_endings() {
        let part = MimePart::leaf("text/plain", "line one\nline two\rline three\r\n");
        assert_eq!(
            part.to_bytes(),
            b"Content-Type: text/plain\r\n\r\nline one\r\nline two\r\nline three\r\n".to_vec()
        );
    }

    #[test]
    fn test_serialize_binary_untouched() {
        let mut part = MimePart::leaf("application/octet-stream", vec![b'\n', 0, b'\r']);
        part.add_header("Content-Transfer-Encoding", "binary");
        assert!(part.to_bytes().ends_with(b"\r\n\r\n\n\0\r"));
    }

    #[test]
    fn test_serialize_base64_wraps() {
        let mut part = MimePart::leaf("application/octet-stream", vec![0xAB; 100]);
        part.add_header("Content-Transfer-Encoding", "BASE64");

        let bytes = part.to_bytes();
        let body = &bytes[bytes.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4..];
        let lines: Vec<&[u8]> = body.split(|&b| b == b'\n').collect();

        assert_eq!(lines[0].len(), 77); // 76 characters plus CR
        assert!(lines[1].ends_with(b"\r"));
        assert!(lines[2].is_empty());

        let joined: Vec<u8> = body.iter().copied().filter(|b| !b"\r\n".contains(b)).collect();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(joined)
            .unwrap();
        assert_eq!(decoded, vec![0xAB; 100]);
    }

    #[test]
    fn test_quoted_printable() {
        let mut out = Vec::new();
        encode_quoted_printable(&mut out, "a=b café \nend".as_bytes());
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "a=3Db caf=C3=A9=20\r\nend"
        );
    }

    #[test]
    fn test_quoted_printable_soft_breaks() {
        let mut out = Vec::new();
        encode_quoted_printable(&mut out, &[b'x'; 200]);
        let text = String::from_utf8(out).unwrap();
        for line in text.split("\r\n") {
            assert!(line.len() <= QP_LINE_LENGTH, "{line}");
        }
        assert_eq!(text.replace("=\r\n", ""), "x".repeat(200));
    }

    #[test]
    fn test_serialize_multipart() {
        let part = MimePart::multipart(
            "mixed",
            "b1",
            vec![
                MimePart::leaf("text/plain", "one"),
                MimePart::leaf("text/plain", "two\r\n"),
            ],
        );

        assert_eq!(
            String::from_utf8(part.to_bytes()).unwrap(),
            "Content-Type: multipart/mixed; boundary=\"b1\"\r\n\r\n\
             --b1\r\nContent-Type: text/plain\r\n\r\none\r\n\
             --b1\r\nContent-Type: text/plain\r\n\r\ntwo\r\n\r\n\
             --b1--\r\n"
        );
        assert_eq!(part.boundaries(), vec!["b1"]);
    }

    #[test]
    fn test_parse_nested_multipart() {
        let raw = b"From: alice@example.com\r\n\
            Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
            \r\n\
            --outer\r\n\
            Content-Type: text/plain\r\n\
            \r\n\
            Hello\r\n\
            --outer\r\n\
            Content-Type: multipart/alternative;\r\n boundary=inner\r\n\
            \r\n\
            --inner\r\n\
            Content-Type: text/html\r\n\
            \r\n\
            <p>Hi</p>\r\n\
            --inner--\r\n\
            --outer--\r\n";

        let part = MimePart::parse(raw).expect("parse");
        assert_eq!(part.header("from"), Some("alice@example.com"));
        assert_eq!(part.boundaries(), vec!["outer", "inner"]);

        let children = part.children();
        assert_eq!(children.len(), 2);
        assert!(children[0].content_type().is("text/plain"));
        assert_eq!(
            children[1].header("Content-Type"),
            Some("multipart/alternative; boundary=inner")
        );
        assert_eq!(children[1].children().len(), 1);
    }

    #[test]
    fn test_parse_continued_boundary_parameter() {
        let raw = b"Content-Type: multipart/mixed;\r\n\
            \tboundary*0=\"split-\";\r\n\
            \tboundary*1=\"boundary\"\r\n\
            \r\n\
            --split-boundary\r\n\
            Content-Type: text/plain\r\n\
            \r\n\
            one\r\n\
            --split-boundary\r\n\
            Content-Type: text/plain\r\n\
            \r\n\
            two\r\n\
            --split-boundary--\r\n";

        let part = MimePart::parse(raw).expect("parse");
        assert_eq!(part.boundaries(), vec!["split-boundary"]);
        assert_eq!(part.children().len(), 2);

        // The raw header keeps the continuation form
        assert_eq!(part.content_type().boundary(), None);
    }

    #[test]
    fn test_parse_decodes_base64_body() {
        let raw = b"Content-Type: application/octet-stream\r\n\
            Content-Transfer-Encoding: base64\r\n\
            \r\n\
            AAECAw==\r\n";

        let part = MimePart::parse(raw).expect("parse");
        assert_eq!(part.body(), &Body::Bytes(vec![0, 1, 2, 3]));
    }
}
