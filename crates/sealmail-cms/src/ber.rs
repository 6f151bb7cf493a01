//! BER to DER normalization
//!
//! Several mail clients stream CMS structures with indefinite lengths and
//! constructed OCTET STRINGs. This module re-encodes such input with
//! definite minimal lengths and primitive strings so it can be handed to
//! the DER decoder. Content octets are copied unchanged.

use crate::error::{Result, SmimeError};

/// Maximum nesting of constructed elements
const MAX_DEPTH: usize = 64;

const CONSTRUCTED: u8 = 0x20;
const HIGH_TAG_NUMBER: u8 = 0x1f;
const OCTET_STRING: u8 = 0x04;
const END_OF_CONTENTS: [u8; 2] = [0x00, 0x00];

/// Re-encode a single BER element as DER
pub(crate) fn to_der(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut reader = Reader::new(bytes);
    let element = reader.read_element(0)?;
    if !reader.is_empty() {
        return Err(malformed("trailing data after element"));
    }

    let mut out = Vec::with_capacity(bytes.len());
    element.encode_into(&mut out);
    Ok(out)
}

fn malformed(reason: &str) -> SmimeError {
    SmimeError::Parse(format!("Malformed BER: {reason}"))
}

struct Element {
    identifier: Vec<u8>,
    content: Vec<u8>,
}

impl Element {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.identifier);
        encode_length(self.content.len(), out);
        out.extend_from_slice(&self.content);
    }
}

// Length bytes are at most size_of::<usize>() long
#[allow(clippy::cast_possible_truncation)]
fn encode_length(length: usize, out: &mut Vec<u8>) {
    if length < 0x80 {
        out.push(length as u8);
        return;
    }

    let bytes = length.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    let significant = &bytes[skip..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    const fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn read_byte(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or_else(|| malformed("unexpected end of input"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(length)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| malformed("length exceeds input"))?;
        let value = &self.data[self.pos..end];
        self.pos = end;
        Ok(value)
    }

    /// Identifier octets, including high-tag-number continuation bytes
    fn read_identifier(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        let first = self.read_byte()?;
        if first & HIGH_TAG_NUMBER == HIGH_TAG_NUMBER {
            while self.read_byte()? & 0x80 != 0 {}
        }
        Ok(&self.data[start..self.pos])
    }

    /// `None` is the indefinite form
    fn read_length(&mut self) -> Result<Option<usize>> {
        let first = self.read_byte()?;
        match first {
            0x00..=0x7f => Ok(Some(usize::from(first))),
            0x80 => Ok(None),
            _ => {
                let num_bytes = usize::from(first & 0x7f);
                if num_bytes > 4 {
                    return Err(malformed("length field too long"));
                }
                let mut length = 0usize;
                for _ in 0..num_bytes {
                    length = (length << 8) | usize::from(self.read_byte()?);
                }
                Ok(Some(length))
            }
        }
    }

    fn read_element(&mut self, depth: usize) -> Result<Element> {
        if depth > MAX_DEPTH {
            return Err(malformed("nesting too deep"));
        }

        let identifier = self.read_identifier()?;
        let constructed = identifier[0] & CONSTRUCTED != 0;

        let children = match (constructed, self.read_length()?) {
            (false, None) => return Err(malformed("indefinite length on primitive element")),
            (false, Some(length)) => {
                return Ok(Element {
                    identifier: identifier.to_vec(),
                    content: self.take(length)?.to_vec(),
                });
            }
            (true, Some(length)) => {
                let mut inner = Reader::new(self.take(length)?);
                let mut children = Vec::new();
                while !inner.is_empty() {
                    children.push(inner.read_element(depth + 1)?);
                }
                children
            }
            (true, None) => {
                let mut children = Vec::new();
                loop {
                    if self.remaining().starts_with(&END_OF_CONTENTS) {
                        self.pos += END_OF_CONTENTS.len();
                        break;
                    }
                    if self.is_empty() {
                        return Err(malformed("missing end-of-contents"));
                    }
                    children.push(self.read_element(depth + 1)?);
                }
                children
            }
        };

        if identifier == [CONSTRUCTED | OCTET_STRING] {
            return flatten_octet_string(children);
        }

        let mut content = Vec::new();
        for child in &children {
            child.encode_into(&mut content);
        }
        Ok(Element {
            identifier: identifier.to_vec(),
            content,
        })
    }
}

/// Join the segments of a constructed OCTET STRING
///
/// Nested segments have already been flattened, so every child is primitive.
fn flatten_octet_string(segments: Vec<Element>) -> Result<Element> {
    let mut content = Vec::new();
    for segment in segments {
        if segment.identifier != [OCTET_STRING] {
            return Err(malformed("constructed OCTET STRING segment is not an OCTET STRING"));
        }
        content.extend_from_slice(&segment.content);
    }
    Ok(Element {
        identifier: vec![OCTET_STRING],
        content,
    })
}
