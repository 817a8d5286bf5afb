//! Inscription envelope encoder
//!
//! The envelope is a flat chunk sequence:
//! ```text
//! "ord" <part count> <content type>
//!   <remaining = count-1> <part 0>
//!   <remaining = count-2> <part 1>
//!   ...
//!   <remaining = 0> <last part>
//! ```
//! Parts are at most [`MAX_PART_LEN`] bytes. The chunks end up spread across the
//! unlock scripts of an inscription chain, see [`super::partition`].

use crate::error::EnvelopeError;

use super::chunk::{Chunk, MAX_ENCODED_NUMBER};

/// Protocol identifier opening every envelope
pub const PROTOCOL_MARKER: &[u8] = b"ord";

/// Maximum size of a single payload part
pub const MAX_PART_LEN: usize = 240;

/// Consensus limit on a single pushed script element
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    chunks: Vec<Chunk>,
}

/// Decoded inscription content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inscription {
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Envelope {
    /// Encode a payload into envelope chunks.
    ///
    /// # Arguments
    /// * `content_type` - MIME type of the inscription
    /// * `data` - The inscription data, split into parts of [`MAX_PART_LEN`] bytes
    ///
    /// # Returns
    /// The envelope, or an error when the content type does not fit a script
    /// element or the part count cannot be encoded
    pub fn new(content_type: &str, data: &[u8]) -> Result<Self, EnvelopeError> {
        if content_type.len() > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(EnvelopeError::ContentTypeTooLong {
                len: content_type.len(),
                max: MAX_SCRIPT_ELEMENT_SIZE,
            });
        }

        let parts: Vec<&[u8]> = data.chunks(MAX_PART_LEN).collect();
        if parts.len() > MAX_ENCODED_NUMBER {
            return Err(EnvelopeError::PayloadTooLarge {
                parts: parts.len(),
                max: MAX_ENCODED_NUMBER,
            });
        }

        let mut chunks = Vec::with_capacity(3 + 2 * parts.len());
        chunks.push(Chunk::bytes(PROTOCOL_MARKER));
        chunks.push(Chunk::number(parts.len())?);
        chunks.push(Chunk::bytes(content_type.as_bytes()));
        for (n, part) in parts.iter().enumerate() {
            chunks.push(Chunk::number(parts.len() - n - 1)?);
            chunks.push(Chunk::bytes(*part));
        }

        Ok(Envelope { chunks })
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }
}

/// Read an inscription back from its envelope chunks.
pub fn decode_envelope(chunks: &[Chunk]) -> Result<Inscription, EnvelopeError> {
    let malformed = |msg: &str| EnvelopeError::Malformed(msg.to_string());

    let (header, body_chunks) = match chunks {
        [marker, count, content_type, rest @ ..] => ((marker, count, content_type), rest),
        _ => return Err(malformed("envelope needs a marker, a part count and a content type")),
    };

    if header.0.as_bytes() != Some(PROTOCOL_MARKER) {
        return Err(malformed("missing protocol marker"));
    }
    let parts = header
        .1
        .as_number()
        .ok_or_else(|| malformed("part count is not a number"))?;
    let content_type = header
        .2
        .as_bytes()
        .ok_or_else(|| malformed("content type is not a data push"))?;
    let content_type = String::from_utf8(content_type.to_vec())
        .map_err(|_| malformed("content type is not valid UTF-8"))?;

    if body_chunks.len() != 2 * parts {
        return Err(EnvelopeError::Malformed(format!(
            "expected {} body chunks for {} parts, found {}",
            2 * parts,
            parts,
            body_chunks.len()
        )));
    }

    let mut body = Vec::new();
    for (n, pair) in body_chunks.chunks(2).enumerate() {
        let remaining = pair[0]
            .as_number()
            .ok_or_else(|| malformed("remaining-count is not a number"))?;
        if remaining != parts - n - 1 {
            return Err(EnvelopeError::Malformed(format!(
                "part {} carries remaining-count {}, expected {}",
                n,
                remaining,
                parts - n - 1
            )));
        }
        let part = pair[1]
            .as_bytes()
            .ok_or_else(|| malformed("part is not a data push"))?;
        body.extend_from_slice(part);
    }

    Ok(Inscription { content_type, body })
}
