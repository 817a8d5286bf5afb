//! Chain partitioner
//!
//! Splits envelope chunks into partial scripts, one per lock transaction of the
//! inscription chain. Chunks are consumed in pairs (`<count> <content type>`,
//! then `<remaining> <part>`) so no pair is ever split across two partials. The
//! first partial additionally leads with the protocol marker on its own.

use std::collections::VecDeque;

use crate::bitcoin::ScriptBuf;
use crate::error::EnvelopeError;

use super::chunk::{self, Chunk};
use super::envelope::Envelope;

/// Size ceiling for the envelope chunks carried by one transaction
pub const MAX_PAYLOAD_LEN: usize = 1500;

/// Envelope chunks assigned to one transaction of the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialScript {
    chunks: Vec<Chunk>,
}

impl PartialScript {
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Number of chunks (one `OP_DROP` each in the lock script).
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn serialized_len(&self) -> usize {
        chunk::serialized_len(&self.chunks)
    }

    pub fn to_script(&self) -> ScriptBuf {
        chunk::to_script(&self.chunks)
    }
}

/// Partition an envelope with the default [`MAX_PAYLOAD_LEN`] ceiling.
pub fn partition(envelope: Envelope) -> Result<Vec<PartialScript>, EnvelopeError> {
    partition_with_ceiling(envelope, MAX_PAYLOAD_LEN)
}

/// Split an envelope into partial scripts of at most `ceiling` serialized bytes.
///
/// # Arguments
/// * `envelope` - The encoded inscription
/// * `ceiling` - Size limit for the chunks of one partial script
///
/// # Returns
/// Partial scripts in chain order, or [`EnvelopeError::OversizedPair`] when a
/// single (count, data) pair cannot fit under the ceiling
pub fn partition_with_ceiling(
    envelope: Envelope,
    ceiling: usize,
) -> Result<Vec<PartialScript>, EnvelopeError> {
    let mut pending: VecDeque<Chunk> = envelope.into_chunks().into();
    let mut partials = Vec::new();

    while !pending.is_empty() {
        let mut chunks = Vec::new();
        if partials.is_empty() {
            chunks.extend(pending.pop_front());
        }
        let lead = chunks.len();
        let mut size = chunk::serialized_len(&chunks);
        let mut last_pair = 0;

        while size <= ceiling && !pending.is_empty() {
            last_pair = 0;
            for _ in 0..2 {
                if let Some(next) = pending.pop_front() {
                    size += next.serialized_len();
                    chunks.push(next);
                    last_pair += 1;
                }
            }
        }

        if size > ceiling {
            if chunks.len() - last_pair <= lead {
                let pair = &chunks[chunks.len() - last_pair..];
                return Err(EnvelopeError::OversizedPair {
                    size: chunk::serialized_len(pair),
                    ceiling,
                });
            }
            for returned in chunks.drain(chunks.len() - last_pair..).rev() {
                pending.push_front(returned);
            }
        }

        partials.push(PartialScript { chunks });
    }

    Ok(partials)
}
