//! Script chunks: single push items of an inscription envelope
//!
//! Chunks are serialized exactly as given (no minimal-push rewriting), because
//! the unlock script replays them byte for byte and the lock script counts
//! them one `OP_DROP` each.

use crate::bitcoin::opcodes::all::{
    OP_PUSHBYTES_0, OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4, OP_PUSHNUM_1, OP_PUSHNUM_16,
};
use crate::bitcoin::opcodes::Opcode;
use crate::bitcoin::script::Instruction;
use crate::bitcoin::ScriptBuf;
use crate::error::EnvelopeError;

/// Largest number the small-integer encoder can represent (two-byte push, sign bit clear)
pub const MAX_ENCODED_NUMBER: usize = 0x7fff;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Data push; the pushing opcode follows from the length.
    Push(Vec<u8>),
    /// Opcode without operand.
    Op(Opcode),
}

impl Chunk {
    /// Byte-chunk encoder.
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Chunk::Push(data.into())
    }

    /// Small-integer encoder.
    ///
    /// 0 and 1..=16 become `OP_0` / `OP_1`..`OP_16`, larger values a one or two
    /// byte little-endian push.
    pub fn number(n: usize) -> Result<Self, EnvelopeError> {
        match n {
            0 => Ok(Chunk::Op(OP_PUSHBYTES_0)),
            1..=16 => Ok(Chunk::Op(Opcode::from(
                OP_PUSHNUM_1.to_u8() + (n as u8 - 1),
            ))),
            17..=127 => Ok(Chunk::Push(vec![n as u8])),
            128..=MAX_ENCODED_NUMBER => Ok(Chunk::Push(vec![(n % 256) as u8, (n / 256) as u8])),
            _ => Err(EnvelopeError::PayloadTooLarge {
                parts: n,
                max: MAX_ENCODED_NUMBER,
            }),
        }
    }

    /// The opcode that pushes this chunk.
    pub fn opcode(&self) -> Opcode {
        match self {
            Chunk::Op(op) => *op,
            Chunk::Push(data) => match data.len() {
                len @ 0..=75 => Opcode::from(len as u8),
                76..=0xff => OP_PUSHDATA1,
                0x100..=0xffff => OP_PUSHDATA2,
                _ => OP_PUSHDATA4,
            },
        }
    }

    pub fn serialized_len(&self) -> usize {
        match self {
            Chunk::Op(_) => 1,
            Chunk::Push(data) => {
                let prefix = match data.len() {
                    0..=75 => 1,
                    76..=0xff => 2,
                    0x100..=0xffff => 3,
                    _ => 5,
                };
                prefix + data.len()
            }
        }
    }

    pub fn write_into(&self, out: &mut Vec<u8>) {
        out.push(self.opcode().to_u8());
        if let Chunk::Push(data) = self {
            let len = data.len();
            match len {
                0..=75 => {}
                76..=0xff => out.push(len as u8),
                0x100..=0xffff => out.extend_from_slice(&(len as u16).to_le_bytes()),
                _ => out.extend_from_slice(&(len as u32).to_le_bytes()),
            }
            out.extend_from_slice(data);
        }
    }

    /// Inverse of [`Chunk::number`].
    pub fn as_number(&self) -> Option<usize> {
        match self {
            Chunk::Op(op) if *op == OP_PUSHBYTES_0 => Some(0),
            Chunk::Op(op) if (OP_PUSHNUM_1.to_u8()..=OP_PUSHNUM_16.to_u8()).contains(&op.to_u8()) => {
                Some((op.to_u8() - OP_PUSHNUM_1.to_u8() + 1) as usize)
            }
            Chunk::Push(data) if data.is_empty() => Some(0),
            Chunk::Push(data) if data.len() == 1 => Some(data[0] as usize),
            Chunk::Push(data) if data.len() == 2 => Some(data[0] as usize + 256 * data[1] as usize),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Chunk::Push(data) => Some(data.as_slice()),
            Chunk::Op(op) if *op == OP_PUSHBYTES_0 => Some(&[][..]),
            Chunk::Op(_) => None,
        }
    }

    pub(crate) fn from_instruction(instruction: Instruction<'_>) -> Self {
        match instruction {
            Instruction::PushBytes(bytes) if bytes.is_empty() => Chunk::Op(OP_PUSHBYTES_0),
            Instruction::PushBytes(bytes) => Chunk::Push(bytes.as_bytes().to_vec()),
            Instruction::Op(op) => Chunk::Op(op),
        }
    }
}

/// Total serialized size of a chunk sequence.
pub fn serialized_len(chunks: &[Chunk]) -> usize {
    chunks.iter().map(Chunk::serialized_len).sum()
}

/// Serialize chunks into a script, verbatim.
pub fn to_script(chunks: &[Chunk]) -> ScriptBuf {
    let mut bytes = Vec::with_capacity(serialized_len(chunks));
    for chunk in chunks {
        chunk.write_into(&mut bytes);
    }
    ScriptBuf::from_bytes(bytes)
}
