use crate::error::{MidiError, Result};
use crate::midi::vlq::decode_vlq;

/// Forward-only reader over a slice of file bytes.
///
/// `base` is the absolute file offset of `data[0]`, so every position and
/// error refers back to the original file.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    /// Absolute file offset of the next unread byte
    pub fn position(&self) -> usize {
        self.base + self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn read_u8(&mut self, context: &'static str) -> Result<u8> {
        let byte = self.peek_u8().ok_or(MidiError::UnexpectedEof {
            offset: self.position(),
            context,
        })?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_u16_be(&mut self, context: &'static str) -> Result<u16> {
        let bytes = self.read_bytes(2, context)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32_be(&mut self, context: &'static str) -> Result<u32> {
        let bytes = self.read_bytes(4, context)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_bytes(&mut self, len: usize, context: &'static str) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(MidiError::UnexpectedEof {
                offset: self.base + self.data.len(),
                context,
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_vlq(&mut self) -> Result<u32> {
        let (value, used) = decode_vlq(&self.data[self.pos..], self.position())?;
        self.pos += used;
        Ok(value)
    }

    /// Bytes between an earlier absolute offset and the current position
    pub fn slice_from(&self, absolute_start: usize) -> &'a [u8] {
        let start = absolute_start.saturating_sub(self.base).min(self.pos);
        &self.data[start..self.pos]
    }
}
