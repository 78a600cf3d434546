use crate::error::{MidiError, Result};

/// Largest value a four-byte variable-length quantity can hold
pub const MAX_VLQ: u32 = 0x0FFF_FFFF;

const MAX_VLQ_BYTES: usize = 4;

/// Decode a variable-length quantity from the start of `bytes`.
///
/// Returns the value and the number of bytes consumed. `base_offset` is the
/// absolute file position of `bytes[0]` and is only used for error reporting.
pub fn decode_vlq(bytes: &[u8], base_offset: usize) -> Result<(u32, usize)> {
    let mut value: u32 = 0;

    for i in 0..MAX_VLQ_BYTES {
        let byte = *bytes.get(i).ok_or(MidiError::UnexpectedEof {
            offset: base_offset + i,
            context: "variable-length quantity",
        })?;

        value = (value << 7) | u32::from(byte & 0x7F);

        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    Err(MidiError::VlqOverflow {
        offset: base_offset,
    })
}

/// Encode a value as a variable-length quantity (big-endian 7-bit groups)
pub fn encode_vlq(value: u32) -> Result<Vec<u8>> {
    if value > MAX_VLQ {
        return Err(MidiError::VlqTooLarge(value));
    }

    let mut groups = vec![(value & 0x7F) as u8];
    let mut rest = value >> 7;
    while rest > 0 {
        groups.push(((rest & 0x7F) as u8) | 0x80);
        rest >>= 7;
    }
    groups.reverse();
    Ok(groups)
}
