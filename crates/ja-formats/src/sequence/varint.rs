//! Base-128 delay lengths.
//!
//! Big-endian, seven bits per byte; every byte but the last has its high bit
//! set. Decoding probes for the terminating byte first, then decodes the
//! bytes as one slice.

use crate::cursor::{ByteCursor, ByteSource};
use crate::error::{FormatError, Result};

/// Longest delay encoding accepted.
pub const MAX_VARINT_BYTES: usize = 4;
/// Largest value that fits in [`MAX_VARINT_BYTES`].
pub const MAX_VARINT: u32 = (1 << (7 * MAX_VARINT_BYTES)) - 1;

/// Length of the varint at the cursor, without consuming it.
pub fn peek_varint<S: ByteSource>(c: &ByteCursor<S>) -> Result<usize> {
    let start = c.tell();
    let mut buf = [0u8; 1];
    for n in 0..MAX_VARINT_BYTES {
        let pos = start + n as u64;
        if pos >= c.len() {
            return Err(FormatError::UnexpectedEndOfData { offset: start });
        }
        c.source().read_at(pos, &mut buf)?;
        if buf[0] < 0x80 {
            return Ok(n + 1);
        }
    }
    Err(FormatError::DelayTooLong {
        offset: start,
        max: MAX_VARINT_BYTES,
    })
}

/// Value of a complete varint, most significant byte first.
///
/// The final byte counts as-is; every earlier byte counts minus 0x80.
pub fn decode_varint(bytes: &[u8]) -> u32 {
    let Some((&last, head)) = bytes.split_last() else {
        return 0;
    };
    let high = head
        .iter()
        .fold(0u32, |acc, &b| acc.wrapping_mul(0x80).wrapping_add(b.wrapping_sub(0x80) as u32));
    high.wrapping_mul(0x80).wrapping_add(last as u32)
}

/// Probe and consume one varint.
pub fn read_varint<S: ByteSource>(c: &mut ByteCursor<S>) -> Result<u32> {
    let n = peek_varint(c)?;
    let bytes = c.read_bytes(n)?;
    Ok(decode_varint(&bytes))
}

/// Shortest encoding of `value`. Values above [`MAX_VARINT`] need more than
/// [`MAX_VARINT_BYTES`] bytes and are rejected by the reader.
pub fn encode_varint(value: u32) -> Vec<u8> {
    let mut digits = vec![(value & 0x7F) as u8];
    let mut rest = value >> 7;
    while rest > 0 {
        digits.push((rest & 0x7F) as u8 | 0x80);
        rest >>= 7;
    }
    digits.reverse();
    digits
}
