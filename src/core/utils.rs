use crate::error::{CodecError, Result};

/// Returns `len` bytes starting at `offset`
pub(crate) fn take(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    match offset.checked_add(len) {
        Some(end) if end <= bytes.len() => Ok(&bytes[offset..end]),
        _ => Err(CodecError::Truncated {
            offset,
            needed: len,
            available: bytes.len().saturating_sub(offset),
        }
        .into()),
    }
}

/// Reads a single byte at `offset`
pub(crate) fn byte_at(bytes: &[u8], offset: usize) -> Result<u8> {
    take(bytes, offset, 1).map(|b| b[0])
}

/// Prefix sums of `sizes`, starting at `start`
pub(crate) fn calculate_offsets(start: usize, sizes: &[usize], offsets: &mut Vec<usize>) {
    offsets.clear();
    let mut current = start;
    for size in sizes {
        offsets.push(current);
        current += size;
    }
}
