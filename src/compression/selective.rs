//! SELECTIVE: only the positions holding a non-null tuple are stored
//!
//! ```text
//! [u8 count][count x (u8 index, row)]
//! ```
//!
//! Entries are sorted by index. Absent positions decode to the null tuple.

use super::{Compression, FieldTuple, PackOutcome};
use crate::core::utils::byte_at;
use crate::error::Result;

pub(super) fn pack(codec: &Compression, tuples: &[FieldTuple]) -> PackOutcome {
    let Some(present) = present_entries(tuples) else {
        return PackOutcome::NotApplicable;
    };
    let mut out = Vec::with_capacity(1 + present.len() * (1 + codec.row_width()));
    out.push(present.len() as u8);
    for (index, tuple) in present {
        out.push(index);
        codec.write_row(tuple, &mut out);
    }
    PackOutcome::Packed(out)
}

/// Indices and tuples of the non-null positions
///
/// Returns `None` if an index or the count does not fit into a byte.
pub(super) fn present_entries(tuples: &[FieldTuple]) -> Option<Vec<(u8, &FieldTuple)>> {
    let mut present = Vec::new();
    for (index, tuple) in tuples.iter().enumerate() {
        if tuple.is_null() {
            continue;
        }
        present.push((u8::try_from(index).ok()?, tuple));
    }
    u8::try_from(present.len()).ok()?;
    Some(present)
}

/// Binary search over `count` entries of `stride` bytes whose first byte is the index
pub(super) fn search(
    bytes: &[u8],
    start: usize,
    count: usize,
    stride: usize,
    index: usize,
) -> Result<Option<usize>> {
    let (mut lo, mut hi) = (0, count);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let entry = start + mid * stride;
        let stored = byte_at(bytes, entry)? as usize;
        match stored.cmp(&index) {
            std::cmp::Ordering::Equal => return Ok(Some(entry)),
            std::cmp::Ordering::Less => lo = mid + 1,
            std::cmp::Ordering::Greater => hi = mid,
        }
    }
    Ok(None)
}

pub(super) fn unpack_values(
    codec: &Compression,
    bytes: &[u8],
    offset: usize,
    index: usize,
) -> Result<FieldTuple> {
    let count = byte_at(bytes, offset)? as usize;
    let stride = 1 + codec.row_width();
    match search(bytes, offset + 1, count, stride, index)? {
        Some(entry) => codec.read_row(bytes, entry + 1),
        None => Ok(codec.null_tuple()),
    }
}

pub(super) fn unpack_size(codec: &Compression, bytes: &[u8], offset: usize) -> Result<usize> {
    let count = byte_at(bytes, offset)? as usize;
    Ok(1 + count * (1 + codec.row_width()))
}
