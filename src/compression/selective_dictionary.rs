//! SELECTIVE_WITH_DICTIONARY: sparse positions referencing a dictionary
//!
//! ```text
//! [u8 dict_len][dict_len x row][u8 count][count x (u8 index, u8 dict_index)]
//! ```
//!
//! The dictionary only holds the distinct non-null tuples.

use super::selective::{present_entries, search};
use super::{build_dictionary, Compression, FieldTuple, PackOutcome};
use crate::core::utils::byte_at;
use crate::error::{CodecError, Result};

pub(super) fn pack(codec: &Compression, tuples: &[FieldTuple]) -> PackOutcome {
    let Some(present) = present_entries(tuples) else {
        return PackOutcome::NotApplicable;
    };
    let Some((entries, indices)) = build_dictionary(present.iter().map(|(_, t)| *t)) else {
        return PackOutcome::NotApplicable;
    };
    let mut out = Vec::with_capacity(2 + entries.len() * codec.row_width() + 2 * present.len());
    out.push(entries.len() as u8);
    for entry in entries {
        codec.write_row(entry, &mut out);
    }
    out.push(present.len() as u8);
    for ((index, _), dict_index) in present.iter().zip(indices) {
        out.push(*index);
        out.push(dict_index);
    }
    PackOutcome::Packed(out)
}

pub(super) fn unpack_values(
    codec: &Compression,
    bytes: &[u8],
    offset: usize,
    index: usize,
) -> Result<FieldTuple> {
    let dict_len = byte_at(bytes, offset)? as usize;
    let dict_start = offset + 1;
    let count_pos = dict_start + dict_len * codec.row_width();
    let count = byte_at(bytes, count_pos)? as usize;
    let Some(entry) = search(bytes, count_pos + 1, count, 2, index)? else {
        return Ok(codec.null_tuple());
    };
    let dict_index = byte_at(bytes, entry + 1)? as usize;
    if dict_index >= dict_len {
        return Err(CodecError::IndexOutOfRange {
            requested_index: dict_index,
            max_index: dict_len,
        }
        .into());
    }
    codec.read_row(bytes, dict_start + dict_index * codec.row_width())
}

pub(super) fn unpack_size(codec: &Compression, bytes: &[u8], offset: usize) -> Result<usize> {
    let dict_len = byte_at(bytes, offset)? as usize;
    let count_pos = offset + 1 + dict_len * codec.row_width();
    let count = byte_at(bytes, count_pos)? as usize;
    Ok(2 + dict_len * codec.row_width() + 2 * count)
}
