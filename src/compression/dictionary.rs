//! ORDERS_WITH_DICTIONARY: a table of distinct tuples plus one index per position
//!
//! ```text
//! [u8 dict_len][dict_len x row][S x u8 dict_index]
//! ```
//!
//! The dictionary holds every distinct tuple in first-seen order, the null
//! tuple included. Rejected when there are more than 255 distinct tuples.

use super::{build_dictionary, Compression, FieldTuple, PackOutcome};
use crate::core::utils::byte_at;
use crate::error::{CodecError, Result};

pub(super) fn pack(codec: &Compression, tuples: &[FieldTuple]) -> PackOutcome {
    let Some((entries, indices)) = build_dictionary(tuples) else {
        return PackOutcome::NotApplicable;
    };
    let mut out = Vec::with_capacity(1 + entries.len() * codec.row_width() + indices.len());
    out.push(entries.len() as u8);
    for entry in entries {
        codec.write_row(entry, &mut out);
    }
    out.extend_from_slice(&indices);
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
    let index_start = dict_start + dict_len * codec.row_width();
    let entry = byte_at(bytes, index_start + index)? as usize;
    if entry >= dict_len {
        return Err(CodecError::IndexOutOfRange {
            requested_index: entry,
            max_index: dict_len,
        }
        .into());
    }
    codec.read_row(bytes, dict_start + entry * codec.row_width())
}

pub(super) fn unpack_size(codec: &Compression, bytes: &[u8], offset: usize) -> Result<usize> {
    let dict_len = byte_at(bytes, offset)? as usize;
    Ok(1 + dict_len * codec.row_width() + codec.size())
}
