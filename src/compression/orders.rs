//! ORDERS: one fixed-width row per position
//!
//! ```text
//! [S x row]
//! ```
//!
//! Always applicable, so it is the fallback of the selector.

use super::{Compression, FieldTuple, PackOutcome};
use crate::error::Result;

pub(super) fn pack(codec: &Compression, tuples: &[FieldTuple]) -> PackOutcome {
    let mut out = Vec::with_capacity(payload_size(codec));
    for tuple in tuples {
        codec.write_row(tuple, &mut out);
    }
    PackOutcome::Packed(out)
}

pub(super) fn unpack_values(
    codec: &Compression,
    bytes: &[u8],
    offset: usize,
    index: usize,
) -> Result<FieldTuple> {
    codec.read_row(bytes, offset + index * codec.row_width())
}

pub(super) fn payload_size(codec: &Compression) -> usize {
    codec.size() * codec.row_width()
}
