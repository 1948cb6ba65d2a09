//! EMPTY: every tuple of the batch is null, no payload is written

use super::{Compression, FieldTuple, PackOutcome};

pub(super) fn pack(_codec: &Compression, tuples: &[FieldTuple]) -> PackOutcome {
    if tuples.iter().all(FieldTuple::is_null) {
        PackOutcome::Packed(Vec::new())
    } else {
        PackOutcome::NotApplicable
    }
}

pub(super) fn unpack_values(codec: &Compression) -> FieldTuple {
    codec.null_tuple()
}
