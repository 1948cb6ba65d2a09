//! # Adaptive field compression
//!
//! A bucket of `S` positions is stored as a sequence of `S` nullable
//! [`FieldTuple`]s. Every bucket is encoded with whichever [`Scheme`] produces
//! the smallest output, and the first byte of the output records the scheme
//! so that decoding needs no external context.
//!
//! ## Layout
//!
//! ```text
//! [u8 scheme tag][scheme payload]
//! ```
//!
//! All multi-byte integers are big-endian. A null field is written as the
//! minimum value of its type.
//!
//! Decoding a single tuple never materializes the rest of the bucket.

mod dictionary;
mod empty;
mod orders;
mod scaled;
mod selective;
mod selective_dictionary;

use std::collections::HashMap;
use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use crate::core::utils::{byte_at, take};
use crate::error::{CodecError, Result};

pub use scaled::{from_scaled, to_scaled, SCALE};

/// Width of a single field value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 2-byte signed integer, null = `i16::MIN`
    Short,
    /// 4-byte signed integer, null = `i32::MIN`
    Int,
}
impl FieldType {
    #[must_use]
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Short => 2,
            Self::Int => 4,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Int => "int",
        }
    }

    fn sentinel(self) -> i64 {
        match self {
            Self::Short => i64::from(i16::MIN),
            Self::Int => i64::from(i32::MIN),
        }
    }
}

/// A single non-null field value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scalar {
    Short(i16),
    Int(i32),
}
impl Scalar {
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Short(_) => FieldType::Short,
            Self::Int(_) => FieldType::Int,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Short(v) => i64::from(*v),
            Self::Int(v) => i64::from(*v),
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.as_i64() == 0
    }
}

/// The typed values of one field group at one position
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct FieldTuple(pub Vec<Option<Scalar>>);
impl FieldTuple {
    /// A tuple of `arity` null fields
    #[must_use]
    pub fn null(arity: usize) -> Self {
        Self(vec![None; arity])
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn get(&self, field: usize) -> Option<Scalar> {
        self.0.get(field).copied().flatten()
    }

    /// True if every field is null
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    /// True if every field is null or zero
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0.iter().all(|v| v.is_none_or(|s| s.is_zero()))
    }

    /// Overwrites the fields of `self` with the non-null fields of `other`
    pub fn merge(&mut self, other: &FieldTuple) {
        for (dst, src) in self.0.iter_mut().zip(other.0.iter()) {
            if src.is_some() {
                *dst = *src;
            }
        }
    }
}

impl From<Vec<Option<Scalar>>> for FieldTuple {
    fn from(values: Vec<Option<Scalar>>) -> Self {
        Self(values)
    }
}

/// The closed set of encoding schemes, identified by their tag byte
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Scheme {
    Empty = 0,
    Orders = 1,
    OrdersWithDictionary = 2,
    Selective = 3,
    SelectiveWithDictionary = 4,
}
impl Scheme {
    /// All schemes in tag order
    pub const ALL: [Scheme; 5] = [
        Self::Empty,
        Self::Orders,
        Self::OrdersWithDictionary,
        Self::Selective,
        Self::SelectiveWithDictionary,
    ];

    #[must_use]
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        Self::ALL
            .get(tag as usize)
            .copied()
            .ok_or_else(|| CodecError::UnknownScheme(tag).into())
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Orders => "ORDERS",
            Self::OrdersWithDictionary => "ORDERS_WITH_DICTIONARY",
            Self::Selective => "SELECTIVE",
            Self::SelectiveWithDictionary => "SELECTIVE_WITH_DICTIONARY",
        }
    }

    /// Encodes the payload of `tuples` (without tag) if the scheme applies
    fn pack(self, codec: &Compression, tuples: &[FieldTuple]) -> PackOutcome {
        match self {
            Self::Empty => empty::pack(codec, tuples),
            Self::Orders => orders::pack(codec, tuples),
            Self::OrdersWithDictionary => dictionary::pack(codec, tuples),
            Self::Selective => selective::pack(codec, tuples),
            Self::SelectiveWithDictionary => selective_dictionary::pack(codec, tuples),
        }
    }

    /// Decodes one tuple from a payload starting at `offset`
    fn unpack_values(
        self,
        codec: &Compression,
        bytes: &[u8],
        offset: usize,
        index: usize,
    ) -> Result<FieldTuple> {
        match self {
            Self::Empty => Ok(empty::unpack_values(codec)),
            Self::Orders => orders::unpack_values(codec, bytes, offset, index),
            Self::OrdersWithDictionary => dictionary::unpack_values(codec, bytes, offset, index),
            Self::Selective => selective::unpack_values(codec, bytes, offset, index),
            Self::SelectiveWithDictionary => {
                selective_dictionary::unpack_values(codec, bytes, offset, index)
            }
        }
    }

    /// Size in bytes of a payload starting at `offset`
    fn unpack_size(self, codec: &Compression, bytes: &[u8], offset: usize) -> Result<usize> {
        match self {
            Self::Empty => Ok(0),
            Self::Orders => Ok(orders::payload_size(codec)),
            Self::OrdersWithDictionary => dictionary::unpack_size(codec, bytes, offset),
            Self::Selective => selective::unpack_size(codec, bytes, offset),
            Self::SelectiveWithDictionary => {
                selective_dictionary::unpack_size(codec, bytes, offset)
            }
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of asking a single scheme to encode a batch
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PackOutcome {
    Packed(Vec<u8>),
    NotApplicable,
}

/// Codec for one field group: the field types and the bucket size
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Compression {
    types: Vec<FieldType>,
    size: usize,
}
impl Compression {
    #[must_use]
    pub fn new(types: Vec<FieldType>, size: usize) -> Self {
        Self { types, size }
    }

    #[must_use]
    pub fn types(&self) -> &[FieldType] {
        &self.types
    }

    /// Number of tuples in a batch
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.types.len()
    }

    /// Width in bytes of one encoded tuple
    #[must_use]
    pub fn row_width(&self) -> usize {
        self.types.iter().map(FieldType::byte_size).sum()
    }

    #[must_use]
    pub fn null_tuple(&self) -> FieldTuple {
        FieldTuple::null(self.arity())
    }

    /// Encodes the batch with the smallest applicable scheme
    pub fn pack(&self, tuples: &[FieldTuple]) -> Result<Vec<u8>> {
        self.pack_with_scheme(tuples).map(|(_, bytes)| bytes)
    }

    /// Encodes the batch and reports the scheme that was selected
    ///
    /// Ties are broken in favor of the lower tag.
    pub fn pack_with_scheme(&self, tuples: &[FieldTuple]) -> Result<(Scheme, Vec<u8>)> {
        self.validate(tuples)?;
        let mut best: Option<(Scheme, Vec<u8>)> = None;
        for scheme in Scheme::ALL {
            let PackOutcome::Packed(payload) = scheme.pack(self, tuples) else {
                continue;
            };
            if best
                .as_ref()
                .is_none_or(|(_, current)| payload.len() < current.len())
            {
                best = Some((scheme, payload));
            }
        }
        let (scheme, payload) = best.ok_or(CodecError::NoApplicableScheme)?;
        let mut bytes = Vec::with_capacity(payload.len() + 1);
        bytes.push(scheme.tag());
        bytes.extend_from_slice(&payload);
        Ok((scheme, bytes))
    }

    /// Encodes the batch with one specific scheme
    ///
    /// Returns `None` if the scheme does not apply to the batch.
    pub fn pack_as(&self, scheme: Scheme, tuples: &[FieldTuple]) -> Result<Option<Vec<u8>>> {
        self.validate(tuples)?;
        match scheme.pack(self, tuples) {
            PackOutcome::Packed(payload) => {
                let mut bytes = Vec::with_capacity(payload.len() + 1);
                bytes.push(scheme.tag());
                bytes.extend_from_slice(&payload);
                Ok(Some(bytes))
            }
            PackOutcome::NotApplicable => Ok(None),
        }
    }

    /// Scheme of the batch stored at `offset`
    pub fn scheme_at(&self, bytes: &[u8], offset: usize) -> Result<Scheme> {
        Scheme::from_tag(byte_at(bytes, offset)?)
    }

    /// Decodes the tuple at `index` of the batch stored at `offset`
    pub fn unpack_values(&self, bytes: &[u8], offset: usize, index: usize) -> Result<FieldTuple> {
        if index >= self.size {
            return Err(CodecError::IndexOutOfRange {
                requested_index: index,
                max_index: self.size,
            }
            .into());
        }
        let scheme = self.scheme_at(bytes, offset)?;
        scheme.unpack_values(self, bytes, offset + 1, index)
    }

    /// Number of bytes occupied by the batch stored at `offset`, tag included
    pub fn unpack_size(&self, bytes: &[u8], offset: usize) -> Result<usize> {
        let scheme = self.scheme_at(bytes, offset)?;
        let payload = scheme.unpack_size(self, bytes, offset + 1)?;
        take(bytes, offset, payload + 1)?;
        Ok(payload + 1)
    }

    /// Decodes every tuple of the batch stored at `offset`
    pub fn unpack_all(&self, bytes: &[u8], offset: usize) -> Result<Vec<FieldTuple>> {
        (0..self.size)
            .map(|index| self.unpack_values(bytes, offset, index))
            .collect()
    }

    fn validate(&self, tuples: &[FieldTuple]) -> Result<()> {
        if tuples.len() != self.size {
            return Err(CodecError::SizeMismatch {
                expected: self.size,
                got: tuples.len(),
            }
            .into());
        }
        for tuple in tuples {
            if tuple.arity() != self.arity() {
                return Err(CodecError::ArityMismatch {
                    expected: self.arity(),
                    got: tuple.arity(),
                }
                .into());
            }
            for (field, (ftype, value)) in self.types.iter().zip(tuple.0.iter()).enumerate() {
                let Some(value) = value else { continue };
                if value.field_type() != *ftype {
                    return Err(CodecError::TypeMismatch {
                        field,
                        expected: ftype.name(),
                        got: value.field_type().name(),
                    }
                    .into());
                }
                if value.as_i64() == ftype.sentinel() {
                    return Err(CodecError::SentinelConflict(value.as_i64()).into());
                }
            }
        }
        Ok(())
    }

    /// Appends the fixed-width encoding of `tuple`
    pub(crate) fn write_row(&self, tuple: &FieldTuple, out: &mut Vec<u8>) {
        for (ftype, value) in self.types.iter().zip(tuple.0.iter()) {
            match ftype {
                FieldType::Short => {
                    let mut buf = [0u8; 2];
                    let v = match value {
                        Some(Scalar::Short(v)) => *v,
                        _ => i16::MIN,
                    };
                    BigEndian::write_i16(&mut buf, v);
                    out.extend_from_slice(&buf);
                }
                FieldType::Int => {
                    let mut buf = [0u8; 4];
                    let v = match value {
                        Some(Scalar::Int(v)) => *v,
                        _ => i32::MIN,
                    };
                    BigEndian::write_i32(&mut buf, v);
                    out.extend_from_slice(&buf);
                }
            }
        }
    }

    /// Decodes the fixed-width row stored at `offset`
    pub(crate) fn read_row(&self, bytes: &[u8], offset: usize) -> Result<FieldTuple> {
        let row = take(bytes, offset, self.row_width())?;
        let mut pos = 0;
        let mut values = Vec::with_capacity(self.arity());
        for ftype in &self.types {
            let value = match ftype {
                FieldType::Short => {
                    let v = BigEndian::read_i16(&row[pos..pos + 2]);
                    (v != i16::MIN).then_some(Scalar::Short(v))
                }
                FieldType::Int => {
                    let v = BigEndian::read_i32(&row[pos..pos + 4]);
                    (v != i32::MIN).then_some(Scalar::Int(v))
                }
            };
            pos += ftype.byte_size();
            values.push(value);
        }
        Ok(FieldTuple(values))
    }
}

/// Distinct tuples in first-seen order and the dictionary index of each input
///
/// Returns `None` once the dictionary would exceed 255 entries.
pub(crate) fn build_dictionary<'a, I>(tuples: I) -> Option<(Vec<&'a FieldTuple>, Vec<u8>)>
where
    I: IntoIterator<Item = &'a FieldTuple>,
{
    let mut lookup: HashMap<&FieldTuple, u8> = HashMap::new();
    let mut entries = Vec::new();
    let mut indices = Vec::new();
    for tuple in tuples {
        let idx = match lookup.get(tuple) {
            Some(idx) => *idx,
            None => {
                // the length byte caps the dictionary at 255 entries
                let idx = u8::try_from(entries.len()).ok().filter(|i| *i < u8::MAX)?;
                lookup.insert(tuple, idx);
                entries.push(tuple);
                idx
            }
        };
        indices.push(idx);
    }
    Some((entries, indices))
}
