//! Batch records: the decoded view over one stored bucket
//!
//! A record blob is the concatenation of one encoded batch per field group,
//! in schema order. Group offsets are recovered from the encoded sizes, so a
//! new group can be appended without touching the groups before it.

use crate::compression::{Compression, FieldTuple, FieldType};
use crate::conservation::Conservation;
use crate::core::utils::calculate_offsets;
use crate::core::{BucketKey, Interval, Position};
use crate::error::{KeyError, Result, StoreError};

/// Index of the conservation group in the built-in schema
pub const CONSERVATION_GROUP: usize = 0;

/// A named set of fields compressed together
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldGroup {
    pub name: String,
    pub compression: Compression,
}
impl FieldGroup {
    #[must_use]
    pub fn new(name: &str, types: Vec<FieldType>, bucket_size: u32) -> Self {
        Self {
            name: name.to_string(),
            compression: Compression::new(types, bucket_size as usize),
        }
    }
}

/// The ordered field groups stored in every record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    bucket_size: u32,
    groups: Vec<FieldGroup>,
}
impl Schema {
    pub fn new(bucket_size: u32, groups: Vec<FieldGroup>) -> Result<Self> {
        if groups.is_empty() {
            return Err(StoreError::EmptySchema.into());
        }
        if bucket_size == 0 {
            return Err(KeyError::ZeroBucketSize.into());
        }
        Ok(Self {
            bucket_size,
            groups,
        })
    }

    /// The built-in schema: `conservation = (gerp_n, gerp_rs)`, both scaled shorts
    pub fn conservation(bucket_size: u32) -> Result<Self> {
        Self::new(
            bucket_size,
            vec![FieldGroup::new(
                "conservation",
                vec![FieldType::Short, FieldType::Short],
                bucket_size,
            )],
        )
    }

    #[must_use]
    pub fn bucket_size(&self) -> u32 {
        self.bucket_size
    }

    #[must_use]
    pub fn groups(&self) -> &[FieldGroup] {
        &self.groups
    }

    #[must_use]
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn group(&self, index: usize) -> Result<&FieldGroup> {
        self.groups
            .get(index)
            .ok_or_else(|| StoreError::UnknownGroup(index).into())
    }

    /// Index of the group with the given name
    #[must_use]
    pub fn group_index(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }
}

/// Decoded view over the stored blob of one bucket
///
/// Borrowing the schema keeps the view cheap; nothing but the group offsets
/// is computed until a value is requested.
#[derive(Debug, Clone)]
pub struct BatchRecord<'s> {
    schema: &'s Schema,
    interval: Interval,
    bytes: Vec<u8>,
    offsets: Vec<usize>,
    framed: usize,
}
impl<'s> BatchRecord<'s> {
    /// Builds a view and validates that the blob frames every group
    ///
    /// Trailing bytes after the last group are tolerated.
    pub fn new(schema: &'s Schema, interval: Interval, bytes: Vec<u8>) -> Result<Self> {
        let mut sizes = Vec::with_capacity(schema.num_groups());
        let mut offset = 0;
        for group in schema.groups() {
            let size = group
                .compression
                .unpack_size(&bytes, offset)
                .map_err(|_| StoreError::InvalidLayout {
                    key: BucketKey::encode(&interval, schema.bucket_size())
                        .map(|key| *key.as_bytes())
                        .unwrap_or_default(),
                    framed: offset,
                    actual: bytes.len(),
                })?;
            sizes.push(size);
            offset += size;
        }
        let mut offsets = Vec::with_capacity(sizes.len());
        calculate_offsets(0, &sizes, &mut offsets);
        Ok(Self {
            schema,
            interval,
            bytes,
            offsets,
            framed: offset,
        })
    }

    #[must_use]
    pub fn interval(&self) -> Interval {
        self.interval
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bytes covered by the field groups
    #[must_use]
    pub fn framed_len(&self) -> usize {
        self.framed
    }

    /// Decodes the tuple of `group` at an absolute position
    pub fn get(&self, group: usize, position: &Position) -> Result<FieldTuple> {
        let index = self.interval.index_of(position)?;
        self.get_index(group, index)
    }

    /// Decodes the tuple of `group` at an in-bucket index
    pub fn get_index(&self, group: usize, index: usize) -> Result<FieldTuple> {
        let field_group = self.schema.group(group)?;
        field_group
            .compression
            .unpack_values(&self.bytes, self.offsets[group], index)
    }

    /// Decodes every tuple of `group`
    pub fn tuples(&self, group: usize) -> Result<Vec<FieldTuple>> {
        let field_group = self.schema.group(group)?;
        field_group
            .compression
            .unpack_all(&self.bytes, self.offsets[group])
    }

    /// Conservation scores at the position, if any field is present
    pub fn get_conservation(&self, position: &Position) -> Result<Option<Conservation>> {
        let tuple = self.get(CONSERVATION_GROUP, position)?;
        Ok(Conservation::from_tuple(&tuple))
    }
}
