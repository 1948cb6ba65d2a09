//! Fixed-width bucket keys
//!
//! A key is 4 bytes: the chromosome byte followed by the 24-bit big-endian
//! bucket index. Lexicographic order of keys therefore equals the order of
//! the buckets, and all buckets of one chromosome share a common prefix.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use super::{Chromosome, Interval, Position};
use crate::error::{KeyError, Result};

/// Size of an encoded bucket key in bytes
pub const KEY_SIZE: usize = 4;

/// Largest bucket index representable in the 3 index bytes
pub const MAX_BUCKET_INDEX: u32 = (1 << 24) - 1;

/// Encoded 4-byte key of a single bucket
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey([u8; KEY_SIZE]);
impl BucketKey {
    /// Encodes a bucket interval into its key
    ///
    /// The interval must span exactly `bucket_size` positions and start on a
    /// multiple of `bucket_size`.
    pub fn encode(interval: &Interval, bucket_size: u32) -> Result<Self> {
        if bucket_size == 0 {
            return Err(KeyError::ZeroBucketSize.into());
        }
        if interval.len() != u64::from(bucket_size) || interval.start % bucket_size != 0 {
            return Err(KeyError::IllegalBucket {
                chromosome: interval.chromosome,
                start: interval.start,
                end: interval.end,
                bucket_size,
            }
            .into());
        }
        let index = interval.start / bucket_size;
        let mut buf = [0u8; KEY_SIZE];
        BigEndian::write_u32(&mut buf, index);
        if buf[0] != 0 {
            return Err(KeyError::BucketOverflow(index).into());
        }
        buf[0] = interval.chromosome.to_byte();
        Ok(Self(buf))
    }

    /// Key of the bucket containing the position
    pub fn for_position(position: &Position, bucket_size: u32) -> Result<Self> {
        if bucket_size == 0 {
            return Err(KeyError::ZeroBucketSize.into());
        }
        Self::encode(&Interval::bucket_containing(position, bucket_size), bucket_size)
    }

    /// Parses raw key bytes without interpreting the chromosome
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let buf: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidKeyLength(bytes.len()))?;
        Ok(Self(buf))
    }

    /// Decodes raw key bytes back into the bucket interval
    pub fn decode(bytes: &[u8], bucket_size: u32) -> Result<Interval> {
        Self::from_bytes(bytes)?.interval(bucket_size)
    }

    /// Reconstructs the bucket interval this key addresses
    pub fn interval(&self, bucket_size: u32) -> Result<Interval> {
        if bucket_size == 0 {
            return Err(KeyError::ZeroBucketSize.into());
        }
        let chromosome = self.chromosome()?;
        let index = self.index();
        let start = index
            .checked_mul(bucket_size)
            .and_then(|start| start.checked_add(bucket_size - 1).map(|end| (start, end)));
        match start {
            Some((start, end)) => Ok(Interval::new(chromosome, start, end)),
            None => Err(KeyError::BucketOverflow(index).into()),
        }
    }

    pub fn chromosome(&self) -> Result<Chromosome> {
        Chromosome::from_byte(self.0[0])
    }

    /// The 24-bit bucket index
    #[must_use]
    pub fn index(&self) -> u32 {
        BigEndian::read_u32(&self.0) & MAX_BUCKET_INDEX
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// First key of the chromosome, used as a seek target for range scans
    #[must_use]
    pub fn chromosome_prefix(chromosome: Chromosome) -> Self {
        Self([chromosome.to_byte(), 0, 0, 0])
    }
}

impl AsRef<[u8]> for BucketKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}
