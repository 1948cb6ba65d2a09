use std::error::Error as StdError;

use crate::core::Chromosome;

/// Custom Result type for locusdb operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the locusdb library, encompassing all possible error cases
/// that can occur while building or reading a store.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors related to bucket keys and chromosome codes
    #[error("Error processing key: {0}")]
    KeyError(#[from] KeyError),

    /// Errors raised by the field compression codec
    #[error("Error processing batch: {0}")]
    CodecError(#[from] CodecError),

    /// Errors raised while opening or validating a store
    #[error("Error opening store: {0}")]
    StoreError(#[from] StoreError),

    /// Errors raised by the build pipeline
    #[error("Error building store: {0}")]
    BuildError(#[from] BuildError),

    /// Errors surfaced by the underlying ordered key-value store
    #[error("External storage error: {0}")]
    RocksError(#[from] rocksdb::Error),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    IoError(#[from] std::io::Error),

    /// Errors from the niffler dependency while sniffing compressed input
    #[error("Niffler error: {0}")]
    NifflerError(#[from] niffler::Error),

    /// Generic errors for other unexpected situations
    #[error("Generic error: {0}")]
    GenericError(#[from] Box<dyn StdError + Send + Sync>),
}
impl Error {
    /// Checks if the error originates in the external storage layer
    ///
    /// Read-time storage failures are not retried internally; callers use this
    /// to translate them into their own error envelope.
    #[must_use]
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::RocksError(_) | Self::IoError(_))
    }

    /// Checks if the error is a precondition violation of the numeric domain
    #[must_use]
    pub fn is_out_of_domain(&self) -> bool {
        matches!(self, Self::CodecError(CodecError::ValueOutOfDomain { .. }))
    }
}

/// Errors produced by the chromosome and bucket key codecs
#[derive(thiserror::Error, Debug)]
pub enum KeyError {
    /// The interval is not a bucket: wrong length or unaligned start
    #[error("Interval {chromosome}:{start}-{end} is not a bucket of size {bucket_size}")]
    IllegalBucket {
        chromosome: Chromosome,
        start: u32,
        end: u32,
        bucket_size: u32,
    },

    /// The bucket index does not fit into the 3 key bytes
    #[error("Bucket index {0} does not fit into 24 bits")]
    BucketOverflow(u32),

    /// The byte does not map to a supported chromosome
    #[error("Unknown chromosome byte: {0}")]
    UnknownChromosome(u8),

    /// The string does not name a supported chromosome
    #[error("Invalid chromosome: {0}")]
    InvalidChromosome(String),

    /// A bucket key must be exactly 4 bytes long
    #[error("Invalid key length: {0}. Expected: 4")]
    InvalidKeyLength(usize),

    /// The bucket size must be non-zero
    #[error("Bucket size must be greater than zero")]
    ZeroBucketSize,

    /// The position does not belong to the bucket being addressed
    #[error("Position {position} lies outside of bucket {bucket}")]
    PositionOutsideBucket { position: String, bucket: String },
}

/// Errors raised by the field compression codec
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// A value is outside of the scaled fixed-point domain
    #[error("Value {0} is outside of the storable domain (|v| < 32, at most 3 decimals)")]
    ValueOutOfDomain(f64),

    /// No scheme accepted the batch; this is an internal invariant failure
    #[error("No compression scheme accepted the batch")]
    NoApplicableScheme,

    /// The scheme tag byte is not recognized
    #[error("Unknown compression scheme tag: {0}")]
    UnknownScheme(u8),

    /// The payload ended before the declared structure was complete
    #[error("Batch payload truncated: needed {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A tuple does not carry one value per field
    #[error("Tuple has {got} fields but the group declares {expected}")]
    ArityMismatch { expected: usize, got: usize },

    /// A value does not match the declared field type
    #[error("Field {field} expects {expected} but got {got}")]
    TypeMismatch {
        field: usize,
        expected: &'static str,
        got: &'static str,
    },

    /// A present value collides with the null sentinel of its type
    #[error("Value {0} collides with the null sentinel")]
    SentinelConflict(i64),

    /// The number of tuples does not match the bucket size
    #[error("Batch holds {got} tuples but the bucket size is {expected}")]
    SizeMismatch { expected: usize, got: usize },

    /// Index is outside of the bucket
    #[error("Requested index ({requested_index}) is out of bucket range ({max_index})")]
    IndexOutOfRange {
        requested_index: usize,
        max_index: usize,
    },
}

/// Errors raised while opening or validating a store
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// A required column family is missing
    #[error("Column family not found: {0}")]
    MissingColumnFamily(&'static str),

    /// A required metadata key is missing
    #[error("Metadata key not found: {0}")]
    MissingMetadata(&'static str),

    /// A metadata value has the wrong shape
    #[error("Invalid metadata value for key {key}: {reason}")]
    InvalidMetadata { key: &'static str, reason: String },

    /// The store was written with a different format version
    #[error("Format version of the store is not supported: found {found}, expected {expected}")]
    FormatVersionMismatch { found: i16, expected: i16 },

    /// The store was written for a different assembly
    #[error("Assembly of the store ({found}) does not match the requested assembly ({expected})")]
    AssemblyMismatch { found: String, expected: String },

    /// The store was built with a different bucket size
    #[error("Bucket size of the store ({found}) does not match the requested size ({expected})")]
    BucketSizeMismatch { found: u32, expected: u32 },

    /// The assembly name is not recognized
    #[error("Unknown assembly: {0}")]
    UnknownAssembly(String),

    /// The framing of a record does not agree with the schema
    #[error("Record {key:?} has {actual} bytes but the schema frames {framed}")]
    InvalidLayout {
        key: [u8; 4],
        framed: usize,
        actual: usize,
    },

    /// Record keys are not strictly increasing during a scan
    #[error("Record keys out of order: {previous:?} followed by {current:?}")]
    UnorderedKeys { previous: [u8; 4], current: [u8; 4] },

    /// The schema declares no field groups
    #[error("Schema must declare at least one field group")]
    EmptySchema,

    /// The field group index is not part of the schema
    #[error("Unknown field group index: {0}")]
    UnknownGroup(usize),
}

/// Errors raised by the build pipeline
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    /// Input did not arrive in non-decreasing (chromosome, position) order
    #[error("Input out of order: {current} arrived after {previous}")]
    OutOfOrder { previous: String, current: String },

    /// A source line could not be parsed
    #[error("Invalid source line {line}: {reason}")]
    InvalidSource { line: usize, reason: String },
}

/// Trait for converting arbitrary errors into `Error`
pub trait IntoLocusError {
    fn into_locus_error(self) -> Error;
}

impl<E> IntoLocusError for E
where
    E: StdError + Send + Sync + 'static,
{
    fn into_locus_error(self) -> Error {
        Error::GenericError(Box::new(self))
    }
}
