//! # locusdb
//!
//! A compact store of per-position genomic annotations on top of RocksDB.
//!
//! Positions are grouped into fixed-size buckets. Every bucket is stored under
//! a 4-byte key (chromosome byte + 24-bit bucket index) and its values are
//! encoded with whichever of five compression schemes yields the smallest
//! output. Point lookups fetch one bucket and decode a single index.
//!
//! ## Building
//!
//! ```no_run
//! use locusdb::{Assembly, Result, SourceReader, WriterBuilder};
//!
//! fn main() -> Result<()> {
//!     let writer = WriterBuilder::default()
//!         .assembly(Assembly::GRCh38)
//!         .build("gerp.db")?;
//!     let stats = writer.build_from(SourceReader::from_path("gerp.tsv.gz")?)?;
//!     println!("{stats}");
//!     writer.finish()
//! }
//! ```
//!
//! ## Reading
//!
//! ```no_run
//! use locusdb::{Chromosome, Position, Result, Store};
//!
//! fn main() -> Result<()> {
//!     let store = Store::open("gerp.db")?;
//!     let position = Position::new(Chromosome::Chr1, 1_000_000);
//!     if let Some(scores) = store.get_conservation(&position)? {
//!         println!("{position}\t{scores}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod accumulation;
pub mod compression;
mod conservation;
mod core;
pub mod error;
mod parallel;
mod read;
mod record;
mod source;
mod stats;
mod write;

pub use accumulation::{Accumulation, BucketSink};
pub use compression::{Compression, FieldTuple, FieldType, Scalar, Scheme};
pub use conservation::Conservation;
pub use crate::core::{Assembly, BucketKey, Chromosome, Interval, Metadata, Position};
pub use error::{Error, IntoLocusError, Result};
pub use parallel::ParallelProcessor;
pub use read::{ChromosomeIter, Store, StoreOptions, VerifyReport};
pub use record::{BatchRecord, FieldGroup, Schema, CONSERVATION_GROUP};
pub use source::{SourceReader, SourceRecord};
pub use stats::{CompressionStats, GroupStats};
pub use write::{RecordSink, StoreWriter, WriterBuilder};

/// The single format version this crate reads and writes
pub const FORMAT_VERSION: i16 = 1;

/// Default number of positions per bucket
pub const DEFAULT_BUCKET_SIZE: u32 = 200;

/// Column family holding the metadata
pub const CF_INFO: &str = "info";

/// Column family holding the encoded buckets
pub const CF_RECORD: &str = "record";

pub const KEY_FORMAT_VERSION: &str = "version_format";
pub const KEY_ASSEMBLY: &str = "assembly";

/// Bucket size the records were built with, a 4-byte big-endian `u32`
///
/// Stores created before this key existed are read with the configured size.
pub const KEY_BUCKET_SIZE: &str = "bucket_size";
