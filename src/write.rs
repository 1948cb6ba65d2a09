//! Build path: creating and filling a store
//!
//! A store is a RocksDB directory with two column families. `info` holds the
//! metadata, `record` the encoded buckets keyed by their [`BucketKey`].
//! Building is single-writer and strictly sequential.

use std::path::{Path, PathBuf};

use rocksdb::{ColumnFamily, DBCompressionType, Options, WriteBatch, DB};
use tracing::{debug, info};

use crate::accumulation::{Accumulation, BucketSink};
use crate::core::{Assembly, BucketKey, Metadata};
use crate::error::Result;
use crate::read::{column_family, resolve_schema, stored_bucket_size};
use crate::record::Schema;
use crate::source::SourceRecord;
use crate::stats::CompressionStats;
use crate::{CF_INFO, CF_RECORD, FORMAT_VERSION, KEY_ASSEMBLY, KEY_BUCKET_SIZE, KEY_FORMAT_VERSION};

/// A builder for creating a configured [`StoreWriter`]
///
/// ```no_run
/// # use locusdb::{Assembly, Result, WriterBuilder};
/// # fn main() -> Result<()> {
/// let writer = WriterBuilder::default()
///     .assembly(Assembly::GRCh38)
///     .bucket_size(200)
///     .build("conservation.db")?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct WriterBuilder {
    /// Assembly recorded in the metadata (default GRCh38)
    assembly: Option<Assembly>,
    /// Bucket size of the built-in schema (default: the stored one, else 200)
    bucket_size: Option<u32>,
    /// Custom schema, takes precedence over `bucket_size`
    schema: Option<Schema>,
    /// Seed opened buckets from stored records (default true)
    merge_existing: Option<bool>,
    /// RocksDB block compression (default true)
    compression: Option<bool>,
    format_version: Option<i16>,
}
impl WriterBuilder {
    #[must_use]
    pub fn assembly(mut self, assembly: Assembly) -> Self {
        self.assembly = Some(assembly);
        self
    }

    #[must_use]
    pub fn bucket_size(mut self, bucket_size: u32) -> Self {
        self.bucket_size = Some(bucket_size);
        self
    }

    #[must_use]
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn merge_existing(mut self, merge_existing: bool) -> Self {
        self.merge_existing = Some(merge_existing);
        self
    }

    #[must_use]
    pub fn compression(mut self, compression: bool) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Overrides the format version written to new stores
    #[cfg(test)]
    #[must_use]
    pub(crate) fn format_version(mut self, format_version: i16) -> Self {
        self.format_version = Some(format_version);
        self
    }

    /// Opens or creates the store at `path`
    ///
    /// Reopening an existing store requires the same format version, assembly
    /// and bucket size.
    pub fn build<P: AsRef<Path>>(self, path: P) -> Result<StoreWriter> {
        let path = path.as_ref();
        let db = open_writable(path, self.compression.unwrap_or(true))?;
        let schema = resolve_schema(self.schema, self.bucket_size, stored_bucket_size(&db)?)?;
        let metadata = Metadata::new(
            self.format_version.unwrap_or(FORMAT_VERSION),
            self.assembly.unwrap_or_default(),
        );
        StoreWriter::new(
            db,
            path,
            metadata,
            schema,
            self.merge_existing.unwrap_or(true),
        )
    }
}

fn open_writable(path: &Path, compression: bool) -> Result<DB> {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);
    opts.set_compression_type(if compression {
        DBCompressionType::Lz4
    } else {
        DBCompressionType::None
    });
    Ok(DB::open_cf(&opts, path, [CF_INFO, CF_RECORD])?)
}

/// Writable handle on a store
pub struct StoreWriter {
    db: DB,
    metadata: Metadata,
    schema: Schema,
    merge_existing: bool,
    path: PathBuf,
}
impl StoreWriter {
    /// Wraps an opened database
    ///
    /// A new store gets its metadata written. An existing store must carry
    /// the same format version and assembly.
    fn new(
        db: DB,
        path: &Path,
        metadata: Metadata,
        schema: Schema,
        merge_existing: bool,
    ) -> Result<Self> {
        let writer = Self {
            db,
            metadata,
            schema,
            merge_existing,
            path: path.to_path_buf(),
        };
        writer.write_info()?;
        info!(
            path = %path.display(),
            assembly = %metadata.assembly,
            bucket_size = writer.schema.bucket_size(),
            "opened store for writing"
        );
        Ok(writer)
    }

    /// Writes the metadata, or validates it when already present
    fn write_info(&self) -> Result<()> {
        let cf = column_family(&self.db, CF_INFO)?;
        if let Some(version) = self.db.get_cf(cf, KEY_FORMAT_VERSION)? {
            let found = Metadata::new(
                Metadata::decode_version(&version)?,
                match self.db.get_cf(cf, KEY_ASSEMBLY)? {
                    Some(assembly) => Metadata::decode_assembly(&assembly)?,
                    None => self.metadata.assembly,
                },
            );
            found.validate(self.metadata.format_version, Some(self.metadata.assembly), true)?;
            if self.db.get_cf(cf, KEY_BUCKET_SIZE)?.is_none() {
                self.db.put_cf(cf, KEY_BUCKET_SIZE, self.bucket_size_value())?;
            }
            debug!("existing metadata accepted");
            return Ok(());
        }
        let mut batch = WriteBatch::default();
        batch.put_cf(cf, KEY_FORMAT_VERSION, self.metadata.encode_version());
        batch.put_cf(cf, KEY_ASSEMBLY, self.metadata.encode_assembly());
        batch.put_cf(cf, KEY_BUCKET_SIZE, self.bucket_size_value());
        self.db.write(batch)?;
        debug!(version = self.metadata.format_version, "metadata written");
        Ok(())
    }

    fn bucket_size_value(&self) -> [u8; 4] {
        Metadata::encode_bucket_size(self.schema.bucket_size())
    }

    #[must_use]
    pub fn metadata(&self) -> Metadata {
        self.metadata
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Starts an accumulation writing into the `record` family
    pub fn accumulation(&self) -> Result<Accumulation<'_, RecordSink<'_>>> {
        let sink = RecordSink {
            db: &self.db,
            cf: column_family(&self.db, CF_RECORD)?,
        };
        Ok(Accumulation::new(&self.schema, sink).merge_existing(self.merge_existing))
    }

    /// Consumes sorted source records into the store
    ///
    /// Stops at the first error; buckets flushed before it stay written.
    pub fn build_from<I>(&self, source: I) -> Result<CompressionStats>
    where
        I: IntoIterator<Item = Result<SourceRecord>>,
    {
        let mut accumulation = self.accumulation()?;
        for record in source {
            let record = record?;
            accumulation.add_conservation(record.position, &record.conservation)?;
        }
        let stats = accumulation.finish()?;
        stats.log();
        Ok(stats)
    }

    /// Compacts the `record` family
    pub fn compact(&self) -> Result<()> {
        let cf = column_family(&self.db, CF_RECORD)?;
        debug!("compacting records");
        self.db.compact_range_cf(cf, None::<&[u8]>, None::<&[u8]>);
        Ok(())
    }

    /// Compacts and flushes the store, then closes it
    pub fn finish(self) -> Result<()> {
        self.compact()?;
        for name in [CF_INFO, CF_RECORD] {
            self.db.flush_cf(column_family(&self.db, name)?)?;
        }
        info!(path = %self.path.display(), "store closed");
        Ok(())
    }
}

/// [`BucketSink`] over the `record` column family
pub struct RecordSink<'a> {
    db: &'a DB,
    cf: &'a ColumnFamily,
}
impl BucketSink for RecordSink<'_> {
    fn load(&mut self, key: &BucketKey) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get_cf(self.cf, key)?)
    }

    fn put(&mut self, key: &BucketKey, value: &[u8]) -> Result<()> {
        Ok(self.db.put_cf(self.cf, key, value)?)
    }

    fn delete(&mut self, key: &BucketKey) -> Result<()> {
        Ok(self.db.delete_cf(self.cf, key)?)
    }
}
