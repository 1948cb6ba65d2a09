//! Runtime path: a validated, read-only store
//!
//! Opening checks that both column families exist, then validates the format
//! version before any record is touched and finally the assembly. Lookups
//! are a single point-get followed by a decode at one index; the handle can be
//! shared between threads.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rocksdb::{ColumnFamily, DBIteratorWithThreadMode, Direction, IteratorMode, Options, DB};
use tracing::{debug, info};

use crate::compression::FieldTuple;
use crate::conservation::Conservation;
use crate::core::{Assembly, BucketKey, Chromosome, Metadata, Position};
use crate::error::{Result, StoreError};
use crate::record::{BatchRecord, Schema};
use crate::{
    CF_INFO, CF_RECORD, DEFAULT_BUCKET_SIZE, FORMAT_VERSION, KEY_ASSEMBLY, KEY_BUCKET_SIZE,
    KEY_FORMAT_VERSION,
};

/// Number of records between two verification progress events
const VERIFY_PROGRESS_INTERVAL: u64 = 100_000;

pub(crate) fn column_family<'a>(db: &'a DB, name: &'static str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| StoreError::MissingColumnFamily(name).into())
}

/// Bucket size recorded in the `info` family, if the store carries one
pub(crate) fn stored_bucket_size(db: &DB) -> Result<Option<u32>> {
    let info = column_family(db, CF_INFO)?;
    db.get_cf(info, KEY_BUCKET_SIZE)?
        .map(|bytes| Metadata::decode_bucket_size(&bytes))
        .transpose()
}

/// Picks the schema from the explicit options, falling back to the stored
/// bucket size and then the default
///
/// A stored bucket size always wins over a silent default and must agree
/// with an explicit one.
pub(crate) fn resolve_schema(
    schema: Option<Schema>,
    bucket_size: Option<u32>,
    stored: Option<u32>,
) -> Result<Schema> {
    let schema = match schema {
        Some(schema) => schema,
        None => Schema::conservation(bucket_size.or(stored).unwrap_or(DEFAULT_BUCKET_SIZE))?,
    };
    match stored {
        Some(found) if found != schema.bucket_size() => Err(StoreError::BucketSizeMismatch {
            found,
            expected: schema.bucket_size(),
        }
        .into()),
        _ => Ok(schema),
    }
}

/// Options for opening a [`Store`]
///
/// ```no_run
/// # use locusdb::{Assembly, Result, Store, StoreOptions};
/// # fn main() -> Result<()> {
/// let options = StoreOptions::default()
///     .assembly(Assembly::GRCh37)
///     .lenient_assembly();
/// let store = Store::open_with("conservation.db", options)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct StoreOptions {
    /// Assembly the caller expects, not checked when `None`
    assembly: Option<Assembly>,
    /// Fail on assembly mismatch instead of logging a warning
    enforce_assembly: bool,
    bucket_size: Option<u32>,
    schema: Option<Schema>,
    format_version: i16,
}
impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            assembly: None,
            enforce_assembly: true,
            bucket_size: None,
            schema: None,
            format_version: FORMAT_VERSION,
        }
    }
}
impl StoreOptions {
    #[must_use]
    pub fn assembly(mut self, assembly: Assembly) -> Self {
        self.assembly = Some(assembly);
        self
    }

    #[must_use]
    pub fn enforce_assembly(mut self, enforce: bool) -> Self {
        self.enforce_assembly = enforce;
        self
    }

    /// Only warn when the stored assembly differs from the expected one
    #[must_use]
    pub fn lenient_assembly(self) -> Self {
        self.enforce_assembly(false)
    }

    /// Bucket size of the built-in schema
    ///
    /// Defaults to the size recorded in the store. Opening fails if the two
    /// disagree.
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

    /// Overrides the format version the reader accepts
    #[cfg(test)]
    #[must_use]
    pub(crate) fn format_version(mut self, format_version: i16) -> Self {
        self.format_version = format_version;
        self
    }
}

/// Summary of a full scan of the `record` family
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Number of records
    pub records: u64,
    /// Total size of the stored values
    pub bytes: u64,
    /// Records per chromosome
    pub per_chromosome: BTreeMap<Chromosome, u64>,
}

/// Read-only handle on a store
pub struct Store {
    db: DB,
    metadata: Metadata,
    schema: Schema,
    path: PathBuf,
}
impl Store {
    /// Opens the store with the default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref();
        let opts = Options::default();
        let families = DB::list_cf(&opts, path)?;
        for required in [CF_INFO, CF_RECORD] {
            if !families.iter().any(|name| name == required) {
                return Err(StoreError::MissingColumnFamily(required).into());
            }
        }
        let db = DB::open_cf_for_read_only(&opts, path, &families, false)?;
        debug!(path = %path.display(), families = ?families, "opened store read-only");

        let info = column_family(&db, CF_INFO)?;
        let version = db
            .get_cf(info, KEY_FORMAT_VERSION)?
            .ok_or(StoreError::MissingMetadata(KEY_FORMAT_VERSION))?;
        let version = Metadata::decode_version(&version)?;
        if version != options.format_version {
            return Err(StoreError::FormatVersionMismatch {
                found: version,
                expected: options.format_version,
            }
            .into());
        }
        let assembly = db
            .get_cf(info, KEY_ASSEMBLY)?
            .ok_or(StoreError::MissingMetadata(KEY_ASSEMBLY))?;
        let metadata = Metadata::new(version, Metadata::decode_assembly(&assembly)?);
        metadata.validate(
            options.format_version,
            options.assembly,
            options.enforce_assembly,
        )?;

        let schema = resolve_schema(options.schema, options.bucket_size, stored_bucket_size(&db)?)?;
        info!(
            path = %path.display(),
            assembly = %metadata.assembly,
            version = metadata.format_version,
            bucket_size = schema.bucket_size(),
            "store ready"
        );
        Ok(Self {
            db,
            metadata,
            schema,
            path: path.to_path_buf(),
        })
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

    #[must_use]
    pub fn bucket_size(&self) -> u32 {
        self.schema.bucket_size()
    }

    /// Fetches the record of the bucket containing the position
    ///
    /// `None` means the store holds no data for the bucket.
    pub fn get_record(&self, position: &Position) -> Result<Option<BatchRecord<'_>>> {
        let key = BucketKey::for_position(position, self.bucket_size())?;
        let cf = column_family(&self.db, CF_RECORD)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => {
                let interval = key.interval(self.bucket_size())?;
                Ok(Some(BatchRecord::new(&self.schema, interval, bytes)?))
            }
            None => Ok(None),
        }
    }

    /// Tuple of a field group at the position
    pub fn get(&self, group: usize, position: &Position) -> Result<Option<FieldTuple>> {
        self.schema.group(group)?;
        match self.get_record(position)? {
            Some(record) => record.get(group, position).map(Some),
            None => Ok(None),
        }
    }

    /// Conservation scores at the position
    pub fn get_conservation(&self, position: &Position) -> Result<Option<Conservation>> {
        match self.get_record(position)? {
            Some(record) => record.get_conservation(position),
            None => Ok(None),
        }
    }

    /// Iterates the stored records of one chromosome in position order
    pub fn iter_chromosome(&self, chromosome: Chromosome) -> Result<ChromosomeIter<'_>> {
        let cf = column_family(&self.db, CF_RECORD)?;
        let start = BucketKey::chromosome_prefix(chromosome);
        let inner = self
            .db
            .iterator_cf(cf, IteratorMode::From(start.as_ref(), Direction::Forward));
        Ok(ChromosomeIter {
            inner,
            schema: &self.schema,
            chromosome,
            done: false,
        })
    }

    /// Scans every record and checks keys, key order and framing
    pub fn verify(&self) -> Result<VerifyReport> {
        let cf = column_family(&self.db, CF_RECORD)?;
        let mut report = VerifyReport::default();
        let mut previous: Option<BucketKey> = None;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let key = BucketKey::from_bytes(&key)?;
            if let Some(previous) = previous {
                if previous >= key {
                    return Err(StoreError::UnorderedKeys {
                        previous: *previous.as_bytes(),
                        current: *key.as_bytes(),
                    }
                    .into());
                }
            }
            let interval = key.interval(self.bucket_size())?;
            let actual = value.len();
            let record = BatchRecord::new(&self.schema, interval, value.into_vec())
                .map_err(|_| StoreError::InvalidLayout {
                    key: *key.as_bytes(),
                    framed: 0,
                    actual,
                })?;
            if record.framed_len() != actual {
                return Err(StoreError::InvalidLayout {
                    key: *key.as_bytes(),
                    framed: record.framed_len(),
                    actual,
                }
                .into());
            }

            report.records += 1;
            report.bytes += actual as u64;
            *report.per_chromosome.entry(interval.chromosome).or_default() += 1;
            if report.records % VERIFY_PROGRESS_INTERVAL == 0 {
                debug!(records = report.records, at = %interval, "verification progress");
            }
            previous = Some(key);
        }
        info!(records = report.records, bytes = report.bytes, "verification complete");
        Ok(report)
    }
}

/// Iterator over the records of one chromosome, see [`Store::iter_chromosome`]
pub struct ChromosomeIter<'a> {
    inner: DBIteratorWithThreadMode<'a, DB>,
    schema: &'a Schema,
    chromosome: Chromosome,
    done: bool,
}
impl<'a> Iterator for ChromosomeIter<'a> {
    type Item = Result<BatchRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let (key, value) = match self.inner.next()? {
            Ok(item) => item,
            Err(e) => {
                self.done = true;
                return Some(Err(e.into()));
            }
        };
        if key.first() != Some(&self.chromosome.to_byte()) {
            self.done = true;
            return None;
        }
        let record = BucketKey::decode(&key, self.schema.bucket_size())
            .and_then(|interval| BatchRecord::new(self.schema, interval, value.into_vec()));
        if record.is_err() {
            self.done = true;
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::error::Error;
    use crate::write::WriterBuilder;

    fn build_store(dir: &TempDir, positions: &[(Chromosome, u32, f64)]) {
        let writer = WriterBuilder::default()
            .bucket_size(100)
            .build(dir.path())
            .unwrap();
        let mut acc = writer.accumulation().unwrap();
        for (chromosome, value, score) in positions {
            acc.add_conservation(
                Position::new(*chromosome, *value),
                &Conservation::new(Some(*score), Some(*score)),
            )
            .unwrap();
        }
        acc.finish().unwrap();
        writer.finish().unwrap();
    }

    fn open(dir: &TempDir) -> Store {
        Store::open_with(dir.path(), StoreOptions::default().bucket_size(100)).unwrap()
    }

    // ==================== Open Tests ====================

    #[test]
    fn test_open_missing_store() {
        let dir = TempDir::new().unwrap();
        let result = Store::open(dir.path().join("missing"));
        assert!(result.unwrap_err().is_storage_error());
    }

    #[test]
    fn test_open_missing_column_family() {
        let dir = TempDir::new().unwrap();
        {
            let mut opts = Options::default();
            opts.create_if_missing(true);
            opts.create_missing_column_families(true);
            DB::open_cf(&opts, dir.path(), [CF_RECORD]).unwrap();
        }
        let result = Store::open(dir.path());
        assert!(matches!(
            result,
            Err(Error::StoreError(StoreError::MissingColumnFamily("info")))
        ));
    }

    #[test]
    fn test_open_missing_metadata() {
        let dir = TempDir::new().unwrap();
        {
            let mut opts = Options::default();
            opts.create_if_missing(true);
            opts.create_missing_column_families(true);
            DB::open_cf(&opts, dir.path(), [CF_INFO, CF_RECORD]).unwrap();
        }
        let result = Store::open(dir.path());
        assert!(matches!(
            result,
            Err(Error::StoreError(StoreError::MissingMetadata(_)))
        ));
    }

    #[test]
    fn test_format_version_mismatch_fails_at_open() {
        let dir = TempDir::new().unwrap();
        let writer = WriterBuilder::default()
            .format_version(1)
            .build(dir.path())
            .unwrap();
        let mut acc = writer.accumulation().unwrap();
        acc.add_conservation(
            Position::new(Chromosome::Chr1, 1),
            &Conservation::new(Some(1.0), Some(1.0)),
        )
        .unwrap();
        acc.finish().unwrap();
        writer.finish().unwrap();

        let result = Store::open_with(dir.path(), StoreOptions::default().format_version(2));
        assert!(matches!(
            result,
            Err(Error::StoreError(StoreError::FormatVersionMismatch {
                found: 1,
                expected: 2
            }))
        ));
    }

    #[test]
    fn test_open_reads_metadata() {
        let dir = TempDir::new().unwrap();
        build_store(&dir, &[]);
        let store = open(&dir);
        assert_eq!(store.metadata(), Metadata::new(1, Assembly::GRCh38));
        assert_eq!(store.bucket_size(), 100);
    }

    // ==================== Bucket Size Tests ====================

    #[test]
    fn test_open_adopts_stored_bucket_size() {
        let dir = TempDir::new().unwrap();
        build_store(&dir, &[(Chromosome::Chr1, 150, 2.5)]);
        let store = Store::open(dir.path()).unwrap();
        assert_eq!(store.bucket_size(), 100);
        let found = store
            .get_conservation(&Position::new(Chromosome::Chr1, 150))
            .unwrap()
            .unwrap();
        assert!((found.gerp_n.unwrap() - 2.5).abs() < 0.001);
    }

    #[test]
    fn test_open_rejects_other_bucket_size() {
        let dir = TempDir::new().unwrap();
        build_store(&dir, &[(Chromosome::Chr1, 7, 1.0)]);
        let result = Store::open_with(dir.path(), StoreOptions::default().bucket_size(200));
        assert!(matches!(
            result,
            Err(Error::StoreError(StoreError::BucketSizeMismatch {
                found: 100,
                expected: 200
            }))
        ));
        let schema = Schema::conservation(50).unwrap();
        let result = Store::open_with(dir.path(), StoreOptions::default().schema(schema));
        assert!(matches!(
            result,
            Err(Error::StoreError(StoreError::BucketSizeMismatch { .. }))
        ));
    }

    #[test]
    fn test_open_without_stored_bucket_size() {
        let dir = TempDir::new().unwrap();
        build_store(&dir, &[(Chromosome::Chr2, 42, 3.0)]);
        {
            let opts = Options::default();
            let db = DB::open_cf(&opts, dir.path(), [CF_INFO, CF_RECORD]).unwrap();
            let info = column_family(&db, CF_INFO).unwrap();
            db.delete_cf(info, KEY_BUCKET_SIZE).unwrap();
        }
        let store = open(&dir);
        assert_eq!(store.bucket_size(), 100);
        assert!(store
            .get_conservation(&Position::new(Chromosome::Chr2, 42))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_resolve_schema() {
        assert_eq!(
            resolve_schema(None, None, None).unwrap().bucket_size(),
            DEFAULT_BUCKET_SIZE
        );
        assert_eq!(resolve_schema(None, None, Some(75)).unwrap().bucket_size(), 75);
        assert_eq!(resolve_schema(None, Some(75), None).unwrap().bucket_size(), 75);
        assert!(resolve_schema(None, Some(75), Some(80)).is_err());
    }

    // ==================== Lookup Tests ====================

    #[test]
    fn test_point_lookup() {
        let dir = TempDir::new().unwrap();
        build_store(
            &dir,
            &[(Chromosome::Chr1, 7, 4.48), (Chromosome::Chr1, 150, -2.0)],
        );
        let store = open(&dir);

        let found = store
            .get_conservation(&Position::new(Chromosome::Chr1, 7))
            .unwrap()
            .unwrap();
        assert!((found.gerp_n.unwrap() - 4.48).abs() < 0.001);
        assert!(store
            .get_conservation(&Position::new(Chromosome::Chr1, 6))
            .unwrap()
            .is_none());
        assert!(store
            .get_record(&Position::new(Chromosome::Chr1, 250))
            .unwrap()
            .is_none());
        assert!(store
            .get_record(&Position::new(Chromosome::Chr1, 199))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_get_unknown_group() {
        let dir = TempDir::new().unwrap();
        build_store(&dir, &[]);
        let store = open(&dir);
        assert!(matches!(
            store.get(4, &Position::new(Chromosome::Chr1, 1)),
            Err(Error::StoreError(StoreError::UnknownGroup(4)))
        ));
    }

    // ==================== Scan Tests ====================

    #[test]
    fn test_iter_chromosome() {
        let dir = TempDir::new().unwrap();
        build_store(
            &dir,
            &[
                (Chromosome::Chr1, 5, 1.0),
                (Chromosome::Chr2, 5, 1.0),
                (Chromosome::Chr2, 305, 2.0),
                (Chromosome::Chr2, 1_000, 3.0),
                (Chromosome::Chr3, 0, 1.0),
            ],
        );
        let store = open(&dir);
        let starts: Vec<_> = store
            .iter_chromosome(Chromosome::Chr2)
            .unwrap()
            .map(|r| r.unwrap().interval().start)
            .collect();
        assert_eq!(starts, vec![0, 300, 1_000]);
        assert_eq!(store.iter_chromosome(Chromosome::X).unwrap().count(), 0);
    }

    #[test]
    fn test_verify() {
        let dir = TempDir::new().unwrap();
        build_store(
            &dir,
            &[
                (Chromosome::Chr1, 5, 1.0),
                (Chromosome::Chr1, 105, 1.0),
                (Chromosome::X, 0, 2.5),
            ],
        );
        let store = open(&dir);
        let report = store.verify().unwrap();
        assert_eq!(report.records, 3);
        assert_eq!(report.per_chromosome[&Chromosome::Chr1], 2);
        assert_eq!(report.per_chromosome[&Chromosome::X], 1);
        assert!(report.bytes > 0);
    }
}
