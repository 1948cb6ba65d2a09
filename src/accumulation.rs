//! # Accumulation
//!
//! Single-pass bucketizer of the build path. Values must arrive in
//! non-decreasing position order. The active bucket is buffered in memory and
//! flushed as soon as a value for a later bucket arrives:
//!
//! - a bucket holding only default tuples deletes its key
//! - every other bucket is encoded group by group and written
//!
//! The last bucket is flushed by [`Accumulation::finish`], or on drop if the
//! accumulation is abandoned early.

use tracing::{debug, error, trace};

use crate::compression::FieldTuple;
use crate::conservation::Conservation;
use crate::core::{BucketKey, Interval, Position};
use crate::error::{BuildError, CodecError, Result};
use crate::record::{BatchRecord, Schema, CONSERVATION_GROUP};
use crate::stats::CompressionStats;

/// Number of consumed positions between two progress events
pub const PROGRESS_INTERVAL: u64 = 1_000_000;

/// Destination of flushed buckets
///
/// Implemented by the store writer over the `record` column family.
pub trait BucketSink {
    /// Returns the currently stored blob for the key, if any
    fn load(&mut self, key: &BucketKey) -> Result<Option<Vec<u8>>>;

    /// Stores a blob under the key
    fn put(&mut self, key: &BucketKey, value: &[u8]) -> Result<()>;

    /// Removes the key
    fn delete(&mut self, key: &BucketKey) -> Result<()>;
}

impl<S: BucketSink + ?Sized> BucketSink for &mut S {
    fn load(&mut self, key: &BucketKey) -> Result<Option<Vec<u8>>> {
        (**self).load(key)
    }

    fn put(&mut self, key: &BucketKey, value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }

    fn delete(&mut self, key: &BucketKey) -> Result<()> {
        (**self).delete(key)
    }
}

/// Mutable tuples of the active bucket, one vector per field group
#[derive(Debug)]
struct BatchBuffer {
    interval: Interval,
    key: BucketKey,
    groups: Vec<Vec<FieldTuple>>,
}
impl BatchBuffer {
    fn new(schema: &Schema, interval: Interval, key: BucketKey) -> Self {
        let groups = schema
            .groups()
            .iter()
            .map(|g| vec![g.compression.null_tuple(); g.compression.size()])
            .collect();
        Self {
            interval,
            key,
            groups,
        }
    }

    /// Seeds the buffer with the contents of a stored record
    fn seed(&mut self, record: &BatchRecord) -> Result<()> {
        for (group, tuples) in self.groups.iter_mut().enumerate() {
            *tuples = record.tuples(group)?;
        }
        Ok(())
    }

    fn is_default(&self) -> bool {
        self.groups
            .iter()
            .all(|tuples| tuples.iter().all(FieldTuple::is_default))
    }
}

/// Bucketizes sorted per-position values into encoded records
pub struct Accumulation<'s, S: BucketSink> {
    schema: &'s Schema,
    sink: S,
    merge_existing: bool,
    active: Option<BatchBuffer>,
    last: Option<Position>,
    stats: CompressionStats,
}
impl<'s, S: BucketSink> Accumulation<'s, S> {
    pub fn new(schema: &'s Schema, sink: S) -> Self {
        Self {
            schema,
            sink,
            merge_existing: true,
            active: None,
            last: None,
            stats: CompressionStats::new(schema.groups().iter().map(|g| g.name.as_str())),
        }
    }

    /// Whether a newly opened bucket is seeded from the stored record
    #[must_use]
    pub fn merge_existing(mut self, merge_existing: bool) -> Self {
        self.merge_existing = merge_existing;
        self
    }

    /// Statistics collected so far
    #[must_use]
    pub fn stats(&self) -> &CompressionStats {
        &self.stats
    }

    /// Adds the tuple of a field group at a position
    ///
    /// Non-null fields overwrite what is buffered for the position.
    pub fn add(&mut self, group: usize, position: Position, tuple: &FieldTuple) -> Result<()> {
        let compression = &self.schema.group(group)?.compression;
        if tuple.arity() != compression.arity() {
            return Err(CodecError::ArityMismatch {
                expected: compression.arity(),
                got: tuple.arity(),
            }
            .into());
        }
        if let Some(last) = self.last {
            if position < last {
                return Err(BuildError::OutOfOrder {
                    previous: last.to_string(),
                    current: position.to_string(),
                }
                .into());
            }
        }

        if !self
            .active
            .as_ref()
            .is_some_and(|buffer| buffer.interval.contains(&position))
        {
            self.flush()?;
            self.open(&position)?;
        }

        if let Some(buffer) = self.active.as_mut() {
            let index = buffer.interval.index_of(&position)?;
            buffer.groups[group][index].merge(tuple);
        }

        self.last = Some(position);
        self.stats.positions += 1;
        if self.stats.positions % PROGRESS_INTERVAL == 0 {
            debug!(
                positions = self.stats.positions,
                records = self.stats.records,
                at = %position,
                "accumulation progress"
            );
        }
        Ok(())
    }

    /// Adds conservation scores at a position
    pub fn add_conservation(&mut self, position: Position, scores: &Conservation) -> Result<()> {
        let tuple = scores.to_tuple()?;
        self.add(CONSERVATION_GROUP, position, &tuple)
    }

    /// Flushes the active bucket and returns the collected statistics
    pub fn finish(mut self) -> Result<CompressionStats> {
        self.flush()?;
        Ok(std::mem::take(&mut self.stats))
    }

    fn open(&mut self, position: &Position) -> Result<()> {
        let bucket_size = self.schema.bucket_size();
        let interval = Interval::bucket_containing(position, bucket_size);
        let key = BucketKey::encode(&interval, bucket_size)?;
        let mut buffer = BatchBuffer::new(self.schema, interval, key);
        if self.merge_existing {
            if let Some(bytes) = self.sink.load(&key)? {
                let record = BatchRecord::new(self.schema, interval, bytes)?;
                buffer.seed(&record)?;
                trace!(bucket = %interval, "seeded from stored record");
            }
        }
        self.active = Some(buffer);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let Some(buffer) = self.active.take() else {
            return Ok(());
        };
        if buffer.is_default() {
            self.sink.delete(&buffer.key)?;
            self.stats.deleted += 1;
            trace!(bucket = %buffer.interval, "deleted default bucket");
            return Ok(());
        }

        let mut bytes = Vec::new();
        for (group, (field_group, tuples)) in self
            .schema
            .groups()
            .iter()
            .zip(buffer.groups.iter())
            .enumerate()
        {
            let (scheme, packed) = field_group.compression.pack_with_scheme(tuples)?;
            self.stats.record_batch(group, scheme, packed.len());
            bytes.extend_from_slice(&packed);
        }
        self.sink.put(&buffer.key, &bytes)?;
        self.stats.records += 1;
        trace!(bucket = %buffer.interval, bytes = bytes.len(), "flushed bucket");
        Ok(())
    }
}

impl<S: BucketSink> Drop for Accumulation<'_, S> {
    fn drop(&mut self) {
        if self.active.is_some() {
            if let Err(e) = self.flush() {
                error!(error = %e, "failed to flush the last bucket");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::compression::{Scalar, Scheme};
    use crate::core::Chromosome;
    use crate::error::Error;

    type Store = BTreeMap<BucketKey, Vec<u8>>;

    impl BucketSink for Store {
        fn load(&mut self, key: &BucketKey) -> Result<Option<Vec<u8>>> {
            Ok(self.get(key).cloned())
        }

        fn put(&mut self, key: &BucketKey, value: &[u8]) -> Result<()> {
            self.insert(*key, value.to_vec());
            Ok(())
        }

        fn delete(&mut self, key: &BucketKey) -> Result<()> {
            self.remove(key);
            Ok(())
        }
    }

    fn scores(n: f64, rs: f64) -> Conservation {
        Conservation::new(Some(n), Some(rs))
    }

    fn pos(chromosome: Chromosome, value: u32) -> Position {
        Position::new(chromosome, value)
    }

    fn lookup(store: &Store, schema: &Schema, position: Position) -> Option<Conservation> {
        let key = BucketKey::for_position(&position, schema.bucket_size()).unwrap();
        let bytes = store.get(&key)?.clone();
        let interval = key.interval(schema.bucket_size()).unwrap();
        let record = BatchRecord::new(schema, interval, bytes).unwrap();
        record.get_conservation(&position).unwrap()
    }

    // ==================== Bucketing Tests ====================

    #[test]
    fn test_flush_on_bucket_change() {
        let schema = Schema::conservation(100).unwrap();
        let mut store = Store::new();
        let mut acc = Accumulation::new(&schema, &mut store);
        acc.add_conservation(pos(Chromosome::Chr1, 5), &scores(1.0, 2.0))
            .unwrap();
        acc.add_conservation(pos(Chromosome::Chr1, 99), &scores(1.5, 2.5))
            .unwrap();
        acc.add_conservation(pos(Chromosome::Chr1, 100), &scores(3.0, 4.0))
            .unwrap();
        acc.add_conservation(pos(Chromosome::Chr2, 0), &scores(-1.0, -2.0))
            .unwrap();
        let stats = acc.finish().unwrap();

        assert_eq!(stats.records, 3);
        assert_eq!(stats.positions, 4);
        assert_eq!(store.len(), 3);

        let found = lookup(&store, &schema, pos(Chromosome::Chr1, 99)).unwrap();
        assert_eq!(found, scores(1.5, 2.5));
        let found = lookup(&store, &schema, pos(Chromosome::Chr2, 0)).unwrap();
        assert_eq!(found, scores(-1.0, -2.0));
        assert!(lookup(&store, &schema, pos(Chromosome::Chr1, 6)).is_none());
    }

    #[test]
    fn test_drop_flushes_last_bucket() {
        let schema = Schema::conservation(100).unwrap();
        let mut store = Store::new();
        {
            let mut acc = Accumulation::new(&schema, &mut store);
            acc.add_conservation(pos(Chromosome::X, 250), &scores(0.5, 0.5))
                .unwrap();
        }
        assert_eq!(store.len(), 1);
        assert!(lookup(&store, &schema, pos(Chromosome::X, 250)).is_some());
    }

    #[test]
    fn test_finish_flushes_exactly_once() {
        let schema = Schema::conservation(10).unwrap();
        let mut store = Store::new();
        let mut acc = Accumulation::new(&schema, &mut store);
        acc.add_conservation(pos(Chromosome::Chr3, 1), &scores(1.0, 1.0))
            .unwrap();
        let stats = acc.finish().unwrap();
        assert_eq!(stats.records, 1);
        assert_eq!(stats.groups()[0].total_count(), 1);
    }

    #[test]
    fn test_same_position_merges() {
        let schema = Schema::conservation(10).unwrap();
        let mut store = Store::new();
        let mut acc = Accumulation::new(&schema, &mut store);
        let p = pos(Chromosome::Chr1, 3);
        acc.add_conservation(p, &Conservation::new(Some(2.0), None))
            .unwrap();
        acc.add_conservation(p, &Conservation::new(None, Some(3.0)))
            .unwrap();
        acc.finish().unwrap();
        assert_eq!(lookup(&store, &schema, p).unwrap(), scores(2.0, 3.0));
    }

    // ==================== Sparse Omission Tests ====================

    #[test]
    fn test_default_bucket_is_deleted() {
        let schema = Schema::conservation(10).unwrap();
        let mut store = Store::new();
        let key = BucketKey::for_position(&pos(Chromosome::Chr1, 0), 10).unwrap();
        store.insert(key, vec![0xff]);

        let mut acc = Accumulation::new(&schema, &mut store).merge_existing(false);
        acc.add_conservation(pos(Chromosome::Chr1, 2), &scores(0.0, 0.0))
            .unwrap();
        acc.add(
            CONSERVATION_GROUP,
            pos(Chromosome::Chr1, 4),
            &FieldTuple::null(2),
        )
        .unwrap();
        let stats = acc.finish().unwrap();
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.records, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_all_null_bucket_never_written() {
        let schema = Schema::conservation(10).unwrap();
        let mut store = Store::new();
        let mut acc = Accumulation::new(&schema, &mut store);
        for i in 0..30 {
            acc.add(CONSERVATION_GROUP, pos(Chromosome::Chr1, i), &FieldTuple::null(2))
                .unwrap();
        }
        acc.finish().unwrap();
        assert!(store.is_empty());
    }

    // ==================== Ordering Tests ====================

    #[test]
    fn test_out_of_order_rejected() {
        let schema = Schema::conservation(10).unwrap();
        let mut store = Store::new();
        let mut acc = Accumulation::new(&schema, &mut store);
        acc.add_conservation(pos(Chromosome::Chr2, 50), &scores(1.0, 1.0))
            .unwrap();
        let result = acc.add_conservation(pos(Chromosome::Chr1, 900), &scores(1.0, 1.0));
        assert!(matches!(
            result,
            Err(Error::BuildError(BuildError::OutOfOrder { .. }))
        ));
        let result = acc.add_conservation(pos(Chromosome::Chr2, 49), &scores(1.0, 1.0));
        assert!(result.is_err());
    }

    #[test]
    fn test_out_of_domain_value_aborts() {
        let schema = Schema::conservation(10).unwrap();
        let mut store = Store::new();
        let mut acc = Accumulation::new(&schema, &mut store);
        let result = acc.add_conservation(pos(Chromosome::Chr1, 1), &scores(33.0, 1.0));
        assert!(result.unwrap_err().is_out_of_domain());
    }

    #[test]
    fn test_arity_checked_on_add() {
        let schema = Schema::conservation(10).unwrap();
        let mut store = Store::new();
        let mut acc = Accumulation::new(&schema, &mut store);
        let tuple = FieldTuple(vec![Some(Scalar::Short(1))]);
        assert!(acc
            .add(CONSERVATION_GROUP, pos(Chromosome::Chr1, 1), &tuple)
            .is_err());
        assert!(acc.add(1, pos(Chromosome::Chr1, 1), &tuple).is_err());
    }

    // ==================== Merge Tests ====================

    #[test]
    fn test_merge_existing_record() {
        let schema = Schema::conservation(10).unwrap();
        let mut store = Store::new();
        let mut acc = Accumulation::new(&schema, &mut store);
        acc.add_conservation(pos(Chromosome::Chr1, 1), &scores(1.0, 1.0))
            .unwrap();
        acc.finish().unwrap();

        let mut acc = Accumulation::new(&schema, &mut store);
        acc.add_conservation(pos(Chromosome::Chr1, 2), &scores(2.0, 2.0))
            .unwrap();
        acc.finish().unwrap();

        assert_eq!(
            lookup(&store, &schema, pos(Chromosome::Chr1, 1)).unwrap(),
            scores(1.0, 1.0)
        );
        assert_eq!(
            lookup(&store, &schema, pos(Chromosome::Chr1, 2)).unwrap(),
            scores(2.0, 2.0)
        );
    }

    #[test]
    fn test_merge_disabled_overwrites() {
        let schema = Schema::conservation(10).unwrap();
        let mut store = Store::new();
        let mut acc = Accumulation::new(&schema, &mut store);
        acc.add_conservation(pos(Chromosome::Chr1, 1), &scores(1.0, 1.0))
            .unwrap();
        acc.finish().unwrap();

        let mut acc = Accumulation::new(&schema, &mut store).merge_existing(false);
        acc.add_conservation(pos(Chromosome::Chr1, 2), &scores(2.0, 2.0))
            .unwrap();
        acc.finish().unwrap();

        assert!(lookup(&store, &schema, pos(Chromosome::Chr1, 1)).is_none());
    }

    // ==================== Determinism Tests ====================

    #[test]
    fn test_deterministic_rebuild() {
        let schema = Schema::conservation(200).unwrap();
        let input: Vec<_> = (0..5_000u32)
            .filter(|i| i % 7 == 0 || i % 11 == 0)
            .map(|i| {
                let n = f64::from(i % 50) / 10.0;
                (pos(Chromosome::Chr7, i * 3), scores(n, -n))
            })
            .collect();

        let build = || {
            let mut store = Store::new();
            let mut acc = Accumulation::new(&schema, &mut store);
            for (position, scores) in &input {
                acc.add_conservation(*position, scores).unwrap();
            }
            acc.finish().unwrap();
            store
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_scheme_statistics() {
        let schema = Schema::conservation(100).unwrap();
        let mut store = Store::new();
        let mut acc = Accumulation::new(&schema, &mut store);
        acc.add_conservation(pos(Chromosome::Chr1, 7), &scores(4.48, 4.48))
            .unwrap();
        for i in 100..200 {
            let v = f64::from(i - 100) / 10.0;
            acc.add_conservation(pos(Chromosome::Chr1, i), &scores(v, 1.0))
                .unwrap();
        }
        let stats = acc.finish().unwrap();
        let group = &stats.groups()[0];
        assert_eq!(group.count(Scheme::Selective), 1);
        assert_eq!(group.count(Scheme::Orders), 1);
        assert_eq!(group.bytes(Scheme::Orders), 401);
    }
}
