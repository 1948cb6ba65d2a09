use crate::core::{BucketKey, Position};
use crate::error::{Error, Result};
use crate::read::Store;
use crate::record::BatchRecord;

/// Number of positions a thread handles between two `on_batch_complete` calls
pub const BATCH_SIZE: usize = 1024;

/// Trait for types that can process store lookups in parallel.
///
/// Each thread works on its own clone of the processor.
pub trait ParallelProcessor: Send + Clone {
    /// Process a single position
    ///
    /// `record` is the stored bucket containing the position, or `None` if
    /// the store holds no data for it.
    fn process_record(&mut self, position: Position, record: Option<&BatchRecord>) -> Result<()>;

    /// Called when a thread finishes processing a batch of positions
    /// Default implementation does nothing
    fn on_batch_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Set the thread ID for this processor
    ///
    /// Each thread should call this method with its own unique ID.
    fn set_tid(&mut self, _tid: usize) {
        // Default implementation does nothing
    }

    /// Get the thread ID for this processor
    fn get_tid(&self) -> Option<usize> {
        None
    }
}

impl Store {
    /// Looks up `positions` on `num_threads` threads
    ///
    /// The positions are split into contiguous chunks, one per thread. A thread
    /// reuses the last fetched record while consecutive positions fall into the
    /// same bucket, so sorted input needs one read per bucket and thread.
    /// `num_threads == 0` uses all available cores.
    pub fn process_parallel<P: ParallelProcessor>(
        &self,
        positions: &[Position],
        processor: P,
        num_threads: usize,
    ) -> Result<()> {
        let num_threads = if num_threads == 0 {
            num_cpus::get()
        } else {
            num_threads.min(num_cpus::get())
        };
        if positions.is_empty() {
            return Ok(());
        }
        let per_thread = positions.len().div_ceil(num_threads);

        std::thread::scope(|scope| {
            let handles: Vec<_> = positions
                .chunks(per_thread)
                .enumerate()
                .map(|(tid, chunk)| {
                    let mut processor = processor.clone();
                    processor.set_tid(tid);
                    scope.spawn(move || self.process_chunk(chunk, &mut processor))
                })
                .collect();

            for handle in handles {
                handle
                    .join()
                    .map_err(|_| Error::GenericError("lookup thread panicked".into()))??;
            }
            Ok(())
        })
    }

    fn process_chunk<P: ParallelProcessor>(
        &self,
        chunk: &[Position],
        processor: &mut P,
    ) -> Result<()> {
        let mut cached: Option<(BucketKey, Option<BatchRecord>)> = None;
        for batch in chunk.chunks(BATCH_SIZE) {
            for position in batch {
                let key = BucketKey::for_position(position, self.bucket_size())?;
                if cached.as_ref().is_none_or(|(cached_key, _)| *cached_key != key) {
                    cached = Some((key, self.get_record(position)?));
                }
                let record = cached.as_ref().and_then(|(_, record)| record.as_ref());
                processor.process_record(*position, record)?;
            }
            processor.on_batch_complete()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use std::collections::HashMap;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tempfile::TempDir;

    use super::*;
    use crate::conservation::Conservation;
    use crate::core::Chromosome;
    use crate::read::StoreOptions;
    use crate::write::WriterBuilder;

    #[derive(Clone, Default)]
    struct TestProcessor {
        pub n_records: Arc<Mutex<usize>>,
        pub n_found: Arc<Mutex<usize>>,
        pub n_batches: Arc<Mutex<usize>>,
        pub tids: Arc<Mutex<HashMap<usize, usize>>>,
        tid: Option<usize>,
    }
    impl ParallelProcessor for TestProcessor {
        fn process_record(
            &mut self,
            position: Position,
            record: Option<&BatchRecord>,
        ) -> Result<()> {
            *self.n_records.lock() += 1;
            if let Some(record) = record {
                if record.get_conservation(&position)?.is_some() {
                    *self.n_found.lock() += 1;
                }
            }
            if let Some(tid) = self.tid {
                *self.tids.lock().entry(tid).or_default() += 1;
            }
            Ok(())
        }

        fn on_batch_complete(&mut self) -> Result<()> {
            *self.n_batches.lock() += 1;
            Ok(())
        }

        fn set_tid(&mut self, tid: usize) {
            self.tid = Some(tid);
        }

        fn get_tid(&self) -> Option<usize> {
            self.tid
        }
    }

    fn build_store(dir: &TempDir) {
        let writer = WriterBuilder::default().bucket_size(50).build(dir.path()).unwrap();
        let mut acc = writer.accumulation().unwrap();
        for value in (0..10_000u32).step_by(3) {
            acc.add_conservation(
                Position::new(Chromosome::Chr4, value),
                &Conservation::new(Some(1.25), None),
            )
            .unwrap();
        }
        acc.finish().unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_parallel_processor() {
        let dir = TempDir::new().unwrap();
        build_store(&dir);
        let store = Store::open_with(dir.path(), StoreOptions::default().bucket_size(50)).unwrap();

        let positions: Vec<_> = (0..20_000u32)
            .map(|v| Position::new(Chromosome::Chr4, v))
            .collect();
        for num_threads in [0, 1, 4] {
            let processor = TestProcessor::default();
            store
                .process_parallel(&positions, processor.clone(), num_threads)
                .unwrap();
            assert_eq!(*processor.n_records.lock(), positions.len());
            assert_eq!(*processor.n_found.lock(), 3334);
            assert!(*processor.n_batches.lock() >= positions.len() / BATCH_SIZE);
            assert_eq!(
                processor.tids.lock().values().sum::<usize>(),
                positions.len()
            );
        }
    }

    #[test]
    fn test_parallel_empty_input() {
        let dir = TempDir::new().unwrap();
        build_store(&dir);
        let store = Store::open_with(dir.path(), StoreOptions::default().bucket_size(50)).unwrap();
        let processor = TestProcessor::default();
        store.process_parallel(&[], processor.clone(), 2).unwrap();
        assert_eq!(*processor.n_records.lock(), 0);
    }
}
