//! Tally of the schemes chosen while building a store

use std::fmt;

use tracing::info;

use crate::compression::Scheme;
use crate::core::KEY_SIZE;

const NUM_SCHEMES: usize = Scheme::ALL.len();

/// Counts and sizes of the batches written for one field group
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupStats {
    pub name: String,
    counts: [u64; NUM_SCHEMES],
    bytes: [u64; NUM_SCHEMES],
}
impl GroupStats {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, scheme: Scheme, size: usize) {
        self.counts[scheme.tag() as usize] += 1;
        self.bytes[scheme.tag() as usize] += size as u64;
    }

    #[must_use]
    pub fn count(&self, scheme: Scheme) -> u64 {
        self.counts[scheme.tag() as usize]
    }

    #[must_use]
    pub fn bytes(&self, scheme: Scheme) -> u64 {
        self.bytes[scheme.tag() as usize]
    }

    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.counts.iter().sum()
    }

    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.bytes.iter().sum()
    }
}

/// Statistics of a complete build
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompressionStats {
    groups: Vec<GroupStats>,
    /// Number of records written
    pub records: u64,
    /// Number of keys deleted because their bucket held only default values
    pub deleted: u64,
    /// Number of positions consumed
    pub positions: u64,
}
impl CompressionStats {
    #[must_use]
    pub fn new<'a>(group_names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            groups: group_names.into_iter().map(GroupStats::new).collect(),
            ..Self::default()
        }
    }

    pub fn record_batch(&mut self, group: usize, scheme: Scheme, size: usize) {
        if let Some(stats) = self.groups.get_mut(group) {
            stats.record(scheme, size);
        }
    }

    #[must_use]
    pub fn groups(&self) -> &[GroupStats] {
        &self.groups
    }

    /// Total bytes written, keys included
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.groups.iter().map(GroupStats::total_bytes).sum::<u64>()
            + self.records * KEY_SIZE as u64
    }

    /// Emits the statistics as `info` events
    #[allow(clippy::cast_precision_loss)]
    pub fn log(&self) {
        info!(
            records = self.records,
            deleted = self.deleted,
            positions = self.positions,
            total_bytes = self.total_bytes(),
            "build complete"
        );
        for group in &self.groups {
            let total = group.total_count().max(1);
            for scheme in Scheme::ALL {
                let count = group.count(scheme);
                if count == 0 {
                    continue;
                }
                info!(
                    group = %group.name,
                    scheme = %scheme,
                    count,
                    share = %format!("{:.2}%", percent(count, total)),
                    avg_bytes = %format!("{:.1}", group.bytes(scheme) as f64 / count as f64),
                    "compression"
                );
            }
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, total: u64) -> f64 {
    part as f64 * 100.0 / total as f64
}

impl fmt::Display for CompressionStats {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "records: {}, deleted: {}, positions: {}, bytes: {}",
            self.records,
            self.deleted,
            self.positions,
            self.total_bytes()
        )?;
        for group in &self.groups {
            let total = group.total_count().max(1);
            for scheme in Scheme::ALL {
                let count = group.count(scheme);
                if count == 0 {
                    continue;
                }
                writeln!(
                    f,
                    "{}\t{}\t{}\t{:.2}%\t{:.1}",
                    group.name,
                    scheme,
                    count,
                    percent(count, total),
                    group.bytes(scheme) as f64 / count as f64
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_batches() {
        let mut stats = CompressionStats::new(["conservation"]);
        stats.record_batch(0, Scheme::Empty, 1);
        stats.record_batch(0, Scheme::Selective, 7);
        stats.record_batch(0, Scheme::Selective, 11);
        stats.record_batch(3, Scheme::Orders, 100);
        stats.records = 3;

        let group = &stats.groups()[0];
        assert_eq!(group.count(Scheme::Selective), 2);
        assert_eq!(group.bytes(Scheme::Selective), 18);
        assert_eq!(group.total_count(), 3);
        assert_eq!(stats.total_bytes(), 19 + 12);
    }

    #[test]
    fn test_display() {
        let mut stats = CompressionStats::new(["conservation"]);
        stats.record_batch(0, Scheme::Orders, 401);
        stats.records = 1;
        let text = stats.to_string();
        assert!(text.contains("records: 1"));
        assert!(text.contains("ORDERS\t1\t100.00%\t401.0"));
    }
}
