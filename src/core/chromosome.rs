//! Genomic coordinates: chromosomes, positions and intervals
//!
//! The chromosome set is closed. Every chromosome has a single-byte code which
//! is used as the leading byte of a bucket key, so the byte order of the codes
//! matches the total order of the chromosomes.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, KeyError, Result};

/// One of the supported chromosomes
///
/// The discriminant of each variant is its on-disk byte code.
/// Autosomes map to their number, `X` to 24, `Y` to 25 and `M` to 26.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Chromosome {
    Chr1 = 1,
    Chr2 = 2,
    Chr3 = 3,
    Chr4 = 4,
    Chr5 = 5,
    Chr6 = 6,
    Chr7 = 7,
    Chr8 = 8,
    Chr9 = 9,
    Chr10 = 10,
    Chr11 = 11,
    Chr12 = 12,
    Chr13 = 13,
    Chr14 = 14,
    Chr15 = 15,
    Chr16 = 16,
    Chr17 = 17,
    Chr18 = 18,
    Chr19 = 19,
    Chr20 = 20,
    Chr21 = 21,
    Chr22 = 22,
    X = 24,
    Y = 25,
    M = 26,
}

const AUTOSOMES: [Chromosome; 22] = [
    Chromosome::Chr1,
    Chromosome::Chr2,
    Chromosome::Chr3,
    Chromosome::Chr4,
    Chromosome::Chr5,
    Chromosome::Chr6,
    Chromosome::Chr7,
    Chromosome::Chr8,
    Chromosome::Chr9,
    Chromosome::Chr10,
    Chromosome::Chr11,
    Chromosome::Chr12,
    Chromosome::Chr13,
    Chromosome::Chr14,
    Chromosome::Chr15,
    Chromosome::Chr16,
    Chromosome::Chr17,
    Chromosome::Chr18,
    Chromosome::Chr19,
    Chromosome::Chr20,
    Chromosome::Chr21,
    Chromosome::Chr22,
];

impl Chromosome {
    /// All supported chromosomes in their total order
    pub const ALL: [Chromosome; 25] = [
        Self::Chr1,
        Self::Chr2,
        Self::Chr3,
        Self::Chr4,
        Self::Chr5,
        Self::Chr6,
        Self::Chr7,
        Self::Chr8,
        Self::Chr9,
        Self::Chr10,
        Self::Chr11,
        Self::Chr12,
        Self::Chr13,
        Self::Chr14,
        Self::Chr15,
        Self::Chr16,
        Self::Chr17,
        Self::Chr18,
        Self::Chr19,
        Self::Chr20,
        Self::Chr21,
        Self::Chr22,
        Self::X,
        Self::Y,
        Self::M,
    ];

    /// Returns the byte code of the chromosome
    #[must_use]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Decodes a byte code back into a chromosome
    pub fn from_byte(value: u8) -> Result<Self> {
        match value {
            1..=22 => Ok(AUTOSOMES[(value - 1) as usize]),
            24 => Ok(Self::X),
            25 => Ok(Self::Y),
            26 => Ok(Self::M),
            _ => Err(KeyError::UnknownChromosome(value).into()),
        }
    }

    /// Short name without the `chr` prefix (e.g. `1`, `X`, `M`)
    #[must_use]
    pub fn short_name(self) -> &'static str {
        const NAMES: [&str; 22] = [
            "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16",
            "17", "18", "19", "20", "21", "22",
        ];
        match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::M => "M",
            other => NAMES[(other.to_byte() - 1) as usize],
        }
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chr{}", self.short_name())
    }
}

impl FromStr for Chromosome {
    type Err = Error;

    /// Accepts `1`, `chr1`, `CHR1`, `X`, `chrX`, `M`, `MT` and `chrM`
    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let value = upper.strip_prefix("CHR").unwrap_or(&upper);
        match value {
            "X" => Ok(Self::X),
            "Y" => Ok(Self::Y),
            "M" | "MT" => Ok(Self::M),
            _ => match value.parse::<u8>() {
                Ok(n @ 1..=22) => Ok(AUTOSOMES[(n - 1) as usize]),
                _ => Err(KeyError::InvalidChromosome(s.to_string()).into()),
            },
        }
    }
}

/// A single position on a chromosome
///
/// Ordered by chromosome first and offset second.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub chromosome: Chromosome,
    pub value: u32,
}
impl Position {
    #[must_use]
    pub fn new(chromosome: Chromosome, value: u32) -> Self {
        Self { chromosome, value }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chromosome, self.value)
    }
}

impl FromStr for Position {
    type Err = Error;

    /// Parses `chrom:offset`, e.g. `chr1:12345` or `X:100`
    fn from_str(s: &str) -> Result<Self> {
        let Some((chromosome, value)) = s.rsplit_once(':') else {
            return Err(KeyError::InvalidChromosome(s.to_string()).into());
        };
        let value = value
            .replace('_', "")
            .parse::<u32>()
            .map_err(|_| KeyError::InvalidChromosome(s.to_string()))?;
        Ok(Self::new(chromosome.parse()?, value))
    }
}

/// A closed range of positions `[start, end]` on a single chromosome
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    pub chromosome: Chromosome,
    pub start: u32,
    pub end: u32,
}
impl Interval {
    /// Creates a new interval
    ///
    /// # Panics
    ///
    /// Panics if `start > end`
    #[must_use]
    pub fn new(chromosome: Chromosome, start: u32, end: u32) -> Self {
        assert!(start <= end, "interval start ({start}) exceeds end ({end})");
        Self {
            chromosome,
            start,
            end,
        }
    }

    /// Returns the bucket of size `bucket_size` which contains the position
    ///
    /// The last bucket of the `u32` coordinate space is clipped at `u32::MAX`,
    /// which the key codec later rejects as an illegal bucket.
    #[must_use]
    pub fn bucket_containing(position: &Position, bucket_size: u32) -> Self {
        let start = (position.value / bucket_size) * bucket_size;
        let end = start.saturating_add(bucket_size - 1);
        Self::new(position.chromosome, start, end)
    }

    /// Number of positions covered by the interval
    #[must_use]
    pub fn len(&self) -> u64 {
        u64::from(self.end) - u64::from(self.start) + 1
    }

    /// An interval always covers at least one position
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[must_use]
    pub fn contains(&self, position: &Position) -> bool {
        self.chromosome == position.chromosome
            && position.value >= self.start
            && position.value <= self.end
    }

    /// Index of the position relative to the start of the interval
    pub fn index_of(&self, position: &Position) -> Result<usize> {
        if self.contains(position) {
            Ok((position.value - self.start) as usize)
        } else {
            Err(KeyError::PositionOutsideBucket {
                position: position.to_string(),
                bucket: self.to_string(),
            }
            .into())
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
    }
}
