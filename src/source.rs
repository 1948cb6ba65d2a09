//! Reader for sorted conservation source files
//!
//! Each line is tab-separated: `chrom  pos  gerp_n  gerp_rs`. Input may be
//! plain or compressed; the format is sniffed with `niffler`. Lines starting
//! with `#` are comments. A score of `0`, `.` or an empty column is null.
//! Lines on chromosomes outside of the supported set are skipped.

use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use tracing::trace;

use crate::conservation::Conservation;
use crate::core::{Chromosome, Position};
use crate::error::{BuildError, Result};

/// One parsed source line
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceRecord {
    pub position: Position,
    pub conservation: Conservation,
}

/// Iterator over the records of a source file
pub struct SourceReader<R: BufRead> {
    inner: R,
    buffer: String,
    line: usize,
    skipped: usize,
}
impl SourceReader<BufReader<Box<dyn Read>>> {
    /// Opens a possibly compressed file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (handle, format) = niffler::from_path(path.as_ref())?;
        trace!(path = %path.as_ref().display(), ?format, "opened source");
        Ok(Self::new(BufReader::new(handle)))
    }
}
impl<R: BufRead> SourceReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: String::new(),
            line: 0,
            skipped: 0,
        }
    }

    /// Number of lines skipped for an unsupported chromosome
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn read_line(&mut self) -> io::Result<usize> {
        self.buffer.clear();
        self.line += 1;
        self.inner.read_line(&mut self.buffer)
    }

    fn invalid(&self, reason: impl Into<String>) -> BuildError {
        BuildError::InvalidSource {
            line: self.line,
            reason: reason.into(),
        }
    }

    /// Parses the current line, `None` if it should be skipped
    fn parse_line(&mut self) -> Result<Option<SourceRecord>> {
        let line = self.buffer.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let mut columns = line.split('\t');
        let (Some(chrom), Some(pos)) = (columns.next(), columns.next()) else {
            return Err(self.invalid("expected at least 2 columns").into());
        };
        let Ok(chromosome) = chrom.parse::<Chromosome>() else {
            trace!(line = self.line, chrom, "skipping unsupported chromosome");
            self.skipped += 1;
            return Ok(None);
        };
        let value = pos
            .trim()
            .parse::<u32>()
            .map_err(|e| self.invalid(format!("invalid position {pos:?}: {e}")))?;
        let gerp_n = self.parse_score(columns.next())?;
        let gerp_rs = self.parse_score(columns.next())?;
        Ok(Some(SourceRecord {
            position: Position::new(chromosome, value),
            conservation: Conservation::new(gerp_n, gerp_rs),
        }))
    }

    fn parse_score(&self, column: Option<&str>) -> Result<Option<f64>> {
        match column.map(str::trim) {
            None | Some("" | "." | "0") => Ok(None),
            Some(value) => value
                .parse::<f64>()
                .map(Some)
                .map_err(|e| self.invalid(format!("invalid score {value:?}: {e}")).into()),
        }
    }
}

impl<R: BufRead> Iterator for SourceReader<R> {
    type Item = Result<SourceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.read_line() {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            match self.parse_line() {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => {}
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
