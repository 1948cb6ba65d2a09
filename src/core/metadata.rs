//! Store-level metadata: format version and genome assembly
//!
//! Both values live in the `info` column family under short ASCII keys. The
//! format version is a 2-byte big-endian `i16`, the assembly a UTF-8 string.
//! The bucket size is kept next to them as a 4-byte big-endian `u32`.

use std::fmt;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, warn};

use crate::error::{Error, Result, StoreError};
use crate::{KEY_ASSEMBLY, KEY_BUCKET_SIZE, KEY_FORMAT_VERSION};

/// Genome assembly a store is built against
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Assembly {
    GRCh37,
    #[default]
    GRCh38,
}
impl Assembly {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GRCh37 => "GRCh37",
            Self::GRCh38 => "GRCh38",
        }
    }
}

impl fmt::Display for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Assembly {
    type Err = Error;

    /// Accepts the canonical names and the common `hg19`/`hg38` aliases
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grch37" | "hg19" => Ok(Self::GRCh37),
            "grch38" | "hg38" => Ok(Self::GRCh38),
            _ => Err(StoreError::UnknownAssembly(s.to_string()).into()),
        }
    }
}

/// Metadata record written once at store creation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub format_version: i16,
    pub assembly: Assembly,
}
impl Metadata {
    #[must_use]
    pub fn new(format_version: i16, assembly: Assembly) -> Self {
        Self {
            format_version,
            assembly,
        }
    }

    /// Encodes the format version value
    #[must_use]
    pub fn encode_version(&self) -> [u8; 2] {
        let mut buf = [0u8; 2];
        BigEndian::write_i16(&mut buf, self.format_version);
        buf
    }

    /// Encodes the assembly value
    #[must_use]
    pub fn encode_assembly(&self) -> &'static [u8] {
        self.assembly.as_str().as_bytes()
    }

    pub fn decode_version(bytes: &[u8]) -> Result<i16> {
        if bytes.len() != 2 {
            return Err(StoreError::InvalidMetadata {
                key: KEY_FORMAT_VERSION,
                reason: format!("expected 2 bytes, found {}", bytes.len()),
            }
            .into());
        }
        Ok(BigEndian::read_i16(bytes))
    }

    pub fn decode_assembly(bytes: &[u8]) -> Result<Assembly> {
        let name = std::str::from_utf8(bytes).map_err(|e| StoreError::InvalidMetadata {
            key: KEY_ASSEMBLY,
            reason: e.to_string(),
        })?;
        name.parse()
    }

    #[must_use]
    pub fn encode_bucket_size(bucket_size: u32) -> [u8; 4] {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, bucket_size);
        buf
    }

    pub fn decode_bucket_size(bytes: &[u8]) -> Result<u32> {
        if bytes.len() != 4 {
            return Err(StoreError::InvalidMetadata {
                key: KEY_BUCKET_SIZE,
                reason: format!("expected 4 bytes, found {}", bytes.len()),
            }
            .into());
        }
        match BigEndian::read_u32(bytes) {
            0 => Err(StoreError::InvalidMetadata {
                key: KEY_BUCKET_SIZE,
                reason: "bucket size is zero".to_string(),
            }
            .into()),
            bucket_size => Ok(bucket_size),
        }
    }

    /// Checks the version first, then the assembly
    ///
    /// An assembly mismatch is an error when `enforce` is set and a warning
    /// otherwise. A version mismatch is always an error.
    pub fn validate(
        &self,
        expected_version: i16,
        expected_assembly: Option<Assembly>,
        enforce: bool,
    ) -> Result<()> {
        if self.format_version != expected_version {
            return Err(StoreError::FormatVersionMismatch {
                found: self.format_version,
                expected: expected_version,
            }
            .into());
        }
        debug!(version = self.format_version, "format version accepted");

        let Some(expected) = expected_assembly else {
            return Ok(());
        };
        if self.assembly != expected {
            if enforce {
                return Err(StoreError::AssemblyMismatch {
                    found: self.assembly.to_string(),
                    expected: expected.to_string(),
                }
                .into());
            }
            warn!(
                found = %self.assembly,
                expected = %expected,
                "assembly mismatch ignored"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembly_parse() {
        assert_eq!("GRCh37".parse::<Assembly>().unwrap(), Assembly::GRCh37);
        assert_eq!("hg38".parse::<Assembly>().unwrap(), Assembly::GRCh38);
        assert!("GRCm39".parse::<Assembly>().is_err());
    }

    #[test]
    fn test_version_encoding() {
        let metadata = Metadata::new(1, Assembly::GRCh38);
        assert_eq!(metadata.encode_version(), [0, 1]);
        assert_eq!(Metadata::decode_version(&[0, 1]).unwrap(), 1);
        assert_eq!(Metadata::decode_version(&[0xff, 0xfe]).unwrap(), -2);
        assert!(Metadata::decode_version(&[1]).is_err());
    }

    #[test]
    fn test_assembly_encoding() {
        let metadata = Metadata::new(1, Assembly::GRCh37);
        assert_eq!(metadata.encode_assembly(), b"GRCh37");
        assert_eq!(
            Metadata::decode_assembly(b"GRCh37").unwrap(),
            Assembly::GRCh37
        );
    }

    #[test]
    fn test_assembly_not_utf8() {
        let result = Metadata::decode_assembly(&[0xff, 0xfe]);
        assert!(matches!(
            result,
            Err(Error::StoreError(StoreError::InvalidMetadata {
                key: KEY_ASSEMBLY,
                ..
            }))
        ));
    }

    #[test]
    fn test_bucket_size_encoding() {
        assert_eq!(Metadata::encode_bucket_size(200), [0, 0, 0, 200]);
        assert_eq!(Metadata::decode_bucket_size(&[0, 0x0f, 0x42, 0x40]).unwrap(), 1_000_000);
        assert!(Metadata::decode_bucket_size(&[0, 200]).is_err());
        assert!(matches!(
            Metadata::decode_bucket_size(&[0, 0, 0, 0]),
            Err(Error::StoreError(StoreError::InvalidMetadata {
                key: KEY_BUCKET_SIZE,
                ..
            }))
        ));
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_validate_version_mismatch() {
        let metadata = Metadata::new(1, Assembly::GRCh38);
        let result = metadata.validate(2, Some(Assembly::GRCh38), true);
        assert!(matches!(
            result,
            Err(Error::StoreError(StoreError::FormatVersionMismatch {
                found: 1,
                expected: 2
            }))
        ));
    }

    #[test]
    fn test_validate_version_before_assembly() {
        let metadata = Metadata::new(1, Assembly::GRCh37);
        let result = metadata.validate(2, Some(Assembly::GRCh38), true);
        assert!(matches!(
            result,
            Err(Error::StoreError(StoreError::FormatVersionMismatch { .. }))
        ));
    }

    #[test]
    fn test_validate_assembly_enforced() {
        let metadata = Metadata::new(1, Assembly::GRCh37);
        let result = metadata.validate(1, Some(Assembly::GRCh38), true);
        assert!(matches!(
            result,
            Err(Error::StoreError(StoreError::AssemblyMismatch { .. }))
        ));
    }

    #[test]
    fn test_validate_assembly_lenient() {
        let metadata = Metadata::new(1, Assembly::GRCh37);
        assert!(metadata.validate(1, Some(Assembly::GRCh38), false).is_ok());
        assert!(metadata.validate(1, None, true).is_ok());
    }
}
