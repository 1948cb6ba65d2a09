//! Scaled fixed-point values
//!
//! A real value `v` with `|v| < 32` and at most three decimals is stored as
//! `round(v * 1000)` in an `i16`.

use crate::error::{CodecError, Result};

pub const SCALE: f64 = 1000.0;

/// Largest magnitude (exclusive) a scaled value may have
const MAX_MAGNITUDE: f64 = 32.0;

/// Allowed distance from an exact multiple of 0.001, absorbs binary float noise
const DECIMAL_TOLERANCE: f64 = 1e-3;

/// Converts a real value into its scaled representation
///
/// Values outside of the domain are rejected, never clamped.
pub fn to_scaled(value: f64) -> Result<i16> {
    if !value.is_finite() || value.abs() >= MAX_MAGNITUDE {
        return Err(CodecError::ValueOutOfDomain(value).into());
    }
    let scaled = value * SCALE;
    let rounded = scaled.round();
    if (scaled - rounded).abs() > DECIMAL_TOLERANCE {
        return Err(CodecError::ValueOutOfDomain(value).into());
    }
    Ok(rounded as i16)
}

#[must_use]
pub fn from_scaled(value: i16) -> f64 {
    f64::from(value) / SCALE
}
