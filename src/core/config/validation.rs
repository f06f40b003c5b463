//! Validation helper functions for configuration types.

use crate::core::errors::{CloneEvalError, Result};

/// Validate that a usize value is greater than zero.
pub fn validate_positive_usize(value: usize, field: &str) -> Result<()> {
    if value == 0 {
        return Err(CloneEvalError::config_field(
            format!("{} must be greater than 0", field),
            field,
        ));
    }
    Ok(())
}

/// Validate that an f64 value is in the unit range [0.0, 1.0].
pub fn validate_unit_range(value: f64, field: &str) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(CloneEvalError::config_field(
            format!("{} must be between 0.0 and 1.0", field),
            field,
        ));
    }
    Ok(())
}

/// Validate that a u32 value is within a bounded range (inclusive).
pub fn validate_bounded_u32(value: u32, min: u32, max: u32, field: &str) -> Result<()> {
    if value < min || value > max {
        return Err(CloneEvalError::config_field(
            format!("{} must be between {} and {}", field, min, max),
            field,
        ));
    }
    Ok(())
}
