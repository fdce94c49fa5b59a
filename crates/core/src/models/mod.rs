//! Shared domain models.

mod network;
mod traffic;

pub use network::{Station, Track};
pub use traffic::{Booking, BookingStatus, Train};

use crate::error::{RailError, RailResult};

pub(crate) fn require_text(field: &str, value: &str) -> RailResult<()> {
    if value.trim().is_empty() {
        return Err(RailError::validation(format!("missing required field {field}")));
    }
    Ok(())
}

pub(crate) fn require_finite(field: &str, value: f64) -> RailResult<()> {
    if !value.is_finite() {
        return Err(RailError::validation(format!("{field} must be a finite number")));
    }
    Ok(())
}

pub(crate) fn require_positive(field: &str, value: f64) -> RailResult<()> {
    require_finite(field, value)?;
    if value <= 0.0 {
        return Err(RailError::validation(format!("{field} must be positive")));
    }
    Ok(())
}
