#![allow(missing_docs)]

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{require_positive, require_text};
use crate::error::{RailError, RailResult};

/// A scheduled train with an ordered route of station ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Train {
    pub id: String,
    pub name: String,
    pub speed: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub route: Vec<String>,
    #[serde(default)]
    pub timings: Value,
}

impl Train {
    pub(crate) fn validate(&self) -> RailResult<()> {
        require_text("id", &self.id)?;
        require_text("name", &self.name)?;
        require_text("type", &self.kind)?;
        require_positive("speed", self.speed)?;
        if self.route.is_empty() {
            return Err(RailError::validation("route must contain at least one station"));
        }
        if let Some(blank) = self.route.iter().position(|stop| stop.trim().is_empty()) {
            return Err(RailError::validation(format!(
                "route entry {blank} is an empty station id"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Confirmed,
    Pending,
    Cancelled,
}

/// A passenger booking against a train on a given date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub booking_id: String,
    pub train_id: String,
    pub date: NaiveDate,
    pub passenger_count: u32,
    #[serde(deserialize_with = "fare_from_number_or_text")]
    pub fare: f64,
    #[serde(default)]
    pub status: BookingStatus,
}

impl Booking {
    pub(crate) fn validate(&self) -> RailResult<()> {
        require_text("bookingId", &self.booking_id)?;
        require_text("trainId", &self.train_id)?;
        if self.passenger_count == 0 {
            return Err(RailError::validation("passengerCount must be at least 1"));
        }
        if !self.fare.is_finite() || self.fare < 0.0 {
            return Err(RailError::validation("fare must be a non-negative number"));
        }
        Ok(())
    }
}

// Older datasets store the fare as a decimal string.
fn fare_from_number_or_text<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Fare {
        Number(f64),
        Text(String),
    }

    match Fare::deserialize(deserializer)? {
        Fare::Number(value) => Ok(value),
        Fare::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid fare '{text}'"))),
    }
}
