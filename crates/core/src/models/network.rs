use serde::{Deserialize, Serialize};

use super::{require_finite, require_positive, require_text};
use crate::error::{RailError, RailResult};

/// A station node of the rail network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Unique station identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl Station {
    pub(crate) fn validate(&self) -> RailResult<()> {
        require_text("id", &self.id)?;
        require_text("name", &self.name)?;
        require_finite("latitude", self.latitude)?;
        require_finite("longitude", self.longitude)
    }
}

/// A directed track edge between two stations.
///
/// The identity of a track is its `(source, destination)` pair. A reverse
/// edge is a separate record unless `bidirectional` is set, in which case the
/// edge may also be travelled from `destination` to `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TrackRecord")]
pub struct Track {
    /// Origin station id.
    pub source: String,
    /// Destination station id.
    pub destination: String,
    /// Length of the edge.
    pub distance: f64,
    /// Number of trains the edge can carry.
    pub capacity: u32,
    /// Routing weight; equals `distance` unless given explicitly.
    pub weight: f64,
    /// Whether the edge may be travelled in reverse.
    pub bidirectional: bool,
}

impl Track {
    /// Build a one-way track whose weight equals its distance.
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        distance: f64,
        capacity: u32,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            distance,
            capacity,
            weight: distance,
            bidirectional: false,
        }
    }

    /// Mark the track as traversable in both directions.
    pub fn bidirectional(mut self) -> Self {
        self.bidirectional = true;
        self
    }

    /// Whether this record carries a train from `from` directly to `to`.
    pub fn connects(&self, from: &str, to: &str) -> bool {
        (self.source == from && self.destination == to)
            || (self.bidirectional && self.source == to && self.destination == from)
    }

    /// Whether the record's identity key is `(source, destination)`.
    pub fn is_keyed(&self, source: &str, destination: &str) -> bool {
        self.source == source && self.destination == destination
    }

    /// Whether either endpoint is the given station.
    pub fn touches(&self, station_id: &str) -> bool {
        self.source == station_id || self.destination == station_id
    }

    pub(crate) fn label(&self) -> String {
        format!("{}->{}", self.source, self.destination)
    }

    pub(crate) fn validate(&self) -> RailResult<()> {
        require_text("source", &self.source)?;
        require_text("destination", &self.destination)?;
        require_positive("distance", self.distance)?;
        require_positive("weight", self.weight)?;
        if self.capacity == 0 {
            return Err(RailError::validation("capacity must be positive"));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct TrackRecord {
    source: String,
    destination: String,
    distance: f64,
    capacity: u32,
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default)]
    bidirectional: bool,
}

impl From<TrackRecord> for Track {
    fn from(record: TrackRecord) -> Self {
        Self {
            weight: record.weight.unwrap_or(record.distance),
            source: record.source,
            destination: record.destination,
            distance: record.distance,
            capacity: record.capacity,
            bidirectional: record.bidirectional,
        }
    }
}
