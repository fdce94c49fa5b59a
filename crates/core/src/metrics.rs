//! Dataset counters, computed on demand from a snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{closure::Windowed, store::Snapshot};

/// Record counts of the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    /// Number of trains.
    pub total_trains: usize,
    /// Number of stations.
    pub total_stations: usize,
    /// Number of tracks.
    pub total_tracks: usize,
    /// Number of bookings.
    pub total_bookings: usize,
    /// Station closures active at the time of computation.
    pub total_station_closures: usize,
    /// Track closures active at the time of computation.
    pub total_track_closures: usize,
}

/// Count the records of `snapshot`, closures as of `now`.
pub fn compute_metrics(snapshot: &Snapshot, now: DateTime<Utc>) -> Metrics {
    Metrics {
        total_trains: snapshot.trains.len(),
        total_stations: snapshot.stations.len(),
        total_tracks: snapshot.tracks.len(),
        total_bookings: snapshot.bookings.len(),
        total_station_closures: snapshot
            .station_closures
            .iter()
            .filter(|closure| closure.is_active_at(now))
            .count(),
        total_track_closures: snapshot
            .track_closures
            .iter()
            .filter(|closure| closure.is_active_at(now))
            .count(),
    }
}
