use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::{
    record::{StationClosure, TrackClosure},
    window::Windowed,
};

/// Lookup of the stations and track directions closed at one instant.
///
/// The index is a per-request materialisation; build a fresh one for every
/// decision rather than keeping it around, since closures expire continuously.
#[derive(Debug, Default, Clone)]
pub struct ClosureIndex {
    stations: HashSet<String>,
    directions: HashSet<(String, String)>,
}

impl ClosureIndex {
    /// Index the closures of both families that are active at `now`.
    pub fn at(
        station_closures: &[StationClosure],
        track_closures: &[TrackClosure],
        now: DateTime<Utc>,
    ) -> Self {
        Self::from_active(
            station_closures
                .iter()
                .filter(|closure| closure.is_active_at(now)),
            track_closures
                .iter()
                .filter(|closure| closure.is_active_at(now)),
        )
    }

    /// Index closures that the caller already knows to be active.
    pub fn from_active<'a>(
        station_closures: impl IntoIterator<Item = &'a StationClosure>,
        track_closures: impl IntoIterator<Item = &'a TrackClosure>,
    ) -> Self {
        let stations = station_closures
            .into_iter()
            .map(|closure| closure.target.station_id.clone())
            .collect();

        let mut directions = HashSet::new();
        for closure in track_closures {
            let target = &closure.target;
            directions.insert((target.source.clone(), target.destination.clone()));
            if target.bidirectional {
                directions.insert((target.destination.clone(), target.source.clone()));
            }
        }

        Self {
            stations,
            directions,
        }
    }

    /// Whether any active closure covers the station.
    pub fn is_station_closed(&self, station_id: &str) -> bool {
        self.stations.contains(station_id)
    }

    /// Whether travel from `source` to `destination` is closed.
    pub fn is_track_closed(&self, source: &str, destination: &str) -> bool {
        self.directions
            .contains(&(source.to_string(), destination.to_string()))
    }

    /// True when nothing is closed.
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty() && self.directions.is_empty()
    }
}
