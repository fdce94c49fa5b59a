use std::{collections::HashSet, marker::PhantomData};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use super::window::{window_end, Windowed};
use crate::{
    error::{RailResult, RecordKind},
    models::{require_finite, require_text},
};

/// Payload that distinguishes one closure variant from another.
pub trait ClosureTarget {
    /// Record kind used in error reports.
    const KIND: RecordKind;
    /// Namespace prefix of generated closure ids.
    const ID_PREFIX: &'static str;
    /// Value of the stored `type` field.
    const TYPE_TAG: &'static str;
}

/// A closed station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationTarget {
    /// The station that is unavailable.
    pub station_id: String,
}

impl ClosureTarget for StationTarget {
    const KIND: RecordKind = RecordKind::StationClosure;
    const ID_PREFIX: &'static str = "stclos";
    const TYPE_TAG: &'static str = "station";
}

/// A closed track edge.
///
/// `bidirectional` belongs to the closure, not to the track: a one-way
/// closure of a two-way track leaves the reverse direction open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackTarget {
    /// Origin station id of the closed direction.
    pub source: String,
    /// Destination station id of the closed direction.
    pub destination: String,
    /// Whether travel from `destination` to `source` is closed as well.
    #[serde(default)]
    pub bidirectional: bool,
}

impl ClosureTarget for TrackTarget {
    const KIND: RecordKind = RecordKind::TrackClosure;
    const ID_PREFIX: &'static str = "trclos";
    const TYPE_TAG: &'static str = "track";
}

/// A time-windowed unavailability of a network resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    rename_all = "camelCase",
    bound(serialize = "T: Serialize + ClosureTarget")
)]
pub struct Closure<T> {
    /// Server-assigned identifier, namespaced by variant.
    pub id: String,
    /// Free-form explanation shown to operators.
    pub reason: String,
    /// Window length in hours.
    #[serde(rename = "duration")]
    pub duration_hours: f64,
    /// Instant the closure took effect. Absent or unreadable values mark a
    /// malformed record that is pruned on the next load.
    #[serde(
        default,
        deserialize_with = "lenient_instant",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<DateTime<Utc>>,
    /// Variant payload.
    #[serde(flatten)]
    pub target: T,
    /// Written as `type` from the variant; ignored when reading.
    #[serde(rename = "type", serialize_with = "type_tag", skip_deserializing)]
    pub kind: PhantomData<T>,
}

/// Closure of a single station.
pub type StationClosure = Closure<StationTarget>;
/// Closure of a track edge.
pub type TrackClosure = Closure<TrackTarget>;

impl<T> Windowed for Closure<T> {
    fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    fn duration_hours(&self) -> f64 {
        self.duration_hours
    }
}

impl<T> Closure<T> {
    /// Instant the closure stops being active.
    ///
    /// `None` when the record has no start or the window never closes.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.start_time.and_then(|start| window_end(start, self.duration_hours))
    }
}

impl<T: ClosureTarget> Closure<T> {
    /// Generate an id unique among `existing`.
    ///
    /// Ids look like `stclos_20261019120000`; a `-N` suffix is appended when
    /// another closure already took the timestamped id.
    pub(crate) fn next_id(existing: &[Closure<T>], now: DateTime<Utc>) -> String {
        let base = format!("{}_{}", T::ID_PREFIX, now.format("%Y%m%d%H%M%S"));
        let taken: HashSet<&str> = existing.iter().map(|closure| closure.id.as_str()).collect();
        if !taken.contains(base.as_str()) {
            return base;
        }
        (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or(base)
    }
}

/// Caller-supplied fields for closing a station.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationClosureRequest {
    /// Station to close; must exist.
    pub station_id: String,
    /// Explanation of the closure.
    pub reason: String,
    /// Length in hours.
    #[serde(rename = "duration")]
    pub duration_hours: f64,
}

impl StationClosureRequest {
    pub(crate) fn validate(&self) -> RailResult<()> {
        require_text("stationId", &self.station_id)?;
        require_text("reason", &self.reason)?;
        require_finite("duration", self.duration_hours)
    }

    pub(crate) fn into_closure(self, id: String, now: DateTime<Utc>) -> StationClosure {
        Closure {
            id,
            reason: self.reason,
            duration_hours: self.duration_hours,
            start_time: Some(now),
            target: StationTarget {
                station_id: self.station_id,
            },
            kind: PhantomData,
        }
    }
}

/// Caller-supplied fields for closing a track.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackClosureRequest {
    /// Origin of the closed direction.
    pub source: String,
    /// Destination of the closed direction.
    pub destination: String,
    /// Explanation of the closure.
    pub reason: String,
    /// Length in hours.
    #[serde(rename = "duration")]
    pub duration_hours: f64,
    /// Close the reverse direction too.
    #[serde(default)]
    pub bidirectional: bool,
}

impl TrackClosureRequest {
    pub(crate) fn validate(&self) -> RailResult<()> {
        require_text("source", &self.source)?;
        require_text("destination", &self.destination)?;
        require_text("reason", &self.reason)?;
        require_finite("duration", self.duration_hours)
    }

    pub(crate) fn into_closure(self, id: String, now: DateTime<Utc>) -> TrackClosure {
        Closure {
            id,
            reason: self.reason,
            duration_hours: self.duration_hours,
            start_time: Some(now),
            target: TrackTarget {
                source: self.source,
                destination: self.destination,
                bidirectional: self.bidirectional,
            },
            kind: PhantomData,
        }
    }
}

fn type_tag<T: ClosureTarget, S: Serializer>(
    _: &PhantomData<T>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(T::TYPE_TAG)
}

// Accepts RFC 3339 as well as offset-less ISO timestamps, read as UTC.
fn lenient_instant<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    if let Ok(instant) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(instant.with_timezone(&Utc)));
    }
    match NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => Ok(Some(naive.and_utc())),
        Err(err) => {
            warn!("ignoring unreadable closure start time '{raw}': {err}");
            Ok(None)
        }
    }
}
