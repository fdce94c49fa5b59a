//! Error taxonomy shared by the store, admission control and the railway service.

use std::{fmt, path::PathBuf};

use thiserror::Error;

use crate::admission::RouteRejection;

/// Result alias used by railway operations.
pub type RailResult<T> = Result<T, RailError>;

/// Failure reading or writing a dataset snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The snapshot file could not be read or written.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Location of the snapshot.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The snapshot file does not contain a valid dataset.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Location of the snapshot.
        path: PathBuf,
        /// Underlying JSON failure.
        #[source]
        source: serde_json::Error,
    },
    /// The dataset could not be serialised.
    #[error("failed to serialize dataset: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Kinds of records that can be referenced by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// A station.
    Station,
    /// A directed track edge.
    Track,
    /// A scheduled train.
    Train,
    /// A passenger booking.
    Booking,
    /// A station closure.
    StationClosure,
    /// A track closure.
    TrackClosure,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordKind::Station => "station",
            RecordKind::Track => "track",
            RecordKind::Train => "train",
            RecordKind::Booking => "booking",
            RecordKind::StationClosure => "station closure",
            RecordKind::TrackClosure => "track closure",
        };
        f.write_str(label)
    }
}

/// Reasons a mutation conflicts with the current dataset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictReason {
    /// A station with this id already exists.
    #[error("station id {0} already exists")]
    DuplicateStation(String),
    /// A track with this `(source, destination)` pair already exists.
    #[error("track from {origin} to {destination} already exists")]
    DuplicateTrack {
        /// Origin station id.
        origin: String,
        /// Destination station id.
        destination: String,
    },
    /// A train with this id already exists.
    #[error("train id {0} already exists")]
    DuplicateTrain(String),
    /// A booking with this id already exists.
    #[error("booking id {0} already exists")]
    DuplicateBooking(String),
    /// The station is still referenced by tracks.
    #[error("cannot delete station {station} used in tracks: {}", .tracks.join(", "))]
    StationInUse {
        /// Station that was asked to be removed.
        station: String,
        /// Tracks (`source->destination`) still referencing it.
        tracks: Vec<String>,
    },
    /// The proposed route is not admissible.
    #[error(transparent)]
    Route(#[from] RouteRejection),
}

/// Errors surfaced by railway operations.
#[derive(Debug, Error)]
pub enum RailError {
    /// Missing or malformed input; the caller must correct and retry.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A referenced record does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Kind of record that was looked up.
        kind: RecordKind,
        /// Identifier that was not found.
        id: String,
    },
    /// The request conflicts with existing records or closures.
    #[error("{0}")]
    Conflict(#[from] ConflictReason),
    /// The mutation lock could not be acquired in time.
    #[error("dataset is busy, retry the request")]
    Busy,
    /// The snapshot could not be loaded or saved.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl RailError {
    pub(crate) fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        RailError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        RailError::Validation(message.into())
    }

    /// Whether repeating the identical request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RailError::Busy | RailError::Storage(_))
    }
}

impl From<RouteRejection> for RailError {
    fn from(rejection: RouteRejection) -> Self {
        RailError::Conflict(ConflictReason::Route(rejection))
    }
}
