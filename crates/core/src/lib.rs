#![warn(clippy::all, missing_docs)]

//! Core domain logic for the railnet rail network manager.
//!
//! This crate hosts the network and traffic models, the time-windowed
//! closure model, route admission control, configuration handling and the
//! snapshot persistence used by the command-line frontend.

pub mod admission;
pub mod clock;
pub mod closure;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod railway;
pub mod store;

pub use admission::{AdmissionPolicy, RouteRejection};
pub use clock::{Clock, ManualClock, SystemClock};
pub use closure::{
    ClosureIndex, StationClosure, StationClosureRequest, TrackClosure, TrackClosureRequest,
};
pub use crate::config::AppConfig;
pub use error::{ConflictReason, RailError, RailResult, RecordKind, StoreError};
pub use metrics::{compute_metrics, Metrics};
pub use models::{Booking, BookingStatus, Station, Track, Train};
pub use railway::{Railway, RoutePlan};
pub use store::{JsonFileStore, MemoryStore, RecordStore, Snapshot};
