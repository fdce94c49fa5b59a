//! Time-windowed station and track closures.

/// Active-closure index consulted during admission.
pub mod index;
/// Closure records and creation requests.
pub mod record;
/// The active-window predicate and lazy pruning.
pub mod window;

pub use index::ClosureIndex;
pub use record::{
    Closure, ClosureTarget, StationClosure, StationClosureRequest, StationTarget, TrackClosure,
    TrackClosureRequest, TrackTarget,
};
pub use window::{is_active, prune, window_end, Windowed};
