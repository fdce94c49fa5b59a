//! Route admission against the track graph and active closures.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{closure::ClosureIndex, models::Track};

/// Knobs of the admission decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionPolicy {
    /// Also reject routes whose final station is closed.
    pub check_terminal_station: bool,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            check_terminal_station: true,
        }
    }
}

/// The first reason a route cannot be run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteRejection {
    /// A station on the route is closed.
    #[error("Station {0} is temporarily closed")]
    StationClosed(String),
    /// Two consecutive stations are not joined by a usable track.
    #[error("No direct track between {origin} and {destination}")]
    NoDirectTrack {
        /// Station the hop leaves from.
        origin: String,
        /// Station the hop arrives at.
        destination: String,
    },
    /// The track between two consecutive stations is closed in that direction.
    #[error("Track between {origin} and {destination} is temporarily closed")]
    TrackClosed {
        /// Station the hop leaves from.
        origin: String,
        /// Station the hop arrives at.
        destination: String,
    },
}

/// Check every hop of `route` in order and return the tracks it would use.
///
/// For each consecutive pair the departing station must be open, a track
/// record must connect the pair (directly, or in reverse when the record is
/// bidirectional), and that direction must not be closed. The first failing
/// hop decides the rejection. With
/// [`AdmissionPolicy::check_terminal_station`] the final station must be open
/// as well.
pub fn admit<'t>(
    route: &[String],
    tracks: &'t [Track],
    closures: &ClosureIndex,
    policy: AdmissionPolicy,
) -> Result<Vec<&'t Track>, RouteRejection> {
    let mut legs = Vec::with_capacity(route.len().saturating_sub(1));

    for hop in route.windows(2) {
        let (src, dst) = (hop[0].as_str(), hop[1].as_str());

        if closures.is_station_closed(src) {
            return Err(RouteRejection::StationClosed(src.to_string()));
        }

        let track = tracks
            .iter()
            .find(|track| track.connects(src, dst))
            .ok_or_else(|| RouteRejection::NoDirectTrack {
                origin: src.to_string(),
                destination: dst.to_string(),
            })?;

        if closures.is_track_closed(src, dst) {
            return Err(RouteRejection::TrackClosed {
                origin: src.to_string(),
                destination: dst.to_string(),
            });
        }

        legs.push(track);
    }

    if policy.check_terminal_station {
        if let Some(last) = route.last() {
            if closures.is_station_closed(last) {
                return Err(RouteRejection::StationClosed(last.clone()));
            }
        }
    }

    debug!(hops = legs.len(), "route admitted");
    Ok(legs)
}
