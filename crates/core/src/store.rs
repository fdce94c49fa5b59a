//! Whole-snapshot persistence of the railway dataset.

use std::{
    ffi::OsString,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::{
    closure::{prune, StationClosure, TrackClosure},
    error::{RailError, RailResult, StoreError},
    models::{Booking, Station, Track, Train},
};

/// Location under the user's data directory used for the dataset.
pub const DEFAULT_DATA_FILE: &str = "railnet/railways.json";

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Every persisted collection of the rail network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Station nodes.
    #[serde(default)]
    pub stations: Vec<Station>,
    /// Directed track edges.
    #[serde(default)]
    pub tracks: Vec<Track>,
    /// Admitted trains.
    #[serde(default)]
    pub trains: Vec<Train>,
    /// Passenger bookings.
    #[serde(default)]
    pub bookings: Vec<Booking>,
    /// Station closures, possibly including expired ones not yet pruned.
    #[serde(default)]
    pub station_closures: Vec<StationClosure>,
    /// Track closures, possibly including expired ones not yet pruned.
    #[serde(default)]
    pub track_closures: Vec<TrackClosure>,
}

impl Snapshot {
    /// Drop closures that are no longer active at `now`.
    ///
    /// Returns `true` when anything was removed and the snapshot should be
    /// written back.
    pub fn prune_closures(&mut self, now: DateTime<Utc>) -> bool {
        let (stations, stations_changed) = prune(std::mem::take(&mut self.station_closures), now);
        let (tracks, tracks_changed) = prune(std::mem::take(&mut self.track_closures), now);
        self.station_closures = stations;
        self.track_closures = tracks;

        if stations_changed || tracks_changed {
            info!(
                station_closures = self.station_closures.len(),
                track_closures = self.track_closures.len(),
                "pruned expired closures"
            );
        }
        stations_changed || tracks_changed
    }

    /// Look up a station by id.
    pub fn station(&self, id: &str) -> Option<&Station> {
        self.stations.iter().find(|station| station.id == id)
    }

    /// Look up a train by id.
    pub fn train(&self, id: &str) -> Option<&Train> {
        self.trains.iter().find(|train| train.id == id)
    }

    /// Look up a booking by id.
    pub fn booking(&self, id: &str) -> Option<&Booking> {
        self.bookings.iter().find(|booking| booking.booking_id == id)
    }
}

/// Persistent home of the dataset. Reads and writes are whole-snapshot.
pub trait RecordStore: Send + Sync {
    /// Read the full dataset; an absent store yields an empty snapshot.
    fn load(&self) -> Result<Snapshot, StoreError>;

    /// Replace the full dataset.
    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Run `op` while holding the store-wide exclusive lock.
    ///
    /// Other holders, including other processes, are waited on for at most
    /// `timeout`; after that the call fails with [`RailError::Busy`].
    fn exclusive<R>(&self, timeout: Duration, op: impl FnOnce() -> R) -> RailResult<R>;
}

/// Dataset stored as a single pretty-printed JSON document.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location under the user's data directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DATA_FILE)
    }

    /// File backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sidecar file that carries the advisory write lock.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".lock");
        PathBuf::from(name)
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl RecordStore for JsonFileStore {
    fn load(&self) -> Result<Snapshot, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Snapshot::default()),
            Err(err) => return Err(self.io_error(err)),
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let parent = self.parent_dir();
        fs::create_dir_all(&parent).map_err(|err| self.io_error(err))?;

        let serialised = serde_json::to_vec_pretty(snapshot).map_err(StoreError::Serialize)?;

        // Write beside the target and rename so readers never see a torn file.
        let mut staged = NamedTempFile::new_in(&parent).map_err(|err| self.io_error(err))?;
        staged
            .write_all(&serialised)
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|err| self.io_error(err))?;
        staged
            .persist(&self.path)
            .map_err(|err| self.io_error(err.error))?;

        debug!(path = %self.path.display(), bytes = serialised.len(), "dataset saved");
        Ok(())
    }

    fn exclusive<R>(&self, timeout: Duration, op: impl FnOnce() -> R) -> RailResult<R> {
        let lock_path = self.lock_path();
        let lock_error = |source| StoreError::Io {
            path: lock_path.clone(),
            source,
        };
        fs::create_dir_all(self.parent_dir()).map_err(|err| self.io_error(err))?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(lock_error)?;

        let mut lock = fd_lock::RwLock::new(file);
        let deadline = Instant::now() + timeout;
        loop {
            match lock.try_write() {
                Ok(_guard) => return Ok(op()),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => return Err(lock_error(err).into()),
            }
            if Instant::now() >= deadline {
                debug!(path = %lock_path.display(), "dataset lock still held elsewhere");
                return Err(RailError::Busy);
            }
            thread::sleep(LOCK_POLL_INTERVAL);
        }
    }
}

/// Dataset kept in memory, for tests and embedding.
#[derive(Default)]
pub struct MemoryStore {
    snapshot: RwLock<Snapshot>,
    saves: AtomicUsize,
}

impl MemoryStore {
    /// Create a store seeded with `snapshot`.
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Copy of the currently stored snapshot.
    pub fn stored(&self) -> Snapshot {
        self.snapshot.read().clone()
    }
}

impl RecordStore for MemoryStore {
    fn load(&self) -> Result<Snapshot, StoreError> {
        Ok(self.snapshot.read().clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        *self.snapshot.write() = snapshot.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    // Only one process sees this store, and `Railway` already serialises
    // its own writers.
    fn exclusive<R>(&self, _timeout: Duration, op: impl FnOnce() -> R) -> RailResult<R> {
        Ok(op())
    }
}
