//! The railway service: record management, closures and train admission.
//!
//! Every mutation runs as one unit of work under the dataset's exclusive lock:
//! load the whole dataset, prune expired closures, validate, apply, and save
//! the whole dataset back. The lock is held both in-process and on the store,
//! so separate processes sharing one JSON file are serialised too. Reads are
//! served from the last committed snapshot and never wait for the lock.

use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    admission::{admit, AdmissionPolicy},
    clock::{Clock, SystemClock},
    closure::{
        Closure, ClosureIndex, ClosureTarget, StationClosure, StationClosureRequest, TrackClosure,
        TrackClosureRequest, Windowed,
    },
    config::AppConfig,
    error::{ConflictReason, RailError, RailResult, RecordKind},
    metrics::{compute_metrics, Metrics},
    models::{Booking, Station, Track, Train},
    store::{JsonFileStore, RecordStore, Snapshot},
};

/// Summary of an admissible route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePlan {
    /// Stations in travel order.
    pub route: Vec<String>,
    /// Track records used for each hop.
    pub legs: Vec<Track>,
    /// Sum of leg distances.
    pub total_distance: f64,
    /// Sum of leg weights.
    pub total_weight: f64,
}

/// Per-transaction facts handed to a mutation.
struct TxnContext {
    now: DateTime<Utc>,
    // Ids of closures pruned while loading this transaction.
    expired: HashSet<String>,
}

/// Serialised access to a rail network dataset.
pub struct Railway<S> {
    store: S,
    clock: Arc<dyn Clock>,
    policy: AdmissionPolicy,
    lock_timeout: Duration,
    write_lock: Mutex<()>,
    committed: RwLock<Arc<Snapshot>>,
}

impl Railway<JsonFileStore> {
    /// Open the JSON dataset named by `config` using wall-clock time.
    pub fn from_config(config: &AppConfig) -> RailResult<Self> {
        Self::new(
            JsonFileStore::new(&config.data_file),
            Arc::new(SystemClock),
            config.admission,
            config.lock_timeout(),
        )
    }
}

impl<S: RecordStore> Railway<S> {
    /// Wrap `store`, loading (and pruning) its current contents.
    pub fn new(
        store: S,
        clock: Arc<dyn Clock>,
        policy: AdmissionPolicy,
        lock_timeout: Duration,
    ) -> RailResult<Self> {
        let railway = Self {
            store,
            clock,
            policy,
            lock_timeout,
            write_lock: Mutex::new(()),
            committed: RwLock::new(Arc::new(Snapshot::default())),
        };
        railway.refresh()?;
        Ok(railway)
    }

    /// The underlying record store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The last committed snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.committed.read().clone()
    }

    /// Reload the committed snapshot from the store.
    ///
    /// Expired closures are pruned and the pruning persisted when no writer
    /// holds the dataset. Otherwise the stored data is published unpruned
    /// and readers filter expired closures themselves.
    pub fn refresh(&self) -> RailResult<Arc<Snapshot>> {
        let Some(_guard) = self.write_lock.try_lock() else {
            debug!("refresh skipped, mutation in progress");
            return Ok(self.snapshot());
        };
        match self.store.exclusive(Duration::ZERO, || self.reload(true)) {
            Err(RailError::Busy) => {
                debug!("dataset locked by another writer, reading without pruning");
                self.reload(false)
            }
            outcome => outcome?,
        }
    }

    fn reload(&self, persist_pruning: bool) -> RailResult<Arc<Snapshot>> {
        let mut snapshot = self.store.load()?;
        if persist_pruning && snapshot.prune_closures(self.clock.now()) {
            self.store.save(&snapshot)?;
        }
        Ok(self.publish(snapshot))
    }

    fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        *self.committed.write() = snapshot.clone();
        snapshot
    }

    fn transact<T>(
        &self,
        op: impl FnOnce(&mut Snapshot, &TxnContext) -> RailResult<T>,
    ) -> RailResult<T> {
        let started = Instant::now();
        let _guard = self
            .write_lock
            .try_lock_for(self.lock_timeout)
            .ok_or(RailError::Busy)?;
        let remaining = self.lock_timeout.saturating_sub(started.elapsed());
        self.store.exclusive(remaining, || self.commit(op))?
    }

    // Runs with both the in-process and the store lock held.
    fn commit<T>(
        &self,
        op: impl FnOnce(&mut Snapshot, &TxnContext) -> RailResult<T>,
    ) -> RailResult<T> {
        let now = self.clock.now();
        let mut loaded = self.store.load()?;
        let before = closure_ids(&loaded);
        let pruned = loaded.prune_closures(now);
        let ctx = TxnContext {
            now,
            expired: before.difference(&closure_ids(&loaded)).cloned().collect(),
        };

        let mut working = loaded.clone();
        match op(&mut working, &ctx) {
            Ok(value) => {
                self.store.save(&working)?;
                self.publish(working);
                debug!("mutation committed");
                Ok(value)
            }
            Err(err) => {
                if !pruned {
                    self.publish(loaded);
                } else if let Err(save_err) = self.store.save(&loaded) {
                    warn!("failed to persist pruned closures: {save_err}");
                } else {
                    self.publish(loaded);
                }
                Err(err)
            }
        }
    }

    /// All stations.
    pub fn stations(&self) -> Vec<Station> {
        self.snapshot().stations.clone()
    }

    /// All tracks.
    pub fn tracks(&self) -> Vec<Track> {
        self.snapshot().tracks.clone()
    }

    /// All trains.
    pub fn trains(&self) -> Vec<Train> {
        self.snapshot().trains.clone()
    }

    /// All bookings.
    pub fn bookings(&self) -> Vec<Booking> {
        self.snapshot().bookings.clone()
    }

    /// A single booking.
    pub fn booking(&self, booking_id: &str) -> RailResult<Booking> {
        self.snapshot()
            .booking(booking_id)
            .cloned()
            .ok_or_else(|| RailError::not_found(RecordKind::Booking, booking_id))
    }

    /// Station closures active right now.
    pub fn active_station_closures(&self) -> Vec<StationClosure> {
        active(&self.snapshot().station_closures, self.clock.now())
    }

    /// Track closures active right now.
    pub fn active_track_closures(&self) -> Vec<TrackClosure> {
        active(&self.snapshot().track_closures, self.clock.now())
    }

    /// Record counts of the committed snapshot.
    pub fn metrics(&self) -> Metrics {
        compute_metrics(&self.snapshot(), self.clock.now())
    }

    /// Evaluate a route against the current network without creating a train.
    pub fn check_route(&self, route: &[String]) -> RailResult<RoutePlan> {
        let snapshot = self.snapshot();
        plan_route(&snapshot, route, self.clock.now(), self.policy)
    }

    /// Register a new station.
    pub fn add_station(&self, station: Station) -> RailResult<Station> {
        station.validate()?;
        self.transact(|data, _| {
            if data.station(&station.id).is_some() {
                return Err(ConflictReason::DuplicateStation(station.id.clone()).into());
            }
            data.stations.push(station.clone());
            info!(station = %station.id, "station added");
            Ok(station)
        })
    }

    /// Remove a station that no track references.
    pub fn remove_station(&self, station_id: &str) -> RailResult<()> {
        self.transact(|data, _| {
            if data.station(station_id).is_none() {
                return Err(RailError::not_found(RecordKind::Station, station_id));
            }
            let tracks: Vec<String> = data
                .tracks
                .iter()
                .filter(|track| track.touches(station_id))
                .map(Track::label)
                .collect();
            if !tracks.is_empty() {
                return Err(ConflictReason::StationInUse {
                    station: station_id.to_string(),
                    tracks,
                }
                .into());
            }
            data.stations.retain(|station| station.id != station_id);
            info!(station = %station_id, "station removed");
            Ok(())
        })
    }

    /// Register a new track between existing stations.
    pub fn add_track(&self, track: Track) -> RailResult<Track> {
        track.validate()?;
        self.transact(|data, _| {
            for endpoint in [&track.source, &track.destination] {
                if data.station(endpoint).is_none() {
                    return Err(RailError::not_found(RecordKind::Station, endpoint.as_str()));
                }
            }
            if data
                .tracks
                .iter()
                .any(|existing| existing.is_keyed(&track.source, &track.destination))
            {
                return Err(ConflictReason::DuplicateTrack {
                    origin: track.source.clone(),
                    destination: track.destination.clone(),
                }
                .into());
            }
            data.tracks.push(track.clone());
            info!(track = %track.label(), "track added");
            Ok(track)
        })
    }

    /// Remove the track keyed `(source, destination)`.
    pub fn remove_track(&self, source: &str, destination: &str) -> RailResult<()> {
        self.transact(|data, _| {
            let before = data.tracks.len();
            data.tracks.retain(|track| !track.is_keyed(source, destination));
            if data.tracks.len() == before {
                return Err(RailError::not_found(
                    RecordKind::Track,
                    format!("{source}->{destination}"),
                ));
            }
            info!(track = %format!("{source}->{destination}"), "track removed");
            Ok(())
        })
    }

    /// Create a train if its whole route is admissible right now.
    pub fn add_train(&self, train: Train) -> RailResult<Train> {
        train.validate()?;
        self.transact(|data, ctx| {
            if data.train(&train.id).is_some() {
                return Err(ConflictReason::DuplicateTrain(train.id.clone()).into());
            }
            if let Err(err) = plan_route(data, &train.route, ctx.now, self.policy) {
                warn!(train = %train.id, "train rejected: {err}");
                return Err(err);
            }
            data.trains.push(train.clone());
            info!(train = %train.id, stops = train.route.len(), "train added");
            Ok(train)
        })
    }

    /// Replace a train record. Route stations must exist; closures are not
    /// consulted.
    pub fn update_train(&self, train_id: &str, train: Train) -> RailResult<Train> {
        train.validate()?;
        self.transact(|data, _| {
            let position = data
                .trains
                .iter()
                .position(|existing| existing.id == train_id)
                .ok_or_else(|| RailError::not_found(RecordKind::Train, train_id))?;
            if train.id != train_id && data.train(&train.id).is_some() {
                return Err(ConflictReason::DuplicateTrain(train.id.clone()).into());
            }
            if let Some(missing) = train.route.iter().find(|stop| data.station(stop).is_none()) {
                return Err(RailError::not_found(RecordKind::Station, missing.as_str()));
            }
            data.trains[position] = train.clone();
            info!(train = %train_id, "train updated");
            Ok(train)
        })
    }

    /// Delete a train, returning how many remain.
    pub fn remove_train(&self, train_id: &str) -> RailResult<usize> {
        self.transact(|data, _| {
            let before = data.trains.len();
            data.trains.retain(|train| train.id != train_id);
            if data.trains.len() == before {
                return Err(RailError::not_found(RecordKind::Train, train_id));
            }
            info!(train = %train_id, "train removed");
            Ok(data.trains.len())
        })
    }

    /// Close a station for `duration` hours starting now.
    pub fn add_station_closure(
        &self,
        request: StationClosureRequest,
    ) -> RailResult<StationClosure> {
        request.validate()?;
        self.transact(|data, ctx| {
            if data.station(&request.station_id).is_none() {
                return Err(RailError::not_found(
                    RecordKind::Station,
                    request.station_id.as_str(),
                ));
            }
            let id = Closure::next_id(&data.station_closures, ctx.now);
            let closure = request.clone().into_closure(id, ctx.now);
            data.station_closures.push(closure.clone());
            info!(
                closure = %closure.id,
                station = %closure.target.station_id,
                hours = closure.duration_hours,
                "station closed"
            );
            Ok(closure)
        })
    }

    /// Close a track direction (or both) for `duration` hours starting now.
    pub fn add_track_closure(&self, request: TrackClosureRequest) -> RailResult<TrackClosure> {
        request.validate()?;
        self.transact(|data, ctx| {
            if !data
                .tracks
                .iter()
                .any(|track| track.connects(&request.source, &request.destination))
            {
                return Err(RailError::not_found(
                    RecordKind::Track,
                    format!("{}->{}", request.source, request.destination),
                ));
            }
            let id = Closure::next_id(&data.track_closures, ctx.now);
            let closure = request.clone().into_closure(id, ctx.now);
            data.track_closures.push(closure.clone());
            info!(
                closure = %closure.id,
                source = %closure.target.source,
                destination = %closure.target.destination,
                bidirectional = closure.target.bidirectional,
                hours = closure.duration_hours,
                "track closed"
            );
            Ok(closure)
        })
    }

    /// Delete a station closure by id.
    pub fn remove_station_closure(&self, closure_id: &str) -> RailResult<()> {
        self.transact(|data, ctx| remove_closure(&mut data.station_closures, closure_id, ctx))
    }

    /// Delete a track closure by id.
    pub fn remove_track_closure(&self, closure_id: &str) -> RailResult<()> {
        self.transact(|data, ctx| remove_closure(&mut data.track_closures, closure_id, ctx))
    }

    /// Record a booking against an existing train.
    pub fn add_booking(&self, booking: Booking) -> RailResult<Booking> {
        booking.validate()?;
        self.transact(|data, _| {
            if data.train(&booking.train_id).is_none() {
                return Err(RailError::not_found(
                    RecordKind::Train,
                    booking.train_id.as_str(),
                ));
            }
            if data.booking(&booking.booking_id).is_some() {
                return Err(ConflictReason::DuplicateBooking(booking.booking_id.clone()).into());
            }
            data.bookings.push(booking.clone());
            info!(booking = %booking.booking_id, train = %booking.train_id, "booking added");
            Ok(booking)
        })
    }

    /// Delete a booking by id.
    pub fn cancel_booking(&self, booking_id: &str) -> RailResult<()> {
        self.transact(|data, _| {
            let before = data.bookings.len();
            data.bookings.retain(|booking| booking.booking_id != booking_id);
            if data.bookings.len() == before {
                return Err(RailError::not_found(RecordKind::Booking, booking_id));
            }
            info!(booking = %booking_id, "booking cancelled");
            Ok(())
        })
    }
}

fn plan_route(
    snapshot: &Snapshot,
    route: &[String],
    now: DateTime<Utc>,
    policy: AdmissionPolicy,
) -> RailResult<RoutePlan> {
    if route.is_empty() {
        return Err(RailError::validation("route must contain at least one station"));
    }
    if let [only] = route {
        if snapshot.station(only).is_none() {
            return Err(RailError::not_found(RecordKind::Station, only.as_str()));
        }
    }

    let closures = ClosureIndex::at(&snapshot.station_closures, &snapshot.track_closures, now);
    let legs: Vec<Track> = admit(route, &snapshot.tracks, &closures, policy)?
        .into_iter()
        .cloned()
        .collect();

    Ok(RoutePlan {
        route: route.to_vec(),
        total_distance: legs.iter().map(|leg| leg.distance).sum(),
        total_weight: legs.iter().map(|leg| leg.weight).sum(),
        legs,
    })
}

fn active<T: Clone>(closures: &[Closure<T>], now: DateTime<Utc>) -> Vec<Closure<T>> {
    closures
        .iter()
        .filter(|closure| closure.is_active_at(now))
        .cloned()
        .collect()
}

fn closure_ids(snapshot: &Snapshot) -> HashSet<String> {
    snapshot
        .station_closures
        .iter()
        .map(|closure| closure.id.clone())
        .chain(snapshot.track_closures.iter().map(|closure| closure.id.clone()))
        .collect()
}

fn remove_closure<T: ClosureTarget>(
    closures: &mut Vec<Closure<T>>,
    closure_id: &str,
    ctx: &TxnContext,
) -> RailResult<()> {
    let before = closures.len();
    closures.retain(|closure| closure.id != closure_id);
    if closures.len() < before {
        info!(closure = %closure_id, "closure removed");
        return Ok(());
    }
    // Already gone through expiry in this very transaction.
    if ctx.expired.contains(closure_id) {
        debug!(closure = %closure_id, "closure had already expired");
        return Ok(());
    }
    Err(RailError::not_found(T::KIND, closure_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        admission::RouteRejection,
        clock::ManualClock,
        error::StoreError,
        store::MemoryStore,
    };
    use chrono::{Duration as TimeDelta, NaiveDate, TimeZone};
    use serde_json::json;
    use std::{
        io,
        path::Path,
        sync::atomic::{AtomicBool, Ordering},
        thread,
    };
    use tempfile::tempdir;

    /// JSON store that dawdles between reading and the caller's write.
    struct SlowStore(JsonFileStore);

    impl RecordStore for SlowStore {
        fn load(&self) -> Result<Snapshot, StoreError> {
            let snapshot = self.0.load()?;
            thread::sleep(Duration::from_millis(150));
            Ok(snapshot)
        }

        fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
            self.0.save(snapshot)
        }

        fn exclusive<R>(&self, timeout: Duration, op: impl FnOnce() -> R) -> RailResult<R> {
            self.0.exclusive(timeout, op)
        }
    }

    /// Memory store whose saves can be made to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    impl RecordStore for FlakyStore {
        fn load(&self) -> Result<Snapshot, StoreError> {
            self.inner.load()
        }

        fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Io {
                    path: "flaky".into(),
                    source: io::Error::new(io::ErrorKind::Other, "disk full"),
                });
            }
            self.inner.save(snapshot)
        }

        fn exclusive<R>(&self, timeout: Duration, op: impl FnOnce() -> R) -> RailResult<R> {
            self.inner.exclusive(timeout, op)
        }
    }

    fn slow_railway(path: &Path, clock: Arc<ManualClock>) -> RailResult<Railway<SlowStore>> {
        Railway::new(
            SlowStore(JsonFileStore::new(path)),
            clock,
            AdmissionPolicy::default(),
            Duration::from_secs(10),
        )
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn station(id: &str) -> Station {
        Station {
            id: id.to_string(),
            name: format!("{id} Central"),
            latitude: 21.14,
            longitude: 79.08,
        }
    }

    fn train(id: &str, stops: &[&str]) -> Train {
        Train {
            id: id.to_string(),
            name: format!("{id} Express"),
            speed: 110.0,
            kind: "express".to_string(),
            route: stops.iter().map(|stop| stop.to_string()).collect(),
            timings: json!({"departure": "06:00"}),
        }
    }

    fn station_closure(id: &str, hours: f64) -> StationClosureRequest {
        StationClosureRequest {
            station_id: id.to_string(),
            reason: "platform works".to_string(),
            duration_hours: hours,
        }
    }

    fn track_closure(
        source: &str,
        destination: &str,
        hours: f64,
        bidirectional: bool,
    ) -> TrackClosureRequest {
        TrackClosureRequest {
            source: source.to_string(),
            destination: destination.to_string(),
            reason: "track renewal".to_string(),
            duration_hours: hours,
            bidirectional,
        }
    }

    fn seeded() -> Snapshot {
        Snapshot {
            stations: ["S1", "S2", "S3", "A", "C"].into_iter().map(station).collect(),
            tracks: vec![
                Track::new("S1", "S2", 120.0, 6).bidirectional(),
                Track::new("S2", "S3", 80.0, 4),
            ],
            ..Snapshot::default()
        }
    }

    fn railway_with(
        snapshot: Snapshot,
        policy: AdmissionPolicy,
    ) -> (Railway<MemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(noon()));
        let railway = Railway::new(
            MemoryStore::new(snapshot),
            clock.clone(),
            policy,
            Duration::from_millis(20),
        )
        .expect("memory store never fails");
        (railway, clock)
    }

    fn railway() -> (Railway<MemoryStore>, Arc<ManualClock>) {
        railway_with(seeded(), AdmissionPolicy::default())
    }

    #[test]
    fn closed_station_blocks_new_train() -> anyhow::Result<()> {
        let (railway, _) = railway();
        railway.add_station_closure(station_closure("S1", 1.0))?;

        let err = railway
            .add_train(train("T1", &["S1", "S2"]))
            .expect_err("route through a closed station");
        assert!(matches!(
            err,
            RailError::Conflict(ConflictReason::Route(RouteRejection::StationClosed(ref id)))
                if id == "S1"
        ));
        assert!(err.to_string().contains("S1"));
        assert!(railway.trains().is_empty());
        Ok(())
    }

    #[test]
    fn one_way_track_closure_admits_reverse_route() -> anyhow::Result<()> {
        let (railway, _) = railway();
        railway.add_track_closure(track_closure("S1", "S2", 2.0, false))?;

        railway.add_train(train("T1", &["S2", "S1"]))?;
        let err = railway
            .add_train(train("T2", &["S1", "S2"]))
            .expect_err("closed direction");
        assert!(matches!(
            err,
            RailError::Conflict(ConflictReason::Route(RouteRejection::TrackClosed { .. }))
        ));
        assert_eq!(railway.trains().len(), 1);
        Ok(())
    }

    #[test]
    fn expired_closure_is_pruned_and_persisted() -> anyhow::Result<()> {
        let (railway, clock) = railway();
        railway.add_station_closure(station_closure("S1", 1.0))?;
        assert_eq!(railway.active_station_closures().len(), 1);

        clock.advance(TimeDelta::minutes(61));
        assert!(railway.active_station_closures().is_empty());
        assert_eq!(railway.store().stored().station_closures.len(), 1);

        railway.refresh()?;
        assert!(railway.store().stored().station_closures.is_empty());
        railway.add_train(train("T1", &["S1", "S2"]))?;
        Ok(())
    }

    #[test]
    fn missing_track_is_rejected_regardless_of_closures() -> anyhow::Result<()> {
        let (railway, _) = railway();
        let err = railway
            .add_train(train("T1", &["A", "C"]))
            .expect_err("no edge between A and C");
        assert!(matches!(
            err,
            RailError::Conflict(ConflictReason::Route(RouteRejection::NoDirectTrack { .. }))
        ));
        assert_eq!(err.to_string(), "No direct track between A and C");
        Ok(())
    }

    #[test]
    fn rejected_route_leaves_dataset_untouched() -> anyhow::Result<()> {
        let (railway, _) = railway();
        railway.add_track_closure(track_closure("S2", "S3", 3.0, false))?;
        let saves = railway.store().save_count();
        let before = railway.store().stored();

        let err = railway
            .add_train(train("T1", &["S1", "S2", "S3"]))
            .expect_err("second hop is closed");
        assert!(matches!(
            err,
            RailError::Conflict(ConflictReason::Route(RouteRejection::TrackClosed {
                ref origin,
                ..
            })) if origin == "S2"
        ));
        assert_eq!(railway.store().save_count(), saves);
        assert_eq!(railway.store().stored(), before);
        Ok(())
    }

    #[test]
    fn later_closures_do_not_evict_existing_trains() -> anyhow::Result<()> {
        let (railway, _) = railway();
        railway.add_train(train("T1", &["S1", "S2", "S3"]))?;
        railway.add_station_closure(station_closure("S2", 4.0))?;
        railway.add_track_closure(track_closure("S1", "S2", 4.0, true))?;
        assert_eq!(railway.trains().len(), 1);
        assert!(railway.check_route(&train("T1", &["S1", "S2"]).route).is_err());
        Ok(())
    }

    #[test]
    fn terminal_station_policy_is_configurable() -> anyhow::Result<()> {
        let (strict, _) = railway();
        strict.add_station_closure(station_closure("S3", 1.0))?;
        assert!(strict.add_train(train("T1", &["S2", "S3"])).is_err());

        let (lenient, _) = railway_with(
            seeded(),
            AdmissionPolicy {
                check_terminal_station: false,
            },
        );
        lenient.add_station_closure(station_closure("S3", 1.0))?;
        lenient.add_train(train("T1", &["S2", "S3"]))?;
        Ok(())
    }

    #[test]
    fn check_route_reports_totals() -> anyhow::Result<()> {
        let (railway, _) = railway();
        let plan = railway.check_route(&train("T1", &["S1", "S2", "S3"]).route)?;
        assert_eq!(plan.legs.len(), 2);
        assert_eq!(plan.total_distance, 200.0);
        assert_eq!(plan.total_weight, 200.0);

        let missing = railway.check_route(&["ZZ".to_string()]);
        assert!(matches!(missing, Err(RailError::NotFound { .. })));
        Ok(())
    }

    #[test]
    fn duplicate_train_id_is_a_conflict() -> anyhow::Result<()> {
        let (railway, _) = railway();
        railway.add_train(train("T1", &["S1", "S2"]))?;
        let err = railway
            .add_train(train("T1", &["S2", "S3"]))
            .expect_err("duplicate id");
        assert!(matches!(
            err,
            RailError::Conflict(ConflictReason::DuplicateTrain(_))
        ));
        Ok(())
    }

    #[test]
    fn track_closure_requires_usable_track() -> anyhow::Result<()> {
        let (railway, _) = railway();
        // Reverse of a bidirectional record is fine.
        railway.add_track_closure(track_closure("S2", "S1", 1.0, false))?;
        // Reverse of a one-way record is not.
        let err = railway
            .add_track_closure(track_closure("S3", "S2", 1.0, false))
            .expect_err("no S3->S2 track");
        assert!(matches!(
            err,
            RailError::NotFound {
                kind: RecordKind::TrackClosure | RecordKind::Track,
                ..
            }
        ));
        let err = railway
            .add_station_closure(station_closure("NOPE", 1.0))
            .expect_err("unknown station");
        assert!(matches!(err, RailError::NotFound { kind: RecordKind::Station, .. }));
        Ok(())
    }

    #[test]
    fn closure_ids_are_unique_within_one_second() -> anyhow::Result<()> {
        let (railway, _) = railway();
        let first = railway.add_station_closure(station_closure("S1", 1.0))?;
        let second = railway.add_station_closure(station_closure("S2", 1.0))?;
        assert_ne!(first.id, second.id);
        assert!(first.id.starts_with("stclos_"));
        let track = railway.add_track_closure(track_closure("S1", "S2", 1.0, false))?;
        assert!(track.id.starts_with("trclos_"));
        Ok(())
    }

    #[test]
    fn removing_closures() -> anyhow::Result<()> {
        let (railway, clock) = railway();
        let closure = railway.add_station_closure(station_closure("S1", 1.0))?;
        railway.remove_station_closure(&closure.id)?;
        assert!(matches!(
            railway.remove_station_closure(&closure.id),
            Err(RailError::NotFound {
                kind: RecordKind::StationClosure,
                ..
            })
        ));

        // Expired but still stored: deletion succeeds.
        let stale = railway.add_track_closure(track_closure("S1", "S2", 1.0, false))?;
        clock.advance(TimeDelta::hours(2));
        assert_eq!(railway.store().stored().track_closures.len(), 1);
        railway.remove_track_closure(&stale.id)?;
        assert!(railway.store().stored().track_closures.is_empty());
        Ok(())
    }

    #[test]
    fn zero_duration_closure_is_never_active() -> anyhow::Result<()> {
        let (railway, _) = railway();
        railway.add_station_closure(station_closure("S1", 0.0))?;
        assert!(railway.active_station_closures().is_empty());
        railway.add_train(train("T1", &["S1", "S2"]))?;
        Ok(())
    }

    #[test]
    fn failed_request_still_persists_pruning() -> anyhow::Result<()> {
        let (railway, clock) = railway();
        railway.add_station_closure(station_closure("S1", 1.0))?;
        clock.advance(TimeDelta::hours(2));

        assert!(railway.add_station(station("S1")).is_err());
        assert!(railway.store().stored().station_closures.is_empty());
        Ok(())
    }

    #[test]
    fn contended_lock_reports_busy() {
        let (railway, _) = railway();
        let _held = railway.write_lock.lock();
        let err = railway
            .add_station(station("S9"))
            .expect_err("lock is held");
        assert!(matches!(err, RailError::Busy));
        assert!(err.is_retryable());
    }

    #[test]
    fn concurrent_writers_on_one_file_keep_both_updates() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("railways.json");
        let clock = Arc::new(ManualClock::new(noon()));
        let first = slow_railway(&path, clock.clone())?;
        let second = slow_railway(&path, clock)?;

        let (a, b) = thread::scope(|scope| {
            let a = scope.spawn(|| first.add_station(station("S1")));
            let b = scope.spawn(|| second.add_station(station("S2")));
            (a.join(), b.join())
        });
        assert!(matches!(a, Ok(Ok(_))));
        assert!(matches!(b, Ok(Ok(_))));

        let mut stored: Vec<String> = JsonFileStore::new(&path)
            .load()?
            .stations
            .into_iter()
            .map(|station| station.id)
            .collect();
        stored.sort();
        assert_eq!(stored, vec!["S1", "S2"]);
        Ok(())
    }

    #[test]
    fn writer_in_another_handle_makes_us_busy() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("railways.json");
        let railway = Railway::new(
            JsonFileStore::new(&path),
            Arc::new(ManualClock::new(noon())),
            AdmissionPolicy::default(),
            Duration::from_millis(40),
        )?;

        let outcome = JsonFileStore::new(&path).exclusive(Duration::ZERO, || {
            railway.add_station(station("S1"))
        })?;
        let err = outcome.expect_err("dataset locked by the other handle");
        assert!(matches!(err, RailError::Busy));
        assert!(railway.stations().is_empty());

        railway.add_station(station("S1"))?;
        assert_eq!(railway.stations().len(), 1);
        Ok(())
    }

    #[test]
    fn unsaved_pruning_is_not_published() -> anyhow::Result<()> {
        let clock = Arc::new(ManualClock::new(noon()));
        let store = FlakyStore {
            inner: MemoryStore::new(seeded()),
            ..FlakyStore::default()
        };
        let railway = Railway::new(
            store,
            clock.clone(),
            AdmissionPolicy::default(),
            Duration::from_millis(20),
        )?;
        railway.add_station_closure(station_closure("S1", 1.0))?;
        clock.advance(TimeDelta::hours(2));
        railway.store().failing.store(true, Ordering::SeqCst);

        assert!(railway.add_station(station("S1")).is_err());
        assert_eq!(railway.snapshot().station_closures.len(), 1);
        assert_eq!(railway.store().inner.stored().station_closures.len(), 1);
        Ok(())
    }

    #[test]
    fn station_lifecycle() -> anyhow::Result<()> {
        let (railway, _) = railway();
        let err = railway.add_station(station("S1")).expect_err("duplicate");
        assert!(matches!(
            err,
            RailError::Conflict(ConflictReason::DuplicateStation(_))
        ));

        let err = railway.remove_station("S2").expect_err("used by tracks");
        match err {
            RailError::Conflict(ConflictReason::StationInUse { tracks, .. }) => {
                assert_eq!(tracks, vec!["S1->S2".to_string(), "S2->S3".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }

        railway.remove_station("A")?;
        assert!(matches!(
            railway.remove_station("A"),
            Err(RailError::NotFound { .. })
        ));
        assert_eq!(railway.stations().len(), 4);
        Ok(())
    }

    #[test]
    fn track_lifecycle() -> anyhow::Result<()> {
        let (railway, _) = railway();
        let added = railway.add_track(Track::new("A", "C", 42.0, 2))?;
        assert_eq!(added.weight, 42.0);

        let err = railway
            .add_track(Track::new("A", "C", 10.0, 1))
            .expect_err("duplicate edge");
        assert!(matches!(
            err,
            RailError::Conflict(ConflictReason::DuplicateTrack { .. })
        ));
        // The reverse edge is a distinct record.
        railway.add_track(Track::new("C", "A", 42.0, 2))?;

        let err = railway
            .add_track(Track::new("A", "S3", 10.0, 0))
            .expect_err("zero capacity");
        assert!(matches!(err, RailError::Validation(_)));

        let err = railway
            .add_track(Track::new("A", "X", 10.0, 1))
            .expect_err("unknown endpoint");
        assert!(matches!(err, RailError::NotFound { kind: RecordKind::Station, .. }));

        railway.remove_track("A", "C")?;
        assert!(railway.remove_track("A", "C").is_err());
        assert_eq!(railway.tracks().len(), 3);
        Ok(())
    }

    #[test]
    fn train_update_and_removal() -> anyhow::Result<()> {
        let (railway, _) = railway();
        railway.add_train(train("T1", &["S1", "S2"]))?;
        railway.add_station_closure(station_closure("S3", 5.0))?;

        // Updates only check that stations exist.
        let updated = railway.update_train("T1", train("T1", &["S1", "S2", "S3"]))?;
        assert_eq!(updated.route.len(), 3);

        let err = railway
            .update_train("T1", train("T1", &["S1", "Nowhere"]))
            .expect_err("unknown station");
        assert!(matches!(err, RailError::NotFound { kind: RecordKind::Station, .. }));
        assert!(matches!(
            railway.update_train("T9", train("T9", &["S1"])),
            Err(RailError::NotFound { kind: RecordKind::Train, .. })
        ));

        assert_eq!(railway.remove_train("T1")?, 0);
        assert!(railway.remove_train("T1").is_err());
        Ok(())
    }

    #[test]
    fn bookings_reference_trains() -> anyhow::Result<()> {
        let (railway, _) = railway();
        let booking = Booking {
            booking_id: "PNR100".to_string(),
            train_id: "T1".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 10, 20).expect("valid date"),
            passenger_count: 2,
            fare: 640.0,
            status: Default::default(),
        };
        assert!(matches!(
            railway.add_booking(booking.clone()),
            Err(RailError::NotFound { kind: RecordKind::Train, .. })
        ));

        railway.add_train(train("T1", &["S1", "S2"]))?;
        railway.add_booking(booking.clone())?;
        assert!(railway.add_booking(booking.clone()).is_err());
        assert_eq!(railway.booking("PNR100")?, booking);
        assert_eq!(railway.metrics().total_bookings, 1);

        railway.cancel_booking("PNR100")?;
        assert!(railway.booking("PNR100").is_err());
        assert!(railway.cancel_booking("PNR100").is_err());
        Ok(())
    }

    #[test]
    fn json_dataset_survives_reopen() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let config = AppConfig {
            data_file: dir.path().join("data/railways.json"),
            ..AppConfig::default()
        };

        let railway = Railway::from_config(&config)?;
        railway.add_station(station("S1"))?;
        railway.add_station(station("S2"))?;
        railway.add_track(Track::new("S1", "S2", 10.0, 1))?;
        railway.add_train(train("T1", &["S1", "S2"]))?;
        railway.add_station_closure(station_closure("S2", 6.0))?;
        drop(railway);

        let reopened = Railway::from_config(&config)?;
        assert_eq!(reopened.trains().len(), 1);
        assert_eq!(reopened.active_station_closures().len(), 1);
        let metrics = reopened.metrics();
        assert_eq!(metrics.total_stations, 2);
        assert_eq!(metrics.total_station_closures, 1);
        Ok(())
    }
}
