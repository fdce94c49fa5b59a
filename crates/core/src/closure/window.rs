use chrono::{DateTime, TimeDelta, Utc};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Anything with a closure-style validity window.
pub trait Windowed {
    /// Instant the window opens, if recorded.
    fn start_time(&self) -> Option<DateTime<Utc>>;
    /// Window length in hours.
    fn duration_hours(&self) -> f64;

    /// Whether the window contains `at`. Records without a start are never active.
    fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.start_time()
            .map(|start| is_active(start, self.duration_hours(), at))
            .unwrap_or(false)
    }
}

/// Whether `at` lies in `[start, start + duration_hours)`.
///
/// Durations are compared at millisecond precision. Non-positive and
/// non-finite durations describe an empty window.
pub fn is_active(start: DateTime<Utc>, duration_hours: f64, at: DateTime<Utc>) -> bool {
    at >= start && window_end(start, duration_hours).map_or(true, |end| at < end)
}

/// Exclusive end of the window opened at `start`.
///
/// `None` means the window never closes. Empty windows end where they start.
pub fn window_end(start: DateTime<Utc>, duration_hours: f64) -> Option<DateTime<Utc>> {
    match window_length(duration_hours) {
        WindowLength::Empty => Some(start),
        WindowLength::Unbounded => None,
        WindowLength::Bounded(length) => start.checked_add_signed(length),
    }
}

/// Split `records` into the ones still active at `now`.
///
/// Returns the survivors and whether anything was dropped. Records without a
/// start time count as expired.
pub fn prune<T: Windowed>(records: Vec<T>, now: DateTime<Utc>) -> (Vec<T>, bool) {
    let before = records.len();
    let survivors: Vec<T> = records
        .into_iter()
        .filter(|record| record.is_active_at(now))
        .collect();
    let changed = survivors.len() != before;
    (survivors, changed)
}

enum WindowLength {
    Empty,
    Bounded(TimeDelta),
    Unbounded,
}

fn window_length(duration_hours: f64) -> WindowLength {
    if duration_hours.is_nan() || duration_hours <= 0.0 {
        return WindowLength::Empty;
    }
    let millis = (duration_hours * MILLIS_PER_HOUR).round();
    if millis < 1.0 {
        return WindowLength::Empty;
    }
    if millis >= i64::MAX as f64 {
        return WindowLength::Unbounded;
    }
    TimeDelta::try_milliseconds(millis as i64)
        .map(WindowLength::Bounded)
        .unwrap_or(WindowLength::Unbounded)
}
