//! Domain model for dispatch planning.
//!
//! Agents and jobs are read-only inputs loaded from the document store. The
//! only field the planner ever changes on a job is its status, and it does so
//! through a [`crate::record::JobStatusUpdate`], never by mutating these types.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and inside the latitude/longitude ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

/// A period in which a job should be serviced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

/// Single-window shape found on older job documents. Either bound may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// A mobile worker (messenger) that carries out jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    #[serde(default)]
    pub start_location: Option<LatLng>,
    #[serde(default)]
    pub return_to_base: bool,
    #[serde(default)]
    pub shift: Option<Shift>,
}

impl Agent {
    pub fn new(id: impl Into<String>, start: LatLng) -> Self {
        Self {
            id: id.into(),
            start_location: Some(start),
            return_to_base: false,
            shift: None,
        }
    }

    /// The start location, if it is usable for routing.
    pub fn depot(&self) -> Option<LatLng> {
        self.start_location.filter(LatLng::is_valid)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Assigned,
    InProgress,
    Completed,
}

/// A delivery or pickup task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub location: Option<LatLng>,
    /// Higher values are more urgent. Absent counts as zero.
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub service_seconds: Option<i64>,
    #[serde(default)]
    pub time_windows: Vec<TimeWindow>,
    #[serde(default)]
    pub time_window: Option<SingleWindow>,
    /// Free-form list of preferred agent ids, e.g. `"m1, m2"`.
    #[serde(default)]
    pub affinity_hint: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
}

impl Job {
    pub fn new(id: impl Into<String>, location: LatLng) -> Self {
        Self {
            id: id.into(),
            location: Some(location),
            priority: None,
            service_seconds: None,
            time_windows: Vec::new(),
            time_window: None,
            affinity_hint: None,
            status: JobStatus::Pending,
            assigned_to: None,
            company_id: None,
        }
    }

    pub fn valid_location(&self) -> Option<LatLng> {
        self.location.filter(LatLng::is_valid)
    }

    pub fn priority_rank(&self) -> i64 {
        self.priority.unwrap_or(0)
    }

    /// Service duration, falling back to `default` when absent or negative.
    pub fn service_seconds_or(&self, default: i64) -> i64 {
        match self.service_seconds {
            Some(secs) if secs >= 0 => secs,
            _ => default,
        }
    }

    pub fn earliest_window_start(&self) -> Option<DateTime<Utc>> {
        self.time_windows.iter().map(|w| w.start).min()
    }

    pub fn earliest_window_end(&self) -> Option<DateTime<Utc>> {
        self.time_windows.iter().map(|w| w.end).min()
    }

    pub fn affinity(&self) -> AffinityHint {
        AffinityHint::parse(self.affinity_hint.as_deref().unwrap_or_default())
    }

    /// Sorts windows by start. If the job only carries the single-window shape,
    /// it becomes the window list, with missing bounds pinned to the edges of
    /// `service_date`.
    pub fn normalize_windows(&mut self, service_date: NaiveDate) {
        if self.time_windows.is_empty() {
            if let Some(single) = self.time_window {
                if single.start.is_some() || single.end.is_some() {
                    let day_start = service_date.and_time(NaiveTime::MIN).and_utc();
                    let start = single.start.unwrap_or(day_start);
                    let end = single.end.unwrap_or(day_start + Duration::seconds(86_399));
                    self.time_windows.push(TimeWindow::new(start, end));
                }
            }
        }
        self.time_windows.sort_by_key(|w| w.start);
    }

    /// True when the job has windows and all of them ended more than `grace`
    /// before `now`. Jobs without windows never expire.
    pub fn fully_expired(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        match self.time_windows.iter().map(|w| w.end).max() {
            Some(latest) => latest < now - grace,
            None => false,
        }
    }
}

/// Order in which the insertion engine considers jobs: most urgent first,
/// then earliest window start, jobs without windows last.
pub fn dispatch_order(a: &Job, b: &Job) -> Ordering {
    b.priority_rank()
        .cmp(&a.priority_rank())
        .then_with(|| cmp_optional_time(a.earliest_window_start(), b.earliest_window_start()))
}

/// Order used by the legacy planner: most urgent first, then earliest window end.
pub fn legacy_order(a: &Job, b: &Job) -> Ordering {
    b.priority_rank()
        .cmp(&a.priority_rank())
        .then_with(|| cmp_optional_time(a.earliest_window_end(), b.earliest_window_end()))
}

fn cmp_optional_time(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Trimmed, non-empty ids with duplicates removed, first occurrence kept.
pub fn distinct_ids(ids: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Normalised set of agent ids a job prefers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AffinityHint(BTreeSet<String>);

impl AffinityHint {
    /// Splits on commas and whitespace, dropping empty tokens.
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn prefers(&self, agent_id: &str) -> bool {
        self.0.contains(agent_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How a travel quote was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    CacheHit,
    ShortHop,
    Provider,
    FallbackEstimate,
}

impl Provenance {
    /// Short hops are accounted as hits even though no cache was read.
    pub fn counts_as_hit(self) -> bool {
        matches!(self, Provenance::CacheHit | Provenance::ShortHop)
    }
}

/// Cost of travelling between two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelQuote {
    pub distance_meters: i64,
    pub duration_seconds: i64,
    /// Encoded polyline geometry, see [`crate::polyline`].
    pub polyline: Option<String>,
    pub provenance: Provenance,
}

/// Travel seconds plus whether the value came without a provider round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TravelSeconds {
    pub seconds: i64,
    pub was_cached: bool,
}
