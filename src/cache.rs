//! Travel quote cache.
//!
//! Entries are keyed by origin and destination rounded to six decimals plus a
//! 15-minute departure bucket. Entries older than the TTL read as absent but
//! are left in place; the next provider result overwrites them.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{LatLng, Provenance, TravelQuote};
use crate::traits::TravelCacheStore;

/// Width of a departure-time bucket.
pub const BUCKET_WIDTH_SECONDS: i64 = 15 * 60;

/// Age after which a cache entry is ignored.
pub const DEFAULT_TTL_SECONDS: i64 = 24 * 3600;

const MICRO_DEGREES: f64 = 1e6;

/// Cache identity of a (origin, destination, departure bucket) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    from: (i64, i64),
    to: (i64, i64),
    bucket: i64,
}

impl CacheKey {
    pub fn new(from: LatLng, to: LatLng, reference: DateTime<Utc>) -> Self {
        Self {
            from: (micro(from.lat), micro(from.lng)),
            to: (micro(to.lat), micro(to.lng)),
            bucket: time_bucket(reference),
        }
    }

    pub fn bucket(&self) -> i64 {
        self.bucket
    }

    pub fn from(&self) -> LatLng {
        degrees(self.from)
    }

    pub fn to(&self) -> LatLng {
        degrees(self.to)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let from = self.from();
        let to = self.to();
        write!(
            f,
            "{:.6},{:.6}|{:.6},{:.6}|{}",
            from.lat, from.lng, to.lat, to.lng, self.bucket
        )
    }
}

fn micro(value: f64) -> i64 {
    (value * MICRO_DEGREES).round() as i64
}

fn degrees((lat, lng): (i64, i64)) -> LatLng {
    LatLng::new(lat as f64 / MICRO_DEGREES, lng as f64 / MICRO_DEGREES)
}

/// Index of the 15-minute bucket containing `reference`.
pub fn time_bucket(reference: DateTime<Utc>) -> i64 {
    reference
        .timestamp_millis()
        .div_euclid(BUCKET_WIDTH_SECONDS * 1000)
}

/// Stored form of a cached quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub from: LatLng,
    pub to: LatLng,
    pub bucket: i64,
    pub distance_meters: i64,
    pub duration_seconds: i64,
    pub polyline: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.updated_at <= ttl
    }
}

/// TTL-aware view over a [`TravelCacheStore`].
///
/// Store failures are logged and read as misses; the cache never fails its
/// caller.
#[derive(Clone)]
pub struct TravelCache {
    store: Arc<dyn TravelCacheStore>,
    ttl: Duration,
}

impl TravelCache {
    pub fn new(store: Arc<dyn TravelCacheStore>) -> Self {
        Self {
            store,
            ttl: Duration::seconds(DEFAULT_TTL_SECONDS),
        }
    }

    /// A fresh cached quote for `key`, tagged as a cache hit.
    pub async fn lookup(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<TravelQuote> {
        let entry = match self.store.get(key).await {
            Ok(entry) => entry?,
            Err(err) => {
                warn!(%key, error = %err, "travel cache read failed");
                return None;
            }
        };
        if !entry.is_fresh(now, self.ttl) {
            return None;
        }
        Some(TravelQuote {
            distance_meters: entry.distance_meters,
            duration_seconds: entry.duration_seconds,
            polyline: entry.polyline,
            provenance: Provenance::CacheHit,
        })
    }

    /// Merge-write `quote` under `key`.
    pub async fn store(&self, key: &CacheKey, quote: &TravelQuote, now: DateTime<Utc>) {
        let entry = CacheEntry {
            from: key.from(),
            to: key.to(),
            bucket: key.bucket(),
            distance_meters: quote.distance_meters,
            duration_seconds: quote.duration_seconds,
            polyline: quote.polyline.clone(),
            updated_at: now,
        };
        if let Err(err) = self.store.merge(key, entry).await {
            warn!(%key, error = %err, "travel cache write failed");
        }
    }
}
