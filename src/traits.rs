//! Seams to the outside world.
//!
//! The planner owns none of its storage or routing: concrete deployments
//! implement these traits over their own document store, cache and routing
//! service. [`crate::memory::MemoryStore`] implements both stores in memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::cache::{CacheEntry, CacheKey};
use crate::error::{ProviderError, StoreError};
use crate::model::{Agent, Job, LatLng};
use crate::record::{LegTravel, PlanBatch, RouteFilter, StopRecord};

/// Document store holding agents, jobs, routes, stops and assignments.
#[async_trait]
pub trait DispatchStore: Send + Sync {
    /// Batch get. Missing ids are omitted; order follows `ids`.
    async fn get_agents(&self, ids: &[String]) -> Result<Vec<Agent>, StoreError>;

    /// Batch get. Missing ids are omitted; order follows `ids`.
    async fn get_jobs(&self, ids: &[String]) -> Result<Vec<Job>, StoreError>;

    /// Jobs whose status is pending, optionally restricted to one company.
    async fn pending_jobs(&self, company_id: Option<&str>) -> Result<Vec<Job>, StoreError>;

    /// Commit a planning pass (routes, stops, assignments, job status flips)
    /// with merge semantics.
    async fn write_plan(&self, batch: PlanBatch) -> Result<(), StoreError>;

    /// Stops of a route ordered by position ascending.
    async fn route_stops(&self, route_id: &str) -> Result<Vec<StopRecord>, StoreError>;

    /// Merge `travel` onto a stop.
    async fn write_stop_travel(
        &self,
        route_id: &str,
        stop_id: &str,
        travel: LegTravel,
    ) -> Result<(), StoreError>;

    /// Refresh the route's last-updated marker.
    async fn touch_route(&self, route_id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Route ids matching `filter`, ordered by last update ascending.
    async fn find_routes(&self, filter: &RouteFilter) -> Result<Vec<String>, StoreError>;
}

/// Keyed store behind [`crate::cache::TravelCache`].
#[async_trait]
pub trait TravelCacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StoreError>;

    /// Merge-write; writing the same entry twice leaves one entry.
    async fn merge(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelMode {
    Driving,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub origin: LatLng,
    pub destination: LatLng,
    pub mode: TravelMode,
    /// Departure time for traffic-aware providers.
    pub departure: Option<DateTime<Utc>>,
}

impl RouteRequest {
    pub fn driving(origin: LatLng, destination: LatLng) -> Self {
        Self {
            origin,
            destination,
            mode: TravelMode::Driving,
            departure: None,
        }
    }

    pub fn departing_at(mut self, departure: DateTime<Utc>) -> Self {
        self.departure = Some(departure);
        self
    }
}

/// A single routed leg as returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderLeg {
    pub distance_meters: i64,
    pub duration_seconds: i64,
    pub polyline: Option<String>,
}

/// External routing service.
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    async fn route(&self, request: &RouteRequest) -> Result<ProviderLeg, ProviderError>;
}

/// Source of "now", replaceable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
