//! Test fixtures for dispatch-planner.
//!
//! Provides:
//! - Real Bangkok locations
//! - A scripted routing provider that counts calls and never touches the network
//! - A settable clock and stores that fail on demand
//! - A harness wiring the planners to an in-memory store

#![allow(dead_code)]

pub mod bangkok_locations;

pub use bangkok_locations::*;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use dispatch_planner::cache::{CacheEntry, CacheKey, TravelCache};
use dispatch_planner::config::DispatchDefaults;
use dispatch_planner::engine::InsertionAssignmentEngine;
use dispatch_planner::enrich::RouteEnricher;
use dispatch_planner::error::{ProviderError, StoreError};
use dispatch_planner::haversine::haversine_meters;
use dispatch_planner::memory::MemoryStore;
use dispatch_planner::model::{Agent, Job, LatLng};
use dispatch_planner::polyline::Polyline;
use dispatch_planner::record::{LegTravel, PlanBatch, RouteFilter, StopRecord};
use dispatch_planner::resolver::TravelCostResolver;
use dispatch_planner::scheduler::ChunkScheduler;
use dispatch_planner::traits::{
    Clock, DispatchStore, ProviderLeg, RouteRequest, RoutingProvider, TravelCacheStore,
};
use dispatch_planner::DispatchService;

/// 2025-03-04 09:00 in Bangkok.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 4, 2, 0, 0).unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn agent(id: &str, depot: &Location) -> Agent {
    Agent::new(id, depot.latlng())
}

pub fn job(id: &str, location: &Location) -> Job {
    Job::new(id, location.latlng())
}

// ============================================================================
// Routing provider
// ============================================================================

/// Routes every request as a straight line driven at a fixed speed.
pub struct ScriptedProvider {
    meters_per_second: f64,
    failing: AtomicBool,
    delay: Option<std::time::Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    requests: Mutex<Vec<RouteRequest>>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self {
            meters_per_second: 10.0,
            failing: AtomicBool::new(false),
            delay: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let provider = Self::default();
        provider.set_failing(true);
        provider
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RouteRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Duration this provider reports between two points.
    pub fn seconds_between(&self, from: LatLng, to: LatLng) -> i64 {
        (haversine_meters(from, to) / self.meters_per_second).round() as i64
    }

    pub fn geometry(from: LatLng, to: LatLng) -> String {
        Polyline::new(vec![from.coords(), to.coords()]).encode()
    }
}

#[async_trait]
impl RoutingProvider for ScriptedProvider {
    async fn route(&self, request: &RouteRequest) -> Result<ProviderLeg, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let active = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Status {
                status: "OVER_QUERY_LIMIT".to_string(),
                message: "scripted failure".to_string(),
            });
        }

        let meters = haversine_meters(request.origin, request.destination);
        Ok(ProviderLeg {
            distance_meters: meters.round() as i64,
            duration_seconds: self.seconds_between(request.origin, request.destination),
            polyline: Some(Self::geometry(request.origin, request.destination)),
        })
    }
}

// ============================================================================
// Clock
// ============================================================================

pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

// ============================================================================
// Stores that fail on demand
// ============================================================================

/// Delegates to a [`MemoryStore`] but fails selected writes and reads.
pub struct FaultyStore {
    pub inner: Arc<MemoryStore>,
    fail_plan_for_agent: Option<String>,
    fail_route: Option<String>,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_plan_for_agent: None,
            fail_route: None,
        }
    }

    /// Reject any plan that contains a route for `agent_id`.
    pub fn failing_plan_for(mut self, agent_id: &str) -> Self {
        self.fail_plan_for_agent = Some(agent_id.to_string());
        self
    }

    /// Reject reads of the stops of `route_id`.
    pub fn failing_route(mut self, route_id: &str) -> Self {
        self.fail_route = Some(route_id.to_string());
        self
    }
}

#[async_trait]
impl DispatchStore for FaultyStore {
    async fn get_agents(&self, ids: &[String]) -> Result<Vec<Agent>, StoreError> {
        self.inner.get_agents(ids).await
    }

    async fn get_jobs(&self, ids: &[String]) -> Result<Vec<Job>, StoreError> {
        self.inner.get_jobs(ids).await
    }

    async fn pending_jobs(&self, company_id: Option<&str>) -> Result<Vec<Job>, StoreError> {
        self.inner.pending_jobs(company_id).await
    }

    async fn write_plan(&self, batch: PlanBatch) -> Result<(), StoreError> {
        if let Some(agent_id) = &self.fail_plan_for_agent {
            if batch.routes.iter().any(|r| &r.agent_id == agent_id) {
                return Err(StoreError::Unavailable(format!("plan for {agent_id} rejected")));
            }
        }
        self.inner.write_plan(batch).await
    }

    async fn route_stops(&self, route_id: &str) -> Result<Vec<StopRecord>, StoreError> {
        if self.fail_route.as_deref() == Some(route_id) {
            return Err(StoreError::Unavailable(format!("route {route_id} unreadable")));
        }
        self.inner.route_stops(route_id).await
    }

    async fn write_stop_travel(
        &self,
        route_id: &str,
        stop_id: &str,
        travel: LegTravel,
    ) -> Result<(), StoreError> {
        self.inner.write_stop_travel(route_id, stop_id, travel).await
    }

    async fn touch_route(&self, route_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.touch_route(route_id, at).await
    }

    async fn find_routes(&self, filter: &RouteFilter) -> Result<Vec<String>, StoreError> {
        self.inner.find_routes(filter).await
    }
}

/// A cache backend that is always down.
pub struct UnavailableCache;

#[async_trait]
impl TravelCacheStore for UnavailableCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<CacheEntry>, StoreError> {
        Err(StoreError::Unavailable("cache offline".to_string()))
    }

    async fn merge(&self, _key: &CacheKey, _entry: CacheEntry) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("cache offline".to_string()))
    }
}

// ============================================================================
// Harness
// ============================================================================

/// In-memory store, scripted provider and fixed clock wired together.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub provider: Arc<ScriptedProvider>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_provider(ScriptedProvider::new())
    }

    pub fn with_provider(provider: ScriptedProvider) -> Self {
        init_tracing();
        Self {
            store: Arc::new(MemoryStore::new()),
            provider: Arc::new(provider),
            clock: Arc::new(FixedClock::at(base_time())),
        }
    }

    pub fn dispatch_store(&self) -> Arc<dyn DispatchStore> {
        self.store.clone()
    }

    pub fn resolver(&self) -> TravelCostResolver {
        TravelCostResolver::new(
            TravelCache::new(self.store.clone()),
            self.provider.clone(),
            self.clock.clone(),
        )
    }

    pub fn engine(&self) -> InsertionAssignmentEngine {
        self.engine_over(self.dispatch_store())
    }

    pub fn engine_over(&self, store: Arc<dyn DispatchStore>) -> InsertionAssignmentEngine {
        InsertionAssignmentEngine::new(self.resolver(), store)
    }

    pub fn scheduler(&self) -> ChunkScheduler {
        ChunkScheduler::new(self.engine(), self.dispatch_store())
    }

    pub fn enricher(&self) -> RouteEnricher {
        RouteEnricher::new(self.dispatch_store(), self.provider.clone(), self.clock.clone())
    }

    pub fn service(&self) -> DispatchService {
        DispatchService::new(
            self.store.clone(),
            self.store.clone(),
            self.provider.clone(),
            self.clock.clone(),
            DispatchDefaults::default(),
        )
    }

    pub fn add_agents(&self, agents: impl IntoIterator<Item = Agent>) {
        for agent in agents {
            self.store.insert_agent(agent).unwrap();
        }
    }

    pub fn add_jobs(&self, jobs: impl IntoIterator<Item = Job>) {
        for job in jobs {
            self.store.insert_job(job).unwrap();
        }
    }

    /// Agent id owning the route that contains `job_id`, if any.
    pub fn agent_of(&self, job_id: &str) -> Option<String> {
        self.store
            .assignments()
            .into_iter()
            .find(|a| a.job_id == job_id)
            .map(|a| a.agent_id)
    }
}
