//! Entry points taking caller requests.
//!
//! [`DispatchService`] wires the planners to one store, cache, routing
//! provider and clock, and turns raw requests into clamped configurations.

use std::sync::Arc;

use crate::cache::TravelCache;
use crate::config::{
    DispatchDefaults, EnrichAllRoutesRequest, EnrichRouteRequest, LegacyOptimizeRequest,
    OptimizeRequest,
};
use crate::engine::InsertionAssignmentEngine;
use crate::enrich::{EnrichAllOutcome, EnrichOutcome, RouteEnricher};
use crate::error::Result;
use crate::legacy::{LegacyOptimizer, LegacyOutcome};
use crate::resolver::TravelCostResolver;
use crate::scheduler::{ChunkScheduler, OptimizeOutcome};
use crate::traits::{Clock, DispatchStore, RoutingProvider, TravelCacheStore};

#[derive(Clone)]
pub struct DispatchService {
    scheduler: ChunkScheduler,
    enricher: RouteEnricher,
    legacy: LegacyOptimizer,
    clock: Arc<dyn Clock>,
    defaults: DispatchDefaults,
}

impl DispatchService {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        cache_store: Arc<dyn TravelCacheStore>,
        provider: Arc<dyn RoutingProvider>,
        clock: Arc<dyn Clock>,
        defaults: DispatchDefaults,
    ) -> Self {
        let resolver = TravelCostResolver::new(
            TravelCache::new(cache_store),
            Arc::clone(&provider),
            Arc::clone(&clock),
        );
        let engine = InsertionAssignmentEngine::new(resolver.clone(), Arc::clone(&store));
        Self {
            scheduler: ChunkScheduler::new(engine, Arc::clone(&store)),
            enricher: RouteEnricher::new(Arc::clone(&store), provider, Arc::clone(&clock)),
            legacy: LegacyOptimizer::new(resolver, store),
            clock,
            defaults,
        }
    }

    pub fn defaults(&self) -> &DispatchDefaults {
        &self.defaults
    }

    /// Chunked best-insertion over the requested agents and jobs. The service
    /// date defaults to the clock's day.
    pub async fn optimize(&self, request: &OptimizeRequest) -> Result<OptimizeOutcome> {
        let mut config = request.resolve(&self.defaults);
        config
            .assignment
            .date
            .get_or_insert_with(|| self.clock.now().date_naive());
        self.scheduler
            .optimize(&request.agent_ids, &request.job_ids, &config)
            .await
    }

    pub async fn enrich_route(&self, request: &EnrichRouteRequest) -> Result<EnrichOutcome> {
        let config = request.resolve(&self.defaults);
        self.enricher.enrich(&request.route_id, &config).await
    }

    pub async fn enrich_all_routes(&self, request: &EnrichAllRoutesRequest) -> Result<EnrichAllOutcome> {
        let config = request.resolve(&self.defaults);
        self.enricher.enrich_all(&config).await
    }

    /// Whole-fleet planning of pending jobs. The date defaults to today (UTC).
    pub async fn optimize_legacy(&self, request: &LegacyOptimizeRequest) -> Result<LegacyOutcome> {
        let today = self.clock.now().date_naive();
        let config = request.resolve(&self.defaults, today);
        self.legacy.optimize(&request.agent_ids, &config).await
    }
}
