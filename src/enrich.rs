//! Backfill of leg geometry on routes that already exist.
//!
//! Each leg runs from one stop to the next in position order; there is no
//! leg from the depot into the first stop. The travel is written onto the
//! destination stop.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{EnrichAllConfig, EnrichConfig, RouteSelection};
use crate::error::{DispatchError, Result};
use crate::haversine::{haversine_meters, CrowFlight};
use crate::model::{distinct_ids, LatLng};
use crate::pool::BoundedPool;
use crate::record::{LegTravel, StopRecord};
use crate::traits::{Clock, DispatchStore, RouteRequest, RoutingProvider};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichOutcome {
    pub updated_stops: usize,
    /// Legs that needed no provider call: already complete, or short hops.
    pub cache_hits: usize,
    /// Legs computed anew, by the provider or by the straight-line fallback.
    pub cache_misses: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichAllOutcome {
    /// Routes enriched successfully.
    pub routes_processed: usize,
    /// Routes selected for enrichment.
    pub routes_total: usize,
    pub updated_stops: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegOutcome {
    MissingEndpoint,
    AlreadyComplete,
    ShortHop,
    Routed,
    Fallback,
}

impl LegOutcome {
    fn apply(self, outcome: &mut EnrichOutcome) {
        match self {
            LegOutcome::MissingEndpoint => {}
            LegOutcome::AlreadyComplete => outcome.cache_hits += 1,
            LegOutcome::ShortHop => {
                outcome.cache_hits += 1;
                outcome.updated_stops += 1;
            }
            LegOutcome::Routed | LegOutcome::Fallback => {
                outcome.cache_misses += 1;
                outcome.updated_stops += 1;
            }
        }
    }
}

#[derive(Clone)]
pub struct RouteEnricher {
    store: Arc<dyn DispatchStore>,
    provider: Arc<dyn RoutingProvider>,
    clock: Arc<dyn Clock>,
    estimator: CrowFlight,
}

impl RouteEnricher {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        provider: Arc<dyn RoutingProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            provider,
            clock,
            estimator: CrowFlight::default(),
        }
    }

    /// Fill in leg travel for one route, at most `leg_concurrency` legs at a time.
    pub async fn enrich(&self, route_id: &str, config: &EnrichConfig) -> Result<EnrichOutcome> {
        let route_id = route_id.trim();
        if route_id.is_empty() {
            return Err(DispatchError::InvalidArgument("route id is required".to_string()));
        }

        info!(
            route_id,
            force = config.force,
            leg_concurrency = config.leg_concurrency,
            short_hop_meters = config.short_hop_meters,
            "enrich route start"
        );

        let stops = self.store.route_stops(route_id).await?;
        if stops.len() < 2 {
            warn!(route_id, count = stops.len(), "not enough stops to form a leg");
            return Ok(EnrichOutcome::default());
        }

        let legs: Vec<_> = stops
            .windows(2)
            .map(|pair| {
                let worker = self.clone();
                let route_id = route_id.to_string();
                let config = config.clone();
                let (prev, curr) = (pair[0].clone(), pair[1].clone());
                async move { worker.enrich_leg(&route_id, &prev, &curr, &config).await }
            })
            .collect();
        let results = BoundedPool::new(config.leg_concurrency).run_all(legs).await;

        let mut outcome = EnrichOutcome::default();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(Ok(leg)) => leg.apply(&mut outcome),
                Ok(Err(err)) | Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        self.store.touch_route(route_id, self.clock.now()).await?;

        info!(
            route_id,
            updated = outcome.updated_stops,
            cache_hits = outcome.cache_hits,
            cache_misses = outcome.cache_misses,
            "enrich route done"
        );
        Ok(outcome)
    }

    async fn enrich_leg(
        &self,
        route_id: &str,
        prev: &StopRecord,
        curr: &StopRecord,
        config: &EnrichConfig,
    ) -> Result<LegOutcome> {
        let (Some(from), Some(to)) = (
            prev.location.filter(LatLng::is_valid),
            curr.location.filter(LatLng::is_valid),
        ) else {
            return Ok(LegOutcome::MissingEndpoint);
        };

        if !config.force && curr.travel.as_ref().is_some_and(LegTravel::is_complete) {
            return Ok(LegOutcome::AlreadyComplete);
        }

        let crow = haversine_meters(from, to);
        let straight_line = |duration_seconds| LegTravel {
            from: Some(from),
            to: Some(to),
            distance_meters: crow.round() as i64,
            duration_seconds,
            polyline: None,
        };

        let (travel, leg) = if crow <= config.short_hop_meters {
            (straight_line(0), LegOutcome::ShortHop)
        } else {
            match self.provider.route(&RouteRequest::driving(from, to)).await {
                Ok(routed) => (
                    LegTravel {
                        from: Some(from),
                        to: Some(to),
                        distance_meters: routed.distance_meters,
                        duration_seconds: routed.duration_seconds,
                        polyline: routed.polyline,
                    },
                    LegOutcome::Routed,
                ),
                Err(err) => {
                    warn!(
                        route_id,
                        stop_id = %curr.stop_id,
                        error = %err,
                        "directions failed, writing straight-line fallback"
                    );
                    (straight_line(self.estimator.seconds_for(crow)), LegOutcome::Fallback)
                }
            }
        };

        self.store
            .write_stop_travel(route_id, &curr.stop_id, travel)
            .await?;
        Ok(leg)
    }

    /// Enrich many routes, at most `route_concurrency` at a time. A route that
    /// fails is logged and left out of the totals.
    pub async fn enrich_all(&self, config: &EnrichAllConfig) -> Result<EnrichAllOutcome> {
        info!(
            route_concurrency = config.route_concurrency,
            leg_concurrency = config.enrich.leg_concurrency,
            short_hop_meters = config.enrich.short_hop_meters,
            force = config.enrich.force,
            "enrich all start"
        );

        let route_ids = match &config.selection {
            RouteSelection::Ids(ids) => distinct_ids(ids),
            RouteSelection::Filter(filter) => self.store.find_routes(filter).await?,
        };
        if route_ids.is_empty() {
            info!("no routes found");
            return Ok(EnrichAllOutcome::default());
        }
        info!(count = route_ids.len(), "candidate routes");

        let units: Vec<_> = route_ids
            .iter()
            .map(|route_id| {
                let worker = self.clone();
                let enrich = config.enrich.clone();
                let route_id = route_id.clone();
                async move { worker.enrich(&route_id, &enrich).await }
            })
            .collect();
        let results = BoundedPool::new(config.route_concurrency).run_all(units).await;

        let mut outcome = EnrichAllOutcome {
            routes_total: route_ids.len(),
            ..EnrichAllOutcome::default()
        };
        for (route_id, result) in route_ids.iter().zip(results) {
            match result {
                Ok(Ok(route)) => {
                    outcome.routes_processed += 1;
                    outcome.updated_stops += route.updated_stops;
                    outcome.cache_hits += route.cache_hits;
                    outcome.cache_misses += route.cache_misses;
                }
                Ok(Err(err)) | Err(err) => {
                    error!(route_id = %route_id, error = %err, "route enrichment failed");
                }
            }
        }

        info!(
            routes_processed = outcome.routes_processed,
            routes_total = outcome.routes_total,
            updated = outcome.updated_stops,
            cache_hits = outcome.cache_hits,
            cache_misses = outcome.cache_misses,
            "enrich all done"
        );
        Ok(outcome)
    }
}
