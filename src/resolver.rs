//! Travel cost resolution: short-hop shortcut, cache, provider, fallback.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cache::{CacheKey, TravelCache};
use crate::haversine::{haversine_meters, CrowFlight};
use crate::model::{LatLng, Provenance, TravelQuote, TravelSeconds};
use crate::traits::{Clock, RouteRequest, RoutingProvider};

/// Inputs for [`TravelCostResolver::travel_seconds`].
#[derive(Debug, Clone, Copy)]
pub struct TravelOptions {
    pub reference_time: DateTime<Utc>,
    pub short_hop_meters: f64,
}

/// Resolves the cost of travelling between two points.
///
/// Never fails: provider errors, missing credentials and malformed responses
/// all degrade to a straight-line estimate.
#[derive(Clone)]
pub struct TravelCostResolver {
    cache: TravelCache,
    provider: Arc<dyn RoutingProvider>,
    clock: Arc<dyn Clock>,
    estimator: CrowFlight,
}

impl TravelCostResolver {
    pub fn new(cache: TravelCache, provider: Arc<dyn RoutingProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            provider,
            clock,
            estimator: CrowFlight::default(),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub async fn resolve(
        &self,
        from: LatLng,
        to: LatLng,
        reference_time: DateTime<Utc>,
        short_hop_meters: f64,
    ) -> TravelQuote {
        if !from.is_valid() || !to.is_valid() {
            return TravelQuote {
                distance_meters: 0,
                duration_seconds: 0,
                polyline: None,
                provenance: Provenance::FallbackEstimate,
            };
        }

        let crow = haversine_meters(from, to);
        if crow <= short_hop_meters {
            return TravelQuote {
                distance_meters: crow.round() as i64,
                duration_seconds: 0,
                polyline: None,
                provenance: Provenance::ShortHop,
            };
        }

        let key = CacheKey::new(from, to, reference_time);
        let now = self.clock.now();
        if let Some(quote) = self.cache.lookup(&key, now).await {
            debug!(%key, "travel cache hit");
            return quote;
        }

        let request = RouteRequest::driving(from, to).departing_at(reference_time);
        match self.provider.route(&request).await {
            Ok(leg) => {
                let quote = TravelQuote {
                    distance_meters: leg.distance_meters,
                    duration_seconds: leg.duration_seconds,
                    polyline: leg.polyline,
                    provenance: Provenance::Provider,
                };
                self.cache.store(&key, &quote, now).await;
                quote
            }
            Err(err) => {
                warn!(%key, error = %err, "routing provider failed, using straight-line estimate");
                TravelQuote {
                    distance_meters: crow.round() as i64,
                    duration_seconds: self.estimator.seconds_for(crow),
                    polyline: None,
                    provenance: Provenance::FallbackEstimate,
                }
            }
        }
    }

    /// Seconds only, with the hit flag used for cache accounting.
    pub async fn travel_seconds(&self, from: LatLng, to: LatLng, options: &TravelOptions) -> TravelSeconds {
        let quote = self
            .resolve(from, to, options.reference_time, options.short_hop_meters)
            .await;
        TravelSeconds {
            seconds: quote.duration_seconds,
            was_cached: quote.provenance.counts_as_hit(),
        }
    }
}
