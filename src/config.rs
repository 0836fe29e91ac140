//! Defaults, request types and knob clamping.
//!
//! Every numeric knob a caller supplies is clamped to a safe range, whatever
//! the caller sent. Absent or non-finite values take the configured default.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::model::LatLng;
use crate::record::RouteFilter;

pub const SHORT_HOP_RANGE: (f64, f64) = (0.0, 200.0);
pub const TIE_NUDGE_RANGE: (f64, f64) = (0.0, 600.0);
pub const CHUNK_SIZE_RANGE: (f64, f64) = (1.0, 10.0);
pub const CHUNK_DELAY_MS_RANGE: (f64, f64) = (0.0, 5000.0);
pub const CONCURRENCY_RANGE: (f64, f64) = (1.0, 10.0);
pub const SERVICE_SECONDS_RANGE: (f64, f64) = (0.0, 86_400.0);
pub const ROUTE_LIMIT_RANGE: (f64, f64) = (1.0, 500.0);

/// Server-side defaults, overridable from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchDefaults {
    pub service_seconds: i64,
    pub short_hop_meters: f64,
    pub tie_nudge_seconds: i64,
    pub chunk_size: usize,
    pub chunk_delay_ms: u64,
    pub leg_concurrency: usize,
    pub route_concurrency: usize,
    pub enrich_route_limit: usize,
    /// Start point for agents without a start location in the legacy planner.
    pub fallback_depot: LatLng,
    /// Shift length assumed by the legacy planner when an agent has no shift end.
    pub default_shift_hours: i64,
}

impl Default for DispatchDefaults {
    fn default() -> Self {
        Self {
            service_seconds: 120,
            short_hop_meters: 20.0,
            tie_nudge_seconds: 60,
            chunk_size: 3,
            chunk_delay_ms: 800,
            leg_concurrency: 5,
            route_concurrency: 3,
            enrich_route_limit: 20,
            fallback_depot: LatLng::new(13.7563, 100.5018),
            default_shift_hours: 12,
        }
    }
}

impl DispatchDefaults {
    /// Defaults with overrides from `DEFAULT_SERVICE_SEC`, `SHORT_HOP_METERS`,
    /// `TIE_NUDGE_SEC`, `CHUNK_SIZE`, `CHUNK_DELAY_MS`, `LEG_CONCURRENCY`,
    /// `ROUTE_CONCURRENCY` and `ENRICH_ROUTE_LIMIT`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`Self::from_env`] with a custom variable source. Unparseable
    /// values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base = Self::default();
        let num = |name: &str| lookup(name).and_then(|v| v.trim().parse::<f64>().ok()).filter(|v| v.is_finite());
        Self {
            service_seconds: num("DEFAULT_SERVICE_SEC").map_or(base.service_seconds, |v| v as i64),
            short_hop_meters: num("SHORT_HOP_METERS").unwrap_or(base.short_hop_meters),
            tie_nudge_seconds: num("TIE_NUDGE_SEC").map_or(base.tie_nudge_seconds, |v| v as i64),
            chunk_size: num("CHUNK_SIZE").map_or(base.chunk_size, |v| v as usize),
            chunk_delay_ms: num("CHUNK_DELAY_MS").map_or(base.chunk_delay_ms, |v| v as u64),
            leg_concurrency: num("LEG_CONCURRENCY").map_or(base.leg_concurrency, |v| v as usize),
            route_concurrency: num("ROUTE_CONCURRENCY").map_or(base.route_concurrency, |v| v as usize),
            enrich_route_limit: num("ENRICH_ROUTE_LIMIT").map_or(base.enrich_route_limit, |v| v as usize),
            ..base
        }
    }
}

/// `value` (or `default` when absent or non-finite) clamped to `range`.
pub fn clamp_knob(value: Option<f64>, default: f64, (min, max): (f64, f64)) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(default).clamp(min, max)
}

/// Knobs of one insertion pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentConfig {
    pub service_seconds_default: i64,
    pub short_hop_meters: f64,
    pub tie_nudge_seconds: i64,
    pub ignore_windows: bool,
    /// Stamped onto the route records the pass writes.
    pub company_id: Option<String>,
    pub date: Option<NaiveDate>,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        let defaults = DispatchDefaults::default();
        Self {
            service_seconds_default: defaults.service_seconds,
            short_hop_meters: defaults.short_hop_meters,
            tie_nudge_seconds: defaults.tie_nudge_seconds,
            ignore_windows: false,
            company_id: None,
            date: None,
        }
    }
}

/// Resolved, clamped configuration of an optimize call.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeConfig {
    pub assignment: AssignmentConfig,
    pub chunk_size: usize,
    pub chunk_delay: Duration,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        OptimizeRequest::default().resolve(&DispatchDefaults::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest {
    #[serde(default, alias = "messengerIds")]
    pub agent_ids: Vec<String>,
    #[serde(default)]
    pub job_ids: Vec<String>,
    pub company_id: Option<String>,
    pub date: Option<NaiveDate>,
    #[serde(alias = "serviceSecDefault")]
    pub service_seconds_default: Option<f64>,
    pub short_hop_meters: Option<f64>,
    #[serde(alias = "tieNudgeSec")]
    pub tie_nudge_seconds: Option<f64>,
    pub chunk_size: Option<f64>,
    pub chunk_delay_ms: Option<f64>,
    pub ignore_windows: Option<bool>,
}

impl OptimizeRequest {
    pub fn resolve(&self, defaults: &DispatchDefaults) -> OptimizeConfig {
        OptimizeConfig {
            assignment: AssignmentConfig {
                service_seconds_default: clamp_knob(
                    self.service_seconds_default,
                    defaults.service_seconds as f64,
                    SERVICE_SECONDS_RANGE,
                )
                .round() as i64,
                short_hop_meters: clamp_knob(self.short_hop_meters, defaults.short_hop_meters, SHORT_HOP_RANGE),
                tie_nudge_seconds: clamp_knob(
                    self.tie_nudge_seconds,
                    defaults.tie_nudge_seconds as f64,
                    TIE_NUDGE_RANGE,
                )
                .round() as i64,
                ignore_windows: self.ignore_windows.unwrap_or(false),
                company_id: self.company_id.clone(),
                date: self.date,
            },
            chunk_size: clamp_knob(self.chunk_size, defaults.chunk_size as f64, CHUNK_SIZE_RANGE) as usize,
            chunk_delay: Duration::from_millis(
                clamp_knob(self.chunk_delay_ms, defaults.chunk_delay_ms as f64, CHUNK_DELAY_MS_RANGE) as u64,
            ),
        }
    }
}

/// Resolved configuration of a single-route enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichConfig {
    pub force: bool,
    pub leg_concurrency: usize,
    pub short_hop_meters: f64,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        EnrichRouteRequest::default().resolve(&DispatchDefaults::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichRouteRequest {
    #[serde(default)]
    pub route_id: String,
    pub force: Option<bool>,
    pub leg_concurrency: Option<f64>,
    pub short_hop_meters: Option<f64>,
}

impl EnrichRouteRequest {
    pub fn resolve(&self, defaults: &DispatchDefaults) -> EnrichConfig {
        resolve_enrich(self.force, self.leg_concurrency, self.short_hop_meters, defaults)
    }
}

fn resolve_enrich(
    force: Option<bool>,
    leg_concurrency: Option<f64>,
    short_hop_meters: Option<f64>,
    defaults: &DispatchDefaults,
) -> EnrichConfig {
    EnrichConfig {
        force: force.unwrap_or(false),
        leg_concurrency: clamp_knob(leg_concurrency, defaults.leg_concurrency as f64, CONCURRENCY_RANGE) as usize,
        short_hop_meters: clamp_knob(short_hop_meters, defaults.short_hop_meters, SHORT_HOP_RANGE),
    }
}

/// Which routes a batch enrichment visits.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteSelection {
    Ids(Vec<String>),
    Filter(RouteFilter),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichAllConfig {
    pub selection: RouteSelection,
    pub route_concurrency: usize,
    pub enrich: EnrichConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichAllRoutesRequest {
    pub route_ids: Option<Vec<String>>,
    pub company_id: Option<String>,
    /// Milliseconds since the epoch.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub updated_before: Option<DateTime<Utc>>,
    pub limit: Option<f64>,
    pub route_concurrency: Option<f64>,
    pub leg_concurrency: Option<f64>,
    pub short_hop_meters: Option<f64>,
    pub force: Option<bool>,
}

impl EnrichAllRoutesRequest {
    /// An explicit, non-empty id list wins over the filter.
    pub fn resolve(&self, defaults: &DispatchDefaults) -> EnrichAllConfig {
        let ids: Vec<String> = self
            .route_ids
            .iter()
            .flatten()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        let selection = if ids.is_empty() {
            RouteSelection::Filter(RouteFilter {
                company_id: self.company_id.clone(),
                updated_before: self.updated_before,
                limit: clamp_knob(
                    self.limit.filter(|limit| *limit != 0.0),
                    defaults.enrich_route_limit as f64,
                    ROUTE_LIMIT_RANGE,
                ) as usize,
            })
        } else {
            RouteSelection::Ids(ids)
        };
        EnrichAllConfig {
            selection,
            route_concurrency: clamp_knob(
                self.route_concurrency,
                defaults.route_concurrency as f64,
                CONCURRENCY_RANGE,
            ) as usize,
            enrich: resolve_enrich(self.force, self.leg_concurrency, self.short_hop_meters, defaults),
        }
    }
}

/// Resolved configuration of the legacy whole-fleet planner.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyConfig {
    pub date: NaiveDate,
    pub company_id: Option<String>,
    pub service_seconds: i64,
    pub short_hop_meters: f64,
    pub fallback_depot: LatLng,
    pub default_shift_hours: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyOptimizeRequest {
    #[serde(default, alias = "messengerIds")]
    pub agent_ids: Vec<String>,
    pub date: Option<NaiveDate>,
    pub company_id: Option<String>,
    pub service_seconds_default: Option<f64>,
    pub short_hop_meters: Option<f64>,
}

impl LegacyOptimizeRequest {
    /// `today` is used when the request names no date.
    pub fn resolve(&self, defaults: &DispatchDefaults, today: NaiveDate) -> LegacyConfig {
        LegacyConfig {
            date: self.date.unwrap_or(today),
            company_id: self.company_id.clone(),
            service_seconds: clamp_knob(
                self.service_seconds_default,
                defaults.service_seconds as f64,
                SERVICE_SECONDS_RANGE,
            )
            .round() as i64,
            short_hop_meters: clamp_knob(self.short_hop_meters, defaults.short_hop_meters, SHORT_HOP_RANGE),
            fallback_depot: defaults.fallback_depot,
            default_shift_hours: defaults.default_shift_hours,
        }
    }
}
