//! Single-shot whole-fleet planner kept for older clients.
//!
//! Unlike [`crate::engine`], routes only ever grow at their tail: every agent
//! keeps a cursor (time and position) and each job is appended to the agent
//! that can reach it earliest inside one of its windows and before the end
//! of its shift.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LegacyConfig;
use crate::error::{DispatchError, Result};
use crate::model::{distinct_ids, legacy_order, Agent, Job, JobStatus, LatLng, TimeWindow};
use crate::record::{
    AssignmentRecord, JobStatusUpdate, LegTravel, PlanBatch, RouteRecord, RouteStatus, StopRecord,
};
use crate::resolver::TravelCostResolver;
use crate::traits::DispatchStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyOutcome {
    pub date: NaiveDate,
    pub routes_created: usize,
    pub route_ids: Vec<String>,
    pub assigned_count: usize,
    pub unassigned_count: usize,
}

impl LegacyOutcome {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            routes_created: 0,
            route_ids: Vec::new(),
            assigned_count: 0,
            unassigned_count: 0,
        }
    }
}

/// Earliest service start at or after `arrival` that fits a window.
///
/// Windows are tried in order; an arrival before a window waits for its start.
/// With no windows the arrival itself is feasible.
pub fn next_feasible(arrival: DateTime<Utc>, windows: &[TimeWindow]) -> Option<DateTime<Utc>> {
    if windows.is_empty() {
        return Some(arrival);
    }
    windows.iter().find_map(|w| {
        let eta = arrival.max(w.start);
        (eta <= w.end).then_some(eta)
    })
}

#[derive(Debug)]
struct Leg {
    job_id: String,
    location: LatLng,
    service_seconds: i64,
    eta: DateTime<Utc>,
    travel: LegTravel,
}

#[derive(Debug)]
struct Cursor<'a> {
    agent: &'a Agent,
    time: DateTime<Utc>,
    position: LatLng,
    shift_end: DateTime<Utc>,
    legs: Vec<Leg>,
    total_distance_meters: i64,
    total_duration_seconds: i64,
}

struct Choice {
    cursor_index: usize,
    eta: DateTime<Utc>,
    travel: LegTravel,
}

#[derive(Clone)]
pub struct LegacyOptimizer {
    resolver: TravelCostResolver,
    store: Arc<dyn DispatchStore>,
}

impl LegacyOptimizer {
    pub fn new(resolver: TravelCostResolver, store: Arc<dyn DispatchStore>) -> Self {
        Self { resolver, store }
    }

    /// Plan every pending job across `agent_ids` and persist one route per
    /// agent that received work.
    pub async fn optimize(&self, agent_ids: &[String], config: &LegacyConfig) -> Result<LegacyOutcome> {
        let agent_ids = distinct_ids(agent_ids);
        if agent_ids.is_empty() {
            return Err(DispatchError::InvalidArgument("agent ids are required".to_string()));
        }

        info!(
            agent_count = agent_ids.len(),
            date = %config.date,
            company_id = config.company_id.as_deref().unwrap_or_default(),
            "legacy optimize start"
        );

        let agents = self.store.get_agents(&agent_ids).await?;
        if agents.is_empty() {
            return Err(DispatchError::NotFound("no agents found".to_string()));
        }

        let mut jobs = self.store.pending_jobs(config.company_id.as_deref()).await?;
        if jobs.is_empty() {
            info!("no pending jobs");
            return Ok(LegacyOutcome::empty(config.date));
        }
        for job in &mut jobs {
            job.normalize_windows(config.date);
        }
        jobs.sort_by(legacy_order);

        let now = self.resolver.clock().now();
        let mut cursors: Vec<Cursor<'_>> = agents
            .iter()
            .map(|agent| self.cursor_for(agent, now, config))
            .collect();

        let mut assigned_count = 0;
        for job in &jobs {
            let Some(location) = job.valid_location() else {
                warn!(job_id = %job.id, "job has no usable location");
                continue;
            };
            let Some(choice) = self.earliest_arrival(&cursors, job, location, config).await else {
                debug!(job_id = %job.id, "no agent can reach job inside a window");
                continue;
            };

            let service_seconds = job.service_seconds_or(config.service_seconds);
            let cursor = &mut cursors[choice.cursor_index];
            cursor.total_distance_meters += choice.travel.distance_meters;
            cursor.total_duration_seconds += choice.travel.duration_seconds;
            cursor.time = choice.eta + Duration::seconds(service_seconds);
            cursor.position = location;
            cursor.legs.push(Leg {
                job_id: job.id.clone(),
                location,
                service_seconds,
                eta: choice.eta,
                travel: choice.travel,
            });
            assigned_count += 1;
        }

        let (batch, route_ids) = plan_batch(&cursors, config, now);
        if !batch.is_empty() {
            self.store.write_plan(batch).await?;
        }

        let outcome = LegacyOutcome {
            date: config.date,
            routes_created: route_ids.len(),
            route_ids,
            assigned_count,
            unassigned_count: jobs.len() - assigned_count,
        };
        info!(
            routes_created = outcome.routes_created,
            assigned = outcome.assigned_count,
            unassigned = outcome.unassigned_count,
            "legacy optimize done"
        );
        Ok(outcome)
    }

    fn cursor_for<'a>(&self, agent: &'a Agent, now: DateTime<Utc>, config: &LegacyConfig) -> Cursor<'a> {
        let shift = agent.shift.unwrap_or_default();
        let start = shift.start.unwrap_or(now);
        let shift_end = shift
            .end
            .unwrap_or(start + Duration::hours(config.default_shift_hours));
        let position = agent.depot().unwrap_or_else(|| {
            warn!(
                agent_id = %agent.id,
                lat = config.fallback_depot.lat,
                lng = config.fallback_depot.lng,
                "agent has no start location, using fallback depot"
            );
            config.fallback_depot
        });
        Cursor {
            agent,
            time: start,
            position,
            shift_end,
            legs: Vec::new(),
            total_distance_meters: 0,
            total_duration_seconds: 0,
        }
    }

    /// The agent that reaches `job` earliest; the first one wins ties.
    async fn earliest_arrival(
        &self,
        cursors: &[Cursor<'_>],
        job: &Job,
        location: LatLng,
        config: &LegacyConfig,
    ) -> Option<Choice> {
        let mut best: Option<Choice> = None;
        for (cursor_index, cursor) in cursors.iter().enumerate() {
            let quote = self
                .resolver
                .resolve(cursor.position, location, cursor.time, config.short_hop_meters)
                .await;
            let arrival = cursor.time + Duration::seconds(quote.duration_seconds);
            let Some(eta) = next_feasible(arrival, &job.time_windows) else {
                continue;
            };
            if eta > cursor.shift_end {
                continue;
            }
            if best.as_ref().is_none_or(|b| eta < b.eta) {
                best = Some(Choice {
                    cursor_index,
                    eta,
                    travel: LegTravel {
                        from: Some(cursor.position),
                        to: Some(location),
                        distance_meters: quote.distance_meters,
                        duration_seconds: quote.duration_seconds,
                        polyline: quote.polyline,
                    },
                });
            }
        }
        best
    }
}

fn plan_batch(cursors: &[Cursor<'_>], config: &LegacyConfig, now: DateTime<Utc>) -> (PlanBatch, Vec<String>) {
    let mut batch = PlanBatch::default();
    let mut route_ids = Vec::new();
    for cursor in cursors.iter().filter(|c| !c.legs.is_empty()) {
        let route_id = Uuid::new_v4().to_string();
        let agent_id = cursor.agent.id.as_str();

        batch.routes.push(RouteRecord {
            id: route_id.clone(),
            agent_id: agent_id.to_string(),
            status: RouteStatus::Planned,
            company_id: config.company_id.clone(),
            date: Some(config.date),
            total_distance_meters: Some(cursor.total_distance_meters),
            total_duration_seconds: Some(cursor.total_duration_seconds),
            updated_at: now,
        });

        for (position, leg) in cursor.legs.iter().enumerate() {
            let mut stop = StopRecord::planned(
                route_id.as_str(),
                leg.job_id.as_str(),
                position,
                leg.location,
                leg.service_seconds,
            );
            stop.eta = Some(leg.eta);
            stop.travel = Some(leg.travel.clone());
            batch.stops.push(stop);
            batch
                .assignments
                .push(AssignmentRecord::new(agent_id, &leg.job_id, &route_id, position));
            batch.job_updates.push(JobStatusUpdate {
                job_id: leg.job_id.clone(),
                status: JobStatus::Assigned,
                assigned_to: Some(agent_id.to_string()),
            });
        }
        route_ids.push(route_id);
    }
    (batch, route_ids)
}
