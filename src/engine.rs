//! Greedy best-insertion assignment.
//!
//! Jobs are taken one at a time in dispatch order. Each job goes to the agent
//! and position whose insertion adds the least travel plus service time,
//! given the routes built so far in this pass. Routes live only for the
//! duration of one [`InsertionAssignmentEngine::assign`] call and are then
//! persisted as a single batch.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info};

use crate::config::AssignmentConfig;
use crate::error::Result;
use crate::model::{Agent, AffinityHint, Job, JobStatus, LatLng, TravelSeconds};
use crate::record::{
    AssignmentRecord, JobStatusUpdate, PlanBatch, RouteRecord, RouteStatus, StopRecord,
    RETURN_TO_BASE_STOP_ID,
};
use crate::resolver::{TravelCostResolver, TravelOptions};
use crate::traits::DispatchStore;

/// Grace period after a job's last window ends before it counts as expired.
pub const WINDOW_GRACE_MINUTES: i64 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignOutcome {
    pub assigned_count: usize,
    /// Job ids in the order they were assigned.
    pub assigned_ids: Vec<String>,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

#[derive(Debug, Clone)]
struct PlannedStop {
    job_id: String,
    location: LatLng,
    service_seconds: i64,
}

#[derive(Debug)]
struct RouteState<'a> {
    agent: &'a Agent,
    depot: LatLng,
    stops: Vec<PlannedStop>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    route_index: usize,
    position: usize,
    added_seconds: i64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    hits: usize,
    misses: usize,
}

impl Tally {
    fn record(&mut self, travel: TravelSeconds) {
        if travel.was_cached {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }
}

#[derive(Clone)]
pub struct InsertionAssignmentEngine {
    resolver: TravelCostResolver,
    store: Arc<dyn DispatchStore>,
}

impl InsertionAssignmentEngine {
    pub fn new(resolver: TravelCostResolver, store: Arc<dyn DispatchStore>) -> Self {
        Self { resolver, store }
    }

    /// Service date implied by the engine's clock.
    pub fn today(&self) -> NaiveDate {
        self.resolver.clock().now().date_naive()
    }

    /// Assign `jobs` (already in dispatch order) to `agents`, skipping ids in
    /// `already_assigned`, then persist the resulting routes.
    ///
    /// Agent order decides ties, so callers must pass agents in a stable order.
    pub async fn assign(
        &self,
        jobs: &[Job],
        agents: &[Agent],
        already_assigned: &HashSet<String>,
        config: &AssignmentConfig,
    ) -> Result<AssignOutcome> {
        let now = self.resolver.clock().now();
        let options = TravelOptions {
            reference_time: now,
            short_hop_meters: config.short_hop_meters,
        };
        let grace = Duration::minutes(WINDOW_GRACE_MINUTES);

        let mut routes: Vec<RouteState<'_>> = agents
            .iter()
            .filter_map(|agent| {
                agent.depot().map(|depot| RouteState {
                    agent,
                    depot,
                    stops: Vec::new(),
                })
            })
            .collect();

        let mut outcome = AssignOutcome::default();
        let mut tally = Tally::default();
        let mut assigned: HashSet<&str> = HashSet::new();

        for job in jobs {
            if already_assigned.contains(&job.id) || assigned.contains(job.id.as_str()) {
                continue;
            }
            let Some(location) = job.valid_location() else {
                continue;
            };
            if !config.ignore_windows && job.fully_expired(now, grace) {
                debug!(job_id = %job.id, "every time window has expired, leaving unassigned");
                continue;
            }

            let service_seconds = job.service_seconds_or(config.service_seconds_default);
            let affinity = job.affinity();
            let mut best: Option<Candidate> = None;

            for (route_index, route) in routes.iter().enumerate() {
                for position in 0..=route.stops.len() {
                    let before = if position == 0 {
                        route.depot
                    } else {
                        route.stops[position - 1].location
                    };
                    let after = route.stops.get(position).map(|stop| stop.location);

                    let added_seconds = self
                        .insertion_cost(before, location, after, service_seconds, &options, &mut tally)
                        .await;
                    let candidate = Candidate {
                        route_index,
                        position,
                        added_seconds,
                    };

                    best = match best {
                        Some(current)
                            if !prefer(&candidate, &current, &routes, &affinity, config.tie_nudge_seconds) =>
                        {
                            Some(current)
                        }
                        _ => Some(candidate),
                    };
                }
            }

            if let Some(best) = best {
                let route = &mut routes[best.route_index];
                route.stops.insert(
                    best.position,
                    PlannedStop {
                        job_id: job.id.clone(),
                        location,
                        service_seconds,
                    },
                );
                debug!(
                    job_id = %job.id,
                    agent_id = %route.agent.id,
                    position = best.position,
                    added_seconds = best.added_seconds,
                    "job inserted"
                );
                assigned.insert(job.id.as_str());
                outcome.assigned_ids.push(job.id.clone());
            }
        }

        outcome.assigned_count = outcome.assigned_ids.len();
        outcome.cache_hits = tally.hits;
        outcome.cache_misses = tally.misses;

        let batch = plan_batch(&routes, config, now);
        if !batch.is_empty() {
            self.store.write_plan(batch).await?;
        }

        info!(
            agents = routes.len(),
            assigned = outcome.assigned_count,
            cache_hits = outcome.cache_hits,
            cache_misses = outcome.cache_misses,
            "insertion pass complete"
        );
        Ok(outcome)
    }

    /// Seconds added by visiting `job` between `before` and `after`.
    async fn insertion_cost(
        &self,
        before: LatLng,
        job: LatLng,
        after: Option<LatLng>,
        service_seconds: i64,
        options: &TravelOptions,
        tally: &mut Tally,
    ) -> i64 {
        let to_job = self.resolver.travel_seconds(before, job, options).await;
        tally.record(to_job);

        let mut added = to_job.seconds + service_seconds;
        if let Some(after) = after {
            let (from_job, replaced) = tokio::join!(
                self.resolver.travel_seconds(job, after, options),
                self.resolver.travel_seconds(before, after, options),
            );
            tally.record(from_job);
            tally.record(replaced);
            added += from_job.seconds - replaced.seconds;
        }
        added
    }
}

/// Whether `challenger` should replace `current` as the best insertion.
///
/// A challenger more than a second cheaper always wins. Otherwise, within the
/// tie nudge, a hinted agent displaces an unhinted one, and the first-found
/// minimum keeps near-ties.
fn prefer(
    challenger: &Candidate,
    current: &Candidate,
    routes: &[RouteState<'_>],
    affinity: &AffinityHint,
    tie_nudge_seconds: i64,
) -> bool {
    if challenger.added_seconds < current.added_seconds - 1 {
        return true;
    }
    (challenger.added_seconds - current.added_seconds).abs() <= tie_nudge_seconds
        && affinity.prefers(&routes[challenger.route_index].agent.id)
        && !affinity.prefers(&routes[current.route_index].agent.id)
}

fn plan_batch(routes: &[RouteState<'_>], config: &AssignmentConfig, now: DateTime<Utc>) -> PlanBatch {
    let mut batch = PlanBatch::default();
    for route in routes.iter().filter(|route| !route.stops.is_empty()) {
        let agent_id = route.agent.id.as_str();
        let route_id = agent_id;

        batch.routes.push(RouteRecord {
            id: route_id.to_string(),
            agent_id: agent_id.to_string(),
            status: RouteStatus::Assigned,
            company_id: config.company_id.clone(),
            date: config.date,
            total_distance_meters: None,
            total_duration_seconds: None,
            updated_at: now,
        });

        for (position, stop) in route.stops.iter().enumerate() {
            batch.stops.push(StopRecord::planned(
                route_id,
                stop.job_id.as_str(),
                position,
                stop.location,
                stop.service_seconds,
            ));
            batch
                .assignments
                .push(AssignmentRecord::new(agent_id, &stop.job_id, route_id, position));
            batch.job_updates.push(JobStatusUpdate {
                job_id: stop.job_id.clone(),
                status: JobStatus::Assigned,
                assigned_to: Some(agent_id.to_string()),
            });
        }

        if route.agent.return_to_base {
            let mut depot_stop = StopRecord::planned(
                route_id,
                RETURN_TO_BASE_STOP_ID,
                route.stops.len(),
                route.depot,
                0,
            );
            depot_stop.is_depot = true;
            batch.stops.push(depot_stop);
        }
    }
    batch
}
