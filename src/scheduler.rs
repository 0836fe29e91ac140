//! Chunked optimisation over an agent fleet.
//!
//! Agents are split into small chunks that run one after another, with a
//! pause between chunks, to bound routing-provider traffic and write volume.
//! A job taken by an earlier chunk is never reconsidered by a later one.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::OptimizeConfig;
use crate::engine::InsertionAssignmentEngine;
use crate::error::{DispatchError, Result};
use crate::model::{dispatch_order, distinct_ids, Agent, Job};
use crate::traits::DispatchStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeOutcome {
    pub assigned_count: usize,
    pub chunk_count: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

#[derive(Clone)]
pub struct ChunkScheduler {
    engine: InsertionAssignmentEngine,
    store: Arc<dyn DispatchStore>,
}

impl ChunkScheduler {
    pub fn new(engine: InsertionAssignmentEngine, store: Arc<dyn DispatchStore>) -> Self {
        Self { engine, store }
    }

    /// Load agents and jobs, then run the insertion engine chunk by chunk.
    ///
    /// Fails only on empty id lists or when no requested agent or job exists.
    /// A chunk that fails is logged and contributes no assignments.
    pub async fn optimize(
        &self,
        agent_ids: &[String],
        job_ids: &[String],
        config: &OptimizeConfig,
    ) -> Result<OptimizeOutcome> {
        let agent_ids = distinct_ids(agent_ids);
        let job_ids = distinct_ids(job_ids);
        if agent_ids.is_empty() || job_ids.is_empty() {
            return Err(DispatchError::InvalidArgument(
                "agent ids and job ids must both be non-empty".to_string(),
            ));
        }

        info!(
            agent_count = agent_ids.len(),
            job_count = job_ids.len(),
            chunk_size = config.chunk_size,
            chunk_delay_ms = config.chunk_delay.as_millis() as u64,
            ignore_windows = config.assignment.ignore_windows,
            "optimize start"
        );

        let (loaded_agents, loaded_jobs) = tokio::try_join!(
            self.store.get_agents(&agent_ids),
            self.store.get_jobs(&job_ids),
        )?;
        if loaded_agents.is_empty() {
            return Err(DispatchError::NotFound("none of the requested agents exist".to_string()));
        }
        if loaded_jobs.is_empty() {
            return Err(DispatchError::NotFound("none of the requested jobs exist".to_string()));
        }

        let agents_in = loaded_agents.len();
        let jobs_in = loaded_jobs.len();
        let agents: Vec<Agent> = loaded_agents
            .into_iter()
            .filter(|agent| agent.depot().is_some())
            .collect();
        let mut jobs: Vec<Job> = loaded_jobs
            .into_iter()
            .filter(|job| job.valid_location().is_some())
            .collect();

        if agents.is_empty() || jobs.is_empty() {
            warn!(
                agents_in,
                agents_valid = agents.len(),
                jobs_in,
                jobs_valid = jobs.len(),
                "no agents or jobs with usable locations"
            );
            return Ok(OptimizeOutcome {
                chunk_count: 1,
                ..OptimizeOutcome::default()
            });
        }

        let service_date = config
            .assignment
            .date
            .unwrap_or_else(|| self.engine.today());
        for job in &mut jobs {
            job.normalize_windows(service_date);
        }
        jobs.sort_by(dispatch_order);

        let chunk_size = config.chunk_size.max(1);
        let chunks: Vec<&[Agent]> = agents.chunks(chunk_size).collect();
        let chunk_count = chunks.len();

        let mut assigned_ids: HashSet<String> = HashSet::new();
        let mut outcome = OptimizeOutcome {
            chunk_count,
            ..OptimizeOutcome::default()
        };

        for (index, chunk) in chunks.iter().enumerate() {
            match self
                .engine
                .assign(&jobs, chunk, &assigned_ids, &config.assignment)
                .await
            {
                Ok(result) => {
                    outcome.assigned_count += result.assigned_count;
                    outcome.cache_hits += result.cache_hits;
                    outcome.cache_misses += result.cache_misses;
                    assigned_ids.extend(result.assigned_ids);
                    info!(
                        chunk = index + 1,
                        of = chunk_count,
                        assigned_in_chunk = result.assigned_count,
                        assigned_total = outcome.assigned_count,
                        cache_hits = outcome.cache_hits,
                        cache_misses = outcome.cache_misses,
                        "chunk complete"
                    );
                }
                Err(err) => {
                    error!(chunk = index + 1, of = chunk_count, error = %err, "chunk failed");
                }
            }

            if index + 1 < chunk_count && !config.chunk_delay.is_zero() {
                tokio::time::sleep(config.chunk_delay).await;
            }
        }

        info!(
            assigned = outcome.assigned_count,
            chunks = outcome.chunk_count,
            cache_hits = outcome.cache_hits,
            cache_misses = outcome.cache_misses,
            "optimize done"
        );
        Ok(outcome)
    }
}
