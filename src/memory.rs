//! In-memory document store and travel cache.
//!
//! Suitable for tests, local runs and embedding. Writes follow merge
//! semantics: a stop written without travel keeps the travel already stored.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::cache::{CacheEntry, CacheKey};
use crate::error::StoreError;
use crate::model::{Agent, Job, JobStatus};
use crate::record::{AssignmentRecord, LegTravel, PlanBatch, RouteFilter, RouteRecord, StopRecord};
use crate::traits::{DispatchStore, TravelCacheStore};

#[derive(Debug, Default)]
struct Documents {
    agents: HashMap<String, Agent>,
    jobs: HashMap<String, Job>,
    routes: HashMap<String, RouteRecord>,
    stops: HashMap<String, BTreeMap<String, StopRecord>>,
    assignments: BTreeMap<String, AssignmentRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<Documents>,
    cache: Mutex<HashMap<CacheKey, CacheEntry>>,
}

fn locked<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_agent(&self, agent: Agent) -> Result<(), StoreError> {
        locked(&self.docs)?.agents.insert(agent.id.clone(), agent);
        Ok(())
    }

    pub fn insert_job(&self, job: Job) -> Result<(), StoreError> {
        locked(&self.docs)?.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    pub fn insert_route(&self, route: RouteRecord, stops: Vec<StopRecord>) -> Result<(), StoreError> {
        let mut docs = locked(&self.docs)?;
        let entry = docs.stops.entry(route.id.clone()).or_default();
        for stop in stops {
            entry.insert(stop.stop_id.clone(), stop);
        }
        docs.routes.insert(route.id.clone(), route);
        Ok(())
    }

    pub fn job(&self, id: &str) -> Option<Job> {
        locked(&self.docs).ok()?.jobs.get(id).cloned()
    }

    pub fn route(&self, id: &str) -> Option<RouteRecord> {
        locked(&self.docs).ok()?.routes.get(id).cloned()
    }

    pub fn route_ids(&self) -> Vec<String> {
        let Ok(docs) = locked(&self.docs) else {
            return Vec::new();
        };
        let mut ids: Vec<_> = docs.routes.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stops of a route ordered by position.
    pub fn stops(&self, route_id: &str) -> Vec<StopRecord> {
        let Ok(docs) = locked(&self.docs) else {
            return Vec::new();
        };
        ordered_stops(&docs, route_id)
    }

    pub fn assignments(&self) -> Vec<AssignmentRecord> {
        locked(&self.docs)
            .map(|docs| docs.assignments.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn cache_entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        locked(&self.cache).ok()?.get(key).cloned()
    }

    pub fn put_cache_entry(&self, key: CacheKey, entry: CacheEntry) -> Result<(), StoreError> {
        locked(&self.cache)?.insert(key, entry);
        Ok(())
    }

    pub fn cache_len(&self) -> usize {
        locked(&self.cache).map(|c| c.len()).unwrap_or_default()
    }
}

fn ordered_stops(docs: &Documents, route_id: &str) -> Vec<StopRecord> {
    let mut stops: Vec<_> = docs
        .stops
        .get(route_id)
        .map(|stops| stops.values().cloned().collect())
        .unwrap_or_default();
    stops.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.stop_id.cmp(&b.stop_id)));
    stops
}

#[async_trait]
impl DispatchStore for MemoryStore {
    async fn get_agents(&self, ids: &[String]) -> Result<Vec<Agent>, StoreError> {
        let docs = locked(&self.docs)?;
        Ok(ids.iter().filter_map(|id| docs.agents.get(id).cloned()).collect())
    }

    async fn get_jobs(&self, ids: &[String]) -> Result<Vec<Job>, StoreError> {
        let docs = locked(&self.docs)?;
        Ok(ids.iter().filter_map(|id| docs.jobs.get(id).cloned()).collect())
    }

    async fn pending_jobs(&self, company_id: Option<&str>) -> Result<Vec<Job>, StoreError> {
        let docs = locked(&self.docs)?;
        let mut jobs: Vec<_> = docs
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Pending)
            .filter(|job| company_id.is_none_or(|c| job.company_id.as_deref() == Some(c)))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(jobs)
    }

    async fn write_plan(&self, batch: PlanBatch) -> Result<(), StoreError> {
        let mut docs = locked(&self.docs)?;
        for route in batch.routes {
            docs.routes.insert(route.id.clone(), route);
        }
        for mut stop in batch.stops {
            let route_stops = docs.stops.entry(stop.route_id.clone()).or_default();
            if stop.travel.is_none() {
                stop.travel = route_stops
                    .get(&stop.stop_id)
                    .and_then(|existing| existing.travel.clone());
            }
            route_stops.insert(stop.stop_id.clone(), stop);
        }
        for assignment in batch.assignments {
            docs.assignments.insert(assignment.id.clone(), assignment);
        }
        for update in batch.job_updates {
            if let Some(job) = docs.jobs.get_mut(&update.job_id) {
                job.status = update.status;
                job.assigned_to = update.assigned_to;
            }
        }
        Ok(())
    }

    async fn route_stops(&self, route_id: &str) -> Result<Vec<StopRecord>, StoreError> {
        let docs = locked(&self.docs)?;
        Ok(ordered_stops(&docs, route_id))
    }

    async fn write_stop_travel(
        &self,
        route_id: &str,
        stop_id: &str,
        travel: LegTravel,
    ) -> Result<(), StoreError> {
        let mut docs = locked(&self.docs)?;
        let stop = docs
            .stops
            .get_mut(route_id)
            .and_then(|stops| stops.get_mut(stop_id))
            .ok_or_else(|| StoreError::Conflict(format!("stop {route_id}/{stop_id} does not exist")))?;
        stop.travel = Some(travel);
        Ok(())
    }

    async fn touch_route(&self, route_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut docs = locked(&self.docs)?;
        if let Some(route) = docs.routes.get_mut(route_id) {
            route.updated_at = at;
        }
        Ok(())
    }

    async fn find_routes(&self, filter: &RouteFilter) -> Result<Vec<String>, StoreError> {
        let docs = locked(&self.docs)?;
        let mut routes: Vec<_> = docs
            .routes
            .values()
            .filter(|r| {
                filter
                    .company_id
                    .as_deref()
                    .is_none_or(|c| r.company_id.as_deref() == Some(c))
            })
            .filter(|r| filter.updated_before.is_none_or(|before| r.updated_at < before))
            .collect();
        routes.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(routes
            .into_iter()
            .take(filter.limit)
            .map(|r| r.id.clone())
            .collect())
    }
}

#[async_trait]
impl TravelCacheStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StoreError> {
        Ok(locked(&self.cache)?.get(key).cloned())
    }

    async fn merge(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), StoreError> {
        let mut cache = locked(&self.cache)?;
        let merged = match cache.get(key) {
            Some(existing) => CacheEntry {
                polyline: entry.polyline.or_else(|| existing.polyline.clone()),
                ..entry
            },
            None => entry,
        };
        cache.insert(*key, merged);
        Ok(())
    }
}
