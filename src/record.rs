//! Persisted route, stop and assignment records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{JobStatus, LatLng};

/// Stop id of the synthetic terminal stop that brings an agent back to base.
pub const RETURN_TO_BASE_STOP_ID: &str = "return-to-base";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Assigned,
    Planned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    pub id: String,
    pub agent_id: String,
    pub status: RouteStatus,
    pub company_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub total_distance_meters: Option<i64>,
    pub total_duration_seconds: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopStatus {
    Planned,
    Arrived,
    Completed,
}

/// Travel into a stop from the stop before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegTravel {
    pub from: Option<LatLng>,
    pub to: Option<LatLng>,
    pub distance_meters: i64,
    pub duration_seconds: i64,
    pub polyline: Option<String>,
}

impl LegTravel {
    /// Geometry and both endpoints present.
    pub fn is_complete(&self) -> bool {
        self.polyline.as_deref().is_some_and(|p| !p.is_empty())
            && self.from.is_some_and(|p| p.is_valid())
            && self.to.is_some_and(|p| p.is_valid())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRecord {
    pub route_id: String,
    pub stop_id: String,
    pub job_id: String,
    pub position: usize,
    pub location: Option<LatLng>,
    pub service_seconds: i64,
    pub status: StopStatus,
    pub eta: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_depot: bool,
    #[serde(default)]
    pub travel: Option<LegTravel>,
}

impl StopRecord {
    /// A planned stop for `job_id`, keyed by the job id.
    pub fn planned(
        route_id: impl Into<String>,
        job_id: impl Into<String>,
        position: usize,
        location: LatLng,
        service_seconds: i64,
    ) -> Self {
        let job_id = job_id.into();
        Self {
            route_id: route_id.into(),
            stop_id: job_id.clone(),
            job_id,
            position,
            location: Some(location),
            service_seconds,
            status: StopStatus::Planned,
            eta: None,
            is_depot: false,
            travel: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecord {
    pub id: String,
    pub agent_id: String,
    pub job_id: String,
    pub route_id: String,
    pub order_index: usize,
}

impl AssignmentRecord {
    pub fn new(agent_id: &str, job_id: &str, route_id: &str, order_index: usize) -> Self {
        Self {
            id: format!("{agent_id}_{job_id}"),
            agent_id: agent_id.to_string(),
            job_id: job_id.to_string(),
            route_id: route_id.to_string(),
            order_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusUpdate {
    pub job_id: String,
    pub status: JobStatus,
    pub assigned_to: Option<String>,
}

/// Everything one planning pass writes, committed as a unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanBatch {
    pub routes: Vec<RouteRecord>,
    pub stops: Vec<StopRecord>,
    pub assignments: Vec<AssignmentRecord>,
    pub job_updates: Vec<JobStatusUpdate>,
}

impl PlanBatch {
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
            && self.stops.is_empty()
            && self.assignments.is_empty()
            && self.job_updates.is_empty()
    }
}

/// Query used to pick routes for batch enrichment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteFilter {
    pub company_id: Option<String>,
    pub updated_before: Option<DateTime<Utc>>,
    pub limit: usize,
}
