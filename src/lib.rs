//! dispatch-planner
//!
//! Assigns delivery jobs to mobile agents by greedy best insertion, caches
//! travel costs by origin, destination and departure bucket, and backfills
//! leg geometry on persisted routes under bounded concurrency.

pub mod cache;
pub mod config;
pub mod directions;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod haversine;
pub mod legacy;
pub mod memory;
pub mod model;
pub mod osrm;
pub mod polyline;
pub mod pool;
pub mod record;
pub mod resolver;
pub mod scheduler;
pub mod service;
pub mod traits;

pub use error::{DispatchError, Result};
pub use service::DispatchService;
