//! OSRM HTTP adapter for single-leg routes.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::polyline::Polyline;
use crate::traits::{ProviderLeg, RouteRequest, RoutingProvider};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn route_url(&self, request: &RouteRequest) -> String {
        format!(
            "{}/route/v1/{}/{:.6},{:.6};{:.6},{:.6}?overview=full&geometries=polyline",
            self.config.base_url,
            self.config.profile,
            request.origin.lng,
            request.origin.lat,
            request.destination.lng,
            request.destination.lat,
        )
    }
}

#[async_trait]
impl RoutingProvider for OsrmClient {
    async fn route(&self, request: &RouteRequest) -> Result<ProviderLeg, ProviderError> {
        let body = self
            .client
            .get(self.route_url(request))
            .send()
            .await?
            .error_for_status()?
            .json::<OsrmRouteResponse>()
            .await?;

        body.into_leg()
    }
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: Option<String>,
}

impl OsrmRouteResponse {
    fn into_leg(self) -> Result<ProviderLeg, ProviderError> {
        if self.code != "Ok" {
            return Err(ProviderError::Status {
                status: self.code,
                message: self.message.unwrap_or_default(),
            });
        }
        let route = self.routes.into_iter().next().ok_or(ProviderError::NoRoute)?;
        if let Some(geometry) = &route.geometry {
            Polyline::decode(geometry).map_err(|err| ProviderError::Malformed(err.to_string()))?;
        }
        Ok(ProviderLeg {
            distance_meters: route.distance.round() as i64,
            duration_seconds: route.duration.round() as i64,
            polyline: route.geometry.filter(|g| !g.is_empty()),
        })
    }
}
