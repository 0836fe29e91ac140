//! Traffic-aware directions adapter (Google Directions wire format).

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::polyline::Polyline;
use crate::traits::{ProviderLeg, RouteRequest, RoutingProvider, TravelMode};

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";

#[derive(Debug, Clone)]
pub struct DirectionsConfig {
    pub base_url: String,
    /// Server key. Requests fail with [`ProviderError::MissingCredentials`] without it.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub traffic_model: String,
}

impl Default for DirectionsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 10,
            traffic_model: "best_guess".to_string(),
        }
    }
}

impl DirectionsConfig {
    /// Defaults with the key taken from `GOOGLE_MAPS_API_KEY`.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("GOOGLE_MAPS_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirectionsClient {
    config: DirectionsConfig,
    client: reqwest::Client,
}

impl DirectionsClient {
    pub fn new(config: DirectionsConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn query(&self, request: &RouteRequest, key: &str) -> Vec<(&'static str, String)> {
        let mode = match request.mode {
            TravelMode::Driving => "driving",
        };
        let mut params = vec![
            ("origin", format!("{},{}", request.origin.lat, request.origin.lng)),
            (
                "destination",
                format!("{},{}", request.destination.lat, request.destination.lng),
            ),
            ("mode", mode.to_string()),
        ];
        if let Some(departure) = request.departure {
            // The service rejects departures in the past.
            let departure = departure.max(Utc::now());
            params.push(("departure_time", departure.timestamp().to_string()));
            params.push(("traffic_model", self.config.traffic_model.clone()));
        }
        params.push(("key", key.to_string()));
        params
    }
}

#[async_trait]
impl RoutingProvider for DirectionsClient {
    async fn route(&self, request: &RouteRequest) -> Result<ProviderLeg, ProviderError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredentials)?;

        let response = self
            .client
            .get(&self.config.base_url)
            .header("Accept", "application/json")
            .query(&self.query(request, key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16().to_string(),
                message: text.chars().take(200).collect(),
            });
        }

        response.json::<DirectionsResponse>().await?.into_leg()
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: Option<String>,
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    overview_polyline: Option<EncodedPoints>,
    #[serde(default)]
    legs: Vec<DirectionsLeg>,
}

#[derive(Debug, Deserialize)]
struct EncodedPoints {
    points: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectionsLeg {
    distance: Option<ValueField>,
    duration: Option<ValueField>,
    duration_in_traffic: Option<ValueField>,
}

#[derive(Debug, Deserialize)]
struct ValueField {
    value: f64,
}

impl DirectionsResponse {
    fn into_leg(self) -> Result<ProviderLeg, ProviderError> {
        if let Some(status) = self.status.filter(|s| s != "OK") {
            return Err(ProviderError::Status {
                status,
                message: self.error_message.unwrap_or_default(),
            });
        }
        let route = self.routes.into_iter().next().ok_or(ProviderError::NoRoute)?;
        let leg = route.legs.into_iter().next().ok_or(ProviderError::NoRoute)?;

        let distance = leg
            .distance
            .ok_or_else(|| ProviderError::Malformed("leg without distance".to_string()))?;
        let duration = leg
            .duration_in_traffic
            .or(leg.duration)
            .ok_or_else(|| ProviderError::Malformed("leg without duration".to_string()))?;

        let polyline = route
            .overview_polyline
            .and_then(|p| p.points)
            .filter(|p| !p.is_empty());
        if let Some(points) = &polyline {
            Polyline::decode(points).map_err(|err| ProviderError::Malformed(err.to_string()))?;
        }

        Ok(ProviderLeg {
            distance_meters: distance.value.round() as i64,
            duration_seconds: duration.value.round() as i64,
            polyline,
        })
    }
}
