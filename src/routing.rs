use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use rand::RngExt;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use crate::cache::ResponseCache;
use crate::config::RoutingConfig;
use crate::models::Location;
use crate::{TripPlannerError, http};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RouteProfile {
    #[default]
    Driving,
    Walking,
    Cycling,
}

impl RouteProfile {
    /// Path segment of the OSRM profile
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Driving => "driving",
            Self::Walking => "walking",
            Self::Cycling => "cycling",
        }
    }
}

impl Display for RouteProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteProfile {
    type Err = TripPlannerError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "driving" | "car" => Ok(Self::Driving),
            "walking" | "foot" => Ok(Self::Walking),
            "cycling" | "bike" => Ok(Self::Cycling),
            other => Err(TripPlannerError::validation(format!(
                "Unknown routing profile '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub from: usize,
    pub to: usize,
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

/// Visiting order of a set of stops. The first stop stays first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedRoute {
    pub profile: RouteProfile,
    /// Input indices in visiting order
    pub order: Vec<usize>,
    /// Stops in visiting order
    pub stops: Vec<Location>,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub legs: Vec<RouteLeg>,
}

impl OptimizedRoute {
    fn trivial(profile: RouteProfile, stops: &[Location]) -> Self {
        Self {
            profile,
            order: (0..stops.len()).collect(),
            stops: stops.to_vec(),
            distance_meters: 0.0,
            duration_seconds: 0.0,
            legs: Vec::new(),
        }
    }

    #[must_use]
    pub fn distance_km(&self) -> f64 {
        self.distance_meters / 1000.0
    }
}

#[derive(Debug, Deserialize)]
struct TripResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    trips: Vec<Trip>,
    #[serde(default)]
    waypoints: Vec<Waypoint>,
}

#[derive(Debug, Deserialize)]
struct Trip {
    distance: f64,
    duration: f64,
    #[serde(default)]
    legs: Vec<Leg>,
}

#[derive(Debug, Deserialize)]
struct Leg {
    distance: f64,
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct Waypoint {
    waypoint_index: usize,
}

/// OSRM `trip` service client with a response cache
pub struct RouteOptimizer {
    client: ClientWithMiddleware,
    cache: ResponseCache,
    base_url: String,
    cache_ttl: Duration,
}

impl RouteOptimizer {
    #[must_use]
    pub fn new(config: &RoutingConfig, client: ClientWithMiddleware, cache: ResponseCache) -> Self {
        Self {
            client,
            cache,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache_ttl: Duration::from_secs(u64::from(config.cache_ttl_hours) * 3600),
        }
    }

    /// Best visiting order for `stops`, starting at the first one and
    /// ending anywhere
    #[instrument(skip(self, stops), fields(stops = stops.len()))]
    pub async fn optimize(&self, stops: &[Location], profile: RouteProfile) -> Result<OptimizedRoute> {
        if stops.len() < 2 {
            return Ok(OptimizedRoute::trivial(profile, stops));
        }
        if let Some(invalid) = stops.iter().find(|stop| !stop.is_valid()) {
            return Err(TripPlannerError::validation(format!(
                "Invalid coordinates for {}: {}",
                invalid.name,
                invalid.format_coordinates()
            ))
            .into());
        }

        let key = cache_key(stops, profile);
        if let Some(cached) = self.cache.get::<OptimizedRoute>(&key).await? {
            return Ok(cached);
        }

        let route = self.optimize_call(stops, profile).await?;

        let jitter: f32 = rand::rng().random_range(0.9..1.1);
        let ttl = Duration::from_secs_f32(self.cache_ttl.as_secs_f32() * jitter);
        self.cache.put(&key, route.clone(), ttl).await?;
        Ok(route)
    }

    async fn optimize_call(&self, stops: &[Location], profile: RouteProfile) -> Result<OptimizedRoute> {
        tracing::debug!("Calling the API");
        let url = trip_url(&self.base_url, stops, profile)?;
        let response = self.client.get(url).send().await?;
        let body = http::check_api_response("osrm", response).await?.text().await?;
        parse_trip(&body, stops, profile)
    }
}

fn cache_key(stops: &[Location], profile: RouteProfile) -> String {
    let points: Vec<String> = stops.iter().map(Location::to_key).collect();
    format!("route:{profile}:{}", points.join(";"))
}

fn trip_url(base_url: &str, stops: &[Location], profile: RouteProfile) -> Result<Url> {
    let coordinates: Vec<String> = stops.iter().map(Location::lon_lat).collect();
    let mut url = Url::parse(&format!(
        "{base_url}/trip/v1/{profile}/{}",
        coordinates.join(";")
    ))
    .context("Invalid routing URL")?;
    url.query_pairs_mut()
        .append_pair("source", "first")
        .append_pair("destination", "any")
        .append_pair("roundtrip", "false")
        .append_pair("overview", "false");
    Ok(url)
}

fn parse_trip(body: &str, stops: &[Location], profile: RouteProfile) -> Result<OptimizedRoute> {
    let response: TripResponse = serde_json::from_str(body).context("Failed to parse OSRM response")?;
    if response.code != "Ok" {
        return Err(TripPlannerError::api(format!(
            "OSRM returned {}: {}",
            response.code,
            response.message.unwrap_or_default()
        ))
        .into());
    }

    let trip = response
        .trips
        .into_iter()
        .next()
        .ok_or(anyhow!("No trips in response"))?;

    if response.waypoints.len() != stops.len() {
        return Err(anyhow!(
            "OSRM returned {} waypoints for {} stops",
            response.waypoints.len(),
            stops.len()
        ));
    }

    // waypoints[i].waypoint_index is the position of input i in the trip
    let mut order = vec![usize::MAX; stops.len()];
    for (input, waypoint) in response.waypoints.iter().enumerate() {
        let slot = order
            .get_mut(waypoint.waypoint_index)
            .ok_or_else(|| anyhow!("Waypoint index {} out of range", waypoint.waypoint_index))?;
        *slot = input;
    }
    if order.contains(&usize::MAX) {
        return Err(anyhow!("OSRM waypoint order is not a permutation"));
    }

    let legs = trip
        .legs
        .iter()
        .zip(order.windows(2))
        .map(|(leg, pair)| RouteLeg {
            from: pair[0],
            to: pair[1],
            distance_meters: leg.distance,
            duration_seconds: leg.duration,
        })
        .collect();

    Ok(OptimizedRoute {
        profile,
        stops: order.iter().map(|&index| stops[index].clone()).collect(),
        order,
        distance_meters: trip.distance,
        duration_seconds: trip.duration,
        legs,
    })
}
