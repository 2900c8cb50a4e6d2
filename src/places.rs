//! Place search for itinerary stops
//!
//! Two providers sit behind [`PlacesProvider`]: the Google Places web
//! service and Mapbox geocoding. Both restrict results to the trip's
//! countries when given and bias them toward a point.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::TripPlannerError;
use crate::cache::ResponseCache;
use crate::config::{PlacesConfig, PlacesProviderKind};
use crate::http;
use crate::models::Location;

/// Radius of the Google location bias
const BIAS_RADIUS_METERS: u32 = 50_000;
const MIN_INPUT_CHARS: usize = 2;
/// Upper bound on suggestions per request, whatever the caller asks for
pub const MAX_RESULTS: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceQuery {
    pub input: String,
    /// ISO 3166-1 alpha-2 codes, any case
    #[serde(default)]
    pub country_codes: Vec<String>,
    /// Bias point, usually the previous itinerary stop
    #[serde(default)]
    pub near: Option<Location>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl PlaceQuery {
    #[must_use]
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    /// Requested suggestion count, falling back to `default`, within `1..=MAX_RESULTS`
    fn effective_limit(&self, default: u32) -> u32 {
        self.limit.unwrap_or(default).clamp(1, MAX_RESULTS)
    }

    fn is_searchable(&self) -> bool {
        self.input.trim().chars().count() >= MIN_INPUT_CHARS
    }

    fn countries_lowercase(&self) -> Vec<String> {
        self.country_codes
            .iter()
            .map(|code| code.trim().to_ascii_lowercase())
            .filter(|code| code.len() == 2)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSuggestion {
    pub place_id: String,
    pub name: String,
    /// Full label, e.g. "Lyon, France"
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Distance to the bias point, when both are known
    pub distance_km: Option<f64>,
}

impl PlaceSuggestion {
    #[must_use]
    pub fn location(&self) -> Option<Location> {
        Some(Location::new(self.latitude?, self.longitude?, self.name.clone()))
    }
}

/// A resolved place with coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub place_id: String,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub country_code: Option<String>,
}

impl Place {
    #[must_use]
    pub fn location(&self) -> Location {
        Location {
            latitude: self.latitude,
            longitude: self.longitude,
            name: self.name.clone(),
            country: self.country_code.clone(),
        }
    }
}

#[async_trait]
pub trait PlacesProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Suggestions for a partial input. Inputs shorter than two characters
    /// return nothing without calling the provider.
    async fn autocomplete(&self, query: &PlaceQuery) -> Result<Vec<PlaceSuggestion>>;

    async fn details(&self, place_id: &str) -> Result<Place>;
}

/// Annotate suggestions with their distance to `near` and sort closest
/// first. Suggestions without coordinates keep their order at the end.
pub fn rank_by_distance(suggestions: &mut [PlaceSuggestion], near: &Location) {
    for suggestion in suggestions.iter_mut() {
        suggestion.distance_km = suggestion.location().map(|location| near.distance_km(&location));
    }
    suggestions.sort_by(|a, b| match (a.distance_km, b.distance_km) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Provider selected in the configuration. Resolved places stay cached for
/// `details_ttl`.
pub fn provider_from_config(
    config: &PlacesConfig,
    client: ClientWithMiddleware,
    cache: ResponseCache,
    details_ttl: Duration,
) -> Result<Arc<dyn PlacesProvider>> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| TripPlannerError::config("Places API key is not set ([places] api_key)"))?;

    Ok(match config.provider {
        PlacesProviderKind::Google => Arc::new(GooglePlaces {
            client,
            cache,
            details_ttl,
            api_key,
            base_url: config.google_base_url.trim_end_matches('/').to_string(),
            limit: config.result_limit,
        }),
        PlacesProviderKind::Mapbox => Arc::new(MapboxPlaces {
            client,
            cache,
            details_ttl,
            access_token: api_key,
            base_url: config.mapbox_base_url.trim_end_matches('/').to_string(),
            limit: config.result_limit,
        }),
    })
}

// ---------------------------------------------------------------------------
// Google Places

/// Google predictions carry no coordinates, so their order is the one
/// Google returns for the `location`/`radius` bias and
/// [`rank_by_distance`] is not applied. Coordinates arrive with
/// [`PlacesProvider::details`].
pub struct GooglePlaces {
    client: ClientWithMiddleware,
    cache: ResponseCache,
    details_ttl: Duration,
    api_key: String,
    base_url: String,
    limit: u32,
}

#[derive(Debug, Deserialize)]
struct GoogleAutocompleteResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    predictions: Vec<GooglePrediction>,
}

#[derive(Debug, Deserialize)]
struct GooglePrediction {
    place_id: String,
    description: String,
    #[serde(default)]
    structured_formatting: Option<GoogleFormatting>,
}

#[derive(Debug, Deserialize)]
struct GoogleFormatting {
    main_text: String,
}

#[derive(Debug, Deserialize)]
struct GoogleDetailsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    result: Option<GooglePlaceResult>,
}

#[derive(Debug, Deserialize)]
struct GooglePlaceResult {
    place_id: String,
    name: String,
    #[serde(default)]
    formatted_address: Option<String>,
    geometry: GoogleGeometry,
    #[serde(default)]
    address_components: Vec<GoogleAddressComponent>,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLatLng,
}

#[derive(Debug, Deserialize)]
struct GoogleLatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct GoogleAddressComponent {
    short_name: String,
    #[serde(default)]
    types: Vec<String>,
}

fn google_status(status: &str, error_message: Option<String>) -> Result<()> {
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        other => Err(TripPlannerError::api(format!(
            "Google Places returned {other}: {}",
            error_message.unwrap_or_default()
        ))
        .into()),
    }
}

pub(crate) fn parse_google_autocomplete(body: &str, limit: usize) -> Result<Vec<PlaceSuggestion>> {
    let response: GoogleAutocompleteResponse =
        serde_json::from_str(body).context("Failed to parse Google autocomplete response")?;
    google_status(&response.status, response.error_message)?;

    Ok(response
        .predictions
        .into_iter()
        .take(limit)
        .map(|prediction| PlaceSuggestion {
            name: prediction
                .structured_formatting
                .map(|formatting| formatting.main_text)
                .unwrap_or_else(|| prediction.description.clone()),
            place_id: prediction.place_id,
            description: prediction.description,
            latitude: None,
            longitude: None,
            distance_km: None,
        })
        .collect())
}

pub(crate) fn parse_google_details(body: &str) -> Result<Place> {
    let response: GoogleDetailsResponse =
        serde_json::from_str(body).context("Failed to parse Google details response")?;
    google_status(&response.status, response.error_message)?;
    let result = response
        .result
        .ok_or_else(|| anyhow!("Google details response has no result"))?;

    let country_code = result
        .address_components
        .iter()
        .find(|component| component.types.iter().any(|t| t == "country"))
        .map(|component| component.short_name.to_ascii_uppercase());

    Ok(Place {
        place_id: result.place_id,
        address: result.formatted_address.unwrap_or_else(|| result.name.clone()),
        name: result.name,
        latitude: result.geometry.location.lat,
        longitude: result.geometry.location.lng,
        country_code,
    })
}

impl GooglePlaces {
    fn autocomplete_url(&self, query: &PlaceQuery) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/autocomplete/json", self.base_url))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("input", query.input.trim());
            pairs.append_pair("key", &self.api_key);
            let countries = query.countries_lowercase();
            if !countries.is_empty() {
                let components = countries
                    .iter()
                    .map(|code| format!("country:{code}"))
                    .collect::<Vec<_>>()
                    .join("|");
                pairs.append_pair("components", &components);
            }
            if let Some(near) = &query.near {
                pairs.append_pair("location", &format!("{},{}", near.latitude, near.longitude));
                pairs.append_pair("radius", &BIAS_RADIUS_METERS.to_string());
            }
        }
        Ok(url)
    }

    fn details_url(&self, place_id: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/details/json", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("place_id", place_id)
            .append_pair("fields", "place_id,name,formatted_address,geometry,address_components")
            .append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn get_text(&self, url: Url) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let response = http::check_api_response("google-places", response).await?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl PlacesProvider for GooglePlaces {
    fn name(&self) -> &'static str {
        "google"
    }

    #[instrument(skip(self), fields(input = %query.input))]
    async fn autocomplete(&self, query: &PlaceQuery) -> Result<Vec<PlaceSuggestion>> {
        if !query.is_searchable() {
            return Ok(Vec::new());
        }
        let limit = query.effective_limit(self.limit) as usize;
        let body = self.get_text(self.autocomplete_url(query)?).await?;
        let suggestions = parse_google_autocomplete(&body, limit)?;
        debug!(count = suggestions.len(), "Google autocomplete");
        Ok(suggestions)
    }

    #[instrument(skip(self))]
    async fn details(&self, place_id: &str) -> Result<Place> {
        let key = format!("place:google:{place_id}");
        if let Some(place) = self.cache.get::<Place>(&key).await? {
            return Ok(place);
        }

        let body = self.get_text(self.details_url(place_id)?).await?;
        let place = parse_google_details(&body)?;
        self.cache.put(&key, place.clone(), self.details_ttl).await?;
        Ok(place)
    }
}

// ---------------------------------------------------------------------------
// Mapbox geocoding

pub struct MapboxPlaces {
    client: ClientWithMiddleware,
    cache: ResponseCache,
    details_ttl: Duration,
    access_token: String,
    base_url: String,
    limit: u32,
}

#[derive(Debug, Deserialize)]
struct MapboxResponse {
    #[serde(default)]
    features: Vec<MapboxFeature>,
}

#[derive(Debug, Deserialize)]
struct MapboxFeature {
    id: String,
    text: String,
    place_name: String,
    /// `[longitude, latitude]`
    center: [f64; 2],
    #[serde(default)]
    context: Vec<MapboxContext>,
    #[serde(default)]
    properties: MapboxProperties,
}

#[derive(Debug, Default, Deserialize)]
struct MapboxProperties {
    #[serde(default)]
    short_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MapboxContext {
    id: String,
    #[serde(default)]
    short_code: Option<String>,
}

impl MapboxFeature {
    fn country_code(&self) -> Option<String> {
        let code = if self.id.starts_with("country.") {
            self.properties.short_code.clone()
        } else {
            self.context
                .iter()
                .find(|context| context.id.starts_with("country."))
                .and_then(|context| context.short_code.clone())
        };
        code.map(|code| code.to_ascii_uppercase())
    }

    fn into_place(self) -> Place {
        Place {
            country_code: self.country_code(),
            place_id: self.id,
            name: self.text,
            address: self.place_name,
            latitude: self.center[1],
            longitude: self.center[0],
        }
    }
}

/// Features of a geocoding response as resolved places
pub(crate) fn parse_mapbox_features(body: &str) -> Result<Vec<Place>> {
    let response: MapboxResponse =
        serde_json::from_str(body).context("Failed to parse Mapbox geocoding response")?;
    Ok(response
        .features
        .into_iter()
        .map(MapboxFeature::into_place)
        .collect())
}

impl MapboxPlaces {
    fn geocode_url(&self, query: &PlaceQuery, limit: u32) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/{}.json",
            self.base_url,
            urlencoding::encode(query.input.trim())
        ))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("access_token", &self.access_token);
            pairs.append_pair("autocomplete", "true");
            pairs.append_pair("limit", &limit.to_string());
            let countries = query.countries_lowercase();
            if !countries.is_empty() {
                pairs.append_pair("country", &countries.join(","));
            }
            if let Some(near) = &query.near {
                pairs.append_pair("proximity", &format!("{},{}", near.longitude, near.latitude));
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl PlacesProvider for MapboxPlaces {
    fn name(&self) -> &'static str {
        "mapbox"
    }

    #[instrument(skip(self), fields(input = %query.input))]
    async fn autocomplete(&self, query: &PlaceQuery) -> Result<Vec<PlaceSuggestion>> {
        if !query.is_searchable() {
            return Ok(Vec::new());
        }
        let limit = query.effective_limit(self.limit);
        let response = self.client.get(self.geocode_url(query, limit)?).send().await?;
        let body = http::check_api_response("mapbox", response).await?.text().await?;
        let places = parse_mapbox_features(&body)?;

        // Geocoding results already carry coordinates, keep them for details
        let mut suggestions = Vec::with_capacity(places.len());
        for place in places {
            suggestions.push(PlaceSuggestion {
                place_id: place.place_id.clone(),
                name: place.name.clone(),
                description: place.address.clone(),
                latitude: Some(place.latitude),
                longitude: Some(place.longitude),
                distance_km: None,
            });
            let key = format!("place:mapbox:{}", place.place_id);
            self.cache.put(&key, place, self.details_ttl).await?;
        }

        if let Some(near) = &query.near {
            rank_by_distance(&mut suggestions, near);
        }
        debug!(count = suggestions.len(), "Mapbox autocomplete");
        Ok(suggestions)
    }

    #[instrument(skip(self))]
    async fn details(&self, place_id: &str) -> Result<Place> {
        let key = format!("place:mapbox:{place_id}");
        self.cache
            .get::<Place>(&key)
            .await?
            .ok_or_else(|| TripPlannerError::not_found("Place", place_id).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlacesConfig;
    use rstest::rstest;

    const GOOGLE_AUTOCOMPLETE: &str = r#"{
        "predictions": [
            {
                "description": "Lyon, France",
                "place_id": "ChIJl4foalHq9EcR8CG75CqrCAQ",
                "structured_formatting": {"main_text": "Lyon", "secondary_text": "France"},
                "types": ["locality", "political"]
            },
            {
                "description": "Lyons, CO, USA",
                "place_id": "ChIJ0ZrQK8xoa4cRv8ifd6n4RmU",
                "types": ["locality", "political"]
            }
        ],
        "status": "OK"
    }"#;

    const GOOGLE_DETAILS: &str = r#"{
        "result": {
            "place_id": "ChIJl4foalHq9EcR8CG75CqrCAQ",
            "name": "Lyon",
            "formatted_address": "Lyon, France",
            "geometry": {"location": {"lat": 45.764043, "lng": 4.835659}},
            "address_components": [
                {"long_name": "Lyon", "short_name": "Lyon", "types": ["locality", "political"]},
                {"long_name": "France", "short_name": "FR", "types": ["country", "political"]}
            ]
        },
        "status": "OK"
    }"#;

    const MAPBOX_GEOCODE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "id": "place.9397217726",
                "text": "Porto",
                "place_name": "Porto, Portugal",
                "center": [-8.611, 41.1496],
                "context": [
                    {"id": "region.123", "text": "Porto"},
                    {"id": "country.8743", "short_code": "pt", "text": "Portugal"}
                ]
            },
            {
                "id": "country.8743",
                "text": "Portugal",
                "place_name": "Portugal",
                "center": [-8.0, 39.6],
                "properties": {"short_code": "pt"}
            }
        ]
    }"#;

    fn suggestion(name: &str, coordinates: Option<(f64, f64)>) -> PlaceSuggestion {
        PlaceSuggestion {
            place_id: name.to_lowercase(),
            name: name.to_string(),
            description: name.to_string(),
            latitude: coordinates.map(|c| c.0),
            longitude: coordinates.map(|c| c.1),
            distance_km: None,
        }
    }

    #[test]
    fn test_parse_google_autocomplete() {
        let suggestions = parse_google_autocomplete(GOOGLE_AUTOCOMPLETE, 5).unwrap();
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].name, "Lyon");
        assert_eq!(suggestions[1].name, "Lyons, CO, USA");

        assert_eq!(parse_google_autocomplete(GOOGLE_AUTOCOMPLETE, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_google_error_status() {
        let body = r#"{"predictions": [], "status": "REQUEST_DENIED", "error_message": "The provided API key is invalid."}"#;
        let err = parse_google_autocomplete(body, 5).unwrap_err();
        assert!(err.to_string().contains("REQUEST_DENIED"));

        let empty = r#"{"predictions": [], "status": "ZERO_RESULTS"}"#;
        assert!(parse_google_autocomplete(empty, 5).unwrap().is_empty());
    }

    #[test]
    fn test_parse_google_details() {
        let place = parse_google_details(GOOGLE_DETAILS).unwrap();
        assert_eq!(place.name, "Lyon");
        assert_eq!(place.country_code.as_deref(), Some("FR"));
        assert!((place.latitude - 45.764043).abs() < 1e-9);
    }

    #[test]
    fn test_parse_mapbox_features() {
        let places = parse_mapbox_features(MAPBOX_GEOCODE).unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].name, "Porto");
        assert_eq!(places[0].longitude, -8.611);
        assert_eq!(places[0].latitude, 41.1496);
        assert_eq!(places[0].country_code.as_deref(), Some("PT"));
        assert_eq!(places[1].country_code.as_deref(), Some("PT"));
    }

    #[test]
    fn test_rank_by_distance() {
        let paris = Location::new(48.8566, 2.3522, "Paris".into());
        let mut suggestions = vec![
            suggestion("Marseille", Some((43.2965, 5.3698))),
            suggestion("Somewhere", None),
            suggestion("Reims", Some((49.2583, 4.0317))),
        ];
        rank_by_distance(&mut suggestions, &paris);

        let names: Vec<_> = suggestions.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Reims", "Marseille", "Somewhere"]);
        assert!(suggestions[0].distance_km.unwrap() < 150.0);
        assert!(suggestions[2].distance_km.is_none());
    }

    #[test]
    fn test_short_input_not_searchable() {
        assert!(!PlaceQuery::new(" a ").is_searchable());
        assert!(PlaceQuery::new("Ly").is_searchable());
    }

    #[rstest]
    #[case(None, 5, 5)]
    #[case(Some(3), 5, 3)]
    #[case(Some(500), 5, MAX_RESULTS)]
    #[case(Some(0), 5, 1)]
    #[case(None, 20, MAX_RESULTS)]
    fn test_effective_limit(#[case] requested: Option<u32>, #[case] default: u32, #[case] expected: u32) {
        let query = PlaceQuery {
            limit: requested,
            ..PlaceQuery::new("Lyon")
        };
        assert_eq!(query.effective_limit(default), expected);
    }

    /// Mapbox provider backed by a local server answering every request with `body`
    async fn local_mapbox(
        body: &'static str,
        details_ttl: Duration,
    ) -> (Arc<dyn PlacesProvider>, tempfile::TempDir) {
        let app = axum::Router::new().fallback(move || async move { body });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let config = PlacesConfig {
            provider: PlacesProviderKind::Mapbox,
            api_key: Some("token".into()),
            mapbox_base_url: format!("http://{addr}"),
            ..PlacesConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::open(dir.path()).unwrap();
        let client = http::build_client(Duration::from_secs(5), 0).unwrap();
        let provider = provider_from_config(&config, client, cache, details_ttl).unwrap();
        (provider, dir)
    }

    #[tokio::test]
    async fn test_mapbox_details_cached_for_configured_ttl() {
        let (provider, _dir) = local_mapbox(MAPBOX_GEOCODE, Duration::from_secs(3600)).await;
        let suggestions = provider.autocomplete(&PlaceQuery::new("Porto")).await.unwrap();
        let place = provider.details(&suggestions[0].place_id).await.unwrap();
        assert_eq!(place.name, "Porto");

        let (provider, _dir) = local_mapbox(MAPBOX_GEOCODE, Duration::ZERO).await;
        let suggestions = provider.autocomplete(&PlaceQuery::new("Porto")).await.unwrap();
        let err = provider.details(&suggestions[0].place_id).await.unwrap_err();
        assert!(matches!(
            TripPlannerError::from(err),
            TripPlannerError::NotFound { entity: "Place", .. }
        ));
    }

    #[test]
    fn test_country_codes_lowercased_and_filtered() {
        let query = PlaceQuery {
            country_codes: vec!["FR".into(), " it ".into(), "XYZ".into()],
            ..PlaceQuery::new("Nice")
        };
        assert_eq!(query.countries_lowercase(), vec!["fr", "it"]);
    }
}
