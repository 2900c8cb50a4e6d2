//! Configuration management for TripPlanner
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::TripPlannerError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure for the TripPlanner application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TripPlannerConfig {
    /// Supabase / PostgREST backend
    pub backend: BackendConfig,
    /// Place search provider
    pub places: PlacesConfig,
    /// OSRM routing service
    pub routing: RoutingConfig,
    /// Activity generation model
    pub ai: AiConfig,
    /// Response cache
    pub cache: CacheConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Web API server
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    #[serde(default)]
    pub url: String,
    /// Public anon key sent as `apikey`
    #[serde(default)]
    pub anon_key: Option<String>,
    /// User session token, falls back to the anon key
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlacesProviderKind {
    #[default]
    Google,
    Mapbox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacesConfig {
    #[serde(default)]
    pub provider: PlacesProviderKind,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_google_base_url")]
    pub google_base_url: String,
    #[serde(default = "default_mapbox_base_url")]
    pub mapbox_base_url: String,
    #[serde(default = "default_result_limit")]
    pub result_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_routing_base_url")]
    pub base_url: String,
    /// driving, walking or cycling
    #[serde(default = "default_routing_profile")]
    pub default_profile: String,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_hours: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// OpenAI compatible API root
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_ai_model")]
    pub model: String,
    #[serde(default = "default_ai_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: u32,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in hours
    #[serde(default = "default_cache_ttl")]
    pub ttl_hours: u32,
    /// Cache directory location
    #[serde(default = "default_cache_location")]
    pub location: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// OTLP/HTTP collector endpoint, export is off when unset
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Front-end bundle served for non-API paths
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

// Default value functions
fn default_timeout() -> u32 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_google_base_url() -> String {
    "https://maps.googleapis.com/maps/api/place".to_string()
}

fn default_mapbox_base_url() -> String {
    "https://api.mapbox.com/geocoding/v5/mapbox.places".to_string()
}

fn default_result_limit() -> u32 {
    5
}

fn default_routing_base_url() -> String {
    "https://router.project-osrm.org".to_string()
}

fn default_routing_profile() -> String {
    "driving".to_string()
}

fn default_ai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_ai_temperature() -> f32 {
    0.7
}

fn default_max_suggestions() -> u32 {
    8
}

fn default_cache_ttl() -> u32 {
    24
}

fn default_cache_location() -> String {
    dirs::cache_dir()
        .map(|dir| dir.join("tripplanner").to_string_lossy().into_owned())
        .unwrap_or_else(|| ".cache/tripplanner".to_string())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_static_dir() -> String {
    "dist".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: None,
            access_token: None,
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            provider: PlacesProviderKind::default(),
            api_key: None,
            google_base_url: default_google_base_url(),
            mapbox_base_url: default_mapbox_base_url(),
            result_limit: default_result_limit(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: default_routing_base_url(),
            default_profile: default_routing_profile(),
            cache_ttl_hours: default_cache_ttl(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: default_ai_base_url(),
            api_key: None,
            model: default_ai_model(),
            temperature: default_ai_temperature(),
            max_suggestions: default_max_suggestions(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_cache_ttl(),
            location: default_cache_location(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            otlp_endpoint: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl BackendConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_seconds))
    }

    /// Bearer token: the session token when signed in, else the anon key
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.access_token.as_deref().or(self.anon_key.as_deref())
    }
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.ttl_hours) * 3600)
    }
}

impl TripPlannerConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // TRIPPLANNER_BACKEND__ANON_KEY -> backend.anon_key
        builder = builder.add_source(
            Environment::with_prefix("TRIPPLANNER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: TripPlannerConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tripplanner").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.backend.timeout_seconds == 0 {
            self.backend.timeout_seconds = default_timeout();
        }
        if self.places.google_base_url.is_empty() {
            self.places.google_base_url = default_google_base_url();
        }
        if self.places.mapbox_base_url.is_empty() {
            self.places.mapbox_base_url = default_mapbox_base_url();
        }
        if self.places.result_limit == 0 {
            self.places.result_limit = default_result_limit();
        }
        if self.routing.base_url.is_empty() {
            self.routing.base_url = default_routing_base_url();
        }
        if self.routing.default_profile.is_empty() {
            self.routing.default_profile = default_routing_profile();
        }
        if self.routing.cache_ttl_hours == 0 {
            self.routing.cache_ttl_hours = default_cache_ttl();
        }
        if self.ai.base_url.is_empty() {
            self.ai.base_url = default_ai_base_url();
        }
        if self.ai.model.is_empty() {
            self.ai.model = default_ai_model();
        }
        if self.ai.max_suggestions == 0 {
            self.ai.max_suggestions = default_max_suggestions();
        }
        if self.cache.ttl_hours == 0 {
            self.cache.ttl_hours = default_cache_ttl();
        }
        if self.cache.location.is_empty() {
            self.cache.location = default_cache_location();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        if self.server.port == 0 {
            self.server.port = default_port();
        }
        self.backend.url = self.backend.url.trim_end_matches('/').to_string();
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Keys are optional, but a configured key must not be blank
    pub fn validate_api_keys(&self) -> Result<()> {
        let keys = [
            ("Backend anon key", &self.backend.anon_key),
            ("Backend access token", &self.backend.access_token),
            ("Places API key", &self.places.api_key),
            ("AI API key", &self.ai.api_key),
        ];
        for (label, key) in keys {
            if let Some(key) = key {
                if key.trim().is_empty() {
                    return Err(TripPlannerError::config(format!(
                        "{label} cannot be empty if provided. Either remove it or provide a valid key."
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }

    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.backend.timeout_seconds > 300 {
            return Err(TripPlannerError::config("Backend timeout cannot exceed 300 seconds").into());
        }

        if self.backend.max_retries > 10 {
            return Err(TripPlannerError::config("Backend max retries cannot exceed 10").into());
        }

        if self.places.result_limit > crate::places::MAX_RESULTS {
            return Err(TripPlannerError::config(format!(
                "Places result limit cannot exceed {}",
                crate::places::MAX_RESULTS
            ))
            .into());
        }

        if !(0.0..=2.0).contains(&self.ai.temperature) {
            return Err(TripPlannerError::config("AI temperature must be between 0 and 2").into());
        }

        if self.ai.max_suggestions > 30 {
            return Err(TripPlannerError::config("AI max suggestions cannot exceed 30").into());
        }

        if self.cache.ttl_hours > 168 || self.routing.cache_ttl_hours > 168 {
            return Err(TripPlannerError::config("Cache TTL cannot exceed 168 hours (1 week)").into());
        }

        Ok(())
    }

    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(TripPlannerError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(TripPlannerError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let valid_profiles = ["driving", "walking", "cycling"];
        if !valid_profiles.contains(&self.routing.default_profile.as_str()) {
            return Err(TripPlannerError::config(format!(
                "Invalid routing profile '{}'. Must be one of: {}",
                self.routing.default_profile,
                valid_profiles.join(", ")
            ))
            .into());
        }

        let urls = [
            ("Backend URL", self.backend.url.as_str()),
            ("Google Places base URL", self.places.google_base_url.as_str()),
            ("Mapbox base URL", self.places.mapbox_base_url.as_str()),
            ("Routing base URL", self.routing.base_url.as_str()),
            ("AI base URL", self.ai.base_url.as_str()),
        ];
        for (label, url) in urls {
            // An unset backend URL is reported when the backend is used
            if url.is_empty() && label == "Backend URL" {
                continue;
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(
                    TripPlannerError::config(format!("{label} must be a valid HTTP or HTTPS URL")).into(),
                );
            }
        }

        Ok(())
    }
}
