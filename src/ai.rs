//! AI assisted activity suggestions
//!
//! Talks to any OpenAI compatible `chat/completions` endpoint and asks for
//! a JSON object of activities for one itinerary stop. The reply is
//! checked against the itinerary before anything reaches the planner.

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, NaiveTime};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::AiConfig;
use crate::dates;
use crate::models::{Activity, ActivityCategory, NewActivity, Travel, TravelItinerary};
use crate::{TripPlannerError, http};

/// What the model may send back for one activity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySuggestion {
    pub name: String,
    pub description: Option<String>,
    pub category: ActivityCategory,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<u32>,
    pub cost: f64,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ActivitySuggestion {
    #[must_use]
    pub fn into_new_activity(self, itinerary: &TravelItinerary) -> NewActivity {
        NewActivity {
            travel_id: itinerary.travel_id,
            itinerary_id: Some(itinerary.id),
            name: self.name,
            description: self.description,
            category: self.category,
            date: self.date,
            start_time: self.start_time,
            duration_minutes: self.duration_minutes,
            cost: self.cost,
            latitude: self.latitude,
            longitude: self.longitude,
            address: self.address,
            completed: false,
        }
    }
}

/// Loosely typed model output, narrowed into [`ActivitySuggestion`]
#[derive(Debug, Deserialize)]
struct RawSuggestion {
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    duration_minutes: Option<f64>,
    #[serde(default)]
    cost: Option<f64>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SuggestionPayload {
    #[serde(default)]
    activities: Vec<RawSuggestion>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

const SYSTEM_PROMPT: &str = "You are a travel planner. Reply with a single JSON object of the form \
{\"activities\": [{\"name\": string, \"description\": string, \"category\": one of \
sightseeing|food|culture|nature|adventure|nightlife|shopping|relaxation|transport|other, \
\"date\": \"YYYY-MM-DD\" or null, \"start_time\": \"HH:MM\" or null, \
\"duration_minutes\": number, \"cost\": number, \"address\": string, \
\"latitude\": number, \"longitude\": number}]}. No prose, no markdown.";

/// User prompt for one itinerary stop
#[must_use]
pub fn build_prompt(
    trip: &Travel,
    itinerary: &TravelItinerary,
    existing: &[Activity],
    max_suggestions: u32,
    interests: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Suggest up to {max_suggestions} activities in {place} between {start} and {end} \
         (trip \"{trip_name}\", costs in {currency}).",
        place = itinerary.place_name,
        start = dates::format_date_for_form(itinerary.start_date),
        end = dates::format_date_for_form(itinerary.end_date),
        trip_name = trip.name,
        currency = trip.currency,
    );

    if let Some(budget) = trip.budget {
        prompt.push_str(&format!(" The whole trip budget is {budget:.0} {}.", trip.currency));
    }
    if let Some(interests) = interests.map(str::trim).filter(|i| !i.is_empty()) {
        prompt.push_str(&format!(" Traveller interests: {interests}."));
    }

    let planned: Vec<&str> = existing
        .iter()
        .filter(|activity| activity.itinerary_id == Some(itinerary.id))
        .map(|activity| activity.name.as_str())
        .collect();
    if !planned.is_empty() {
        prompt.push_str(&format!(" Already planned, do not repeat: {}.", planned.join(", ")));
    }

    prompt.push_str(" Spread dated activities over the days; leave date null for flexible ideas.");
    prompt
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// Strip a Markdown code fence some models wrap JSON in
fn strip_code_fence(content: &str) -> &str {
    content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Parse the model reply. Suggestions without a name, dated outside the
/// itinerary or with a negative cost are dropped.
pub fn parse_suggestions(content: &str, itinerary: &TravelItinerary) -> Result<Vec<ActivitySuggestion>> {
    let payload: SuggestionPayload = serde_json::from_str(strip_code_fence(content))
        .with_context(|| format!("Model reply is not the expected JSON: {}", http::truncate(content, 200)))?;

    let mut suggestions = Vec::new();
    for raw in payload.activities {
        let Some(name) = raw.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) else {
            warn!("Dropping suggestion without a name");
            continue;
        };

        let cost = raw.cost.unwrap_or(0.0);
        if !cost.is_finite() || cost < 0.0 {
            warn!(%name, cost, "Dropping suggestion with negative cost");
            continue;
        }

        let date = match raw.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            None => None,
            Some(text) => match dates::parse_date_string(text) {
                Some(day) if itinerary.contains(day) => Some(day),
                _ => {
                    warn!(%name, date = text, "Dropping suggestion outside the itinerary");
                    continue;
                }
            },
        };

        let duration_minutes = raw
            .duration_minutes
            .filter(|minutes| minutes.is_finite() && *minutes >= 1.0)
            .map(|minutes| minutes.round().min(1440.0) as u32);

        let (latitude, longitude) = match (raw.latitude, raw.longitude) {
            (Some(lat), Some(lon)) if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) => {
                (Some(lat), Some(lon))
            }
            _ => (None, None),
        };

        suggestions.push(ActivitySuggestion {
            name,
            description: raw.description.filter(|d| !d.trim().is_empty()),
            category: raw
                .category
                .as_deref()
                .map(ActivityCategory::parse)
                .unwrap_or_default(),
            date,
            start_time: raw.start_time.as_deref().and_then(parse_time),
            duration_minutes,
            cost,
            address: raw.address.filter(|a| !a.trim().is_empty()),
            latitude,
            longitude,
        });
    }
    Ok(suggestions)
}

pub struct ActivityGenerator {
    client: ClientWithMiddleware,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_suggestions: u32,
}

impl ActivityGenerator {
    pub fn new(config: &AiConfig, client: ClientWithMiddleware) -> crate::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| TripPlannerError::config("AI API key is not set ([ai] api_key)"))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_suggestions: config.max_suggestions,
        })
    }

    /// Suggestions for `itinerary`, avoiding what is already planned
    #[instrument(skip(self, trip, itinerary, existing), fields(place = %itinerary.place_name))]
    pub async fn generate(
        &self,
        trip: &Travel,
        itinerary: &TravelItinerary,
        existing: &[Activity],
        interests: Option<&str>,
    ) -> Result<Vec<ActivitySuggestion>> {
        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: Some(SYSTEM_PROMPT.into()),
                },
                ChatMessage {
                    role: "user".into(),
                    content: Some(build_prompt(trip, itinerary, existing, self.max_suggestions, interests)),
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;
        let response: ChatResponse = http::check_api_response("ai", response).await?.json().await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(anyhow!("AI returned empty content"))?;

        let mut suggestions = parse_suggestions(&content, itinerary)?;
        suggestions.truncate(self.max_suggestions as usize);
        info!(count = suggestions.len(), "Generated activity suggestions");
        Ok(suggestions)
    }
}
