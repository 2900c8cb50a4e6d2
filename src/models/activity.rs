//! Planned activities

use std::fmt::Display;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dates;

use super::{Location, RecordId, validate_not_blank};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    Sightseeing,
    Food,
    Culture,
    Nature,
    Adventure,
    Nightlife,
    Shopping,
    Relaxation,
    Transport,
    #[default]
    #[serde(other)]
    Other,
}

impl ActivityCategory {
    /// Lenient parse used for AI output and query strings
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "sightseeing" | "sights" | "landmark" => Self::Sightseeing,
            "food" | "restaurant" | "dining" => Self::Food,
            "culture" | "museum" | "history" => Self::Culture,
            "nature" | "park" | "hiking" => Self::Nature,
            "adventure" | "sport" | "sports" => Self::Adventure,
            "nightlife" | "bar" => Self::Nightlife,
            "shopping" | "market" => Self::Shopping,
            "relaxation" | "wellness" | "spa" => Self::Relaxation,
            "transport" | "transfer" => Self::Transport,
            _ => Self::Other,
        }
    }
}

impl Display for ActivityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Sightseeing => "sightseeing",
            Self::Food => "food",
            Self::Culture => "culture",
            Self::Nature => "nature",
            Self::Adventure => "adventure",
            Self::Nightlife => "nightlife",
            Self::Shopping => "shopping",
            Self::Relaxation => "relaxation",
            Self::Transport => "transport",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// A row of the `activities` table. `date` is `None` for ideas not yet
/// scheduled on a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: RecordId,
    pub travel_id: RecordId,
    #[serde(default)]
    pub itinerary_id: Option<RecordId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: ActivityCategory,
    #[serde(default, with = "dates::serde_date::option")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl Activity {
    #[must_use]
    pub fn location(&self) -> Option<Location> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Location::new(
                latitude,
                longitude,
                self.name.clone(),
            )),
            _ => None,
        }
    }

    /// Form payload carrying the same values, used for edits
    #[must_use]
    pub fn to_new(&self) -> NewActivity {
        NewActivity {
            travel_id: self.travel_id,
            itinerary_id: self.itinerary_id,
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category,
            date: self.date,
            start_time: self.start_time,
            duration_minutes: self.duration_minutes,
            cost: self.cost,
            latitude: self.latitude,
            longitude: self.longitude,
            address: self.address.clone(),
            completed: self.completed,
        }
    }
}

/// Activity form payload, also the insert/update body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewActivity {
    #[serde(default)]
    pub travel_id: RecordId,
    #[serde(default)]
    pub itinerary_id: Option<RecordId>,
    #[validate(custom(function = "validate_not_blank", message = "Activity name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: ActivityCategory,
    #[serde(default, with = "dates::serde_date::option")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 minute and 24 hours"))]
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[validate(range(min = 0.0, message = "Cost cannot be negative"))]
    #[serde(default)]
    pub cost: f64,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude out of range"))]
    #[serde(default)]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude out of range"))]
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub completed: bool,
}
