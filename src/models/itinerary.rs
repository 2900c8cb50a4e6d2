//! Itineraries: a place plus a contiguous span of days inside a trip

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::calendar::DateRange;
use crate::dates;

use super::{Location, RecordId, validate_not_blank};

/// A row of the `travel_itineraries` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelItinerary {
    pub id: RecordId,
    pub travel_id: RecordId,
    pub place_name: String,
    /// Provider id of the place (Google place id or Mapbox feature id)
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(with = "dates::serde_date")]
    pub start_date: NaiveDate,
    #[serde(with = "dates::serde_date")]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TravelItinerary {
    #[must_use]
    pub fn span(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    #[must_use]
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.span().contains(day)
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let span = self.span();
        dates::days_between(span.start, span.end)
    }

    #[must_use]
    pub fn location(&self) -> Option<Location> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Location {
                latitude,
                longitude,
                name: self.place_name.clone(),
                country: self.country_code.clone(),
            }),
            _ => None,
        }
    }
}

/// Itinerary form payload, also the insert/update body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewItinerary {
    #[serde(default)]
    pub travel_id: RecordId,
    #[validate(custom(function = "validate_not_blank", message = "Choose a place"))]
    pub place_name: String,
    #[serde(default)]
    pub place_id: Option<String>,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude out of range"))]
    #[serde(default)]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude out of range"))]
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(with = "dates::serde_date")]
    pub start_date: NaiveDate,
    #[serde(with = "dates::serde_date")]
    pub end_date: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewItinerary {
    #[must_use]
    pub fn span(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}
