//! Trip records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::calendar::DateRange;
use crate::dates;

use super::{RecordId, validate_country_codes, validate_not_blank};

pub(crate) fn default_currency() -> String {
    "EUR".to_string()
}

/// A trip as stored in the `travels` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Travel {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Planned total budget, `None` when the user did not set one
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(with = "dates::serde_date")]
    pub start_date: NaiveDate,
    #[serde(with = "dates::serde_date")]
    pub end_date: NaiveDate,
    /// ISO 3166-1 alpha-2 codes of the countries visited
    #[serde(default)]
    pub country_codes: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Travel {
    #[must_use]
    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    #[must_use]
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.date_range().contains(day)
    }

    /// Number of calendar days, both ends included
    #[must_use]
    pub fn num_days(&self) -> i64 {
        self.date_range().num_days()
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let range = self.date_range();
        dates::days_between(range.start, range.end)
    }
}

/// Trip form payload, also the insert body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewTravel {
    #[validate(
        length(max = 120, message = "Trip name is too long"),
        custom(function = "validate_not_blank", message = "Trip name is required")
    )]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[validate(range(min = 0.0, message = "Budget cannot be negative"))]
    #[serde(default)]
    pub budget: Option<f64>,
    #[validate(length(equal = 3, message = "Currency must be a 3 letter code"))]
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(with = "dates::serde_date")]
    pub start_date: NaiveDate,
    #[serde(with = "dates::serde_date")]
    pub end_date: NaiveDate,
    #[validate(custom(function = "validate_country_codes"))]
    #[serde(default)]
    pub country_codes: Vec<String>,
}

impl NewTravel {
    /// Upper-cases country and currency codes and trims the name
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.currency = self.currency.trim().to_ascii_uppercase();
        self.country_codes = self
            .country_codes
            .iter()
            .map(|code| code.trim().to_ascii_uppercase())
            .collect();
        self
    }
}
