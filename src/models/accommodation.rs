//! Places to stay

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dates;

use super::{Location, RecordId, validate_not_blank};

/// A row of the `accommodations` table. The stay covers the nights from
/// `check_in` up to, not including, `check_out`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accommodation {
    pub id: RecordId,
    pub travel_id: RecordId,
    #[serde(default)]
    pub itinerary_id: Option<RecordId>,
    pub name: String,
    #[serde(with = "dates::serde_date")]
    pub check_in: NaiveDate,
    #[serde(with = "dates::serde_date")]
    pub check_out: NaiveDate,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Accommodation {
    #[must_use]
    pub fn nights(&self) -> u32 {
        dates::nights_between(self.check_in, self.check_out)
    }

    /// Night of `day` is spent here
    #[must_use]
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.check_in <= day && day < self.check_out
    }

    /// Total cost spread evenly over the nights, 0 for zero-night stays
    #[must_use]
    pub fn nightly_cost(&self) -> f64 {
        match self.nights() {
            0 => 0.0,
            nights => self.cost / f64::from(nights),
        }
    }

    #[must_use]
    pub fn location(&self) -> Option<Location> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                Some(Location::new(latitude, longitude, self.name.clone()))
            }
            _ => None,
        }
    }
}

/// Accommodation form payload, also the insert body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewAccommodation {
    #[serde(default)]
    pub travel_id: RecordId,
    #[serde(default)]
    pub itinerary_id: Option<RecordId>,
    #[validate(custom(function = "validate_not_blank", message = "Name is required"))]
    pub name: String,
    #[serde(with = "dates::serde_date")]
    pub check_in: NaiveDate,
    #[serde(with = "dates::serde_date")]
    pub check_out: NaiveDate,
    #[validate(range(min = 0.0, message = "Cost cannot be negative"))]
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stay() -> Accommodation {
        Accommodation {
            id: 1,
            travel_id: 1,
            itinerary_id: None,
            name: "Hotel du Nord".into(),
            check_in: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2025, 10, 4).unwrap(),
            cost: 300.0,
            address: None,
            latitude: None,
            longitude: None,
        }
    }

    #[test]
    fn test_nights_and_nightly_cost() {
        let stay = stay();
        assert_eq!(stay.nights(), 3);
        assert_eq!(stay.nightly_cost(), 100.0);
    }

    #[test]
    fn test_check_out_day_not_covered() {
        let stay = stay();
        assert!(stay.covers(NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()));
        assert!(stay.covers(NaiveDate::from_ymd_opt(2025, 10, 3).unwrap()));
        assert!(!stay.covers(NaiveDate::from_ymd_opt(2025, 10, 4).unwrap()));
    }
}
