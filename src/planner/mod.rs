//! Daily plan aggregation and budget summaries
//!
//! Everything here is a pure function of the trip records; fetching and
//! caching them is the job of [`crate::service`].

pub mod budget;
pub mod daily_plan;

pub use budget::{BudgetSummary, summarize_budget};
pub use daily_plan::{
    AccommodationNight, DailyPlan, DailyPlanItem, DayConflict, DayPlan, UnscheduledGroup,
    build_daily_plan,
};

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::calendar::{PickerMode, PickerOptions};
use crate::models::{Activity, Location, RecordId, Travel, TravelItinerary};

/// First itinerary (in slice order) whose span contains `day`
#[must_use]
pub fn itinerary_for_day(itineraries: &[TravelItinerary], day: NaiveDate) -> Option<&TravelItinerary> {
    itineraries.iter().find(|itinerary| itinerary.contains(day))
}

/// Days owned by any itinerary other than `except`
#[must_use]
pub fn claimed_dates(itineraries: &[TravelItinerary], except: Option<RecordId>) -> BTreeSet<NaiveDate> {
    itineraries
        .iter()
        .filter(|itinerary| Some(itinerary.id) != except)
        .flat_map(TravelItinerary::days)
        .collect()
}

/// Range picker bounded by the trip, with days of other itineraries blocked.
/// Past days stay selectable so finished trips can still be edited.
#[must_use]
pub fn itinerary_picker_options(
    trip: &Travel,
    itineraries: &[TravelItinerary],
    editing: Option<RecordId>,
) -> PickerOptions {
    PickerOptions {
        mode: PickerMode::Range,
        min_date: Some(trip.start_date),
        max_date: Some(trip.end_date),
        disabled_dates: claimed_dates(itineraries, editing),
        require_confirm: true,
        allow_past: true,
    }
}

/// Stops to route: the located activities of `date`, or the itinerary
/// places in trip order when no day is given
#[must_use]
pub fn route_stops(
    itineraries: &[TravelItinerary],
    activities: &[Activity],
    date: Option<NaiveDate>,
) -> Vec<Location> {
    match date {
        Some(day) => activities
            .iter()
            .filter(|activity| activity.date == Some(day))
            .filter_map(Activity::location)
            .collect(),
        None => itineraries.iter().filter_map(TravelItinerary::location).collect(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::NaiveDate;

    use crate::models::{
        Accommodation, Activity, ActivityCategory, Expense, ExpenseCategory, RecordId, Travel,
        TravelItinerary,
    };

    pub fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    pub fn trip() -> Travel {
        Travel {
            id: 1,
            name: "Italy".into(),
            description: None,
            budget: Some(1000.0),
            currency: "EUR".into(),
            start_date: date(10, 1),
            end_date: date(10, 6),
            country_codes: vec!["IT".into()],
            created_at: None,
        }
    }

    pub fn itinerary(id: RecordId, place: &str, start: NaiveDate, end: NaiveDate) -> TravelItinerary {
        TravelItinerary {
            id,
            travel_id: 1,
            place_name: place.into(),
            place_id: None,
            latitude: None,
            longitude: None,
            country_code: Some("IT".into()),
            start_date: start,
            end_date: end,
            notes: None,
        }
    }

    pub fn activity(id: RecordId, name: &str, date: Option<NaiveDate>, cost: f64) -> Activity {
        Activity {
            id,
            travel_id: 1,
            itinerary_id: None,
            name: name.into(),
            description: None,
            category: ActivityCategory::Sightseeing,
            date,
            start_time: None,
            duration_minutes: None,
            cost,
            latitude: None,
            longitude: None,
            address: None,
            completed: false,
        }
    }

    pub fn expense(id: RecordId, category: ExpenseCategory, date: Option<NaiveDate>, cost: f64) -> Expense {
        Expense {
            id,
            travel_id: 1,
            itinerary_id: None,
            description: format!("expense {id}"),
            category,
            date,
            cost,
            currency: None,
        }
    }

    pub fn stay(id: RecordId, check_in: NaiveDate, check_out: NaiveDate, cost: f64) -> Accommodation {
        Accommodation {
            id,
            travel_id: 1,
            itinerary_id: None,
            name: format!("Stay {id}"),
            check_in,
            check_out,
            cost,
            address: None,
            latitude: None,
            longitude: None,
        }
    }
}
