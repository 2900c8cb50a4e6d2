//! Data models for the TripPlanner application
//!
//! Records mirror the backend tables one to one. Every table has a read
//! model (`Travel`, `Activity`, ...) and a form model (`NewTravel`,
//! `NewActivity`, ...) which doubles as the insert and update body.

pub mod accommodation;
pub mod activity;
pub mod expense;
pub mod itinerary;
pub mod location;
pub mod travel;

pub use accommodation::{Accommodation, NewAccommodation};
pub use activity::{Activity, ActivityCategory, NewActivity};
pub use expense::{Expense, ExpenseCategory, NewExpense};
pub use itinerary::{NewItinerary, TravelItinerary};
pub use location::Location;
pub use travel::{NewTravel, Travel};

use validator::ValidationError;

/// Primary key type of every backend table
pub type RecordId = i64;

pub(crate) fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

pub(crate) fn validate_country_codes(codes: &[String]) -> Result<(), ValidationError> {
    let invalid = codes
        .iter()
        .any(|code| code.trim().len() != 2 || !code.trim().chars().all(|c| c.is_ascii_alphabetic()));
    if invalid {
        return Err(ValidationError::new("country_code")
            .with_message("Country codes must be two letters, e.g. FR".into()));
    }
    Ok(())
}
