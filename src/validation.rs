//! Form validation
//!
//! Field rules live on the form models as `validator` attributes. The checks
//! here add the rules that need context: the trip a record belongs to and
//! the days already claimed by other itineraries.

use std::borrow::Cow;

use chrono::NaiveDate;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::Result;
use crate::dates;
use crate::models::{
    NewAccommodation, NewActivity, NewExpense, NewItinerary, NewTravel, RecordId, Travel,
    TravelItinerary,
};
use crate::planner;

fn field_errors(form: &impl Validate) -> ValidationErrors {
    form.validate().err().unwrap_or_else(ValidationErrors::new)
}

fn add(errors: &mut ValidationErrors, field: &'static str, code: &'static str, message: String) {
    errors.add(field, ValidationError::new(code).with_message(Cow::Owned(message)));
}

fn finish(errors: ValidationErrors) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.into())
    }
}

fn check_in_trip(errors: &mut ValidationErrors, field: &'static str, day: Option<NaiveDate>, trip: &Travel) {
    if let Some(day) = day {
        if !trip.contains(day) {
            add(
                errors,
                field,
                "outside_trip",
                format!(
                    "Date must be within the trip ({})",
                    dates::format_date_range_display(trip.start_date, trip.end_date)
                ),
            );
        }
    }
}

/// Trip form: field rules plus `end_date >= start_date`
pub fn validate_travel(form: &NewTravel) -> Result<()> {
    let mut errors = field_errors(form);
    if form.end_date < form.start_date {
        add(
            &mut errors,
            "end_date",
            "range",
            "End date must be on or after the start date".to_string(),
        );
    }
    finish(errors)
}

/// Itinerary form. The span must sit inside the trip and must not touch a
/// day already owned by another itinerary (`editing` is skipped so an
/// itinerary does not collide with itself).
pub fn validate_itinerary(
    form: &NewItinerary,
    trip: &Travel,
    itineraries: &[TravelItinerary],
    editing: Option<RecordId>,
) -> Result<()> {
    let mut errors = field_errors(form);

    if form.travel_id != trip.id {
        add(
            &mut errors,
            "travel_id",
            "mismatch",
            "Itinerary belongs to another trip".to_string(),
        );
    }

    if form.end_date < form.start_date {
        add(
            &mut errors,
            "end_date",
            "range",
            "End date must be on or after the start date".to_string(),
        );
    } else if !trip.contains(form.start_date) || !trip.contains(form.end_date) {
        add(
            &mut errors,
            "start_date",
            "outside_trip",
            format!(
                "Dates must be within the trip ({})",
                dates::format_date_range_display(trip.start_date, trip.end_date)
            ),
        );
    } else {
        let claimed = planner::claimed_dates(itineraries, editing);
        if let Some(day) = dates::days_between(form.start_date, form.end_date)
            .find(|day| claimed.contains(day))
        {
            add(
                &mut errors,
                "start_date",
                "overlap",
                format!(
                    "{} is already part of another itinerary",
                    dates::format_date_for_display(day)
                ),
            );
        }
    }

    finish(errors)
}

/// Activity form: field rules plus the date (if any) inside the trip
pub fn validate_activity(form: &NewActivity, trip: &Travel) -> Result<()> {
    let mut errors = field_errors(form);
    check_in_trip(&mut errors, "date", form.date, trip);
    finish(errors)
}

/// Expense form: positive cost plus the date (if any) inside the trip
pub fn validate_expense(form: &NewExpense, trip: &Travel) -> Result<()> {
    let mut errors = field_errors(form);
    if !form.cost.is_finite() {
        add(&mut errors, "cost", "range", "Cost must be a number".to_string());
    }
    check_in_trip(&mut errors, "date", form.date, trip);
    finish(errors)
}

/// Accommodation form: `check_out > check_in`, check-in inside the trip
pub fn validate_accommodation(form: &NewAccommodation, trip: &Travel) -> Result<()> {
    let mut errors = field_errors(form);
    if form.check_out <= form.check_in {
        add(
            &mut errors,
            "check_out",
            "range",
            "Check-out must be after check-in".to_string(),
        );
    }
    check_in_trip(&mut errors, "check_in", Some(form.check_in), trip);
    finish(errors)
}
