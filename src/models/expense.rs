//! Expenses

use std::fmt::Display;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dates;

use super::{RecordId, validate_not_blank};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Food,
    Transport,
    Accommodation,
    Activities,
    Shopping,
    Health,
    #[default]
    #[serde(other)]
    Other,
}

impl Display for ExpenseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Food => "food",
            Self::Transport => "transport",
            Self::Accommodation => "accommodation",
            Self::Activities => "activities",
            Self::Shopping => "shopping",
            Self::Health => "health",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// A row of the `expenses` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: RecordId,
    pub travel_id: RecordId,
    #[serde(default)]
    pub itinerary_id: Option<RecordId>,
    pub description: String,
    #[serde(default)]
    pub category: ExpenseCategory,
    #[serde(default, with = "dates::serde_date::option")]
    pub date: Option<NaiveDate>,
    pub cost: f64,
    /// Currency of `cost` when it differs from the trip currency
    #[serde(default)]
    pub currency: Option<String>,
}

/// Expense form payload, also the insert body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewExpense {
    #[serde(default)]
    pub travel_id: RecordId,
    #[serde(default)]
    pub itinerary_id: Option<RecordId>,
    #[validate(custom(function = "validate_not_blank", message = "Description is required"))]
    pub description: String,
    #[serde(default)]
    pub category: ExpenseCategory,
    #[serde(default, with = "dates::serde_date::option")]
    pub date: Option<NaiveDate>,
    #[validate(range(exclusive_min = 0.0, message = "Cost must be greater than 0"))]
    pub cost: f64,
    #[serde(default)]
    pub currency: Option<String>,
}
