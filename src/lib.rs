//! `TripPlanner` - travel itinerary planning
//!
//! This library provides UTC-safe calendars and date pickers, day by day trip
//! plans and budgets on top of a hosted Postgres backend, place search, route
//! optimization and AI generated activity suggestions.

pub mod ai;
pub mod api;
pub mod backend;
pub mod cache;
pub mod calendar;
pub mod config;
pub mod dates;
pub mod error;
pub mod events;
pub mod http;
pub mod models;
pub mod notifications;
pub mod places;
pub mod planner;
pub mod routing;
pub mod service;
pub mod telemetry;
pub mod validation;
pub mod web;

// Re-export core types for public API
pub use backend::{InMemoryRepository, SupabaseRepository, TripRepository};
pub use cache::ResponseCache;
pub use calendar::{DatePicker, DateRange, MonthCursor, MonthGrid, PickerMode, PickerOptions};
pub use config::TripPlannerConfig;
pub use error::TripPlannerError;
pub use events::{EventBus, PlannerEvent};
pub use models::{Accommodation, Activity, Expense, Location, Travel, TravelItinerary};
pub use planner::{BudgetSummary, DailyPlan};
pub use service::{TripService, TripSnapshot};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, TripPlannerError>;
