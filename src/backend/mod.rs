//! Data access for trip records
//!
//! [`TripRepository`] is the seam between the planner services and the
//! hosted backend. [`SupabaseRepository`] talks to PostgREST over HTTP and
//! [`InMemoryRepository`] keeps everything in process for tests and demos.

pub mod memory;
pub mod supabase;

pub use memory::InMemoryRepository;
pub use supabase::SupabaseRepository;

use async_trait::async_trait;

use crate::Result;
use crate::models::{
    Accommodation, Activity, Expense, NewAccommodation, NewActivity, NewExpense, NewItinerary,
    NewTravel, RecordId, Travel, TravelItinerary,
};

/// Backend table names
pub mod tables {
    pub const TRAVELS: &str = "travels";
    pub const ITINERARIES: &str = "travel_itineraries";
    pub const ACTIVITIES: &str = "activities";
    pub const EXPENSES: &str = "expenses";
    pub const ACCOMMODATIONS: &str = "accommodations";
}

/// Storage of trips and everything planned inside them.
///
/// Lists are ordered the way the planner displays them: trips by start
/// date, itineraries by start date, activities by date then start time,
/// expenses by date, accommodations by check-in.
#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn list_travels(&self) -> Result<Vec<Travel>>;
    async fn get_travel(&self, id: RecordId) -> Result<Travel>;
    async fn create_travel(&self, form: &NewTravel) -> Result<Travel>;

    async fn list_itineraries(&self, travel_id: RecordId) -> Result<Vec<TravelItinerary>>;
    async fn get_itinerary(&self, id: RecordId) -> Result<TravelItinerary>;
    async fn create_itinerary(&self, form: &NewItinerary) -> Result<TravelItinerary>;
    async fn update_itinerary(&self, id: RecordId, form: &NewItinerary) -> Result<TravelItinerary>;
    async fn delete_itinerary(&self, id: RecordId) -> Result<()>;

    async fn list_activities(&self, travel_id: RecordId) -> Result<Vec<Activity>>;
    async fn create_activity(&self, form: &NewActivity) -> Result<Activity>;
    async fn update_activity(&self, id: RecordId, form: &NewActivity) -> Result<Activity>;
    async fn set_activity_completed(&self, id: RecordId, completed: bool) -> Result<Activity>;
    async fn delete_activity(&self, id: RecordId) -> Result<()>;

    async fn list_expenses(&self, travel_id: RecordId) -> Result<Vec<Expense>>;
    async fn create_expense(&self, form: &NewExpense) -> Result<Expense>;
    async fn delete_expense(&self, id: RecordId) -> Result<()>;

    async fn list_accommodations(&self, travel_id: RecordId) -> Result<Vec<Accommodation>>;
    async fn create_accommodation(&self, form: &NewAccommodation) -> Result<Accommodation>;
    async fn delete_accommodation(&self, id: RecordId) -> Result<()>;
}
