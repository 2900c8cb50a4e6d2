use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::TripRepository;
use crate::models::{
    Accommodation, Activity, Expense, NewAccommodation, NewActivity, NewExpense, NewItinerary,
    NewTravel, RecordId, Travel, TravelItinerary,
};
use crate::{Result, TripPlannerError};

#[derive(Default)]
struct Tables {
    travels: Vec<Travel>,
    itineraries: Vec<TravelItinerary>,
    activities: Vec<Activity>,
    expenses: Vec<Expense>,
    accommodations: Vec<Accommodation>,
}

/// Process-local repository with the same ordering rules as the backend
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
    next_id: AtomicI64,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_by_id<T>(rows: &mut Vec<T>, id: RecordId, row_id: impl Fn(&T) -> RecordId, entity: &'static str) -> Result<()> {
    let before = rows.len();
    rows.retain(|row| row_id(row) != id);
    if rows.len() == before {
        return Err(TripPlannerError::not_found(entity, id.to_string()));
    }
    Ok(())
}

fn itinerary_from(id: RecordId, form: &NewItinerary) -> TravelItinerary {
    TravelItinerary {
        id,
        travel_id: form.travel_id,
        place_name: form.place_name.clone(),
        place_id: form.place_id.clone(),
        latitude: form.latitude,
        longitude: form.longitude,
        country_code: form.country_code.clone(),
        start_date: form.start_date,
        end_date: form.end_date,
        notes: form.notes.clone(),
    }
}

fn activity_from(id: RecordId, form: &NewActivity) -> Activity {
    Activity {
        id,
        travel_id: form.travel_id,
        itinerary_id: form.itinerary_id,
        name: form.name.clone(),
        description: form.description.clone(),
        category: form.category,
        date: form.date,
        start_time: form.start_time,
        duration_minutes: form.duration_minutes,
        cost: form.cost,
        latitude: form.latitude,
        longitude: form.longitude,
        address: form.address.clone(),
        completed: form.completed,
    }
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_id: AtomicI64::new(1),
        }
    }

    fn next_id(&self) -> RecordId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn require_travel(&self, travel_id: RecordId) -> Result<()> {
        let tables = self.tables.read().await;
        if tables.travels.iter().any(|travel| travel.id == travel_id) {
            Ok(())
        } else {
            Err(TripPlannerError::backend(
                409,
                format!("insert or update violates foreign key constraint: travel {travel_id} does not exist"),
            ))
        }
    }
}

#[async_trait]
impl TripRepository for InMemoryRepository {
    async fn list_travels(&self) -> Result<Vec<Travel>> {
        let mut travels = self.tables.read().await.travels.clone();
        travels.sort_by_key(|travel| travel.start_date);
        Ok(travels)
    }

    async fn get_travel(&self, id: RecordId) -> Result<Travel> {
        self.tables
            .read()
            .await
            .travels
            .iter()
            .find(|travel| travel.id == id)
            .cloned()
            .ok_or_else(|| TripPlannerError::not_found("Trip", id.to_string()))
    }

    async fn create_travel(&self, form: &NewTravel) -> Result<Travel> {
        let travel = Travel {
            id: self.next_id(),
            name: form.name.clone(),
            description: form.description.clone(),
            budget: form.budget,
            currency: form.currency.clone(),
            start_date: form.start_date,
            end_date: form.end_date,
            country_codes: form.country_codes.clone(),
            created_at: Some(chrono::Utc::now()),
        };
        self.tables.write().await.travels.push(travel.clone());
        Ok(travel)
    }

    async fn list_itineraries(&self, travel_id: RecordId) -> Result<Vec<TravelItinerary>> {
        let mut rows: Vec<_> = self
            .tables
            .read()
            .await
            .itineraries
            .iter()
            .filter(|row| row.travel_id == travel_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.start_date);
        Ok(rows)
    }

    async fn get_itinerary(&self, id: RecordId) -> Result<TravelItinerary> {
        self.tables
            .read()
            .await
            .itineraries
            .iter()
            .find(|row| row.id == id)
            .cloned()
            .ok_or_else(|| TripPlannerError::not_found("Itinerary", id.to_string()))
    }

    async fn create_itinerary(&self, form: &NewItinerary) -> Result<TravelItinerary> {
        self.require_travel(form.travel_id).await?;
        let row = itinerary_from(self.next_id(), form);
        self.tables.write().await.itineraries.push(row.clone());
        Ok(row)
    }

    async fn update_itinerary(&self, id: RecordId, form: &NewItinerary) -> Result<TravelItinerary> {
        let mut tables = self.tables.write().await;
        let row = tables
            .itineraries
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| TripPlannerError::not_found("Itinerary", id.to_string()))?;
        *row = itinerary_from(id, form);
        Ok(row.clone())
    }

    async fn delete_itinerary(&self, id: RecordId) -> Result<()> {
        remove_by_id(&mut self.tables.write().await.itineraries, id, |row| row.id, "Itinerary")
    }

    async fn list_activities(&self, travel_id: RecordId) -> Result<Vec<Activity>> {
        let mut rows: Vec<_> = self
            .tables
            .read()
            .await
            .activities
            .iter()
            .filter(|row| row.travel_id == travel_id)
            .cloned()
            .collect();
        // dated before dateless, then by start time
        rows.sort_by_key(|row| (row.date.is_none(), row.date, row.start_time.is_none(), row.start_time));
        Ok(rows)
    }

    async fn create_activity(&self, form: &NewActivity) -> Result<Activity> {
        self.require_travel(form.travel_id).await?;
        let row = activity_from(self.next_id(), form);
        self.tables.write().await.activities.push(row.clone());
        Ok(row)
    }

    async fn update_activity(&self, id: RecordId, form: &NewActivity) -> Result<Activity> {
        let mut tables = self.tables.write().await;
        let row = tables
            .activities
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| TripPlannerError::not_found("Activity", id.to_string()))?;
        *row = activity_from(id, form);
        Ok(row.clone())
    }

    async fn set_activity_completed(&self, id: RecordId, completed: bool) -> Result<Activity> {
        let mut tables = self.tables.write().await;
        let row = tables
            .activities
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| TripPlannerError::not_found("Activity", id.to_string()))?;
        row.completed = completed;
        Ok(row.clone())
    }

    async fn delete_activity(&self, id: RecordId) -> Result<()> {
        remove_by_id(&mut self.tables.write().await.activities, id, |row| row.id, "Activity")
    }

    async fn list_expenses(&self, travel_id: RecordId) -> Result<Vec<Expense>> {
        let mut rows: Vec<_> = self
            .tables
            .read()
            .await
            .expenses
            .iter()
            .filter(|row| row.travel_id == travel_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.date.is_none(), row.date));
        Ok(rows)
    }

    async fn create_expense(&self, form: &NewExpense) -> Result<Expense> {
        self.require_travel(form.travel_id).await?;
        let row = Expense {
            id: self.next_id(),
            travel_id: form.travel_id,
            itinerary_id: form.itinerary_id,
            description: form.description.clone(),
            category: form.category,
            date: form.date,
            cost: form.cost,
            currency: form.currency.clone(),
        };
        self.tables.write().await.expenses.push(row.clone());
        Ok(row)
    }

    async fn delete_expense(&self, id: RecordId) -> Result<()> {
        remove_by_id(&mut self.tables.write().await.expenses, id, |row| row.id, "Expense")
    }

    async fn list_accommodations(&self, travel_id: RecordId) -> Result<Vec<Accommodation>> {
        let mut rows: Vec<_> = self
            .tables
            .read()
            .await
            .accommodations
            .iter()
            .filter(|row| row.travel_id == travel_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.check_in);
        Ok(rows)
    }

    async fn create_accommodation(&self, form: &NewAccommodation) -> Result<Accommodation> {
        self.require_travel(form.travel_id).await?;
        let row = Accommodation {
            id: self.next_id(),
            travel_id: form.travel_id,
            itinerary_id: form.itinerary_id,
            name: form.name.clone(),
            check_in: form.check_in,
            check_out: form.check_out,
            cost: form.cost,
            address: form.address.clone(),
            latitude: form.latitude,
            longitude: form.longitude,
        };
        self.tables.write().await.accommodations.push(row.clone());
        Ok(row)
    }

    async fn delete_accommodation(&self, id: RecordId) -> Result<()> {
        remove_by_id(&mut self.tables.write().await.accommodations, id, |row| row.id, "Accommodation")
    }
}
