//! Trip planning service
//!
//! Wraps a [`TripRepository`] with a per-trip snapshot cache and the event
//! bus. Mutations validate their form against the cached snapshot, write
//! through the repository, drop the snapshot and publish a [`PlannerEvent`].

use std::collections::HashMap;
use std::sync::Arc;

use futures::try_join;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::ai::ActivitySuggestion;
use crate::backend::TripRepository;
use crate::calendar::PickerOptions;
use crate::events::{ChangeKind, EventBus, PlannerEvent};
use crate::models::{
    Accommodation, Activity, Expense, NewAccommodation, NewActivity, NewExpense, NewItinerary,
    NewTravel, RecordId, Travel, TravelItinerary,
};
use crate::planner::{self, BudgetSummary, DailyPlan};
use crate::validation;
use crate::{Result, TripPlannerError};

/// Everything stored for one trip, fetched together
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripSnapshot {
    pub travel: Travel,
    pub itineraries: Vec<TravelItinerary>,
    pub activities: Vec<Activity>,
    pub expenses: Vec<Expense>,
    pub accommodations: Vec<Accommodation>,
}

impl TripSnapshot {
    #[must_use]
    pub fn daily_plan(&self) -> DailyPlan {
        planner::build_daily_plan(
            &self.travel,
            &self.itineraries,
            &self.activities,
            &self.expenses,
            &self.accommodations,
        )
    }

    #[must_use]
    pub fn budget_summary(&self) -> BudgetSummary {
        planner::summarize_budget(&self.travel, &self.activities, &self.expenses, &self.accommodations)
    }

    #[must_use]
    pub fn itinerary(&self, id: RecordId) -> Option<&TravelItinerary> {
        self.itineraries.iter().find(|itinerary| itinerary.id == id)
    }

    #[must_use]
    pub fn activity(&self, id: RecordId) -> Option<&Activity> {
        self.activities.iter().find(|activity| activity.id == id)
    }

    #[must_use]
    pub fn expense(&self, id: RecordId) -> Option<&Expense> {
        self.expenses.iter().find(|expense| expense.id == id)
    }

    #[must_use]
    pub fn accommodation(&self, id: RecordId) -> Option<&Accommodation> {
        self.accommodations.iter().find(|accommodation| accommodation.id == id)
    }
}

/// Cached snapshots plus a per-trip generation bumped on every invalidation.
/// A fetch only stores its result if the generation it started under is
/// still current.
#[derive(Default)]
struct SnapshotCache {
    entries: HashMap<RecordId, Arc<TripSnapshot>>,
    generations: HashMap<RecordId, u64>,
}

impl SnapshotCache {
    fn generation(&self, travel_id: RecordId) -> u64 {
        self.generations.get(&travel_id).copied().unwrap_or_default()
    }
}

/// `id` must name a record of the trip the caller addressed
fn owned<T>(record: Option<&T>, entity: &'static str, id: RecordId) -> Result<()> {
    match record {
        Some(_) => Ok(()),
        None => Err(TripPlannerError::not_found(entity, id.to_string())),
    }
}

pub struct TripService {
    repository: Arc<dyn TripRepository>,
    events: EventBus,
    snapshots: RwLock<SnapshotCache>,
}

impl TripService {
    #[must_use]
    pub fn new(repository: Arc<dyn TripRepository>, events: EventBus) -> Self {
        Self {
            repository,
            events,
            snapshots: RwLock::new(SnapshotCache::default()),
        }
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn list_trips(&self) -> Result<Vec<Travel>> {
        self.repository.list_travels().await
    }

    /// Cached records of a trip, fetched with one concurrent read per table
    #[instrument(skip(self))]
    pub async fn trip_snapshot(&self, travel_id: RecordId) -> Result<Arc<TripSnapshot>> {
        let generation = {
            let cache = self.snapshots.read().await;
            if let Some(snapshot) = cache.entries.get(&travel_id) {
                debug!("Snapshot cache hit");
                return Ok(Arc::clone(snapshot));
            }
            cache.generation(travel_id)
        };

        let repository = &self.repository;
        let (travel, itineraries, activities, expenses, accommodations) = try_join!(
            repository.get_travel(travel_id),
            repository.list_itineraries(travel_id),
            repository.list_activities(travel_id),
            repository.list_expenses(travel_id),
            repository.list_accommodations(travel_id),
        )?;

        let snapshot = Arc::new(TripSnapshot {
            travel,
            itineraries,
            activities,
            expenses,
            accommodations,
        });
        let mut cache = self.snapshots.write().await;
        if cache.generation(travel_id) == generation {
            cache.entries.insert(travel_id, Arc::clone(&snapshot));
        } else {
            debug!("Trip changed during fetch, snapshot not cached");
        }
        Ok(snapshot)
    }

    /// Drop the cached snapshot so the next read refetches. Fetches already
    /// in flight will not store their result.
    pub async fn invalidate(&self, travel_id: RecordId) {
        let mut cache = self.snapshots.write().await;
        cache.entries.remove(&travel_id);
        *cache.generations.entry(travel_id).or_default() += 1;
    }

    async fn changed(&self, event: PlannerEvent) {
        self.invalidate(event.travel_id()).await;
        self.events.publish(event);
    }

    pub async fn daily_plan(&self, travel_id: RecordId) -> Result<DailyPlan> {
        Ok(self.trip_snapshot(travel_id).await?.daily_plan())
    }

    pub async fn budget_summary(&self, travel_id: RecordId) -> Result<BudgetSummary> {
        Ok(self.trip_snapshot(travel_id).await?.budget_summary())
    }

    /// Picker settings for choosing the dates of a new or edited itinerary
    pub async fn itinerary_picker_options(
        &self,
        travel_id: RecordId,
        editing: Option<RecordId>,
    ) -> Result<PickerOptions> {
        let snapshot = self.trip_snapshot(travel_id).await?;
        Ok(planner::itinerary_picker_options(
            &snapshot.travel,
            &snapshot.itineraries,
            editing,
        ))
    }

    /// Trip and itinerary an itinerary id refers to
    pub async fn itinerary_context(
        &self,
        itinerary_id: RecordId,
    ) -> Result<(Arc<TripSnapshot>, TravelItinerary)> {
        let itinerary = self.repository.get_itinerary(itinerary_id).await?;
        let snapshot = self.trip_snapshot(itinerary.travel_id).await?;
        Ok((snapshot, itinerary))
    }

    #[instrument(skip(self, form), fields(name = %form.name))]
    pub async fn create_trip(&self, form: NewTravel) -> Result<Travel> {
        let form = form.normalized();
        validation::validate_travel(&form)?;
        let travel = self.repository.create_travel(&form).await?;
        info!(travel_id = travel.id, "Trip created");
        self.changed(PlannerEvent::TravelChanged {
            travel_id: travel.id,
            change: ChangeKind::Created,
        })
        .await;
        Ok(travel)
    }

    #[instrument(skip(self, form), fields(travel_id = form.travel_id))]
    pub async fn create_itinerary(&self, form: NewItinerary) -> Result<TravelItinerary> {
        let snapshot = self.trip_snapshot(form.travel_id).await?;
        validation::validate_itinerary(&form, &snapshot.travel, &snapshot.itineraries, None)?;
        let itinerary = self.repository.create_itinerary(&form).await?;
        self.changed(PlannerEvent::ItineraryChanged {
            travel_id: itinerary.travel_id,
            itinerary_id: itinerary.id,
            change: ChangeKind::Created,
        })
        .await;
        Ok(itinerary)
    }

    #[instrument(skip(self, form))]
    pub async fn update_itinerary(&self, id: RecordId, form: NewItinerary) -> Result<TravelItinerary> {
        let snapshot = self.trip_snapshot(form.travel_id).await?;
        owned(snapshot.itinerary(id), "Itinerary", id)?;
        validation::validate_itinerary(&form, &snapshot.travel, &snapshot.itineraries, Some(id))?;
        let itinerary = self.repository.update_itinerary(id, &form).await?;
        self.changed(PlannerEvent::ItineraryChanged {
            travel_id: itinerary.travel_id,
            itinerary_id: id,
            change: ChangeKind::Updated,
        })
        .await;
        Ok(itinerary)
    }

    pub async fn delete_itinerary(&self, travel_id: RecordId, id: RecordId) -> Result<()> {
        owned(self.trip_snapshot(travel_id).await?.itinerary(id), "Itinerary", id)?;
        self.repository.delete_itinerary(id).await?;
        self.changed(PlannerEvent::ItineraryChanged {
            travel_id,
            itinerary_id: id,
            change: ChangeKind::Deleted,
        })
        .await;
        Ok(())
    }

    #[instrument(skip(self, form), fields(travel_id = form.travel_id))]
    pub async fn add_activity(&self, form: NewActivity) -> Result<Activity> {
        let snapshot = self.trip_snapshot(form.travel_id).await?;
        validation::validate_activity(&form, &snapshot.travel)?;
        let activity = self.repository.create_activity(&form).await?;
        self.changed(PlannerEvent::ActivityChanged {
            travel_id: activity.travel_id,
            activity_id: activity.id,
            change: ChangeKind::Created,
        })
        .await;
        Ok(activity)
    }

    #[instrument(skip(self, form))]
    pub async fn update_activity(&self, id: RecordId, form: NewActivity) -> Result<Activity> {
        let snapshot = self.trip_snapshot(form.travel_id).await?;
        owned(snapshot.activity(id), "Activity", id)?;
        validation::validate_activity(&form, &snapshot.travel)?;
        let activity = self.repository.update_activity(id, &form).await?;
        self.changed(PlannerEvent::ActivityChanged {
            travel_id: activity.travel_id,
            activity_id: id,
            change: ChangeKind::Updated,
        })
        .await;
        Ok(activity)
    }

    pub async fn delete_activity(&self, travel_id: RecordId, id: RecordId) -> Result<()> {
        owned(self.trip_snapshot(travel_id).await?.activity(id), "Activity", id)?;
        self.repository.delete_activity(id).await?;
        self.changed(PlannerEvent::ActivityChanged {
            travel_id,
            activity_id: id,
            change: ChangeKind::Deleted,
        })
        .await;
        Ok(())
    }

    /// Flip the completion flag of an activity of `travel_id`
    pub async fn toggle_activity_completed(&self, travel_id: RecordId, id: RecordId) -> Result<Activity> {
        let snapshot = self.trip_snapshot(travel_id).await?;
        let current = snapshot
            .activity(id)
            .ok_or_else(|| TripPlannerError::not_found("Activity", id.to_string()))?;
        let activity = self
            .repository
            .set_activity_completed(id, !current.completed)
            .await?;
        self.changed(PlannerEvent::ActivityChanged {
            travel_id,
            activity_id: id,
            change: ChangeKind::Updated,
        })
        .await;
        Ok(activity)
    }

    #[instrument(skip(self, form), fields(travel_id = form.travel_id))]
    pub async fn add_expense(&self, form: NewExpense) -> Result<Expense> {
        let snapshot = self.trip_snapshot(form.travel_id).await?;
        validation::validate_expense(&form, &snapshot.travel)?;
        let expense = self.repository.create_expense(&form).await?;
        self.changed(PlannerEvent::ExpenseChanged {
            travel_id: expense.travel_id,
            expense_id: expense.id,
            change: ChangeKind::Created,
        })
        .await;
        Ok(expense)
    }

    pub async fn delete_expense(&self, travel_id: RecordId, id: RecordId) -> Result<()> {
        owned(self.trip_snapshot(travel_id).await?.expense(id), "Expense", id)?;
        self.repository.delete_expense(id).await?;
        self.changed(PlannerEvent::ExpenseChanged {
            travel_id,
            expense_id: id,
            change: ChangeKind::Deleted,
        })
        .await;
        Ok(())
    }

    #[instrument(skip(self, form), fields(travel_id = form.travel_id))]
    pub async fn add_accommodation(&self, form: NewAccommodation) -> Result<Accommodation> {
        let snapshot = self.trip_snapshot(form.travel_id).await?;
        validation::validate_accommodation(&form, &snapshot.travel)?;
        let accommodation = self.repository.create_accommodation(&form).await?;
        self.changed(PlannerEvent::AccommodationChanged {
            travel_id: accommodation.travel_id,
            accommodation_id: accommodation.id,
            change: ChangeKind::Created,
        })
        .await;
        Ok(accommodation)
    }

    pub async fn delete_accommodation(&self, travel_id: RecordId, id: RecordId) -> Result<()> {
        owned(
            self.trip_snapshot(travel_id).await?.accommodation(id),
            "Accommodation",
            id,
        )?;
        self.repository.delete_accommodation(id).await?;
        self.changed(PlannerEvent::AccommodationChanged {
            travel_id,
            accommodation_id: id,
            change: ChangeKind::Deleted,
        })
        .await;
        Ok(())
    }

    /// Store AI suggestions as activities of an itinerary. Suggestions that
    /// fail validation are skipped; one event is published for the batch.
    ///
    /// When an insert fails partway the rows already stored stay, and the
    /// event for them is still published before the error is returned.
    #[instrument(skip(self, suggestions), fields(count = suggestions.len()))]
    pub async fn save_generated_activities(
        &self,
        itinerary_id: RecordId,
        suggestions: Vec<ActivitySuggestion>,
    ) -> Result<Vec<Activity>> {
        let (snapshot, itinerary) = self.itinerary_context(itinerary_id).await?;

        let forms: Vec<NewActivity> = suggestions
            .into_iter()
            .map(|suggestion| suggestion.into_new_activity(&itinerary))
            .filter(|form| match validation::validate_activity(form, &snapshot.travel) {
                Ok(()) => true,
                Err(e) => {
                    warn!(name = %form.name, error = %e, "Skipping invalid suggestion");
                    false
                }
            })
            .collect();

        let mut saved = Vec::with_capacity(forms.len());
        let mut failure = None;
        for form in &forms {
            match self.repository.create_activity(form).await {
                Ok(activity) => saved.push(activity),
                Err(e) => {
                    warn!(saved = saved.len(), error = %e, "Saving suggestions stopped");
                    failure = Some(e);
                    break;
                }
            }
        }

        if failure.is_none() || !saved.is_empty() {
            self.changed(PlannerEvent::ActivitiesGenerated {
                travel_id: itinerary.travel_id,
                itinerary_id,
                count: saved.len(),
            })
            .await;
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(saved),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryRepository;
    use crate::models::{ActivityCategory, ExpenseCategory};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// In-memory storage that can fail activity inserts after a quota and
    /// hold one activity listing until released
    #[derive(Default)]
    struct ScriptedRepository {
        inner: InMemoryRepository,
        inserts_left: Option<AtomicUsize>,
        hold_next_listing: AtomicBool,
        listing_fetched: Notify,
        release_listing: Notify,
    }

    impl ScriptedRepository {
        fn failing_after(inserts: usize) -> Self {
            Self {
                inserts_left: Some(AtomicUsize::new(inserts)),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl TripRepository for ScriptedRepository {
        async fn list_travels(&self) -> Result<Vec<Travel>> {
            self.inner.list_travels().await
        }
        async fn get_travel(&self, id: RecordId) -> Result<Travel> {
            self.inner.get_travel(id).await
        }
        async fn create_travel(&self, form: &NewTravel) -> Result<Travel> {
            self.inner.create_travel(form).await
        }
        async fn list_itineraries(&self, travel_id: RecordId) -> Result<Vec<TravelItinerary>> {
            self.inner.list_itineraries(travel_id).await
        }
        async fn get_itinerary(&self, id: RecordId) -> Result<TravelItinerary> {
            self.inner.get_itinerary(id).await
        }
        async fn create_itinerary(&self, form: &NewItinerary) -> Result<TravelItinerary> {
            self.inner.create_itinerary(form).await
        }
        async fn update_itinerary(&self, id: RecordId, form: &NewItinerary) -> Result<TravelItinerary> {
            self.inner.update_itinerary(id, form).await
        }
        async fn delete_itinerary(&self, id: RecordId) -> Result<()> {
            self.inner.delete_itinerary(id).await
        }
        async fn list_activities(&self, travel_id: RecordId) -> Result<Vec<Activity>> {
            let rows = self.inner.list_activities(travel_id).await?;
            if self.hold_next_listing.swap(false, Ordering::SeqCst) {
                self.listing_fetched.notify_one();
                self.release_listing.notified().await;
            }
            Ok(rows)
        }
        async fn create_activity(&self, form: &NewActivity) -> Result<Activity> {
            if let Some(left) = &self.inserts_left {
                if left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_err() {
                    return Err(TripPlannerError::backend(503, "insert quota exhausted"));
                }
            }
            self.inner.create_activity(form).await
        }
        async fn update_activity(&self, id: RecordId, form: &NewActivity) -> Result<Activity> {
            self.inner.update_activity(id, form).await
        }
        async fn set_activity_completed(&self, id: RecordId, completed: bool) -> Result<Activity> {
            self.inner.set_activity_completed(id, completed).await
        }
        async fn delete_activity(&self, id: RecordId) -> Result<()> {
            self.inner.delete_activity(id).await
        }
        async fn list_expenses(&self, travel_id: RecordId) -> Result<Vec<Expense>> {
            self.inner.list_expenses(travel_id).await
        }
        async fn create_expense(&self, form: &NewExpense) -> Result<Expense> {
            self.inner.create_expense(form).await
        }
        async fn delete_expense(&self, id: RecordId) -> Result<()> {
            self.inner.delete_expense(id).await
        }
        async fn list_accommodations(&self, travel_id: RecordId) -> Result<Vec<Accommodation>> {
            self.inner.list_accommodations(travel_id).await
        }
        async fn create_accommodation(&self, form: &NewAccommodation) -> Result<Accommodation> {
            self.inner.create_accommodation(form).await
        }
        async fn delete_accommodation(&self, id: RecordId) -> Result<()> {
            self.inner.delete_accommodation(id).await
        }
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn service() -> TripService {
        TripService::new(Arc::new(InMemoryRepository::new()), EventBus::new())
    }

    fn new_trip() -> NewTravel {
        NewTravel {
            name: " Japan ".into(),
            description: None,
            budget: Some(3000.0),
            currency: "jpy".into(),
            start_date: date(4, 1),
            end_date: date(4, 10),
            country_codes: vec!["jp".into()],
        }
    }

    fn itinerary_form(travel_id: RecordId, place: &str, start: NaiveDate, end: NaiveDate) -> NewItinerary {
        NewItinerary {
            travel_id,
            place_name: place.into(),
            place_id: None,
            latitude: None,
            longitude: None,
            country_code: Some("JP".into()),
            start_date: start,
            end_date: end,
            notes: None,
        }
    }

    fn activity_form(travel_id: RecordId, name: &str, day: Option<NaiveDate>, cost: f64) -> NewActivity {
        NewActivity {
            travel_id,
            itinerary_id: None,
            name: name.into(),
            description: None,
            category: ActivityCategory::Culture,
            date: day,
            start_time: None,
            duration_minutes: None,
            cost,
            latitude: None,
            longitude: None,
            address: None,
            completed: false,
        }
    }

    #[tokio::test]
    async fn test_create_trip_normalizes_and_publishes() {
        let service = service();
        let mut events = service.events().subscribe();

        let trip = service.create_trip(new_trip()).await.unwrap();
        assert_eq!(trip.name, "Japan");
        assert_eq!(trip.currency, "JPY");
        assert_eq!(trip.country_codes, vec!["JP"]);

        assert_eq!(
            events.recv().await.unwrap(),
            PlannerEvent::TravelChanged {
                travel_id: trip.id,
                change: ChangeKind::Created,
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_trip_not_stored() {
        let service = service();
        let mut form = new_trip();
        form.end_date = date(3, 1);
        let err = service.create_trip(form).await.unwrap_err();
        assert!(matches!(err, TripPlannerError::Validation { .. }));
        assert!(service.list_trips().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_daily_plan_reflects_mutations() {
        let service = service();
        let trip = service.create_trip(new_trip()).await.unwrap();

        let tokyo = service
            .create_itinerary(itinerary_form(trip.id, "Tokyo", date(4, 1), date(4, 4)))
            .await
            .unwrap();

        // warm the cache, then mutate
        assert_eq!(service.daily_plan(trip.id).await.unwrap().total_cost, 0.0);

        service
            .add_activity(activity_form(trip.id, "teamLab Planets", Some(date(4, 2)), 3800.0))
            .await
            .unwrap();
        service
            .add_expense(NewExpense {
                travel_id: trip.id,
                itinerary_id: Some(tokyo.id),
                description: "Suica top-up".into(),
                category: ExpenseCategory::Transport,
                date: Some(date(4, 2)),
                cost: 2000.0,
                currency: None,
            })
            .await
            .unwrap();

        let plan = service.daily_plan(trip.id).await.unwrap();
        let day = plan.day(date(4, 2)).unwrap();
        assert_eq!(day.place_name.as_deref(), Some("Tokyo"));
        assert_eq!(day.activity_count, 1);
        assert_eq!(day.expense_count, 1);
        assert_eq!(day.total_cost, 5800.0);
    }

    #[tokio::test]
    async fn test_overlapping_itinerary_rejected() {
        let service = service();
        let trip = service.create_trip(new_trip()).await.unwrap();
        service
            .create_itinerary(itinerary_form(trip.id, "Tokyo", date(4, 1), date(4, 4)))
            .await
            .unwrap();

        let err = service
            .create_itinerary(itinerary_form(trip.id, "Kyoto", date(4, 4), date(4, 7)))
            .await
            .unwrap_err();
        assert_eq!(err.field_errors()[0].0, "start_date");

        let options = service.itinerary_picker_options(trip.id, None).await.unwrap();
        assert!(options.disabled_dates.contains(&date(4, 4)));
        assert!(!options.disabled_dates.contains(&date(4, 5)));
    }

    #[tokio::test]
    async fn test_update_itinerary_may_keep_its_own_days() {
        let service = service();
        let trip = service.create_trip(new_trip()).await.unwrap();
        let tokyo = service
            .create_itinerary(itinerary_form(trip.id, "Tokyo", date(4, 1), date(4, 4)))
            .await
            .unwrap();

        let updated = service
            .update_itinerary(tokyo.id, itinerary_form(trip.id, "Tokyo", date(4, 2), date(4, 5)))
            .await
            .unwrap();
        assert_eq!(updated.start_date, date(4, 2));
    }

    #[tokio::test]
    async fn test_toggle_activity_completed() {
        let service = service();
        let trip = service.create_trip(new_trip()).await.unwrap();
        let activity = service
            .add_activity(activity_form(trip.id, "Senso-ji", None, 0.0))
            .await
            .unwrap();

        let toggled = service.toggle_activity_completed(trip.id, activity.id).await.unwrap();
        assert!(toggled.completed);
        let toggled = service.toggle_activity_completed(trip.id, activity.id).await.unwrap();
        assert!(!toggled.completed);
    }

    #[tokio::test]
    async fn test_budget_summary_after_delete() {
        let service = service();
        let trip = service.create_trip(new_trip()).await.unwrap();
        let stay = service
            .add_accommodation(NewAccommodation {
                travel_id: trip.id,
                itinerary_id: None,
                name: "Ryokan".into(),
                check_in: date(4, 1),
                check_out: date(4, 3),
                cost: 1000.0,
                address: None,
                latitude: None,
                longitude: None,
            })
            .await
            .unwrap();
        assert_eq!(service.budget_summary(trip.id).await.unwrap().remaining, Some(2000.0));

        service.delete_accommodation(trip.id, stay.id).await.unwrap();
        assert_eq!(service.budget_summary(trip.id).await.unwrap().remaining, Some(3000.0));
    }

    #[tokio::test]
    async fn test_save_generated_activities_skips_invalid() {
        let service = service();
        let trip = service.create_trip(new_trip()).await.unwrap();
        let kyoto = service
            .create_itinerary(itinerary_form(trip.id, "Kyoto", date(4, 5), date(4, 8)))
            .await
            .unwrap();
        let mut events = service.events().subscribe();

        let suggestion = |name: &str| ActivitySuggestion {
            name: name.into(),
            description: None,
            category: ActivityCategory::Culture,
            date: Some(date(4, 6)),
            start_time: None,
            duration_minutes: Some(90),
            cost: 500.0,
            address: None,
            latitude: None,
            longitude: None,
        };
        let mut too_long = suggestion("All day hike");
        too_long.duration_minutes = Some(5000);

        let saved = service
            .save_generated_activities(kyoto.id, vec![suggestion("Fushimi Inari"), too_long])
            .await
            .unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].itinerary_id, Some(kyoto.id));

        assert_eq!(
            events.recv().await.unwrap(),
            PlannerEvent::ActivitiesGenerated {
                travel_id: trip.id,
                itinerary_id: kyoto.id,
                count: 1,
            }
        );
    }

    fn suggestion(name: &str, day: NaiveDate) -> ActivitySuggestion {
        ActivitySuggestion {
            name: name.into(),
            description: None,
            category: ActivityCategory::Food,
            date: Some(day),
            start_time: None,
            duration_minutes: Some(60),
            cost: 1200.0,
            address: None,
            latitude: None,
            longitude: None,
        }
    }

    #[tokio::test]
    async fn test_failed_bulk_save_still_refreshes_trip() {
        let service = TripService::new(Arc::new(ScriptedRepository::failing_after(1)), EventBus::new());
        let trip = service.create_trip(new_trip()).await.unwrap();
        let osaka = service
            .create_itinerary(itinerary_form(trip.id, "Osaka", date(4, 8), date(4, 10)))
            .await
            .unwrap();
        assert!(service.trip_snapshot(trip.id).await.unwrap().activities.is_empty());
        let mut events = service.events().subscribe();

        let err = service
            .save_generated_activities(
                osaka.id,
                vec![suggestion("Kuromon market", date(4, 8)), suggestion("Dotonbori", date(4, 9))],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TripPlannerError::Backend { status: 503, .. }));

        assert_eq!(
            events.recv().await.unwrap(),
            PlannerEvent::ActivitiesGenerated {
                travel_id: trip.id,
                itinerary_id: osaka.id,
                count: 1,
            }
        );
        let snapshot = service.trip_snapshot(trip.id).await.unwrap();
        assert_eq!(snapshot.activities.len(), 1);
        assert_eq!(snapshot.activities[0].name, "Kuromon market");
    }

    #[tokio::test]
    async fn test_bulk_save_failing_first_insert_publishes_nothing() {
        let service = TripService::new(Arc::new(ScriptedRepository::failing_after(0)), EventBus::new());
        let trip = service.create_trip(new_trip()).await.unwrap();
        let osaka = service
            .create_itinerary(itinerary_form(trip.id, "Osaka", date(4, 8), date(4, 10)))
            .await
            .unwrap();
        let mut events = service.events().subscribe();

        assert!(
            service
                .save_generated_activities(osaka.id, vec![suggestion("Kuromon market", date(4, 8))])
                .await
                .is_err()
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_snapshot_fetched_across_a_mutation_is_not_cached() {
        let repository = Arc::new(ScriptedRepository::default());
        let service = Arc::new(TripService::new(repository.clone(), EventBus::new()));
        let trip = service.create_trip(new_trip()).await.unwrap();
        let activity = service
            .add_activity(activity_form(trip.id, "Senso-ji", None, 0.0))
            .await
            .unwrap();

        repository.hold_next_listing.store(true, Ordering::SeqCst);
        let reader = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.trip_snapshot(trip.id).await }
        });
        repository.listing_fetched.notified().await;

        service.delete_activity(trip.id, activity.id).await.unwrap();
        repository.release_listing.notify_one();

        let in_flight = reader.await.unwrap().unwrap();
        assert_eq!(in_flight.activities.len(), 1);
        assert!(service.trip_snapshot(trip.id).await.unwrap().activities.is_empty());
    }

    #[tokio::test]
    async fn test_update_through_other_trip_is_not_found() {
        let service = service();
        let japan = service.create_trip(new_trip()).await.unwrap();
        let korea = service
            .create_trip(NewTravel {
                name: "Korea".into(),
                currency: "krw".into(),
                country_codes: vec!["kr".into()],
                ..new_trip()
            })
            .await
            .unwrap();
        let temple = service
            .add_activity(activity_form(korea.id, "Bulguksa", Some(date(4, 3)), 6000.0))
            .await
            .unwrap();
        let busan = service
            .create_itinerary(itinerary_form(korea.id, "Busan", date(4, 1), date(4, 3)))
            .await
            .unwrap();

        let err = service
            .update_activity(temple.id, activity_form(japan.id, "Bulguksa", Some(date(4, 3)), 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, TripPlannerError::NotFound { entity: "Activity", .. }));
        let err = service
            .update_itinerary(busan.id, itinerary_form(japan.id, "Busan", date(4, 1), date(4, 3)))
            .await
            .unwrap_err();
        assert!(matches!(err, TripPlannerError::NotFound { entity: "Itinerary", .. }));

        let korea_now = service.trip_snapshot(korea.id).await.unwrap();
        assert_eq!(korea_now.activity(temple.id).unwrap().cost, 6000.0);
        assert!(korea_now.itinerary(busan.id).is_some());
        assert!(service.trip_snapshot(japan.id).await.unwrap().activities.is_empty());
    }

    #[tokio::test]
    async fn test_missing_trip_is_not_found() {
        let service = service();
        let err = service.daily_plan(404).await.unwrap_err();
        assert!(matches!(err, TripPlannerError::NotFound { .. }));
    }
}
