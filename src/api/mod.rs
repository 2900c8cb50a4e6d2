//! JSON API consumed by the browser front-end

mod error;

pub use error::ApiError;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ai::{ActivityGenerator, ActivitySuggestion};
use crate::calendar::{DatePicker, DayCell, MonthCursor, MonthGrid};
use crate::dates;
use crate::models::{
    Accommodation, Activity, Expense, Location, NewAccommodation, NewActivity, NewExpense,
    NewItinerary, NewTravel, RecordId, Travel, TravelItinerary,
};
use crate::notifications::{SharedToasts, Toast};
use crate::places::{Place, PlaceQuery, PlaceSuggestion, PlacesProvider};
use crate::planner::{self, BudgetSummary, DailyPlan};
use crate::routing::{OptimizedRoute, RouteOptimizer, RouteProfile};
use crate::service::TripService;
use crate::TripPlannerError;

type ApiResult<T> = Result<T, ApiError>;

/// Shared handles of the web server. Third party integrations are optional
/// and answer 503 when their API key is not configured.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TripService>,
    pub places: Option<Arc<dyn PlacesProvider>>,
    pub routing: Option<Arc<RouteOptimizer>>,
    pub generator: Option<Arc<ActivityGenerator>>,
    pub default_profile: RouteProfile,
    pub toasts: SharedToasts,
}

impl AppState {
    /// Queue an error toast for a failed third party call and pass the result on
    async fn report<T>(&self, result: anyhow::Result<T>) -> ApiResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                let err = TripPlannerError::from(e);
                self.toasts.lock().await.from_error(&err);
                Err(err.into())
            }
        }
    }
}

fn configured<T: ?Sized>(handle: &Option<Arc<T>>, what: &str) -> ApiResult<Arc<T>> {
    handle
        .clone()
        .ok_or_else(|| TripPlannerError::config(format!("{what} is not configured")).into())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/trips", get(list_trips).post(create_trip))
        .route("/trips/{id}/daily-plan", get(daily_plan))
        .route("/trips/{id}/budget", get(budget))
        .route("/trips/{id}/itinerary-calendar", get(itinerary_calendar))
        .route("/trips/{id}/itineraries", post(create_itinerary))
        .route(
            "/trips/{id}/itineraries/{item_id}",
            delete(delete_itinerary).put(update_itinerary),
        )
        .route("/trips/{id}/activities", post(add_activity))
        .route("/trips/{id}/activities/{item_id}", delete(delete_activity).put(update_activity))
        .route("/trips/{id}/activities/{item_id}/toggle", post(toggle_activity))
        .route("/trips/{id}/expenses", post(add_expense))
        .route("/trips/{id}/expenses/{item_id}", delete(delete_expense))
        .route("/trips/{id}/accommodations", post(add_accommodation))
        .route("/trips/{id}/accommodations/{item_id}", delete(delete_accommodation))
        .route("/trips/{id}/route", post(optimize_route))
        .route("/itineraries/{id}/generate", post(generate_activities))
        .route("/calendar/{year}/{month0}", get(month_grid))
        .route("/places", get(search_places))
        .route("/places/{place_id}", get(place_details))
        .route("/notifications", get(list_notifications))
        .route("/notifications/{toast_id}", delete(dismiss_notification))
        .with_state(state)
}

async fn list_trips(State(state): State<AppState>) -> ApiResult<Json<Vec<Travel>>> {
    Ok(Json(state.service.list_trips().await?))
}

async fn create_trip(
    State(state): State<AppState>,
    Json(form): Json<NewTravel>,
) -> ApiResult<(StatusCode, Json<Travel>)> {
    let travel = state.service.create_trip(form).await?;
    Ok((StatusCode::CREATED, Json(travel)))
}

async fn daily_plan(State(state): State<AppState>, Path(id): Path<RecordId>) -> ApiResult<Json<DailyPlan>> {
    Ok(Json(state.service.daily_plan(id).await?))
}

async fn budget(State(state): State<AppState>, Path(id): Path<RecordId>) -> ApiResult<Json<BudgetSummary>> {
    Ok(Json(state.service.budget_summary(id).await?))
}

#[derive(Debug, Deserialize)]
struct CalendarParams {
    /// Month to show, defaults to the first trip month
    #[serde(default)]
    month: Option<String>,
    /// Itinerary being edited, its own days stay selectable
    #[serde(default)]
    editing: Option<RecordId>,
}

#[derive(Debug, Serialize)]
struct CalendarView {
    label: String,
    cursor: MonthCursor,
    cells: Vec<DayCell>,
}

/// Range picker month for choosing itinerary dates
async fn itinerary_calendar(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Query(params): Query<CalendarParams>,
) -> ApiResult<Json<CalendarView>> {
    let options = state.service.itinerary_picker_options(id, params.editing).await?;
    let first_day = options.min_date;

    let mut picker = DatePicker::with_utc_today(options);
    let month = match params.month.as_deref() {
        Some(text) => Some(
            dates::parse_date_string(&format!("{text}-01"))
                .or_else(|| dates::parse_date_string(text))
                .ok_or_else(|| TripPlannerError::validation(format!("Invalid month '{text}', expected YYYY-MM")))?,
        ),
        None => first_day,
    };
    if let Some(month) = month {
        picker.jump_to(month);
    }

    let cursor = picker.cursor();
    Ok(Json(CalendarView {
        label: cursor.label(),
        cursor,
        cells: picker.cells(),
    }))
}

async fn month_grid(Path((year, month0)): Path<(i32, u32)>) -> Json<MonthGrid> {
    Json(MonthGrid::build(year, month0))
}

async fn create_itinerary(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(mut form): Json<NewItinerary>,
) -> ApiResult<(StatusCode, Json<TravelItinerary>)> {
    form.travel_id = id;
    Ok((StatusCode::CREATED, Json(state.service.create_itinerary(form).await?)))
}

async fn update_itinerary(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(RecordId, RecordId)>,
    Json(mut form): Json<NewItinerary>,
) -> ApiResult<Json<TravelItinerary>> {
    form.travel_id = id;
    Ok(Json(state.service.update_itinerary(item_id, form).await?))
}

async fn delete_itinerary(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(RecordId, RecordId)>,
) -> ApiResult<StatusCode> {
    state.service.delete_itinerary(id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_activity(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(mut form): Json<NewActivity>,
) -> ApiResult<(StatusCode, Json<Activity>)> {
    form.travel_id = id;
    Ok((StatusCode::CREATED, Json(state.service.add_activity(form).await?)))
}

async fn update_activity(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(RecordId, RecordId)>,
    Json(mut form): Json<NewActivity>,
) -> ApiResult<Json<Activity>> {
    form.travel_id = id;
    Ok(Json(state.service.update_activity(item_id, form).await?))
}

async fn delete_activity(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(RecordId, RecordId)>,
) -> ApiResult<StatusCode> {
    state.service.delete_activity(id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_activity(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(RecordId, RecordId)>,
) -> ApiResult<Json<Activity>> {
    Ok(Json(state.service.toggle_activity_completed(id, item_id).await?))
}

async fn add_expense(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(mut form): Json<NewExpense>,
) -> ApiResult<(StatusCode, Json<Expense>)> {
    form.travel_id = id;
    Ok((StatusCode::CREATED, Json(state.service.add_expense(form).await?)))
}

async fn delete_expense(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(RecordId, RecordId)>,
) -> ApiResult<StatusCode> {
    state.service.delete_expense(id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_accommodation(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(mut form): Json<NewAccommodation>,
) -> ApiResult<(StatusCode, Json<Accommodation>)> {
    form.travel_id = id;
    Ok((StatusCode::CREATED, Json(state.service.add_accommodation(form).await?)))
}

async fn delete_accommodation(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(RecordId, RecordId)>,
) -> ApiResult<StatusCode> {
    state.service.delete_accommodation(id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
struct RouteRequest {
    #[serde(default)]
    profile: Option<RouteProfile>,
    /// Route the located activities of this day instead of the itinerary stops
    #[serde(default, with = "dates::serde_date::option")]
    date: Option<NaiveDate>,
}

async fn optimize_route(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(request): Json<RouteRequest>,
) -> ApiResult<Json<OptimizedRoute>> {
    let routing = configured(&state.routing, "Routing")?;
    let snapshot = state.service.trip_snapshot(id).await?;
    let stops = planner::route_stops(&snapshot.itineraries, &snapshot.activities, request.date);
    let profile = request.profile.unwrap_or(state.default_profile);
    let route = state.report(routing.optimize(&stops, profile).await).await?;
    Ok(Json(route))
}

#[derive(Debug, Default, Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    interests: Option<String>,
    /// Store the suggestions as activities right away
    #[serde(default)]
    save: bool,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    suggestions: Vec<ActivitySuggestion>,
    saved: Vec<Activity>,
}

async fn generate_activities(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    let generator = configured(&state.generator, "Activity generation")?;
    let (snapshot, itinerary) = state.service.itinerary_context(id).await?;
    let suggestions = generator
        .generate(
            &snapshot.travel,
            &itinerary,
            &snapshot.activities,
            request.interests.as_deref(),
        )
        .await;
    let suggestions = state.report(suggestions).await?;

    let saved = if request.save {
        state
            .service
            .save_generated_activities(id, suggestions.clone())
            .await?
    } else {
        Vec::new()
    };
    Ok(Json(GenerateResponse { suggestions, saved }))
}

#[derive(Debug, Deserialize)]
struct PlaceParams {
    input: String,
    /// Comma separated country codes
    #[serde(default)]
    countries: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    limit: Option<u32>,
}

impl From<PlaceParams> for PlaceQuery {
    fn from(params: PlaceParams) -> Self {
        Self {
            input: params.input,
            country_codes: params
                .countries
                .map(|codes| codes.split(',').map(|code| code.trim().to_string()).collect())
                .unwrap_or_default(),
            near: match (params.lat, params.lon) {
                (Some(lat), Some(lon)) => Some(Location::new(lat, lon, "bias".to_string())),
                _ => None,
            },
            limit: params.limit,
        }
    }
}

async fn search_places(
    State(state): State<AppState>,
    Query(params): Query<PlaceParams>,
) -> ApiResult<Json<Vec<PlaceSuggestion>>> {
    let places = configured(&state.places, "Place search")?;
    let suggestions = state.report(places.autocomplete(&params.into()).await).await?;
    Ok(Json(suggestions))
}

async fn place_details(
    State(state): State<AppState>,
    Path(place_id): Path<String>,
) -> ApiResult<Json<Place>> {
    let places = configured(&state.places, "Place search")?;
    Ok(Json(state.report(places.details(&place_id).await).await?))
}

/// Live toasts, expired ones dropped first
async fn list_notifications(State(state): State<AppState>) -> Json<Vec<Toast>> {
    let mut toasts = state.toasts.lock().await;
    toasts.expire(std::time::Instant::now());
    Json(toasts.iter().cloned().collect())
}

async fn dismiss_notification(State(state): State<AppState>, Path(toast_id): Path<u64>) -> StatusCode {
    if state.toasts.lock().await.dismiss(toast_id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
