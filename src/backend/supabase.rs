//! PostgREST client for the hosted Supabase project

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Response};
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{TripRepository, tables};
use crate::config::BackendConfig;
use crate::models::{
    Accommodation, Activity, Expense, NewAccommodation, NewActivity, NewExpense, NewItinerary,
    NewTravel, RecordId, Travel, TravelItinerary,
};
use crate::{Result, TripPlannerError, http, telemetry};

/// Status used for failures where no response was received
const NO_RESPONSE: u16 = 0;

#[derive(Debug, serde::Deserialize)]
struct PostgrestError {
    message: String,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

/// Inserts are not idempotent, a retried POST whose first attempt committed
/// would store the row twice
fn retries_allowed(method: &Method) -> bool {
    *method != Method::POST
}

pub struct SupabaseRepository {
    client: ClientWithMiddleware,
    insert_client: ClientWithMiddleware,
    rest_url: Url,
    anon_key: String,
    bearer: String,
}

impl SupabaseRepository {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(TripPlannerError::config(
                "Backend URL is not set. Add [backend] url to the config or set TRIPPLANNER_BACKEND__URL",
            ));
        }
        let anon_key = config
            .anon_key
            .clone()
            .ok_or_else(|| TripPlannerError::config("Backend anon key is not set"))?;
        let bearer = config.bearer_token().unwrap_or(&anon_key).to_string();

        let rest_url = Url::parse(&format!("{}/rest/v1/", config.url.trim_end_matches('/')))
            .map_err(|e| TripPlannerError::config(format!("Invalid backend URL: {e}")))?;

        let client = http::build_client(config.timeout(), config.max_retries)
            .map_err(|e| TripPlannerError::config(format!("{e:#}")))?;
        let insert_client =
            http::build_client(config.timeout(), 0).map_err(|e| TripPlannerError::config(format!("{e:#}")))?;

        Ok(Self {
            client,
            insert_client,
            rest_url,
            anon_key,
            bearer,
        })
    }

    fn table_url(&self, table: &str, filters: &[(&str, String)], order: Option<&str>) -> Result<Url> {
        let mut url = self
            .rest_url
            .join(table)
            .map_err(|e| TripPlannerError::general(format!("Invalid table URL: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "*");
            for (column, value) in filters {
                query.append_pair(column, &format!("eq.{value}"));
            }
            if let Some(order) = order {
                query.append_pair("order", order);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let client = if retries_allowed(&method) {
            &self.client
        } else {
            &self.insert_client
        };
        client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.bearer))
            .header(ACCEPT, "application/json")
            .header("Prefer", "return=representation")
    }

    fn with_body<B: Serialize>(request: RequestBuilder, body: &B) -> Result<RequestBuilder> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| TripPlannerError::general(format!("Failed to encode request body: {e}")))?;
        Ok(request.header(CONTENT_TYPE, "application/json").body(bytes))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request.send().await.map_err(|e| {
            telemetry::record_request("backend", false);
            TripPlannerError::backend(NO_RESPONSE, format!("Request failed: {e}"))
        })
    }

    #[instrument(level = "debug", skip(self, filters))]
    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        order: Option<&str>,
    ) -> Result<Vec<T>> {
        let url = self.table_url(table, filters, order)?;
        let response = self.send(self.request(Method::GET, url)).await?;
        read_rows(response).await
    }

    async fn select_one<T: DeserializeOwned>(&self, table: &str, entity: &'static str, id: RecordId) -> Result<T> {
        let rows = self.select(table, &[("id", id.to_string())], None).await?;
        first_row(rows, entity, id)
    }

    #[instrument(level = "debug", skip(self, body))]
    async fn insert<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        table: &str,
        entity: &'static str,
        body: &B,
    ) -> Result<T> {
        let url = self.table_url(table, &[], None)?;
        let request = Self::with_body(self.request(Method::POST, url), body)?;
        let rows = read_rows(self.send(request).await?).await?;
        rows.into_iter().next().ok_or_else(|| {
            TripPlannerError::backend(NO_RESPONSE, format!("Insert into {table} returned no {entity}"))
        })
    }

    #[instrument(level = "debug", skip(self, body))]
    async fn update<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        table: &str,
        entity: &'static str,
        id: RecordId,
        body: &B,
    ) -> Result<T> {
        let url = self.table_url(table, &[("id", id.to_string())], None)?;
        let request = Self::with_body(self.request(Method::PATCH, url), body)?;
        let rows = read_rows(self.send(request).await?).await?;
        first_row(rows, entity, id)
    }

    #[instrument(level = "debug", skip(self))]
    async fn delete(&self, table: &str, entity: &'static str, id: RecordId) -> Result<()> {
        let url = self.table_url(table, &[("id", id.to_string())], None)?;
        let rows: Vec<serde_json::Value> = read_rows(self.send(self.request(Method::DELETE, url)).await?).await?;
        if rows.is_empty() {
            return Err(TripPlannerError::not_found(entity, id.to_string()));
        }
        Ok(())
    }
}

async fn read_rows<T: DeserializeOwned>(response: Response) -> Result<Vec<T>> {
    let status = response.status();
    telemetry::record_request("backend", status.is_success());

    let body = response
        .text()
        .await
        .map_err(|e| TripPlannerError::backend(status.as_u16(), format!("Failed to read response: {e}")))?;

    if !status.is_success() {
        let message = error_message(&body);
        warn!(status = status.as_u16(), %message, "Backend request rejected");
        return Err(TripPlannerError::backend(status.as_u16(), message));
    }

    parse_rows(&body)
}

pub(crate) fn parse_rows<T: DeserializeOwned>(body: &str) -> Result<Vec<T>> {
    serde_json::from_str(body).map_err(|e| {
        debug!(body = http::truncate(body, 500), "Unexpected backend payload");
        TripPlannerError::general(format!("Unexpected backend payload: {e}"))
    })
}

/// Message of a PostgREST error body, or the raw body when it is not one
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<PostgrestError>(body) {
        Ok(error) => {
            let mut message = error.message;
            if let Some(details) = error.details.filter(|d| !d.is_empty()) {
                message = format!("{message} ({details})");
            }
            if let Some(hint) = error.hint.filter(|h| !h.is_empty()) {
                message = format!("{message}. {hint}");
            }
            message
        }
        Err(_) if body.trim().is_empty() => "empty response".to_string(),
        Err(_) => http::truncate(body.trim(), 200).to_string(),
    }
}

fn first_row<T>(rows: Vec<T>, entity: &'static str, id: RecordId) -> Result<T> {
    rows.into_iter()
        .next()
        .ok_or_else(|| TripPlannerError::not_found(entity, id.to_string()))
}

fn by_travel(travel_id: RecordId) -> [(&'static str, String); 1] {
    [("travel_id", travel_id.to_string())]
}

#[async_trait]
impl TripRepository for SupabaseRepository {
    async fn list_travels(&self) -> Result<Vec<Travel>> {
        self.select(tables::TRAVELS, &[], Some("start_date.asc")).await
    }

    async fn get_travel(&self, id: RecordId) -> Result<Travel> {
        self.select_one(tables::TRAVELS, "Trip", id).await
    }

    async fn create_travel(&self, form: &NewTravel) -> Result<Travel> {
        self.insert(tables::TRAVELS, "trip", form).await
    }

    async fn list_itineraries(&self, travel_id: RecordId) -> Result<Vec<TravelItinerary>> {
        self.select(tables::ITINERARIES, &by_travel(travel_id), Some("start_date.asc"))
            .await
    }

    async fn get_itinerary(&self, id: RecordId) -> Result<TravelItinerary> {
        self.select_one(tables::ITINERARIES, "Itinerary", id).await
    }

    async fn create_itinerary(&self, form: &NewItinerary) -> Result<TravelItinerary> {
        self.insert(tables::ITINERARIES, "itinerary", form).await
    }

    async fn update_itinerary(&self, id: RecordId, form: &NewItinerary) -> Result<TravelItinerary> {
        self.update(tables::ITINERARIES, "Itinerary", id, form).await
    }

    async fn delete_itinerary(&self, id: RecordId) -> Result<()> {
        self.delete(tables::ITINERARIES, "Itinerary", id).await
    }

    async fn list_activities(&self, travel_id: RecordId) -> Result<Vec<Activity>> {
        self.select(
            tables::ACTIVITIES,
            &by_travel(travel_id),
            Some("date.asc.nullslast,start_time.asc.nullslast"),
        )
        .await
    }

    async fn create_activity(&self, form: &NewActivity) -> Result<Activity> {
        self.insert(tables::ACTIVITIES, "activity", form).await
    }

    async fn update_activity(&self, id: RecordId, form: &NewActivity) -> Result<Activity> {
        self.update(tables::ACTIVITIES, "Activity", id, form).await
    }

    async fn set_activity_completed(&self, id: RecordId, completed: bool) -> Result<Activity> {
        self.update(tables::ACTIVITIES, "Activity", id, &json!({ "completed": completed }))
            .await
    }

    async fn delete_activity(&self, id: RecordId) -> Result<()> {
        self.delete(tables::ACTIVITIES, "Activity", id).await
    }

    async fn list_expenses(&self, travel_id: RecordId) -> Result<Vec<Expense>> {
        self.select(tables::EXPENSES, &by_travel(travel_id), Some("date.asc.nullslast"))
            .await
    }

    async fn create_expense(&self, form: &NewExpense) -> Result<Expense> {
        self.insert(tables::EXPENSES, "expense", form).await
    }

    async fn delete_expense(&self, id: RecordId) -> Result<()> {
        self.delete(tables::EXPENSES, "Expense", id).await
    }

    async fn list_accommodations(&self, travel_id: RecordId) -> Result<Vec<Accommodation>> {
        self.select(tables::ACCOMMODATIONS, &by_travel(travel_id), Some("check_in.asc"))
            .await
    }

    async fn create_accommodation(&self, form: &NewAccommodation) -> Result<Accommodation> {
        self.insert(tables::ACCOMMODATIONS, "accommodation", form).await
    }

    async fn delete_accommodation(&self, id: RecordId) -> Result<()> {
        self.delete(tables::ACCOMMODATIONS, "Accommodation", id).await
    }
}
