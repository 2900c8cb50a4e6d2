use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use tripplanner::ai::ActivityGenerator;
use tripplanner::api::AppState;
use tripplanner::calendar::{self, DatePicker, PickerOptions};
use tripplanner::models::RecordId;
use tripplanner::notifications::{self, ToastQueue};
use tripplanner::places::{self, PlaceQuery};
use tripplanner::routing::{RouteOptimizer, RouteProfile};
use tripplanner::{
    EventBus, InMemoryRepository, ResponseCache, SupabaseRepository, TripPlannerConfig,
    TripRepository, TripService, dates, http, planner, telemetry, web,
};

/// tripplanner - plan trips day by day
#[derive(Parser)]
#[command(name = "tripplanner", version)]
#[command(about = "Travel itinerary planning with calendars, budgets, places and routes", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a calendar month, optionally as the itinerary picker of a trip
    Calendar {
        /// Month as YYYY-MM, defaults to the current month
        #[arg(long)]
        month: Option<String>,
        /// Block the days already planned in this trip
        #[arg(long)]
        trip: Option<RecordId>,
    },
    /// List all trips
    Trips,
    /// Day by day plan of a trip
    Plan { trip: RecordId },
    /// Spend of a trip against its budget
    Budget { trip: RecordId },
    /// Search places by name
    Places {
        input: String,
        /// Comma separated ISO country codes
        #[arg(long)]
        countries: Option<String>,
    },
    /// Optimize the visiting order of a trip's itinerary places or of one day's activities
    Route {
        trip: RecordId,
        /// Route the activities of this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// driving, walking or cycling
        #[arg(long)]
        profile: Option<String>,
    },
    /// Suggest activities for an itinerary
    Generate {
        itinerary: RecordId,
        /// Free text interests, e.g. "museums, street food"
        #[arg(long)]
        interests: Option<String>,
        /// Store the suggestions as activities
        #[arg(long)]
        save: bool,
    },
    /// Start the HTTP server
    Serve {
        /// Server port (overrides config file)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = TripPlannerConfig::load_from_path(cli.config.clone())?;
    let _telemetry = telemetry::init(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Calendar { month, trip } => calendar_command(&config, month, trip, cli.json).await,
        Commands::Trips => {
            let trips = trip_service(&config)?.list_trips().await?;
            if cli.json {
                return print_json(&trips);
            }
            for trip in trips {
                println!(
                    "{:>4}  {:<30} {}",
                    trip.id,
                    trip.name,
                    dates::format_date_range_display(trip.start_date, trip.end_date)
                );
            }
            Ok(())
        }
        Commands::Plan { trip } => plan_command(&config, trip, cli.json).await,
        Commands::Budget { trip } => budget_command(&config, trip, cli.json).await,
        Commands::Places { input, countries } => {
            places_command(&config, input, countries, cli.json).await
        }
        Commands::Route { trip, date, profile } => {
            route_command(&config, trip, date, profile, cli.json).await
        }
        Commands::Generate {
            itinerary,
            interests,
            save,
        } => generate_command(&config, itinerary, interests, save, cli.json).await,
        Commands::Serve { port } => serve_command(config, port).await,
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Hosted backend when configured, otherwise an empty in-process store
fn repository(config: &TripPlannerConfig) -> Result<Arc<dyn TripRepository>> {
    if config.backend.url.is_empty() {
        warn!("No backend URL configured, using an in-memory store");
        return Ok(Arc::new(InMemoryRepository::new()));
    }
    Ok(Arc::new(SupabaseRepository::new(&config.backend)?))
}

fn trip_service(config: &TripPlannerConfig) -> Result<TripService> {
    Ok(TripService::new(repository(config)?, EventBus::new()))
}

fn default_profile(config: &TripPlannerConfig) -> RouteProfile {
    config
        .routing
        .default_profile
        .parse()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to the driving profile");
            RouteProfile::Driving
        })
}

fn parse_day(text: &str) -> Result<chrono::NaiveDate> {
    dates::parse_date_string(text).ok_or_else(|| anyhow!("Invalid date '{text}', expected YYYY-MM-DD"))
}

/// Clients of the third party integrations. Missing API keys disable the
/// integration instead of failing startup.
fn build_state(config: &TripPlannerConfig) -> Result<AppState> {
    let cache = ResponseCache::open(&config.cache.location)
        .with_context(|| format!("Failed to open cache at {}", config.cache.location))?;
    let client = http::build_client(config.backend.timeout(), config.backend.max_retries)?;

    let places = match places::provider_from_config(
        &config.places,
        client.clone(),
        cache.clone(),
        config.cache.ttl(),
    ) {
        Ok(provider) => Some(provider),
        Err(e) => {
            info!("Place search disabled: {e}");
            None
        }
    };
    let generator = match ActivityGenerator::new(&config.ai, client.clone()) {
        Ok(generator) => Some(Arc::new(generator)),
        Err(e) => {
            info!("Activity generation disabled: {e}");
            None
        }
    };
    let routing = Some(Arc::new(RouteOptimizer::new(&config.routing, client, cache)));

    Ok(AppState {
        service: Arc::new(trip_service(config)?),
        places,
        routing,
        generator,
        default_profile: default_profile(config),
        toasts: Arc::new(tokio::sync::Mutex::new(ToastQueue::default())),
    })
}

async fn calendar_command(
    config: &TripPlannerConfig,
    month: Option<String>,
    trip: Option<RecordId>,
    json: bool,
) -> Result<()> {
    let options = match trip {
        Some(trip) => trip_service(config)?.itinerary_picker_options(trip, None).await?,
        None => PickerOptions::default(),
    };
    let first_trip_day = options.min_date;

    let mut picker = DatePicker::with_utc_today(options);
    let shown = match month {
        Some(text) => Some(parse_day(&format!("{text}-01"))?),
        None => first_trip_day,
    };
    if let Some(day) = shown {
        picker.jump_to(day);
    }

    if json {
        return print_json(&picker.cells());
    }
    print!("{}", calendar::render_text(&picker));
    Ok(())
}

async fn plan_command(config: &TripPlannerConfig, trip: RecordId, json: bool) -> Result<()> {
    let plan = trip_service(config)?.daily_plan(trip).await?;
    if json {
        return print_json(&plan);
    }

    for day in &plan.days {
        println!(
            "Day {} - {} - {}",
            day.day_number,
            dates::format_date_for_display(day.date),
            day.place_name.as_deref().unwrap_or("unplanned")
        );
        for item in &day.items {
            println!("    {:<40} {:>8.2}", item.title(), item.cost());
        }
        if let Some(night) = &day.accommodation {
            println!("    night at {} ({:.2})", night.name, night.nightly_cost);
        }
    }
    for conflict in &plan.conflicts {
        println!(
            "! {} is claimed by itineraries {:?}",
            dates::format_date_for_form(conflict.date),
            conflict.itinerary_ids
        );
    }
    if plan.unscheduled_count() > 0 {
        println!("{} items without a date", plan.unscheduled_count());
    }
    println!("Total {:.2}", plan.total_cost);
    Ok(())
}

async fn budget_command(config: &TripPlannerConfig, trip: RecordId, json: bool) -> Result<()> {
    let summary = trip_service(config)?.budget_summary(trip).await?;
    if json {
        return print_json(&summary);
    }

    println!("{:<16} {:>10.2} {}", "activities", summary.activities_total, summary.currency);
    println!("{:<16} {:>10.2} {}", "stays", summary.accommodation_total, summary.currency);
    println!("{:<16} {:>10.2} {}", "expenses", summary.expenses_total, summary.currency);
    for (category, amount) in &summary.by_category {
        println!("  {category:<14} {amount:>10.2} {}", summary.currency);
    }
    println!("{:<16} {:>10.2} {}", "spent", summary.total_spent, summary.currency);
    if let (Some(budget), Some(remaining)) = (summary.budget, summary.remaining) {
        println!("{:<16} {budget:>10.2} {}", "budget", summary.currency);
        println!("{:<16} {remaining:>10.2} {}", "remaining", summary.currency);
    }
    if summary.over_budget {
        println!("Over budget!");
    }
    Ok(())
}

async fn places_command(
    config: &TripPlannerConfig,
    input: String,
    countries: Option<String>,
    json: bool,
) -> Result<()> {
    let state = build_state(config)?;
    let provider = state
        .places
        .ok_or_else(|| anyhow!("Place search needs [places] api_key"))?;

    let mut query = PlaceQuery::new(input);
    if let Some(countries) = countries {
        query.country_codes = countries.split(',').map(|code| code.trim().to_string()).collect();
    }
    let suggestions = provider.autocomplete(&query).await?;
    if json {
        return print_json(&suggestions);
    }
    for suggestion in suggestions {
        println!("{:<30} {}", suggestion.place_id, suggestion.description);
    }
    Ok(())
}

async fn route_command(
    config: &TripPlannerConfig,
    trip: RecordId,
    date: Option<String>,
    profile: Option<String>,
    json: bool,
) -> Result<()> {
    let state = build_state(config)?;
    let profile = match profile {
        Some(text) => text.parse::<RouteProfile>()?,
        None => state.default_profile,
    };
    let date = date.as_deref().map(parse_day).transpose()?;

    let snapshot = state.service.trip_snapshot(trip).await?;
    let stops = planner::route_stops(&snapshot.itineraries, &snapshot.activities, date);
    let routing = state
        .routing
        .ok_or_else(|| anyhow!("Routing is not configured"))?;
    let route = routing.optimize(&stops, profile).await?;
    if json {
        return print_json(&route);
    }

    for (position, stop) in route.stops.iter().enumerate() {
        println!("{:>2}. {}", position + 1, stop.name);
    }
    println!(
        "{:.1} km, {:.0} min by {}",
        route.distance_km(),
        route.duration_seconds / 60.0,
        route.profile
    );
    Ok(())
}

async fn generate_command(
    config: &TripPlannerConfig,
    itinerary_id: RecordId,
    interests: Option<String>,
    save: bool,
    json: bool,
) -> Result<()> {
    let state = build_state(config)?;
    let generator = state
        .generator
        .ok_or_else(|| anyhow!("Activity generation needs [ai] api_key"))?;

    let (snapshot, itinerary) = state.service.itinerary_context(itinerary_id).await?;
    let suggestions = generator
        .generate(
            &snapshot.travel,
            &itinerary,
            &snapshot.activities,
            interests.as_deref(),
        )
        .await?;

    if json && !save {
        return print_json(&suggestions);
    }
    for suggestion in &suggestions {
        let day = suggestion
            .date
            .map(dates::format_date_for_form)
            .unwrap_or_default();
        println!("{day:<10}  {:<40} {:>8.2}", suggestion.name, suggestion.cost);
    }
    if save {
        let saved = state
            .service
            .save_generated_activities(itinerary_id, suggestions)
            .await?;
        println!("Saved {} activities", saved.len());
    }
    Ok(())
}

#[tracing::instrument(skip(config))]
async fn serve_command(mut config: TripPlannerConfig, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    let state = build_state(&config)?;
    notifications::forward_events(state.service.events(), state.toasts.clone());
    info!(
        places = state.places.is_some(),
        generator = state.generator.is_some(),
        "Starting tripplanner server"
    );
    web::run(state, &config.server).await
}
