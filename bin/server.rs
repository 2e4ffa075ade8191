// Flow Atlas - Web Server
// JSON API over the load-once pipeline context

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use flow_atlas::{
    CountrySelector, DatasetSummary, DirectionFlags, FlowView, IndustryBreakdown,
    LegalityReport, NominatimGeocoder, Palette, PipelineConfig, PipelineContext, TimeSeriesQuery,
    VERSION,
};

const ADDR_ENV: &str = "FLOW_ATLAS_ADDR";
const DEFAULT_ADDR: &str = "0.0.0.0:8080";

/// Shared application state
#[derive(Clone)]
struct AppState {
    context: Arc<PipelineContext>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    /// Failure with a still-serializable (usually empty) payload
    fn fail(data: T, error: String) -> Self {
        Self {
            success: false,
            data,
            error: Some(error),
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Serialize)]
struct SummaryResponse<'a> {
    summary: &'a DatasetSummary,
    /// ISO3 → display name
    countries: BTreeMap<String, String>,
    palette: &'a Palette,
}

#[derive(Serialize)]
struct FlowsResponse {
    #[serde(flatten)]
    view: FlowView,
    /// ISO3 → fill color for the net series
    colors: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct LegalityResponse {
    #[serde(flatten)]
    report: LegalityReport,
    /// Country → total illegal amount (choropleth layer)
    illegal_amounts: BTreeMap<String, f64>,
    /// Country → fill color for its illegal ratio
    ratio_colors: BTreeMap<String, String>,
}

// ============================================================================
// Query parameters
// ============================================================================

#[derive(Debug, Deserialize)]
struct FlowsParams {
    date: Option<String>,
    country: Option<String>,
    origin: Option<bool>,
    destination: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct IndustriesParams {
    #[serde(default)]
    normalize: bool,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesParams {
    /// Comma-separated; missing or blank selects all
    industries: Option<String>,
    /// Comma-separated origin countries; missing or blank selects all
    countries: Option<String>,
    window: Option<usize>,
    date: Option<String>,
}

/// None (select all) for a missing or blank parameter
fn split_list(raw: Option<&str>) -> Option<Vec<String>> {
    let values: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/summary - Date bounds, selector options, names and colors
async fn get_summary(State(state): State<AppState>) -> Response {
    let context = &state.context;

    let response = SummaryResponse {
        summary: context.summary(),
        countries: context.country_names(),
        palette: context.palette(),
    };

    (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
}

/// GET /api/flows - Flow slice + net series for one date
async fn get_flows(State(state): State<AppState>, Query(params): Query<FlowsParams>) -> Response {
    let context = &state.context;

    let date = context.summary().resolve_date(params.date.as_deref());
    let country = CountrySelector::parse(params.country.as_deref().unwrap_or("ALL"));
    let directions = DirectionFlags {
        origin: params.origin.unwrap_or(true),
        destination: params.destination.unwrap_or(true),
    };

    let view = context.flows(directions, &country, date);
    let colors = view.net.shade(&context.palette().scale);

    (StatusCode::OK, Json(ApiResponse::ok(FlowsResponse { view, colors }))).into_response()
}

/// GET /api/legality - Illegal ratio and transaction types per country
async fn get_legality(State(state): State<AppState>) -> Response {
    (StatusCode::OK, Json(ApiResponse::ok(legality_response(&state.context)))).into_response()
}

fn legality_response(context: &PipelineContext) -> LegalityResponse {
    let report = context.legality();
    let scale = &context.palette().scale;

    let ratio_colors = report
        .ratios()
        .into_iter()
        .map(|(country, ratio)| (country, scale.color_for_ratio(ratio).to_string()))
        .collect();

    LegalityResponse {
        illegal_amounts: report.illegal_amounts(),
        ratio_colors,
        report,
    }
}

/// GET /api/industries/:country - Legal vs illegal per industry
async fn get_industries(
    State(state): State<AppState>,
    Path(country): Path<String>,
    Query(params): Query<IndustriesParams>,
) -> Response {
    let (status, response) = industries_response(&state.context, &country, params.normalize);
    (status, Json(response)).into_response()
}

/// 404 with an empty breakdown for a country absent from the ledger
fn industries_response(
    context: &PipelineContext,
    country: &str,
    normalize: bool,
) -> (StatusCode, ApiResponse<IndustryBreakdown>) {
    let breakdown = context.industries(country, normalize);

    if context.summary().countries.iter().any(|c| c == country) {
        (StatusCode::OK, ApiResponse::ok(breakdown))
    } else {
        tracing::debug!("Industry breakdown requested for unknown country {:?}", country);
        (
            StatusCode::NOT_FOUND,
            ApiResponse::fail(breakdown, format!("Unknown country: {}", country)),
        )
    }
}

/// GET /api/timeseries - Amount over time, destination totals, spend vs receive
async fn get_timeseries(
    State(state): State<AppState>,
    Query(params): Query<TimeSeriesParams>,
) -> Response {
    let context = &state.context;

    let query = TimeSeriesQuery {
        industries: split_list(params.industries.as_deref()),
        countries: split_list(params.countries.as_deref()),
        window: params.window.unwrap_or(1).max(1),
        date: context
            .summary()
            .resolve_date(params.date.as_deref())
            .unwrap_or_default(),
    };

    (StatusCode::OK, Json(ApiResponse::ok(context.timeseries(&query)))).into_response()
}

// ============================================================================
// Main Server
// ============================================================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🌐 Flow Atlas v{} - Web Server", VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Startup load runs before the async runtime: the geocoder client is blocking
    let config = PipelineConfig::from_env()?;
    let geocoder = NominatimGeocoder::new(&config.geocoder)?;
    let context = PipelineContext::load(&config, &geocoder)?;
    drop(geocoder);
    println!("✓ Pipeline loaded: {} transactions", context.summary().record_count);

    let state = AppState {
        context: Arc::new(context),
    };

    let addr = std::env::var(ADDR_ENV).unwrap_or_else(|_| DEFAULT_ADDR.to_string());

    tokio::runtime::Runtime::new()
        .context("Failed to start async runtime")?
        .block_on(serve(state, addr))
}

async fn serve(state: AppState, addr: String) -> Result<()> {
    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/summary", get(get_summary))
        .route("/flows", get(get_flows))
        .route("/legality", get(get_legality))
        .route("/industries/:country", get(get_industries))
        .route("/timeseries", get(get_timeseries))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/flows", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Server stopped with an error")
}

// ============================================================================
// TESTS
// ============================================================================
