// API module for headless mode - HTTP endpoints to observe and drive a running world

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::config::SimulationConfig;
use crate::simulation::Engine;
use crate::species::SpeciesRecord;
use crate::stats::StatsSnapshot;
use crate::view::GridView;

/// Largest number of generations a single `/step` request may run
pub const MAX_STEPS_PER_REQUEST: u64 = 10_000;
/// Generations run per lock acquisition while serving `/step`
const STEP_CHUNK: u64 = 64;
/// Frames per second of the background stepping loop
pub const TARGET_FPS: f32 = 60.0;

#[derive(Serialize, Clone)]
pub struct SimulationStateResponse {
    pub grid: GridView,
    pub stats: StatsSnapshot,
    pub species: Vec<SpeciesRecord>,
    pub paused: bool,
}

#[derive(Deserialize)]
pub struct StepQuery {
    pub steps: Option<u64>,
}

/// A world plus the playback controls of the server
pub struct Session {
    pub engine: Engine,
    pub paused: bool,
    /// Generations advanced per frame of the background loop
    pub speed_multiplier: f32,
    pub speed_accumulator: f32,
}

impl Session {
    pub fn new(engine: Engine, generations_per_second: f32) -> Self {
        Self {
            engine,
            paused: false,
            speed_multiplier: (generations_per_second / TARGET_FPS).max(0.0),
            speed_accumulator: 0.0,
        }
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Advance according to the speed multiplier; fractional speeds accumulate
    /// across frames
    fn tick(&mut self) {
        if self.paused {
            return;
        }
        self.speed_accumulator += self.speed_multiplier;
        let steps = self.speed_accumulator.floor() as usize;
        self.speed_accumulator -= steps as f32;
        for _ in 0..steps {
            self.engine.step();
        }
    }
}

// Shared state for the API server
#[derive(Clone)]
pub struct ApiState {
    pub session: Arc<Mutex<Session>>,
}

impl ApiState {
    pub fn new(engine: Engine, generations_per_second: f32) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::new(engine, generations_per_second))),
        }
    }
}

fn session_to_response(session: &Session) -> SimulationStateResponse {
    SimulationStateResponse {
        grid: session.engine.snapshot(),
        stats: session.engine.last_stats().clone(),
        species: session.engine.species_table(),
        paused: session.paused,
    }
}

// GET /state - Get current world state
async fn get_state(
    State(api_state): State<ApiState>,
) -> Result<Json<SimulationStateResponse>, StatusCode> {
    let session = api_state
        .session
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(session_to_response(&session)))
}

// GET /stats - Get the latest generation statistics
async fn get_stats(State(api_state): State<ApiState>) -> Result<Json<StatsSnapshot>, StatusCode> {
    let session = api_state
        .session
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(session.engine.last_stats().clone()))
}

// GET /species - Get the living species
async fn get_species(
    State(api_state): State<ApiState>,
) -> Result<Json<Vec<SpeciesRecord>>, StatusCode> {
    let session = api_state
        .session
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(session.engine.species_table()))
}

// POST /step - Step the world forward
async fn step_simulation(
    Query(params): Query<StepQuery>,
    State(api_state): State<ApiState>,
) -> Result<Json<SimulationStateResponse>, StatusCode> {
    let steps = params.steps.unwrap_or(1);
    if steps > MAX_STEPS_PER_REQUEST {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Stepping is CPU-bound, so it runs off the async workers. The lock is
    // released between chunks to let the stepping loop and readers in.
    let session = api_state.session.clone();
    let response = tokio::task::spawn_blocking(move || -> Result<SimulationStateResponse, StatusCode> {
        let mut remaining = steps;
        loop {
            let mut session = session
                .lock()
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
            let chunk = remaining.min(STEP_CHUNK);
            session.engine.run(chunk);
            remaining -= chunk;
            if remaining == 0 {
                return Ok(session_to_response(&session));
            }
        }
    })
    .await
    .map_err(|err| {
        error!(error = %err, "step task failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    Ok(Json(response))
}

// POST /reset - Rebuild the world from its config and seed
async fn reset_simulation(
    State(api_state): State<ApiState>,
) -> Result<Json<SimulationStateResponse>, StatusCode> {
    let mut session = api_state
        .session
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    session.engine.reset().map_err(|err| {
        error!(error = %err, "reset failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    session.speed_accumulator = 0.0;

    Ok(Json(session_to_response(&session)))
}

// POST /pause - Toggle pause
async fn pause_simulation(
    State(api_state): State<ApiState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let mut session = api_state
        .session
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    session.toggle_pause();
    Ok(Json(serde_json::json!({ "paused": session.paused })))
}

// GET /config - Get the configuration the world was built from
async fn get_config(
    State(api_state): State<ApiState>,
) -> Result<Json<SimulationConfig>, StatusCode> {
    let session = api_state
        .session
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(session.engine.config().clone()))
}

// Create the API router
pub fn create_router(api_state: ApiState) -> Router {
    Router::new()
        .route("/state", get(get_state))
        .route("/stats", get(get_stats))
        .route("/species", get(get_species))
        .route("/step", post(step_simulation))
        .route("/reset", post(reset_simulation))
        .route("/pause", post(pause_simulation))
        .route("/config", get(get_config))
        .layer(CorsLayer::permissive())
        .with_state(api_state)
}

// Run the API server with automatic stepping
pub async fn run_server(api_state: ApiState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(api_state.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port, "primordial garden headless API listening");
    info!("GET  /state            full world snapshot");
    info!("GET  /stats            latest generation statistics");
    info!("GET  /species          living species");
    info!("POST /step?steps=N     advance N generations (default 1)");
    info!("POST /reset            rebuild the world from its seed");
    info!("POST /pause            toggle automatic stepping");
    info!("GET  /config           configuration in use");

    // Spawn background task to keep the world evolving
    let simulation_task = tokio::spawn(simulation_loop(api_state.clone()));

    let server_handle = tokio::spawn(async move { axum::serve(listener, app).await });

    // Wait for either task to complete
    tokio::select! {
        result = server_handle => {
            result??;
        }
        _ = simulation_task => {
            warn!("simulation loop ended unexpectedly");
        }
    }

    Ok(())
}

// Background task that steps the world at the configured rate
async fn simulation_loop(api_state: ApiState) {
    let frame_duration = std::time::Duration::from_secs_f32(1.0 / TARGET_FPS);

    loop {
        let start = std::time::Instant::now();

        {
            let mut session = match api_state.session.lock() {
                Ok(session) => session,
                Err(_) => break,
            };
            session.tick();
        }

        // Sleep to maintain target FPS
        let elapsed = start.elapsed();
        if elapsed < frame_duration {
            tokio::time::sleep(frame_duration - elapsed).await;
        }
    }
}
