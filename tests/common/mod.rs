//! Fake routing provider and optimize backend served on an ephemeral port.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use routemonk::config::Config;
use routemonk::model::GeoPoint;
use routemonk::orchestrator::Orchestrator;

/// Scriptable upstream state.
pub struct Upstream {
    pub route_calls: AtomicUsize,
    pub optimize_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    pub travel_time: AtomicU64,
    pub route_status: AtomicU16,
    pub empty_routes: AtomicBool,
    pub optimize_status: AtomicU16,
    pub optimize_delay_ms: AtomicU64,
    pub history_status: AtomicU16,
    pub records: Mutex<Vec<Value>>,
    pub optimize_bodies: Mutex<Vec<Value>>,
    pub last_route_key: Mutex<Option<String>>,
}

impl Upstream {
    fn new() -> Self {
        Self {
            route_calls: AtomicUsize::new(0),
            optimize_calls: AtomicUsize::new(0),
            history_calls: AtomicUsize::new(0),
            travel_time: AtomicU64::new(1500),
            route_status: AtomicU16::new(200),
            empty_routes: AtomicBool::new(false),
            optimize_status: AtomicU16::new(200),
            optimize_delay_ms: AtomicU64::new(0),
            history_status: AtomicU16::new(200),
            records: Mutex::new(Vec::new()),
            optimize_bodies: Mutex::new(Vec::new()),
            last_route_key: Mutex::new(None),
        }
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn optimize_calls(&self) -> usize {
        self.optimize_calls.load(Ordering::SeqCst)
    }

    pub fn route_calls(&self) -> usize {
        self.route_calls.load(Ordering::SeqCst)
    }

    /// Seed the backend with existing history rows (positional form).
    pub fn seed_history(&self, rows: Vec<Value>) {
        *self.records.lock().unwrap() = rows;
    }
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "RouteMonk Backend Running!" }))
}

async fn calculate_route(
    State(upstream): State<Arc<Upstream>>,
    Path(locations): Path<String>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Response {
    upstream.route_calls.fetch_add(1, Ordering::SeqCst);
    *upstream.last_route_key.lock().unwrap() = params.get("key").cloned();

    let status = upstream.route_status.load(Ordering::SeqCst);
    if status != 200 {
        return StatusCode::from_u16(status).unwrap().into_response();
    }

    if upstream.empty_routes.load(Ordering::SeqCst) {
        return Json(json!({ "routes": [] })).into_response();
    }

    let points: Vec<Value> = locations
        .split(':')
        .filter_map(|pair| {
            let (lat, lng) = pair.split_once(',')?;
            Some(json!({
                "latitude": lat.parse::<f64>().ok()?,
                "longitude": lng.parse::<f64>().ok()?,
            }))
        })
        .collect();

    Json(json!({
        "formatVersion": "0.0.12",
        "routes": [{
            "summary": {
                "lengthInMeters": 8400,
                "travelTimeInSeconds": upstream.travel_time.load(Ordering::SeqCst),
            },
            "legs": [{ "points": points }]
        }]
    }))
    .into_response()
}

async fn optimize(State(upstream): State<Arc<Upstream>>, Json(body): Json<Value>) -> Response {
    upstream.optimize_calls.fetch_add(1, Ordering::SeqCst);
    upstream.optimize_bodies.lock().unwrap().push(body.clone());

    let delay = upstream.optimize_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    match upstream.optimize_status.load(Ordering::SeqCst) {
        200 => {}
        422 => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "detail": [{"loc": ["body", "city"], "msg": "field required", "type": "value_error.missing"}]
                })),
            )
                .into_response();
        }
        status => {
            return (
                StatusCode::from_u16(status).unwrap(),
                "Internal Server Error",
            )
                .into_response();
        }
    }

    let city = body["city"].as_str().unwrap_or("Bengaluru").to_string();
    let perishability = body["perishability"].as_i64().unwrap_or(0);
    let travel_time = upstream.travel_time.load(Ordering::SeqCst);

    let mut records = upstream.records.lock().unwrap();
    let id = records.len() as i64 + 1;
    // Newest first, like the backend's ORDER BY created_at DESC.
    records.insert(
        0,
        json!([id, city, perishability, travel_time, "Clear", 0.91, "2024-01-01T10:00:00"]),
    );

    Json(json!({
        "city": city,
        "travel_time_sec": travel_time,
        "weather": "Clear",
        "final_score": 0.91
    }))
    .into_response()
}

async fn history(State(upstream): State<Arc<Upstream>>) -> Response {
    upstream.history_calls.fetch_add(1, Ordering::SeqCst);

    let status = upstream.history_status.load(Ordering::SeqCst);
    if status != 200 {
        return StatusCode::from_u16(status).unwrap().into_response();
    }

    let records = upstream.records.lock().unwrap().clone();
    Json(json!({ "history": records })).into_response()
}

/// Start the fake upstream; returns its state and base URL.
pub async fn spawn_upstream() -> (Arc<Upstream>, String) {
    let upstream = Arc::new(Upstream::new());

    let app = Router::new()
        .route("/", get(root))
        .route("/routing/1/calculateRoute/:locations/json", get(calculate_route))
        .route("/optimize/", post(optimize))
        .route("/history/", get(history))
        .with_state(upstream.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (upstream, format!("http://{}", addr))
}

/// A session wired to the fake upstream.
pub fn orchestrator(base_url: &str) -> Orchestrator {
    let config = Config::new("test-key")
        .with_backend_url(base_url)
        .with_routing_url(&format!("{}/routing/1", base_url))
        .with_timeout(Duration::from_secs(5));

    Orchestrator::new(&config).unwrap()
}

pub fn point(lat: f64, lng: f64) -> GeoPoint {
    GeoPoint::new(lat, lng).unwrap()
}
