//! End-to-end session tests against a fake routing provider and backend.

mod common;

use std::sync::atomic::Ordering;

use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use routemonk::error::{OptimizeErrorKind, RouteFetchError, SubmitError};
use routemonk::history::RefreshOutcome;
use routemonk::model::ColorClass;
use routemonk::phase::Phase;
use routemonk::routing::RouteOutcome;

use common::{orchestrator, point, spawn_upstream};

#[tokio::test]
async fn test_bengaluru_scenario() {
    let (upstream, base) = spawn_upstream().await;
    let session = orchestrator(&base);

    // 1. Pick the pair; the second click yields the route request
    assert!(session.click(point(12.97, 77.59)).await.is_none());
    let ticket = session.click(point(12.90, 77.60)).await.unwrap();

    // 2. Route arrives: 1500 s is green
    let outcome = session.fetch_route(ticket).await;
    let RouteOutcome::Applied(route) = outcome else {
        panic!("expected the route to be applied, got {outcome:?}");
    };
    assert_eq!(route.color, ColorClass::Green);
    assert_eq!(route.summary.travel_time_in_seconds, 1500);
    assert_eq!(session.view().await.phase, Phase::RouteLoaded);
    assert_eq!(
        upstream.last_route_key.lock().unwrap().as_deref(),
        Some("test-key")
    );

    // 3. Submit
    let result = session.submit(5, Some("Bengaluru")).await.unwrap();
    assert_eq!(result.city, "Bengaluru");
    assert_eq!(result.travel_time_sec, 1500);
    assert_eq!(result.weather.as_deref(), Some("Clear"));
    assert!((result.final_score - 0.91).abs() < 1e-9);

    // 4. Request body follows the pinned contract
    let bodies = upstream.optimize_bodies.lock().unwrap().clone();
    assert_eq!(
        bodies,
        vec![json!({
            "start": "12.97,77.59",
            "end": "12.9,77.6",
            "perishability": 5,
            "city": "Bengaluru"
        })]
    );

    // 5. History was refreshed once and holds the new record
    assert_eq!(upstream.history_calls(), 1);
    let view = session.view().await;
    assert_eq!(view.phase, Phase::Submitted);
    assert_eq!(view.result, Some(result));
    assert_eq!(view.history.len(), 1);
    assert_eq!(view.history[0].city.as_deref(), Some("Bengaluru"));
    assert_eq!(view.history[0].perishability, 5);
}

#[tokio::test]
async fn test_route_from_before_reset_is_dropped() {
    let (upstream, base) = spawn_upstream().await;
    let session = orchestrator(&base);

    session.click(point(12.97, 77.59)).await;
    let stale = session.click(point(12.90, 77.60)).await.unwrap();

    session.reset().await;

    assert_eq!(session.fetch_route(stale).await, RouteOutcome::Stale);
    assert_eq!(upstream.route_calls(), 1);

    let view = session.view().await;
    assert!(view.route.is_none());
    assert!(view.start.is_none());
    assert_eq!(view.phase, Phase::NoPoints);
}

#[tokio::test]
async fn test_late_route_never_replaces_current_selection() {
    let (upstream, base) = spawn_upstream().await;
    let session = orchestrator(&base);

    session.click(point(12.97, 77.59)).await;
    let old = session.click(point(12.90, 77.60)).await.unwrap();

    session.reset().await;
    session.click(point(13.00, 77.50)).await;
    let current = session.click(point(13.10, 77.70)).await.unwrap();

    upstream.travel_time.store(3600, Ordering::SeqCst);
    assert!(matches!(session.fetch_route(current).await, RouteOutcome::Applied(_)));

    upstream.travel_time.store(600, Ordering::SeqCst);
    assert_eq!(session.fetch_route(old).await, RouteOutcome::Stale);

    let route = session.view().await.route.unwrap();
    assert_eq!(route.color, ColorClass::Red);
    assert_eq!(route.summary.path.first(), Some(&point(13.00, 77.50)));
}

#[tokio::test]
async fn test_route_failures_are_reported_not_thrown() {
    let (upstream, base) = spawn_upstream().await;
    let session = orchestrator(&base);

    upstream.empty_routes.store(true, Ordering::SeqCst);
    session.click(point(12.97, 77.59)).await;
    let ticket = session.click(point(12.90, 77.60)).await.unwrap();

    assert_eq!(
        session.fetch_route(ticket).await,
        RouteOutcome::Failed(RouteFetchError::NoRoute)
    );

    let view = session.view().await;
    assert_eq!(view.phase, Phase::BothPoints);
    assert!(view.route.is_none());
    assert_eq!(view.route_error, Some(RouteFetchError::NoRoute));

    // The session stays usable: reset and retry with new points
    upstream.empty_routes.store(false, Ordering::SeqCst);
    upstream.route_status.store(500, Ordering::SeqCst);
    session.reset().await;
    session.click(point(12.97, 77.59)).await;
    let ticket = session.click(point(12.90, 77.60)).await.unwrap();

    assert_eq!(
        session.fetch_route(ticket).await,
        RouteOutcome::Failed(RouteFetchError::Status(500))
    );
}

#[tokio::test]
async fn test_validation_errors_never_reach_backend() {
    let (upstream, base) = spawn_upstream().await;
    let session = orchestrator(&base);

    assert_err!(session.submit(5, None).await);

    session.click(point(12.97, 77.59)).await;
    session.click(point(12.90, 77.60)).await;
    assert_err!(session.submit(0, None).await);
    assert_err!(session.submit(11, None).await);

    assert_eq!(upstream.optimize_calls(), 0);
    assert_eq!(upstream.history_calls(), 0);
}

#[tokio::test]
async fn test_rejected_input_is_classified() {
    let (upstream, base) = spawn_upstream().await;
    let session = orchestrator(&base);
    upstream.optimize_status.store(422, Ordering::SeqCst);

    session.click(point(12.97, 77.59)).await;
    session.click(point(12.90, 77.60)).await;

    let err = session.submit(5, None).await.unwrap_err();
    let SubmitError::Request(err) = err else {
        panic!("expected a request error, got {err:?}");
    };

    assert_eq!(err.kind, OptimizeErrorKind::InvalidInput);
    assert_eq!(err.status, Some(422));
    assert_eq!(err.message, "city: field required");
    assert_eq!(upstream.history_calls(), 0);

    let view = session.view().await;
    assert!(view.result.is_none());
    assert_eq!(view.phase, Phase::BothPoints);
}

#[tokio::test]
async fn test_server_fault_keeps_previous_result() {
    let (upstream, base) = spawn_upstream().await;
    let session = orchestrator(&base);

    session.click(point(12.97, 77.59)).await;
    let ticket = session.click(point(12.90, 77.60)).await.unwrap();
    session.fetch_route(ticket).await;

    let first = assert_ok!(session.submit(5, Some("Bengaluru")).await);

    upstream.optimize_status.store(503, Ordering::SeqCst);
    let err = session.submit(6, Some("Bengaluru")).await.unwrap_err();
    assert!(matches!(
        err,
        SubmitError::Request(ref e) if e.kind == OptimizeErrorKind::Server
    ));

    let view = session.view().await;
    assert_eq!(view.result, Some(first));
    assert!(view.submit_error.is_some());
    // Failed submit returns to the displayed route
    assert_eq!(view.phase, Phase::RouteLoaded);
    assert_eq!(upstream.history_calls(), 1);
}

#[tokio::test]
async fn test_identical_submissions_are_not_deduplicated() {
    let (upstream, base) = spawn_upstream().await;
    let session = orchestrator(&base);

    session.click(point(12.97, 77.59)).await;
    session.click(point(12.90, 77.60)).await;

    assert_ok!(session.submit(5, Some("Bengaluru")).await);
    assert_ok!(session.submit(5, Some("Bengaluru")).await);

    assert_eq!(upstream.optimize_calls(), 2);
    assert_eq!(upstream.history_calls(), 2);
    assert_eq!(session.view().await.history.len(), 2);
}

#[tokio::test]
async fn test_history_reflects_backend_not_local_append() {
    let (upstream, base) = spawn_upstream().await;
    let session = orchestrator(&base);
    upstream.seed_history(vec![
        json!([2, "Chennai", 5, 1800, "Rain", 0.82, "2024-01-01T10:00:00Z"]),
        json!([1, "Mumbai", 8, 2400, null, 1.4, "2023-12-31T09:00:00Z"]),
    ]);

    assert_eq!(
        session.refresh_history().await,
        RefreshOutcome::Replaced { records: 2 }
    );

    session.click(point(12.97, 77.59)).await;
    session.click(point(12.90, 77.60)).await;
    session.submit(3, Some("Pune")).await.unwrap();

    let history = session.view().await.history;
    let cities: Vec<_> = history.iter().map(|r| r.city.as_deref()).collect();
    assert_eq!(cities, vec![Some("Pune"), Some("Chennai"), Some("Mumbai")]);
    assert_eq!(history[0].id, 3);
}

#[tokio::test]
async fn test_history_failure_keeps_last_known_good() {
    let (upstream, base) = spawn_upstream().await;
    let session = orchestrator(&base);
    upstream.seed_history(vec![json!([1, "Chennai", 5, 1800, "Rain", 0.82, null])]);

    session.refresh_history().await;
    upstream.history_status.store(503, Ordering::SeqCst);

    let outcome = session.refresh_history().await;
    assert!(matches!(outcome, RefreshOutcome::Failed(_)));

    let view = session.view().await;
    assert_eq!(view.history.len(), 1);
    assert!(view.history_error.is_some());
}

#[tokio::test]
async fn test_reset_during_submit_keeps_result() {
    let (upstream, base) = spawn_upstream().await;
    let session = orchestrator(&base);
    upstream.optimize_delay_ms.store(300, Ordering::SeqCst);

    session.click(point(12.97, 77.59)).await;
    session.click(point(12.90, 77.60)).await;

    let submitting = {
        let session = session.clone();
        tokio::spawn(async move { session.submit(5, Some("Bengaluru")).await })
    };

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(session.view().await.phase, Phase::Submitting);
    session.reset().await;

    let result = submitting.await.unwrap().unwrap();

    let view = session.view().await;
    assert_eq!(view.phase, Phase::NoPoints);
    assert!(view.start.is_none());
    assert_eq!(view.result, Some(result));
    assert_eq!(view.history.len(), 1);
}

#[tokio::test]
async fn test_backend_ping() {
    let (_upstream, base) = spawn_upstream().await;
    let session = orchestrator(&base);

    assert_ok!(session.ping_backend().await);

    let offline = orchestrator("http://127.0.0.1:9");
    assert_err!(offline.ping_backend().await);
}

#[tokio::test]
async fn test_older_submit_landing_last_keeps_newer_result() {
    let (upstream, base) = spawn_upstream().await;
    let session = orchestrator(&base);
    upstream.optimize_delay_ms.store(400, Ordering::SeqCst);

    session.click(point(13.08, 80.27)).await;
    session.click(point(13.00, 80.20)).await;

    let older = {
        let session = session.clone();
        tokio::spawn(async move { session.submit(5, Some("Chennai")).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // New selection and a fast submit while the first call is outstanding
    upstream.optimize_delay_ms.store(0, Ordering::SeqCst);
    session.reset().await;
    session.click(point(18.52, 73.85)).await;
    session.click(point(18.60, 73.90)).await;

    let newer = session.submit(4, Some("Pune")).await.unwrap();
    assert_eq!(newer.city, "Pune");

    // The first caller still gets its own answer
    let late = older.await.unwrap().unwrap();
    assert_eq!(late.city, "Chennai");

    let view = session.view().await;
    assert_eq!(view.result.map(|r| r.city).as_deref(), Some("Pune"));
    assert_eq!(view.phase, Phase::Submitted);
    assert!(view.submit_error.is_none());
}

#[tokio::test]
async fn test_earlier_submit_landing_first_keeps_newer_outstanding() {
    let (upstream, base) = spawn_upstream().await;
    let session = orchestrator(&base);
    upstream.optimize_delay_ms.store(300, Ordering::SeqCst);

    session.click(point(13.08, 80.27)).await;
    session.click(point(13.00, 80.20)).await;

    let older = {
        let session = session.clone();
        tokio::spawn(async move { session.submit(5, Some("Chennai")).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // The second call is slower than the first
    upstream.optimize_delay_ms.store(800, Ordering::SeqCst);
    session.reset().await;
    session.click(point(18.52, 73.85)).await;
    session.click(point(18.60, 73.90)).await;

    let newer = {
        let session = session.clone();
        tokio::spawn(async move { session.submit(4, Some("Pune")).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_ok!(older.await.unwrap());
    assert_eq!(session.view().await.phase, Phase::Submitting);

    // Still one call outstanding, so a third submit is refused locally
    let err = session.submit(6, Some("Pune")).await.unwrap_err();
    assert!(matches!(err, SubmitError::Illegal(_)));
    assert_eq!(upstream.optimize_calls(), 2);

    let result = newer.await.unwrap().unwrap();

    let view = session.view().await;
    assert_eq!(view.phase, Phase::Submitted);
    assert_eq!(view.result, Some(result));
    assert_eq!(view.result.map(|r| r.city).as_deref(), Some("Pune"));
}
