//! Integration tests for the query API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. State is seeded by reconciling journal events
//! into the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use elitebgs_api::{AppState, build_router};
use elitebgs_core::normalize::EventContext;
use elitebgs_core::query::QueryEngine;
use elitebgs_core::reconcile::Reconciler;
use elitebgs_db::{MemoryStore, StateStore};
use elitebgs_types::{Header, JournalMessage};
use serde_json::Value;
use tower::ServiceExt;

fn header(gateway: &str) -> Header {
    Header {
        uploader_id: String::from("cmdr"),
        software_name: String::from("EDMC"),
        software_version: String::from("5.12"),
        gateway_timestamp: Some(gateway.parse().expect("valid timestamp")),
    }
}

fn jump(system: &str, influence: f64, state: &str) -> JournalMessage {
    serde_json::from_value(serde_json::json!({
        "event": "FSDJump",
        "timestamp": "2024-03-01T12:00:00Z",
        "StarSystem": system,
        "StarPos": [1.0, 2.0, 3.0],
        "SystemAllegiance": "Federation",
        "SystemGovernment": "$government_Democracy;",
        "SystemSecurity": "$SYSTEM_SECURITY_high;",
        "SystemEconomy": "$economy_Refinery;",
        "Population": 1_000_000,
        "SystemFaction": {"Name": "Mother Gaia", "FactionState": state},
        "Factions": [
            {
                "Name": "Mother Gaia",
                "FactionState": state,
                "Government": "Democracy",
                "Influence": influence,
                "Allegiance": "Federation",
                "ActiveStates": [{"State": state}]
            },
            {
                "Name": "Sol Workers' Party",
                "FactionState": "None",
                "Government": "Democracy",
                "Influence": 0.1,
                "Allegiance": "Federation"
            }
        ]
    }))
    .expect("valid journal message")
}

fn docked() -> JournalMessage {
    serde_json::from_value(serde_json::json!({
        "event": "Docked",
        "timestamp": "2024-03-01T12:00:00Z",
        "StarSystem": "Sol",
        "StationName": "Abraham Lincoln",
        "StationType": "Orbis",
        "MarketID": 128_016_640_i64,
        "StationFaction": {"Name": "Mother Gaia", "FactionState": "Boom"},
        "StationGovernment": "$government_Democracy;",
        "StationAllegiance": "Federation",
        "StationEconomy": "$economy_Refinery;",
        "StationServices": ["dock", "refuel"]
    }))
    .expect("valid journal message")
}

async fn apply(reconciler: &Reconciler, message: &JournalMessage, gateway: &str) {
    let ctx = EventContext::new(&header(gateway), message);
    reconciler.apply(message, &ctx).await.expect("reconcile");
}

async fn make_test_state() -> Arc<AppState> {
    let store = StateStore::from(MemoryStore::new());
    let reconciler = Reconciler::new(store.clone());

    apply(&reconciler, &jump("Sol", 0.5, "Boom"), "2024-03-01T12:00:00Z").await;
    apply(&reconciler, &jump("Sol", 0.45, "Boom"), "2024-03-02T12:00:00Z").await;
    apply(&reconciler, &jump("Sol", 0.40, "War"), "2024-03-03T12:00:00Z").await;
    apply(&reconciler, &jump("Alpha Centauri", 0.3, "None"), "2024-03-02T18:00:00Z").await;
    apply(&reconciler, &docked(), "2024-03-01T12:30:00Z").await;

    Arc::new(AppState::new(QueryEngine::new(store)))
}

async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    let response = build_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn docs(json: &Value) -> &Vec<Value> {
    json["docs"].as_array().expect("docs array")
}

// =========================================================================
// Health
// =========================================================================

#[tokio::test]
async fn health_reports_store() {
    let (status, json) = get(make_test_state().await, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store"], "memory");
}

// =========================================================================
// Factions
// =========================================================================

#[tokio::test]
async fn factions_by_system_are_enriched() {
    let (status, json) = get(
        make_test_state().await,
        "/api/ebgs/v5/factions?system=Sol&systemDetails=true",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);
    assert_eq!(json["page"], 1);
    assert_eq!(json["hasNextPage"], false);

    let gaia = docs(&json)
        .iter()
        .find(|d| d["name_lower"] == "mother gaia")
        .expect("mother gaia listed");
    let presence = gaia["faction_presence"].as_array().expect("presence list");
    assert_eq!(presence.len(), 2);
    // Every presence resolves its own system, not just the filtered one.
    assert!(presence.iter().all(|p| p["system_id"].is_string()));
    assert!(presence.iter().all(|p| p["system_details"].is_object()));
}

#[tokio::test]
async fn faction_latest_count_is_per_presence() {
    let (status, json) = get(
        make_test_state().await,
        "/api/ebgs/v5/factions?name=Mother%20Gaia&count=2&timemin=0",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let history = docs(&json)[0]["history"].as_array().expect("history");
    let systems: Vec<&str> = history
        .iter()
        .map(|h| h["system_lower"].as_str().unwrap())
        .collect();
    // Two newest Sol rows plus the single Alpha Centauri row, newest first.
    assert_eq!(systems, vec!["sol", "alpha centauri", "sol"]);
    assert_eq!(history[0]["influence"], "0.4");
}

#[tokio::test]
async fn faction_history_window_narrowed_to_filter_systems() {
    let (status, json) = get(
        make_test_state().await,
        "/api/ebgs/v5/factions?name=mother%20gaia&system=sol&filterSystemInHistory=true\
         &timemin=1709251200000&timemax=1709596800000",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let history = docs(&json)[0]["history"].as_array().expect("history");
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|h| h["system_lower"] == "sol"));
    let times: Vec<&str> = history
        .iter()
        .map(|h| h["updated_at"].as_str().unwrap())
        .collect();
    let mut sorted = times.clone();
    sorted.sort_unstable();
    assert_eq!(times, sorted);
}

#[tokio::test]
async fn faction_minimal_omits_presence() {
    let (status, json) = get(
        make_test_state().await,
        "/api/ebgs/v5/factions?beginsWith=mother&minimal=true",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert!(docs(&json)[0].get("faction_presence").is_none_or(Value::is_null));
}

// =========================================================================
// Systems
// =========================================================================

#[tokio::test]
async fn systems_filter_by_present_faction() {
    let (status, json) = get(
        make_test_state().await,
        "/api/ebgs/v5/systems?faction=Sol%20Workers'%20Party",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);
    assert_eq!(docs(&json)[0]["name"], "Alpha Centauri");
    assert_eq!(docs(&json)[1]["name"], "Sol");
}

#[tokio::test]
async fn system_history_tracks_state_changes() {
    let (status, json) = get(make_test_state().await, "/api/ebgs/v5/systems?name=sol&count=10").await;
    assert_eq!(status, StatusCode::OK);
    let sol = &docs(&json)[0];
    assert_eq!(sol["state"], "war");
    // Created, then the controlling state changed once.
    assert_eq!(sol["history"].as_array().map(Vec::len), Some(2));
}

// =========================================================================
// Stations
// =========================================================================

#[tokio::test]
async fn stations_by_market_id() {
    let (status, json) = get(make_test_state().await, "/api/ebgs/v5/stations?marketId=128016640").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    let station = &docs(&json)[0];
    assert_eq!(station["name"], "Abraham Lincoln");
    assert_eq!(station["type"], "orbis");
    assert_eq!(station["controlling_minor_faction"], "Mother Gaia");
}

// =========================================================================
// Contract violations
// =========================================================================

#[tokio::test]
async fn empty_filter_is_bad_request() {
    let (status, json) = get(make_test_state().await, "/api/ebgs/v5/factions?page=1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn minimal_with_history_is_bad_request() {
    let (status, _) = get(
        make_test_state().await,
        "/api/ebgs/v5/systems?name=sol&minimal=true&count=1",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn zero_page_and_zero_count_are_bad_requests() {
    let state = make_test_state().await;
    let (page_status, _) = get(Arc::clone(&state), "/api/ebgs/v5/stations?system=sol&page=0").await;
    let (count_status, _) = get(state, "/api/ebgs/v5/stations?system=sol&count=0").await;
    assert_eq!(page_status, StatusCode::BAD_REQUEST);
    assert_eq!(count_status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_id_is_bad_request() {
    let (status, json) = get(make_test_state().await, "/api/ebgs/v5/systems?id=nope").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().is_some_and(|e| e.contains("id")));
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let (status, _) = get(make_test_state().await, "/api/ebgs/v4/factions?name=x").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
