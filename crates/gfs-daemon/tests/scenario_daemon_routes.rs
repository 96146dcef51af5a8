//! In-process scenario tests for gfs-daemon HTTP endpoints.
//!
//! The Axum router runs **without** binding a TCP socket, over a
//! `MemoryStore`. Each test builds state, seeds quotes, and drives the router
//! via `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use gfs_daemon::{identity::USER_HEADER, routes, state::AppState};
use gfs_schemas::NewQuote;
use gfs_workflow::{MemoryStore, WorkflowRecords};
use http_body_util::BodyExt;
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_state() -> Arc<AppState<MemoryStore>> {
    Arc::new(AppState::new(MemoryStore::new()))
}

async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    if b.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

async fn call_json(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, serde_json::Value) {
    let (status, body) = call(router, req).await;
    (status, parse_json(body))
}

fn get(uri: &str, user: Option<&str>) -> Request<axum::body::Body> {
    let mut b = Request::builder().method("GET").uri(uri);
    if let Some(u) = user {
        b = b.header(USER_HEADER, u);
    }
    b.body(axum::body::Body::empty()).unwrap()
}

fn post(uri: &str, user: Option<&str>, body: Option<serde_json::Value>) -> Request<axum::body::Body> {
    let mut b = Request::builder().method("POST").uri(uri);
    if let Some(u) = user {
        b = b.header(USER_HEADER, u);
    }
    match body {
        Some(json) => b
            .header("content-type", "application/json")
            .body(axum::body::Body::from(json.to_string()))
            .unwrap(),
        None => b.body(axum::body::Body::empty()).unwrap(),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let router = routes::build_router(make_state());
    let (status, json) = call_json(router, get("/v1/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "gfs-daemon");
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_or_blank_identity_is_401() {
    let st = make_state();
    let q = st.store().seed_quote(NewQuote::pending(100)).await;
    let router = routes::build_router(Arc::clone(&st));

    let uri = format!("/v1/quotes/{}/approve", q.id);
    let (status, json) = call_json(router.clone(), post(&uri, None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["kind"], "unauthorized");

    let (status, _) = call_json(router.clone(), post(&uri, Some("   "), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call_json(router.clone(), get("/v1/quotes", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(router, get("/v1/stream", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(parse_json(body)["kind"], "unauthorized");

    let stored = st.store().fetch_quote(q.id).await.unwrap().unwrap();
    assert!(!stored.is_approved(), "refused request must not write");
}

// ---------------------------------------------------------------------------
// GET /v1/quotes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn quotes_list_is_newest_first() {
    let st = make_state();
    let older = st.store().seed_quote(NewQuote::pending(1)).await;
    let newer = st.store().seed_quote(NewQuote::pending(2)).await;
    let router = routes::build_router(Arc::clone(&st));

    let (status, json) = call_json(router, get("/v1/quotes", Some("u"))).await;
    assert_eq!(status, StatusCode::OK);
    let all = json["data"].as_array().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0]["id"], newer.id);
    assert_eq!(all[1]["id"], older.id);
}

// ---------------------------------------------------------------------------
// POST /v1/quotes/:id/approve
// ---------------------------------------------------------------------------

#[tokio::test]
async fn approve_uses_caller_identity_and_second_approve_is_409() {
    let st = make_state();
    let q = st.store().seed_quote(NewQuote::pending(100)).await;
    let router = routes::build_router(Arc::clone(&st));
    let uri = format!("/v1/quotes/{}/approve", q.id);

    // A client-supplied approver is ignored.
    let body = serde_json::json!({ "approvedBy": "mallory" });
    let (status, json) = call_json(router.clone(), post(&uri, Some("user-7"), Some(body))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["quote_status"], "approved");
    assert_eq!(json["data"]["approved_by"], "user-7");
    assert_eq!(json["message"], "Quote approved successfully");

    let (status, json) = call_json(router, post(&uri, Some("user-8"), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "already_approved");

    let stored = st.store().fetch_quote(q.id).await.unwrap().unwrap();
    assert_eq!(stored.approved_by.as_deref(), Some("user-7"));
}

#[tokio::test]
async fn approve_unknown_quote_is_404_and_bad_id_is_400() {
    let router = routes::build_router(make_state());

    let (status, json) = call_json(router.clone(), post("/v1/quotes/999/approve", Some("u"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "not_found");

    let (status, json) = call_json(router, post("/v1/quotes/abc/approve", Some("u"), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid");
}

// ---------------------------------------------------------------------------
// POST /v1/quotes/:id/convert-to-install
// ---------------------------------------------------------------------------

#[tokio::test]
async fn convert_before_approve_is_409_not_approved() {
    let st = make_state();
    let q = st.store().seed_quote(NewQuote::pending(100)).await;
    let router = routes::build_router(Arc::clone(&st));

    let uri = format!("/v1/quotes/{}/convert-to-install", q.id);
    let body = serde_json::json!({ "customer_id": 100 });
    let (status, json) = call_json(router, post(&uri, Some("user-7"), Some(body))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "not_approved");
    assert_eq!(st.store().count_install_orders_for_quote(q.id).await.unwrap(), 0);
}

#[tokio::test]
async fn convert_ignores_client_created_by_and_second_convert_is_409() {
    let st = make_state();
    let q = st.store().seed_quote(NewQuote::pending(100)).await;
    let router = routes::build_router(Arc::clone(&st));

    let (status, _) = call(
        router.clone(),
        post(&format!("/v1/quotes/{}/approve", q.id), Some("user-7"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/v1/quotes/{}/convert-to-install", q.id);
    let body = serde_json::json!({
        "customer_id": 100,
        "generator_info": { "brand": "Generac", "model": "Guardian 24kW" },
        "material_cost": 8500.0,
        "labor_cost": 3500.0,
        "total_cost": 12000.0,
        "created_by": "mallory"
    });
    let (status, json) = call_json(router.clone(), post(&uri, Some("user-7"), Some(body))).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["message"], "Quote converted to install order successfully");
    let order = &json["data"];
    assert_eq!(order["created_by"], "user-7");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["install_type"], "new_install");
    assert_eq!(order["total_cost"], 12000.0);
    assert!(order["order_number"].as_str().unwrap().starts_with("INS-"));

    let again = serde_json::json!({ "customer_id": 100, "install_type": "upgrade" });
    let (status, json) = call_json(router.clone(), post(&uri, Some("user-9"), Some(again))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "already_converted");
    assert_eq!(st.store().count_install_orders_for_quote(q.id).await.unwrap(), 1);

    // The quote now points at the order.
    let (status, json) = call_json(router, get(&format!("/v1/quotes/{}", q.id), Some("user-7"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["converted_to_install"], true);
    assert_eq!(json["data"]["install_order_id"], order["id"]);
}

#[tokio::test]
async fn malformed_or_invalid_convert_body_is_400() {
    let st = make_state();
    let q = st.store().seed_quote(NewQuote::pending(100)).await;
    st.engine.approve_quote(q.id, "user-7").await.unwrap();
    let router = routes::build_router(Arc::clone(&st));
    let uri = format!("/v1/quotes/{}/convert-to-install", q.id);

    // customer_id missing
    let (status, json) = call_json(
        router.clone(),
        post(&uri, Some("user-7"), Some(serde_json::json!({ "total_cost": 1.0 }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid");

    // unknown install type
    let (status, _) = call(
        router.clone(),
        post(
            &uri,
            Some("user-7"),
            Some(serde_json::json!({ "customer_id": 100, "install_type": "teleport" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // customer_id of the wrong type
    let (status, json) = call_json(
        router,
        post(
            &uri,
            Some("user-7"),
            Some(serde_json::json!({ "customer_id": "one hundred" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid");

    assert_eq!(st.store().count_install_orders_for_quote(q.id).await.unwrap(), 0);
}

#[tokio::test]
async fn convert_records_costs_and_equipment_as_sent() {
    let st = make_state();
    let q = st.store().seed_quote(NewQuote::pending(100)).await;
    st.engine.approve_quote(q.id, "user-7").await.unwrap();
    let router = routes::build_router(Arc::clone(&st));

    let uri = format!("/v1/quotes/{}/convert-to-install", q.id);
    let body = serde_json::json!({
        "customer_id": 100,
        "generator_info": { "brand": "", "model": "" },
        "labor_cost": -250.0
    });
    let (status, json) = call_json(router, post(&uri, Some("user-7"), Some(body))).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["labor_cost"], -250.0);
    assert_eq!(json["data"]["generator_info"]["brand"], "");
    assert_eq!(st.store().count_install_orders_for_quote(q.id).await.unwrap(), 1);
}

#[tokio::test]
async fn storage_failure_is_500_and_leaves_no_trace() {
    let st = make_state();
    let q = st.store().seed_quote(NewQuote::pending(100)).await;
    st.engine.approve_quote(q.id, "user-7").await.unwrap();
    st.store()
        .inject_fault(gfs_workflow::FaultPoint::BeforeMarkConverted);
    let router = routes::build_router(Arc::clone(&st));

    let uri = format!("/v1/quotes/{}/convert-to-install", q.id);
    let body = serde_json::json!({ "customer_id": 100 });
    let (status, json) = call_json(router, post(&uri, Some("user-7"), Some(body))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["kind"], "storage_failure");

    assert_eq!(st.store().count_install_orders_for_quote(q.id).await.unwrap(), 0);
}

// ---------------------------------------------------------------------------
// GET /v1/install-orders
// ---------------------------------------------------------------------------

#[tokio::test]
async fn install_orders_list_filters_by_status() {
    let st = make_state();
    for customer in [1, 2] {
        let q = st.store().seed_quote(NewQuote::pending(customer)).await;
        st.engine.approve_quote(q.id, "user-7").await.unwrap();
        st.engine
            .convert_quote_to_install(q.id, gfs_schemas::InstallData::new(customer, "user-7"))
            .await
            .unwrap();
    }
    let router = routes::build_router(Arc::clone(&st));

    let (status, json) = call_json(router.clone(), get("/v1/install-orders", Some("u"))).await;
    assert_eq!(status, StatusCode::OK);
    let all = json["data"].as_array().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0]["customer_id"], 2, "newest first");

    let (_, json) = call_json(router.clone(), get("/v1/install-orders?status=pending", Some("u"))).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let (_, json) = call_json(router.clone(), get("/v1/install-orders?status=completed", Some("u"))).await;
    assert!(json["data"].as_array().unwrap().is_empty());

    let (status, json) = call_json(router.clone(), get("/v1/install-orders?status=lost", Some("u"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid");

    let id = all[0]["id"].as_i64().unwrap();
    let (status, json) = call_json(router.clone(), get(&format!("/v1/install-orders/{id}"), Some("u"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["id"], id);

    let (status, json) = call_json(router, get("/v1/install-orders/4242", Some("u"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "not_found");
}
