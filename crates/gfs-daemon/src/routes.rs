//! Axum router and all HTTP handlers for gfs-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are generic over the store so the scenario
//! tests in `tests/` can drive the same router over `MemoryStore`.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use gfs_schemas::InstallOrderStatus;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, warn};

use crate::{
    api_types::{ConvertToInstallRequest, DataResponse, HealthResponse, InstallOrderListQuery},
    error::ApiError,
    identity::AuthUser,
    state::{AppState, BusMsg, WorkflowStore},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router<S: WorkflowStore>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/v1/health", get(health::<S>))
        .route("/v1/quotes", get(list_quotes::<S>))
        .route("/v1/quotes/:id", get(get_quote::<S>))
        .route("/v1/quotes/:id/approve", post(approve_quote::<S>))
        .route(
            "/v1/quotes/:id/convert-to-install",
            post(convert_to_install::<S>),
        )
        .route("/v1/install-orders", get(list_install_orders::<S>))
        .route("/v1/install-orders/:id", get(get_install_order::<S>))
        .route("/v1/stream", get(stream::<S>))
        .with_state(state)
}

/// Log a refused or failed request and turn it into a response.
fn fail<S>(
    st: &AppState<S>,
    operation: &'static str,
    id: Option<i64>,
    err: ApiError,
) -> Response {
    if err.status.is_server_error() {
        error!(id, operation, kind = err.kind, error = %err.message, "request failed");
        st.publish(BusMsg::LogLine {
            level: "ERROR".to_string(),
            msg: format!("{operation} failed: {}", err.kind),
        });
    } else {
        warn!(id, operation, kind = err.kind, error = %err.message, "request refused");
    }
    err.into_response()
}

fn path_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|e| ApiError::invalid(e.body_text()))
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health<S: WorkflowStore>(
    State(st): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/quotes  /v1/quotes/:id
// ---------------------------------------------------------------------------

pub(crate) async fn list_quotes<S: WorkflowStore>(
    State(st): State<Arc<AppState<S>>>,
    _user: AuthUser,
) -> Response {
    match st.store().list_quotes().await {
        Ok(quotes) => (StatusCode::OK, Json(DataResponse::data(quotes))).into_response(),
        Err(e) => fail(&st, "list_quotes", None, ApiError::storage(e.to_string())),
    }
}

pub(crate) async fn get_quote<S: WorkflowStore>(
    State(st): State<Arc<AppState<S>>>,
    path: Result<Path<i64>, PathRejection>,
    _user: AuthUser,
) -> Response {
    let quote_id = match path_id(path) {
        Ok(id) => id,
        Err(e) => return fail(&st, "get_quote", None, e),
    };
    match st.store().fetch_quote(quote_id).await {
        Ok(Some(quote)) => (StatusCode::OK, Json(DataResponse::data(quote))).into_response(),
        Ok(None) => fail(
            &st,
            "get_quote",
            Some(quote_id),
            ApiError::not_found(format!("quote {quote_id} not found")),
        ),
        Err(e) => fail(&st, "get_quote", Some(quote_id), ApiError::storage(e.to_string())),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/quotes/:id/approve
// ---------------------------------------------------------------------------

/// Approve a quote as the authenticated caller. Any request body is ignored.
pub(crate) async fn approve_quote<S: WorkflowStore>(
    State(st): State<Arc<AppState<S>>>,
    path: Result<Path<i64>, PathRejection>,
    AuthUser(user): AuthUser,
) -> Response {
    let quote_id = match path_id(path) {
        Ok(id) => id,
        Err(e) => return fail(&st, "approve_quote", None, e),
    };

    match st.engine.approve_quote(quote_id, &user).await {
        Ok(quote) => {
            st.publish(BusMsg::QuoteApproved {
                quote_id,
                approved_by: quote.approved_by.clone().unwrap_or(user),
            });
            (
                StatusCode::OK,
                Json(DataResponse::with_message(quote, "Quote approved successfully")),
            )
                .into_response()
        }
        Err(e) => fail(&st, "approve_quote", Some(quote_id), e.into()),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/quotes/:id/convert-to-install
// ---------------------------------------------------------------------------

/// Convert an approved quote. `created_by` is always the caller.
pub(crate) async fn convert_to_install<S: WorkflowStore>(
    State(st): State<Arc<AppState<S>>>,
    path: Result<Path<i64>, PathRejection>,
    AuthUser(user): AuthUser,
    body: Result<Json<ConvertToInstallRequest>, JsonRejection>,
) -> Response {
    let quote_id = match path_id(path) {
        Ok(id) => id,
        Err(e) => return fail(&st, "convert_to_install", None, e),
    };
    let req = match body {
        Ok(Json(req)) => req,
        Err(e) => {
            return fail(
                &st,
                "convert_to_install",
                Some(quote_id),
                ApiError::invalid(format!("invalid request data: {}", e.body_text())),
            )
        }
    };

    match st
        .engine
        .convert_quote_to_install(quote_id, req.into_install_data(user))
        .await
    {
        Ok(order) => {
            st.publish(BusMsg::InstallOrderCreated {
                quote_id,
                install_order_id: order.id,
                order_number: order.order_number.clone(),
            });
            (
                StatusCode::OK,
                Json(DataResponse::with_message(
                    order,
                    "Quote converted to install order successfully",
                )),
            )
                .into_response()
        }
        Err(e) => fail(&st, "convert_to_install", Some(quote_id), e.into()),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/install-orders  /v1/install-orders/:id
// ---------------------------------------------------------------------------

/// Newest first. `?status=pending|in_progress|completed`; blank means all.
pub(crate) async fn list_install_orders<S: WorkflowStore>(
    State(st): State<Arc<AppState<S>>>,
    query: Result<Query<InstallOrderListQuery>, QueryRejection>,
    _user: AuthUser,
) -> Response {
    let Query(q) = match query {
        Ok(q) => q,
        Err(e) => {
            return fail(
                &st,
                "list_install_orders",
                None,
                ApiError::invalid(e.body_text()),
            )
        }
    };
    let status = match q.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => match InstallOrderStatus::parse(raw) {
            Ok(s) => Some(s),
            Err(e) => {
                return fail(
                    &st,
                    "list_install_orders",
                    None,
                    ApiError::invalid(e.to_string()),
                )
            }
        },
    };

    match st.store().list_install_orders(status).await {
        Ok(orders) => (StatusCode::OK, Json(DataResponse::data(orders))).into_response(),
        Err(e) => fail(&st, "list_install_orders", None, ApiError::storage(e.to_string())),
    }
}

pub(crate) async fn get_install_order<S: WorkflowStore>(
    State(st): State<Arc<AppState<S>>>,
    path: Result<Path<i64>, PathRejection>,
    _user: AuthUser,
) -> Response {
    let id = match path_id(path) {
        Ok(id) => id,
        Err(e) => return fail(&st, "get_install_order", None, e),
    };
    match st.store().fetch_install_order(id).await {
        Ok(Some(order)) => (StatusCode::OK, Json(DataResponse::data(order))).into_response(),
        Ok(None) => fail(
            &st,
            "get_install_order",
            Some(id),
            ApiError::not_found(format!("install order {id} not found")),
        ),
        Err(e) => fail(&st, "get_install_order", Some(id), ApiError::storage(e.to_string())),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream<S: WorkflowStore>(
    State(st): State<Arc<AppState<S>>>,
    _user: AuthUser,
) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
