//! Shared runtime state for gfs-daemon.
//!
//! Handlers receive `State<Arc<AppState<S>>>` from Axum. `S` is the store
//! behind the transition engine: `PgStore` in the binary, `MemoryStore` in
//! the router tests.

use std::time::Duration;

use gfs_workflow::{TransitionEngine, TransitionStore, WorkflowRecords};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// WorkflowStore
// ---------------------------------------------------------------------------

/// Everything the router needs from a store.
pub trait WorkflowStore: TransitionStore + WorkflowRecords + 'static {}

impl<T> WorkflowStore for T where T: TransitionStore + WorkflowRecords + 'static {}

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
    },
    QuoteApproved {
        quote_id: i64,
        approved_by: String,
    },
    InstallOrderCreated {
        quote_id: i64,
        install_order_id: i64,
        order_number: String,
    },
    LogLine {
        level: String,
        msg: String,
    },
}

impl BusMsg {
    /// SSE `event:` name.
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::QuoteApproved { .. } => "quote_approved",
            BusMsg::InstallOrderCreated { .. } => "install_order_created",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState<S> {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub engine: TransitionEngine<S>,
}

impl<S: TransitionStore> AppState<S> {
    pub fn new(store: S) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "gfs-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            engine: TransitionEngine::new(store),
        }
    }

    /// Committed reads go straight to the store.
    pub fn store(&self) -> &S {
        self.engine.store()
    }
}

impl<S> AppState<S> {
    /// Publish to SSE subscribers. No subscribers is not an error.
    pub fn publish(&self, msg: BusMsg) {
        let _ = self.bus.send(msg);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
