//! gfs-workflow
//!
//! Quote lifecycle and install conversion.
//!
//! This crate owns the two guarded transitions of a quote:
//!
//! ```text
//! draft/pending --approve_quote--> approved --convert_quote_to_install--> approved + converted
//! ```
//!
//! and the storage contract they need. The engine never locks anything
//! itself; every precondition read and every write happens inside one store
//! transaction, and the store is responsible for serializing writers on the
//! same quote row (see [`store`]).
//!
//! Two substrates exist: [`memory::MemoryStore`] here, and `PgStore` in
//! `gfs-db`.

pub mod engine;
pub mod error;
pub mod guards;
pub mod memory;
pub mod order_number;
pub mod store;

pub use engine::TransitionEngine;
pub use error::{ErrorKind, StoreError, TransitionError};
pub use memory::{FaultPoint, MemoryStore};
pub use store::{
    TransitionStore, TransitionTx, WorkflowRecords, UQ_INSTALL_ORDERS_ORDER_NUMBER,
    UQ_INSTALL_ORDERS_QUOTE_ID,
};
