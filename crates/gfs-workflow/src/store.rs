//! Storage contract for the transition engine.
//!
//! # Isolation contract
//!
//! Every implementation MUST provide, for a transaction obtained from
//! [`TransitionStore::begin`]:
//!
//! 1. **Row lock on read**: once [`TransitionTx::lock_quote`] returns, no
//!    other transaction can lock or write that quote until this transaction
//!    commits or is dropped. A second locker waits, then observes the
//!    committed result of the first ("read committed + row lock on update",
//!    or anything stronger).
//! 2. **Atomic commit**: writes made through the transaction become visible
//!    to others only on [`TransitionTx::commit`], all together.
//! 3. **Rollback on drop**: a transaction dropped without `commit` (error
//!    path, panic, cancelled request future) leaves no trace.
//! 4. **One install order per quote**: inserting a second install order for
//!    the same `quote_id` fails with
//!    `StoreError::UniqueViolation { constraint: UQ_INSTALL_ORDERS_QUOTE_ID }`,
//!    and `order_number` is unique.
//!
//! An eventually-consistent store cannot satisfy (1) and is not a valid
//! substrate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gfs_schemas::{InstallOrder, InstallOrderStatus, NewInstallOrder, Quote};

use crate::error::StoreError;

/// Constraint name reported when a second install order targets a quote.
pub const UQ_INSTALL_ORDERS_QUOTE_ID: &str = "uq_install_orders_quote_id";

/// Constraint name reported when an order number is reused.
pub const UQ_INSTALL_ORDERS_ORDER_NUMBER: &str = "uq_install_orders_order_number";

#[async_trait]
pub trait TransitionStore: Send + Sync {
    type Tx: TransitionTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// One open transaction. See the module docs for the guarantees required.
#[async_trait]
pub trait TransitionTx: Send {
    /// Read a quote and hold its row lock for the rest of the transaction.
    async fn lock_quote(&mut self, quote_id: i64) -> Result<Option<Quote>, StoreError>;

    /// Set `approved` status, approval date and actor; clear the conversion flag.
    async fn record_approval(
        &mut self,
        quote_id: i64,
        approved_by: &str,
        approved_at: DateTime<Utc>,
    ) -> Result<Quote, StoreError>;

    /// Insert a `pending` install order.
    async fn insert_install_order(
        &mut self,
        order: &NewInstallOrder,
    ) -> Result<InstallOrder, StoreError>;

    /// Flip `converted_to_install` and link the install order.
    async fn mark_converted(
        &mut self,
        quote_id: i64,
        install_order_id: i64,
    ) -> Result<Quote, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;
}

/// Committed-state reads used by the request handler, the CLI and tests.
#[async_trait]
pub trait WorkflowRecords: Send + Sync {
    async fn fetch_quote(&self, quote_id: i64) -> Result<Option<Quote>, StoreError>;

    /// All quotes, newest first.
    async fn list_quotes(&self) -> Result<Vec<Quote>, StoreError>;

    async fn fetch_install_order(
        &self,
        install_order_id: i64,
    ) -> Result<Option<InstallOrder>, StoreError>;

    /// Install orders, newest first, optionally filtered by status.
    async fn list_install_orders(
        &self,
        status: Option<InstallOrderStatus>,
    ) -> Result<Vec<InstallOrder>, StoreError>;

    async fn count_install_orders_for_quote(&self, quote_id: i64) -> Result<i64, StoreError>;
}
