//! Quote/install transition engine.
//!
//! Constructed once at process start with an explicit store and shared by
//! every request. It holds no mutable state: each call opens its own store
//! transaction, checks preconditions on the locked row, writes, and commits.
//! Any early return drops the transaction, which rolls it back.

use chrono::Utc;
use gfs_schemas::{InstallData, InstallOrder, NewInstallOrder, Quote};
use tracing::{info, warn};

use crate::error::{StoreError, TransitionError};
use crate::guards;
use crate::order_number::next_order_number;
use crate::store::{TransitionStore, TransitionTx, UQ_INSTALL_ORDERS_QUOTE_ID};

pub struct TransitionEngine<S> {
    store: S,
}

impl<S: TransitionStore> TransitionEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// `draft|pending -> approved`.
    ///
    /// Fails with `NotFound`, `AlreadyApproved` or `AlreadyConverted`; the
    /// first committed approval wins and its `approval_date` / `approved_by`
    /// are never overwritten by a later attempt.
    pub async fn approve_quote(
        &self,
        quote_id: i64,
        approved_by: &str,
    ) -> Result<Quote, TransitionError> {
        guards::validate_actor("approved_by", approved_by)?;
        let approved_by = approved_by.trim();

        let mut tx = self.store.begin().await?;

        let quote = tx
            .lock_quote(quote_id)
            .await?
            .ok_or(TransitionError::NotFound { quote_id })?;
        guards::check_approvable(&quote).inspect_err(|e| {
            warn!(quote_id, kind = e.kind().as_str(), "approve refused");
        })?;

        let approved = tx
            .record_approval(quote_id, approved_by, Utc::now())
            .await?;
        tx.commit().await?;

        info!(quote_id, approved_by, "quote approved");
        Ok(approved)
    }

    /// `approved -> approved + converted`, creating exactly one install order.
    ///
    /// The install order insert and the quote update commit together or not
    /// at all. Fails with `NotFound`, `NotApproved` or `AlreadyConverted`.
    pub async fn convert_quote_to_install(
        &self,
        quote_id: i64,
        install: InstallData,
    ) -> Result<InstallOrder, TransitionError> {
        guards::validate_install_data(&install)?;

        let mut tx = self.store.begin().await?;

        let quote = tx
            .lock_quote(quote_id)
            .await?
            .ok_or(TransitionError::NotFound { quote_id })?;
        guards::check_convertible(&quote).inspect_err(|e| {
            warn!(quote_id, kind = e.kind().as_str(), "convert refused");
        })?;

        let new_order =
            NewInstallOrder::from_install_data(quote_id, next_order_number(Utc::now()), install);

        let order = tx
            .insert_install_order(&new_order)
            .await
            .map_err(|e| match e {
                // Only reachable if an install order was written outside this engine.
                StoreError::UniqueViolation { ref constraint }
                    if constraint == UQ_INSTALL_ORDERS_QUOTE_ID =>
                {
                    TransitionError::AlreadyConverted { quote_id }
                }
                other => TransitionError::Storage(other),
            })?;

        tx.mark_converted(quote_id, order.id).await?;
        tx.commit().await?;

        info!(
            quote_id,
            install_order_id = order.id,
            order_number = %order.order_number,
            "quote converted to install order"
        );
        Ok(order)
    }
}
