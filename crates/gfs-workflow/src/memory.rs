//! In-memory store for development, tests and failure drills.
//!
//! Serializable by construction: a transaction takes the single owned lock
//! over all tables and keeps it until commit or drop. Writes go to a staged
//! copy that replaces the live tables only on commit, so a dropped
//! transaction leaves nothing behind.
//!
//! Committed reads ([`WorkflowRecords`]) wait for any open transaction to
//! finish. Do not read through the store while holding one of its
//! transactions in the same task.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gfs_schemas::{
    InstallOrder, InstallOrderStatus, NewInstallOrder, NewQuote, Quote, QuoteStatus,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::StoreError;
use crate::store::{
    TransitionStore, TransitionTx, WorkflowRecords, UQ_INSTALL_ORDERS_ORDER_NUMBER,
    UQ_INSTALL_ORDERS_QUOTE_ID,
};

// ---------------------------------------------------------------------------
// Fault injection
// ---------------------------------------------------------------------------

/// Points at which an armed fault makes the store fail. Each armed fault
/// fires once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// After the install order insert, before the quote is marked converted.
    BeforeMarkConverted,
    /// At commit, after every write has been staged.
    OnCommit,
}

impl FaultPoint {
    fn label(&self) -> &'static str {
        match self {
            FaultPoint::BeforeMarkConverted => "before_mark_converted",
            FaultPoint::OnCommit => "on_commit",
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    before_mark_converted: AtomicBool,
    on_commit: AtomicBool,
}

impl Faults {
    fn switch(&self, point: FaultPoint) -> &AtomicBool {
        match point {
            FaultPoint::BeforeMarkConverted => &self.before_mark_converted,
            FaultPoint::OnCommit => &self.on_commit,
        }
    }

    fn fire(&self, point: FaultPoint) -> Result<(), StoreError> {
        if self.switch(point).swap(false, Ordering::SeqCst) {
            return Err(StoreError::Injected(point.label()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct Tables {
    quotes: BTreeMap<i64, Quote>,
    install_orders: BTreeMap<i64, InstallOrder>,
    last_quote_id: i64,
    last_install_order_id: i64,
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Cloning shares the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot fault.
    pub fn inject_fault(&self, point: FaultPoint) {
        self.faults.switch(point).store(true, Ordering::SeqCst);
    }

    pub async fn seed_quote(&self, new: NewQuote) -> Quote {
        let mut t = self.tables.lock().await;
        t.last_quote_id += 1;
        let id = t.last_quote_id;
        let quote = new_quote_row(id, new, Utc::now());
        t.quotes.insert(id, quote.clone());
        quote
    }

    /// Seed a quote with a caller-chosen id (ids of later seeds continue after it).
    pub async fn seed_quote_with_id(&self, id: i64, new: NewQuote) -> Quote {
        let mut t = self.tables.lock().await;
        t.last_quote_id = t.last_quote_id.max(id);
        let quote = new_quote_row(id, new, Utc::now());
        t.quotes.insert(id, quote.clone());
        quote
    }
}

fn new_quote_row(id: i64, new: NewQuote, now: DateTime<Utc>) -> Quote {
    Quote {
        id,
        customer_id: new.customer_id,
        description: new.description,
        quote_amount: new.quote_amount,
        quote_status: new.quote_status,
        converted_to_install: false,
        install_order_id: None,
        approval_date: None,
        approved_by: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl TransitionStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let staged = guard.clone();
        Ok(MemoryTx {
            guard,
            staged,
            faults: Arc::clone(&self.faults),
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryTx
// ---------------------------------------------------------------------------

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
    faults: Arc<Faults>,
}

impl MemoryTx {
    fn quote_mut(&mut self, quote_id: i64) -> Result<&mut Quote, StoreError> {
        self.staged
            .quotes
            .get_mut(&quote_id)
            .ok_or_else(|| StoreError::MissingRow(format!("quotes.id={quote_id}")))
    }
}

#[async_trait]
impl TransitionTx for MemoryTx {
    async fn lock_quote(&mut self, quote_id: i64) -> Result<Option<Quote>, StoreError> {
        // The whole table set is already exclusively held.
        Ok(self.staged.quotes.get(&quote_id).cloned())
    }

    async fn record_approval(
        &mut self,
        quote_id: i64,
        approved_by: &str,
        approved_at: DateTime<Utc>,
    ) -> Result<Quote, StoreError> {
        let q = self.quote_mut(quote_id)?;
        q.quote_status = QuoteStatus::Approved;
        q.approval_date = Some(approved_at);
        q.approved_by = Some(approved_by.to_string());
        q.converted_to_install = false;
        q.updated_at = approved_at;
        Ok(q.clone())
    }

    async fn insert_install_order(
        &mut self,
        order: &NewInstallOrder,
    ) -> Result<InstallOrder, StoreError> {
        for existing in self.staged.install_orders.values() {
            if existing.quote_id == order.quote_id {
                return Err(StoreError::UniqueViolation {
                    constraint: UQ_INSTALL_ORDERS_QUOTE_ID.to_string(),
                });
            }
            if existing.order_number == order.order_number {
                return Err(StoreError::UniqueViolation {
                    constraint: UQ_INSTALL_ORDERS_ORDER_NUMBER.to_string(),
                });
            }
        }

        self.staged.last_install_order_id += 1;
        let id = self.staged.last_install_order_id;
        let now = Utc::now();
        let row = InstallOrder {
            id,
            quote_id: order.quote_id,
            order_number: order.order_number.clone(),
            customer_id: order.customer_id,
            status: InstallOrderStatus::Pending,
            install_type: order.install_type,
            generator_info: order.generator_info.clone(),
            material_cost: order.material_cost,
            labor_cost: order.labor_cost,
            total_cost: order.total_cost,
            created_by: order.created_by.clone(),
            created_at: now,
            updated_at: now,
        };
        self.staged.install_orders.insert(id, row.clone());
        Ok(row)
    }

    async fn mark_converted(
        &mut self,
        quote_id: i64,
        install_order_id: i64,
    ) -> Result<Quote, StoreError> {
        self.faults.fire(FaultPoint::BeforeMarkConverted)?;

        if !self.staged.install_orders.contains_key(&install_order_id) {
            return Err(StoreError::MissingRow(format!(
                "install_orders.id={install_order_id}"
            )));
        }
        let q = self.quote_mut(quote_id)?;
        q.converted_to_install = true;
        q.install_order_id = Some(install_order_id);
        q.updated_at = Utc::now();
        Ok(q.clone())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.faults.fire(FaultPoint::OnCommit)?;
        let MemoryTx {
            mut guard, staged, ..
        } = self;
        *guard = staged;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Committed reads
// ---------------------------------------------------------------------------

#[async_trait]
impl WorkflowRecords for MemoryStore {
    async fn fetch_quote(&self, quote_id: i64) -> Result<Option<Quote>, StoreError> {
        Ok(self.tables.lock().await.quotes.get(&quote_id).cloned())
    }

    async fn list_quotes(&self) -> Result<Vec<Quote>, StoreError> {
        let mut quotes: Vec<Quote> = self.tables.lock().await.quotes.values().cloned().collect();
        quotes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(quotes)
    }

    async fn fetch_install_order(
        &self,
        install_order_id: i64,
    ) -> Result<Option<InstallOrder>, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .install_orders
            .get(&install_order_id)
            .cloned())
    }

    async fn list_install_orders(
        &self,
        status: Option<InstallOrderStatus>,
    ) -> Result<Vec<InstallOrder>, StoreError> {
        let t = self.tables.lock().await;
        // Ids are assigned in insert order, so descending id is newest first.
        Ok(t.install_orders
            .values()
            .rev()
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect())
    }

    async fn count_install_orders_for_quote(&self, quote_id: i64) -> Result<i64, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.install_orders
            .values()
            .filter(|o| o.quote_id == quote_id)
            .count() as i64)
    }
}
