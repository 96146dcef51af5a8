//! Shared record types for quotes and install orders.
//!
//! Plain data only: no IO, no validation beyond enum parsing. Every crate in
//! the workspace exchanges these types, and the daemon serializes them
//! verbatim as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Enum parse error
// ---------------------------------------------------------------------------

/// Returned when a stored or client-supplied enum label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

fn unknown(kind: &'static str, value: &str) -> UnknownVariant {
    UnknownVariant {
        kind,
        value: value.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Quote
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Pending,
    Approved,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Pending => "pending",
            QuoteStatus::Approved => "approved",
        }
    }

    pub fn parse(s: &str) -> Result<Self, UnknownVariant> {
        match s.trim() {
            "draft" => Ok(QuoteStatus::Draft),
            "pending" => Ok(QuoteStatus::Pending),
            "approved" => Ok(QuoteStatus::Approved),
            other => Err(unknown("quote status", other)),
        }
    }
}

/// A customer quote as stored.
///
/// `quote_status`, `converted_to_install`, `install_order_id`,
/// `approval_date` and `approved_by` are written only by the transition
/// engine in `gfs-workflow`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: i64,
    pub customer_id: Option<i64>,
    pub description: Option<String>,
    pub quote_amount: Option<String>,
    pub quote_status: QuoteStatus,
    pub converted_to_install: bool,
    pub install_order_id: Option<i64>,
    pub approval_date: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn is_approved(&self) -> bool {
        self.quote_status == QuoteStatus::Approved
    }
}

/// Seed row for a quote. Quote authoring lives outside this workspace; this
/// exists so stores and tests can create the rows the engine operates on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuote {
    pub customer_id: Option<i64>,
    pub description: Option<String>,
    pub quote_amount: Option<String>,
    pub quote_status: QuoteStatus,
}

impl NewQuote {
    pub fn pending(customer_id: i64) -> Self {
        Self {
            customer_id: Some(customer_id),
            description: None,
            quote_amount: None,
            quote_status: QuoteStatus::Pending,
        }
    }
}

// ---------------------------------------------------------------------------
// Install order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallOrderStatus {
    Pending,
    InProgress,
    Completed,
}

impl InstallOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallOrderStatus::Pending => "pending",
            InstallOrderStatus::InProgress => "in_progress",
            InstallOrderStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, UnknownVariant> {
        match s.trim() {
            "pending" => Ok(InstallOrderStatus::Pending),
            "in_progress" => Ok(InstallOrderStatus::InProgress),
            "completed" => Ok(InstallOrderStatus::Completed),
            other => Err(unknown("install order status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallType {
    #[default]
    NewInstall,
    Replacement,
    Upgrade,
}

impl InstallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallType::NewInstall => "new_install",
            InstallType::Replacement => "replacement",
            InstallType::Upgrade => "upgrade",
        }
    }

    pub fn parse(s: &str) -> Result<Self, UnknownVariant> {
        match s.trim() {
            "new_install" => Ok(InstallType::NewInstall),
            "replacement" => Ok(InstallType::Replacement),
            "upgrade" => Ok(InstallType::Upgrade),
            other => Err(unknown("install type", other)),
        }
    }
}

/// Equipment descriptor carried from the quote onto the install order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorInfo {
    pub brand: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

/// Validated payload for converting an approved quote.
///
/// `created_by` is always the authenticated actor, never a client value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallData {
    pub customer_id: i64,
    #[serde(default)]
    pub install_type: InstallType,
    #[serde(default)]
    pub generator_info: Option<GeneratorInfo>,
    #[serde(default)]
    pub material_cost: Option<f64>,
    #[serde(default)]
    pub labor_cost: Option<f64>,
    #[serde(default)]
    pub total_cost: Option<f64>,
    pub created_by: String,
}

impl InstallData {
    pub fn new(customer_id: i64, created_by: impl Into<String>) -> Self {
        Self {
            customer_id,
            install_type: InstallType::default(),
            generator_info: None,
            material_cost: None,
            labor_cost: None,
            total_cost: None,
            created_by: created_by.into(),
        }
    }
}

/// Row the engine hands to the store. Status is always `pending` at insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInstallOrder {
    pub quote_id: i64,
    pub order_number: String,
    pub customer_id: i64,
    pub install_type: InstallType,
    pub generator_info: Option<GeneratorInfo>,
    pub material_cost: Option<f64>,
    pub labor_cost: Option<f64>,
    pub total_cost: Option<f64>,
    pub created_by: String,
}

impl NewInstallOrder {
    pub fn from_install_data(quote_id: i64, order_number: String, data: InstallData) -> Self {
        Self {
            quote_id,
            order_number,
            customer_id: data.customer_id,
            install_type: data.install_type,
            generator_info: data.generator_info,
            material_cost: data.material_cost,
            labor_cost: data.labor_cost,
            total_cost: data.total_cost,
            created_by: data.created_by,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallOrder {
    pub id: i64,
    pub quote_id: i64,
    pub order_number: String,
    pub customer_id: i64,
    pub status: InstallOrderStatus,
    pub install_type: InstallType,
    pub generator_info: Option<GeneratorInfo>,
    pub material_cost: Option<f64>,
    pub labor_cost: Option<f64>,
    pub total_cost: Option<f64>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
