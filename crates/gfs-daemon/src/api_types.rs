//! Request and response types for the gfs-daemon HTTP endpoints.
//!
//! `Serialize + Deserialize` so Axum can encode them and tests can decode
//! them. No business logic lives here.

use gfs_schemas::{GeneratorInfo, InstallData, InstallType};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Successful read or transition: `{data}` or `{data, message}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> DataResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: &str) -> Self {
        Self {
            data,
            message: Some(message.to_string()),
        }
    }
}

/// Every non-2xx body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable snake_case label: "not_found" | "already_approved" |
    /// "not_approved" | "already_converted" | "invalid" | "unauthorized" |
    /// "storage_failure"
    pub kind: String,
}

// ---------------------------------------------------------------------------
// POST /v1/quotes/:id/convert-to-install
// ---------------------------------------------------------------------------

/// Conversion body. There is no `created_by` field: the install order's
/// creator is always the authenticated caller, and unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertToInstallRequest {
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
}

impl ConvertToInstallRequest {
    pub fn into_install_data(self, created_by: String) -> InstallData {
        InstallData {
            customer_id: self.customer_id,
            install_type: self.install_type,
            generator_info: self.generator_info,
            material_cost: self.material_cost,
            labor_cost: self.labor_cost,
            total_cost: self.total_cost,
            created_by,
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/install-orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallOrderListQuery {
    pub status: Option<String>,
}
