//! Product suppliers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salonhub_core::SupplierId;

use super::require_text;

/// A product supplier (domain type).
#[derive(Debug, Clone, Serialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating or replacing a supplier.
#[derive(Debug, Clone, Deserialize)]
pub struct SupplierInput {
    pub name: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SupplierInput {
    /// Check the name.
    ///
    /// # Errors
    ///
    /// Returns a message if the name is blank.
    pub fn validate(&self) -> Result<(), String> {
        require_text(&self.name, "name")
    }
}
