//! Salon branches.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use salonhub_core::BranchId;
use salonhub_core::hours::OperatingHours;

use super::require_text;

/// A salon location (domain type).
#[derive(Debug, Clone, Serialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub operating_hours: OperatingHours,
    /// Sales tax as a fraction, e.g. `0.12`.
    pub tax_rate: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating or replacing a branch.
#[derive(Debug, Clone, Deserialize)]
pub struct BranchInput {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "OperatingHours::default_week")]
    pub operating_hours: OperatingHours,
    #[serde(default)]
    pub tax_rate: Decimal,
}

impl BranchInput {
    /// Check name, tax rate and hours.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        require_text(&self.name, "name")?;
        if self.tax_rate < Decimal::ZERO || self.tax_rate > Decimal::ONE {
            return Err(format!("tax rate {} must be between 0 and 1", self.tax_rate));
        }
        self.operating_hours.validate().map_err(|e| e.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_standard_week() {
        let input: BranchInput = serde_json::from_str(r#"{"name":"Makati"}"#).unwrap();
        assert_eq!(input.operating_hours, OperatingHours::default_week());
        assert_eq!(input.tax_rate, Decimal::ZERO);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_tax() {
        let input: BranchInput =
            serde_json::from_str(r#"{"name":"Makati","tax_rate":"12"}"#).unwrap();
        assert!(input.validate().unwrap_err().contains("tax rate"));
    }
}
