//! Service menu entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salonhub_core::{BranchId, Money, ServiceId};

use super::require_text;

/// A bookable service (domain type).
#[derive(Debug, Clone, Serialize)]
pub struct SalonService {
    pub id: ServiceId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: Money,
    pub duration_minutes: i32,
    /// Branches offering the service.
    pub branch_ids: Vec<BranchId>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SalonService {
    /// Whether the service can be sold or booked at `branch`.
    #[must_use]
    pub fn offered_at(&self, branch: BranchId) -> bool {
        self.is_active && self.branch_ids.contains(&branch)
    }
}

/// Payload for creating or replacing a service.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub price: Money,
    pub duration_minutes: i32,
    #[serde(default)]
    pub branch_ids: Vec<BranchId>,
    #[serde(default)]
    pub image_url: Option<String>,
}

fn default_category() -> String {
    "general".to_string()
}

impl ServiceInput {
    /// Check name, price and duration.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        require_text(&self.name, "name")?;
        if self.price.is_negative() {
            return Err("price cannot be negative".to_string());
        }
        if self.duration_minutes <= 0 || self.duration_minutes > 12 * 60 {
            return Err("duration must be between 1 and 720 minutes".to_string());
        }
        Ok(())
    }
}

/// Query-string filter for the service menu.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceFilter {
    /// Only services offered at this branch.
    pub branch_id: Option<BranchId>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn test_offered_at() {
        let now = Utc::now();
        let mut service = SalonService {
            id: ServiceId::new(1),
            name: "Haircut".to_string(),
            description: String::new(),
            category: "hair".to_string(),
            price: Money::from_minor(35_000),
            duration_minutes: 45,
            branch_ids: vec![BranchId::new(1), BranchId::new(3)],
            image_url: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(service.offered_at(BranchId::new(3)));
        assert!(!service.offered_at(BranchId::new(2)));

        service.is_active = false;
        assert!(!service.offered_at(BranchId::new(1)));
    }

    #[test]
    fn test_validate_duration() {
        let input = ServiceInput {
            name: "Hair spa".to_string(),
            description: String::new(),
            category: default_category(),
            price: Money::from_minor(80_000),
            duration_minutes: 0,
            branch_ids: vec![],
            image_url: None,
        };
        assert!(input.validate().is_err());
    }
}
