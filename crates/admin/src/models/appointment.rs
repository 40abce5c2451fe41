//! Appointment bookings.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use salonhub_core::{AppointmentId, AppointmentStatus, BranchId, Money, ServiceId, UserId};

/// A booking (domain type). Times are branch-local.
#[derive(Debug, Clone, Serialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub branch_id: BranchId,
    pub client_id: UserId,
    pub client_name: String,
    pub stylist_id: UserId,
    pub stylist_name: String,
    pub service_id: ServiceId,
    pub service_name: String,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub status: AppointmentStatus,
    /// Service price at the time of booking.
    pub price: Money,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Booking request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAppointment {
    pub branch_id: BranchId,
    /// Defaults to the signed-in user when a client books for themselves.
    #[serde(default)]
    pub client_id: Option<UserId>,
    pub stylist_id: UserId,
    pub service_id: ServiceId,
    pub starts_at: NaiveDateTime,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Row values for inserting a booking once it has been checked.
#[derive(Debug, Clone)]
pub struct AppointmentRecord {
    pub branch_id: BranchId,
    pub client_id: UserId,
    pub stylist_id: UserId,
    pub service_id: ServiceId,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub price: Money,
    pub notes: Option<String>,
    pub created_by: UserId,
}

/// Status change request.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatusChange {
    pub status: AppointmentStatus,
}

/// Reschedule request. The stylist may change at the same time.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Reschedule {
    pub starts_at: NaiveDateTime,
    #[serde(default)]
    pub stylist_id: Option<UserId>,
}

/// Query-string filter for appointment lists.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppointmentFilter {
    pub branch_id: Option<BranchId>,
    pub stylist_id: Option<UserId>,
    pub client_id: Option<UserId>,
    pub status: Option<AppointmentStatus>,
    /// First day included.
    pub from: Option<NaiveDate>,
    /// Last day included.
    pub to: Option<NaiveDate>,
}
