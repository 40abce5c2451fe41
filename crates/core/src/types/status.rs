//! Status enums for appointments and sales.

use serde::{Deserialize, Serialize};

/// Lifecycle of a booked appointment.
///
/// ```text
/// scheduled ──► confirmed ──► in_progress ──► completed
///     │             │
///     ├─────────────┴──► cancelled
///     └─────────────┴──► no_show
/// ```
///
/// A scheduled appointment may also go straight to `in_progress` when the
/// client walks in without confirming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "salon.appointment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Whether moving from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Scheduled,
                Self::Confirmed | Self::InProgress | Self::Cancelled | Self::NoShow
            ) | (
                Self::Confirmed,
                Self::InProgress | Self::Cancelled | Self::NoShow
            ) | (Self::InProgress, Self::Completed)
        )
    }

    /// Terminal statuses accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }

    /// Whether the appointment still occupies the stylist's time slot.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Scheduled | Self::Confirmed | Self::InProgress)
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_show",
        })
    }
}

/// State of a point-of-sale transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "salon.transaction_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Completed,
    Voided,
}

/// How a client paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "salon.payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    EWallet,
    BankTransfer,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    #[test]
    fn test_happy_path() {
        use AppointmentStatus::*;
        assert!(Scheduled.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
    }

    #[test]
    fn test_walk_in_skips_confirmation() {
        assert!(AppointmentStatus::Scheduled.can_transition_to(AppointmentStatus::InProgress));
    }

    #[test]
    fn test_in_progress_cannot_be_cancelled() {
        assert!(!AppointmentStatus::InProgress.can_transition_to(AppointmentStatus::Cancelled));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for from in ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
            assert!(!from.is_active());
        }
    }

    #[test]
    fn test_no_self_transitions() {
        for status in ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_payment_method_serde() {
        let json = serde_json::to_string(&PaymentMethod::EWallet).unwrap_or_default();
        assert_eq!(json, "\"e_wallet\"");
    }
}
