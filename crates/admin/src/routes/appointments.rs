//! Appointment booking and the appointment lifecycle.
//!
//! Clients book for themselves; front-of-house staff book for any client at
//! their branch. A stylist can hold only one active booking at a time, and
//! every booking must fit inside the branch's opening hours for that day.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{Duration, NaiveDateTime};
use tracing::instrument;

use salonhub_core::pagination::{Page, PageRequest};
use salonhub_core::{AppointmentId, AppointmentStatus, Capability, Role, UserId};

use crate::db::{AppointmentRepository, BranchRepository, SalonServiceRepository, UserRepository};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{
    Appointment, AppointmentFilter, AppointmentRecord, Branch, CurrentUser, NewAppointment,
    Reschedule, SalonService, StatusChange, User, non_blank,
};
use crate::state::AppState;

/// Build the appointments router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/appointments", get(list).post(create))
        .route("/api/appointments/{id}", get(show))
        .route("/api/appointments/{id}/status", post(change_status))
        .route("/api/appointments/{id}/reschedule", post(reschedule))
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Work out when a booking of `length` ends and check it can take place.
///
/// # Errors
///
/// Returns `AppError::Unprocessable` for a closed branch, an unavailable
/// service or stylist, a start in the past, or a slot outside opening
/// hours.
pub fn plan_slot(
    branch: &Branch,
    service: &SalonService,
    stylist: &User,
    starts_at: NaiveDateTime,
    length: Duration,
    now: NaiveDateTime,
) -> Result<NaiveDateTime, AppError> {
    if !branch.is_active {
        return Err(AppError::Unprocessable("branch is closed".to_string()));
    }
    if !service.is_active || !service.offered_at(branch.id) {
        return Err(AppError::Unprocessable(format!(
            "{} is not offered at {}",
            service.name, branch.name
        )));
    }
    if stylist.role != Role::Stylist
        || !stylist.is_active
        || stylist.branch_id != Some(branch.id)
    {
        return Err(AppError::Unprocessable(format!(
            "{} does not work at {}",
            stylist.name, branch.name
        )));
    }
    if starts_at < now {
        return Err(AppError::Unprocessable(
            "appointments cannot start in the past".to_string(),
        ));
    }

    let ends_at = starts_at
        .checked_add_signed(length)
        .ok_or_else(|| AppError::Unprocessable("appointment time is out of range".to_string()))?;
    if !branch.operating_hours.covers(starts_at, ends_at) {
        return Err(AppError::Unprocessable(
            "the branch is not open for the whole appointment".to_string(),
        ));
    }
    Ok(ends_at)
}

/// Whether `user` may move `appointment` to `next`.
///
/// Clients may only cancel their own bookings. Stylists run their own
/// chair. Staff who manage appointments may update any booking at their
/// branch.
///
/// # Errors
///
/// Returns `AppError::Forbidden` if the user may not, and
/// `AppError::Conflict` if the lifecycle does not allow the move.
pub fn ensure_status_change(
    user: &CurrentUser,
    appointment: &Appointment,
    next: AppointmentStatus,
) -> Result<(), AppError> {
    match user.role {
        Role::Client => {
            if !user.is(appointment.client_id) {
                return Err(AppError::Forbidden(
                    "this appointment belongs to another client".to_string(),
                ));
            }
            if next != AppointmentStatus::Cancelled {
                return Err(AppError::Forbidden(
                    "clients may only cancel appointments".to_string(),
                ));
            }
        }
        Role::Stylist if user.is(appointment.stylist_id) => {}
        _ => {
            user.require(Capability::ManageAppointments)?;
            user.ensure_branch(appointment.branch_id)?;
        }
    }

    if !appointment.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "cannot move a {} appointment to {next}",
            appointment.status
        )));
    }
    Ok(())
}

/// Whether `user` may see `appointment`.
fn ensure_can_view(user: &CurrentUser, appointment: &Appointment) -> Result<(), AppError> {
    let allowed = match user.role {
        Role::Client => user.is(appointment.client_id),
        Role::Stylist => user.is(appointment.stylist_id),
        _ => user.ensure_branch(appointment.branch_id).is_ok(),
    };
    if allowed {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("appointment {}", appointment.id)))
    }
}

async fn load_appointment(state: &AppState, id: AppointmentId) -> Result<Appointment, AppError> {
    AppointmentRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("appointment {id}")))
}

async fn load_user(state: &AppState, id: UserId, what: &str) -> Result<User, AppError> {
    UserRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::Unprocessable(format!("unknown {what} {id}")))
}

/// List appointments visible to the caller.
///
/// GET /api/appointments
async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(mut filter): Query<AppointmentFilter>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<Appointment>>, AppError> {
    match user.role {
        Role::Client => filter.client_id = Some(user.id),
        Role::Stylist => filter.stylist_id = Some(user.id),
        _ => filter.branch_id = user.scope_branch(filter.branch_id)?,
    }
    let appointments = AppointmentRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(appointments))
}

/// Book an appointment at the service's catalogue price.
///
/// POST /api/appointments
#[instrument(skip(state, user, body), fields(user_id = %user.id, branch_id = %body.branch_id))]
async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<NewAppointment>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let client_id = if user.role == Role::Client {
        if body.client_id.is_some_and(|id| !user.is(id)) {
            return Err(AppError::Forbidden(
                "clients may only book for themselves".to_string(),
            ));
        }
        user.id
    } else {
        user.require(Capability::ManageAppointments)?;
        user.ensure_branch(body.branch_id)?;
        body.client_id
            .ok_or_else(|| AppError::Unprocessable("client_id is required".to_string()))?
    };

    let branch = BranchRepository::new(state.pool())
        .get(body.branch_id)
        .await?
        .ok_or_else(|| AppError::Unprocessable(format!("unknown branch {}", body.branch_id)))?;
    let service = SalonServiceRepository::new(state.pool())
        .get(body.service_id)
        .await?
        .ok_or_else(|| AppError::Unprocessable(format!("unknown service {}", body.service_id)))?;
    let stylist = load_user(&state, body.stylist_id, "stylist").await?;
    let client = load_user(&state, client_id, "client").await?;
    if client.role != Role::Client || !client.is_active {
        return Err(AppError::Unprocessable(format!(
            "{client_id} is not an active client"
        )));
    }

    let length = Duration::minutes(i64::from(service.duration_minutes));
    let ends_at = plan_slot(&branch, &service, &stylist, body.starts_at, length, now())?;

    let appointment = AppointmentRepository::new(state.pool())
        .create(&AppointmentRecord {
            branch_id: branch.id,
            client_id,
            stylist_id: stylist.id,
            service_id: service.id,
            starts_at: body.starts_at,
            ends_at,
            price: service.price,
            notes: non_blank(body.notes.as_deref()),
            created_by: user.id,
        })
        .await?;

    tracing::info!(
        appointment_id = %appointment.id,
        stylist_id = %stylist.id,
        starts_at = %appointment.starts_at,
        "Appointment booked"
    );
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// GET /api/appointments/{id}
async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = load_appointment(&state, id).await?;
    ensure_can_view(&user, &appointment)?;
    Ok(Json(appointment))
}

/// Move an appointment along its lifecycle.
///
/// POST /api/appointments/{id}/status
#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn change_status(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
    Json(body): Json<StatusChange>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = load_appointment(&state, id).await?;
    ensure_can_view(&user, &appointment)?;
    ensure_status_change(&user, &appointment, body.status)?;

    let updated = AppointmentRepository::new(state.pool())
        .update_status(id, body.status)
        .await?;
    tracing::info!(
        appointment_id = %id,
        from = %appointment.status,
        to = %updated.status,
        "Appointment status changed"
    );
    Ok(Json(updated))
}

/// Move a booking to a new slot, keeping its length.
///
/// POST /api/appointments/{id}/reschedule
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
async fn reschedule(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
    Json(body): Json<Reschedule>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = load_appointment(&state, id).await?;
    ensure_can_view(&user, &appointment)?;
    if user.role != Role::Client {
        user.require(Capability::ManageAppointments)?;
    }
    if appointment.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "a {} appointment cannot be rescheduled",
            appointment.status
        )));
    }

    let branch = BranchRepository::new(state.pool())
        .get(appointment.branch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("branch {}", appointment.branch_id)))?;
    let service = SalonServiceRepository::new(state.pool())
        .get(appointment.service_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("service {}", appointment.service_id)))?;
    let stylist_id = body.stylist_id.unwrap_or(appointment.stylist_id);
    let stylist = load_user(&state, stylist_id, "stylist").await?;

    let length = appointment.ends_at - appointment.starts_at;
    let ends_at = plan_slot(&branch, &service, &stylist, body.starts_at, length, now())?;

    let updated = AppointmentRepository::new(state.pool())
        .reschedule(id, stylist_id, body.starts_at, ends_at)
        .await?;
    tracing::info!(
        appointment_id = %id,
        stylist_id = %stylist_id,
        starts_at = %updated.starts_at,
        "Appointment rescheduled"
    );
    Ok(Json(updated))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use rust_decimal::Decimal;
    use salonhub_core::hours::{DayHours, OperatingHours};
    use salonhub_core::{BranchId, Email, Money, ServiceId};

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        // 2026-03-02 is a Monday
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn branch() -> Branch {
        let open = Some(DayHours {
            open: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            close: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        });
        Branch {
            id: BranchId::new(1),
            name: "Downtown".to_string(),
            address: "1 Main St".to_string(),
            phone: None,
            email: None,
            operating_hours: OperatingHours {
                monday: open,
                tuesday: open,
                wednesday: open,
                thursday: open,
                friday: open,
                saturday: None,
                sunday: None,
            },
            tax_rate: Decimal::ZERO,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn minutes(m: i64) -> Duration {
        Duration::minutes(m)
    }

    fn service() -> SalonService {
        SalonService {
            id: ServiceId::new(1),
            name: "Cut".to_string(),
            description: String::new(),
            category: "hair".to_string(),
            price: Money::from_minor(4_500),
            duration_minutes: 45,
            branch_ids: vec![BranchId::new(1)],
            image_url: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user(id: i32, role: Role, branch: Option<i32>) -> User {
        User {
            id: UserId::new(id),
            email: Email::parse("u@example.com").unwrap(),
            name: "Sam".to_string(),
            phone: None,
            role,
            branch_id: branch.map(BranchId::new),
            loyalty_points: 0,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn current(id: i32, role: Role, branch: Option<i32>) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            email: Email::parse("me@example.com").unwrap(),
            name: "Me".to_string(),
            role,
            branch_id: branch.map(BranchId::new),
        }
    }

    fn appointment(status: AppointmentStatus) -> Appointment {
        Appointment {
            id: AppointmentId::new(9),
            branch_id: BranchId::new(1),
            client_id: UserId::new(10),
            client_name: "Client".to_string(),
            stylist_id: UserId::new(20),
            stylist_name: "Stylist".to_string(),
            service_id: ServiceId::new(1),
            service_name: "Cut".to_string(),
            starts_at: at(2, 10, 0),
            ends_at: at(2, 11, 0),
            status,
            price: Money::from_minor(4_500),
            notes: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_plan_slot_adds_duration() {
        let stylist = user(20, Role::Stylist, Some(1));
        let ends = plan_slot(&branch(), &service(), &stylist, at(2, 10, 0), minutes(45), at(1, 8, 0)).unwrap();
        assert_eq!(ends, at(2, 10, 45));
    }

    #[test]
    fn test_plan_slot_rejects_running_past_closing() {
        let stylist = user(20, Role::Stylist, Some(1));
        let err = plan_slot(&branch(), &service(), &stylist, at(2, 17, 30), minutes(60), at(1, 8, 0));
        assert!(matches!(err, Err(AppError::Unprocessable(_))));
    }

    #[test]
    fn test_plan_slot_rejects_closed_day_and_past() {
        let stylist = user(20, Role::Stylist, Some(1));
        // Saturday
        assert!(plan_slot(&branch(), &service(), &stylist, at(7, 10, 0), minutes(30), at(1, 8, 0)).is_err());
        assert!(plan_slot(&branch(), &service(), &stylist, at(2, 10, 0), minutes(30), at(3, 8, 0)).is_err());
    }

    #[test]
    fn test_plan_slot_rejects_end_past_calendar_limit() {
        let stylist = user(20, Role::Stylist, Some(1));
        let last_slot = NaiveDate::MAX.and_hms_opt(23, 30, 0).unwrap();
        let err = plan_slot(&branch(), &service(), &stylist, last_slot, minutes(45), at(1, 8, 0));
        assert!(matches!(err, Err(AppError::Unprocessable(_))));
    }

    #[test]
    fn test_plan_slot_requires_stylist_at_branch() {
        let elsewhere = user(20, Role::Stylist, Some(2));
        assert!(plan_slot(&branch(), &service(), &elsewhere, at(2, 10, 0), minutes(30), at(1, 8, 0)).is_err());
        let manager = user(21, Role::BranchManager, Some(1));
        assert!(plan_slot(&branch(), &service(), &manager, at(2, 10, 0), minutes(30), at(1, 8, 0)).is_err());
    }

    #[test]
    fn test_client_can_only_cancel_own() {
        let appt = appointment(AppointmentStatus::Scheduled);
        let owner = current(10, Role::Client, None);
        assert!(ensure_status_change(&owner, &appt, AppointmentStatus::Cancelled).is_ok());
        assert!(matches!(
            ensure_status_change(&owner, &appt, AppointmentStatus::Confirmed),
            Err(AppError::Forbidden(_))
        ));
        let other = current(11, Role::Client, None);
        assert!(ensure_status_change(&other, &appt, AppointmentStatus::Cancelled).is_err());
    }

    #[test]
    fn test_stylist_runs_own_chair() {
        let appt = appointment(AppointmentStatus::Confirmed);
        let stylist = current(20, Role::Stylist, Some(1));
        assert!(ensure_status_change(&stylist, &appt, AppointmentStatus::InProgress).is_ok());
        let colleague = current(21, Role::Stylist, Some(1));
        assert!(ensure_status_change(&colleague, &appt, AppointmentStatus::InProgress).is_err());
    }

    #[test]
    fn test_terminal_status_is_conflict() {
        let appt = appointment(AppointmentStatus::Completed);
        let manager = current(30, Role::BranchManager, Some(1));
        assert!(matches!(
            ensure_status_change(&manager, &appt, AppointmentStatus::Cancelled),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_manager_limited_to_branch() {
        let appt = appointment(AppointmentStatus::Scheduled);
        let manager = current(30, Role::BranchManager, Some(2));
        assert!(matches!(
            ensure_status_change(&manager, &appt, AppointmentStatus::Confirmed),
            Err(AppError::Forbidden(_))
        ));
    }
}
