//! HTTP middleware for the dashboard server.
//!
//! - [`session`] - tower-sessions layer backed by `PostgreSQL`
//! - [`auth`] - sign-in extractors and permission checks

pub mod auth;
pub mod session;

pub use auth::{
    AuthRejection, OptionalAuth, RequireAuth, RequireStaff, clear_current_user, set_current_user,
};
pub use session::{SESSION_COOKIE_NAME, create_session_layer, create_session_store};
