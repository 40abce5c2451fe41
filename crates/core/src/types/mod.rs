//! Core types for SalonHub.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod role;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::Money;
pub use role::{Capability, Role, can_manage_user};
pub use status::*;
