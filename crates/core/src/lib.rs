//! SalonHub Core - Shared domain library.
//!
//! This crate provides the types and arithmetic shared by every SalonHub
//! component:
//! - `admin` - Role-based dashboards and JSON API for all branches
//! - `cli` - Command-line tools for migrations, bootstrap users and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Database encoding for the newtypes is available
//! behind the `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, money, roles and statuses
//! - [`hours`] - Branch operating hours
//! - [`loyalty`] - Branch-scoped loyalty balances and earn/redeem policy
//! - [`pos`] - Point-of-sale cart and totals
//! - [`pagination`] - Page requests and paged results
//! - [`content`] - Homepage and branch CMS documents

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod content;
pub mod hours;
pub mod loyalty;
pub mod pagination;
pub mod pos;
pub mod types;

pub use types::*;
