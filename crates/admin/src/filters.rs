//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Up to two uppercase initials of a name, for the avatar badge.
///
/// Usage in templates: `{{ user.name|initials }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn initials(name: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(initials_of(&name.to_string()))
}

fn initials_of(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}
