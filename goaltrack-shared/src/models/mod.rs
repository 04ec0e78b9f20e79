/// Entity models over the keyspace
///
/// Each entity is written to several denormalized projection tables. The model
/// methods own the fan-out: every create, update and delete stages all affected
/// projections into one [`Batch`](crate::store::Batch) so readers never observe
/// a partially applied change.
///
/// # Models
///
/// - [`user::User`]: accounts, credentials and lockout state
/// - [`goal::Goal`]: goals plus their status/category/target-date projections
/// - [`one_time_token::OneTimeToken`]: password-reset and email-verification tokens

pub mod goal;
pub mod one_time_token;
pub mod user;

use chrono::{DateTime, NaiveDate};
use serde::{de, Deserialize, Deserializer};

/// Deserializes a field that distinguishes "absent" from "explicitly null"
///
/// Use together with `#[serde(default)]`: a missing field stays `None`, `null`
/// becomes `Some(None)` and a value becomes `Some(Some(value))`.
pub fn deserialize_nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Parses a calendar date from form input
///
/// Blank input means no date. Besides `YYYY-MM-DD`, an RFC 3339 timestamp is
/// accepted and truncated to its date.
pub fn parse_form_date(raw: &str) -> Result<Option<NaiveDate>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    raw.parse::<NaiveDate>()
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map(Some)
        .map_err(|_| format!("Invalid date: {}", raw))
}

/// Optional date where `""` and `null` both mean "no date"
pub fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_form_date(&raw).map_err(de::Error::custom),
        None => Ok(None),
    }
}

/// Nullable date for partial updates; `""` clears it like `null` does
pub fn deserialize_nullable_date<'de, D>(
    deserializer: D,
) -> Result<Option<Option<NaiveDate>>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_optional_date(deserializer).map(Some)
}
