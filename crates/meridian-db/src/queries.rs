//! Typed queries, grouped by table. Every method takes the connection lock
//! once; multi-statement writes run inside a single transaction.

mod connections;
mod messages;
mod notifications;
mod posts;
mod users;

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use meridian_types::models::UserSummary;

/// Current time as stored: RFC 3339 UTC with fixed microsecond precision so
/// that text ordering matches time ordering.
pub(crate) fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| {
            // Rows written by SQLite's datetime('now') carry no offset
            chrono::NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S").map(|t| t.and_utc())
        })
        .map_err(|e| conversion_error(idx, e))
}

pub(crate) fn enum_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

/// Column list matching [`summary_at`] for a `users` table alias.
pub(crate) fn summary_columns(alias: &str) -> String {
    format!(
        "{a}.id, {a}.name, {a}.image, {a}.role, {a}.business_name",
        a = alias
    )
}

/// Read the five columns produced by [`summary_columns`], starting at `start`.
pub(crate) fn summary_at(row: &Row<'_>, start: usize) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: uuid_at(row, start)?,
        name: row.get(start + 1)?,
        image: row.get(start + 2)?,
        role: enum_at(row, start + 3)?,
        business_name: row.get(start + 4)?,
    })
}

/// `?1, ?2, ...` placeholders for an `IN (...)` clause.
pub(crate) fn placeholders(count: usize, first: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
pub(crate) mod test_support {
    use meridian_types::models::Role;
    use uuid::Uuid;

    use crate::Database;

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    pub fn user(db: &Database, name: &str) -> Uuid {
        user_with_role(db, name, Role::User)
    }

    pub fn user_with_role(db: &Database, name: &str, role: Role) -> Uuid {
        let email = format!("{}@example.com", name.to_lowercase());
        db.create_user(name, &email, "hash", role).unwrap().unwrap().id
    }
}
