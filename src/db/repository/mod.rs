//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `rusqlite::Connection`; callers own the
//! connection and any surrounding transaction.

mod activity;
mod operator;
mod patient;
mod session;

use std::str::FromStr;

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::DatabaseError;

// Re-export all public items from sub-modules
pub use activity::*;
pub use diagnostic_test::*;
pub use operator::*;
pub use patient::*;
pub use session::*;

/// Storage format for every timestamp column. `%.f` keeps sub-second
/// precision only when present, so values round-trip exactly.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub(crate) fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_ts(field: &str, raw: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|e| DatabaseError::InvalidValue {
        field: field.into(),
        reason: format!("{raw}: {e}"),
    })
}

pub(crate) fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::from_str(raw).map_err(|e| DatabaseError::InvalidValue {
        field: field.into(),
        reason: format!("{raw}: {e}"),
    })
}

/// True when `err` is a UNIQUE constraint failure.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
