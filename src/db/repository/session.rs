use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::operator::OperatorRow;
use super::{format_ts, parse_ts};
use crate::db::DatabaseError;
use crate::models::Operator;

/// Store a bearer session. Only the token hash is persisted.
pub fn insert_session(
    conn: &Connection,
    token_hash: &str,
    operator_id: &Uuid,
    created_at: &NaiveDateTime,
    expires_at: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sessions (token_hash, operator_id, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            token_hash,
            operator_id.to_string(),
            format_ts(created_at),
            format_ts(expires_at),
        ],
    )?;
    Ok(())
}

/// Resolve a token hash to its active operator. Expired sessions and
/// deactivated operators resolve to `None`.
pub fn find_session_operator(
    conn: &Connection,
    token_hash: &str,
    now: &NaiveDateTime,
) -> Result<Option<Operator>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT o.id, o.username, o.display_name, o.is_admin, o.is_active,
                    o.created_at, o.updated_at, s.expires_at
             FROM sessions s JOIN operators o ON o.id = s.operator_id
             WHERE s.token_hash = ?1",
            params![token_hash],
            |row| Ok((OperatorRow::from_row(row)?, row.get::<_, String>(7)?)),
        )
        .optional()?;

    let Some((op_row, expires_at)) = row else {
        return Ok(None);
    };
    let expires_at = parse_ts("sessions.expires_at", &expires_at)?;
    if expires_at <= *now {
        return Ok(None);
    }
    let operator = op_row.into_operator()?;
    if !operator.is_active {
        return Ok(None);
    }
    Ok(Some(operator))
}

pub fn delete_session(conn: &Connection, token_hash: &str) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM sessions WHERE token_hash = ?1",
        params![token_hash],
    )?;
    Ok(deleted > 0)
}

/// Drop sessions whose expiry has passed. Returns the number removed.
pub fn prune_expired_sessions(
    conn: &Connection,
    now: &NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= ?1",
        params![format_ts(now)],
    )?;
    Ok(deleted)
}
