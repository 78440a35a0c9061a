use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{format_ts, is_unique_violation, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::Operator;

const OPERATOR_COLUMNS: &str =
    "id, username, display_name, is_admin, is_active, created_at, updated_at";

pub fn insert_operator(
    conn: &Connection,
    op: &Operator,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO operators (id, username, display_name, password_hash, is_admin, is_active,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            op.id.to_string(),
            op.username,
            op.display_name,
            password_hash,
            op.is_admin as i32,
            op.is_active as i32,
            format_ts(&op.created_at),
            format_ts(&op.updated_at),
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            DatabaseError::ConstraintViolation(format!("Username already taken: {}", op.username))
        } else {
            e.into()
        }
    })?;
    Ok(())
}

pub fn get_operator(conn: &Connection, id: &Uuid) -> Result<Option<Operator>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {OPERATOR_COLUMNS} FROM operators WHERE id = ?1"),
            params![id.to_string()],
            OperatorRow::from_row,
        )
        .optional()?;
    row.map(OperatorRow::into_operator).transpose()
}

/// Returns `false` when no operator has this id.
pub fn update_operator_display_name(
    conn: &Connection,
    id: &Uuid,
    display_name: &str,
    now: &NaiveDateTime,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE operators SET display_name = ?1, updated_at = ?2 WHERE id = ?3",
        params![display_name, format_ts(now), id.to_string()],
    )?;
    Ok(changed > 0)
}

/// Look up an operator and its password hash by username (login path).
pub fn get_operator_credentials(
    conn: &Connection,
    username: &str,
) -> Result<Option<(Operator, String)>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {OPERATOR_COLUMNS}, password_hash FROM operators WHERE username = ?1"),
            params![username],
            |row| Ok((OperatorRow::from_row(row)?, row.get::<_, String>(7)?)),
        )
        .optional()?;
    match row {
        Some((op_row, hash)) => Ok(Some((op_row.into_operator()?, hash))),
        None => Ok(None),
    }
}

pub(super) struct OperatorRow {
    id: String,
    username: String,
    display_name: String,
    is_admin: i32,
    is_active: i32,
    created_at: String,
    updated_at: String,
}

impl OperatorRow {
    /// Reads the seven operator columns starting at index 0.
    pub(super) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            display_name: row.get(2)?,
            is_admin: row.get(3)?,
            is_active: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    pub(super) fn into_operator(self) -> Result<Operator, DatabaseError> {
        Ok(Operator {
            id: parse_uuid("operators.id", &self.id)?,
            username: self.username,
            display_name: self.display_name,
            is_admin: self.is_admin != 0,
            is_active: self.is_active != 0,
            created_at: parse_ts("operators.created_at", &self.created_at)?,
            updated_at: parse_ts("operators.updated_at", &self.updated_at)?,
        })
    }
}
