use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{format_ts, parse_ts};
use crate::db::DatabaseError;

/// One operator action, e.g. `create_test` with the test id as details.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ActivityEntry {
    pub timestamp: NaiveDateTime,
    pub operator_id: Option<Uuid>,
    pub action: String,
    pub details: Option<String>,
}

pub fn insert_activity(conn: &Connection, entry: &ActivityEntry) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO activity_log (timestamp, operator_id, action, details) VALUES (?1, ?2, ?3, ?4)",
        params![
            format_ts(&entry.timestamp),
            entry.operator_id.map(|id| id.to_string()),
            entry.action,
            entry.details,
        ],
    )?;
    Ok(())
}

/// Most recent entries first.
pub fn list_activity_for_operator(
    conn: &Connection,
    operator_id: &Uuid,
    limit: u32,
) -> Result<Vec<ActivityEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, action, details FROM activity_log
         WHERE operator_id = ?1
         ORDER BY timestamp DESC, id DESC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![operator_id.to_string(), limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(timestamp, action, details)| {
            Ok(ActivityEntry {
                timestamp: parse_ts("activity_log.timestamp", &timestamp)?,
                operator_id: Some(*operator_id),
                action,
                details,
            })
        })
        .collect()
}
