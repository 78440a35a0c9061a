//! Operator accounts and bearer sessions.
//!
//! Tokens are handed to the client once and only their SHA-256 hash is
//! stored. Unknown usernames, wrong passwords and deactivated accounts all
//! fail the same way.

use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::crypto::{self, CryptoError};
use crate::db::{repository, DatabaseError};
use crate::models::{Operator, OperatorPatch};

pub const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_USERNAME_LENGTH: usize = 64;
const MAX_DISPLAY_NAME_LENGTH: usize = 128;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Seed data for a new operator account.
#[derive(Debug, Clone)]
pub struct NewOperator {
    pub username: String,
    pub display_name: String,
    pub password: String,
    pub is_admin: bool,
}

/// Issued on successful login. `access_token` is never stored.
#[derive(Debug, Clone, Serialize)]
pub struct LoginGrant {
    pub access_token: String,
    pub operator: Operator,
    pub expires_at: NaiveDateTime,
}

pub fn create_operator(
    conn: &Connection,
    new: NewOperator,
    now: NaiveDateTime,
) -> Result<Operator, AccountError> {
    create_operator_with(conn, new, crypto::PBKDF2_ITERATIONS, now)
}

/// Same as [`create_operator`] with an explicit PBKDF2 work factor.
pub fn create_operator_with(
    conn: &Connection,
    new: NewOperator,
    iterations: u32,
    now: NaiveDateTime,
) -> Result<Operator, AccountError> {
    let username = new.username.trim().to_string();
    validate_username(&username)?;
    if new.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AccountError::InvalidInput(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    let display_name = match new.display_name.trim() {
        "" => username.clone(),
        name => name.to_string(),
    };

    let operator = Operator {
        id: Uuid::new_v4(),
        username,
        display_name,
        is_admin: new.is_admin,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let hash = crypto::hash_password_with(&new.password, iterations);
    repository::insert_operator(conn, &operator, &hash).map_err(|e| match e {
        DatabaseError::ConstraintViolation(msg) => AccountError::Conflict(msg),
        other => other.into(),
    })?;

    tracing::info!(
        operator_id = %operator.id,
        username = %operator.username,
        is_admin = operator.is_admin,
        "Operator created"
    );
    Ok(operator)
}

/// Apply a self-service profile change. An empty patch returns the
/// operator as stored.
pub fn update_profile(
    conn: &Connection,
    operator_id: &Uuid,
    patch: OperatorPatch,
    now: NaiveDateTime,
) -> Result<Operator, AccountError> {
    if let Some(name) = patch.display_name {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_DISPLAY_NAME_LENGTH {
            return Err(AccountError::InvalidInput(format!(
                "Display name must be 1 to {MAX_DISPLAY_NAME_LENGTH} characters"
            )));
        }
        if !repository::update_operator_display_name(conn, operator_id, name, &now)? {
            return Err(DatabaseError::NotFound {
                entity_type: "operator".into(),
                id: operator_id.to_string(),
            }
            .into());
        }
        tracing::info!(operator_id = %operator_id, "Operator profile updated");
    }
    repository::get_operator(conn, operator_id)?.ok_or_else(|| {
        DatabaseError::NotFound {
            entity_type: "operator".into(),
            id: operator_id.to_string(),
        }
        .into()
    })
}

/// Check credentials and open a session valid for `ttl`.
pub fn login(
    conn: &Connection,
    username: &str,
    password: &str,
    ttl: Duration,
    now: NaiveDateTime,
) -> Result<LoginGrant, AccountError> {
    let Some((operator, stored_hash)) =
        repository::get_operator_credentials(conn, username.trim())?
    else {
        tracing::info!("Login rejected: unknown username");
        return Err(AccountError::InvalidCredentials);
    };

    match crypto::verify_password(password, &stored_hash) {
        Ok(()) => {}
        Err(CryptoError::WrongPassword) => {
            tracing::info!(operator_id = %operator.id, "Login rejected: wrong password");
            return Err(AccountError::InvalidCredentials);
        }
        Err(CryptoError::MalformedHash) => {
            tracing::warn!(operator_id = %operator.id, "Stored password hash is malformed");
            return Err(AccountError::InvalidCredentials);
        }
    }
    if !operator.is_active {
        tracing::info!(operator_id = %operator.id, "Login rejected: account inactive");
        return Err(AccountError::InvalidCredentials);
    }

    let access_token = crypto::generate_token();
    let expires_at = now + ttl;
    repository::insert_session(
        conn,
        &crypto::hash_token(&access_token),
        &operator.id,
        &now,
        &expires_at,
    )?;

    let pruned = repository::prune_expired_sessions(conn, &now)?;
    if pruned > 0 {
        tracing::debug!(pruned, "Expired sessions removed");
    }

    tracing::info!(operator_id = %operator.id, %expires_at, "Session opened");
    Ok(LoginGrant {
        access_token,
        operator,
        expires_at,
    })
}

/// Resolve a bearer token to its operator.
pub fn authenticate(
    conn: &Connection,
    token: &str,
    now: NaiveDateTime,
) -> Result<Operator, AccountError> {
    repository::find_session_operator(conn, &crypto::hash_token(token), &now)?
        .ok_or(AccountError::InvalidCredentials)
}

/// End a session. Returns `false` when the token was unknown.
pub fn logout(conn: &Connection, token: &str) -> Result<bool, AccountError> {
    Ok(repository::delete_session(conn, &crypto::hash_token(token))?)
}

fn validate_username(username: &str) -> Result<(), AccountError> {
    if username.is_empty() || username.len() > MAX_USERNAME_LENGTH {
        return Err(AccountError::InvalidInput(format!(
            "Username must be 1 to {MAX_USERNAME_LENGTH} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(AccountError::InvalidInput(
            "Username may only contain letters, digits, '.', '_' and '-'".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::ts;
    use crate::db::sqlite::open_memory_database;

    const FAST: u32 = 1_000;

    fn new_operator(username: &str, password: &str) -> NewOperator {
        NewOperator {
            username: username.into(),
            display_name: "Dr. Ines Roth".into(),
            password: password.into(),
            is_admin: false,
        }
    }

    #[test]
    fn create_then_login_then_authenticate() {
        let conn = open_memory_database().unwrap();
        let op = create_operator_with(&conn, new_operator("iroth", "s3cret-pass"), FAST, ts(1, 8))
            .unwrap();

        let grant = login(&conn, "iroth", "s3cret-pass", Duration::hours(12), ts(1, 9)).unwrap();
        assert_eq!(grant.operator.id, op.id);
        assert_eq!(grant.expires_at, ts(1, 21));

        let resolved = authenticate(&conn, &grant.access_token, ts(1, 10)).unwrap();
        assert_eq!(resolved.id, op.id);
    }

    #[test]
    fn token_is_not_stored_in_clear() {
        let conn = open_memory_database().unwrap();
        create_operator_with(&conn, new_operator("iroth", "s3cret-pass"), FAST, ts(1, 8)).unwrap();
        let grant = login(&conn, "iroth", "s3cret-pass", Duration::hours(1), ts(1, 9)).unwrap();

        let stored: String = conn
            .query_row("SELECT token_hash FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_ne!(stored, grant.access_token);
        assert_eq!(stored, crypto::hash_token(&grant.access_token));
    }

    #[test]
    fn wrong_password_and_unknown_user_fail_alike() {
        let conn = open_memory_database().unwrap();
        create_operator_with(&conn, new_operator("iroth", "s3cret-pass"), FAST, ts(1, 8)).unwrap();

        let wrong = login(&conn, "iroth", "nope-nope", Duration::hours(1), ts(1, 9)).unwrap_err();
        let unknown = login(&conn, "ghost", "s3cret-pass", Duration::hours(1), ts(1, 9)).unwrap_err();
        assert!(matches!(wrong, AccountError::InvalidCredentials));
        assert!(matches!(unknown, AccountError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[test]
    fn expired_session_rejected() {
        let conn = open_memory_database().unwrap();
        create_operator_with(&conn, new_operator("iroth", "s3cret-pass"), FAST, ts(1, 8)).unwrap();
        let grant = login(&conn, "iroth", "s3cret-pass", Duration::hours(1), ts(1, 9)).unwrap();
        assert!(matches!(
            authenticate(&conn, &grant.access_token, ts(1, 11)),
            Err(AccountError::InvalidCredentials)
        ));
    }

    #[test]
    fn logout_revokes_token() {
        let conn = open_memory_database().unwrap();
        create_operator_with(&conn, new_operator("iroth", "s3cret-pass"), FAST, ts(1, 8)).unwrap();
        let grant = login(&conn, "iroth", "s3cret-pass", Duration::hours(1), ts(1, 9)).unwrap();

        assert!(logout(&conn, &grant.access_token).unwrap());
        assert!(!logout(&conn, &grant.access_token).unwrap());
        assert!(authenticate(&conn, &grant.access_token, ts(1, 9)).is_err());
    }

    #[test]
    fn short_password_rejected() {
        let conn = open_memory_database().unwrap();
        let err = create_operator_with(&conn, new_operator("iroth", "short"), FAST, ts(1, 8))
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidInput(_)));
    }

    #[test]
    fn bad_usernames_rejected() {
        let conn = open_memory_database().unwrap();
        for name in ["", "has space", "semi;colon"] {
            let err = create_operator_with(&conn, new_operator(name, "long-enough"), FAST, ts(1, 8))
                .unwrap_err();
            assert!(matches!(err, AccountError::InvalidInput(_)), "accepted {name:?}");
        }
    }

    #[test]
    fn duplicate_username_is_conflict() {
        let conn = open_memory_database().unwrap();
        create_operator_with(&conn, new_operator("iroth", "s3cret-pass"), FAST, ts(1, 8)).unwrap();
        let err = create_operator_with(&conn, new_operator("iroth", "other-pass"), FAST, ts(1, 8))
            .unwrap_err();
        assert!(matches!(err, AccountError::Conflict(_)));
    }

    #[test]
    fn blank_display_name_falls_back_to_username() {
        let conn = open_memory_database().unwrap();
        let mut new = new_operator("tech01", "s3cret-pass");
        new.display_name = "  ".into();
        let op = create_operator_with(&conn, new, FAST, ts(1, 8)).unwrap();
        assert_eq!(op.display_name, "tech01");
    }

    #[test]
    fn profile_update_trims_and_validates() {
        let conn = open_memory_database().unwrap();
        let op = create_operator_with(&conn, new_operator("iroth", "s3cret-pass"), FAST, ts(1, 8))
            .unwrap();

        let patch = OperatorPatch {
            display_name: Some("  Dr. Ines Roth-Keller ".into()),
        };
        let updated = update_profile(&conn, &op.id, patch, ts(2, 8)).unwrap();
        assert_eq!(updated.display_name, "Dr. Ines Roth-Keller");
        assert_eq!(updated.updated_at, ts(2, 8));

        let blank = OperatorPatch {
            display_name: Some("   ".into()),
        };
        let err = update_profile(&conn, &op.id, blank, ts(2, 9)).unwrap_err();
        assert!(matches!(err, AccountError::InvalidInput(_)));

        let unchanged = update_profile(&conn, &op.id, OperatorPatch::default(), ts(2, 9)).unwrap();
        assert_eq!(unchanged.display_name, "Dr. Ines Roth-Keller");
        assert_eq!(unchanged.updated_at, ts(2, 8));
    }

    #[test]
    fn inactive_operator_cannot_log_in() {
        let conn = open_memory_database().unwrap();
        let op = create_operator_with(&conn, new_operator("iroth", "s3cret-pass"), FAST, ts(1, 8))
            .unwrap();
        conn.execute(
            "UPDATE operators SET is_active = 0 WHERE id = ?1",
            [op.id.to_string()],
        )
        .unwrap();
        assert!(matches!(
            login(&conn, "iroth", "s3cret-pass", Duration::hours(1), ts(1, 9)),
            Err(AccountError::InvalidCredentials)
        ));
    }
}
