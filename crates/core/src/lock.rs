//! Project lock decisions.
//!
//! A project is exclusively held when `lock_session_id` is set and
//! `lock_expires_at` lies in the future. An expired lock is void: any session
//! may take it over without an explicit release. The repository layer runs
//! these checks inside a row-locked transaction so they are linearizable per
//! project.

use chrono::Duration;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Default lock lifetime: 5 minutes.
pub const DEFAULT_LOCK_TTL_SECS: i64 = 300;

/// Longest accepted session identifier.
const MAX_SESSION_ID_LEN: usize = 128;

/// The lock columns of a project row.
#[derive(Debug, Clone, Copy)]
pub struct LockState<'a> {
    pub session_id: Option<&'a str>,
    pub expires_at: Option<Timestamp>,
}

impl<'a> LockState<'a> {
    pub fn new(session_id: Option<&'a str>, expires_at: Option<Timestamp>) -> Self {
        Self {
            session_id,
            expires_at,
        }
    }

    /// The session currently holding a valid lock, if any.
    pub fn holder(&self, now: Timestamp) -> Option<&'a str> {
        match (self.session_id, self.expires_at) {
            (Some(session), Some(expires)) if expires > now => Some(session),
            _ => None,
        }
    }

    pub fn is_held(&self, now: Timestamp) -> bool {
        self.holder(now).is_some()
    }

    /// Held by a session other than `session_id`.
    pub fn is_held_by_other(&self, session_id: &str, now: Timestamp) -> bool {
        self.holder(now).is_some_and(|holder| holder != session_id)
    }
}

/// Reject empty or oversized session identifiers.
pub fn validate_session_id(session_id: &str) -> Result<(), CoreError> {
    if session_id.trim().is_empty() {
        return Err(CoreError::Validation("session_id must not be empty".into()));
    }
    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(CoreError::Validation(format!(
            "session_id must be at most {MAX_SESSION_ID_LEN} characters"
        )));
    }
    Ok(())
}

/// Decide whether `session_id` may acquire the lock.
///
/// Returns the new expiry on success. The current holder re-acquiring
/// extends its lease.
pub fn check_acquire(
    state: LockState<'_>,
    session_id: &str,
    now: Timestamp,
    ttl_secs: i64,
) -> Result<Timestamp, CoreError> {
    validate_session_id(session_id)?;
    if state.is_held_by_other(session_id, now) {
        return Err(CoreError::LockConflict(
            "Project is locked by another session".into(),
        ));
    }
    Ok(now + Duration::seconds(ttl_secs))
}

/// Decide whether `session_id` may release the lock.
///
/// Only a different session holding a still-valid lock is refused; an
/// expired or absent lock may be cleared by anyone.
pub fn check_release(
    state: LockState<'_>,
    session_id: &str,
    now: Timestamp,
) -> Result<(), CoreError> {
    validate_session_id(session_id)?;
    if state.is_held_by_other(session_id, now) {
        return Err(CoreError::Forbidden(
            "Project lock is held by another session".into(),
        ));
    }
    Ok(())
}

/// Gate a workflow command on the project lock.
///
/// While a valid lock exists, only commands carrying the holder's session
/// are accepted.
pub fn check_command_access(
    state: LockState<'_>,
    session_id: Option<&str>,
    now: Timestamp,
) -> Result<(), CoreError> {
    match (state.holder(now), session_id) {
        (Some(holder), Some(session)) if holder == session => Ok(()),
        (Some(_), _) => Err(CoreError::LockConflict(
            "Project is locked by another session".into(),
        )),
        (None, _) => Ok(()),
    }
}
