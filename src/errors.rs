//! Error taxonomy shared by every client adapter and the sync engine
//! (spec §7). Kept as a single tagged enum so callers can match on `kind`
//! instead of string-sniffing messages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Client credentials absent; the caller should silently skip this client.
    #[error("client not configured")]
    NotConfigured,

    /// Network timeout, 5xx, socket reset; safe to retry with back-off.
    #[error("transient upstream error: {0}")]
    Transient(String),

    /// 401/403 from the upstream service.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource missing on the follower (e.g. book not present there).
    #[error("not found: {0}")]
    NotFound(String),

    /// 409 from the upstream; treated as a successful, idempotent write.
    #[error("conflict")]
    Conflict,

    /// Schema or hash mismatch; the mapping should be flagged, not propagated.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Store unreachable or alignment corrupted; abort the whole cycle.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl SyncError {
    /// True if this error should abort the entire sync cycle rather than
    /// being isolated to the client that produced it (spec §7 recovery policy).
    pub fn is_cycle_fatal(&self) -> bool {
        matches!(self, SyncError::Fatal(_))
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return SyncError::Transient(err.to_string());
        }
        match err.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                SyncError::Unauthorized
            }
            Some(status) if status.as_u16() == 404 => SyncError::NotFound(err.to_string()),
            Some(status) if status.as_u16() == 409 => SyncError::Conflict,
            Some(status) if status.is_server_error() => SyncError::Transient(err.to_string()),
            _ => SyncError::Transient(err.to_string()),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
