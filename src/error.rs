//! Crate-wide error taxonomy (spec §7)

use thiserror::Error;

/// Errors produced by the matchmaking core.
///
/// Each variant corresponds to one row of the error taxonomy table: a kind,
/// the condition that produces it, and a user-visible meaning. Handlers
/// upstream of the core map these onto whatever status representation their
/// transport uses; this crate never drops the session on any of these.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Unassigned list empty or all ranked candidates filtered out.
    #[error("no available servers")]
    NoAvailableServers,

    /// 5 second ping deadline elapsed without results.
    #[error("timed out waiting for ping results")]
    PingTimeout,

    /// The session context was cancelled while an operation was pending.
    #[error("operation cancelled")]
    Cancelled,

    /// Backfill requested on a private lobby, or a malformed match id.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `JoinAttempt` against a match id the registry has no record of.
    #[error("not found")]
    NotFound,

    /// Join rejected because the lobby is still unassigned.
    #[error("lobby is not yet assigned a level")]
    FailedPrecondition,

    /// Duplicate join attempt for a session already in the match.
    #[error("already joined")]
    AlreadyExists,

    /// Non-moderator attempted to join a moderator-only team/lobby.
    #[error("permission denied")]
    PermissionDenied,

    /// The target lobby has no free seats.
    #[error("lobby is full")]
    ResourceExhausted,

    /// Label decode, storage, or signal dispatch failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns the stable kind name, useful for metrics/log fields without
    /// matching on (and thus coupling call sites to) the full enum.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NoAvailableServers => "no_available_servers",
            CoreError::PingTimeout => "ping_timeout",
            CoreError::Cancelled => "cancelled",
            CoreError::InvalidArgument(_) => "invalid_argument",
            CoreError::NotFound => "not_found",
            CoreError::FailedPrecondition => "failed_precondition",
            CoreError::AlreadyExists => "already_exists",
            CoreError::PermissionDenied => "permission_denied",
            CoreError::ResourceExhausted => "resource_exhausted",
            CoreError::Internal(_) => "internal",
        }
    }

    /// Whether a caller may retry the same request, possibly after a
    /// backoff, without changing anything about it.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::NoAvailableServers
                | CoreError::PingTimeout
                | CoreError::FailedPrecondition
                | CoreError::Internal(_)
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
