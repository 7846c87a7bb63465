use ulid::Ulid;

use super::conflict::ConflictKind;

#[derive(Debug)]
pub enum EngineError {
    /// Malformed or missing input. Resolved before any lock or storage
    /// access; never retried automatically.
    Validation(String),
    NotFound(Ulid),
    AlreadyExists(Ulid),
    FieldInactive(Ulid),
    /// Expected and frequent; the caller should re-query availability.
    Conflict(ConflictKind),
    /// The idempotency key was already used; carries the original booking id.
    DuplicateSubmission(Ulid),
    LimitExceeded(&'static str),
    /// The atomic unit could not commit. Safe to retry from scratch.
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "invalid request: {msg}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::FieldInactive(id) => write!(f, "field {id} is not accepting bookings"),
            EngineError::Conflict(kind) => write!(f, "{kind}"),
            EngineError::DuplicateSubmission(id) => {
                write!(f, "duplicate submission: already created booking {id}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }
}
