use thiserror::Error;

/// Errors that can arise while running a game operation.
///
/// The first four variants are recoverable by the player: their `Display`
/// output is the exact text shown back in chat. Everything else is an
/// internal failure that the dispatcher logs and hides behind a generic reply.
#[derive(Debug, Error)]
pub enum GameError {
    /// Bad argument shape or value (negative amount, unknown strategy, crop or item key).
    #[error("{0}")]
    Validation(String),

    /// Cooldown still active, insufficient balance, limit exceeded or a terminal state.
    #[error("{0}")]
    Precondition(String),

    /// Non-admin attempting an admin-only operation.
    #[error("{0}")]
    PermissionDenied(String),

    /// Unknown player, backup file, VIP code or red packet.
    #[error("{0}")]
    NotFound(String),

    /// Wrapper around IO errors (state file, backups directory).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around JSON serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error (task join errors, unexpected conditions)
    #[error("internal error: {0}")]
    Internal(String),
}

impl GameError {
    pub fn validation(msg: impl Into<String>) -> Self {
        GameError::Validation(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        GameError::Precondition(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        GameError::NotFound(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        GameError::PermissionDenied(msg.into())
    }

    /// True when the message can be shown to the player verbatim.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            GameError::Validation(_)
                | GameError::Precondition(_)
                | GameError::PermissionDenied(_)
                | GameError::NotFound(_)
        )
    }
}

pub type GameResult<T> = Result<T, GameError>;
