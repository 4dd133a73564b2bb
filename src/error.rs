/// Error taxonomy for codesplice.
///
/// Every failure aborts only the command that produced it. The TUI logs the
/// kind and shows it in the status bar; nothing is retried.
use std::path::PathBuf;

use thiserror::Error;

// ── Session store ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt session file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl SessionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

// ── Completion client ─────────────────────────────────────────────────────────

/// Which part of a completion response was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyCompletion {
    NoChoices,
    NoMessage,
    NoContent,
}

impl std::fmt::Display for EmptyCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let what = match self {
            EmptyCompletion::NoChoices => "response carried no choices",
            EmptyCompletion::NoMessage => "chosen result carried no message",
            EmptyCompletion::NoContent => "message carried no content",
        };
        f.write_str(what)
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    /// The service answered, but with nothing usable.
    #[error("empty completion: {0}")]
    Empty(EmptyCompletion),

    /// The service could not be reached or the body could not be read.
    #[error("completion service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed completion response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<EmptyCompletion> for CompletionError {
    fn from(kind: EmptyCompletion) -> Self {
        Self::Empty(kind)
    }
}

// ── Conversation ──────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AskError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl AskError {
    /// The missing-field kind when the service returned nothing usable.
    #[cfg(test)]
    pub fn empty_kind(&self) -> Option<EmptyCompletion> {
        match self {
            AskError::Completion(CompletionError::Empty(kind)) => Some(*kind),
            _ => None,
        }
    }
}

// ── Interaction commands ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cancelled")]
    UserCancelled,

    #[error("no active selection")]
    NoSelection,

    #[error("a request is already in flight")]
    Busy,

    /// The task running the request died before handing back its result.
    #[error("edit task failed: {reason}")]
    TaskFailed { reason: String },

    #[error(transparent)]
    Ask(#[from] AskError),
}

impl CommandError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Short stable label used in log records.
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::Io { .. } => "io_failure",
            CommandError::UserCancelled => "user_cancelled",
            CommandError::NoSelection => "no_selection",
            CommandError::Busy => "busy",
            CommandError::TaskFailed { .. } => "task_failed",
            CommandError::Ask(AskError::Session(SessionError::Io { .. })) => "io_failure",
            CommandError::Ask(AskError::Session(SessionError::Corrupt { .. })) => "corrupt_session",
            CommandError::Ask(AskError::Completion(CompletionError::Empty(_))) => "empty_completion",
            CommandError::Ask(AskError::Completion(_)) => "completion_failed",
        }
    }
}
