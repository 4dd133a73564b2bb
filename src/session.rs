/// Session persistence for codesplice.
///
/// A session is the linear log of conversation turns exchanged with the model,
/// stored as a single JSON array of `{"role", "content"}` objects. The file is
/// read once at startup (if present) and rewritten in full after every
/// successful request so a new process can resume the conversation.
///
/// No locking, no versioning, no migration: load is all-or-nothing and a
/// single writer is assumed.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

// ── Turn ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in the conversation log, tagged with its speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

// ── SessionLog ────────────────────────────────────────────────────────────────

/// Ordered turn history. Always starts with exactly one system turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionLog {
    turns: Vec<Turn>,
}

impl SessionLog {
    /// A fresh log seeded with the system instructions.
    pub fn seeded(instructions: impl Into<String>) -> Self {
        Self { turns: vec![Turn::system(instructions)] }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Drop every turn past `len`. Used to roll back a failed persist.
    pub fn truncate(&mut self, len: usize) {
        self.turns.truncate(len.max(1));
    }
}

// ── Store operations ──────────────────────────────────────────────────────────

/// True iff a regular file is present at `path`.
pub fn exists(path: &Path) -> bool {
    path.is_file()
}

/// Load a session log. Any read or parse problem fails the whole load.
pub fn load(path: &Path) -> Result<SessionLog, SessionError> {
    let raw = std::fs::read_to_string(path).map_err(|e| SessionError::io(path, e))?;
    let log: SessionLog = serde_json::from_str(&raw).map_err(|e| SessionError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if log.turns.is_empty() {
        return Err(SessionError::Corrupt {
            path: path.to_path_buf(),
            reason: "session log holds no turns".to_string(),
        });
    }
    tracing::debug!(path = %path.display(), turns = log.len(), "session loaded");
    Ok(log)
}

/// Overwrite the session file with `log`.
///
/// Writes a staging file next to the target and renames it into place, so a
/// crash mid-write leaves the previous log intact.
pub fn save(log: &SessionLog, path: &Path) -> Result<(), SessionError> {
    let json = serde_json::to_string_pretty(log).map_err(|e| {
        SessionError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SessionError::io(parent, e))?;
    }

    let staging = staging_path(path);
    std::fs::write(&staging, json).map_err(|e| SessionError::io(&staging, e))?;
    if let Err(e) = std::fs::rename(&staging, path) {
        let _ = std::fs::remove_file(&staging);
        return Err(SessionError::io(path, e));
    }
    tracing::debug!(path = %path.display(), turns = log.len(), "session saved");
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "session.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
