//! Upload session identifiers and lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an upload session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidSessionId(e.to_string()))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upload session lifecycle state.
///
/// Sessions advance along a fixed state machine:
///
/// ```text
///     Init ──► Uploading ──► Assembling ──► Completed
///       │          │              │
///       └──────────┴──────────────┴───────► Failed
/// ```
///
/// `Completed` and `Failed` are terminal. `Uploading` and `Assembling`
/// permit self-transitions so that concurrent first-chunk uploads and
/// assemble retries stay idempotent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Session created, no chunk accepted yet.
    Init,
    /// At least one chunk accepted, still receiving.
    Uploading,
    /// Completion requested, reassembly in progress.
    Assembling,
    /// Final object written and verified.
    Completed,
    /// Session failed or expired.
    Failed,
}

impl SessionStatus {
    /// Check if the session reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Check whether a transition from `self` to `to` is legal.
    pub fn can_transition_to(&self, to: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, to),
            (Init, Uploading)
                | (Uploading, Uploading)
                | (Uploading, Assembling)
                | (Assembling, Assembling)
                | (Assembling, Completed)
                | (Init, Failed)
                | (Uploading, Failed)
                | (Assembling, Failed)
        )
    }

    /// All states from which a transition to `to` is legal.
    pub fn sources_of(to: SessionStatus) -> Vec<SessionStatus> {
        use SessionStatus::*;
        [Init, Uploading, Assembling, Completed, Failed]
            .into_iter()
            .filter(|from| from.can_transition_to(to))
            .collect()
    }

    /// Stable string form used in the database and wire responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Uploading => "uploading",
            Self::Assembling => "assembling",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse from the stable string form.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "init" => Ok(Self::Init),
            "uploading" => Ok(Self::Uploading),
            "assembling" => Ok(Self::Assembling),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(crate::Error::InvalidSessionStatus(other.to_string())),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
