//! Raw stack statuses and their classification.
//!
//! The provider reports stack state as an opaque status string. Nothing in
//! this crate caches one across a decision point: a status can change
//! between polls, so it is re-fetched before every branch. Classification is
//! a lookup over literal tables, not heuristics — each table below is the
//! single source of truth for one policy class.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A raw stack status string as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackStatus(pub String);

impl StackStatus {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StackStatus {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StackStatus {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Statuses indicating an operation is currently running on the stack.
pub const IN_PROGRESS_STATUSES: &[&str] = &[
    "CREATE_IN_PROGRESS",
    "ROLLBACK_IN_PROGRESS",
    "DELETE_IN_PROGRESS",
    "UPDATE_IN_PROGRESS",
    "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
];

/// Statuses a stack can be updated from.
pub const HEALTHY_STATUSES: &[&str] = &["CREATE_COMPLETE", "UPDATE_COMPLETE"];

/// Statuses only deletion recovers from.
///
/// ROLLBACK_COMPLETE means the initial create rolled back; the provider
/// refuses updates from there, so the stack must be deleted and recreated.
pub const BLOCKED_STATUSES: &[&str] = &["ROLLBACK_COMPLETE"];

/// Terminal statuses accepted when tearing a stack down.
pub const DELETE_TERMINAL_STATUSES: &[&str] = &[
    "CREATE_FAILED",
    "DELETE_COMPLETE",
    "DELETE_FAILED",
    "ROLLBACK_FAILED",
    "UPDATE_ROLLBACK_COMPLETE",
    "UPDATE_ROLLBACK_FAILED",
];

/// Terminal statuses of an initial create.
pub const CREATE_TERMINAL_STATUSES: &[&str] = &[
    "CREATE_COMPLETE",
    "CREATE_FAILED",
    "ROLLBACK_COMPLETE",
    "ROLLBACK_FAILED",
];

/// Terminal statuses of an executed update.
pub const UPDATE_TERMINAL_STATUSES: &[&str] = &[
    "UPDATE_COMPLETE",
    "UPDATE_FAILED",
    "UPDATE_ROLLBACK_COMPLETE",
    "UPDATE_ROLLBACK_FAILED",
];

/// Terminal statuses of change set creation.
pub const CHANGE_SET_TERMINAL_STATUSES: &[&str] = &["CREATE_COMPLETE", "FAILED"];

/// Coarse classification of a stack's current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// The stack does not exist.
    Absent,
    /// Safe to update.
    Healthy,
    /// Only deletion recovers from this state.
    Blocked,
    /// An operation is already running remotely.
    InProgress,
    /// Not in any table. Never acted on destructively.
    Unknown,
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Healthy => write!(f, "healthy"),
            Self::Blocked => write!(f, "blocked"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classify a stack's current status. `None` means the stack does not exist.
pub fn classify(status: Option<&StackStatus>) -> StatusClass {
    let Some(status) = status else {
        return StatusClass::Absent;
    };
    let s = status.as_str();
    if IN_PROGRESS_STATUSES.contains(&s) {
        StatusClass::InProgress
    } else if BLOCKED_STATUSES.contains(&s) {
        StatusClass::Blocked
    } else if HEALTHY_STATUSES.contains(&s) {
        StatusClass::Healthy
    } else {
        StatusClass::Unknown
    }
}
