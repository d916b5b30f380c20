//! Failure taxonomy for a convergence run.
//!
//! Recoverable conditions (stack busy, stack blocked, no-op change set with
//! the opt-in flag) are absorbed inside the engine and never appear here.
//! Everything below ends the run.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvergeError {
    /// Change set creation failed for a reason other than an accepted no-op.
    #[error("failed to create change set for stack {stack}: {reason}")]
    ChangeSetFailed { stack: String, reason: String },

    /// A bounded wait exhausted its budget.
    #[error("timed out after {budget:?} waiting for {operation} on stack {stack}")]
    Timeout {
        stack: String,
        operation: &'static str,
        budget: Duration,
    },

    /// The external cancellation signal fired.
    #[error("cancelled while waiting for {operation} on stack {stack}")]
    Cancelled {
        stack: String,
        operation: &'static str,
    },

    /// The stack disappeared while an operation on it was being awaited.
    #[error("stack {stack} not found while waiting for {operation}")]
    StackVanished {
        stack: String,
        operation: &'static str,
    },

    /// The stack is in a status no table classifies; acting on it could
    /// destroy state, so the run refuses to proceed.
    #[error("stack {stack} is in unrecognized status {status}; refusing to act on it")]
    UnrecognizedStatus { stack: String, status: String },

    /// An operation ended in a terminal status other than the expected one.
    #[error("{operation} of stack {stack} ended in status {status}")]
    OperationFailed {
        stack: String,
        operation: &'static str,
        status: String,
    },

    /// Any other provider failure, propagated unchanged.
    #[error("provider call failed: {0}")]
    Provider(String),

    #[error("unable to read template file {path}: {source}")]
    TemplateRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid run configuration or malformed input documents.
    #[error("{0}")]
    Config(String),
}
