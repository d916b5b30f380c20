//! Core convergence logic for single-stack deployments.
//!
//! This crate holds the pieces with real control-flow policy and no provider
//! I/O:
//! - `status`: the literal status tables and the pure classifier every
//!   branch decision goes through.
//! - `wait`: the bounded polling loop every higher-level wait is built on.
//! - `params`: the `key=value` override grammar, tag JSON parsing, and ARN
//!   list splitting used to assemble a deployment request.
//! - `error`: the failure taxonomy a convergence run can surface.
//!
//! Provider calls, the stack client, and the reconciliation engine live in
//! the `stackform` crate; everything here is testable without a network.

pub mod error;
pub mod params;
pub mod status;
pub mod wait;

pub use error::ConvergeError;
pub use params::{parse_arn_list, parse_parameter_overrides, parse_tags, Parameter, Tag};
pub use status::{
    classify, StackStatus, StatusClass, CHANGE_SET_TERMINAL_STATUSES, CREATE_TERMINAL_STATUSES,
    DELETE_TERMINAL_STATUSES, UPDATE_TERMINAL_STATUSES,
};
pub use wait::{wait_for_status, WaitOutcome, POLL_INTERVAL};
