//! The desired-state input for one convergence run.

use std::time::Duration;

use convergence::{Parameter, Tag};

use crate::template::TemplateSource;

#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// The reconciliation key.
    pub stack_name: String,
    pub template: TemplateSource,
    /// Acknowledgement tokens passed through to the provider verbatim.
    pub capabilities: Vec<String>,
    /// Ordered parameter overrides, keys unique.
    pub parameters: Vec<Parameter>,
    pub tags: Vec<Tag>,
    pub role_arn: Option<String>,
    pub notification_arns: Option<Vec<String>>,
    pub disable_rollback: bool,
    /// Applied on create only; the provider does not accept it on change
    /// sets.
    pub termination_protection: bool,
    /// Budget for bounded waits. Zero waits forever.
    pub timeout: Duration,
}

impl DeployRequest {
    /// Deterministic change set name. One change set exists per stack per
    /// update attempt; deriving the name from the stack name keeps retries
    /// within a run from colliding.
    pub fn change_set_name(&self) -> String {
        format!("{}-CS", self.stack_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_set_name_is_derived_from_stack_name() {
        let request = DeployRequest {
            stack_name: "orders-api".to_string(),
            template: TemplateSource::Body(String::new()),
            capabilities: Vec::new(),
            parameters: Vec::new(),
            tags: Vec::new(),
            role_arn: None,
            notification_arns: None,
            disable_rollback: false,
            termination_protection: false,
            timeout: Duration::ZERO,
        };
        assert_eq!(request.change_set_name(), "orders-api-CS");
    }
}
