//! The reconciliation engine.
//!
//! One run derives the stack's state from a fresh describe — never from
//! anything cached — and drives it toward the requested template:
//!
//! ```text
//! describe ─ classify
//!   ├─ in-progress → bounded busy wait (40 × 3 s), then continue best-effort
//!   ├─ blocked     → delete, await absence, then treat as absent
//!   ├─ absent      → create, await CREATE_COMPLETE
//!   ├─ healthy     → change set: create → settle → execute → await
//!   └─ unknown     → refuse to act
//! ```
//!
//! Two concurrent runs against the same stack name are a real hazard: the
//! only mitigation is detecting in-progress operations and waiting, not a
//! lock. That is acceptable for the intended one-pipeline-at-a-time use and
//! is a documented limitation, not something to fix here silently.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use convergence::{
    classify, ConvergeError, StackStatus, StatusClass, WaitOutcome, DELETE_TERMINAL_STATUSES,
    POLL_INTERVAL, UPDATE_TERMINAL_STATUSES,
};

use crate::client::{settle, StackClient};
use crate::provider::{is_no_changes_reason, ChangeSetDescription, StackApi, StackDescription};
use crate::request::DeployRequest;

/// Sentinel stack id when the real one cannot be determined.
pub const UNKNOWN_STACK_ID: &str = "unknown";

/// Polls spent waiting for an in-flight operation before continuing
/// best-effort. 40 × 3 s ≈ two minutes.
pub const BUSY_RETRY_ATTEMPTS: u32 = 40;

/// Knobs that change how an update attempt is settled.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Treat a change set with an empty diff as success, not failure.
    pub no_fail_on_empty_changeset: bool,
    /// Create the change set but never execute it.
    pub no_execute_changeset: bool,
    /// Leave failed change sets in place instead of cleaning them up.
    pub no_delete_failed_changeset: bool,
}

/// Result of one successful convergence run.
#[derive(Debug)]
pub struct DeployOutcome {
    pub stack_id: String,
    pub outputs: BTreeMap<String, String>,
}

pub struct DeployEngine<S: StackApi> {
    client: StackClient<S>,
    options: EngineOptions,
}

fn class_of(stack: &Option<StackDescription>) -> StatusClass {
    let status = stack
        .as_ref()
        .map(|s| StackStatus::from(s.stack_status.as_str()));
    classify(status.as_ref())
}

impl<S: StackApi> DeployEngine<S> {
    pub fn new(client: StackClient<S>, options: EngineOptions) -> Self {
        Self { client, options }
    }

    /// Converge the stack to the requested state and collect its outputs.
    pub async fn deploy(&self, request: &DeployRequest) -> Result<DeployOutcome, ConvergeError> {
        let mut stack = self.client.describe(&request.stack_name).await?;

        if class_of(&stack) == StatusClass::InProgress {
            stack = self.wait_while_busy(&request.stack_name, stack).await?;
        }

        if class_of(&stack) == StatusClass::Blocked {
            let status = stack
                .as_ref()
                .map(|s| s.stack_status.clone())
                .unwrap_or_default();
            info!(
                stack = %request.stack_name,
                status = %status,
                "stack cannot be updated from this status, deleting before recreating"
            );
            self.client.delete_stack(&request.stack_name).await?;
            self.wait_for_absence(&request.stack_name, request.timeout).await?;
            stack = None;
        }

        if class_of(&stack) == StatusClass::Unknown {
            // Never update or delete on a status no table recognizes.
            let status = stack
                .as_ref()
                .map(|s| s.stack_status.clone())
                .unwrap_or_default();
            return Err(ConvergeError::UnrecognizedStatus {
                stack: request.stack_name.clone(),
                status,
            });
        }

        let stack_id = match stack {
            None => {
                info!(stack = %request.stack_name, "stack does not exist, creating it");
                self.client.create(request).await?
            }
            Some(existing) => self.update(request, &existing).await?,
        };

        let outputs = self.client.outputs(&stack_id).await?;
        Ok(DeployOutcome { stack_id, outputs })
    }

    /// Delete the stack and wait for it to finish deleting, within `budget`.
    /// A stack that is already gone counts as success.
    pub async fn teardown(&self, stack_name: &str, budget: Duration) -> Result<(), ConvergeError> {
        info!(stack = stack_name, "deleting stack");
        self.client.delete_stack(stack_name).await?;

        match self
            .client
            .wait_for_stack(stack_name, DELETE_TERMINAL_STATUSES, budget)
            .await
        {
            WaitOutcome::Success(status) if status.as_str() == "DELETE_COMPLETE" => Ok(()),
            WaitOutcome::StackNotFound => Ok(()),
            WaitOutcome::Success(status) => Err(ConvergeError::OperationFailed {
                stack: stack_name.to_string(),
                operation: "delete",
                status: status.to_string(),
            }),
            WaitOutcome::Timeout(_) => Err(ConvergeError::Timeout {
                stack: stack_name.to_string(),
                operation: "delete",
                budget,
            }),
            WaitOutcome::Cancelled => Err(ConvergeError::Cancelled {
                stack: stack_name.to_string(),
                operation: "delete",
            }),
            WaitOutcome::Error(message) => Err(ConvergeError::Provider(message)),
        }
    }

    /// Re-describe on the shared cadence until the stack leaves its
    /// in-progress status or the retry budget runs out. Exhausting the
    /// budget does not fail the run: the engine continues best-effort and
    /// lets the next provider call surface any conflict.
    async fn wait_while_busy(
        &self,
        stack_name: &str,
        mut stack: Option<StackDescription>,
    ) -> Result<Option<StackDescription>, ConvergeError> {
        let mut attempts = 0u32;
        while attempts < BUSY_RETRY_ATTEMPTS && class_of(&stack) == StatusClass::InProgress {
            attempts += 1;
            debug!(stack = stack_name, attempt = attempts, "operation in progress, waiting");
            tokio::select! {
                biased;
                _ = self.client.cancel_token().cancelled() => {
                    return Err(ConvergeError::Cancelled {
                        stack: stack_name.to_string(),
                        operation: "in-progress operation",
                    });
                }
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }
            stack = self.client.describe(stack_name).await?;
        }

        if class_of(&stack) == StatusClass::InProgress {
            warn!(
                stack = stack_name,
                attempts, "stack still busy after retry budget, continuing best-effort"
            );
        }
        Ok(stack)
    }

    /// Wait until the stack is gone, within `budget` (zero waits forever —
    /// the default, matching the runs this tool replaces).
    async fn wait_for_absence(
        &self,
        stack_name: &str,
        budget: Duration,
    ) -> Result<(), ConvergeError> {
        match self
            .client
            .wait_for_stack(stack_name, &["DELETE_COMPLETE"], budget)
            .await
        {
            WaitOutcome::Success(_) | WaitOutcome::StackNotFound => Ok(()),
            WaitOutcome::Cancelled => Err(ConvergeError::Cancelled {
                stack: stack_name.to_string(),
                operation: "deletion",
            }),
            WaitOutcome::Timeout(_) => Err(ConvergeError::Timeout {
                stack: stack_name.to_string(),
                operation: "deletion",
                budget,
            }),
            WaitOutcome::Error(message) => Err(ConvergeError::Provider(message)),
        }
    }

    /// Update the stack through a change set.
    async fn update(
        &self,
        request: &DeployRequest,
        existing: &StackDescription,
    ) -> Result<String, ConvergeError> {
        let existing_id = existing
            .stack_id
            .clone()
            .unwrap_or_else(|| UNKNOWN_STACK_ID.to_string());
        let change_set_name = request.change_set_name();

        self.client.create_change_set(request, &change_set_name).await?;
        let description = self
            .client
            .wait_for_change_set(&request.stack_name, &change_set_name)
            .await?;

        if description.status == "FAILED" {
            return self
                .settle_failed_change_set(request, &change_set_name, description, existing_id)
                .await;
        }

        if self.options.no_execute_changeset {
            debug!(stack = %request.stack_name, "not executing the change set");
            return Ok(existing_id);
        }

        self.client
            .execute_change_set(&request.stack_name, &change_set_name)
            .await?;
        let outcome = self
            .client
            .wait_for_stack(&request.stack_name, UPDATE_TERMINAL_STATUSES, Duration::ZERO)
            .await;
        settle(outcome, &request.stack_name, "update", "UPDATE_COMPLETE")?;
        Ok(existing_id)
    }

    /// A change set that failed to create is either a real failure or an
    /// empty diff. Clean it up first (unless told not to), then decide.
    async fn settle_failed_change_set(
        &self,
        request: &DeployRequest,
        change_set_name: &str,
        description: ChangeSetDescription,
        existing_id: String,
    ) -> Result<String, ConvergeError> {
        let reason = description
            .status_reason
            .unwrap_or_else(|| "no failure reason reported".to_string());
        debug!(stack = %request.stack_name, reason = %reason, "change set failed to create");

        if !self.options.no_delete_failed_changeset {
            if let Err(e) = self
                .client
                .delete_change_set(&request.stack_name, change_set_name)
                .await
            {
                warn!(error = %e, "failed to clean up failed change set");
            }
        }

        if self.options.no_fail_on_empty_changeset && is_no_changes_reason(&reason) {
            info!(
                stack = %request.stack_name,
                "template produced no changes, treating as success"
            );
            return Ok(existing_id);
        }

        Err(ConvergeError::ChangeSetFailed {
            stack: request.stack_name.clone(),
            reason,
        })
    }
}
