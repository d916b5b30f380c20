//! The stack client: engine intents over raw provider operations.
//!
//! Translates "create and wait", "settle a change set", "flatten outputs"
//! into [`StackApi`] calls plus the shared polling primitive, and maps
//! classified provider errors into the run's error vocabulary.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use convergence::{
    wait_for_status, ConvergeError, StackStatus, WaitOutcome, CHANGE_SET_TERMINAL_STATUSES,
    CREATE_TERMINAL_STATUSES,
};

use crate::provider::{ChangeSetDescription, ProviderError, StackApi, StackDescription};
use crate::request::DeployRequest;

pub struct StackClient<S> {
    api: S,
    cancel: CancellationToken,
}

impl<S: StackApi> StackClient<S> {
    pub fn new(api: S, cancel: CancellationToken) -> Self {
        Self { api, cancel }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Describe the stack. `None` when the provider reports it does not
    /// exist — a valid state, not an error. Anything else is re-raised.
    pub async fn describe(
        &self,
        name_or_id: &str,
    ) -> Result<Option<StackDescription>, ProviderError> {
        match self.api.describe_stacks(name_or_id).await {
            Ok(stacks) => Ok(stacks.into_iter().find(|s| {
                s.stack_name == name_or_id || s.stack_id.as_deref() == Some(name_or_id)
            })),
            Err(ProviderError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Current status of the stack, or `None` when it does not exist.
    pub async fn status(&self, name_or_id: &str) -> Result<Option<StackStatus>, ProviderError> {
        Ok(self
            .describe(name_or_id)
            .await?
            .map(|s| StackStatus::from(s.stack_status)))
    }

    /// Wait for the stack to reach one of `statuses`, on the shared poll
    /// cadence. `Duration::ZERO` waits forever.
    pub async fn wait_for_stack(
        &self,
        name_or_id: &str,
        statuses: &[&str],
        budget: Duration,
    ) -> WaitOutcome {
        wait_for_status(
            || self.status(name_or_id),
            statuses,
            budget,
            &self.cancel,
        )
        .await
    }

    /// Create the stack and wait — unbounded, by design contract — for a
    /// create-terminal status. Returns the provider-assigned stack id.
    pub async fn create(&self, request: &DeployRequest) -> Result<String, ConvergeError> {
        debug!(stack = %request.stack_name, "creating stack");
        let stack_id = self.api.create_stack(request).await?;

        let outcome = self
            .wait_for_stack(&request.stack_name, CREATE_TERMINAL_STATUSES, Duration::ZERO)
            .await;
        settle(outcome, &request.stack_name, "create", "CREATE_COMPLETE")?;
        Ok(stack_id)
    }

    /// Issue a delete. Deleting a stack that is already gone is a no-op
    /// success, not an error.
    pub async fn delete_stack(&self, name_or_id: &str) -> Result<(), ConvergeError> {
        debug!(stack = name_or_id, "deleting stack");
        match self.api.delete_stack(name_or_id).await {
            Ok(()) => Ok(()),
            Err(ProviderError::NotFound(_)) => {
                debug!(stack = name_or_id, "stack already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn create_change_set(
        &self,
        request: &DeployRequest,
        change_set_name: &str,
    ) -> Result<(), ConvergeError> {
        debug!(stack = %request.stack_name, change_set = change_set_name, "creating change set");
        Ok(self.api.create_change_set(request, change_set_name).await?)
    }

    /// Wait for change set creation to settle, then return the full
    /// description so the caller can read the failure reason if any.
    pub async fn wait_for_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<ChangeSetDescription, ConvergeError> {
        let outcome = wait_for_status(
            || {
                let api = &self.api;
                async move {
                    api.describe_change_set(stack_name, change_set_name)
                        .await
                        .map(|d| Some(StackStatus::from(d.status)))
                }
            },
            CHANGE_SET_TERMINAL_STATUSES,
            Duration::ZERO,
            &self.cancel,
        )
        .await;

        match outcome {
            WaitOutcome::Success(_) => Ok(self
                .api
                .describe_change_set(stack_name, change_set_name)
                .await?),
            WaitOutcome::StackNotFound => Err(ConvergeError::ChangeSetFailed {
                stack: stack_name.to_string(),
                reason: "change set disappeared while waiting for it to settle".to_string(),
            }),
            WaitOutcome::Cancelled => Err(ConvergeError::Cancelled {
                stack: stack_name.to_string(),
                operation: "change set creation",
            }),
            WaitOutcome::Timeout(_) => Err(ConvergeError::Timeout {
                stack: stack_name.to_string(),
                operation: "change set creation",
                budget: Duration::ZERO,
            }),
            WaitOutcome::Error(message) => Err(ConvergeError::Provider(message)),
        }
    }

    pub async fn execute_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<(), ConvergeError> {
        debug!(stack = stack_name, change_set = change_set_name, "executing change set");
        Ok(self
            .api
            .execute_change_set(stack_name, change_set_name)
            .await?)
    }

    pub async fn delete_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<(), ConvergeError> {
        debug!(stack = stack_name, change_set = change_set_name, "deleting change set");
        Ok(self
            .api
            .delete_change_set(stack_name, change_set_name)
            .await?)
    }

    /// Flatten the stack's outputs. Duplicate keys are last-write-wins —
    /// map insertion semantics, matching what callers expect of named
    /// outputs.
    pub async fn outputs(
        &self,
        name_or_id: &str,
    ) -> Result<BTreeMap<String, String>, ConvergeError> {
        let mut outputs = BTreeMap::new();
        if let Some(stack) = self.describe(name_or_id).await? {
            for output in stack.outputs {
                if let (Some(key), Some(value)) = (output.output_key, output.output_value) {
                    outputs.insert(key, value);
                }
            }
        }
        Ok(outputs)
    }
}

/// Map a wait outcome onto success-or-error for an operation that expects
/// one specific terminal status.
pub(crate) fn settle(
    outcome: WaitOutcome,
    stack: &str,
    operation: &'static str,
    expected: &str,
) -> Result<StackStatus, ConvergeError> {
    match outcome {
        WaitOutcome::Success(status) if status.as_str() == expected => Ok(status),
        WaitOutcome::Success(status) => Err(ConvergeError::OperationFailed {
            stack: stack.to_string(),
            operation,
            status: status.to_string(),
        }),
        WaitOutcome::StackNotFound => Err(ConvergeError::StackVanished {
            stack: stack.to_string(),
            operation,
        }),
        WaitOutcome::Cancelled => Err(ConvergeError::Cancelled {
            stack: stack.to_string(),
            operation,
        }),
        WaitOutcome::Timeout(_) => Err(ConvergeError::Timeout {
            stack: stack.to_string(),
            operation,
            budget: Duration::ZERO,
        }),
        WaitOutcome::Error(message) => Err(ConvergeError::Provider(message)),
    }
}
