//! The provider API seam and its AWS CLI implementation.
//!
//! The engine never talks to the provider directly; it goes through
//! [`StackApi`], which enumerates the raw CloudFormation operations this
//! tool needs. Production uses [`AwsCliBridge`], which shells out to the
//! `aws` binary with `--output json` and parses the responses — the CLI
//! already handles credentials, signing, and per-call retries, so this tool
//! does not reimplement any of that. Tests substitute their own `StackApi`.
//!
//! Provider error text is matched against an explicit allow-list of
//! recognized phrases here and nowhere else, so callers only ever see
//! classified outcomes, never raw provider error strings.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use convergence::ConvergeError;

use crate::request::DeployRequest;
use crate::template::TemplateSource;

/// Error phrases meaning "the resource does not exist". A describe that
/// fails with one of these is a valid state, not a failure.
const NOT_FOUND_PHRASES: &[&str] = &["does not exist"];

/// Change set failure reasons meaning "the template produced an empty
/// diff" rather than a real failure.
pub const NO_CHANGES_PHRASES: &[&str] = &[
    "No updates are to be performed",
    "The submitted information didn't contain changes",
];

/// Whether a change set failure reason is a recognized no-op.
pub fn is_no_changes_reason(reason: &str) -> bool {
    NO_CHANGES_PHRASES.iter().any(|p| reason.contains(p))
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider reports the resource does not exist.
    #[error("resource does not exist: {0}")]
    NotFound(String),

    #[error("aws cli invocation failed: {0}")]
    CommandFailed(String),

    #[error("could not parse provider response: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProviderError> for ConvergeError {
    fn from(e: ProviderError) -> Self {
        ConvergeError::Provider(e.to_string())
    }
}

/// A stack as described by the provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackDescription {
    pub stack_name: String,
    #[serde(default)]
    pub stack_id: Option<String>,
    pub stack_status: String,
    #[serde(default)]
    pub stack_status_reason: Option<String>,
    #[serde(default)]
    pub outputs: Vec<StackOutput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackOutput {
    #[serde(default)]
    pub output_key: Option<String>,
    #[serde(default)]
    pub output_value: Option<String>,
}

/// A change set as described by the provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeSetDescription {
    pub status: String,
    #[serde(default)]
    pub status_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksResponse {
    #[serde(default)]
    stacks: Vec<StackDescription>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateStackResponse {
    stack_id: String,
}

/// The raw provider operations the engine needs, as a mockable seam.
#[async_trait]
pub trait StackApi: Send + Sync {
    async fn describe_stacks(
        &self,
        name_or_id: &str,
    ) -> Result<Vec<StackDescription>, ProviderError>;

    /// Issue a create call. Returns the provider-assigned stack id without
    /// waiting for the create to finish.
    async fn create_stack(&self, request: &DeployRequest) -> Result<String, ProviderError>;

    async fn delete_stack(&self, name_or_id: &str) -> Result<(), ProviderError>;

    async fn create_change_set(
        &self,
        request: &DeployRequest,
        change_set_name: &str,
    ) -> Result<(), ProviderError>;

    async fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<ChangeSetDescription, ProviderError>;

    async fn execute_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<(), ProviderError>;

    async fn delete_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<(), ProviderError>;
}

/// Bridge to the `aws` CLI binary.
///
/// CloudFormation is driven through the CLI rather than a hand-rolled HTTP
/// client: the binary owns authentication and transport, and `--output json`
/// gives responses serde can parse directly.
pub struct AwsCliBridge {
    bin: String,
    region: Option<String>,
}

impl AwsCliBridge {
    pub fn new(region: Option<String>) -> Self {
        Self {
            bin: "aws".to_string(),
            region,
        }
    }

    /// Run one `aws cloudformation` subcommand and return its stdout.
    ///
    /// The blocking subprocess runs on the blocking pool so polling loops
    /// stay responsive to cancellation.
    async fn run(&self, args: Vec<String>) -> Result<String, ProviderError> {
        let bin = self.bin.clone();
        let mut full_args = vec!["cloudformation".to_string()];
        full_args.extend(args);
        if let Some(region) = &self.region {
            full_args.push("--region".to_string());
            full_args.push(region.clone());
        }
        full_args.push("--output".to_string());
        full_args.push("json".to_string());

        tracing::trace!(args = ?full_args, "invoking aws cli");
        let output = tokio::task::spawn_blocking(move || {
            std::process::Command::new(&bin).args(&full_args).output()
        })
        .await
        .map_err(|e| ProviderError::CommandFailed(format!("task join error: {e}")))??;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(classify_failure(&String::from_utf8_lossy(&output.stderr)))
        }
    }
}

/// Classify a failed invocation's stderr into the provider error vocabulary.
fn classify_failure(stderr: &str) -> ProviderError {
    let message = stderr.trim().to_string();
    if NOT_FOUND_PHRASES.iter().any(|p| message.contains(p)) {
        ProviderError::NotFound(message)
    } else {
        ProviderError::CommandFailed(message)
    }
}

/// Arguments shared by create-stack and create-change-set: template source,
/// parameters, tags, capabilities, role, and notification targets.
fn request_args(request: &DeployRequest) -> Vec<String> {
    let mut args = vec!["--stack-name".to_string(), request.stack_name.clone()];
    match &request.template {
        TemplateSource::Body(body) => {
            args.push("--template-body".to_string());
            args.push(body.clone());
        }
        TemplateSource::Url(url) => {
            args.push("--template-url".to_string());
            args.push(url.clone());
        }
    }
    if !request.parameters.is_empty() {
        args.push("--parameters".to_string());
        args.push(serde_json::to_string(&request.parameters).unwrap_or_default());
    }
    if !request.tags.is_empty() {
        args.push("--tags".to_string());
        args.push(serde_json::to_string(&request.tags).unwrap_or_default());
    }
    if !request.capabilities.is_empty() {
        args.push("--capabilities".to_string());
        args.extend(request.capabilities.iter().cloned());
    }
    if let Some(role_arn) = &request.role_arn {
        args.push("--role-arn".to_string());
        args.push(role_arn.clone());
    }
    if let Some(arns) = &request.notification_arns {
        args.push("--notification-arns".to_string());
        args.extend(arns.iter().cloned());
    }
    args
}

fn create_stack_args(request: &DeployRequest) -> Vec<String> {
    let mut args = vec!["create-stack".to_string()];
    args.extend(request_args(request));
    if request.disable_rollback {
        args.push("--disable-rollback".to_string());
    }
    if request.termination_protection {
        args.push("--enable-termination-protection".to_string());
    }
    args
}

fn create_change_set_args(request: &DeployRequest, change_set_name: &str) -> Vec<String> {
    let mut args = vec!["create-change-set".to_string()];
    args.extend(request_args(request));
    args.push("--change-set-name".to_string());
    args.push(change_set_name.to_string());
    args
}

#[async_trait]
impl StackApi for AwsCliBridge {
    async fn describe_stacks(
        &self,
        name_or_id: &str,
    ) -> Result<Vec<StackDescription>, ProviderError> {
        let raw = self
            .run(vec![
                "describe-stacks".to_string(),
                "--stack-name".to_string(),
                name_or_id.to_string(),
            ])
            .await?;
        let response: DescribeStacksResponse =
            serde_json::from_str(&raw).map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(response.stacks)
    }

    async fn create_stack(&self, request: &DeployRequest) -> Result<String, ProviderError> {
        let raw = self.run(create_stack_args(request)).await?;
        let response: CreateStackResponse =
            serde_json::from_str(&raw).map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(response.stack_id)
    }

    async fn delete_stack(&self, name_or_id: &str) -> Result<(), ProviderError> {
        self.run(vec![
            "delete-stack".to_string(),
            "--stack-name".to_string(),
            name_or_id.to_string(),
        ])
        .await?;
        Ok(())
    }

    async fn create_change_set(
        &self,
        request: &DeployRequest,
        change_set_name: &str,
    ) -> Result<(), ProviderError> {
        self.run(create_change_set_args(request, change_set_name))
            .await?;
        Ok(())
    }

    async fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<ChangeSetDescription, ProviderError> {
        let raw = self
            .run(vec![
                "describe-change-set".to_string(),
                "--stack-name".to_string(),
                stack_name.to_string(),
                "--change-set-name".to_string(),
                change_set_name.to_string(),
            ])
            .await?;
        serde_json::from_str(&raw).map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn execute_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<(), ProviderError> {
        self.run(vec![
            "execute-change-set".to_string(),
            "--stack-name".to_string(),
            stack_name.to_string(),
            "--change-set-name".to_string(),
            change_set_name.to_string(),
        ])
        .await?;
        Ok(())
    }

    async fn delete_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<(), ProviderError> {
        self.run(vec![
            "delete-change-set".to_string(),
            "--stack-name".to_string(),
            stack_name.to_string(),
            "--change-set-name".to_string(),
            change_set_name.to_string(),
        ])
        .await?;
        Ok(())
    }
}
