//! CLI surface and run configuration.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use convergence::{parse_arn_list, parse_parameter_overrides, parse_tags, ConvergeError};

use crate::engine::EngineOptions;
use crate::request::DeployRequest;
use crate::template::TemplateSource;

/// One-shot CloudFormation stack deployment orchestrator.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Converge the stack to the given template and parameters.
    Deploy(DeployArgs),
    /// Delete the stack and wait for deletion to finish.
    Delete(DeleteArgs),
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Name of the stack to converge.
    #[arg(long)]
    pub stack_name: String,

    /// Template file path, or an https:// URL handed to the provider as-is.
    #[arg(long)]
    pub template: String,

    /// Capability acknowledgements, comma-separated (e.g. CAPABILITY_IAM).
    #[arg(long)]
    pub capabilities: Option<String>,

    /// Parameter overrides as key=value[,key=value...], or a file: URL to a
    /// JSON document of the same shape.
    #[arg(long)]
    pub parameter_overrides: Option<String>,

    /// Stack tags as a JSON array of {"Key": ..., "Value": ...} objects.
    /// Anything that does not parse as that means no tags.
    #[arg(long)]
    pub tags: Option<String>,

    /// IAM role ARN the provider assumes for stack operations.
    #[arg(long)]
    pub role_arn: Option<String>,

    /// SNS topic ARNs to notify, comma-separated.
    #[arg(long)]
    pub notification_arns: Option<String>,

    /// Disable rollback if stack creation fails.
    #[arg(long, default_value_t = false)]
    pub disable_rollback: bool,

    /// Enable termination protection on a newly created stack.
    #[arg(long, default_value_t = false)]
    pub termination_protection: bool,

    /// Budget in seconds for bounded waits. 0 waits forever.
    #[arg(long, default_value_t = 0)]
    pub timeout_seconds: u64,

    /// Treat a change set with no changes as success instead of failure.
    #[arg(long, default_value_t = false)]
    pub no_fail_on_empty_changeset: bool,

    /// Create the change set but do not execute it.
    #[arg(long, default_value_t = false)]
    pub no_execute_changeset: bool,

    /// Keep failed change sets around for inspection.
    #[arg(long, default_value_t = false)]
    pub no_delete_failed_changeset: bool,

    /// Provider region. Falls back to AWS_REGION.
    #[arg(long)]
    pub region: Option<String>,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Name of the stack to delete.
    #[arg(long)]
    pub stack_name: String,

    /// Budget in seconds for the deletion wait. 0 waits forever.
    #[arg(long, default_value_t = 0)]
    pub timeout_seconds: u64,

    /// Provider region. Falls back to AWS_REGION.
    #[arg(long)]
    pub region: Option<String>,
}

/// Resolve a region from the CLI or the environment.
pub fn resolve_region(flag: Option<String>) -> Option<String> {
    flag.or_else(|| std::env::var("AWS_REGION").ok())
}

impl DeployArgs {
    /// Resolve CLI text into a deployment request plus engine options.
    ///
    /// A local template file is read to completion here, before any
    /// provider call is made.
    pub fn into_request(self) -> Result<(DeployRequest, EngineOptions), ConvergeError> {
        let template = TemplateSource::resolve(&self.template)?;
        let parameters = match self.parameter_overrides.as_deref() {
            Some(raw) => parse_parameter_overrides(raw)?,
            None => Vec::new(),
        };
        let tags = self.tags.as_deref().and_then(parse_tags).unwrap_or_default();
        let capabilities = self
            .capabilities
            .as_deref()
            .and_then(parse_arn_list)
            .unwrap_or_default();
        let notification_arns = self.notification_arns.as_deref().and_then(parse_arn_list);

        let request = DeployRequest {
            stack_name: self.stack_name,
            template,
            capabilities,
            parameters,
            tags,
            role_arn: self.role_arn.filter(|r| !r.is_empty()),
            notification_arns,
            disable_rollback: self.disable_rollback,
            termination_protection: self.termination_protection,
            timeout: Duration::from_secs(self.timeout_seconds),
        };
        let options = EngineOptions {
            no_fail_on_empty_changeset: self.no_fail_on_empty_changeset,
            no_execute_changeset: self.no_execute_changeset,
            no_delete_failed_changeset: self.no_delete_failed_changeset,
        };
        Ok((request, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(template: &str) -> DeployArgs {
        DeployArgs {
            stack_name: "orders-api".to_string(),
            template: template.to_string(),
            capabilities: Some("CAPABILITY_IAM,CAPABILITY_NAMED_IAM".to_string()),
            parameter_overrides: Some("Env=prod,Replicas=3".to_string()),
            tags: Some(r#"[{"Key": "team", "Value": "infra"}]"#.to_string()),
            role_arn: None,
            notification_arns: Some("arn:aws:sns:us-east-1:1:deploys".to_string()),
            disable_rollback: false,
            termination_protection: false,
            timeout_seconds: 90,
            no_fail_on_empty_changeset: true,
            no_execute_changeset: false,
            no_delete_failed_changeset: false,
            region: None,
        }
    }

    #[test]
    fn test_cli_parses_deploy_subcommand() {
        let cli = Cli::try_parse_from([
            "stackform",
            "deploy",
            "--stack-name",
            "orders-api",
            "--template",
            "https://example.com/t.yaml",
            "--no-execute-changeset",
        ])
        .unwrap();
        match cli.command {
            Command::Deploy(deploy) => {
                assert_eq!(deploy.stack_name, "orders-api");
                assert!(deploy.no_execute_changeset);
                assert_eq!(deploy.timeout_seconds, 0);
            }
            Command::Delete(_) => panic!("parsed wrong subcommand"),
        }
    }

    #[test]
    fn test_into_request_resolves_all_inputs() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Resources: {{}}").unwrap();

        let (request, options) = args(file.path().to_str().unwrap()).into_request().unwrap();

        assert_eq!(request.stack_name, "orders-api");
        assert_eq!(
            request.template,
            TemplateSource::Body("Resources: {}".to_string())
        );
        assert_eq!(
            request.capabilities,
            vec!["CAPABILITY_IAM".to_string(), "CAPABILITY_NAMED_IAM".to_string()]
        );
        assert_eq!(request.parameters.len(), 2);
        assert_eq!(request.tags.len(), 1);
        assert_eq!(
            request.notification_arns,
            Some(vec!["arn:aws:sns:us-east-1:1:deploys".to_string()])
        );
        assert_eq!(request.timeout, Duration::from_secs(90));
        assert!(options.no_fail_on_empty_changeset);
        assert!(!options.no_execute_changeset);
    }

    #[test]
    fn test_invalid_tags_mean_no_tags_not_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Resources: {{}}").unwrap();
        let mut deploy = args(file.path().to_str().unwrap());
        deploy.tags = Some("team=infra".to_string());

        let (request, _) = deploy.into_request().unwrap();
        assert!(request.tags.is_empty());
    }

    #[test]
    fn test_missing_template_file_fails_resolution() {
        let err = args("/nonexistent/template.yaml").into_request().unwrap_err();
        assert!(matches!(err, ConvergeError::TemplateRead { .. }), "{err}");
    }
}
