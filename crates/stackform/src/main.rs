//! stackform — converge a single CloudFormation stack from CI.
//!
//! ```bash
//! stackform deploy --stack-name orders-api --template infra/orders.yaml \
//!     --parameter-overrides 'Env=prod,Replicas=3' --no-fail-on-empty-changeset
//!
//! stackform delete --stack-name orders-api --timeout-seconds 600
//! ```
//!
//! On success the stack id and each stack output are printed to stdout as
//! `key=value` lines for the pipeline to capture. On failure nothing is
//! printed and the process exits nonzero.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use stackform::client::StackClient;
use stackform::config::{resolve_region, Cli, Command};
use stackform::engine::{DeployEngine, EngineOptions};
use stackform::provider::AwsCliBridge;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("run failed: {e}");
        tracing::debug!("failure detail: {e:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, aborting waits");
            signal_cancel.cancel();
        }
    });

    match cli.command {
        Command::Deploy(args) => {
            let region = resolve_region(args.region.clone());
            let (request, options) = args.into_request()?;
            let client = StackClient::new(AwsCliBridge::new(region), cancel);
            let engine = DeployEngine::new(client, options);

            info!(stack = %request.stack_name, "converging stack");
            let outcome = engine.deploy(&request).await?;
            info!(stack = %request.stack_name, stack_id = %outcome.stack_id, "stack converged");

            println!("stack-id={}", outcome.stack_id);
            for (key, value) in &outcome.outputs {
                println!("{key}={value}");
            }
        }
        Command::Delete(args) => {
            let region = resolve_region(args.region.clone());
            let client = StackClient::new(AwsCliBridge::new(region), cancel);
            let engine = DeployEngine::new(client, EngineOptions::default());

            engine
                .teardown(&args.stack_name, Duration::from_secs(args.timeout_seconds))
                .await?;
            info!(stack = %args.stack_name, "stack deleted");
        }
    }

    Ok(())
}
