//! Stackform — one-shot CloudFormation stack deployment orchestrator.
//!
//! A single invocation converges one named stack to a desired
//! template/parameter state: create it if absent, update it through a change
//! set if healthy, delete-and-recreate it if the provider has wedged it in a
//! rollback-complete state, and wait out any operation already in flight.
//!
//! Module map:
//! - `provider`: the raw provider operations behind the [`provider::StackApi`]
//!   seam, plus the AWS CLI bridge that implements them in production.
//! - `client`: the stack client — translates engine intents into provider
//!   calls and provider errors into classified outcomes.
//! - `engine`: the reconciliation state machine and the teardown path.
//! - `template` / `request` / `config`: desired-state inputs.

pub mod client;
pub mod config;
pub mod engine;
pub mod provider;
pub mod request;
pub mod template;
