//! ATTPs verify agent
//!
//! An agent action that verifies data with ATTPs:
//! - Extracts verify params from the conversation via structured generation
//! - Validates them before any client is built
//! - Submits a `verify` call and waits for confirmation
//! - Reports exactly one reply per invocation
//!
//! PIPELINE:
//! STATE → GENERATE → VALIDATE → CLIENT → SUBMIT → CONFIRM → REPORT

pub mod action;
pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod gemini;
pub mod generation;
pub mod models;
pub mod runtime;
pub mod schema;
pub mod templates;

pub use error::{AttpsError, Result};

// Re-export common types
pub use action::{Action, ActionOutcome, ActionRegistry, FailureStage, VerifyAction};
pub use models::*;
pub use schema::{
    is_agent_settings, is_attps_price_query, is_attps_price_query_response, is_price_data,
    is_price_query_params, is_verify_params,
};
