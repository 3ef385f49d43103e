//! Agent actions and their registry
//!
//! An action runs one user-facing operation and reports its result through
//! a `HandlerCallback`, exactly once.

use crate::runtime::{AgentRuntime, Content, HandlerCallback, Memory, State};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub mod verify;
pub use verify::VerifyAction;

/// Pipeline stage at which an invocation stopped
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Generation,
    Validation,
    Client,
    Submission,
    Confirmation,
}

/// Terminal state of one invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Confirmed {
        transaction_id: String,
    },
    Failed {
        stage: FailureStage,
        /// Hash of a submission whose confirmation failed
        transaction_hash: Option<String>,
    },
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Confirmed { .. })
    }
}

/// One turn of an example conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionExample {
    pub user: String,
    pub content: Content,
}

#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;
    fn similes(&self) -> &'static [&'static str];
    fn description(&self) -> &'static str;
    fn examples(&self) -> Vec<Vec<ActionExample>>;

    /// Whether the action applies to `message` at all
    async fn validate(&self, runtime: &dyn AgentRuntime, message: &Memory) -> bool;

    async fn handle(
        &self,
        runtime: &dyn AgentRuntime,
        message: &Memory,
        state: Option<State>,
        callback: &dyn HandlerCallback,
    ) -> ActionOutcome;
}

/// Action registry, looked up by name or simile
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    pub fn register(&mut self, action: Arc<dyn Action>) {
        self.actions.insert(action.name().to_string(), action);
    }

    /// Case-insensitive match against names, then similes
    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        let wanted = name.to_uppercase();

        if let Some(action) = self.actions.get(&wanted) {
            return Some(action.clone());
        }

        self.actions
            .values()
            .find(|action| action.similes().iter().any(|s| *s == wanted))
            .cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.actions.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
