//! Structured generation
//!
//! Turns a composed conversation context into a candidate object for a
//! target schema. The candidate is a best-effort guess: callers must run it
//! through `crate::schema` before trusting it.

use crate::schema::Schema;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod gemini;
pub use gemini::GeminiObjectGenerator;

/// Size class of the model to use
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModelClass {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone)]
pub struct GenerateObjectRequest {
    pub context: String,
    pub schema: Schema,
    pub model_class: ModelClass,
}

/// Trait for structured generation (LLM controlled)
#[async_trait]
pub trait ObjectGenerator: Send + Sync {
    async fn generate_object(&self, request: GenerateObjectRequest) -> Result<Value>;
}

/// Pull the JSON object out of a model reply.
///
/// Accepts bare JSON or JSON wrapped in a markdown code fence.
pub fn parse_object_response(response: &str) -> Result<Value> {
    let cleaned = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str(cleaned).map_err(|e| {
        crate::error::AttpsError::Generation(format!(
            "Failed to parse generated object: {} | raw={}",
            e, response
        ))
    })
}
