//! Gemini-powered structured generation

use super::{parse_object_response, GenerateObjectRequest, ModelClass, ObjectGenerator};
use crate::gemini::GeminiClient;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::env;
use tracing::debug;

pub struct GeminiObjectGenerator {
    client: GeminiClient,
    small_model: String,
    medium_model: String,
    large_model: String,
}

impl GeminiObjectGenerator {
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self::with_client(GeminiClient::new(api_key)?))
    }

    pub fn with_client(client: GeminiClient) -> Self {
        Self {
            client,
            small_model: "gemini-2.0-flash-lite".to_string(),
            medium_model: "gemini-2.0-flash".to_string(),
            large_model: "gemini-2.5-flash".to_string(),
        }
    }

    /// Reads `GEMINI_API_KEY`; `GEMINI_MODEL` overrides every model class.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY").unwrap_or_default();
        let mut generator = Self::new(api_key)?;

        if let Ok(model) = env::var("GEMINI_MODEL") {
            generator.small_model = model.clone();
            generator.medium_model = model.clone();
            generator.large_model = model;
        }

        Ok(generator)
    }

    pub fn model_for(&self, class: ModelClass) -> &str {
        match class {
            ModelClass::Small => &self.small_model,
            ModelClass::Medium => &self.medium_model,
            ModelClass::Large => &self.large_model,
        }
    }
}

#[async_trait]
impl ObjectGenerator for GeminiObjectGenerator {
    async fn generate_object(&self, request: GenerateObjectRequest) -> Result<Value> {
        let model = self.model_for(request.model_class);
        debug!(schema = request.schema.name(), model = %model, "Generating object");

        let response = self
            .client
            .generate_json(model, &request.context, &request.schema.json_schema())
            .await?;

        parse_object_response(&response)
    }
}
