//! Gemini API client for structured generation
//!
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::AttpsError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at another endpoint (proxies, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Ask `model` for a JSON document shaped like `schema`.
    ///
    /// Returns the raw text of the first candidate.
    pub async fn generate_json(
        &self,
        model: &str,
        prompt: &str,
        schema: &Value,
    ) -> crate::Result<String> {
        if self.api_key.is_empty() {
            return Err(AttpsError::Generation(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}/{}:generateContent?key={}", self.base_url, model, self.api_key);

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 2048,
                response_mime_type: "application/json".to_string(),
                response_schema: to_gemini_schema(schema),
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
        };

        info!(model = %model, "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AttpsError::Generation(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(AttpsError::Generation(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AttpsError::Generation(format!("Gemini parse error: {}", e))
        })?;

        let candidate = gemini_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AttpsError::Generation("No response from Gemini API".to_string()))?;

        if let Some(usage) = &gemini_response.usage_metadata {
            debug!(
                prompt_tokens = usage.prompt_token_count,
                candidate_tokens = usage.candidates_token_count,
                finish_reason = ?candidate.finish_reason,
                "Gemini usage"
            );
        }

        let text = candidate
            .content
            .parts
            .into_iter()
            .next()
            .map(|part| part.text)
            .ok_or_else(|| AttpsError::Generation("Empty response from Gemini".to_string()))?;

        Ok(text)
    }
}

const SYSTEM_PROMPT: &str = r#"You extract structured parameters from a conversation.

Rules:
- Return ONLY a single JSON object
- Use exactly the field names of the requested schema
- Copy hex strings, addresses and signatures verbatim from the conversation
- Never invent values that the user did not provide
- No explanation text"#;

/// Rewrite a JSON-Schema document into Gemini's `responseSchema` dialect.
///
/// Gemini spells types in upper case and rejects keywords it does not know.
pub fn to_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, value) in map {
                match key.as_str() {
                    "type" => {
                        let ty = value.as_str().unwrap_or_default().to_uppercase();
                        out.insert(key.clone(), Value::String(ty));
                    }
                    "properties" => {
                        let properties = value
                            .as_object()
                            .map(|props| {
                                props
                                    .iter()
                                    .map(|(name, prop)| (name.clone(), to_gemini_schema(prop)))
                                    .collect::<serde_json::Map<_, _>>()
                            })
                            .unwrap_or_default();
                        out.insert(key.clone(), Value::Object(properties));
                    }
                    "items" => {
                        out.insert(key.clone(), to_gemini_schema(value));
                    }
                    "required" | "description" | "enum" | "nullable" | "format" => {
                        out.insert(key.clone(), value.clone());
                    }
                    _ => {}
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
    response_mime_type: String,
    response_schema: Value,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i32,
    #[serde(default)]
    candidates_token_count: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "verify 0x1234".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.0,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 2048,
                response_mime_type: "application/json".to_string(),
                response_schema: json!({ "type": "OBJECT" }),
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "verify 0x1234");
        assert!(json.get("systemInstruction").is_some());
    }

    #[test]
    fn test_response_deserialization() {
        let raw = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"agent\":\"0x1\"}" }], "role": "model" },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 10, "candidatesTokenCount": 5 }
        });

        let response: GeminiResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.candidates[0].finish_reason.as_deref(), Some("STOP"));
        assert_eq!(response.candidates[0].content.parts[0].text, "{\"agent\":\"0x1\"}");
    }

    #[test]
    fn test_gemini_schema_uppercases_types() {
        let schema = crate::schema::Schema::VerifyParams.json_schema();
        let converted = to_gemini_schema(&schema);

        assert_eq!(converted["type"], "OBJECT");
        assert_eq!(
            converted["properties"]["payload"]["properties"]["signatures"]["items"]["properties"]["v"]["type"],
            "NUMBER"
        );
        assert_eq!(converted["required"], schema["required"]);
    }

    #[tokio::test]
    async fn test_missing_api_key_is_generation_error() {
        let client = GeminiClient::new(String::new()).unwrap();
        let result = client
            .generate_json("gemini-2.0-flash", "hi", &json!({ "type": "object" }))
            .await;
        assert!(matches!(result, Err(AttpsError::Generation(_))));
    }
}
