//! VERIFY action
//!
//! STATE → GENERATE → VALIDATE → CLIENT → SUBMIT → CONFIRM → REPORT
//!
//! Generated params are never trusted: they go through `is_verify_params`
//! before any client is built. Every exit reports exactly once.

use super::{Action, ActionExample, ActionOutcome, FailureStage};
use crate::client::ClientFactory;
use crate::config::AttpsConfig;
use crate::generation::{GenerateObjectRequest, ModelClass, ObjectGenerator};
use crate::models::VerifyParams;
use crate::runtime::{compose_context, AgentRuntime, Content, HandlerCallback, Memory, State};
use crate::schema::{is_verify_params, Schema};
use crate::templates::VERIFY_DATA_TEMPLATE;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

pub const GENERATION_FAILED_TEXT: &str =
    "Failed to generate verify params. Please provide valid input.";
pub const INVALID_PARAMS_TEXT: &str = "Invalid verify params. Please provide valid input.";
pub const CLIENT_FAILED_TEXT: &str =
    "Failed to create Agent SDK. Please check the ATTPs plugin configuration.";

pub struct VerifyAction {
    generator: Arc<dyn ObjectGenerator>,
    client_factory: Arc<dyn ClientFactory>,
}

impl VerifyAction {
    pub fn new(generator: Arc<dyn ObjectGenerator>, client_factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            generator,
            client_factory,
        }
    }

    async fn fail(
        &self,
        callback: &dyn HandlerCallback,
        stage: FailureStage,
        text: String,
        transaction_hash: Option<String>,
    ) -> ActionOutcome {
        callback.respond(Content::text(text)).await;
        ActionOutcome::Failed {
            stage,
            transaction_hash,
        }
    }
}

/// Typed params, only if `value` passes the schema and every `v` is a byte
pub fn validate_verify_params(value: &Value) -> Option<VerifyParams> {
    if !is_verify_params(value) {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

fn verification_error_text(message: &str, transaction_hash: Option<&str>) -> String {
    match transaction_hash {
        Some(hash) if !hash.is_empty() => {
            format!("Error verifying data: {} Transaction hash: {}", message, hash)
        }
        _ => format!("Error verifying data: {}", message),
    }
}

#[async_trait]
impl Action for VerifyAction {
    fn name(&self) -> &'static str {
        "VERIFY"
    }

    fn similes(&self) -> &'static [&'static str] {
        &["VERIFY_DATA"]
    }

    fn description(&self) -> &'static str {
        "Verify data with ATTPs. User must provide data to verify."
    }

    fn examples(&self) -> Vec<Vec<ActionExample>> {
        vec![vec![
            ActionExample {
                user: "{{user1}}".to_string(),
                content: Content::text("I want to verify data: ..."),
            },
            ActionExample {
                user: "{{user2}}".to_string(),
                content: Content {
                    text: "Sure, I'll verify the data.".to_string(),
                    action: Some("VERIFY".to_string()),
                },
            },
        ]]
    }

    async fn validate(&self, _runtime: &dyn AgentRuntime, _message: &Memory) -> bool {
        true
    }

    async fn handle(
        &self,
        runtime: &dyn AgentRuntime,
        message: &Memory,
        state: Option<State>,
        callback: &dyn HandlerCallback,
    ) -> ActionOutcome {
        // === STATE ===
        let state = match state {
            Some(state) => runtime.update_recent_message_state(state).await,
            None => runtime.compose_state(message).await,
        };

        // === GENERATE ===
        let request = GenerateObjectRequest {
            context: compose_context(&state, VERIFY_DATA_TEMPLATE),
            schema: Schema::VerifyParams,
            model_class: ModelClass::Large,
        };

        let candidate = match self.generator.generate_object(request).await {
            Ok(candidate) => {
                info!(params = %candidate, "The verify params received");
                candidate
            }
            Err(e) => {
                error!(error = %e, "Failed to generate verify params");
                return self
                    .fail(callback, FailureStage::Generation, GENERATION_FAILED_TEXT.to_string(), None)
                    .await;
            }
        };

        // === VALIDATE ===
        let Some(params) = validate_verify_params(&candidate) else {
            error!(params = %candidate, "Invalid verify params");
            return self
                .fail(callback, FailureStage::Validation, INVALID_PARAMS_TEXT.to_string(), None)
                .await;
        };

        // === CLIENT ===
        let config = AttpsConfig::resolve(runtime);
        let client = match self.client_factory.create(&config).await {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "Failed to create Agent SDK");
                return self
                    .fail(callback, FailureStage::Client, CLIENT_FAILED_TEXT.to_string(), None)
                    .await;
            }
        };

        // === SUBMIT ===
        let handle = match client.verify(&params).await {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "Error verify data: submission failed");
                return self
                    .fail(
                        callback,
                        FailureStage::Submission,
                        verification_error_text(&e.to_string(), None),
                        None,
                    )
                    .await;
            }
        };

        let transaction_hash = handle.hash().to_string();
        info!(
            transaction_id = %transaction_hash,
            "Data verification transaction sent"
        );

        // === CONFIRM ===
        match handle.wait().await {
            Ok(receipt) => {
                info!(
                    transaction_id = %receipt.hash,
                    block_number = ?receipt.block_number,
                    "Data verification transaction confirmed"
                );
                callback
                    .respond(Content::text(format!(
                        "Success: Data verified successfully. Transaction ID: {}",
                        receipt.hash
                    )))
                    .await;
                ActionOutcome::Confirmed {
                    transaction_id: receipt.hash,
                }
            }
            Err(e) => {
                error!(
                    error = %e,
                    transaction_id = %transaction_hash,
                    "Error verify data: confirmation failed"
                );
                let text = verification_error_text(&e.to_string(), Some(&transaction_hash));
                let transaction_hash = Some(transaction_hash).filter(|hash| !hash.is_empty());
                self.fail(callback, FailureStage::Confirmation, text, transaction_hash)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{TransactionHandle, VerificationClient};
    use crate::error::AttpsError;
    use crate::models::{Receipt, ReceiptStatus};
    use crate::runtime::{CollectingCallback, InMemoryRuntime};
    use crate::Result;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    // ---------- test doubles ----------

    struct StaticGenerator {
        response: std::result::Result<Value, String>,
        contexts: Mutex<Vec<String>>,
    }

    impl StaticGenerator {
        fn ok(value: Value) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(value),
                contexts: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Err(message.to_string()),
                contexts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ObjectGenerator for StaticGenerator {
        async fn generate_object(&self, request: GenerateObjectRequest) -> Result<Value> {
            assert_eq!(request.schema, Schema::VerifyParams);
            assert_eq!(request.model_class, ModelClass::Large);
            self.contexts.lock().unwrap().push(request.context);
            self.response.clone().map_err(AttpsError::Generation)
        }
    }

    struct StaticHandle {
        hash: String,
        confirmation: std::result::Result<String, String>,
    }

    #[async_trait]
    impl TransactionHandle for StaticHandle {
        fn hash(&self) -> &str {
            &self.hash
        }

        async fn wait(&self) -> Result<Receipt> {
            match &self.confirmation {
                Ok(hash) => Ok(Receipt {
                    hash: hash.clone(),
                    block_number: Some(1),
                    status: ReceiptStatus::Success,
                }),
                Err(message) => Err(AttpsError::Confirmation(message.clone())),
            }
        }
    }

    struct StaticClient {
        submission: std::result::Result<String, String>,
        confirmation: std::result::Result<String, String>,
        submitted: Mutex<Vec<VerifyParams>>,
    }

    #[async_trait]
    impl VerificationClient for StaticClient {
        async fn verify(&self, params: &VerifyParams) -> Result<Box<dyn TransactionHandle>> {
            self.submitted.lock().unwrap().push(params.clone());
            let hash = self.submission.clone().map_err(AttpsError::Submission)?;
            Ok(Box::new(StaticHandle {
                hash,
                confirmation: self.confirmation.clone(),
            }))
        }
    }

    struct StaticFactory {
        failure: Option<String>,
        client: Arc<StaticClient>,
        created: AtomicUsize,
        configs: Mutex<Vec<AttpsConfig>>,
    }

    impl StaticFactory {
        fn new(
            submission: std::result::Result<&str, &str>,
            confirmation: std::result::Result<&str, &str>,
        ) -> Arc<Self> {
            Arc::new(Self {
                failure: None,
                client: Arc::new(StaticClient {
                    submission: submission.map(str::to_string).map_err(str::to_string),
                    confirmation: confirmation.map(str::to_string).map_err(str::to_string),
                    submitted: Mutex::new(Vec::new()),
                }),
                created: AtomicUsize::new(0),
                configs: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            let factory = Self::new(Ok("unused"), Ok("unused"));
            Arc::new(Self {
                failure: Some(message.to_string()),
                client: factory.client.clone(),
                created: AtomicUsize::new(0),
                configs: Mutex::new(Vec::new()),
            })
        }

        fn created(&self) -> usize {
            self.created.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ClientFactory for StaticFactory {
        async fn create(&self, config: &AttpsConfig) -> Result<Arc<dyn VerificationClient>> {
            self.configs.lock().unwrap().push(config.clone());
            if let Some(message) = &self.failure {
                return Err(AttpsError::ClientConstruction(message.clone()));
            }
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(self.client.clone())
        }
    }

    // ---------- fixtures ----------

    fn generated_params() -> Value {
        json!({
            "agent": "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf",
            "digest": format!("0x{}", "22".repeat(32)),
            "payload": {
                "data": "0x68656c6c6f",
                "signatures": [{ "r": "0x01", "s": "0x02", "v": 27 }]
            }
        })
    }

    fn message(text: &str) -> Memory {
        Memory::new(Uuid::new_v4(), Uuid::new_v4(), Content::text(text))
    }

    async fn run(
        generator: Arc<StaticGenerator>,
        factory: Arc<StaticFactory>,
    ) -> (ActionOutcome, Vec<String>) {
        let runtime = InMemoryRuntime::new("attps");
        let action = VerifyAction::new(generator, factory);
        let callback = CollectingCallback::new();

        let outcome = action
            .handle(&runtime, &message("I want to verify data: 0x68656c6c6f"), None, &callback)
            .await;

        let texts = callback.replies().await.into_iter().map(|c| c.text).collect();
        (outcome, texts)
    }

    // ---------- scenarios ----------

    #[tokio::test]
    async fn test_happy_path_reports_transaction_id() {
        let factory = StaticFactory::new(Ok("0xabc"), Ok("0xabc"));
        let (outcome, texts) = run(StaticGenerator::ok(generated_params()), factory.clone()).await;

        assert_eq!(
            texts,
            vec!["Success: Data verified successfully. Transaction ID: 0xabc".to_string()]
        );
        assert_eq!(
            outcome,
            ActionOutcome::Confirmed {
                transaction_id: "0xabc".to_string()
            }
        );

        let submitted = factory.client.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].payload.signatures[0].v, 27);
    }

    #[tokio::test]
    async fn test_generation_failure_stops_before_client() {
        let factory = StaticFactory::new(Ok("0xabc"), Ok("0xabc"));
        let (outcome, texts) = run(StaticGenerator::failing("timeout"), factory.clone()).await;

        assert_eq!(texts, vec![GENERATION_FAILED_TEXT.to_string()]);
        assert_eq!(
            outcome,
            ActionOutcome::Failed {
                stage: FailureStage::Generation,
                transaction_hash: None
            }
        );
        assert!(factory.configs.lock().unwrap().is_empty());
        assert_eq!(factory.created(), 0);
    }

    #[tokio::test]
    async fn test_invalid_params_stop_before_client() {
        let factory = StaticFactory::new(Ok("0xabc"), Ok("0xabc"));
        let (outcome, texts) =
            run(StaticGenerator::ok(json!({ "agent": "x" })), factory.clone()).await;

        assert_eq!(texts, vec![INVALID_PARAMS_TEXT.to_string()]);
        assert!(matches!(
            outcome,
            ActionOutcome::Failed {
                stage: FailureStage::Validation,
                ..
            }
        ));
        assert!(factory.configs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_string_v_is_rejected() {
        let mut params = generated_params();
        params["payload"]["signatures"][0]["v"] = json!("27");
        let factory = StaticFactory::new(Ok("0xabc"), Ok("0xabc"));

        let (_, texts) = run(StaticGenerator::ok(params), factory.clone()).await;
        assert_eq!(texts, vec![INVALID_PARAMS_TEXT.to_string()]);
        assert_eq!(factory.created(), 0);
    }

    #[tokio::test]
    async fn test_client_construction_failure() {
        let factory = StaticFactory::failing("bad key");
        let (outcome, texts) = run(StaticGenerator::ok(generated_params()), factory.clone()).await;

        assert_eq!(texts, vec![CLIENT_FAILED_TEXT.to_string()]);
        assert!(matches!(
            outcome,
            ActionOutcome::Failed {
                stage: FailureStage::Client,
                ..
            }
        ));
        assert!(factory.client.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirmation_failure_includes_transaction_hash() {
        let factory = StaticFactory::new(Ok("0xdef"), Err("reverted"));
        let (outcome, texts) = run(StaticGenerator::ok(generated_params()), factory).await;

        assert_eq!(
            texts,
            vec!["Error verifying data: reverted Transaction hash: 0xdef".to_string()]
        );
        assert_eq!(
            outcome,
            ActionOutcome::Failed {
                stage: FailureStage::Confirmation,
                transaction_hash: Some("0xdef".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_submission_failure_reports_once_without_hash() {
        let factory = StaticFactory::new(Err("nonce too low"), Ok("unused"));
        let (outcome, texts) = run(StaticGenerator::ok(generated_params()), factory).await;

        assert_eq!(texts, vec!["Error verifying data: nonce too low".to_string()]);
        assert_eq!(
            outcome,
            ActionOutcome::Failed {
                stage: FailureStage::Submission,
                transaction_hash: None
            }
        );
    }

    #[tokio::test]
    async fn test_config_layers_agent_settings_over_environment() {
        let factory = StaticFactory::new(Ok("0xabc"), Ok("0xabc"));
        let runtime = InMemoryRuntime::new("attps")
            .with_setting(crate::config::ATTPS_RPC_URL, "http://agent-node")
            .with_setting(crate::config::ATTPS_AUTO_HASH_DATA, "true");
        let action = VerifyAction::new(StaticGenerator::ok(generated_params()), factory.clone());
        let callback = CollectingCallback::new();

        action
            .handle(&runtime, &message("verify"), None, &callback)
            .await;

        let configs = factory.configs.lock().unwrap();
        assert_eq!(configs[0].rpc_url.as_deref(), Some("http://agent-node"));
        assert!(configs[0].auto_hash_data);
    }

    #[tokio::test]
    async fn test_existing_state_is_refreshed() {
        let generator = StaticGenerator::ok(generated_params());
        let factory = StaticFactory::new(Ok("0xabc"), Ok("0xabc"));
        let runtime = InMemoryRuntime::new("attps");
        let action = VerifyAction::new(generator.clone(), factory);
        let callback = CollectingCallback::new();

        let first = message("digest is 0x22");
        let state = runtime.compose_state(&first).await;

        let follow_up = Memory::new(first.user_id, first.room_id, Content::text("data is 0x68656c6c6f"));
        runtime.remember(follow_up.clone()).await;

        action
            .handle(&runtime, &follow_up, Some(state), &callback)
            .await;

        let contexts = generator.contexts.lock().unwrap();
        assert!(contexts[0].contains("digest is 0x22"));
        assert!(contexts[0].contains("data is 0x68656c6c6f"));
        assert_eq!(callback.replies().await.len(), 1);
    }

    #[test]
    fn test_validate_verify_params_rejects_out_of_range_v() {
        let mut params = generated_params();
        params["payload"]["signatures"][0]["v"] = json!(300);
        assert!(is_verify_params(&params));
        assert!(validate_verify_params(&params).is_none());

        for v in [json!(27.5), json!(-1)] {
            params["payload"]["signatures"][0]["v"] = v;
            assert!(is_verify_params(&params));
            assert!(validate_verify_params(&params).is_none());
        }
    }

    #[tokio::test]
    async fn test_integral_float_v_reaches_client() {
        let mut params = generated_params();
        params["payload"]["signatures"][0]["v"] = json!(27.0);
        let factory = StaticFactory::new(Ok("0xabc"), Ok("0xabc"));

        let (outcome, texts) = run(StaticGenerator::ok(params), factory.clone()).await;

        assert!(outcome.is_success());
        assert_eq!(
            texts,
            vec!["Success: Data verified successfully. Transaction ID: 0xabc".to_string()]
        );
        assert_eq!(factory.client.submitted.lock().unwrap()[0].payload.signatures[0].v, 27);
    }

    #[test]
    fn test_verification_error_text() {
        assert_eq!(
            verification_error_text("reverted", Some("0xdef")),
            "Error verifying data: reverted Transaction hash: 0xdef"
        );
        assert_eq!(
            verification_error_text("reverted", Some("")),
            "Error verifying data: reverted"
        );
    }

    #[tokio::test]
    async fn test_action_metadata() {
        let action = VerifyAction::new(
            StaticGenerator::ok(generated_params()),
            StaticFactory::new(Ok("0xabc"), Ok("0xabc")),
        );
        let runtime = InMemoryRuntime::new("attps");

        assert_eq!(action.name(), "VERIFY");
        assert_eq!(action.similes(), &["VERIFY_DATA"]);
        assert!(action.validate(&runtime, &message("anything")).await);
        assert_eq!(
            action.examples()[0][1].content.action.as_deref(),
            Some("VERIFY")
        );
    }
}
