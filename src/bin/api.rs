use attps_verify_agent::{
    action::{ActionRegistry, VerifyAction},
    api::start_server,
    client::RpcClientFactory,
    config::RpcOptions,
    generation::GeminiObjectGenerator,
    runtime::InMemoryRuntime,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("ATTPs verify agent - API Server");
    info!("Port: {}", api_port);

    let generator = GeminiObjectGenerator::from_env().map_err(|e| {
        error!(error = %e, "GEMINI_API_KEY not set in .env");
        e
    })?;

    let agent_name = std::env::var("AGENT_NAME").unwrap_or_else(|_| "attps".to_string());
    let runtime = Arc::new(InMemoryRuntime::new(agent_name).with_env_fallback());

    let mut actions = ActionRegistry::new();
    actions.register(Arc::new(VerifyAction::new(
        Arc::new(generator),
        Arc::new(RpcClientFactory::new(RpcOptions::default())),
    )));

    info!(actions = ?actions.list(), "Actions registered");

    start_server(runtime, Arc::new(actions), api_port).await?;

    Ok(())
}
