use attps_verify_agent::{
    action::{Action, VerifyAction},
    client::RpcClientFactory,
    config::RpcOptions,
    generation::GeminiObjectGenerator,
    runtime::{CollectingCallback, Content, InMemoryRuntime, Memory},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let text = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if text.trim().is_empty() {
        eprintln!("usage: verify <message>");
        eprintln!("example: verify I want to verify data: 0x68656c6c6f ...");
        std::process::exit(2);
    }

    let runtime = InMemoryRuntime::new("attps").with_env_fallback();
    let action = VerifyAction::new(
        Arc::new(GeminiObjectGenerator::from_env()?),
        Arc::new(RpcClientFactory::new(RpcOptions::default())),
    );

    let message = Memory::new(Uuid::new_v4(), Uuid::new_v4(), Content::text(text));
    info!(message_id = %message.id, "Running {}", action.name());

    let callback = CollectingCallback::new();
    let outcome = action.handle(&runtime, &message, None, &callback).await;

    for reply in callback.replies().await {
        println!("{}", reply.text);
    }

    if !outcome.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
