mod config;
mod repl;

use anyhow::Result;
use config::Config;
use quill_core::client::{ClientConfig, GeminiClient};
use quill_core::storage::SqliteStore;
use quill_core::store::ConversationStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            return Err(e);
        }
    };

    let storage = SqliteStore::open(&Config::history_path()?)?;

    let Some(api_key) = config.resolve_api_key(&storage) else {
        eprintln!("No API key configured.");
        eprintln!(
            "Set GEMINI_API_KEY, or add \"api_key\" to {}",
            Config::config_path()?.display()
        );
        anyhow::bail!("missing API key");
    };

    let client = GeminiClient::new(ClientConfig {
        api_key,
        model: config.model.clone(),
        base_url: config.base_url.clone(),
        temperature: config.temperature,
        max_output_tokens: config.max_output_tokens,
    });

    let store = ConversationStore::load(storage.clone());

    repl::run(client, store, storage).await
}
