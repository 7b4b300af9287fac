// Declare the modules
pub mod api;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod repl;
pub mod routes;
pub mod state;
pub mod storage;
pub mod title;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::ProxyConfig;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use crate::api::{LLMApiProvider, OpenAICompatibleProvider};
use crate::client::{CompletionClient, ProxyClient};
use crate::controller::ConversationController;
use crate::storage::{Persistence, SqliteStore};

#[derive(Parser)]
#[command(name = "webchat")]
#[command(about = "Chat proxy and conversation client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the /api/chat proxy (default)
    Serve {
        #[arg(long, default_value = config::DEFAULT_BIND_ADDR)]
        bind: SocketAddr,
        #[arg(long, default_value = api::DEFAULT_BACKEND_URL)]
        backend_url: String,
        /// 'env:NAME' or 'keyring'
        #[arg(long, default_value = config::DEFAULT_API_KEY_REF)]
        api_key_ref: String,
    },
    /// Read the backend credential from stdin and store it in the OS keyring
    SetKey,
    /// Chat from the terminal through a running proxy
    Chat {
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        proxy_url: String,
        /// Directory holding the conversation database
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Serve { bind, backend_url, api_key_ref }) => {
            serve(ProxyConfig { bind_addr: bind, backend_url, api_key_ref }).await
        }
        None => serve(ProxyConfig::default()).await,
        Some(Commands::SetKey) => set_key(),
        Some(Commands::Chat { proxy_url, data_dir }) => chat(&proxy_url, data_dir).await,
    }
}

async fn serve(config: ProxyConfig) -> anyhow::Result<()> {
    let api_key = match config::get_api_key(&config.api_key_ref) {
        Ok(key) => Some(key),
        Err(e) => {
            log::warn!("No backend credential available, requests will fail: {:?}", e);
            None
        }
    };

    let api_provider: Arc<dyn LLMApiProvider> =
        Arc::new(OpenAICompatibleProvider::new(config.backend_url.clone(), api_key));
    let app = routes::router(AppState::new(api_provider));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    log::info!(
        "Chat proxy listening on http://{}{} (backend {})",
        config.bind_addr,
        routes::CHAT_ROUTE,
        config.backend_url
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Proxy server failed")?;
    log::info!("Chat proxy stopped");
    Ok(())
}

fn set_key() -> anyhow::Result<()> {
    let mut api_key = String::new();
    std::io::stdin()
        .read_line(&mut api_key)
        .context("Failed to read API key from stdin")?;
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(anyhow::anyhow!("API key cannot be empty."));
    }
    config::set_api_key_in_keyring(api_key)
}

async fn chat(proxy_url: &str, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let db_path = config::database_path(data_dir)?;
    let store = SqliteStore::open(&db_path).await?;
    let persistence = Persistence::new(Arc::new(store));

    let client: Arc<dyn CompletionClient> = Arc::new(ProxyClient::new(proxy_url));
    let controller = ConversationController::load(persistence, client).await;
    repl::run_repl(controller).await
}
