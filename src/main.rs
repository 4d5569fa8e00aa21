use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use healthmate::bot::Bot;
use healthmate::channels::{Channel, ChannelManager, CliChannel, TelegramChannel};
use healthmate::config::{BotConfig, StoreConfig};
use healthmate::conversation::ConversationController;
use healthmate::llm::create_provider;
use healthmate::routes::{StatusState, status_routes};
use healthmate::store::{LibSqlBackend, ProfileStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export GEMINI_API_KEY=...   (or set HEALTHMATE_LLM_BACKEND and its key)");
        std::process::exit(1);
    });

    // Keep the guard alive so buffered log lines are flushed on exit.
    let _log_guard = init_tracing(&config);

    eprintln!("🩺 HealthMate v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   LLM: {} ({})", config.llm.backend, config.llm.model);

    // ── Generation client ───────────────────────────────────────────
    let llm = create_provider(&config.llm).context("creating LLM provider")?;

    // ── Database ────────────────────────────────────────────────────
    let store: Arc<dyn ProfileStore> = match &config.store {
        StoreConfig::Remote { url, auth_token } => {
            eprintln!("   Database: {url}");
            Arc::new(
                LibSqlBackend::new_remote(url, auth_token)
                    .await
                    .with_context(|| format!("connecting to database at {url}"))?,
            )
        }
        StoreConfig::Local { path } => {
            eprintln!("   Database: {}", path.display());
            Arc::new(
                LibSqlBackend::new_local(path)
                    .await
                    .with_context(|| format!("opening database at {}", path.display()))?,
            )
        }
    };

    // ── Status endpoint ─────────────────────────────────────────────
    if let Some(port) = config.http_port {
        let app = status_routes(StatusState {
            store: Arc::clone(&store),
        });
        let addr = std::net::SocketAddr::new(config.http_host, port);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding status server to {addr}"))?;
        eprintln!("   Status: http://{addr}/health");
        tokio::spawn(async move {
            tracing::info!(port, "Status server started");
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Status server stopped: {e}");
            }
        });
    }

    // ── Channels ────────────────────────────────────────────────────
    let mut channels = ChannelManager::new();
    channels.add(Box::new(CliChannel::new()));

    if let Some(telegram) = &config.telegram {
        eprintln!(
            "   Telegram: enabled (allowed: {})",
            if telegram.allowed_users.iter().any(|u| u == "*") {
                "everyone".to_string()
            } else {
                telegram.allowed_users.join(", ")
            }
        );
        let channel = TelegramChannel::new(
            telegram.bot_token.clone(),
            telegram.allowed_users.clone(),
        );
        if let Err(e) = channel.health_check().await {
            tracing::warn!("Telegram health check failed: {e}");
        }
        channels.add(Box::new(channel));
    }

    eprintln!("   Channels: {}\n", channels.channel_names().join(", "));

    let controller = Arc::new(ConversationController::new(store, llm));
    Bot::new(channels, controller).run().await?;

    Ok(())
}

/// Log to stderr, plus daily-rolling files when a log directory is set.
fn init_tracing(config: &BotConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "healthmate.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    guard
}
