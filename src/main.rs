use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use tracing::{debug, error, info, warn};

use housing_helpdesk::answer::{Answerer, Retriever};
use housing_helpdesk::bot::BotServices;
use housing_helpdesk::circuit_breaker::CircuitBreaker;
use housing_helpdesk::config::{AppConfig, LogConfig};
use housing_helpdesk::dispatch::UpdateWorkerPool;
use housing_helpdesk::documents::DocumentRenderer;
use housing_helpdesk::knowledge_base::build_index;
use housing_helpdesk::menu::MenuLibrary;
use housing_helpdesk::providers::MistralClient;
use housing_helpdesk::session_store::SessionStore;
use housing_helpdesk::telemetry;
use housing_helpdesk::text_splitter::TextSplitter;
use housing_helpdesk::webhook::{create_router, WebhookState};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    telemetry::init(&LogConfig::from_lookup(|key| std::env::var(key).ok()))?;
    info!("Starting Housing Helpdesk Telegram Bot");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    if config.provider.api_key.is_none() {
        warn!("MISTRAL_API_KEY is not set; the knowledge index stays empty and free-form questions find nothing");
    }

    let mistral = Arc::new(MistralClient::new(&config.provider)?);
    let splitter = TextSplitter::new(config.retrieval.chunk_size, config.retrieval.chunk_overlap)?;

    info!(path = %config.paths.knowledge_base.display(), "Building knowledge index");
    let index = build_index(
        &config.paths.knowledge_base,
        &splitter,
        mistral.as_ref(),
        config.retrieval.embedding_batch,
    )
    .await
    .context("Failed to build knowledge index")?;
    info!(chunks = index.len(), "Knowledge index ready");

    let retriever = Retriever::new(Arc::new(index), mistral.clone(), &config.retrieval);
    let answerer = Answerer::new(retriever, mistral, CircuitBreaker::new(config.breaker.clone()));

    let bot = Bot::new(config.bot_token.clone());
    let sessions = SessionStore::new(Duration::from_secs(config.session_ttl_secs));
    let services = Arc::new(BotServices {
        messenger: Arc::new(bot.clone()),
        sessions: Arc::clone(&sessions),
        menu: MenuLibrary::new(&config.paths.menu_sections),
        documents: DocumentRenderer::new(&config.paths.templates, &config.paths.document_output),
        answerer,
    });

    let sweeper = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_expired().await;
            if evicted > 0 {
                debug!(evicted, "Expired conversation states removed");
            }
        }
    });

    let pool = UpdateWorkerPool::start(services, &config.dispatch);

    let webhook_url = reqwest::Url::parse(&config.webhook_url())
        .with_context(|| format!("Invalid WEBHOOK_URL {}", config.webhook_base_url))?;
    bot.set_webhook(webhook_url).await.context("Failed to register webhook")?;
    info!(base_url = %config.webhook_base_url, "Webhook registered");

    let router = create_router(WebhookState::new(config.bot_token.as_str(), pool.handle()));
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Webhook server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    pool.shutdown().await;
    info!("Bot stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
