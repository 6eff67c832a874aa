use std::sync::Arc;

use civic_assist::api::router;
use civic_assist::config::{CivicConfig, LlmConfig, SearchConfig, ServerConfig};
use civic_assist::llm::create_provider;
use civic_assist::pipeline::{CivicPipeline, PipelineDeps};
use civic_assist::search::{SearchProvider, SerperSearch};
use civic_assist::store::{HistoryStore, LibSqlBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = CivicConfig::from_env();
    let server = ServerConfig::from_env();

    eprintln!("🏛️  Civic Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Region: {}", config.region.name);
    eprintln!("   Chat API: http://0.0.0.0:{}/api/chat", server.port);
    eprintln!("   Stream API: http://0.0.0.0:{}/api/chat/stream", server.port);

    // ── Collaborators ───────────────────────────────────────────────────
    let llm = match LlmConfig::from_env(config.llm_timeout) {
        Some(llm_config) => {
            eprintln!("   Model: {}", llm_config.model);
            Some(create_provider(&llm_config)?)
        }
        None => {
            eprintln!("   Model: none (ANTHROPIC_API_KEY not set, rule-based classification)");
            None
        }
    };

    let search: Option<Arc<dyn SearchProvider>> = match SearchConfig::from_env(config.search_timeout) {
        Some(search_config) => Some(Arc::new(SerperSearch::new(&search_config)?)),
        None => {
            eprintln!("   Search: none (SERPER_API_KEY not set, static resources only)");
            None
        }
    };

    // ── Database ────────────────────────────────────────────────────────
    let db_path = std::path::Path::new(&server.db_path);
    let store: Arc<dyn HistoryStore> = match LibSqlBackend::new_local(db_path).await {
        Ok(backend) => {
            eprintln!("   Database: {}", server.db_path);
            Arc::new(backend)
        }
        Err(e) => {
            tracing::warn!(path = %server.db_path, error = %e, "Falling back to in-memory history");
            eprintln!("   Database: in-memory (could not open {})", server.db_path);
            Arc::new(LibSqlBackend::new_memory().await?)
        }
    };

    // ── Pipeline + HTTP ─────────────────────────────────────────────────
    let pipeline = CivicPipeline::new(
        config,
        PipelineDeps {
            llm,
            search,
            store: Some(store),
        },
    )?;
    let app = router(pipeline);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", server.port)).await?;
    tracing::info!(port = server.port, "Civic Assist listening");
    axum::serve(listener, app).await?;

    Ok(())
}
