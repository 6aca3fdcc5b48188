use anyhow::Context;
use std::sync::Arc;

use encpos_api::{router, search_path};
use encpos_backend::ElasticClient;
use encpos_cli::init_tracing;
use encpos_core::config::Config;
use encpos_query::SearchService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;

    let backend = ElasticClient::new(&settings.backend)?;
    let service = Arc::new(SearchService::new(backend, &settings));
    let app = router(service, &settings.server.api_version);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding {}", addr))?;
    tracing::info!("serving http://{}{} (backend {})", addr, search_path(&settings.server.api_version), settings.backend.url);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
