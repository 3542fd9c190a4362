// Ghibli Studio server: relays generate/edit requests to the OpenAI Images API.
//
// Environment (a .env file is honored):
//   OPENAI_API_KEY         required
//   OPENAI_BASE_URL        default https://api.openai.com/v1
//   BIND_ADDR              default 0.0.0.0:3000
//   STATIC_DIR             optional front-end build to serve
//   UPSTREAM_TIMEOUT_SECS  default 120
//   RUST_LOG               log filter

use std::sync::Arc;

use anyhow::Context;
use ghibli_studio::{router, AppState, Config, OpenAiImageService};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ghibli_studio=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env().context("invalid configuration")?;

    let service = OpenAiImageService::builder()
        .api_key(config.openai_api_key.clone())
        .base_url(config.openai_base_url.clone())
        .timeout(config.upstream_timeout)
        .build()
        .context("failed to create upstream client")?;

    let state = Arc::new(AppState::new(service));

    let mut app = router(state);
    if let Some(dir) = &config.static_dir {
        tracing::info!(dir = %dir.display(), "serving static assets");
        app = app.fallback_service(ServeDir::new(dir));
    }
    let app = app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %config.bind_addr, "server running");

    axum::serve(listener, app).await?;
    Ok(())
}
