use anyhow::{Context, Result};
use facematch_deepface::DeepFaceClient;
use std::sync::Arc;

mod api;
mod config;
mod engine;
mod error;
mod telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = config::Config::load().context("loading configuration")?;
    telemetry::init(cfg.log_format, cfg.log_file.as_deref(), cfg.log_max_files)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %cfg.model,
        catalog = %cfg.catalog_path.display(),
        deepface = %cfg.deepface_url,
        "facematchd starting"
    );

    let deepface = cfg.deepface();
    let engine = engine::spawn_engine(move || DeepFaceClient::new(deepface))
        .context("starting comparison engine")?;

    let state = Arc::new(api::AppState {
        engine,
        config: Arc::new(cfg.clone()),
    });
    let app = api::create_app(state);

    let listener = tokio::net::TcpListener::bind(cfg.bind)
        .await
        .with_context(|| format!("binding {}", cfg.bind))?;
    tracing::info!(addr = %cfg.bind, "facematchd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("facematchd shutting down");
    Ok(())
}
