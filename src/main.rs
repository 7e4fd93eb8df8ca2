use anyhow::Result;
use kai_demo::config;
use kai_demo::http;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
  // Load config
  let cfg = config::parse(&config::config_path())?;

  // Initialize tracing
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kai_demo=debug,tower_http=debug".into()),
    )
    .with(
      tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact(),
    )
    .init();

  // Serve
  let router = http::bootstrap(&cfg)?;

  tokio::try_join!(
    http::serve(router, &cfg.app.listen),
    http::serve_metrics(&cfg.app.metrics_listen),
  )?;

  Ok(())
}
