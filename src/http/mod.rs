use anyhow::{Context, Result};
use axum::{
  extract::{DefaultBodyLimit, MatchedPath, Request},
  middleware::{self, Next},
  response::IntoResponse,
  routing::{get, post},
  Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::future::ready;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{Duration, Instant};
use tower_http::{
  catch_panic::CatchPanicLayer,
  timeout::TimeoutLayer,
  trace::{self, TraceLayer},
};
use tracing::{error, info, Level};
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use crate::config::Config;
use crate::kai::{KaiOption, KaiRequest, KaiResponse, ProcessRunner, RequestHandler};

mod error;
mod form;
mod process;
mod process_image;
pub mod uploads;

pub use error::AppError;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(OpenApi)]
#[openapi(
  paths(process::process, process_image::process_image),
  components(schemas(KaiRequest, KaiResponse, KaiOption, process_image::UploadForm)),
  info(
    title = "KAI demo API",
    version = "0.1.0",
    description = "Runs the KAI-impl face and ML task pipeline on an image"
  )
)]
struct ApiDoc;

#[derive(Clone)]
struct AppState {
  handler: Arc<RequestHandler>,
  uploads: Arc<uploads::UploadStore>,
  workers: Arc<rayon::ThreadPool>,
}

impl AppState {
  /// Runs the blocking KAI-impl invocation on the worker pool.
  async fn process(&self, request: KaiRequest) -> Result<String, AppError> {
    let (send, recv) = tokio::sync::oneshot::channel();
    let handler = self.handler.clone();

    self.workers.spawn(move || {
      let _ = send.send(handler.process(&request));
    });

    let result = recv.await.map_err(|e| {
      error!("failed to receive: {}", e);
      AppError::InternalServerError(e.to_string())
    })?;

    Ok(result?)
  }
}

pub fn bootstrap(cfg: &Config) -> Result<Router> {
  let runner = ProcessRunner::new(&cfg.kai.working_dir, &cfg.kai.executable)
    .context("failed to resolve KAI-impl working directory")?;
  info!(
    program = %runner.program().display(),
    "KAI-impl location"
  );

  let workers = rayon::ThreadPoolBuilder::new()
    .num_threads(cfg.app.worker_threads.max(1))
    .thread_name(|i| format!("kai-worker-{}", i))
    .build()
    .context("failed to build worker pool")?;

  let uploads = uploads::UploadStore::new(&cfg.uploads.path)
    .context("failed to resolve upload directory")?;
  info!(path = %uploads.path().display(), "upload directory");

  let state = AppState {
    handler: Arc::new(RequestHandler::new(Arc::new(runner))),
    uploads: Arc::new(uploads),
    workers: Arc::new(workers),
  };

  let api = Router::new()
    .route("/api/v1/process", post(process::process))
    .route("/api/v1/process-image", post(process_image::process_image))
    .layer(DefaultBodyLimit::max(
      cfg.app.max_body_size_mb * 1000 * 1000,
    ));

  let mut app = Router::new()
    .route("/", get(form::form))
    .merge(api)
    .with_state(state);

  if cfg.app.enable_openapi.unwrap_or(false) {
    let doc = serde_json::to_value(ApiDoc::openapi()).context("failed to serialize OpenAPI doc")?;
    app = app.merge(Redoc::with_url("/redoc", doc)).route(
      "/api-docs/openapi.json",
      get(|| async { axum::Json(ApiDoc::openapi()) }),
    );
  }

  let timeout = cfg
    .app
    .request_timeout_secs
    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

  let app = app.layer((
    middleware::from_fn(track_metrics),
    TraceLayer::new_for_http()
      .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
      .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
    TimeoutLayer::new(Duration::from_secs(timeout)),
    CatchPanicLayer::new(),
  ));

  Ok(app)
}

pub async fn serve(router: Router, listen: &str) -> Result<()> {
  let listener = tokio::net::TcpListener::bind(listen)
    .await
    .with_context(|| format!("failed to bind to address: {}", listen))?;
  info!("listening on {}", listen);

  axum::serve(listener, router)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("error running HTTP server")
}

async fn healthz() -> &'static str {
  "pong"
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      error!("failed to install Ctrl+C handler: {}", e);
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        error!("failed to install signal handler: {}", e);
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
      _ = ctrl_c => {},
      _ = terminate => {},
  }
}

pub async fn serve_metrics(listen: &str) -> Result<()> {
  let app = metrics_app()?;

  let listener = tokio::net::TcpListener::bind(listen)
    .await
    .with_context(|| format!("failed to bind to address: {}", listen))?;
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("error running metrics HTTP server")
}

fn metrics_app() -> Result<Router> {
  let recorder_handle = setup_metrics_recorder()?;
  Ok(
    Router::new()
      .route("/metrics", get(move || ready(recorder_handle.render())))
      .route("/healthz", get(healthz)),
  )
}

fn setup_metrics_recorder() -> Result<PrometheusHandle> {
  const EXPONENTIAL_SECONDS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
  ];
  // KAI-impl loads ML models on every run, so its runs are far slower than a request.
  const INVOCATION_SECONDS: &[f64] = &[0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

  let handle = PrometheusBuilder::new()
    .set_buckets_for_metric(
      Matcher::Full("http_requests_duration_seconds".to_string()),
      EXPONENTIAL_SECONDS,
    )?
    .set_buckets_for_metric(
      Matcher::Full("kai_invocation_duration_seconds".to_string()),
      INVOCATION_SECONDS,
    )?
    .install_recorder()?;

  Ok(handle)
}

async fn track_metrics(req: Request, next: Next) -> impl IntoResponse {
  let start = Instant::now();
  let path = if let Some(matched_path) = req.extensions().get::<MatchedPath>() {
    matched_path.as_str().to_owned()
  } else {
    req.uri().path().to_owned()
  };
  let method = req.method().clone();

  let response = next.run(req).await;

  let latency = start.elapsed().as_secs_f64();
  let status = response.status().as_u16().to_string();

  let labels = [
    ("method", method.to_string()),
    ("path", path),
    ("status", status),
  ];

  metrics::counter!("http_requests_total", &labels).increment(1);
  metrics::histogram!("http_requests_duration_seconds", &labels).record(latency);

  response
}
