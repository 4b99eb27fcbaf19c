//! Entry point: loads settings, wires the persistence store and recognizer
//! factory, and serves the HTTP/WebSocket surface until a shutdown signal
//! arrives.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use stt_gateway_config::{load_settings, ObservabilityConfig, Settings};
use stt_gateway_persistence::{InMemoryTranscriptStore, ScyllaClient, ScyllaTranscriptStore, TranscriptStore};
use stt_gateway_pipeline::recognizer::http::HttpStreamingRecognizer;
use stt_gateway_pipeline::StreamingRecognizer;
use stt_gateway_server::registry::SessionRegistry;
use stt_gateway_server::state::AppState;
use stt_gateway_server::{http, metrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("STT_GATEWAY_ENV").ok();
    let settings = load_settings(env.as_deref())?;
    settings.ensure_directories()?;

    init_tracing(&settings.observability);
    tracing::info!(environment = ?settings.environment, version = env!("CARGO_PKG_VERSION"), "stt-gateway starting up");

    let store = build_store(&settings).await?;
    let recognizer_factory = build_recognizer_factory(&settings);
    let metrics_handle = metrics::install_recorder();

    let app_state = Arc::new(AppState::new(settings.clone(), store, recognizer_factory, metrics_handle));
    let router = http::router(app_state.clone());

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(app_state.registry.clone()))
        .await?;

    Ok(())
}

async fn build_store(settings: &Settings) -> anyhow::Result<Arc<dyn TranscriptStore>> {
    if !settings.persistence.enabled {
        tracing::info!("persistence disabled, using in-memory transcript store");
        return Ok(Arc::new(InMemoryTranscriptStore::new()));
    }
    let client = ScyllaClient::connect(&settings.persistence).await?;
    client.ensure_schema().await?;
    Ok(Arc::new(ScyllaTranscriptStore::new(client)))
}

fn build_recognizer_factory(
    settings: &Settings,
) -> Arc<dyn Fn() -> Arc<dyn StreamingRecognizer> + Send + Sync> {
    let endpoint = recognizer_url(&settings.stt.recognizer_endpoint);
    let credentials_path = settings.stt.recognizer_credentials_path.clone();
    Arc::new(move || {
        Arc::new(HttpStreamingRecognizer::new(endpoint.clone(), credentials_path.clone()))
            as Arc<dyn StreamingRecognizer>
    })
}

fn recognizer_url(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    }
}

/// Initializes tracing, with OpenTelemetry OTLP export when the
/// `telemetry` feature is compiled in and `observability.otlp_endpoint` is
/// configured (§4.12).
#[cfg(feature = "telemetry")]
fn init_tracing(config: &ObservabilityConfig) {
    use opentelemetry_otlp::WithExportConfig;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},tower_http=info", config.log_level).into());

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer =
        if config.log_json { tracing_subscriber::fmt::layer().json().boxed() } else { tracing_subscriber::fmt::layer().boxed() };

    if let (Some(otlp_endpoint), true) = (&config.otlp_endpoint, config.tracing_enabled) {
        match opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(otlp_endpoint))
            .with_trace_config(opentelemetry_sdk::trace::Config::default().with_resource(
                opentelemetry_sdk::Resource::new(vec![
                    opentelemetry::KeyValue::new("service.name", "stt-gateway"),
                    opentelemetry::KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ]),
            ))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
        {
            Ok(tracer) => {
                let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
                subscriber.with(fmt_layer).with(otel_layer).init();
                tracing::info!(endpoint = %otlp_endpoint, "OpenTelemetry tracing enabled");
                return;
            }
            Err(e) => eprintln!("failed to initialize OpenTelemetry, falling back to console: {e}"),
        }
    }
    subscriber.with(fmt_layer).init();
}

#[cfg(not(feature = "telemetry"))]
fn init_tracing(config: &ObservabilityConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},tower_http=info", config.log_level).into());

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer =
        if config.log_json { tracing_subscriber::fmt::layer().json().boxed() } else { tracing_subscriber::fmt::layer().boxed() };
    subscriber.with(fmt_layer).init();
}

async fn shutdown_signal(registry: Arc<SessionRegistry>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining live sessions");
    registry.stop_all("server shutting down").await;
}
