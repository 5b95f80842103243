//! Zoe server entry point.

use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use zoe_config::{load_settings, Settings};
use zoe_server::{create_router, Services};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = std::env::var("ZOE_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => {
            eprintln!("loaded configuration (env: {})", env.as_deref().unwrap_or("default"));
            settings
        }
        Err(e) => {
            eprintln!("warning: failed to load config: {e}. using defaults.");
            Settings::default()
        }
    };

    init_tracing(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting zoe server");
    tracing::info!(environment = ?config.environment, "configuration loaded");

    let services = Services::new(config.clone())?;
    services.startup().await;

    let app = create_router(services.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    services.shutdown().await;
    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
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
        _ = ctrl_c => tracing::info!("received ctrl-c, initiating graceful shutdown"),
        _ = terminate => tracing::info!("received SIGTERM, initiating graceful shutdown"),
    }
}

#[cfg(feature = "telemetry")]
fn init_tracing(config: &Settings) {
    use opentelemetry_otlp::WithExportConfig;

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "zoe_server=info,tower_http=debug".into());

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer =
        if config.observability.json_logs { tracing_subscriber::fmt::layer().json().boxed() } else { tracing_subscriber::fmt::layer().boxed() };

    if config.observability.telemetry_enabled {
        if let Ok(otlp_endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
            match opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(&otlp_endpoint))
                .with_trace_config(opentelemetry_sdk::trace::Config::default().with_resource(opentelemetry_sdk::Resource::new(vec![
                    opentelemetry::KeyValue::new("service.name", "zoe-server"),
                    opentelemetry::KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])))
                .install_batch(opentelemetry_sdk::runtime::Tokio)
            {
                Ok(tracer) => {
                    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
                    subscriber.with(fmt_layer).with(otel_layer).init();
                    tracing::info!(endpoint = %otlp_endpoint, "OpenTelemetry tracing enabled");
                    return;
                }
                Err(e) => eprintln!("failed to initialize OpenTelemetry: {e}. falling back."),
            }
        }
    }
    subscriber.with(fmt_layer).init();
}

#[cfg(not(feature = "telemetry"))]
fn init_tracing(config: &Settings) {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "zoe_server=info,tower_http=debug".into());

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer =
        if config.observability.json_logs { tracing_subscriber::fmt::layer().json().boxed() } else { tracing_subscriber::fmt::layer().boxed() };
    subscriber.with(fmt_layer).init();
}
