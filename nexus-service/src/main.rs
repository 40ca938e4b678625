use anyhow::{Context, Result};
use nexus_service::{ServiceConfig, create_app};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing: structured JSON by default, `LOG_FORMAT=pretty` for development
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nexus_service=debug,nexus_flow=debug,tower_http=debug".into());

    match log_format.as_str() {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = ServiceConfig::from_env().context("invalid service configuration")?;
    info!(
        provider = ?config.provider,
        model = %config.model,
        validation = ?config.validation,
        timeout_secs = config.analysis_timeout.as_secs(),
        "Loaded configuration"
    );

    let app = create_app(&config);
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("cannot bind port {}", config.port))?;
    let addr = listener.local_addr()?;

    info!("NEXUS service listening on {}", addr);
    info!("Upload endpoint: POST http://{}/documents?name=<filename>", addr);
    info!("State endpoint: GET http://{}/state", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
