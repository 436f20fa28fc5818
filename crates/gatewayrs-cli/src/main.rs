//! Protocol gateway CLI
//!
//! Binary entrypoint. Loads configuration, builds the session controller,
//! and serves either stdio (stream) or HTTP (framed) downstream transport.

mod paths;

use anyhow::{Context, Result};
use clap::Parser;
use gatewayrs_core::GatewayConfig;
use gatewayrs_mcp::SessionEndHook;
use gatewayrs_session::{SessionController, ShutdownCoordinator};
use paths::GatewayPaths;
use rmcp::{transport::stdio, ServiceExt};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mcp-gateway")]
#[command(about = "Protocol gateway that multiplexes upstream MCP servers behind one downstream endpoint")]
struct Cli {
    /// Config file path (defaults to the system config directory)
    #[arg(short, long)]
    config: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}={}", env!("CARGO_CRATE_NAME"), level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load configuration from file. Missing file falls back to stream mode
/// with no upstream peers configured, matching the default `ServerMode`
/// behavior of this codebase's other CLI.
fn load_config(path: &Path) -> Result<GatewayConfig> {
    if !path.exists() {
        info!("Config file not found: {}, using defaults", path.display());
        return Ok(GatewayConfig {
            transport: gatewayrs_core::TransportMode::Stream,
            port: None,
            host: None,
            mcp_clients: Default::default(),
        });
    }

    info!("Loading config from: {}", path.display());
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: GatewayConfig =
        serde_yaml::from_str(&contents).with_context(|| "failed to parse config file as YAML")?;
    Ok(config)
}

/// `PORT`/`HOST` env vars win over the file per the configuration rules.
fn apply_env_overrides(mut config: GatewayConfig) -> GatewayConfig {
    if let Ok(port) = std::env::var("PORT") {
        match port.parse() {
            Ok(p) => config.port = Some(p),
            Err(_) => tracing::warn!("ignoring non-numeric PORT env var: {port}"),
        }
    }
    if let Ok(host) = std::env::var("HOST") {
        config.host = Some(host);
    }
    config
}

fn print_banner(config: &GatewayConfig) {
    eprintln!(
        r#"
 ███╗   ███╗ ██████╗██████╗
 ████╗ ████║██╔════╝██╔══██╗
 ██╔████╔██║██║     ██████╔╝
 ██║╚██╔╝██║██║     ██╔═══╝
 ██║ ╚═╝ ██║╚██████╗██║
 ╚═╝     ╚═╝ ╚═════╝╚═╝
 gateway
"#
    );
    eprintln!(
        "    Protocol gateway v{} — {} peers configured, transport: {:?}\n",
        env!("CARGO_PKG_VERSION"),
        config.mcp_clients.len(),
        config.transport
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config_path = match &cli.config {
        Some(p) => std::path::PathBuf::from(p),
        None => GatewayPaths::new()?.default_config_file(),
    };

    let config = load_config(&config_path)?;
    let config = apply_env_overrides(config);
    config
        .validate()
        .context("configuration failed validation")?;

    print_banner(&config);

    let transport = config.transport;
    let controller = SessionController::new(config);
    let shutdown = Arc::new(ShutdownCoordinator::new(
        controller.fleet(),
        controller.aggregation(),
        controller.capabilities(),
    ));

    match transport {
        gatewayrs_core::TransportMode::Stream => run_stdio(&controller, &shutdown).await,
        gatewayrs_core::TransportMode::Framed => run_http(&controller, &shutdown).await,
    }
}

async fn run_stdio(controller: &SessionController, shutdown: &ShutdownCoordinator) -> Result<()> {
    info!("Starting gateway in stream (stdio) mode");
    eprintln!("Mode: stream (stdio)");

    let gateway = controller.duplex_gateway().await;
    let service = (*gateway).clone().serve(stdio()).await?;

    tokio::select! {
        result = service.waiting() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
    }

    shutdown.close_all().await;
    Ok(())
}

async fn run_http(controller: &SessionController, shutdown: &Arc<ShutdownCoordinator>) -> Result<()> {
    use rmcp::transport::streamable_http_server::{
        session::local::LocalSessionManager,
        tower::{StreamableHttpServerConfig, StreamableHttpService},
    };

    let config = controller.config_snapshot();
    let host = config.host.clone().unwrap_or_else(|| "127.0.0.1".to_string());
    let port = config.port.unwrap_or(8080);
    let bind = format!("{host}:{port}");

    info!("Starting gateway in framed (HTTP) mode on {bind}");
    eprintln!("Mode: framed (HTTP)");
    eprintln!("Listening on: http://{bind}");
    eprintln!("MCP endpoint: http://{bind}/mcp");

    let controller = controller.clone();
    let shutdown_for_factory = shutdown.clone();
    let mcp_service = StreamableHttpService::new(
        move || {
            let session_id = uuid::Uuid::new_v4().to_string();
            let shutdown = shutdown_for_factory.clone();
            let end_hook: SessionEndHook = Arc::new(move |session_id: String| {
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    shutdown.close_session(&session_id).await;
                });
            });
            let gateway = controller.framed_gateway(session_id, end_hook);
            Ok((*gateway).clone())
        },
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    let app = axum::Router::new()
        .route(
            "/health",
            axum::routing::get(|| async {
                axum::response::Json(serde_json::json!({
                    "status": "healthy",
                    "service": "mcp-gateway",
                    "version": env!("CARGO_PKG_VERSION")
                }))
            }),
        )
        .nest_service("/mcp", mcp_service);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("HTTP server listening on {bind}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.unwrap();
            info!("received shutdown signal");
        })
        .await?;

    shutdown.close_all().await;
    Ok(())
}
