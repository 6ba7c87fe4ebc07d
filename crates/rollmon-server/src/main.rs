use anyhow::Result;
use std::net::SocketAddr;
use tokio::signal;

use rollmon_server::app;
use rollmon_server::config::ServerConfig;
use rollmon_server::logging;
use rollmon_server::services::TemplateService;
use rollmon_server::state::AppState;
use rollmon_server::sweeper::ExpirySweeper;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  rollmon-server [config.toml]                              Start the server");
    eprintln!("  rollmon-server init-templates <config.toml> <seed.json>   Load notification templates from a seed file");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init-templates") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-templates requires <config.toml> and <seed.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-templates requires <seed.json> argument")
            })?;
            run_init_templates(config_path, seed_path).await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

/// Inserts the templates of a JSON seed file, skipping names that exist.
async fn run_init_templates(config_path: &str, seed_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    logging::init_tracing(config.logging.json)?;

    let seed_content = std::fs::read_to_string(seed_path)
        .map_err(|e| anyhow::anyhow!("Failed to read seed file '{}': {}", seed_path, e))?;
    let requests = rollmon_notify::template::parse_seed(&seed_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{}': {}", seed_path, e))?;

    let store = config.storage.open()?;
    let outcome = TemplateService::new(store).seed(requests).await?;

    tracing::info!(
        created = outcome.created,
        skipped = outcome.skipped,
        "Template seeding finished"
    );
    Ok(())
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    logging::init_tracing(config.logging.json)?;

    tracing::info!(
        http_port = config.http_port,
        backend = ?config.storage.backend,
        "rollmon-server starting"
    );

    let store = config.storage.open()?;
    let state = AppState::new(store.clone(), config.clone());

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_server = axum::serve(http_listener, app::build_http_app(state));

    let sweeper_handle = if config.sweeper.enabled {
        let sweeper = ExpirySweeper::new(store, config.sweeper.tick_secs);
        Some(tokio::spawn(async move {
            sweeper.run().await;
        }))
    } else {
        tracing::info!("Notification expiry sweeper disabled");
        None
    };

    tracing::info!(http = %http_addr, "Server started");

    if let Err(e) = http_server
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
        })
        .await
    {
        tracing::error!(error = %e, "HTTP server error");
    }

    if let Some(h) = sweeper_handle {
        h.abort();
    }
    tracing::info!("Server stopped");

    Ok(())
}
