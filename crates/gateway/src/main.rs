use axum::routing::get;
use axum::Router;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use spaceduck_domain::config::PatchOp;
use spaceduck_gateway::bootstrap::{self, BootPaths};
use spaceduck_gateway::cli::{Cli, Command, ConfigCommand};
use spaceduck_gateway::ws;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let paths = bootstrap::resolve_paths();
            serve(&paths).await
        }
        Some(Command::Pair) => {
            let paths = bootstrap::resolve_paths();
            pair(&paths).await
        }
        Some(Command::Config(ConfigCommand::Get { pointer })) => {
            let paths = bootstrap::resolve_paths();
            let store = bootstrap::open_config_store(&paths).await?;
            match store.get(&pointer) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => {
                    eprintln!("no value at {pointer}");
                    std::process::exit(1);
                }
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Set { pointer, value })) => {
            let paths = bootstrap::resolve_paths();
            let store = bootstrap::open_config_store(&paths).await?;
            let value: serde_json::Value = serde_json::from_str(&value)
                .map_err(|e| anyhow::anyhow!("value is not valid JSON: {e}"))?;
            let rev = store.rev();
            let op = if store.get(&pointer).is_some() {
                PatchOp::Replace { path: pointer.clone(), value }
            } else {
                PatchOp::Add { path: pointer.clone(), value }
            };
            let outcome = store.patch(vec![op], &rev).await?;
            println!("ok, rev={}", outcome.rev);
            if !outcome.needs_restart.is_empty() {
                println!("restart required for: {}", outcome.needs_restart.join(", "));
            }
            Ok(())
        }
        Some(Command::Version) => {
            println!("spaceduck {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured tracing, reading `SPACEDUCK_LOG_LEVEL` when set and
/// falling back to the same default verbosity the teacher ships.
fn init_tracing() {
    let filter = std::env::var("SPACEDUCK_LOG_LEVEL")
        .ok()
        .and_then(|level| EnvFilter::try_new(format!("info,spaceduck_gateway={level}")).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info,spaceduck_gateway=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();
}

async fn serve(paths: &BootPaths) -> anyhow::Result<()> {
    tracing::info!("spaceduck gateway starting");

    let state = bootstrap::build_app_state(paths).await?;
    let config = state.config.current();
    let ws_deps = bootstrap::build_ws_deps(&state, &config);

    let app = spaceduck_gateway::http::router(state.clone())
        .merge(
            Router::new()
                .route("/ws", get(ws::upgrade))
                .with_state(ws_deps),
        )
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn pair(paths: &BootPaths) -> anyhow::Result<()> {
    let (_store, auth) = bootstrap::open_store_and_auth(paths).await?;
    let result = auth.create_pairing_session().await?;
    println!("pairing code: {}", result.code);
    println!("pairing id:   {}", result.pairing_id);
    println!("enter this code in the companion app to pair a device");
    Ok(())
}
