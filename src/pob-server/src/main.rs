//! PoB HTTP API server

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use pob::PobPaths;
use pob_server::{router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI
// =============================================================================

#[derive(Parser)]
#[command(name = "pob-server")]
#[command(about = "Local HTTP API bridging the trade site to Path of Building")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Start the API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "5000")]
        port: u16,

        /// Bind address
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,

        /// Path of Building install directory
        #[arg(long, env = "POB_INSTALL")]
        pob_install: PathBuf,

        /// Path of Building working-data directory (defaults to the install directory)
        #[arg(long, env = "POB_PATH")]
        pob_path: Option<PathBuf>,

        /// Build loaded when a load request names none
        #[arg(long, env = "POB_DEFAULT_BUILD")]
        default_build: Option<PathBuf>,

        /// Rune table source (defaults to <install>/Data/ModRunes.lua)
        #[arg(long, env = "POB_MOD_RUNES")]
        runes_file: Option<PathBuf>,

        /// Trade mod source (defaults to <install>/Data/QueryMods.lua)
        #[arg(long, env = "POB_QUERY_MODS")]
        enchants_file: Option<PathBuf>,

        /// Lua runtime used to run the bridge script
        #[arg(long, env = "POB_LAUNCHER", default_value = pob::config::DEFAULT_LAUNCHER)]
        launcher: String,

        /// Headless bridge script (defaults to <install>/HeadlessBridge.lua)
        #[arg(long, env = "POB_BRIDGE_SCRIPT")]
        bridge_script: Option<PathBuf>,
    },
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            port,
            bind,
            pob_install,
            pob_path,
            default_build,
            runes_file,
            enchants_file,
            launcher,
            bridge_script,
        } => {
            // Initialize tracing
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "pob=info,pob_server=info,tower_http=debug".into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            let mut paths = PobPaths::from_install(&pob_install);
            if let Some(data) = pob_path {
                paths = paths.with_data(data);
            }
            if let Some(build) = default_build {
                paths = paths.with_default_build(build);
            }
            if let Some(file) = runes_file {
                paths.runes_file = file;
            }
            if let Some(file) = enchants_file {
                paths.enchants_file = file;
            }
            if let Some(script) = bridge_script {
                paths.bridge_script = script;
            }
            paths.launcher = launcher;

            tracing::info!("PoB install: {}", paths.install.display());
            tracing::info!("PoB data: {}", paths.data.display());

            let state = Arc::new(AppState::new(&paths));
            if let Some(reason) = state.gateway.status().import_error {
                tracing::warn!("PoB engine unavailable: {}", reason);
            }

            let app = router(state);

            let bind_addr = format!("{}:{}", bind, port);
            tracing::info!("Starting server on {}", bind_addr);
            tracing::info!("OpenAPI spec available at /openapi.json");
            tracing::info!("Interactive docs at /scalar");

            let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
