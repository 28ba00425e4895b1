//! rigview - Avatar rig synchronization service
//!
//! Main entry point for the CLI application.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rigview::{config::Config, web::WebServer, AppState};

/// rigview - Avatar rig synchronization service
#[derive(Parser, Debug)]
#[command(name = "rigview", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Content storage host (overrides config)
    #[arg(long)]
    storage_host: Option<String>,

    /// Avatar to load into the local rig at startup (overrides config)
    #[arg(short, long)]
    avatar: Option<String>,

    /// Disable HTTP server
    #[arg(long)]
    no_http: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", rigview::NAME, rigview::VERSION);

    let runtime = tokio::runtime::Runtime::new()?;

    let state = runtime.block_on(async { setup_and_spawn_services(&args).await })?;

    runtime.block_on(async {
        shutdown_signal().await;
        info!("Shutdown signal received");
        state.shutdown();

        // Give tasks a moment to clean up
        tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
    });

    info!("rigview stopped");
    Ok(())
}

/// Setup config, create AppState, and spawn all background services.
async fn setup_and_spawn_services(args: &Args) -> anyhow::Result<Arc<AppState>> {
    // Load configuration
    let mut config = if let Some(ref path) = args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Apply CLI overrides
    if let Some(ref host) = args.storage_host {
        config.storage.host = host.clone();
    }
    if let Some(ref avatar) = args.avatar {
        config.rig.avatar_url = Some(avatar.clone());
    }
    if args.no_http {
        config.http.enabled = false;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }

    // Validate configuration
    config.validate()?;

    info!("Storage host: {}", config.storage.host);
    info!("Frame rate: {} fps", config.rig.frame_rate);
    info!("HTTP server: {}", config.http.enabled);

    let state = AppState::new(config.clone())?;

    // Load the startup avatar; a failure leaves the placeholder rig in place
    if let Some(url) = config.rig.avatar_url.clone() {
        let avatar_state = Arc::clone(&state);
        tokio::spawn(async move {
            match avatar_state.rigs.set_local_avatar_url(&url).await {
                Ok(()) => info!("Loaded avatar {}", url),
                Err(e) => warn!("Startup avatar unavailable: {}", e),
            }
        });
    }

    // Start the frame loop
    let frame_state = Arc::clone(&state);
    tokio::spawn(async move {
        run_frame_loop(frame_state).await;
    });

    // Start HTTP server if enabled
    if config.http.enabled {
        let http_state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = run_http_server(http_state).await {
                error!("HTTP server error: {}", e);
            }
        });
    }

    Ok(state)
}

async fn run_frame_loop(state: Arc<AppState>) {
    let frame_interval = state.config.read().await.rig.frame_interval();
    let mut shutdown_rx = state.subscribe_shutdown();

    let mut interval = tokio::time::interval(frame_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    info!("Frame loop started ({:?} per frame)", frame_interval);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                state.tick();
            }
            _ = shutdown_rx.recv() => {
                info!("Frame loop shutting down");
                break;
            }
        }
    }
}

async fn run_http_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let http_config = state.config.read().await.http.clone();

    let web_server = WebServer::new(state.clone(), &http_config);
    let addr = web_server.addr();
    info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let mut shutdown_rx = state.subscribe_shutdown();

    axum::serve(listener, web_server.router())
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
