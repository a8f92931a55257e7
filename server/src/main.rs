use clap::Parser;
use log::{error, info};
use server::app::Application;
use server::config;
use server::network::{self, ApiState, ServerState};
use server::snapshot::{self, Autosave};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

const LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Tick period in milliseconds; 0 disables auto-tick and enables the
    /// tick endpoint
    #[arg(long, default_value_t = 0)]
    tick_period: u64,

    /// Path to the game config JSON
    #[arg(long)]
    config_file: PathBuf,

    /// Root directory of the static frontend
    #[arg(long)]
    www_root: Option<PathBuf>,

    /// Spawn dogs at random positions instead of road starts
    #[arg(long)]
    randomize_spawn_points: bool,

    /// Path to the state snapshot file
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Automatic state save period in milliseconds; 0 disables periodic
    /// saving
    #[arg(long, default_value_t = 0)]
    save_state_period: u64,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(err) = run(Args::parse()).await {
        error!("server exited: {err}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let (game, catalog) = config::load_game(&args.config_file)?;
    info!(
        "loaded {} map(s) from {}",
        game.maps().len(),
        args.config_file.display()
    );

    let mut app = Application::new(game, args.randomize_spawn_points);
    if let Some(state_file) = &args.state_file {
        if state_file.exists() {
            snapshot::load(&mut app, state_file)?;
            info!("state restored from {}", state_file.display());
        }
    }

    let autosave = args
        .state_file
        .clone()
        .filter(|_| args.save_state_period > 0)
        .map(|path| Autosave::new(path, args.save_state_period));
    let state = Arc::new(Mutex::new(ServerState::new(app, autosave)));

    if args.tick_period > 0 {
        spawn_ticker(state.clone(), Duration::from_millis(args.tick_period));
    }

    let api = ApiState {
        state: state.clone(),
        catalog: Arc::new(catalog),
        tick_endpoint_enabled: args.tick_period == 0,
    };
    let router = network::build_router(api, args.www_root.clone());

    let listener = tokio::net::TcpListener::bind(LISTEN_ADDR).await?;
    info!("listening on {LISTEN_ADDR}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(state_file) = &args.state_file {
        let guard = state.lock().await;
        snapshot::save(&guard.app, state_file)?;
        info!("state saved to {}", state_file.display());
    }
    Ok(())
}

/// Drives the world with real elapsed time, measured between wakeups so
/// slow ticks do not lose game time.
fn spawn_ticker(state: Arc<Mutex<ServerState>>, period: Duration) {
    tokio::spawn(async move {
        let mut last_tick = Instant::now();
        let mut tick_count = 0u64;
        loop {
            sleep(period).await;
            let now = Instant::now();
            let delta_ms = now.duration_since(last_tick).as_millis() as u64;
            last_tick = now;

            let mut guard = state.lock().await;
            guard.tick(delta_ms);

            tick_count += 1;
            if tick_count % 300 == 0 {
                let game = guard.app.game();
                let dogs: usize = game.sessions().values().map(|s| s.dogs().len()).sum();
                info!("{} session(s), {} dog(s)", game.sessions().len(), dogs);
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to listen for shutdown signal: {err}");
        }
    };

    #[cfg(unix)]
    {
        let mut terminate =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(err) => {
                    error!("failed to install SIGTERM handler: {err}");
                    ctrl_c.await;
                    info!("shutdown signal received");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;

    info!("shutdown signal received");
}
