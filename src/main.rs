use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bgpls::{Config, Event, Speaker};

#[derive(Parser)]
#[command(name = "bgplsd")]
#[command(about = "A BGP-LS speaker daemon")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "bgplsd.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    let (local, neighbors) = match config.validate() {
        Ok(validated) => validated,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        asn = local.asn,
        router_id = %local.router_id,
        neighbors = neighbors.len(),
        "starting BGP-LS speaker"
    );

    let (mut speaker, mut events) = Speaker::new(local);
    for neighbor in neighbors {
        if let Err(err) = speaker.add_neighbor(neighbor) {
            error!(error = %err, "failed to add neighbor");
            return ExitCode::FAILURE;
        }
    }

    loop {
        tokio::select! {
            Some(event) = events.recv() => log_event(event),
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    speaker.shutdown().await;
    ExitCode::SUCCESS
}

fn log_event(event: Event) {
    match event {
        Event::NeighborStateTransition { config, state } => {
            info!(neighbor = %config.address, state = %state, "neighbor state transition");
        }
        Event::NeighborErr { config, error } => {
            warn!(neighbor = %config.address, error = %error, "neighbor error");
        }
        Event::NeighborHoldTimerExpired { config } => {
            warn!(neighbor = %config.address, "neighbor hold timer expired");
        }
        Event::NeighborNotificationReceived {
            config,
            notification,
        } => {
            warn!(
                neighbor = %config.address,
                notification = %notification,
                "notification received"
            );
        }
        Event::NeighborUpdateReceived { config, update } => {
            info!(
                neighbor = %config.address,
                len = update.len(),
                "link-state update received"
            );
        }
    }
}
