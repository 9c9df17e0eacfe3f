//! ClubPulse Sandbox — Presence Engine Demo Harness
//!
//! Wires the presence crates together over the in-memory collaborators:
//! seeds a club, runs simulated member agents, and drives one observing
//! session end to end so transitions, toasts, and metrics can be watched
//! live from the log output.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing;
use tracing_subscriber::{fmt, EnvFilter};

use clubpulse_core::config::AppConfig;
use clubpulse_core::error::AppError;
use clubpulse_core::types::{ClubId, UserId};
use clubpulse_presence::{PresenceAgent, PresenceMetrics, PresenceSession, TracingPresenter};
use clubpulse_store::{MemoryDirectory, MemoryRecordStore};

/// ClubPulse — club presence engine sandbox
#[derive(Debug, Parser)]
#[command(name = "clubpulse-sandbox", version, about, long_about = None)]
struct SandboxArgs {
    /// Configuration environment (reads config/<env>.toml if present)
    #[arg(short, long, default_value = "development")]
    env: String,

    /// Number of simulated club members besides the observing user
    #[arg(short, long, default_value_t = 4)]
    members: usize,

    /// Display name of the seeded club
    #[arg(long, default_value = "Rust Club")]
    club_name: String,

    /// Seconds between simulated member churn (one member toggles
    /// online/offline); 0 disables churn
    #[arg(long, default_value_t = 25)]
    churn_seconds: u64,

    /// Stop after this many seconds; 0 runs until Ctrl+C
    #[arg(long, default_value_t = 0)]
    run_seconds: u64,
}

#[tokio::main]
async fn main() {
    let args = SandboxArgs::parse();

    let config = match AppConfig::load(&args.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config, args).await {
        tracing::error!("Sandbox error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main sandbox run function
async fn run(config: AppConfig, args: SandboxArgs) -> Result<(), AppError> {
    tracing::info!("Starting ClubPulse presence sandbox v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: In-memory collaborators ──────────────────────────
    let store = MemoryRecordStore::new();
    let directory = MemoryDirectory::new();

    // ── Step 2: Seed the club roster ──────────────────────────────
    let club_id = ClubId::new();
    let local_user_id = UserId::new();
    store.seed_profile(local_user_id, "You", None);

    let mut roster = vec![local_user_id];
    let mut agents = Vec::with_capacity(args.members);
    let sim_metrics = Arc::new(PresenceMetrics::new());

    for _ in 0..args.members {
        let user_id = UserId::new();
        let display_name = format!("member-{}", &uuid::Uuid::new_v4().to_string()[..8]);
        store.seed_profile(user_id, &display_name, None);
        roster.push(user_id);
        agents.push(PresenceAgent::new(
            user_id,
            Arc::new(store.clone()),
            config.presence.clone(),
            Arc::clone(&sim_metrics),
        ));
    }
    directory.set_members(club_id, roster);
    tracing::info!(
        club = %args.club_name,
        members = args.members + 1,
        "Club seeded"
    );

    // ── Step 3: Bring the simulated members online ────────────────
    for agent in &agents {
        agent.start().await;
    }
    tracing::info!(agents = agents.len(), "Simulated member agents online");

    // ── Step 4: Observing session for the local user ──────────────
    let session = Arc::new(PresenceSession::new(
        local_user_id,
        config.presence.clone(),
        Arc::new(store.clone()),
        Arc::new(directory.clone()),
        Arc::new(TracingPresenter),
    ));
    session.start().await;
    session.track_club(club_id, args.club_name.clone()).await;
    tracing::info!(club_id = %club_id, "Session observing club presence");

    // ── Step 5: Shutdown channel ──────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Step 6: Simulated member churn ────────────────────────────
    let churn_handle = if args.churn_seconds > 0 && !agents.is_empty() {
        let churn_agents = agents.clone();
        let churn_session = Arc::clone(&session);
        let churn_interval = Duration::from_secs(args.churn_seconds);
        let churn_cancel = shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            run_churn(churn_agents, churn_session, club_id, churn_interval, churn_cancel).await;
        });
        tracing::info!(
            interval_seconds = args.churn_seconds,
            "Member churn simulation started"
        );
        Some(handle)
    } else {
        tracing::info!("Member churn simulation disabled");
        None
    };

    // ── Step 7: Run until signal or deadline ──────────────────────
    if args.run_seconds > 0 {
        tokio::select! {
            _ = shutdown_signal() => {}
            _ = tokio::time::sleep(Duration::from_secs(args.run_seconds)) => {
                tracing::info!("Run deadline reached");
            }
        }
    } else {
        shutdown_signal().await;
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    // ── Step 8: Graceful teardown ─────────────────────────────────
    if let Some(handle) = churn_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }
    for agent in &agents {
        agent.stop().await;
    }
    session.shutdown().await;

    let metrics = serde_json::to_string_pretty(&session.metrics())?;
    tracing::info!("Final presence metrics:\n{}", metrics);

    tracing::info!("ClubPulse sandbox shut down gracefully");
    Ok(())
}

/// Toggle one simulated member online/offline per interval, round-robin,
/// and log the observing session's view after each toggle.
async fn run_churn(
    agents: Vec<PresenceAgent>,
    session: Arc<PresenceSession>,
    club_id: ClubId,
    interval: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    let mut next = 0usize;

    loop {
        tokio::select! {
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(interval) => {
                let agent = &agents[next % agents.len()];
                if agent.is_locally_online() {
                    agent.stop().await;
                } else {
                    agent.start().await;
                }
                next += 1;

                let stats = session.stats();
                tracing::info!(
                    online = session.online_count(club_id),
                    members = stats.members_tracked,
                    "Churn tick"
                );
            }
        }
    }

    tracing::debug!("Churn simulation stopped");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
