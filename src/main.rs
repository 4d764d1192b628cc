mod chart;
mod config;
mod dashboard;
mod monitor;
mod poller;
mod status;

use anyhow::Result;
use chrono::Utc;
use tokio::{
    io::{self, AsyncBufReadExt, BufReader},
    signal, time,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{
    config::Config,
    dashboard::DashboardView,
    monitor::MonitorClient,
    poller::{Poller, SyncStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (a missing file is fine, vars may come from the environment)
    let _ = dotenvy::dotenv();

    // Initialise tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let client = MonitorClient::new(&config)?;
    info!(base_url = %client.base_url(), "Energy monitor client starting");

    let poller = Poller::new(client, SyncStore::new());
    let store = poller.store().clone();
    let handle = poller.start(config.poll_interval());

    // Each line on stdin acts as the dashboard's refresh button.
    let mut stdin = BufReader::new(io::stdin()).lines();
    let mut stdin_open = true;

    let mut render_ticker = time::interval(config.render_interval());
    let mut last_frame = String::new();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,

            _ = render_ticker.tick() => {
                let view = DashboardView::capture(&store.snapshot().await, Utc::now());
                let frame = view.render();
                if frame != last_frame {
                    println!("{frame}");
                    last_frame = frame;
                }
            }

            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(_)) => {
                    if !handle.refresh_now() {
                        info!("Refresh already in progress");
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin; manual refresh disabled");
                    stdin_open = false;
                }
            },
        }
    }

    handle.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
