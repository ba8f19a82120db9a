use super::{discord_directory, load_config};
use monthgate_core::{Reconciler, RunGuard};
use monthgate_server::{scheduler, AppState};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub fn run(
    config_path: &Path,
    port: Option<u16>,
    token: &str,
    api_token: Option<String>,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let directory = discord_directory(&config, token)?;
    let reconciler = Reconciler::new(&config, directory)?;

    let state = AppState::new(reconciler, api_token);
    if state.api_token.is_none() {
        warn!("MONTHGATE_API_TOKEN is not set; manual sync over HTTP is disabled");
    }
    let port = port.unwrap_or(config.server.port);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        let scheduler = scheduler::spawn(state.clone(), &config.schedule);

        let result = tokio::select! {
            res = monthgate_server::serve_on(state.clone(), listener) => res,
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                Ok(())
            }
        };

        // A run that already started is allowed to finish.
        wait_for_idle(&state.guard).await;
        if let Some(handle) = scheduler {
            handle.abort();
        }
        result
    })
}

async fn wait_for_idle(guard: &RunGuard) {
    if guard.is_running() {
        info!("waiting for the current reconciliation to finish");
    }
    while guard.is_running() {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}
