//! Terminal player command.

use std::time::Duration;

use crate::catalog::Catalog;
use crate::config::{PlayerConfig, RelayConfig};
use crate::player::{MediaFetcher, PlaybackController, RodioBackend};
use crate::ui::{show_fatal, PlayerShell, ShellState};

/// Loads the manifest and runs the player until the user quits.
///
/// Startup failures (no manifest, no audio device, bad colors) are shown on
/// a full-screen error before being returned.
///
/// # Errors
/// - If the player cannot start
/// - If the terminal fails while running
pub async fn handle_play(
    config: &PlayerConfig,
    relay: &RelayConfig,
    source: Option<String>,
) -> anyhow::Result<()> {
    let source = source.unwrap_or_else(|| config.manifest_source.clone());

    let state = match prepare(config, relay, &source).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Player failed to start: {e}");
            show_fatal(&e.to_string());
            return Err(e);
        }
    };

    let mut shell = PlayerShell::new(state)?;
    shell.run().await
}

async fn prepare(
    config: &PlayerConfig,
    relay: &RelayConfig,
    source: &str,
) -> anyhow::Result<ShellState<RodioBackend>> {
    let catalog = Catalog::load(source).await?;
    let fetcher = MediaFetcher::new(config, relay)?;
    let backend = RodioBackend::open_default()?;
    let controller = PlaybackController::new(
        backend,
        fetcher,
        Duration::from_millis(config.poll_interval_ms.max(1)),
        config.volume,
    );
    ShellState::new(catalog, controller, config)
}
