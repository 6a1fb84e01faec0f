//! CORS relay command.

use crate::config::RelayConfig;
use crate::relay;

/// Serves the relay until Ctrl-C, optionally on a different address.
///
/// # Errors
/// - If the allow pattern is invalid or the address cannot be bound
pub async fn handle_relay(config: &RelayConfig, bind: Option<String>) -> anyhow::Result<()> {
    let mut config = config.clone();
    if let Some(bind) = bind {
        config.bind = bind;
    }
    tracing::info!(
        "Starting relay on {} (allow pattern {})",
        config.bind,
        config.allow_pattern
    );
    relay::serve(&config).await
}
