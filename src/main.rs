mod app;
mod catalog;
mod commands;
mod config;
mod logging;
mod manifest;
mod player;
mod relay;
mod ui;
mod waveform;

#[tokio::main]
async fn main() {
    if let Err(e) = app::run().await {
        tracing::error!("Fatal: {e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
