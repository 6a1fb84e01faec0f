//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to the command handlers.

use crate::commands;
use crate::config::{ensure_config_file, get_config_path, SetupOutcome, UnjazzConfig};
use crate::logging::{self, LogEcho};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

/// Terminal music player with waveform seeking
#[derive(Parser)]
#[command(name = "unjazz")]
#[command(version)]
#[command(about = "Terminal music player with waveform seeking")]
#[command(long_about = "Terminal music player with waveform seeking.\n\nAlbums are published as static JSON manifests built by 'unjazz generate'.\nAudio can live next to the manifest or in a GitHub release, in which case\n'unjazz relay' serves it with permissive CORS headers.\n\nDEFAULT COMMAND:\n    If no command is specified, 'play' is used.\n\nEXAMPLES:\n    # Play the configured manifest\n    $ unjazz\n\n    # Play a published site\n    $ unjazz play --source https://example.org/unjazz/metadata\n\n    # Build the manifest for ./public/albums\n    $ unjazz generate\n\n    # Upload audio to a release while generating\n    $ USE_GITHUB_RELEASES=true GITHUB_REPO=me/music GITHUB_TOKEN=... unjazz generate\n\n    # Run the relay on another port\n    $ unjazz relay --bind 127.0.0.1:9000")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/unjazz/unjazz.toml\n    Logs:               ~/.local/state/unjazz/unjazz.log.*"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse albums and play tracks (default)
    ///
    /// Click a waveform to seek. Space pauses, n/p skip, arrows seek by 5 seconds.
    #[command(visible_alias = "p")]
    Play {
        /// Directory or http(s) base URL holding tracks.json
        #[arg(short, long, value_name = "DIR_OR_URL")]
        source: Option<String>,
    },

    /// Generate tracks.json and waveforms.json from an albums directory
    ///
    /// Reads tags with symphonia, computes waveforms with audiowaveform when it
    /// is installed and optionally uploads audio to a GitHub release.
    #[command(visible_alias = "g")]
    Generate {
        /// Directory containing one sub-directory per album
        #[arg(long, value_name = "DIR")]
        albums_dir: Option<PathBuf>,

        /// Output directory for the manifest and waveforms
        #[arg(long, value_name = "DIR")]
        metadata_dir: Option<PathBuf>,
    },

    /// Serve the CORS relay for release-hosted audio
    #[command(visible_alias = "r")]
    Relay {
        /// Address to listen on
        #[arg(short, long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Open configuration file in your preferred editor
    ///
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// Show recent log entries
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   unjazz completions bash > unjazz.bash
    ///   unjazz completions zsh > _unjazz
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Creates or restamps the config file before anything reads it.
fn check_and_run_setup() -> anyhow::Result<()> {
    let config_path = get_config_path()?;
    match ensure_config_file(&config_path)? {
        SetupOutcome::Created => {
            tracing::info!("Created default config at {}", config_path.display());
        }
        SetupOutcome::Migrated { from } => {
            tracing::info!(
                "Config migrated from {from} to {}",
                env!("CARGO_PKG_VERSION")
            );
        }
        SetupOutcome::UpToDate => {
            tracing::debug!("Config version up to date ({})", env!("CARGO_PKG_VERSION"));
        }
    }
    Ok(())
}

/// Runs the application based on command-line arguments.
///
/// # Errors
/// - If logging or configuration cannot be initialized
/// - If the selected command fails
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that need neither logging nor config
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "unjazz", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::Logs) => return commands::handle_logs(),
        _ => {}
    }

    let echo = match cli.command {
        None | Some(Commands::Play { .. }) | Some(Commands::Config) => LogEcho::FileOnly,
        _ => LogEcho::Stderr,
    };
    logging::init_logging(echo)?;
    check_and_run_setup()?;
    let config = UnjazzConfig::load()?;

    match cli.command {
        None => commands::handle_play(&config.player, &config.relay, None).await?,
        Some(Commands::Play { source }) => {
            commands::handle_play(&config.player, &config.relay, source).await?
        }
        Some(Commands::Generate {
            albums_dir,
            metadata_dir,
        }) => commands::handle_generate(&config.manifest, albums_dir, metadata_dir).await?,
        Some(Commands::Relay { bind }) => commands::handle_relay(&config.relay, bind).await?,
        Some(Commands::Config) => commands::handle_config()?,
        Some(Commands::Logs) | Some(Commands::Completions { .. }) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}
