//! Terminal presentation: the player shell, the fatal error screen and
//! shared formatting helpers.

pub mod error;
pub mod format;
pub mod shell;

pub use error::show_fatal;
pub use shell::{PlayerShell, ShellState};
