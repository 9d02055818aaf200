//! `spaceduck` CLI (§2 supplemented, §6): grounded on the teacher's
//! `clap`-derived `Cli`/`Command` dispatcher shape, scoped down to what
//! this gateway itself exposes — `serve`, `pair`, `config get/set`. No
//! import machinery; that was teacher-specific tooling with no
//! counterpart here.

use clap::{Parser, Subcommand};

/// spaceduck — a local-first personal assistant gateway.
#[derive(Debug, Parser)]
#[command(name = "spaceduck", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Print a fresh pairing code for a new device (§4.2).
    Pair,
    /// Configuration utilities, reading/writing through the same
    /// `ConfigStore` the running server uses (§4.1).
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the value at a JSON Pointer path.
    Get {
        /// JSON Pointer, e.g. `/ai/model`.
        pointer: String,
    },
    /// Patch the value at a JSON Pointer path.
    Set {
        /// JSON Pointer, e.g. `/ai/model`.
        pointer: String,
        /// New value, parsed as JSON (quote strings: `'"gpt-5"'`).
        value: String,
    },
}
