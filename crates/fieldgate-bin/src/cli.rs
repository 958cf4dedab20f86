// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command-line interface.
//!
//! Configuration itself comes from the environment (the service is meant to
//! run under systemd or in a container); the CLI only selects what to do.

use clap::{Parser, Subcommand};

/// Modbus middleware: REST/MQTT in front of a fleet of Modbus gateways.
#[derive(Debug, Parser)]
#[command(name = "fieldgate", version, about)]
pub struct Cli {
    /// Subcommand; defaults to `run`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum Command {
    /// Run the middleware (default).
    Run,
    /// Print the version and exit.
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_and_subcommands() {
        let cli = Cli::parse_from(["fieldgate"]);
        assert!(cli.command.is_none());

        let cli = Cli::parse_from(["fieldgate", "run"]);
        assert!(matches!(cli.command, Some(Command::Run)));

        let cli = Cli::parse_from(["fieldgate", "version"]);
        assert!(matches!(cli.command, Some(Command::Version)));
    }
}
