// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! fieldgate entry point.

use std::process::ExitCode;

use clap::Parser;

use fieldgate_bin::cli::{Cli, Command};
use fieldgate_bin::config::Settings;
use fieldgate_bin::{logging, runtime};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Run) {
        Command::Version => {
            println!("fieldgate {}", fieldgate_core::VERSION);
            ExitCode::SUCCESS
        }
        Command::Run => {
            let settings = match Settings::from_env() {
                Ok(settings) => settings,
                Err(error) => {
                    eprintln!("configuration error: {error}");
                    return ExitCode::FAILURE;
                }
            };

            logging::init(&settings);

            match runtime::run(settings).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(error) => {
                    tracing::error!(error = %error, "fieldgate exited with an error");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
