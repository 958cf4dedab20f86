// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Tracing initialization.
//!
//! Text output by default, JSON when `LOG_JSON` is set. `RUST_LOG`
//! overrides the configured level entirely.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Settings;

/// Initializes the global tracing subscriber from the settings.
pub fn init(settings: &Settings) {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level))
        .add_directive("hyper=warn".parse().expect("static directive"))
        .add_directive("tower=warn".parse().expect("static directive"))
        .add_directive("rumqttc=warn".parse().expect("static directive"));

    // DATABASE_ECHO surfaces every SQL statement sqlx runs.
    if settings.database_echo {
        filter = filter.add_directive("sqlx=debug".parse().expect("static directive"));
    } else {
        filter = filter.add_directive("sqlx=warn".parse().expect("static directive"));
    }

    if settings.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true),
            )
            .init();
    } else {
        let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(is_terminal),
            )
            .init();
    }
}
