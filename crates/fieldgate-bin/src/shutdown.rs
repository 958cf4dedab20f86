// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Shutdown signaling.
//!
//! One watch channel fans the signal out to the poller and the HTTP
//! server; a background task flips it when the process receives SIGTERM,
//! SIGINT or SIGQUIT (Ctrl+C on Windows).

use tokio::sync::watch;
use tracing::info;

/// Sends the shutdown signal; receivers observe `true` once.
#[derive(Clone)]
pub struct ShutdownController {
    sender: watch::Sender<bool>,
}

impl ShutdownController {
    /// Creates the controller and its first receiver.
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (sender, receiver) = watch::channel(false);
        (Self { sender }, receiver)
    }

    /// Another receiver for a further component.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    /// Flips the signal. Idempotent.
    pub fn trigger(&self) {
        if !*self.sender.borrow() {
            info!("shutdown initiated");
            let _ = self.sender.send(true);
        }
    }

    /// Spawns a task that triggers on the first OS termination signal.
    pub fn listen_for_signals(&self) {
        let controller = self.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            controller.trigger();
        });
    }
}

/// Resolves on the first termination signal.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
        let mut sigquit = signal(SignalKind::quit()).expect("failed to register SIGQUIT handler");

        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
            _ = sigquit.recv() => info!("received SIGQUIT"),
        }
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to register Ctrl+C handler");
        info!("received Ctrl+C");
    }
}

/// Turns a watch receiver into a future for axum's graceful shutdown.
pub async fn wait_for_flag(mut receiver: watch::Receiver<bool>) {
    // Errors mean the sender is gone, which is shutdown too.
    let _ = receiver.wait_for(|flag| *flag).await;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_reaches_all_receivers() {
        let (controller, receiver_a) = ShutdownController::new();
        let receiver_b = controller.subscribe();

        controller.trigger();
        controller.trigger(); // idempotent

        tokio::time::timeout(Duration::from_secs(1), wait_for_flag(receiver_a))
            .await
            .expect("receiver a should resolve");
        tokio::time::timeout(Duration::from_secs(1), wait_for_flag(receiver_b))
            .await
            .expect("receiver b should resolve");
    }

    #[tokio::test]
    async fn flag_future_resolves_when_sender_drops() {
        let (controller, receiver) = ShutdownController::new();
        drop(controller);

        tokio::time::timeout(Duration::from_secs(1), wait_for_flag(receiver))
            .await
            .expect("dropped sender should resolve the future");
    }
}
