// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-gateway circuit breaker.
//!
//! Each physical gateway connection owns one breaker. The breaker keeps its
//! whole state (phase, consecutive-failure count, probe flag) packed into a
//! single `AtomicU64`, so checks and transitions are lock-free and safe to
//! call from concurrent requests.
//!
//! # State machine
//!
//! ```text
//!                 failure_threshold
//!    ┌──────┐ ───────────────────────▶ ┌──────┐
//!    │Closed│                          │ Open │◀─┐
//!    └──────┘ ◀──┐                     └──────┘  │ probe failure
//!                │ probe success          │      │
//!                │     recovery_timeout   ▼      │
//!                └──────────────────── ┌────────┐│
//!                                      │HalfOpen│┘
//!                                      └────────┘
//! ```
//!
//! While open, [`CircuitBreaker::try_acquire`] fails fast with the remaining
//! cooldown so callers can surface a `Retry-After`. After the cooldown one
//! probe call is admitted; its outcome decides between closing and
//! reopening.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

// =============================================================================
// Configuration
// =============================================================================

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive transport failures before the circuit opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Cooldown before a half-open probe is admitted.
    #[serde(default = "default_recovery_timeout")]
    #[serde(with = "duration_secs")]
    pub recovery_timeout: Duration,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout() -> Duration {
    Duration::from_secs(30)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout: default_recovery_timeout(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a configuration with explicit thresholds.
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
        }
    }
}

// =============================================================================
// CircuitState
// =============================================================================

/// Breaker phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation; requests pass through.
    Closed,
    /// Failure threshold exceeded; requests are rejected without I/O.
    Open,
    /// Cooldown elapsed; a single probe is in flight.
    HalfOpen,
}

impl CircuitState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }

    /// Lowercase name as exposed on the API.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// State encoding
// =============================================================================

/// Packed breaker state.
///
/// Layout:
/// - bits 0-7:  state (0=Closed, 1=Open, 2=HalfOpen)
/// - bits 8-23: consecutive failure count (saturating u16)
/// - bit 24:    probe-in-flight flag
#[derive(Debug, Clone, Copy)]
struct EncodedState {
    state: CircuitState,
    failure_count: u16,
    probe_in_flight: bool,
}

impl EncodedState {
    const CLOSED: Self = Self {
        state: CircuitState::Closed,
        failure_count: 0,
        probe_in_flight: false,
    };

    fn encode(self) -> u64 {
        let mut value = self.state.as_u8() as u64;
        value |= (self.failure_count as u64) << 8;
        if self.probe_in_flight {
            value |= 1 << 24;
        }
        value
    }

    fn decode(value: u64) -> Self {
        Self {
            state: CircuitState::from_u8((value & 0xFF) as u8),
            failure_count: ((value >> 8) & 0xFFFF) as u16,
            probe_in_flight: (value >> 24) & 1 == 1,
        }
    }
}

// =============================================================================
// CircuitBreaker
// =============================================================================

/// Lock-free circuit breaker with a single half-open probe.
pub struct CircuitBreaker {
    state: AtomicU64,
    /// Timestamp of the last recorded failure, unix milliseconds.
    last_failure_ms: AtomicU64,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Creates a closed breaker with the given configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: AtomicU64::new(EncodedState::CLOSED.encode()),
            last_failure_ms: AtomicU64::new(0),
            config,
        }
    }

    /// Admits or rejects a request.
    ///
    /// Returns `Err(remaining)` without performing I/O while the circuit is
    /// open (or while another probe is already in flight). On `Ok(())` the
    /// caller must report the outcome via [`record_success`] or
    /// [`record_failure`].
    ///
    /// [`record_success`]: Self::record_success
    /// [`record_failure`]: Self::record_failure
    pub fn try_acquire(&self) -> Result<(), Duration> {
        loop {
            let encoded = self.state.load(Ordering::SeqCst);
            let current = EncodedState::decode(encoded);

            match current.state {
                CircuitState::Closed => return Ok(()),

                CircuitState::Open => {
                    let remaining = self.time_until_retry();
                    if !remaining.is_zero() {
                        return Err(remaining);
                    }
                    // Cooldown elapsed: move to half-open and claim the probe.
                    let next = EncodedState {
                        state: CircuitState::HalfOpen,
                        failure_count: 0,
                        probe_in_flight: true,
                    };
                    if self
                        .state
                        .compare_exchange(encoded, next.encode(), Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                    {
                        tracing::info!("circuit breaker half-open, admitting probe");
                        return Ok(());
                    }
                    // Lost the race, re-evaluate.
                }

                CircuitState::HalfOpen => {
                    if current.probe_in_flight {
                        return Err(Duration::ZERO);
                    }
                    let mut next = current;
                    next.probe_in_flight = true;
                    if self
                        .state
                        .compare_exchange(encoded, next.encode(), Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                    {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Records a successful call: clears the consecutive-failure count and
    /// closes the circuit if a probe just succeeded.
    pub fn record_success(&self) {
        loop {
            let encoded = self.state.load(Ordering::SeqCst);
            let current = EncodedState::decode(encoded);

            let was_half_open = current.state == CircuitState::HalfOpen;
            if self
                .state
                .compare_exchange(
                    encoded,
                    EncodedState::CLOSED.encode(),
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                if was_half_open {
                    tracing::info!("circuit breaker closed after successful probe");
                }
                return;
            }
        }
    }

    /// Records a failed call: bumps the consecutive-failure count, opening
    /// the circuit at the threshold or reopening it after a failed probe.
    pub fn record_failure(&self) {
        self.last_failure_ms
            .store(now_ms(), Ordering::SeqCst);

        loop {
            let encoded = self.state.load(Ordering::SeqCst);
            let current = EncodedState::decode(encoded);

            let mut next = current;
            next.failure_count = current.failure_count.saturating_add(1);

            match current.state {
                CircuitState::Closed => {
                    if u32::from(next.failure_count) >= self.config.failure_threshold {
                        next.state = CircuitState::Open;
                        next.probe_in_flight = false;
                    }
                }
                CircuitState::HalfOpen => {
                    // Probe failed: back to open with a fresh cooldown.
                    next.state = CircuitState::Open;
                    next.probe_in_flight = false;
                }
                CircuitState::Open => {}
            }

            if self
                .state
                .compare_exchange(encoded, next.encode(), Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                if current.state != CircuitState::Open && next.state == CircuitState::Open {
                    tracing::warn!(
                        failures = next.failure_count,
                        cooldown_secs = self.config.recovery_timeout.as_secs(),
                        "circuit breaker opened"
                    );
                }
                return;
            }
        }
    }

    /// Current phase.
    pub fn state(&self) -> CircuitState {
        EncodedState::decode(self.state.load(Ordering::SeqCst)).state
    }

    /// Current consecutive-failure count.
    pub fn failure_count(&self) -> u32 {
        u32::from(EncodedState::decode(self.state.load(Ordering::SeqCst)).failure_count)
    }

    /// Remaining cooldown before a probe is admitted. Zero unless open.
    pub fn time_until_retry(&self) -> Duration {
        if self.state() != CircuitState::Open {
            return Duration::ZERO;
        }
        let last = self.last_failure_ms.load(Ordering::SeqCst);
        let elapsed = now_ms().saturating_sub(last);
        self.config
            .recovery_timeout
            .saturating_sub(Duration::from_millis(elapsed))
    }

    /// Forces the breaker back to closed.
    pub fn reset(&self) {
        self.state
            .store(EncodedState::CLOSED.encode(), Ordering::SeqCst);
        self.last_failure_ms.store(0, Ordering::SeqCst);
    }

    /// Snapshot for status surfaces.
    pub fn status(&self) -> BreakerStatus {
        let state = self.state();
        BreakerStatus {
            state,
            failure_count: self.failure_count(),
            time_until_retry_seconds: match state {
                CircuitState::Open => Some(self.time_until_retry().as_secs_f64()),
                _ => None,
            },
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.state())
            .field("failure_count", &self.failure_count())
            .finish()
    }
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

// =============================================================================
// BreakerStatus
// =============================================================================

/// Serializable breaker snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    /// Current phase.
    pub state: CircuitState,
    /// Consecutive transport failures.
    pub failure_count: u32,
    /// Remaining cooldown seconds while open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_until_retry_seconds: Option<f64>,
}

// =============================================================================
// Tests
// =============================================================================
