// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Scripted Modbus network.
//!
//! [`MockNetwork`] stands in for the whole field side: it fabricates
//! transports through the regular [`TransportFactory`] seam, keeps a
//! register image per `(gateway, slave)`, and instruments every request so
//! tests can assert the serialization invariant (no two frames in flight
//! on one gateway) and per-gateway ordering.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use fieldgate_core::types::{Framer, GatewayKey, RegisterType};
use fieldgate_modbus::transport::{ModbusTransport, Operation, TransportFactory};
use fieldgate_modbus::{ClientError, ClientResult};

/// In-flight instrumentation for one gateway.
#[derive(Default)]
pub struct GatewayActivity {
    /// Requests currently in flight.
    pub active: AtomicUsize,
    /// Times a request found another one already in flight.
    pub overlaps: AtomicUsize,
    /// Total requests executed.
    pub total: AtomicUsize,
}

type RegisterSlot = (String, u8, RegisterType, u16);

#[derive(Default)]
struct NetworkState {
    unreachable: HashSet<String>,
    registers: HashMap<RegisterSlot, u16>,
    request_log: Vec<(String, u16)>,
}

/// The scripted field network.
pub struct MockNetwork {
    state: Mutex<NetworkState>,
    activity: Mutex<HashMap<String, Arc<GatewayActivity>>>,
    /// Artificial per-request latency; gives overlap detection teeth.
    pub request_delay: Duration,
}

impl MockNetwork {
    /// Creates a network where everything is reachable and all registers
    /// read as zero until written.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(NetworkState::default()),
            activity: Mutex::new(HashMap::new()),
            request_delay: Duration::from_millis(20),
        })
    }

    /// Marks a gateway (un)reachable.
    pub fn set_unreachable(&self, key: &GatewayKey, unreachable: bool) {
        let mut state = self.state.lock();
        if unreachable {
            state.unreachable.insert(key.to_string());
        } else {
            state.unreachable.remove(&key.to_string());
        }
    }

    fn is_unreachable(&self, key: &GatewayKey) -> bool {
        self.state.lock().unreachable.contains(&key.to_string())
    }

    /// Seeds one register value.
    pub fn set_register(
        &self,
        key: &GatewayKey,
        slave: u8,
        register_type: RegisterType,
        address: u16,
        value: u16,
    ) {
        self.state
            .lock()
            .registers
            .insert((key.to_string(), slave, register_type, address), value);
    }

    /// Reads one register value (0 when never written).
    pub fn register(
        &self,
        key: &GatewayKey,
        slave: u8,
        register_type: RegisterType,
        address: u16,
    ) -> u16 {
        self.state
            .lock()
            .registers
            .get(&(key.to_string(), slave, register_type, address))
            .copied()
            .unwrap_or(0)
    }

    /// The instrumentation record of one gateway.
    pub fn activity(&self, key: &GatewayKey) -> Arc<GatewayActivity> {
        self.activity
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// The `(gateway, start address)` sequence of executed requests.
    pub fn request_log(&self) -> Vec<(String, u16)> {
        self.state.lock().request_log.clone()
    }

    /// A factory producing transports bound to this network.
    pub fn factory(self: &Arc<Self>) -> Arc<dyn TransportFactory> {
        Arc::new(MockFactory {
            network: self.clone(),
        })
    }
}

struct MockFactory {
    network: Arc<MockNetwork>,
}

impl TransportFactory for MockFactory {
    fn create(
        &self,
        key: &GatewayKey,
        _framer: Framer,
        _connect_timeout: Duration,
    ) -> Box<dyn ModbusTransport> {
        Box::new(MockTransport {
            network: self.network.clone(),
            key: key.clone(),
            connected: false,
        })
    }
}

struct MockTransport {
    network: Arc<MockNetwork>,
    key: GatewayKey,
    connected: bool,
}

#[async_trait]
impl ModbusTransport for MockTransport {
    async fn connect(&mut self) -> ClientResult<()> {
        if self.network.is_unreachable(&self.key) {
            return Err(ClientError::connect(format!("{} unreachable", self.key)));
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn execute(&mut self, slave_id: u8, operation: Operation) -> ClientResult<Vec<u16>> {
        if !self.connected {
            return Err(ClientError::NotConnected);
        }
        if self.network.is_unreachable(&self.key) {
            return Err(ClientError::io(format!("{} dropped the connection", self.key)));
        }

        let activity = self.network.activity(&self.key);
        if activity.active.fetch_add(1, Ordering::SeqCst) > 0 {
            activity.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        activity.total.fetch_add(1, Ordering::SeqCst);

        tokio::time::sleep(self.network.request_delay).await;

        let result = match operation {
            Operation::Read {
                register_type,
                address,
                count,
            } => {
                let mut values = Vec::with_capacity(usize::from(count));
                for offset in 0..count {
                    let raw =
                        self.network
                            .register(&self.key, slave_id, register_type, address + offset);
                    values.push(if register_type.is_bit() {
                        u16::from(raw != 0)
                    } else {
                        raw
                    });
                }
                self.network
                    .state
                    .lock()
                    .request_log
                    .push((self.key.to_string(), address));
                Ok(values)
            }
            Operation::Write {
                register_type,
                address,
                value,
            } => {
                self.network
                    .set_register(&self.key, slave_id, register_type, address, value);
                self.network
                    .state
                    .lock()
                    .request_log
                    .push((self.key.to_string(), address));
                Ok(Vec::new())
            }
        };

        activity.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn describe(&self) -> String {
        format!("mock {}", self.key)
    }
}
