// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Domain types for the Modbus middleware.
//!
//! Everything the data plane routes on lives here: device identity, the
//! gateway key that device identities collapse onto, the four Modbus
//! register spaces, the wire framing variants, and the validated
//! configuration rows the database feeds into the runtime.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// DeviceId
// =============================================================================

/// Opaque identifier of a logical Modbus unit.
///
/// Device ids are operator-chosen strings between 1 and 50 characters; the
/// length bound mirrors the `modbus_devices.device_id` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Maximum accepted length.
    pub const MAX_LEN: usize = 50;

    /// Creates a device id without validation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates the id length bounds.
    pub fn validate(&self) -> CoreResult<()> {
        if self.0.is_empty() || self.0.len() > Self::MAX_LEN {
            return Err(CoreError::validation(
                "device_id",
                format!("must be 1-{} characters", Self::MAX_LEN),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// GatewayKey
// =============================================================================

/// Canonical identifier of a physical transport: one `(host, port)` pair.
///
/// Multiple logical devices (distinct slave ids) share the same key when
/// they sit behind the same serial-to-Ethernet gateway, and therefore share
/// one serialized connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GatewayKey {
    /// Gateway host name or address.
    pub host: String,
    /// Gateway TCP port.
    pub port: u16,
}

impl GatewayKey {
    /// Creates a new gateway key.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for GatewayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// =============================================================================
// RegisterType
// =============================================================================

/// The four Modbus register spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterType {
    /// Holding register (read/write, 16-bit, FC 03/06).
    #[default]
    Holding,
    /// Input register (read-only, 16-bit, FC 04).
    Input,
    /// Coil (read/write, 1-bit, FC 01/05).
    Coil,
    /// Discrete input (read-only, 1-bit, FC 02).
    Discrete,
}

impl RegisterType {
    /// Maximum items per read request.
    ///
    /// The protocol allows up to 2000 bits per bit-space read, but the API
    /// contract keeps the conservative 125 bound for every space.
    pub const MAX_READ_COUNT: u16 = 125;

    /// All register types, in the order used by per-type metric tables.
    pub const ALL: [RegisterType; 4] = [Self::Holding, Self::Input, Self::Coil, Self::Discrete];

    /// Returns `true` if this register space accepts writes.
    #[inline]
    pub const fn is_writable(&self) -> bool {
        matches!(self, Self::Holding | Self::Coil)
    }

    /// Returns `true` if this is a bit-valued space.
    #[inline]
    pub const fn is_bit(&self) -> bool {
        matches!(self, Self::Coil | Self::Discrete)
    }

    /// Function code used to read this space.
    #[inline]
    pub const fn read_function_code(&self) -> u8 {
        match self {
            Self::Coil => 0x01,
            Self::Discrete => 0x02,
            Self::Holding => 0x03,
            Self::Input => 0x04,
        }
    }

    /// Function code used to write a single item, if the space is writable.
    #[inline]
    pub const fn write_function_code(&self) -> Option<u8> {
        match self {
            Self::Coil => Some(0x05),
            Self::Holding => Some(0x06),
            Self::Input | Self::Discrete => None,
        }
    }

    /// Canonical lowercase name (cache keys, topics, API payloads).
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Holding => "holding",
            Self::Input => "input",
            Self::Coil => "coil",
            Self::Discrete => "discrete",
        }
    }

    /// Stable index into per-type metric tables.
    pub const fn index(&self) -> usize {
        match self {
            Self::Holding => 0,
            Self::Input => 1,
            Self::Coil => 2,
            Self::Discrete => 3,
        }
    }
}

impl fmt::Display for RegisterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegisterType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "holding" => Ok(Self::Holding),
            "input" => Ok(Self::Input),
            "coil" => Ok(Self::Coil),
            "discrete" => Ok(Self::Discrete),
            other => Err(CoreError::validation(
                "register_type",
                format!("unknown register type '{other}' (expected holding, input, coil or discrete)"),
            )),
        }
    }
}

// =============================================================================
// Framer
// =============================================================================

/// Wire framing used on the gateway TCP socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Framer {
    /// Modbus RTU frames carried over the TCP stream (CRC-16 framing).
    #[serde(rename = "RTU")]
    #[default]
    Rtu,
    /// Standard Modbus TCP (MBAP header).
    #[serde(rename = "SOCKET")]
    Socket,
    /// Modbus ASCII frames (`:` + hex + LRC + CR LF) over the TCP stream.
    #[serde(rename = "ASCII")]
    Ascii,
}

impl Framer {
    /// Canonical uppercase form, as persisted in the database.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rtu => "RTU",
            Self::Socket => "SOCKET",
            Self::Ascii => "ASCII",
        }
    }
}

impl fmt::Display for Framer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framer {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RTU" => Ok(Self::Rtu),
            "SOCKET" => Ok(Self::Socket),
            "ASCII" => Ok(Self::Ascii),
            other => Err(CoreError::validation(
                "framer",
                format!("unknown framer '{other}' (expected RTU, SOCKET or ASCII)"),
            )),
        }
    }
}

// =============================================================================
// DeviceConfig
// =============================================================================

/// Transport and identity parameters for one logical Modbus unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier.
    pub device_id: DeviceId,
    /// Gateway host.
    pub host: String,
    /// Gateway TCP port.
    pub port: u16,
    /// Modbus slave (unit) id, 1-247.
    pub slave_id: u8,
    /// Per-attempt operation timeout in seconds, 1-300.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u16,
    /// Wire framing variant.
    #[serde(default)]
    pub framer: Framer,
    /// Transport-error retry budget per call, 0-10.
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
    /// Delay between retries, in seconds.
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: f64,
    /// Whether the device participates in routing and polling.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_timeout_seconds() -> u16 {
    10
}

fn default_max_retries() -> u8 {
    5
}

fn default_retry_delay_seconds() -> f64 {
    0.1
}

fn default_true() -> bool {
    true
}

impl DeviceConfig {
    /// Minimum valid slave id.
    pub const SLAVE_ID_MIN: u8 = 1;
    /// Maximum valid slave id (Modbus spec).
    pub const SLAVE_ID_MAX: u8 = 247;

    /// Returns the gateway key this device routes through.
    pub fn gateway_key(&self) -> GatewayKey {
        GatewayKey::new(self.host.clone(), self.port)
    }

    /// Per-attempt timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_seconds))
    }

    /// Retry delay as a [`Duration`].
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay_seconds.max(0.0))
    }

    /// Validates all field ranges.
    pub fn validate(&self) -> CoreResult<()> {
        self.device_id.validate()?;
        if self.host.is_empty() {
            return Err(CoreError::validation("host", "must not be empty"));
        }
        if self.port == 0 {
            return Err(CoreError::validation("port", "must be 1-65535"));
        }
        if !(Self::SLAVE_ID_MIN..=Self::SLAVE_ID_MAX).contains(&self.slave_id) {
            return Err(CoreError::validation("slave_id", "must be 1-247"));
        }
        if !(1..=300).contains(&self.timeout_seconds) {
            return Err(CoreError::validation("timeout", "must be 1-300 seconds"));
        }
        if self.max_retries > 10 {
            return Err(CoreError::validation("max_retries", "must be 0-10"));
        }
        if !self.retry_delay_seconds.is_finite() || self.retry_delay_seconds < 0.0 {
            return Err(CoreError::validation("retry_delay", "must be a non-negative number"));
        }
        Ok(())
    }
}

// =============================================================================
// PollingTarget
// =============================================================================

/// One register range polled on the background cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingTarget {
    /// Database row id.
    pub id: i64,
    /// Device the range belongs to.
    pub device_id: DeviceId,
    /// Register space to read.
    pub register_type: RegisterType,
    /// Start address.
    pub address: u16,
    /// Number of items to read, 1-125.
    pub count: u16,
    /// Whether the target participates in polling.
    pub is_active: bool,
    /// Operator note, up to 200 characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PollingTarget {
    /// Maximum description length (`polling_targets.description` column).
    pub const MAX_DESCRIPTION_LEN: usize = 200;

    /// Validates count, address arithmetic and description length.
    pub fn validate(&self) -> CoreResult<()> {
        self.device_id.validate()?;
        validate_read_range(self.address, self.count)?;
        if let Some(desc) = &self.description {
            if desc.len() > Self::MAX_DESCRIPTION_LEN {
                return Err(CoreError::validation(
                    "description",
                    format!("must be at most {} characters", Self::MAX_DESCRIPTION_LEN),
                ));
            }
        }
        Ok(())
    }
}

/// Validates a read range: `count` within 1-125 and no address overflow.
pub fn validate_read_range(address: u16, count: u16) -> CoreResult<()> {
    if count == 0 || count > RegisterType::MAX_READ_COUNT {
        return Err(CoreError::validation(
            "count",
            format!("must be 1-{}", RegisterType::MAX_READ_COUNT),
        ));
    }
    if u32::from(address) + u32::from(count) > 0x1_0000 {
        return Err(CoreError::validation(
            "address",
            "address + count exceeds the 16-bit register space",
        ));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DeviceConfig {
        DeviceConfig {
            device_id: DeviceId::new("plc-001"),
            host: "10.0.0.5".to_string(),
            port: 5020,
            slave_id: 1,
            timeout_seconds: 10,
            framer: Framer::Socket,
            max_retries: 5,
            retry_delay_seconds: 0.1,
            is_active: true,
        }
    }

    #[test]
    fn register_type_roundtrip() {
        for rt in RegisterType::ALL {
            assert_eq!(rt.as_str().parse::<RegisterType>().unwrap(), rt);
        }
        assert!("HOLDING".parse::<RegisterType>().is_ok());
        assert!("registers".parse::<RegisterType>().is_err());
    }

    #[test]
    fn register_type_properties() {
        assert!(RegisterType::Holding.is_writable());
        assert!(RegisterType::Coil.is_writable());
        assert!(!RegisterType::Input.is_writable());
        assert!(!RegisterType::Discrete.is_writable());

        assert!(RegisterType::Coil.is_bit());
        assert!(!RegisterType::Holding.is_bit());

        assert_eq!(RegisterType::Holding.read_function_code(), 0x03);
        assert_eq!(RegisterType::Coil.write_function_code(), Some(0x05));
        assert_eq!(RegisterType::Input.write_function_code(), None);
    }

    #[test]
    fn framer_parse() {
        assert_eq!("rtu".parse::<Framer>().unwrap(), Framer::Rtu);
        assert_eq!("Socket".parse::<Framer>().unwrap(), Framer::Socket);
        assert_eq!("ASCII".parse::<Framer>().unwrap(), Framer::Ascii);
        assert!("TLS".parse::<Framer>().is_err());
    }

    #[test]
    fn framer_serde_uses_uppercase() {
        assert_eq!(serde_json::to_string(&Framer::Rtu).unwrap(), "\"RTU\"");
        assert_eq!(
            serde_json::from_str::<Framer>("\"SOCKET\"").unwrap(),
            Framer::Socket
        );
    }

    #[test]
    fn gateway_key_display() {
        assert_eq!(GatewayKey::new("10.0.0.5", 5020).to_string(), "10.0.0.5:5020");
    }

    #[test]
    fn device_config_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn device_config_slave_id_bounds() {
        let mut cfg = config();
        cfg.slave_id = 0;
        assert!(cfg.validate().is_err());
        cfg.slave_id = 1;
        assert!(cfg.validate().is_ok());
        cfg.slave_id = 247;
        assert!(cfg.validate().is_ok());
        cfg.slave_id = 248;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn device_config_timeout_bounds() {
        let mut cfg = config();
        cfg.timeout_seconds = 0;
        assert!(cfg.validate().is_err());
        cfg.timeout_seconds = 300;
        assert!(cfg.validate().is_ok());
        cfg.timeout_seconds = 301;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn device_id_length_bounds() {
        assert!(DeviceId::new("").validate().is_err());
        assert!(DeviceId::new("a".repeat(50)).validate().is_ok());
        assert!(DeviceId::new("a".repeat(51)).validate().is_err());
    }

    #[test]
    fn read_range_bounds() {
        assert!(validate_read_range(0, 0).is_err());
        assert!(validate_read_range(0, 125).is_ok());
        assert!(validate_read_range(0, 126).is_err());
        assert!(validate_read_range(65534, 2).is_ok());
        assert!(validate_read_range(65534, 3).is_err());
    }

    #[test]
    fn polling_target_description_limit() {
        let target = PollingTarget {
            id: 1,
            device_id: DeviceId::new("plc-001"),
            register_type: RegisterType::Holding,
            address: 0,
            count: 5,
            is_active: true,
            description: Some("x".repeat(201)),
        };
        assert!(target.validate().is_err());
    }
}
