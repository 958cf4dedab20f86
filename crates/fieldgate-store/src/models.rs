// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Row models and create/update payloads.
//!
//! Records mirror the table columns; the framer is stored as its canonical
//! uppercase string and validated on the way back into [`DeviceConfig`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fieldgate_core::error::{CoreError, CoreResult};
use fieldgate_core::types::{DeviceConfig, DeviceId, Framer, PollingTarget, RegisterType};

// =============================================================================
// Device rows
// =============================================================================

/// One `modbus_devices` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Primary key.
    pub device_id: String,
    /// Gateway host.
    pub host: String,
    /// Gateway port.
    pub port: i32,
    /// Modbus unit id.
    pub slave_id: i32,
    /// Per-attempt timeout in seconds.
    pub timeout: i32,
    /// Framer, canonical uppercase string.
    pub framer: String,
    /// Transport retry budget.
    pub max_retries: i32,
    /// Delay between retries, seconds.
    pub retry_delay: f64,
    /// Soft-delete flag.
    pub is_active: bool,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl DeviceRecord {
    /// Converts the row into a validated runtime [`DeviceConfig`].
    pub fn to_config(&self) -> CoreResult<DeviceConfig> {
        let framer: Framer = self.framer.parse()?;
        let config = DeviceConfig {
            device_id: DeviceId::new(&self.device_id),
            host: self.host.clone(),
            port: u16::try_from(self.port)
                .map_err(|_| CoreError::validation("port", "must be 1-65535"))?,
            slave_id: u8::try_from(self.slave_id)
                .map_err(|_| CoreError::validation("slave_id", "must be 1-247"))?,
            timeout_seconds: u16::try_from(self.timeout)
                .map_err(|_| CoreError::validation("timeout", "must be 1-300 seconds"))?,
            framer,
            max_retries: u8::try_from(self.max_retries)
                .map_err(|_| CoreError::validation("max_retries", "must be 0-10"))?,
            retry_delay_seconds: self.retry_delay,
            is_active: self.is_active,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Payload for creating a device row.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCreate {
    /// Primary key.
    pub device_id: String,
    /// Gateway host.
    pub host: String,
    /// Gateway port.
    pub port: i32,
    /// Modbus unit id.
    pub slave_id: i32,
    /// Per-attempt timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: i32,
    /// Framer string; validated against the closed enum.
    #[serde(default = "default_framer")]
    pub framer: String,
    /// Transport retry budget.
    #[serde(default = "default_max_retries")]
    pub max_retries: i32,
    /// Delay between retries, seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f64,
}

fn default_timeout() -> i32 {
    10
}

fn default_framer() -> String {
    Framer::Rtu.as_str().to_string()
}

fn default_max_retries() -> i32 {
    5
}

fn default_retry_delay() -> f64 {
    0.1
}

impl DeviceCreate {
    /// Validates the payload and returns the canonical framer.
    pub fn validate(&self) -> CoreResult<Framer> {
        let framer: Framer = self.framer.parse()?;
        let record = DeviceRecord {
            device_id: self.device_id.clone(),
            host: self.host.clone(),
            port: self.port,
            slave_id: self.slave_id,
            timeout: self.timeout,
            framer: framer.as_str().to_string(),
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        record.to_config()?;
        Ok(framer)
    }
}

/// Partial update for a device row; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceUpdate {
    /// New host.
    pub host: Option<String>,
    /// New port.
    pub port: Option<i32>,
    /// New unit id.
    pub slave_id: Option<i32>,
    /// New timeout.
    pub timeout: Option<i32>,
    /// New framer string.
    pub framer: Option<String>,
    /// New retry budget.
    pub max_retries: Option<i32>,
    /// New retry delay.
    pub retry_delay: Option<f64>,
}

impl DeviceUpdate {
    /// Validates the fields that are present; returns the canonical framer
    /// string when one was supplied.
    pub fn validate(&self) -> CoreResult<Option<String>> {
        let framer = match &self.framer {
            Some(raw) => Some(raw.parse::<Framer>()?.as_str().to_string()),
            None => None,
        };
        if let Some(port) = self.port {
            if !(1..=65535).contains(&port) {
                return Err(CoreError::validation("port", "must be 1-65535"));
            }
        }
        if let Some(slave_id) = self.slave_id {
            if !(1..=247).contains(&slave_id) {
                return Err(CoreError::validation("slave_id", "must be 1-247"));
            }
        }
        if let Some(timeout) = self.timeout {
            if !(1..=300).contains(&timeout) {
                return Err(CoreError::validation("timeout", "must be 1-300 seconds"));
            }
        }
        if let Some(max_retries) = self.max_retries {
            if !(0..=10).contains(&max_retries) {
                return Err(CoreError::validation("max_retries", "must be 0-10"));
            }
        }
        if let Some(retry_delay) = self.retry_delay {
            if !retry_delay.is_finite() || retry_delay < 0.0 {
                return Err(CoreError::validation("retry_delay", "must be a non-negative number"));
            }
        }
        Ok(framer)
    }
}

// =============================================================================
// Polling-target rows
// =============================================================================

/// One `polling_targets` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingTargetRecord {
    /// Auto-increment primary key.
    pub id: i64,
    /// Device the target reads.
    pub device_id: String,
    /// Register space, lowercase string.
    pub register_type: String,
    /// Start address.
    pub address: i32,
    /// Items per read.
    pub count: i32,
    /// Soft-delete flag.
    pub is_active: bool,
    /// Operator note.
    pub description: Option<String>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl PollingTargetRecord {
    /// Converts the row into a validated runtime [`PollingTarget`].
    pub fn to_target(&self) -> CoreResult<PollingTarget> {
        let register_type: RegisterType = self.register_type.parse()?;
        let target = PollingTarget {
            id: self.id,
            device_id: DeviceId::new(&self.device_id),
            register_type,
            address: u16::try_from(self.address)
                .map_err(|_| CoreError::validation("address", "must be 0-65535"))?,
            count: u16::try_from(self.count)
                .map_err(|_| CoreError::validation("count", "must be 1-125"))?,
            is_active: self.is_active,
            description: self.description.clone(),
        };
        target.validate()?;
        Ok(target)
    }
}

/// Payload for creating a polling target.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingTargetCreate {
    /// Device the target reads.
    pub device_id: String,
    /// Register space string.
    pub register_type: String,
    /// Start address.
    pub address: i32,
    /// Items per read.
    #[serde(default = "default_count")]
    pub count: i32,
    /// Operator note.
    #[serde(default)]
    pub description: Option<String>,
}

fn default_count() -> i32 {
    1
}

impl PollingTargetCreate {
    /// Validates the payload and returns the canonical register type.
    pub fn validate(&self) -> CoreResult<RegisterType> {
        let register_type: RegisterType = self.register_type.parse()?;
        let record = PollingTargetRecord {
            id: 0,
            device_id: self.device_id.clone(),
            register_type: register_type.as_str().to_string(),
            address: self.address,
            count: self.count,
            is_active: true,
            description: self.description.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        record.to_target()?;
        Ok(register_type)
    }
}

/// Partial update for a polling target.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollingTargetUpdate {
    /// New register space string.
    pub register_type: Option<String>,
    /// New start address.
    pub address: Option<i32>,
    /// New count.
    pub count: Option<i32>,
    /// New description.
    pub description: Option<String>,
}

impl PollingTargetUpdate {
    /// Validates the fields that are present; returns the canonical
    /// register-type string when one was supplied.
    pub fn validate(&self) -> CoreResult<Option<String>> {
        let register_type = match &self.register_type {
            Some(raw) => Some(raw.parse::<RegisterType>()?.as_str().to_string()),
            None => None,
        };
        if let Some(address) = self.address {
            if !(0..=65535).contains(&address) {
                return Err(CoreError::validation("address", "must be 0-65535"));
            }
        }
        if let Some(count) = self.count {
            if !(1..=i32::from(RegisterType::MAX_READ_COUNT)).contains(&count) {
                return Err(CoreError::validation("count", "must be 1-125"));
            }
        }
        if let Some(description) = &self.description {
            if description.len() > PollingTarget::MAX_DESCRIPTION_LEN {
                return Err(CoreError::validation("description", "must be at most 200 characters"));
            }
        }
        Ok(register_type)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DeviceRecord {
        DeviceRecord {
            device_id: "plc-001".to_string(),
            host: "10.0.0.5".to_string(),
            port: 5020,
            slave_id: 1,
            timeout: 10,
            framer: "SOCKET".to_string(),
            max_retries: 5,
            retry_delay: 0.1,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn record_to_config() {
        let config = record().to_config().unwrap();
        assert_eq!(config.device_id.as_str(), "plc-001");
        assert_eq!(config.framer, Framer::Socket);
        assert_eq!(config.timeout_seconds, 10);
    }

    #[test]
    fn record_with_unknown_framer_rejected() {
        let mut row = record();
        row.framer = "TLS".to_string();
        assert!(row.to_config().is_err());
    }

    #[test]
    fn record_with_out_of_range_slave_rejected() {
        let mut row = record();
        row.slave_id = 0;
        assert!(row.to_config().is_err());
        row.slave_id = 248;
        assert!(row.to_config().is_err());
    }

    #[test]
    fn create_payload_normalizes_framer() {
        let create = DeviceCreate {
            device_id: "plc-001".to_string(),
            host: "h".to_string(),
            port: 502,
            slave_id: 3,
            timeout: 10,
            framer: "rtu".to_string(),
            max_retries: 5,
            retry_delay: 0.1,
        };
        assert_eq!(create.validate().unwrap(), Framer::Rtu);
    }

    #[test]
    fn update_validation() {
        let update = DeviceUpdate {
            framer: Some("ascii".to_string()),
            ..Default::default()
        };
        assert_eq!(update.validate().unwrap(), Some("ASCII".to_string()));

        let update = DeviceUpdate {
            slave_id: Some(300),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn target_record_roundtrip() {
        let row = PollingTargetRecord {
            id: 7,
            device_id: "plc-001".to_string(),
            register_type: "holding".to_string(),
            address: 0,
            count: 5,
            is_active: true,
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let target = row.to_target().unwrap();
        assert_eq!(target.id, 7);
        assert_eq!(target.register_type, RegisterType::Holding);
    }

    #[test]
    fn target_count_bounds() {
        let mut create = PollingTargetCreate {
            device_id: "plc-001".to_string(),
            register_type: "holding".to_string(),
            address: 0,
            count: 126,
            description: None,
        };
        assert!(create.validate().is_err());
        create.count = 125;
        assert!(create.validate().is_ok());
        create.count = 0;
        assert!(create.validate().is_err());
    }

    #[test]
    fn target_update_register_type_normalized() {
        let update = PollingTargetUpdate {
            register_type: Some("COIL".to_string()),
            ..Default::default()
        };
        assert_eq!(update.validate().unwrap(), Some("coil".to_string()));
    }
}
