// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Device-configuration binary codec.
//!
//! Standalone tooling for the configuration payloads exchanged with devices
//! over MQTT: a fixed [`DeviceConfig`] schema, validated before encoding to
//! a compact binary buffer and after decoding from one. The relay path never
//! calls this; callers that need the wire form use it directly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid device configuration: {0}")]
    Invalid(String),

    #[error("encode failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode failed: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

/// Configuration payload pushed to a device.
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct DeviceConfig {
    pub device_id: String,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Topic the device reports telemetry on
    pub report_topic: String,
    /// Topic the device listens on for commands
    pub command_topic: String,
    pub report_interval_secs: u32,
}

impl DeviceConfig {
    /// Check the schema's required fields and ranges.
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.device_id.is_empty() {
            return Err(CodecError::Invalid("device_id must not be empty".into()));
        }
        if self.mqtt_host.is_empty() {
            return Err(CodecError::Invalid("mqtt_host must not be empty".into()));
        }
        if self.mqtt_port == 0 {
            return Err(CodecError::Invalid("mqtt_port must be non-zero".into()));
        }
        if self.report_interval_secs == 0 {
            return Err(CodecError::Invalid(
                "report_interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Validate and encode a device configuration.
pub fn encode(device: &DeviceConfig) -> Result<Vec<u8>, CodecError> {
    device.validate()?;
    Ok(bincode::encode_to_vec(device, bincode::config::standard())?)
}

/// Decode and validate a device configuration buffer.
pub fn decode(buffer: &[u8]) -> Result<DeviceConfig, CodecError> {
    let (device, _): (DeviceConfig, usize) =
        bincode::decode_from_slice(buffer, bincode::config::standard())?;
    device.validate()?;
    Ok(device)
}
