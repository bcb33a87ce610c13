//! Device and network configuration
//!
//! This module contains types for configuring LoRaWAN devices:
//! - Keys and identifiers (AES keys, EUIs, device address)
//! - Device provisioning (OTAA and ABP)
//! - Session state and frame counters

/// Device configuration and session state
pub mod device;

pub use device::{AesKey, DevAddr, DeviceConfig, Eui64, KeySet, SessionState};
