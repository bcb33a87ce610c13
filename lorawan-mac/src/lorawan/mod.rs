//! LoRaWAN protocol implementation
//!
//! This module contains the end-device data plane:
//! - Frame model and PHYPayload codec
//! - PHY settings and time-on-air
//! - Regional parameters
//! - Channel selection and duty-cycle bookkeeping

/// Channel list and duty-cycle engine
pub mod channel;

/// PHYPayload encode/decode
pub mod codec;

/// Frame model
pub mod frame;

/// PHY layer settings
pub mod phy;

/// Regional parameters and configurations
pub mod region;

pub use channel::{AdrAnswer, Channel, ChannelList, Exhausted};
pub use codec::{decode, decode_with_counter, encode, encode_to_vec, phy_payload_size, DecodeError, EncodeError};
pub use frame::{AppPayload, DataFrame, Frame, JoinAccept, JoinRequest, MessageType};
pub use phy::{time_on_air, Bandwidth, ChannelSetting, CodingRate, SpreadingFactor};
pub use region::{DataRateParams, DefaultSettings, Eu868, Region};
