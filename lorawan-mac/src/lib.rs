//! LoRaWAN end-device data plane in Rust
//!
//! This crate provides the two pieces of a LoRaWAN 1.0.x end-device MAC that
//! sit closest to the radio:
//! - a frame codec that builds and parses PHYPayloads, including MIC and
//!   payload encryption
//! - a channel engine that picks uplink channels and enforces sub-band
//!   duty-cycle limits
//!
//! # Features
//! - `no_std`, no allocation, no unsafe code
//! - Join request/accept and all four data message types
//! - Region tables behind a trait (EU863-870 included)
//! - Optional `defmt` logging, `log` otherwise
//!
//! # Example
//! ```
//! use lorawan_mac::{
//!     config::device::{AesKey, DevAddr, KeySet},
//!     lorawan::{
//!         codec, AppPayload, ChannelList, DataFrame, Eu868, Frame,
//!     },
//! };
//!
//! let mut channels: ChannelList<Eu868> = ChannelList::new(Eu868::new());
//! let keys = KeySet {
//!     app_key: AesKey::new([0x00; 16]),
//!     nwk_skey: AesKey::new([0x01; 16]),
//!     app_skey: AesKey::new([0x02; 16]),
//! };
//!
//! let frame = Frame::UnconfirmedUp(DataFrame {
//!     dev_addr: DevAddr(0x2601_1234),
//!     counter: 1,
//!     ack: false,
//!     adr: false,
//!     adr_ack_req: false,
//!     pending: false,
//!     opts: &[],
//!     payload: Some(AppPayload { port: 1, data: b"hello" }),
//! });
//!
//! let now = 0;
//! let setting = channels.ready(now).unwrap();
//! let mut buf = [0u8; 64];
//! let len = codec::encode(&keys, &frame, &mut buf).unwrap();
//! // ... transmit `buf[..len]` using `setting` ...
//! # let _ = setting;
//! channels.register_transmission(now, len);
//! assert!(channels.wait_time(now) > 0);
//! ```

#![warn(missing_docs)]
#![no_std]

// Must come first so the logging macros are visible to every other module.
mod fmt;

/// Device and network configuration
pub mod config;

/// Cryptographic functions
pub mod crypto;

/// LoRaWAN protocol implementation
pub mod lorawan;
