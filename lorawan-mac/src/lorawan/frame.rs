//! LoRaWAN frame model.

use crate::config::device::{DevAddr, Eui64};
use crate::crypto::Direction;

/// Message types the codec understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageType {
    /// Join request (uplink)
    JoinRequest,
    /// Join accept (downlink)
    JoinAccept,
    /// Unconfirmed data uplink
    UnconfirmedUp,
    /// Unconfirmed data downlink
    UnconfirmedDown,
    /// Confirmed data uplink
    ConfirmedUp,
    /// Confirmed data downlink
    ConfirmedDown,
}

impl MessageType {
    /// True for message types sent by the end-device
    pub fn is_upstream(self) -> bool {
        matches!(
            self,
            MessageType::JoinRequest | MessageType::UnconfirmedUp | MessageType::ConfirmedUp
        )
    }

    /// Direction used in cipher and MIC blocks
    pub fn direction(self) -> Direction {
        if self.is_upstream() {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    /// MHDR byte (LoRaWAN R1 major version)
    pub(crate) fn mhdr(self) -> u8 {
        let mtype: u8 = match self {
            MessageType::JoinRequest => 0,
            MessageType::JoinAccept => 1,
            MessageType::UnconfirmedUp => 2,
            MessageType::UnconfirmedDown => 3,
            MessageType::ConfirmedUp => 4,
            MessageType::ConfirmedDown => 5,
        };
        mtype << 5
    }

    /// Parse an MHDR byte. Rejoin, proprietary and unknown major versions
    /// are not supported.
    pub(crate) fn from_mhdr(mhdr: u8) -> Option<Self> {
        if mhdr & 0x03 != 0 {
            return None;
        }
        match mhdr >> 5 {
            0 => Some(MessageType::JoinRequest),
            1 => Some(MessageType::JoinAccept),
            2 => Some(MessageType::UnconfirmedUp),
            3 => Some(MessageType::UnconfirmedDown),
            4 => Some(MessageType::ConfirmedUp),
            5 => Some(MessageType::ConfirmedDown),
            _ => None,
        }
    }
}

/// Join request fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JoinRequest {
    /// Application EUI
    pub app_eui: Eui64,
    /// Device EUI
    pub dev_eui: Eui64,
    /// Device nonce
    pub dev_nonce: u16,
}

/// Join accept fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JoinAccept {
    /// Application nonce
    pub app_nonce: [u8; 3],
    /// Network identifier
    pub net_id: [u8; 3],
    /// Assigned device address
    pub dev_addr: DevAddr,
    /// RX1 data rate offset (0..=7)
    pub rx1_dr_offset: u8,
    /// RX2 data rate (0..=15)
    pub rx2_data_rate: u8,
    /// RX1 delay in seconds (0..=15, 0 meaning 1)
    pub rx_delay: u8,
    /// Optional channel frequency list
    pub cf_list: Option<[u8; 16]>,
}

/// Port and application payload of a data frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AppPayload<'a> {
    /// FPort (0 carries MAC commands)
    pub port: u8,
    /// FRMPayload plaintext, may be empty
    pub data: &'a [u8],
}

/// Data frame fields, shared by the four data message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataFrame<'a> {
    /// Device address
    pub dev_addr: DevAddr,
    /// Frame counter. Only the low 16 bits go on the wire; decode fills in
    /// the reconstructed value.
    pub counter: u32,
    /// ACK flag
    pub ack: bool,
    /// ADR flag
    pub adr: bool,
    /// ADRACKReq flag
    pub adr_ack_req: bool,
    /// FPending flag, downlink only
    pub pending: bool,
    /// FOpts (MAC commands piggy-backed in the header, never encrypted)
    pub opts: &'a [u8],
    /// Optional port and payload
    pub payload: Option<AppPayload<'a>>,
}

/// A LoRaWAN PHYPayload in structured form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Frame<'a> {
    /// Join request
    JoinRequest(JoinRequest),
    /// Join accept
    JoinAccept(JoinAccept),
    /// Unconfirmed data uplink
    UnconfirmedUp(DataFrame<'a>),
    /// Unconfirmed data downlink
    UnconfirmedDown(DataFrame<'a>),
    /// Confirmed data uplink
    ConfirmedUp(DataFrame<'a>),
    /// Confirmed data downlink
    ConfirmedDown(DataFrame<'a>),
}

impl<'a> Frame<'a> {
    /// Message type tag of this frame
    pub fn message_type(&self) -> MessageType {
        match self {
            Frame::JoinRequest(_) => MessageType::JoinRequest,
            Frame::JoinAccept(_) => MessageType::JoinAccept,
            Frame::UnconfirmedUp(_) => MessageType::UnconfirmedUp,
            Frame::UnconfirmedDown(_) => MessageType::UnconfirmedDown,
            Frame::ConfirmedUp(_) => MessageType::ConfirmedUp,
            Frame::ConfirmedDown(_) => MessageType::ConfirmedDown,
        }
    }

    /// Data fields, `None` for join frames
    pub fn data(&self) -> Option<&DataFrame<'a>> {
        match self {
            Frame::UnconfirmedUp(data)
            | Frame::UnconfirmedDown(data)
            | Frame::ConfirmedUp(data)
            | Frame::ConfirmedDown(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn data_with_type(mtype: MessageType, data: DataFrame<'a>) -> Option<Self> {
        match mtype {
            MessageType::UnconfirmedUp => Some(Frame::UnconfirmedUp(data)),
            MessageType::UnconfirmedDown => Some(Frame::UnconfirmedDown(data)),
            MessageType::ConfirmedUp => Some(Frame::ConfirmedUp(data)),
            MessageType::ConfirmedDown => Some(Frame::ConfirmedDown(data)),
            MessageType::JoinRequest | MessageType::JoinAccept => None,
        }
    }
}

/// Frame header flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FCtrl {
    pub adr: bool,
    pub adr_ack_req: bool,
    pub ack: bool,
    pub f_pending: bool,
    pub f_opts_len: u8,
}

impl FCtrl {
    pub fn to_byte(self) -> u8 {
        let mut byte = self.f_opts_len & 0x0F;
        if self.adr {
            byte |= 0x80;
        }
        if self.adr_ack_req {
            byte |= 0x40;
        }
        if self.ack {
            byte |= 0x20;
        }
        if self.f_pending {
            byte |= 0x10;
        }
        byte
    }

    pub fn from_byte(byte: u8) -> Self {
        Self {
            adr: (byte & 0x80) != 0,
            adr_ack_req: (byte & 0x40) != 0,
            ack: (byte & 0x20) != 0,
            f_pending: (byte & 0x10) != 0,
            f_opts_len: byte & 0x0F,
        }
    }
}
