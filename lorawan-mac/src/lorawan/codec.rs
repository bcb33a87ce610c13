//! PHYPayload encoder and decoder.
//!
//! Both directions are pure functions over caller-owned buffers. `encode`
//! writes the signed (and, where applicable, encrypted) frame into `out`;
//! `decode` authenticates a received frame and decrypts it in place, handing
//! back a [`Frame`] whose slices point into that buffer.

use core::fmt;

use heapless::Vec;

use super::frame::{AppPayload, DataFrame, FCtrl, Frame, JoinAccept, JoinRequest, MessageType};
use crate::config::device::{AesKey, DevAddr, KeySet};
use crate::crypto::{self, MIC_SIZE};

/// Largest PHYPayload the codec produces or accepts
pub const MAX_PHY_PAYLOAD: usize = 255;

/// Largest FOpts field
pub const MAX_FOPTS_LEN: usize = 15;

/// MHDR + FHDR (without FOpts) + MIC
pub const PHY_PAYLOAD_OVERHEAD: usize = 1 + FHDR_LEN + MIC_SIZE;

const FHDR_LEN: usize = 7;
const JOIN_REQUEST_LEN: usize = 1 + 8 + 8 + 2 + MIC_SIZE;
const JOIN_ACCEPT_LEN: usize = 1 + 3 + 3 + 4 + 1 + 1 + MIC_SIZE;
const CF_LIST_LEN: usize = 16;

/// Why a frame could not be encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// Output buffer shorter than the encoded frame
    BufferTooSmall,
    /// FOpts longer than 15 bytes
    OptionsTooLong,
    /// Frame would exceed the maximum PHYPayload size
    PayloadTooLong,
    /// A field is outside its protocol range (DLSettings, RxDelay, or
    /// FOpts together with port 0)
    InvalidField,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::BufferTooSmall => f.write_str("output buffer too small"),
            EncodeError::OptionsTooLong => f.write_str("frame options too long"),
            EncodeError::PayloadTooLong => f.write_str("payload too long"),
            EncodeError::InvalidField => f.write_str("field out of range"),
        }
    }
}

/// Why a frame was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Frame format is bad
    Bad,
    /// Frame format is OK but the MIC check failed
    Mic,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Bad => f.write_str("malformed frame"),
            DecodeError::Mic => f.write_str("MIC check failed"),
        }
    }
}

/// Size of a data frame PHYPayload
///
/// FPort is counted only when there is payload data.
pub fn phy_payload_size(data_len: usize, opts_len: usize) -> usize {
    let port = if data_len > 0 { 1 } else { 0 };
    PHY_PAYLOAD_OVERHEAD + opts_len + port + data_len
}

/// Encode `frame` into `out`, returning the number of bytes written
///
/// Join frames use `keys.app_key`. Data frames are authenticated with
/// `keys.nwk_skey`; FRMPayload is encrypted with `keys.nwk_skey` on port 0
/// and `keys.app_skey` otherwise. The full 32-bit counter of a data frame
/// feeds MIC and cipher even though only 16 bits are transmitted.
pub fn encode(keys: &KeySet, frame: &Frame<'_>, out: &mut [u8]) -> Result<usize, EncodeError> {
    let mtype = frame.message_type();

    let result = match frame {
        Frame::JoinRequest(req) => encode_join_request(&keys.app_key, req, out),
        Frame::JoinAccept(accept) => encode_join_accept(&keys.app_key, accept, out),
        Frame::UnconfirmedUp(data)
        | Frame::UnconfirmedDown(data)
        | Frame::ConfirmedUp(data)
        | Frame::ConfirmedDown(data) => encode_data(keys, mtype, data, out),
    };

    if let Err(e) = result {
        warn!("encode {:?} failed: {:?}", mtype, e);
    }
    result
}

/// Encode into a fresh fixed-capacity vector
pub fn encode_to_vec(keys: &KeySet, frame: &Frame<'_>) -> Result<Vec<u8, MAX_PHY_PAYLOAD>, EncodeError> {
    let mut buf = [0u8; MAX_PHY_PAYLOAD];
    let len = encode(keys, frame, &mut buf)?;
    Vec::from_slice(&buf[..len]).map_err(|_| EncodeError::BufferTooSmall)
}

fn encode_join_request(
    app_key: &AesKey,
    req: &JoinRequest,
    out: &mut [u8],
) -> Result<usize, EncodeError> {
    if out.len() < JOIN_REQUEST_LEN {
        return Err(EncodeError::BufferTooSmall);
    }

    out[0] = MessageType::JoinRequest.mhdr();
    out[1..9].copy_from_slice(&req.app_eui);
    out[9..17].copy_from_slice(&req.dev_eui);
    out[17..19].copy_from_slice(&req.dev_nonce.to_le_bytes());

    let body_len = JOIN_REQUEST_LEN - MIC_SIZE;
    let mic = crypto::compute_join_mic(app_key, &out[..body_len]);
    out[body_len..JOIN_REQUEST_LEN].copy_from_slice(&mic);

    Ok(JOIN_REQUEST_LEN)
}

fn encode_join_accept(
    app_key: &AesKey,
    accept: &JoinAccept,
    out: &mut [u8],
) -> Result<usize, EncodeError> {
    if accept.rx1_dr_offset > 0x07 || accept.rx2_data_rate > 0x0F || accept.rx_delay > 0x0F {
        return Err(EncodeError::InvalidField);
    }

    let len = JOIN_ACCEPT_LEN + if accept.cf_list.is_some() { CF_LIST_LEN } else { 0 };
    if out.len() < len {
        return Err(EncodeError::BufferTooSmall);
    }

    out[0] = MessageType::JoinAccept.mhdr();
    out[1..4].copy_from_slice(&accept.app_nonce);
    out[4..7].copy_from_slice(&accept.net_id);
    out[7..11].copy_from_slice(&accept.dev_addr.to_le_bytes());
    out[11] = (accept.rx1_dr_offset << 4) | accept.rx2_data_rate;
    out[12] = accept.rx_delay;
    if let Some(cf_list) = &accept.cf_list {
        out[13..13 + CF_LIST_LEN].copy_from_slice(cf_list);
    }

    let body_len = len - MIC_SIZE;
    let mic = crypto::compute_join_mic(app_key, &out[..body_len]);
    out[body_len..len].copy_from_slice(&mic);

    // MIC is encrypted together with the body.
    crypto::encrypt_join_accept(app_key, &mut out[1..len]);

    Ok(len)
}

fn encode_data(
    keys: &KeySet,
    mtype: MessageType,
    data: &DataFrame<'_>,
    out: &mut [u8],
) -> Result<usize, EncodeError> {
    if data.opts.len() > MAX_FOPTS_LEN {
        return Err(EncodeError::OptionsTooLong);
    }
    if matches!(data.payload, Some(AppPayload { port: 0, .. })) && !data.opts.is_empty() {
        return Err(EncodeError::InvalidField);
    }

    let payload_len = data.payload.map(|p| 1 + p.data.len()).unwrap_or(0);
    let len = PHY_PAYLOAD_OVERHEAD + data.opts.len() + payload_len;
    if len > MAX_PHY_PAYLOAD {
        return Err(EncodeError::PayloadTooLong);
    }
    if out.len() < len {
        return Err(EncodeError::BufferTooSmall);
    }

    let dir = mtype.direction();
    let fctrl = FCtrl {
        adr: data.adr,
        adr_ack_req: data.adr_ack_req,
        ack: data.ack,
        f_pending: data.pending && !mtype.is_upstream(),
        f_opts_len: data.opts.len() as u8,
    };

    out[0] = mtype.mhdr();
    out[1..5].copy_from_slice(&data.dev_addr.to_le_bytes());
    out[5] = fctrl.to_byte();
    out[6..8].copy_from_slice(&(data.counter as u16).to_le_bytes());

    let mut pos = 1 + FHDR_LEN;
    out[pos..pos + data.opts.len()].copy_from_slice(data.opts);
    pos += data.opts.len();

    if let Some(payload) = &data.payload {
        out[pos] = payload.port;
        pos += 1;

        let frm = &mut out[pos..pos + payload.data.len()];
        frm.copy_from_slice(payload.data);
        let key = payload_key(keys, payload.port);
        crypto::encrypt_payload(key, data.dev_addr, data.counter, dir, frm);
        pos += payload.data.len();
    }

    let mic = crypto::compute_mic(&keys.nwk_skey, &out[..pos], data.dev_addr, data.counter, dir);
    out[pos..pos + MIC_SIZE].copy_from_slice(&mic);

    Ok(pos + MIC_SIZE)
}

fn payload_key(keys: &KeySet, port: u8) -> &AesKey {
    if port == 0 {
        &keys.nwk_skey
    } else {
        &keys.app_skey
    }
}

/// Decode a frame, assuming the upper 16 counter bits are zero
///
/// See [`decode_with_counter`].
pub fn decode<'a>(keys: &KeySet, buf: &'a mut [u8]) -> Result<Frame<'a>, DecodeError> {
    decode_with_counter(keys, buf, 0)
}

/// Decode a frame, authenticating it and decrypting it in place
///
/// For data frames the 32-bit counter is rebuilt from the 16 wire bits as
/// the smallest value not below `expected_counter` that shares them, and that
/// value is used for MIC and decryption. A MIC failure on a data frame leaves
/// `buf` untouched; a join accept is always decrypted in place first.
pub fn decode_with_counter<'a>(
    keys: &KeySet,
    buf: &'a mut [u8],
    expected_counter: u32,
) -> Result<Frame<'a>, DecodeError> {
    let len = buf.len();
    let mtype = match buf.first().copied().and_then(MessageType::from_mhdr) {
        Some(mtype) => mtype,
        None => {
            debug!("decode: unsupported MHDR");
            return Err(DecodeError::Bad);
        }
    };

    let result = match mtype {
        MessageType::JoinRequest => decode_join_request(&keys.app_key, buf),
        MessageType::JoinAccept => decode_join_accept(&keys.app_key, buf),
        _ => decode_data(keys, mtype, buf, expected_counter),
    };

    if let Err(e) = &result {
        debug!("decode {:?} ({} bytes) rejected: {:?}", mtype, len, e);
    }
    result
}

fn check_mic(received: &[u8], computed: &[u8; MIC_SIZE]) -> Result<(), DecodeError> {
    if received == computed {
        Ok(())
    } else {
        Err(DecodeError::Mic)
    }
}

fn decode_join_request<'a>(app_key: &AesKey, buf: &'a mut [u8]) -> Result<Frame<'a>, DecodeError> {
    if buf.len() != JOIN_REQUEST_LEN {
        return Err(DecodeError::Bad);
    }

    let body_len = JOIN_REQUEST_LEN - MIC_SIZE;
    check_mic(&buf[body_len..], &crypto::compute_join_mic(app_key, &buf[..body_len]))?;

    let mut app_eui = [0u8; 8];
    let mut dev_eui = [0u8; 8];
    app_eui.copy_from_slice(&buf[1..9]);
    dev_eui.copy_from_slice(&buf[9..17]);

    Ok(Frame::JoinRequest(JoinRequest {
        app_eui,
        dev_eui,
        dev_nonce: u16::from_le_bytes([buf[17], buf[18]]),
    }))
}

fn decode_join_accept<'a>(app_key: &AesKey, buf: &'a mut [u8]) -> Result<Frame<'a>, DecodeError> {
    let len = buf.len();
    if len != JOIN_ACCEPT_LEN && len != JOIN_ACCEPT_LEN + CF_LIST_LEN {
        return Err(DecodeError::Bad);
    }

    crypto::decrypt_join_accept(app_key, &mut buf[1..]);

    let body_len = len - MIC_SIZE;
    check_mic(&buf[body_len..], &crypto::compute_join_mic(app_key, &buf[..body_len]))?;

    let mut app_nonce = [0u8; 3];
    let mut net_id = [0u8; 3];
    app_nonce.copy_from_slice(&buf[1..4]);
    net_id.copy_from_slice(&buf[4..7]);

    let cf_list = if len > JOIN_ACCEPT_LEN {
        let mut cf_list = [0u8; CF_LIST_LEN];
        cf_list.copy_from_slice(&buf[13..13 + CF_LIST_LEN]);
        Some(cf_list)
    } else {
        None
    };

    Ok(Frame::JoinAccept(JoinAccept {
        app_nonce,
        net_id,
        dev_addr: DevAddr::from_le_bytes([buf[7], buf[8], buf[9], buf[10]]),
        rx1_dr_offset: (buf[11] >> 4) & 0x07,
        rx2_data_rate: buf[11] & 0x0F,
        rx_delay: buf[12] & 0x0F,
        cf_list,
    }))
}

fn decode_data<'a>(
    keys: &KeySet,
    mtype: MessageType,
    buf: &'a mut [u8],
    expected_counter: u32,
) -> Result<Frame<'a>, DecodeError> {
    let len = buf.len();
    if len < PHY_PAYLOAD_OVERHEAD || len > MAX_PHY_PAYLOAD {
        return Err(DecodeError::Bad);
    }

    let fctrl = FCtrl::from_byte(buf[5]);
    let opts_end = 1 + FHDR_LEN + fctrl.f_opts_len as usize;
    let mic_start = len - MIC_SIZE;
    if opts_end > mic_start {
        return Err(DecodeError::Bad);
    }

    let port = if opts_end < mic_start { Some(buf[opts_end]) } else { None };
    if port == Some(0) && fctrl.f_opts_len > 0 {
        return Err(DecodeError::Bad);
    }

    let dev_addr = DevAddr::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]);
    let counter = reconstruct_counter(u16::from_le_bytes([buf[6], buf[7]]), expected_counter);
    let dir = mtype.direction();

    let mic = crypto::compute_mic(&keys.nwk_skey, &buf[..mic_start], dev_addr, counter, dir);
    check_mic(&buf[mic_start..], &mic)?;

    if let Some(port) = port {
        let key = payload_key(keys, port);
        crypto::encrypt_payload(key, dev_addr, counter, dir, &mut buf[opts_end + 1..mic_start]);
    }

    let buf: &'a [u8] = buf;
    let data = DataFrame {
        dev_addr,
        counter,
        ack: fctrl.ack,
        adr: fctrl.adr,
        adr_ack_req: fctrl.adr_ack_req,
        pending: fctrl.f_pending && !mtype.is_upstream(),
        opts: &buf[1 + FHDR_LEN..opts_end],
        payload: port.map(|port| AppPayload {
            port,
            data: &buf[opts_end + 1..mic_start],
        }),
    };

    Frame::data_with_type(mtype, data).ok_or(DecodeError::Bad)
}

/// Smallest counter `>= expected` whose low 16 bits equal `low`
fn reconstruct_counter(low: u16, expected: u32) -> u32 {
    let candidate = (expected & 0xFFFF_0000) | low as u32;
    if candidate < expected {
        candidate.wrapping_add(0x1_0000)
    } else {
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_reconstruction() {
        assert_eq!(reconstruct_counter(5, 0), 5);
        assert_eq!(reconstruct_counter(0x0002, 0x0001_fff0), 0x0002_0002);
        assert_eq!(reconstruct_counter(0xfff8, 0x0001_fff0), 0x0001_fff8);
        assert_eq!(reconstruct_counter(0x1234, 0x0003_1234), 0x0003_1234);
    }

    #[test]
    fn phy_size_counts_port_only_with_data() {
        assert_eq!(phy_payload_size(0, 0), 12);
        assert_eq!(phy_payload_size(0, 3), 15);
        assert_eq!(phy_payload_size(10, 2), 25);
    }

    #[test]
    fn mhdr_round_trips_for_supported_types() {
        for mtype in [
            MessageType::JoinRequest,
            MessageType::JoinAccept,
            MessageType::UnconfirmedUp,
            MessageType::UnconfirmedDown,
            MessageType::ConfirmedUp,
            MessageType::ConfirmedDown,
        ] {
            assert_eq!(MessageType::from_mhdr(mtype.mhdr()), Some(mtype));
        }
        assert_eq!(MessageType::from_mhdr(0xE0), None);
        assert_eq!(MessageType::from_mhdr(0x41), None);
    }
}
