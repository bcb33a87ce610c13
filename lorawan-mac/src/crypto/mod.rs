//! LoRaWAN cryptographic operations
//!
//! This module provides cryptographic functions for LoRaWAN security:
//! - Message Integrity Code (MIC) computation
//! - Payload encryption/decryption
//! - Join accept encryption/decryption
//! - Session key derivation
//!
//! Everything works in place on caller buffers; nothing here allocates.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use cmac::{Cmac, Mac};

use crate::config::device::{AesKey, DevAddr};

/// MIC size in bytes
pub const MIC_SIZE: usize = 4;

/// Block size for AES-128
pub const BLOCK_SIZE: usize = 16;

/// Direction identifiers for cryptographic operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Uplink (device to network)
    Up = 0,
    /// Downlink (network to device)
    Down = 1,
}

fn cipher(key: &AesKey) -> Aes128 {
    Aes128::new(GenericArray::from_slice(key.as_bytes()))
}

fn cmac(key: &AesKey) -> Cmac<Aes128> {
    <Cmac<Aes128> as KeyInit>::new(GenericArray::from_slice(key.as_bytes()))
}

fn truncate(tag: &[u8]) -> [u8; MIC_SIZE] {
    let mut mic = [0u8; MIC_SIZE];
    mic.copy_from_slice(&tag[..MIC_SIZE]);
    mic
}

/// Per-frame block shared by the MIC preamble (B0) and the payload
/// keystream (Ai). Only the first and last bytes differ between uses.
fn frame_block(tag: u8, dir: Direction, dev_addr: DevAddr, fcnt: u32, last: u8) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    block[0] = tag;
    block[5] = dir as u8;
    block[6..10].copy_from_slice(&dev_addr.to_le_bytes());
    block[10..14].copy_from_slice(&fcnt.to_le_bytes());
    block[15] = last;
    block
}

/// Compute Message Integrity Code (MIC) for a LoRaWAN data message
///
/// The CMAC runs over the B0 preamble followed by `data` (MHDR up to and
/// including FRMPayload).
///
/// # Arguments
/// * `key` - Network session key
/// * `data` - Message bytes to authenticate
/// * `dev_addr` - Device address
/// * `fcnt` - Full 32-bit frame counter
/// * `dir` - Message direction
pub fn compute_mic(
    key: &AesKey,
    data: &[u8],
    dev_addr: DevAddr,
    fcnt: u32,
    dir: Direction,
) -> [u8; MIC_SIZE] {
    let b0 = frame_block(0x49, dir, dev_addr, fcnt, data.len() as u8);

    let mut mac = cmac(key);
    mac.update(&b0);
    mac.update(data);
    truncate(&mac.finalize().into_bytes())
}

/// Compute Message Integrity Code (MIC) for join request and join accept
/// messages. There is no preamble block.
pub fn compute_join_mic(key: &AesKey, data: &[u8]) -> [u8; MIC_SIZE] {
    let mut mac = cmac(key);
    mac.update(data);
    truncate(&mac.finalize().into_bytes())
}

/// Encrypt or decrypt FRMPayload in place
///
/// The keystream is AES-128 over the Ai blocks (block index starting at 1),
/// so the same call both encrypts and decrypts.
pub fn encrypt_payload(
    key: &AesKey,
    dev_addr: DevAddr,
    fcnt: u32,
    dir: Direction,
    payload: &mut [u8],
) {
    let cipher = cipher(key);

    for (i, chunk) in payload.chunks_mut(BLOCK_SIZE).enumerate() {
        let mut s = frame_block(0x01, dir, dev_addr, fcnt, (i + 1) as u8);
        cipher.encrypt_block(GenericArray::from_mut_slice(&mut s));

        for (b, k) in chunk.iter_mut().zip(s.iter()) {
            *b ^= k;
        }
    }
}

/// Encrypt a join accept in place (network side)
///
/// `data` is everything after MHDR, MIC included, and must be a multiple of
/// the block size. The network applies the AES decrypt primitive so that
/// devices only need the encrypt primitive.
pub fn encrypt_join_accept(key: &AesKey, data: &mut [u8]) {
    debug_assert_eq!(data.len() % BLOCK_SIZE, 0);

    let cipher = cipher(key);
    for block in data.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }
}

/// Decrypt a join accept in place (device side)
///
/// Inverse of [`encrypt_join_accept`].
pub fn decrypt_join_accept(key: &AesKey, data: &mut [u8]) {
    debug_assert_eq!(data.len() % BLOCK_SIZE, 0);

    let cipher = cipher(key);
    for block in data.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
}

/// Derive network and application session keys from join accept
///
/// # Arguments
/// * `app_key` - Application key
/// * `app_nonce` - Application nonce from join accept
/// * `net_id` - Network ID from join accept
/// * `dev_nonce` - Device nonce from join request
pub fn derive_session_keys(
    app_key: &AesKey,
    app_nonce: &[u8; 3],
    net_id: &[u8; 3],
    dev_nonce: u16,
) -> (AesKey, AesKey) {
    let cipher = cipher(app_key);

    let derive = |tag: u8| {
        let mut block = [0u8; BLOCK_SIZE];
        block[0] = tag;
        block[1..4].copy_from_slice(app_nonce);
        block[4..7].copy_from_slice(net_id);
        block[7..9].copy_from_slice(&dev_nonce.to_le_bytes());
        cipher.encrypt_block(GenericArray::from_mut_slice(&mut block));
        AesKey::new(block)
    };

    (derive(0x01), derive(0x02))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC4493_KEY: [u8; 16] = [
        0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f,
        0x3c,
    ];

    #[test]
    fn join_mic_matches_rfc4493() {
        let key = AesKey::new(RFC4493_KEY);

        assert_eq!(compute_join_mic(&key, &[]), [0xbb, 0x1d, 0x69, 0x29]);

        let m = [
            0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93,
            0x17, 0x2a,
        ];
        assert_eq!(compute_join_mic(&key, &m), [0x07, 0x0a, 0x16, 0xb4]);
    }

    #[test]
    fn join_accept_cipher_uses_forward_aes_on_device() {
        // FIPS-197 appendix C.1
        let key = AesKey::new([
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
            0x0e, 0x0f,
        ]);
        let plain = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ];
        let expected = [
            0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4,
            0xc5, 0x5a,
        ];

        let mut block = plain;
        decrypt_join_accept(&key, &mut block);
        assert_eq!(block, expected);

        encrypt_join_accept(&key, &mut block);
        assert_eq!(block, plain);
    }

    #[test]
    fn payload_cipher_is_an_involution() {
        let key = AesKey::new([0x01; 16]);
        let dev_addr = DevAddr(0x0403_0201);
        let original = *b"Hello LoRaWAN, this spans two blocks";

        let mut buf = original;
        encrypt_payload(&key, dev_addr, 7, Direction::Up, &mut buf);
        assert_ne!(buf, original);

        encrypt_payload(&key, dev_addr, 7, Direction::Up, &mut buf);
        assert_eq!(buf, original);
    }

    #[test]
    fn mic_depends_on_direction_and_counter() {
        let key = AesKey::new([0x01; 16]);
        let dev_addr = DevAddr(0x0403_0201);
        let data = b"Test Data";

        let up = compute_mic(&key, data, dev_addr, 1, Direction::Up);
        assert_ne!(up, compute_mic(&key, data, dev_addr, 1, Direction::Down));
        assert_ne!(up, compute_mic(&key, data, dev_addr, 0x0001_0001, Direction::Up));
    }

    #[test]
    fn session_keys_differ() {
        let app_key = AesKey::new([0x01; 16]);
        let (nwk_skey, app_skey) =
            derive_session_keys(&app_key, &[0x01, 0x02, 0x03], &[0x04, 0x05, 0x06], 0x0708);

        assert_ne!(nwk_skey, app_skey);
        assert_ne!(nwk_skey, app_key);
    }
}
