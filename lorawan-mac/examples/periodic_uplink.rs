//! Periodic uplink over a simulated network
//!
//! This example walks through the data plane without a radio:
//! - OTAA join, with the network side decoded in-process
//! - Session key derivation and CFList channels
//! - Uplinks paced by the EU868 duty-cycle gates
//!
//! Time runs on a simulated millisecond clock so the example finishes
//! immediately; swap `SimClock` for `std::time::Instant` on real hardware.

use lorawan_mac::{
    config::device::{AesKey, DevAddr, DeviceConfig, KeySet, SessionState},
    crypto,
    lorawan::{
        codec, AppPayload, ChannelList, DataFrame, Eu868, Frame, JoinAccept, JoinRequest,
    },
};

const DEVEUI: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
const APPEUI: [u8; 8] = [0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01];
const APPKEY: [u8; 16] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10,
];

const UPLINKS: u16 = 10;

struct SimClock {
    now: u64,
}

impl SimClock {
    fn sleep(&mut self, ms: u64) {
        self.now += ms;
    }
}

// Sensor data structure
#[derive(Default)]
struct SensorData {
    temperature: i16,
    humidity: u8,
    pressure: u16,
}

impl SensorData {
    fn to_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0..2].copy_from_slice(&self.temperature.to_be_bytes());
        bytes[2] = self.humidity;
        bytes[3..5].copy_from_slice(&self.pressure.to_be_bytes());
        bytes
    }
}

/// Stand-in for a network server that accepts every join
fn network_join(request: &[u8], out: &mut [u8]) -> Result<usize, Box<dyn std::error::Error>> {
    let keys = KeySet::join_only(AesKey::new(APPKEY));
    let mut buf = request.to_vec();

    match codec::decode(&keys, &mut buf).map_err(|e| e.to_string())? {
        Frame::JoinRequest(req) => println!("network: join request from {:02x?}", req.dev_eui),
        _ => return Err("expected a join request".into()),
    }

    let mut cf_list = [0u8; 16];
    for (entry, freq) in cf_list
        .chunks_exact_mut(3)
        .zip([867_100_000u32, 867_300_000, 867_500_000, 867_700_000, 867_900_000])
    {
        entry.copy_from_slice(&(freq / 100).to_le_bytes()[..3]);
    }

    let accept = Frame::JoinAccept(JoinAccept {
        app_nonce: [0x5A, 0x3C, 0x01],
        net_id: [0x13, 0x00, 0x00],
        dev_addr: DevAddr(0x2601_1F00),
        rx1_dr_offset: 0,
        rx2_data_rate: 0,
        rx_delay: 1,
        cf_list: Some(cf_list),
    });
    Ok(codec::encode(&keys, &accept, out).map_err(|e| e.to_string())?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = DeviceConfig::new_otaa(DEVEUI, APPEUI, AesKey::new(APPKEY));
    let mut channels: ChannelList<Eu868> = ChannelList::new(Eu868::new());
    let mut clock = SimClock { now: 0 };

    // Join
    let join_keys = KeySet::join_only(config.app_key);
    let dev_nonce = 0x0042;
    let mut buf = [0u8; 255];

    let setting = channels.ready(clock.now).map_err(|e| format!("{:?}", e))?;
    let len = codec::encode(
        &join_keys,
        &Frame::JoinRequest(JoinRequest {
            app_eui: config.app_eui,
            dev_eui: config.dev_eui,
            dev_nonce,
        }),
        &mut buf,
    )
    .map_err(|e| e.to_string())?;
    println!("device: join request on {} Hz ({} bytes)", setting.freq, len);
    channels.register_transmission(clock.now, len);

    let mut rx = [0u8; 255];
    let rx_len = network_join(&buf[..len], &mut rx)?;
    let accept = match codec::decode(&join_keys, &mut rx[..rx_len]).map_err(|e| e.to_string())? {
        Frame::JoinAccept(accept) => accept,
        _ => return Err("expected a join accept".into()),
    };

    let (nwk_skey, app_skey) =
        crypto::derive_session_keys(&config.app_key, &accept.app_nonce, &accept.net_id, dev_nonce);
    let mut session = SessionState::new_otaa(accept.dev_addr, nwk_skey, app_skey);
    channels.set_rx1_offset(accept.rx1_dr_offset);
    if let Some(list) = &accept.cf_list {
        let added = channels.apply_cf_list(3, list);
        println!("device: joined as {:08x}, {} extra channels", session.dev_addr.0, added);
    }

    // Uplinks
    let keys = session.keys(config.app_key);
    let mut sensor = SensorData::default();

    for i in 0..UPLINKS {
        let wait = channels.wait_time(clock.now);
        if wait > 0 {
            println!("device: duty cycle, waiting {} ms", wait);
            clock.sleep(wait);
        }

        let setting = match channels.ready(clock.now) {
            Ok(setting) => setting,
            Err(nb::Error::WouldBlock) => continue,
            Err(nb::Error::Other(e)) => return Err(format!("{:?}", e).into()),
        };

        sensor.temperature = 215 + i as i16;
        sensor.humidity = 40 + (i % 5) as u8;
        sensor.pressure = 1013;
        let data = sensor.to_bytes();

        let frame = Frame::UnconfirmedUp(DataFrame {
            dev_addr: session.dev_addr,
            counter: session.fcnt_up,
            ack: false,
            adr: false,
            adr_ack_req: false,
            pending: false,
            opts: &[],
            payload: Some(AppPayload { port: 1, data: &data }),
        });
        let len = codec::encode(&keys, &frame, &mut buf).map_err(|e| e.to_string())?;

        println!(
            "t={:>7} ms: fcnt {} on {} Hz {:?} ({} bytes)",
            clock.now, session.fcnt_up, setting.freq, setting.sf, len
        );
        channels.register_transmission(clock.now, len);
        session.increment_fcnt_up();
    }

    Ok(())
}
