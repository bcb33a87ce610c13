use lorawan_mac::{
    config::{
        device::ActivationState, AesKey, DevAddr, DeviceConfig, KeySet, SessionState,
    },
    crypto,
    lorawan::{
        decode, decode_with_counter, encode, AppPayload, ChannelList, DataFrame, Eu868, Frame,
        JoinAccept, JoinRequest, SpreadingFactor,
    },
};

const APP_KEY: [u8; 16] = [
    0x2B, 0x7E, 0x15, 0x16, 0x28, 0xAE, 0xD2, 0xA6, 0xAB, 0xF7, 0x15, 0x88, 0x09, 0xCF, 0x4F, 0x3C,
];

fn create_test_device() -> (DeviceConfig, ChannelList<Eu868>) {
    let dev_eui = [0x01; 8];
    let app_eui = [0x02; 8];
    let config = DeviceConfig::new_otaa(dev_eui, app_eui, AesKey::new(APP_KEY));

    (config, ChannelList::new(Eu868::new()))
}

fn cf_list(freqs: &[u32]) -> [u8; 16] {
    let mut list = [0u8; 16];
    for (entry, freq) in list.chunks_exact_mut(3).zip(freqs) {
        entry.copy_from_slice(&(freq / 100).to_le_bytes()[..3]);
    }
    list
}

/// Join the device and return its session, leaving the channel list
/// configured from the join accept
fn join(config: &DeviceConfig, channels: &mut ChannelList<Eu868>, now: u64) -> SessionState {
    let device_keys = KeySet::join_only(config.app_key);
    let network_keys = KeySet::join_only(AesKey::new(APP_KEY));
    let dev_nonce = 0x1A2B;

    // device: join request
    channels.ready(now).unwrap();
    let mut buf = [0u8; 64];
    let len = encode(
        &device_keys,
        &Frame::JoinRequest(JoinRequest {
            app_eui: config.app_eui,
            dev_eui: config.dev_eui,
            dev_nonce,
        }),
        &mut buf,
    )
    .unwrap();
    channels.register_transmission(now, len);

    // network: accept it
    let request = match decode(&network_keys, &mut buf[..len]).unwrap() {
        Frame::JoinRequest(request) => request,
        other => panic!("expected join request, got {:?}", other),
    };
    assert_eq!(request.dev_eui, config.dev_eui);
    assert_eq!(request.dev_nonce, dev_nonce);

    let accept = JoinAccept {
        app_nonce: [0x11, 0x22, 0x33],
        net_id: [0x00, 0x00, 0x13],
        dev_addr: DevAddr(0x2601_1F00),
        rx1_dr_offset: 2,
        rx2_data_rate: 3,
        rx_delay: 1,
        cf_list: Some(cf_list(&[867_100_000, 867_300_000, 867_500_000])),
    };
    let len = encode(&network_keys, &Frame::JoinAccept(accept), &mut buf).unwrap();

    // device: process the accept
    let accept = match decode(&device_keys, &mut buf[..len]).unwrap() {
        Frame::JoinAccept(accept) => accept,
        other => panic!("expected join accept, got {:?}", other),
    };

    let (nwk_skey, app_skey) = crypto::derive_session_keys(
        &config.app_key,
        &accept.app_nonce,
        &accept.net_id,
        request.dev_nonce,
    );

    channels.set_rx1_offset(accept.rx1_dr_offset);
    channels.set_rx2(869_525_000, accept.rx2_data_rate);
    if let Some(list) = &accept.cf_list {
        assert_eq!(channels.apply_cf_list(3, list), 3);
    }

    SessionState::new_otaa(accept.dev_addr, nwk_skey, app_skey)
}

#[test]
fn test_otaa_activation() {
    let (config, mut channels) = create_test_device();
    assert!(config.abp_session().is_none());

    let session = join(&config, &mut channels, 0);
    assert_eq!(session.activation_state, ActivationState::OtaaActivated);
    assert_eq!(session.dev_addr, DevAddr(0x2601_1F00));
    assert_eq!((session.fcnt_up, session.fcnt_down), (0, 0));

    assert_eq!(channels.num_unmasked(), 6);
    assert_eq!(channels.band_num_unmasked(1), 3);
    assert_eq!(
        channels.rx2_setting().map(|s| (s.freq, s.sf)),
        Some((869_525_000, SpreadingFactor::Sf9))
    );

    // join request closed band 2; the new channels are picked up on the
    // next transmission
    assert_eq!(channels.selected_band(), Some(2));
    assert!(channels.wait_time(0) > 0);
    assert_eq!(channels.band_ready_time(1), Some(0));
}

#[test]
fn test_uplink_and_confirmed_downlink() {
    let (config, mut channels) = create_test_device();
    let mut session = join(&config, &mut channels, 0);
    let keys = session.keys(config.app_key);

    let mut now = 0;
    let mut network_fcnt_up = 0;

    for reading in 0u8..5 {
        let wait = channels.wait_time(now);
        now += wait;
        let setting = channels.ready(now).unwrap();
        assert_eq!(setting.sf, SpreadingFactor::Sf9);

        let data = [0x10, reading];
        let frame = Frame::ConfirmedUp(DataFrame {
            dev_addr: session.dev_addr,
            counter: session.fcnt_up,
            ack: false,
            adr: false,
            adr_ack_req: false,
            pending: false,
            opts: &[],
            payload: Some(AppPayload {
                port: 2,
                data: &data,
            }),
        });
        let mut buf = [0u8; 64];
        let len = encode(&keys, &frame, &mut buf).unwrap();
        assert!(len <= channels.max_payload().unwrap() as usize + 5);
        channels.register_transmission(now, len);
        session.increment_fcnt_up();

        // the network sees the uplink
        let uplink = decode_with_counter(&keys, &mut buf[..len], network_fcnt_up).unwrap();
        let uplink = uplink.data().copied().unwrap();
        assert_eq!(uplink.counter, u32::from(reading));
        assert_eq!(uplink.payload.map(|p| p.data), Some(&data[..]));
        network_fcnt_up = uplink.counter + 1;

        // and acknowledges it in RX1
        let rx1 = channels.rx1_setting().unwrap();
        assert_eq!(rx1.sf, SpreadingFactor::Sf11);

        let downlink = Frame::ConfirmedDown(DataFrame {
            dev_addr: session.dev_addr,
            counter: session.fcnt_down,
            ack: true,
            adr: false,
            adr_ack_req: false,
            pending: false,
            opts: &[0x06],
            payload: None,
        });
        let mut buf = [0u8; 64];
        let len = encode(&keys, &downlink, &mut buf).unwrap();

        let received = decode_with_counter(&keys, &mut buf[..len], session.fcnt_down).unwrap();
        let received = received.data().copied().unwrap();
        assert!(received.ack);
        assert_eq!(received.opts, &[0x06]);
        session.accept_fcnt_down(received.counter);
    }

    assert_eq!(session.fcnt_up, 5);
    assert_eq!(session.fcnt_down, 5);
    assert!(now > 0);
}

#[test]
fn test_replayed_downlink_is_not_authentic() {
    let (config, mut channels) = create_test_device();
    let mut session = join(&config, &mut channels, 0);
    let keys = session.keys(config.app_key);

    let downlink = Frame::UnconfirmedDown(DataFrame {
        dev_addr: session.dev_addr,
        counter: 3,
        ack: false,
        adr: false,
        adr_ack_req: false,
        pending: false,
        opts: &[],
        payload: Some(AppPayload {
            port: 1,
            data: b"cmd",
        }),
    });
    let mut encoded = [0u8; 32];
    let len = encode(&keys, &downlink, &mut encoded).unwrap();

    let mut buf = encoded;
    let frame = decode_with_counter(&keys, &mut buf[..len], session.fcnt_down).unwrap();
    session.accept_fcnt_down(frame.data().map(|d| d.counter).unwrap());

    // replaying it now maps the wire counter to 0x1_0003
    let mut buf = encoded;
    assert!(decode_with_counter(&keys, &mut buf[..len], session.fcnt_down).is_err());
}

#[test]
fn test_abp_activation() {
    let config = DeviceConfig::new_abp(
        [0x01; 8],
        [0x02; 8],
        DevAddr(0x2601_2345),
        AesKey::new([0x03; 16]),
        AesKey::new([0x04; 16]),
    );

    let session = config.abp_session().unwrap();
    assert_eq!(session.activation_state, ActivationState::AbpActivated);
    assert_eq!(session.dev_addr, DevAddr(0x2601_2345));

    let keys = session.keys(config.app_key);
    let frame = Frame::UnconfirmedUp(DataFrame {
        dev_addr: session.dev_addr,
        counter: session.fcnt_up,
        ack: false,
        adr: false,
        adr_ack_req: false,
        pending: false,
        opts: &[],
        payload: Some(AppPayload {
            port: 1,
            data: b"abp",
        }),
    });

    let mut buf = [0u8; 32];
    let len = encode(&keys, &frame, &mut buf).unwrap();
    assert_eq!(decode(&keys, &mut buf[..len]).unwrap(), frame);
}

#[test]
fn test_duty_cycle_spreads_uplinks_across_bands() {
    let (config, mut channels) = create_test_device();
    let _session = join(&config, &mut channels, 0);

    let mut bands = [0usize; 8];
    let mut now = 1_000;
    for _ in 0..12 {
        now += channels.wait_time(now);
        channels.ready(now).unwrap();
        bands[channels.selected_band().unwrap()] += 1;
        channels.register_transmission(now, 30);
    }

    assert!(bands[1] > 0);
    assert!(bands[2] > 0);
    assert_eq!(bands[1] + bands[2], 12);
}
