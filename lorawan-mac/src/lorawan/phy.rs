//! Physical layer settings and time-on-air.

/// LoRa spreading factor, or the FSK marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpreadingFactor {
    /// SF6 (implicit header only)
    Sf6,
    /// SF7
    Sf7,
    /// SF8
    Sf8,
    /// SF9
    Sf9,
    /// SF10
    Sf10,
    /// SF11
    Sf11,
    /// SF12
    Sf12,
    /// Not a LoRa setting
    Fsk,
}

impl SpreadingFactor {
    /// Numeric spreading factor, `None` for FSK
    pub fn value(self) -> Option<u8> {
        match self {
            SpreadingFactor::Sf6 => Some(6),
            SpreadingFactor::Sf7 => Some(7),
            SpreadingFactor::Sf8 => Some(8),
            SpreadingFactor::Sf9 => Some(9),
            SpreadingFactor::Sf10 => Some(10),
            SpreadingFactor::Sf11 => Some(11),
            SpreadingFactor::Sf12 => Some(12),
            SpreadingFactor::Fsk => None,
        }
    }
}

/// Signal bandwidth, or the FSK marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bandwidth {
    /// 125 kHz
    Bw125,
    /// 250 kHz
    Bw250,
    /// 500 kHz
    Bw500,
    /// Not a LoRa setting
    Fsk,
}

impl Bandwidth {
    /// Bandwidth in Hz, `None` for FSK
    pub fn hz(self) -> Option<u32> {
        match self {
            Bandwidth::Bw125 => Some(125_000),
            Bandwidth::Bw250 => Some(250_000),
            Bandwidth::Bw500 => Some(500_000),
            Bandwidth::Fsk => None,
        }
    }
}

/// LoRa coding rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodingRate {
    /// 4/5
    #[default]
    Cr5,
    /// 4/6
    Cr6,
    /// 4/7
    Cr7,
    /// 4/8
    Cr8,
}

impl CodingRate {
    /// The `CR` term of the airtime formula (1..=4)
    pub fn value(self) -> u8 {
        match self {
            CodingRate::Cr5 => 1,
            CodingRate::Cr6 => 2,
            CodingRate::Cr7 => 3,
            CodingRate::Cr8 => 4,
        }
    }
}

/// A concrete radio configuration for one transmission or receive window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelSetting {
    /// Frequency in Hz
    pub freq: u32,
    /// Spreading factor
    pub sf: SpreadingFactor,
    /// Bandwidth
    pub bw: Bandwidth,
    /// Coding rate
    pub cr: CodingRate,
    /// Transmit power index (region defined)
    pub power: u8,
}

/// LoRa packet time-on-air in microseconds
///
/// Closed form with 8 programmed preamble symbols (12.25 symbols on air)
/// and CRC always on. The 20 bit header term is subtracted at every
/// spreading factor except SF6. Low data rate optimisation applies at
/// 125 kHz with SF11 and SF12.
///
/// FSK settings have no formula here and return 0.
pub fn time_on_air(setting: &ChannelSetting, payload_len: usize) -> u32 {
    let (sf, bw) = match (setting.sf.value(), setting.bw.hz()) {
        (Some(sf), Some(bw)) => (sf as i64, bw as i64),
        _ => return 0,
    };

    let de: i64 = if setting.bw == Bandwidth::Bw125 && sf >= 11 { 1 } else { 0 };
    let header: i64 = if sf == 6 { 0 } else { 1 };
    let crc: i64 = 1;

    let ts = ((1i64 << sf) * 1_000_000) / bw;
    let t_preamble = ts * 12 + ts / 4;

    let numerator = 8 * payload_len as i64 - 4 * sf + 28 + 16 * crc - 20 * header;
    let denominator = 4 * (sf - 2 * de);

    let blocks = if numerator > 0 {
        (numerator + denominator - 1) / denominator
    } else {
        0
    };
    let n_payload = 8 + blocks * (setting.cr.value() as i64 + 4);

    (t_preamble + n_payload * ts) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lora(sf: SpreadingFactor, bw: Bandwidth) -> ChannelSetting {
        ChannelSetting {
            freq: 868_100_000,
            sf,
            bw,
            cr: CodingRate::Cr5,
            power: 0,
        }
    }

    #[test]
    fn sf7_125_twenty_bytes() {
        // Ts = 1024us, preamble = 12544us, 8 + ceil(156/28)*5 = 38 symbols
        let setting = lora(SpreadingFactor::Sf7, Bandwidth::Bw125);
        assert_eq!(time_on_air(&setting, 20), 12_544 + 38 * 1_024);
    }

    #[test]
    fn sf12_uses_low_data_rate_optimisation() {
        // Ts = 32768us, 8 + ceil(80/40)*5 = 18 symbols
        let setting = lora(SpreadingFactor::Sf12, Bandwidth::Bw125);
        assert_eq!(time_on_air(&setting, 13), 32_768 * 12 + 32_768 / 4 + 18 * 32_768);
    }

    #[test]
    fn sf6_skips_the_header_term() {
        // Ts = 512us, 8 + ceil(180/24)*5 = 48 symbols
        let setting = lora(SpreadingFactor::Sf6, Bandwidth::Bw125);
        assert_eq!(time_on_air(&setting, 20), 512 * 12 + 512 / 4 + 48 * 512);
    }

    #[test]
    fn short_payload_never_goes_negative() {
        let setting = lora(SpreadingFactor::Sf12, Bandwidth::Bw125);
        let ts = 32_768;
        assert_eq!(time_on_air(&setting, 0), ts * 12 + ts / 4 + 8 * ts);
    }

    #[test]
    fn airtime_grows_with_payload() {
        let setting = lora(SpreadingFactor::Sf9, Bandwidth::Bw125);
        assert!(time_on_air(&setting, 50) > time_on_air(&setting, 10));
    }

    #[test]
    fn fsk_has_no_airtime() {
        let setting = lora(SpreadingFactor::Fsk, Bandwidth::Fsk);
        assert_eq!(time_on_air(&setting, 50), 0);
    }
}
