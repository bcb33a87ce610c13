use super::phy::{Bandwidth, SpreadingFactor};

/// Physical parameters behind a data rate index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataRateParams {
    /// Spreading factor
    pub sf: SpreadingFactor,
    /// Bandwidth
    pub bw: Bandwidth,
    /// Maximum MACPayload size in bytes
    pub max_payload: u8,
}

/// Settings a freshly initialised device starts with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DefaultSettings {
    /// RX2 frequency in Hz
    pub rx2_freq: u32,
    /// RX2 data rate index
    pub rx2_rate: u8,
    /// Initial transmit power index
    pub init_tx_power: u8,
    /// Initial transmit data rate index
    pub init_tx_rate: u8,
    /// Initial RX1 data rate offset
    pub rx1_offset: u8,
}

/// Regional parameter tables
///
/// A read-only capability consulted by the channel engine. Implementations
/// hold no mutable state.
pub trait Region {
    /// Call `f` once per default channel with its index and frequency
    fn default_channels(&self, f: &mut dyn FnMut(u8, u32));

    /// Default transmit and receive settings
    fn default_settings(&self) -> DefaultSettings;

    /// Sub-band of `freq`, `None` if the frequency plan rejects it
    fn validate_frequency(&self, freq: u32) -> Option<u8>;

    /// Parameters for a data rate index, `None` if the index is invalid
    fn data_rate(&self, rate: u8) -> Option<DataRateParams>;

    /// Off-air time multiplier for a sub-band
    fn off_time_factor(&self, band: u8) -> u16;

    /// RX1 data rate index for an uplink data rate and RX1 offset
    fn rx1_data_rate(&self, tx_rate: u8, rx1_offset: u8) -> u8;
}

impl<R: Region + ?Sized> Region for &R {
    fn default_channels(&self, f: &mut dyn FnMut(u8, u32)) {
        (**self).default_channels(f)
    }

    fn default_settings(&self) -> DefaultSettings {
        (**self).default_settings()
    }

    fn validate_frequency(&self, freq: u32) -> Option<u8> {
        (**self).validate_frequency(freq)
    }

    fn data_rate(&self, rate: u8) -> Option<DataRateParams> {
        (**self).data_rate(rate)
    }

    fn off_time_factor(&self, band: u8) -> u16 {
        (**self).off_time_factor(band)
    }

    fn rx1_data_rate(&self, tx_rate: u8, rx1_offset: u8) -> u8 {
        (**self).rx1_data_rate(tx_rate, rx1_offset)
    }
}

struct SubBand {
    lo: u32,
    hi: u32,
    off_time_factor: u16,
}

// ETSI EN 300 220 sub-bands as used by LoRaWAN EU863-870.
const EU868_SUB_BANDS: [SubBand; 6] = [
    SubBand { lo: 863_000_000, hi: 865_000_000, off_time_factor: 1000 }, // 0.1%
    SubBand { lo: 865_000_000, hi: 868_000_000, off_time_factor: 100 },  // 1%
    SubBand { lo: 868_000_000, hi: 868_600_000, off_time_factor: 100 },  // 1%
    SubBand { lo: 868_700_000, hi: 869_200_000, off_time_factor: 1000 }, // 0.1%
    SubBand { lo: 869_400_000, hi: 869_650_000, off_time_factor: 10 },   // 10%
    SubBand { lo: 869_700_000, hi: 870_000_000, off_time_factor: 100 },  // 1%
];

const EU868_DATA_RATES: [DataRateParams; 8] = [
    DataRateParams { sf: SpreadingFactor::Sf12, bw: Bandwidth::Bw125, max_payload: 59 },
    DataRateParams { sf: SpreadingFactor::Sf11, bw: Bandwidth::Bw125, max_payload: 59 },
    DataRateParams { sf: SpreadingFactor::Sf10, bw: Bandwidth::Bw125, max_payload: 59 },
    DataRateParams { sf: SpreadingFactor::Sf9, bw: Bandwidth::Bw125, max_payload: 123 },
    DataRateParams { sf: SpreadingFactor::Sf8, bw: Bandwidth::Bw125, max_payload: 250 },
    DataRateParams { sf: SpreadingFactor::Sf7, bw: Bandwidth::Bw125, max_payload: 250 },
    DataRateParams { sf: SpreadingFactor::Sf7, bw: Bandwidth::Bw250, max_payload: 250 },
    DataRateParams { sf: SpreadingFactor::Fsk, bw: Bandwidth::Fsk, max_payload: 250 },
];

const EU868_DEFAULT_CHANNELS: [u32; 3] = [868_100_000, 868_300_000, 868_500_000];

/// Maximum RX1 data rate offset in EU863-870
const EU868_MAX_RX1_OFFSET: u8 = 5;

/// EU 863-870 MHz regional parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct Eu868;

impl Eu868 {
    /// Create the EU863-870 table
    pub fn new() -> Self {
        Self
    }
}

impl Region for Eu868 {
    fn default_channels(&self, f: &mut dyn FnMut(u8, u32)) {
        for (index, freq) in EU868_DEFAULT_CHANNELS.iter().enumerate() {
            f(index as u8, *freq);
        }
    }

    fn default_settings(&self) -> DefaultSettings {
        DefaultSettings {
            rx2_freq: 869_525_000,
            rx2_rate: 0,
            init_tx_power: 1, // 14 dBm
            init_tx_rate: 3,
            rx1_offset: 0,
        }
    }

    fn validate_frequency(&self, freq: u32) -> Option<u8> {
        EU868_SUB_BANDS
            .iter()
            .position(|band| (band.lo..=band.hi).contains(&freq))
            .map(|band| band as u8)
    }

    fn data_rate(&self, rate: u8) -> Option<DataRateParams> {
        EU868_DATA_RATES.get(rate as usize).copied()
    }

    fn off_time_factor(&self, band: u8) -> u16 {
        EU868_SUB_BANDS
            .get(band as usize)
            .map(|band| band.off_time_factor)
            .unwrap_or(u16::MAX)
    }

    fn rx1_data_rate(&self, tx_rate: u8, rx1_offset: u8) -> u8 {
        tx_rate.saturating_sub(rx1_offset.min(EU868_MAX_RX1_OFFSET))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eu868_classifies_sub_bands() {
        let region = Eu868::new();

        assert_eq!(region.validate_frequency(868_100_000), Some(2));
        assert_eq!(region.validate_frequency(869_525_000), Some(4));
        assert_eq!(region.validate_frequency(864_100_000), Some(0));
        assert_eq!(region.validate_frequency(868_650_000), None);
        assert_eq!(region.validate_frequency(915_000_000), None);
    }

    #[test]
    fn eu868_rx1_offset_is_clamped() {
        let region = Eu868::new();

        assert_eq!(region.rx1_data_rate(5, 2), 3);
        assert_eq!(region.rx1_data_rate(1, 3), 0);
        assert_eq!(region.rx1_data_rate(7, 7), 2);
    }
}
