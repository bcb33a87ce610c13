//! Channel list and duty-cycle bookkeeping.
//!
//! [`ChannelList`] owns a fixed-size channel table and one duty-cycle gate per
//! sub-band. Before each uplink the MAC asks it for a [`ChannelSetting`];
//! after the uplink it reports the PHYPayload length so the sub-band that was
//! used stays silent for its regulatory off-time. Selection always moves to
//! the sub-band that opens first and round-robins the channels inside it.
//!
//! Time is whatever monotonic millisecond counter the caller supplies; the
//! engine never reads a clock.

use heapless::Vec;

use super::phy::{time_on_air, ChannelSetting, CodingRate};
use super::region::Region;

/// Default channel table size
pub const DEFAULT_CHANNELS: usize = 16;

/// Number of sub-band slots
pub const MAX_BANDS: usize = 8;

/// One slot of the channel table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel {
    /// Frequency in Hz, 0 when the slot is unused
    pub freq: u32,
    /// Sub-band the frequency belongs to
    pub band: u8,
    /// Excluded from selection while keeping its configuration
    pub masked: bool,
}

impl Channel {
    const EMPTY: Channel = Channel {
        freq: 0,
        band: 0,
        masked: false,
    };

    /// True if the slot holds a channel
    pub fn is_present(&self) -> bool {
        self.freq != 0
    }

    fn is_eligible(&self, band: usize) -> bool {
        self.is_present() && !self.masked && self.band as usize == band
    }
}

#[derive(Debug, Clone, Copy)]
struct Band {
    /// Time at which the sub-band may transmit again
    ready_time: u64,
    /// Channel picked last time this band was selected
    last_channel: Option<usize>,
    /// Present and unmasked channels in this band
    num_unmasked: usize,
}

impl Band {
    const EMPTY: Band = Band {
        ready_time: 0,
        last_channel: None,
        num_unmasked: 0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Selection {
    band: usize,
    channel: usize,
}

/// Answer to a LinkADRReq
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdrAnswer {
    /// Channel mask accepted
    pub channel_ok: bool,
    /// Data rate accepted
    pub rate_ok: bool,
    /// TX power accepted
    pub power_ok: bool,
}

/// No channel, or no valid data rate, is available for transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Exhausted;

/// Channel selection and duty-cycle engine
///
/// `N` is the channel table capacity. The region is held by value; pass a
/// reference to share one table between several engines.
#[derive(Debug)]
pub struct ChannelList<R: Region, const N: usize = DEFAULT_CHANNELS> {
    region: R,
    channels: [Channel; N],
    bands: [Band; MAX_BANDS],
    next: Option<Selection>,
    num_unmasked: usize,
    rate: u8,
    power: u8,
    rx1_offset: u8,
    rx2_freq: u32,
    rx2_rate: u8,
}

impl<R: Region, const N: usize> ChannelList<R, N> {
    /// Create a channel list loaded with the region's defaults
    pub fn new(region: R) -> Self {
        let mut list = Self {
            region,
            channels: [Channel::EMPTY; N],
            bands: [Band::EMPTY; MAX_BANDS],
            next: None,
            num_unmasked: 0,
            rate: 0,
            power: 0,
            rx1_offset: 0,
            rx2_freq: 0,
            rx2_rate: 0,
        };
        list.reset();
        list
    }

    /// Drop all channels and duty-cycle state and reload the region defaults
    pub fn reset(&mut self) {
        self.channels = [Channel::EMPTY; N];
        self.bands = [Band::EMPTY; MAX_BANDS];
        self.next = None;
        self.num_unmasked = 0;

        let settings = self.region.default_settings();
        self.rate = settings.init_tx_rate;
        self.power = settings.init_tx_power;
        self.rx1_offset = settings.rx1_offset;
        self.rx2_freq = settings.rx2_freq;
        self.rx2_rate = settings.rx2_rate;

        let mut defaults: Vec<(u8, u32), N> = Vec::new();
        self.region.default_channels(&mut |index, freq| {
            if defaults.push((index, freq)).is_err() {
                warn!("default channel {} does not fit the table", index);
            }
        });

        for (index, freq) in defaults {
            if !self.add(index, freq) {
                warn!("region default channel {} ({} Hz) rejected", index, freq);
            }
        }
    }

    /// Region table in use
    pub fn region(&self) -> &R {
        &self.region
    }

    /// Channel table capacity
    pub fn capacity(&self) -> usize {
        N
    }

    /// Add (or replace) a channel. A frequency of 0 removes the slot.
    ///
    /// Returns false for an out-of-range index or a frequency the region
    /// rejects; the table is left untouched in that case.
    pub fn add(&mut self, index: u8, freq: u32) -> bool {
        let idx = index as usize;
        if idx >= N {
            return false;
        }

        if freq == 0 {
            self.remove(index);
            return true;
        }

        let band = match self.region.validate_frequency(freq) {
            Some(band) if (band as usize) < MAX_BANDS => band,
            _ => {
                debug!("channel {}: {} Hz rejected by region", index, freq);
                return false;
            }
        };

        if self.channels[idx].is_present() {
            self.remove(index);
        }

        self.channels[idx] = Channel {
            freq,
            band,
            masked: false,
        };
        self.bands[band as usize].num_unmasked += 1;
        self.num_unmasked += 1;

        debug!("channel {}: {} Hz in band {}", index, freq, band);

        if self.num_unmasked == 1 {
            self.cycle_channel();
        }

        true
    }

    /// Add the channels carried in a join accept CFList
    ///
    /// The list holds five 24-bit frequencies in units of 100 Hz, placed at
    /// `first_index` onwards; zero entries are skipped. Returns how many
    /// channels were accepted.
    pub fn apply_cf_list(&mut self, first_index: u8, cf_list: &[u8; 16]) -> usize {
        let mut added = 0;

        for (offset, entry) in cf_list[..15].chunks_exact(3).enumerate() {
            let freq = u32::from_le_bytes([entry[0], entry[1], entry[2], 0]) * 100;
            if freq == 0 {
                continue;
            }
            if self.add(first_index.saturating_add(offset as u8), freq) {
                added += 1;
            }
        }

        added
    }

    /// Remove a channel
    pub fn remove(&mut self, index: u8) {
        let idx = index as usize;
        if idx >= N || !self.channels[idx].is_present() {
            return;
        }

        let channel = self.channels[idx];
        self.channels[idx] = Channel::EMPTY;

        if !channel.masked {
            self.bands[channel.band as usize].num_unmasked -= 1;
            self.num_unmasked -= 1;
        }

        debug!("channel {} removed", index);

        if self.selected_channel() == Some(idx) {
            self.cycle_channel();
        }
    }

    /// Exclude a channel from selection
    ///
    /// Returns false if the slot is out of range or empty.
    pub fn mask(&mut self, index: u8) -> bool {
        let idx = index as usize;
        if idx >= N || !self.channels[idx].is_present() {
            return false;
        }

        let channel = &mut self.channels[idx];
        if !channel.masked {
            channel.masked = true;
            self.bands[channel.band as usize].num_unmasked -= 1;
            self.num_unmasked -= 1;

            debug!("channel {} masked", index);

            if self.selected_channel() == Some(idx) {
                self.cycle_channel();
            }
        }

        true
    }

    /// Make a masked channel selectable again
    ///
    /// Returns false if the slot is out of range or empty.
    pub fn unmask(&mut self, index: u8) -> bool {
        let idx = index as usize;
        if idx >= N || !self.channels[idx].is_present() {
            return false;
        }

        let channel = &mut self.channels[idx];
        if channel.masked {
            channel.masked = false;
            self.bands[channel.band as usize].num_unmasked += 1;
            self.num_unmasked += 1;

            debug!("channel {} unmasked", index);

            if self.num_unmasked == 1 {
                self.cycle_channel();
            }
        }

        true
    }

    /// Set the data rate and power index used for following uplinks
    ///
    /// Values are checked against the region only when a setting is resolved,
    /// so this always returns true.
    pub fn set_rate_and_power(&mut self, rate: u8, power: u8) -> bool {
        self.rate = rate;
        self.power = power;
        true
    }

    /// Set the RX1 data rate offset
    pub fn set_rx1_offset(&mut self, offset: u8) {
        self.rx1_offset = offset;
    }

    /// Set the RX2 frequency and data rate
    pub fn set_rx2(&mut self, freq: u32, rate: u8) {
        self.rx2_freq = freq;
        self.rx2_rate = rate;
    }

    /// Current data rate index
    pub fn rate(&self) -> u8 {
        self.rate
    }

    /// Current power index
    pub fn power(&self) -> u8 {
        self.power
    }

    /// Maximum MACPayload at the current data rate
    pub fn max_payload(&self) -> Option<u8> {
        self.region.data_rate(self.rate).map(|params| params.max_payload)
    }

    /// Milliseconds until the selected sub-band may transmit
    ///
    /// 0 when nothing is selected or the gate is already open.
    pub fn wait_time(&self, now: u64) -> u64 {
        match self.next {
            Some(sel) => self.bands[sel.band].ready_time.saturating_sub(now),
            None => 0,
        }
    }

    /// Non-blocking transmit check
    ///
    /// `WouldBlock` while the duty-cycle gate is closed, [`Exhausted`] if
    /// there is nothing to transmit on.
    pub fn ready(&self, now: u64) -> nb::Result<ChannelSetting, Exhausted> {
        let setting = self.tx_setting().ok_or(nb::Error::Other(Exhausted))?;

        if self.wait_time(now) > 0 {
            return Err(nb::Error::WouldBlock);
        }
        Ok(setting)
    }

    /// Radio setting for the next uplink
    pub fn tx_setting(&self) -> Option<ChannelSetting> {
        let sel = self.next?;
        let params = self.region.data_rate(self.rate)?;

        Some(ChannelSetting {
            freq: self.channels[sel.channel].freq,
            sf: params.sf,
            bw: params.bw,
            cr: CodingRate::Cr5,
            power: self.power,
        })
    }

    /// Radio setting for the first receive window
    ///
    /// Same frequency as the uplink, data rate shifted by the RX1 offset.
    pub fn rx1_setting(&self) -> Option<ChannelSetting> {
        let tx = self.tx_setting()?;
        let rate = self.region.rx1_data_rate(self.rate, self.rx1_offset);
        let params = self.region.data_rate(rate)?;

        Some(ChannelSetting {
            sf: params.sf,
            bw: params.bw,
            ..tx
        })
    }

    /// Radio setting for the second receive window
    ///
    /// Independent of uplink channel selection.
    pub fn rx2_setting(&self) -> Option<ChannelSetting> {
        let params = self.region.data_rate(self.rx2_rate)?;

        Some(ChannelSetting {
            freq: self.rx2_freq,
            sf: params.sf,
            bw: params.bw,
            cr: CodingRate::Cr5,
            power: self.power,
        })
    }

    /// Close the duty-cycle gate of the sub-band just used and move on
    ///
    /// `payload_len` is the PHYPayload length that was transmitted.
    pub fn register_transmission(&mut self, now: u64, payload_len: usize) {
        let sel = match self.next {
            Some(sel) => sel,
            None => return,
        };

        let on_air_us = self
            .tx_setting()
            .map(|setting| time_on_air(&setting, payload_len))
            .unwrap_or(0);
        let factor = self.region.off_time_factor(sel.band as u8);
        let off_time_us = on_air_us as u64 * factor as u64;
        let ready_time = now.saturating_add((off_time_us + 999) / 1000);

        self.bands[sel.band].ready_time = ready_time;

        debug!(
            "tx on channel {}: {} us on air, band {} ready at {}",
            sel.channel, on_air_us, sel.band, ready_time
        );

        self.cycle_channel();
    }

    /// Handle a LinkADRReq
    ///
    /// Nothing is applied yet; every field is answered as not acknowledged.
    pub fn adr_request(&mut self, _rate: u8, _power: u8, _mask: u16, _mask_control: u8) -> AdrAnswer {
        // TODO: apply ChMask/ChMaskCntl through mask()/unmask() and validate rate/power against the region
        AdrAnswer::default()
    }

    /// Configured channel at `index`, if any
    pub fn channel(&self, index: u8) -> Option<Channel> {
        self.channels
            .get(index as usize)
            .copied()
            .filter(Channel::is_present)
    }

    /// Index of the channel the next uplink will use
    pub fn selected_channel(&self) -> Option<usize> {
        self.next.map(|sel| sel.channel)
    }

    /// Sub-band the next uplink will use
    pub fn selected_band(&self) -> Option<usize> {
        self.next.map(|sel| sel.band)
    }

    /// Present and unmasked channels across all sub-bands
    pub fn num_unmasked(&self) -> usize {
        self.num_unmasked
    }

    /// Present and unmasked channels in one sub-band
    pub fn band_num_unmasked(&self, band: usize) -> usize {
        self.bands.get(band).map(|b| b.num_unmasked).unwrap_or(0)
    }

    /// Time at which a sub-band may transmit again
    pub fn band_ready_time(&self, band: usize) -> Option<u64> {
        self.bands.get(band).map(|b| b.ready_time)
    }

    /// Pick the sub-band that opens first, then the next eligible channel in
    /// it after the one used last.
    fn cycle_channel(&mut self) {
        let mut best: Option<(usize, u64)> = None;

        for (index, band) in self.bands.iter().enumerate() {
            if band.num_unmasked == 0 {
                continue;
            }
            if best.map_or(true, |(_, time)| band.ready_time < time) {
                best = Some((index, band.ready_time));
            }
        }

        let band = match best {
            Some((band, _)) => band,
            None => {
                if self.next.take().is_some() {
                    info!("no unmasked channels left");
                }
                return;
            }
        };

        let start = self.bands[band].last_channel.map_or(0, |last| last + 1);
        let found = (0..N)
            .map(|offset| (start + offset) % N)
            .find(|&index| self.channels[index].is_eligible(band));

        debug_assert!(
            found.is_some(),
            "band has unmasked channels but none in the table"
        );

        match found {
            Some(channel) => {
                self.bands[band].last_channel = Some(channel);
                self.next = Some(Selection { band, channel });
                trace!("next channel {} in band {}", channel, band);
            }
            None => {
                error!("band {} claims {} unmasked channels, found none", band, self.bands[band].num_unmasked);
                self.bands[band].last_channel = None;
                self.next = None;
            }
        }
    }
}
