use core::fmt;

/// AES-128 key (16 bytes)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AesKey([u8; 16]);

impl AesKey {
    /// Wrap raw key bytes
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

// Keys never end up in logs.
impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AesKey(..)")
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AesKey {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "AesKey(..)")
    }
}

/// EUI-64 (8 bytes, kept in wire order)
pub type Eui64 = [u8; 8];

/// Device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DevAddr(pub u32);

impl DevAddr {
    /// Address from its little-endian wire bytes
    pub fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }

    /// Little-endian wire bytes
    pub fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl From<u32> for DevAddr {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// The three keys the frame codec may need for a single call.
///
/// Join frames only touch `app_key`; data frames only touch the session keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeySet {
    /// Application key (join request MIC, join accept cipher and MIC)
    pub app_key: AesKey,
    /// Network session key (data MIC, port 0 payload cipher)
    pub nwk_skey: AesKey,
    /// Application session key (application payload cipher)
    pub app_skey: AesKey,
}

impl KeySet {
    /// Key set for a device that has not joined yet
    pub fn join_only(app_key: AesKey) -> Self {
        Self {
            app_key,
            nwk_skey: AesKey::new([0; 16]),
            app_skey: AesKey::new([0; 16]),
        }
    }
}

/// Device activation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActivationState {
    /// Device is not activated
    Idle,
    /// Device is activated through OTAA
    OtaaActivated,
    /// Device is activated through ABP
    AbpActivated,
}

/// Device configuration for both OTAA and ABP activation
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Device EUI (unique device identifier)
    pub dev_eui: Eui64,
    /// Application EUI
    pub app_eui: Eui64,
    /// Application key (used for OTAA)
    pub app_key: AesKey,
    /// Device address (used for ABP)
    pub dev_addr: Option<DevAddr>,
    /// Network session key (used for ABP)
    pub nwk_skey: Option<AesKey>,
    /// Application session key (used for ABP)
    pub app_skey: Option<AesKey>,
}

impl DeviceConfig {
    /// Create a new OTAA device configuration
    pub fn new_otaa(dev_eui: Eui64, app_eui: Eui64, app_key: AesKey) -> Self {
        Self {
            dev_eui,
            app_eui,
            app_key,
            dev_addr: None,
            nwk_skey: None,
            app_skey: None,
        }
    }

    /// Create a new ABP device configuration
    pub fn new_abp(
        dev_eui: Eui64,
        app_eui: Eui64,
        dev_addr: DevAddr,
        nwk_skey: AesKey,
        app_skey: AesKey,
    ) -> Self {
        Self {
            dev_eui,
            app_eui,
            app_key: AesKey::new([0; 16]), // Not used in ABP
            dev_addr: Some(dev_addr),
            nwk_skey: Some(nwk_skey),
            app_skey: Some(app_skey),
        }
    }

    /// Session for an ABP configuration, `None` for OTAA devices
    pub fn abp_session(&self) -> Option<SessionState> {
        match (self.dev_addr, self.nwk_skey, self.app_skey) {
            (Some(addr), Some(nwk), Some(app)) => Some(SessionState::new_abp(addr, nwk, app)),
            _ => None,
        }
    }
}

/// Session state for an activated device
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Current activation state
    pub activation_state: ActivationState,
    /// Device address (assigned during activation)
    pub dev_addr: DevAddr,
    /// Network session key
    pub nwk_skey: AesKey,
    /// Application session key
    pub app_skey: AesKey,
    /// Uplink frame counter
    pub fcnt_up: u32,
    /// Downlink frame counter (next expected value)
    pub fcnt_down: u32,
}

impl SessionState {
    /// Create a new session state for ABP activation
    pub fn new_abp(dev_addr: DevAddr, nwk_skey: AesKey, app_skey: AesKey) -> Self {
        Self {
            activation_state: ActivationState::AbpActivated,
            dev_addr,
            nwk_skey,
            app_skey,
            fcnt_up: 0,
            fcnt_down: 0,
        }
    }

    /// Create a new session state for OTAA activation
    pub fn new_otaa(dev_addr: DevAddr, nwk_skey: AesKey, app_skey: AesKey) -> Self {
        Self {
            activation_state: ActivationState::OtaaActivated,
            ..Self::new_abp(dev_addr, nwk_skey, app_skey)
        }
    }

    /// Keys for the frame codec
    pub fn keys(&self, app_key: AesKey) -> KeySet {
        KeySet {
            app_key,
            nwk_skey: self.nwk_skey,
            app_skey: self.app_skey,
        }
    }

    /// Increment the uplink frame counter
    pub fn increment_fcnt_up(&mut self) {
        self.fcnt_up = self.fcnt_up.wrapping_add(1);
    }

    /// Record an accepted downlink counter
    pub fn accept_fcnt_down(&mut self, counter: u32) {
        self.fcnt_down = counter.wrapping_add(1);
    }
}
