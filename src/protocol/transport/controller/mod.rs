//! Controller configuration handed to the driver at install time, and the
//! install-then-start bring-up sequence.
use crate::error::ControllerError;
use crate::protocol::transport::can_id::CanId;
use crate::protocol::transport::traits::can_controller::CanController;

/// Operating mode of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerMode {
    /// Transmit, receive and acknowledge.
    Normal,
    /// Transmit without requiring an acknowledgement (self test).
    NoAck,
    /// Receive only; never drives the bus.
    ListenOnly,
}

/// Nominal bit rate of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bitrate {
    Kbps125,
    Kbps250,
    #[default]
    Kbps500,
    Mbps1,
}

impl Bitrate {
    /// Bit rate in bits per second.
    pub const fn bits_per_second(&self) -> u32 {
        match self {
            Bitrate::Kbps125 => 125_000,
            Bitrate::Kbps250 => 250_000,
            Bitrate::Kbps500 => 500_000,
            Bitrate::Mbps1 => 1_000_000,
        }
    }
}

/// Pins, mode and driver queue depths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GeneralConfig {
    pub tx_pin: u8,
    pub rx_pin: u8,
    pub mode: ControllerMode,
    pub tx_queue_len: u8,
    pub rx_queue_len: u8,
}

impl GeneralConfig {
    pub const fn new(tx_pin: u8, rx_pin: u8, mode: ControllerMode) -> Self {
        Self {
            tx_pin,
            rx_pin,
            mode,
            tx_queue_len: 5,
            rx_queue_len: 5,
        }
    }
}

impl Default for GeneralConfig {
    /// GPIO27 (TX) / GPIO36 (RX), normal mode.
    fn default() -> Self {
        Self::new(27, 36, ControllerMode::Normal)
    }
}

/// Single-filter acceptance code/mask pair, laid out like the TWAI
/// registers: identifier bits are left aligned, a set mask bit means "don't care".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcceptanceFilter {
    pub code: u32,
    pub mask: u32,
}

impl AcceptanceFilter {
    /// Let every frame through.
    pub const fn accept_all() -> Self {
        Self {
            code: 0,
            mask: u32::MAX,
        }
    }

    /// Only accept frames carrying exactly `id`.
    pub const fn exact(id: CanId) -> Self {
        let (code, id_mask) = Self::align(id);
        Self {
            code,
            mask: !id_mask,
        }
    }

    /// Software evaluation of the filter, mirroring what the hardware accepts.
    pub const fn matches(&self, id: CanId) -> bool {
        let (aligned, id_mask) = Self::align(id);
        (aligned ^ self.code) & !self.mask & id_mask == 0
    }

    // Left-align the identifier the way the acceptance registers expect it.
    const fn align(id: CanId) -> (u32, u32) {
        if id.is_extended() {
            (id.raw() << 3, 0x1FFF_FFFF << 3)
        } else {
            (id.raw() << 21, 0x7FF << 21)
        }
    }
}

impl Default for AcceptanceFilter {
    fn default() -> Self {
        Self::accept_all()
    }
}

/// Everything the driver needs at install time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerConfig {
    pub general: GeneralConfig,
    pub timing: Bitrate,
    pub filter: AcceptanceFilter,
}

impl ControllerConfig {
    /// Override the bit rate.
    pub fn with_timing(mut self, timing: Bitrate) -> Self {
        self.timing = timing;
        self
    }

    /// Override the acceptance filter.
    pub fn with_filter(mut self, filter: AcceptanceFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Override pins and mode.
    pub fn with_general(mut self, general: GeneralConfig) -> Self {
        self.general = general;
        self
    }
}

/// Install the driver with `config`, then start it.
pub fn bring_up<C: CanController>(
    controller: &mut C,
    config: &ControllerConfig,
) -> Result<(), ControllerError<C::Error>> {
    #[cfg(feature = "defmt")]
    defmt::info!(
        "Installing CAN driver: TX={} RX={} @ {} bps",
        config.general.tx_pin,
        config.general.rx_pin,
        config.timing.bits_per_second()
    );

    controller.install(config).map_err(|e| {
        #[cfg(feature = "defmt")]
        defmt::error!("Driver install failed: {:?}", defmt::Debug2Format(&e));
        ControllerError::Install(e)
    })?;

    controller.start().map_err(|e| {
        #[cfg(feature = "defmt")]
        defmt::error!("Driver start failed: {:?}", defmt::Debug2Format(&e));
        ControllerError::Start(e)
    })?;

    #[cfg(feature = "defmt")]
    defmt::info!("CAN controller running");
    Ok(())
}
