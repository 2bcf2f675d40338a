//! Strip configuration: channel order, protocol speed and the SPI clock
//! divider table.
//!
//! The configuration is a single byte, mirroring the way WS2811 drivers have
//! traditionally been configured:
//!
//! - Bits 3-0: [`ChannelOrder`] (only values 0-3 are defined)
//! - Bit 4: [`Speed`] (`0` = 800 kHz, `1` = 400 kHz)
//!
//! # Clock selection
//! Every protocol bit is sent as three SPI bits, so the SPI bit clock must run
//! at exactly three times the protocol frequency. The divider that produces
//! that clock depends on the peripheral bus clock, and only the combinations
//! listed in [`SpiTiming::select`] are supported. The selection is a table
//! lookup done once when the strip is constructed.

use bitfield::bitfield;
use fugit::HertzU32;

use crate::Error;

/// Order in which the three color channels are stored and sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ChannelOrder {
    /// The order documented by the WS2811 datasheet
    Rgb = 0,
    /// Red, blue, green
    Rbg = 1,
    /// Most LED strips and WS2812 are wired this way
    #[default]
    Grb = 2,
    /// Green, blue, red
    Gbr = 3,
}

impl ChannelOrder {
    /// Mask selecting the channel order in a configuration byte.
    pub const MASK: u8 = 0x0f;

    /// All supported channel orders.
    pub const ALL: [ChannelOrder; 4] = [
        ChannelOrder::Rgb,
        ChannelOrder::Rbg,
        ChannelOrder::Grb,
        ChannelOrder::Gbr,
    ];

    /// Decode the channel order from the low nibble of a configuration byte.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits & Self::MASK {
            0 => Some(ChannelOrder::Rgb),
            1 => Some(ChannelOrder::Rbg),
            2 => Some(ChannelOrder::Grb),
            3 => Some(ChannelOrder::Gbr),
            _ => None,
        }
    }

    /// Byte offsets within a stored pixel for the red, green and blue
    /// channels, in that order.
    #[must_use]
    pub const fn offsets(self) -> [usize; 3] {
        match self {
            ChannelOrder::Rgb => [0, 1, 2],
            ChannelOrder::Rbg => [0, 2, 1],
            ChannelOrder::Grb => [1, 0, 2],
            ChannelOrder::Gbr => [2, 0, 1],
        }
    }
}

/// Protocol bit rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Speed {
    /// Nearly all WS2811 run at 800 kHz
    #[default]
    Khz800 = 0x00,
    /// Older 400 kHz pixels (e.g. Flora)
    Khz400 = 0x10,
}

impl Speed {
    /// Mask selecting the speed in a configuration byte.
    pub const MASK: u8 = 0x10;

    /// Protocol bit frequency.
    #[must_use]
    pub const fn frequency(self) -> HertzU32 {
        match self {
            Speed::Khz800 => HertzU32::kHz(800),
            Speed::Khz400 => HertzU32::kHz(400),
        }
    }
}

bitfield! {
    /// Packed strip configuration byte.
    ///
    /// Build it with [`Config::new`] or convert a raw byte with
    /// `Config::try_from(byte)`, which rejects undefined channel orders.
    #[derive(Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Config(u8);
    impl Debug;
    order_bits, set_order_bits: 3, 0;
    slow, set_slow: 4;
}

impl Config {
    /// Create a configuration from its two fields.
    #[must_use]
    pub fn new(order: ChannelOrder, speed: Speed) -> Self {
        let mut config = Self(0);
        config.set_order_bits(order as u8);
        config.set_slow(speed == Speed::Khz400);
        config
    }

    /// The configured channel order.
    #[must_use]
    pub fn order(&self) -> ChannelOrder {
        // only defined orders can be stored, see `new` and `try_from`
        match self.order_bits() & 0x03 {
            0 => ChannelOrder::Rgb,
            1 => ChannelOrder::Rbg,
            2 => ChannelOrder::Grb,
            _ => ChannelOrder::Gbr,
        }
    }

    /// The configured protocol speed.
    #[must_use]
    pub fn speed(&self) -> Speed {
        if self.slow() {
            Speed::Khz400
        } else {
            Speed::Khz800
        }
    }

    /// The raw configuration byte.
    #[must_use]
    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(ChannelOrder::Grb, Speed::Khz800)
    }
}

impl TryFrom<u8> for Config {
    type Error = Error;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        if bits & !(ChannelOrder::MASK | Speed::MASK) != 0 {
            return Err(Error::InvalidConfig);
        }
        let order = ChannelOrder::from_bits(bits).ok_or(Error::InvalidConfig)?;
        let speed = if bits & Speed::MASK == Speed::Khz400 as u8 {
            Speed::Khz400
        } else {
            Speed::Khz800
        };
        Ok(Self::new(order, speed))
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Config {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Config {{ order: {}, speed: {} }}", self.order(), self.speed());
    }
}

/// Peripheral bus clocks the divider table knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusClock {
    /// 48 MHz bus
    Mhz48,
    /// 24 MHz bus
    Mhz24,
}

impl BusClock {
    /// Bus clock frequency.
    #[must_use]
    pub const fn frequency(self) -> HertzU32 {
        match self {
            BusClock::Mhz48 => HertzU32::MHz(48),
            BusClock::Mhz24 => HertzU32::MHz(24),
        }
    }
}

// Baud rate prescaler (PBR) and scaler (BR) divisors, indexed by field value.
const PRESCALER_DIVISORS: [u32; 4] = [2, 3, 5, 7];
const SCALER_DIVISORS: [u32; 16] = [
    2, 4, 6, 8, 16, 32, 64, 128, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768,
];

/// Encoded frames are 12 bits wide, the field holds `size - 1`.
const FRAME_SIZE_FIELD: u32 = 11;

bitfield! {
    /// Clock and transfer attribute register.
    ///
    /// The bit layout is as follows:
    /// - Bit 31: Double baud rate
    /// - Bits 30-27: Frame size minus one
    /// - Bit 26: Clock polarity
    /// - Bit 25: Clock phase
    /// - Bit 24: LSB first
    /// - Bits 17-16: Baud rate prescaler
    /// - Bits 3-0: Baud rate scaler
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    struct Ctar(u32);
    impl Debug;
    pub double_baud_rate, set_double_baud_rate: 31;
    pub frame_size, set_frame_size: 30, 27;
    pub clock_polarity, set_clock_polarity: 26;
    pub clock_phase, set_clock_phase: 25;
    pub lsb_first, set_lsb_first: 24;
    pub prescaler, set_prescaler: 17, 16;
    pub scaler, set_scaler: 3, 0;
}

/// SPI bit clock divider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiTiming {
    prescaler: u8,
    scaler: u8,
}

impl SpiTiming {
    /// Pick the divider that clocks SPI at three times the protocol speed.
    #[must_use]
    pub const fn select(bus: BusClock, speed: Speed) -> Self {
        match (bus, speed) {
            // (48 MHz / 5) / 8 = 1.2 MHz
            (BusClock::Mhz48, Speed::Khz400) => Self { prescaler: 2, scaler: 3 },
            // (48 MHz / 5) / 4 = 2.4 MHz
            (BusClock::Mhz48, Speed::Khz800) => Self { prescaler: 2, scaler: 1 },
            // (24 MHz / 5) / 4 = 1.2 MHz
            (BusClock::Mhz24, Speed::Khz400) => Self { prescaler: 2, scaler: 1 },
            // (24 MHz / 5) / 2 = 2.4 MHz
            (BusClock::Mhz24, Speed::Khz800) => Self { prescaler: 2, scaler: 0 },
        }
    }

    /// Baud rate prescaler field value.
    #[must_use]
    pub const fn prescaler(&self) -> u8 {
        self.prescaler
    }

    /// Baud rate scaler field value.
    #[must_use]
    pub const fn scaler(&self) -> u8 {
        self.scaler
    }

    /// Resulting SPI bit clock for the given bus clock.
    #[must_use]
    pub const fn bit_rate(&self, bus: BusClock) -> HertzU32 {
        let divisor =
            PRESCALER_DIVISORS[self.prescaler as usize] * SCALER_DIVISORS[self.scaler as usize];
        HertzU32::from_raw(bus.frequency().raw() / divisor)
    }

    /// Clock and transfer attribute register value: 12 bit frames, data
    /// captured on the second clock edge, and the selected divider.
    #[must_use]
    pub fn ctar(&self) -> u32 {
        let mut ctar = Ctar(0);
        ctar.set_frame_size(FRAME_SIZE_FIELD);
        ctar.set_clock_phase(true);
        ctar.set_prescaler(u32::from(self.prescaler));
        ctar.set_scaler(u32::from(self.scaler));
        ctar.0
    }
}
