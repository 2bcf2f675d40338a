//! Hardware abstraction used by the transfer engine.
//!
//! The engine drives one SPI peripheral and two DMA channels that both
//! answer the SPI "transmit FIFO fill" request:
//!
//! - the [`Source::Primary`] channel streams the transfer buffer and raises
//!   the completion interrupt when its major loop finishes;
//! - the [`Source::Filler`] channel repeatedly writes a single idle frame so
//!   the peripheral never runs dry between frames.
//!
//! The primary channel has the higher arbitration priority, so whenever it is
//! armed it wins every request and the filler only runs when there is no
//! pixel data pending. A board support crate implements [`Hal`] on top of its
//! register access layer; the engine never touches raw addresses itself.

use fugit::{MicrosDurationU32, TimerInstantU32};

use crate::config::{BusClock, SpiTiming};

/// Microsecond timestamp.
pub type Instant = TimerInstantU32<1_000_000>;

/// Microsecond duration.
pub type Duration = MicrosDurationU32;

/// One of the two DMA sources feeding the SPI peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Source {
    /// Pixel data, highest priority.
    Primary,
    /// Constant idle frame, lowest priority.
    Filler,
}

impl Source {
    /// Arbitration priority; larger values win.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Source::Primary => 2,
            Source::Filler => 1,
        }
    }
}

/// Transfer control descriptor for one DMA source.
///
/// Every minor loop moves one 32-bit word from `source` to the SPI push
/// register. The destination is fixed and known to the [`Hal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    /// First word to read.
    pub source: *const u32,
    /// Bytes added to the source address after every word.
    pub source_offset: i16,
    /// Bytes added to the source address when the major loop completes.
    pub last_source_adjustment: i32,
    /// Words per major loop.
    pub major_count: u16,
    /// Raise the completion interrupt when the major loop completes.
    pub interrupt_on_major: bool,
    /// Stop accepting requests when the major loop completes.
    pub stop_on_major: bool,
}

impl Descriptor {
    /// Stream `len` words starting at `source`, rewinding to the start after
    /// the last word so the same buffer can be re-armed without reloading.
    #[must_use]
    pub fn stream(source: *const u32, len: u16) -> Self {
        let word = core::mem::size_of::<u32>() as i16;
        Self {
            source,
            source_offset: word,
            last_source_adjustment: -(i32::from(len) * i32::from(word)),
            major_count: len,
            interrupt_on_major: true,
            stop_on_major: true,
        }
    }

    /// Write the word at `source` once per request, forever.
    #[must_use]
    pub fn repeat(source: *const u32) -> Self {
        Self {
            source,
            source_offset: 0,
            last_source_adjustment: 0,
            major_count: 1,
            interrupt_on_major: false,
            stop_on_major: false,
        }
    }
}

/// Register level operations the transfer engine needs.
///
/// Every method is a plain register update that cannot fail once the
/// peripheral clocks are running.
pub trait Hal {
    /// Frequency of the bus clocking the SPI peripheral.
    const BUS_CLOCK: BusClock;

    /// Enable the SPI, DMA and DMA multiplexer clocks.
    fn power_up(&mut self);

    /// Configure the SPI peripheral as a master with continuous clock and
    /// the frame format and divider in `timing` (see [`SpiTiming::ctar`]),
    /// then enable it.
    fn configure_spi(&mut self, timing: &SpiTiming);

    /// Connect the SPI data output to the LED pin.
    fn attach_pin(&mut self);

    /// Load a transfer control descriptor into a source's channel.
    ///
    /// The channel's stop request and done status are left as they are;
    /// the engine clears them with [`Hal::clear_stop`].
    fn load(&mut self, source: Source, descriptor: &Descriptor);

    /// Set a source's arbitration priority.
    fn set_priority(&mut self, source: Source, priority: u8);

    /// Route (or un-route) the SPI transmit request to a source's channel.
    fn route(&mut self, source: Source, enabled: bool);

    /// Let a source's channel accept requests.
    fn enable(&mut self, source: Source);

    /// Stop a source's channel from accepting requests.
    fn disable(&mut self, source: Source);

    /// Ask a source's channel to stop once its current major loop completes.
    fn request_stop(&mut self, source: Source);

    /// Whether a source's channel has completed its major loop.
    fn is_stopped(&mut self, source: Source) -> bool;

    /// Undo [`Hal::request_stop`] and clear the channel's done status.
    fn clear_stop(&mut self, source: Source);

    /// Clear the SPI "transmit FIFO fill" flag so it is re-evaluated.
    fn clear_tx_fill_flag(&mut self);

    /// Enable or disable SPI transmit DMA requests.
    fn set_tx_dma_requests(&mut self, enabled: bool);

    /// Unmask or mask the primary channel's completion interrupt.
    fn set_completion_interrupt(&mut self, enabled: bool);

    /// Disable the SPI peripheral, return the pin to GPIO and gate the
    /// clocks again.
    fn power_down(&mut self);

    /// Called on every iteration of a busy-wait.
    fn relax(&mut self) {
        core::hint::spin_loop();
    }
}

/// Free running microsecond clock.
pub trait Clock {
    /// Current time.
    fn now(&self) -> Instant;
}

impl<C: Clock> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Acknowledges the primary channel's completion interrupt.
pub trait Acknowledge {
    /// Clear the pending completion interrupt.
    fn acknowledge(&mut self);
}

/// Time elapsed from `earlier` to `now`, correct across counter wraparound.
#[inline]
#[must_use]
pub fn elapsed(earlier: Instant, now: Instant) -> Duration {
    Duration::from_ticks(now.ticks().wrapping_sub(earlier.ticks()))
}
