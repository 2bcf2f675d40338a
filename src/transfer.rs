//! Transfer engine: encodes the pixel store, arms DMA and tracks completion.
//!
//! # Shared state
//! The only state shared between the application and the DMA completion
//! interrupt is kept in a [`TransferState`]: whether a transfer is in
//! flight, and when the last one finished. It is normally a `static` so the
//! interrupt handler can reach it:
//!
//! ```rust,ignore
//! static STATE: TransferState = TransferState::new();
//!
//! #[interrupt]
//! fn DMA_CH1() {
//!     STATE.on_interrupt(&mut board::DmaCompletion, &board::MICROS);
//! }
//! ```
//!
//! Every application side update of that state happens inside a
//! `critical_section`, so it cannot race the completion handler.
//!
//! # Waits
//! [`TransferEngine::show`] and [`TransferEngine::end`] block until the
//! hardware is ready. The waits have no timeout: a DMA engine that never
//! completes hangs the caller rather than letting a corrupted frame out.

use core::cell::Cell;

use critical_section::{CriticalSection, Mutex};
use embedded_dma::ReadBuffer;

use crate::config::SpiTiming;
use crate::encode::{PushWord, TransferBuffer};
use crate::hal::{elapsed, Acknowledge, Clock, Descriptor, Hal, Instant, Source};
use crate::RESET_TIME;

/// Where the engine is in its transfer cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Ready to start a transfer.
    Idle,
    /// DMA is streaming the transfer buffer.
    Transferring,
    /// The last transfer finished less than [`RESET_TIME`] ago and the LEDs
    /// have not latched yet.
    Settling,
}

#[derive(Debug, Clone, Copy)]
struct Status {
    in_progress: bool,
    completed_at: Instant,
}

/// State shared between the application and the completion interrupt.
///
/// It also holds the idle frame the filler DMA channel reads, so it must be
/// placed in memory the DMA engine can reach.
pub struct TransferState {
    status: Mutex<Cell<Status>>,
    idle: u32,
}

impl TransferState {
    /// Create the state for an idle engine.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            status: Mutex::new(Cell::new(Status {
                in_progress: false,
                completed_at: Instant::from_ticks(0),
            })),
            idle: PushWord::idle().bits(),
        }
    }

    fn status(&self) -> Status {
        critical_section::with(|cs| self.status.borrow(cs).get())
    }

    /// Whether a transfer is in flight.
    #[must_use]
    pub fn transfer_pending(&self) -> bool {
        self.status().in_progress
    }

    /// Whether at least [`RESET_TIME`] has passed since the last completion.
    #[must_use]
    pub fn settle_elapsed(&self, now: Instant) -> bool {
        elapsed(self.status().completed_at, now) >= RESET_TIME
    }

    /// Phase of the transfer cycle at `now`.
    ///
    /// `now` must not be older than the last completion; use
    /// [`TransferState::current_phase`] when reading a live clock.
    #[must_use]
    pub fn phase(&self, now: Instant) -> Phase {
        Self::phase_of(self.status(), now)
    }

    /// Phase of the transfer cycle, sampling `clock` after the shared status
    /// so a completion landing in between cannot appear to be in the future.
    #[must_use]
    pub fn current_phase<C: Clock>(&self, clock: &C) -> Phase {
        let status = self.status();
        Self::phase_of(status, clock.now())
    }

    fn phase_of(status: Status, now: Instant) -> Phase {
        if status.in_progress {
            Phase::Transferring
        } else if elapsed(status.completed_at, now) < RESET_TIME {
            Phase::Settling
        } else {
            Phase::Idle
        }
    }

    /// Whether a transfer is in flight or the LEDs are still latching at
    /// `now`.
    #[must_use]
    pub fn busy(&self, now: Instant) -> bool {
        self.phase(now) != Phase::Idle
    }

    /// Whether a transfer is in flight or the LEDs are still latching,
    /// sampling `clock` after the shared status.
    #[must_use]
    pub fn is_busy<C: Clock>(&self, clock: &C) -> bool {
        self.current_phase(clock) != Phase::Idle
    }

    /// Time the last transfer completed.
    #[must_use]
    pub fn completed_at(&self) -> Instant {
        self.status().completed_at
    }

    /// Record that the primary channel finished its transfer at `at`.
    pub fn complete(&self, at: Instant) {
        critical_section::with(|cs| {
            self.status.borrow(cs).set(Status {
                in_progress: false,
                completed_at: at,
            });
        });
    }

    /// Completion interrupt handler: acknowledge the interrupt, then record
    /// the completion time.
    pub fn on_interrupt<A, C>(&self, ack: &mut A, clock: &C)
    where
        A: Acknowledge,
        C: Clock,
    {
        ack.acknowledge();
        self.complete(clock.now());
    }

    fn set_in_progress(&self, cs: CriticalSection<'_>, in_progress: bool) {
        let cell = self.status.borrow(cs);
        let mut status = cell.get();
        status.in_progress = in_progress;
        cell.set(status);
    }

    fn idle_word(&self) -> *const u32 {
        &self.idle
    }
}

impl Default for TransferState {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for TransferState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let status = self.status();
        f.debug_struct("TransferState")
            .field("in_progress", &status.in_progress)
            .field("completed_at", &status.completed_at.ticks())
            .finish()
    }
}

/// Drives the SPI peripheral and the two DMA channels.
pub struct TransferEngine<'a, H, C> {
    hal: H,
    clock: C,
    state: &'a TransferState,
    timing: SpiTiming,
    buffer: TransferBuffer<'a>,
    active: bool,
}

impl<'a, H, C> TransferEngine<'a, H, C>
where
    H: Hal,
    C: Clock,
{
    /// Create an inactive engine.
    pub fn new(
        hal: H,
        clock: C,
        state: &'a TransferState,
        timing: SpiTiming,
        buffer: TransferBuffer<'a>,
    ) -> Self {
        Self {
            hal,
            clock,
            state,
            timing,
            buffer,
            active: false,
        }
    }

    /// Whether `begin` has run without a matching `end`.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The transfer buffer.
    #[must_use]
    pub fn buffer(&self) -> &TransferBuffer<'a> {
        &self.buffer
    }

    /// Current time from the engine's clock.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Whether DMA is streaming the transfer buffer.
    #[must_use]
    pub fn transfer_pending(&self) -> bool {
        self.state.transfer_pending()
    }

    /// Whether the LEDs have had time to latch the last frame.
    #[must_use]
    pub fn settle_elapsed(&self) -> bool {
        self.current_phase() == Phase::Idle
    }

    /// Whether a new frame would have to wait.
    #[must_use]
    pub fn busy(&self) -> bool {
        self.state.is_busy(&self.clock)
    }

    /// Current phase of the transfer cycle.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.current_phase()
    }

    fn current_phase(&self) -> Phase {
        self.state.current_phase(&self.clock)
    }

    fn wait_for_transfer(&mut self) {
        while self.transfer_pending() {
            self.hal.relax();
        }
    }

    fn wait_for_settle(&mut self) {
        while !self.settle_elapsed() {
            self.hal.relax();
        }
    }

    /// Bring up the SPI peripheral and DMA channels for `pixels` pixels.
    ///
    /// The transfer buffer is filled with idle frames and the filler channel
    /// is armed, so the line is driven low as soon as SPI requests data. An
    /// already active engine is shut down first.
    pub fn begin(&mut self, pixels: usize) {
        if self.active {
            self.end();
        }
        self.buffer.format(pixels);

        self.hal.power_up();
        self.hal.configure_spi(&self.timing);
        self.hal.attach_pin();

        let (source, len) = unsafe { self.buffer.read_buffer() };
        debug_assert!(len <= usize::from(u16::MAX));
        let primary = Descriptor::stream(source, len as u16);
        self.hal.load(Source::Primary, &primary);
        self.hal
            .load(Source::Filler, &Descriptor::repeat(self.state.idle_word()));

        for source in [Source::Primary, Source::Filler] {
            self.hal.set_priority(source, source.priority());
            self.hal.route(source, true);
        }

        self.hal.set_completion_interrupt(true);
        self.hal.enable(Source::Filler);
        self.hal.set_tx_dma_requests(true);

        self.active = true;
        debug!("transfer engine started: {} pixels, {} words", pixels, len);
    }

    /// Wait for any transfer in flight, then stop both channels and power
    /// the peripheral down. Does nothing when the engine is not active.
    pub fn end(&mut self) {
        if !self.active {
            return;
        }
        self.wait_for_transfer();

        let hal = &mut self.hal;
        let state = self.state;
        critical_section::with(|cs| {
            state.set_in_progress(cs, false);

            hal.request_stop(Source::Filler);
            while !hal.is_stopped(Source::Filler) {
                core::hint::spin_loop();
            }

            hal.clear_tx_fill_flag();
            hal.disable(Source::Primary);
            hal.disable(Source::Filler);
            hal.clear_stop(Source::Filler);
            hal.set_tx_dma_requests(false);
            hal.set_completion_interrupt(false);
            hal.route(Source::Primary, false);
            hal.route(Source::Filler, false);
            hal.power_down();
        });

        self.active = false;
        debug!("transfer engine stopped");
    }

    /// Encode `pixels` and start sending them.
    ///
    /// Blocks while a previous transfer is in flight, encodes, then blocks
    /// until the LEDs have latched the previous frame before arming DMA. It
    /// returns as soon as DMA is armed.
    pub fn show(&mut self, pixels: &[u8]) {
        self.wait_for_transfer();
        self.buffer.encode(pixels);

        if !self.active {
            warn!("show called on an inactive strip, frame not sent");
            return;
        }
        if self.buffer.is_empty() {
            return;
        }

        self.wait_for_settle();
        self.arm();
        trace!("transfer armed: {} words", self.buffer.len());
    }

    fn arm(&mut self) {
        let hal = &mut self.hal;
        let state = self.state;
        critical_section::with(|cs| {
            state.set_in_progress(cs, true);

            // The filler's last request does not always update the fill
            // flag, so park it and clear the flag before handing over.
            hal.request_stop(Source::Filler);
            while !hal.is_stopped(Source::Filler) {
                core::hint::spin_loop();
            }
            hal.clear_tx_fill_flag();

            hal.clear_stop(Source::Filler);
            hal.enable(Source::Primary);
            hal.enable(Source::Filler);
        });
    }

    /// Shut down and give back the hardware, clock and transfer storage.
    pub fn release(mut self) -> (H, C, &'a mut [u32]) {
        self.end();
        (self.hal, self.clock, self.buffer.into_inner())
    }
}

impl<H, C> core::fmt::Debug for TransferEngine<'_, H, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransferEngine")
            .field("active", &self.active)
            .field("timing", &self.timing)
            .field("buffer", &self.buffer)
            .field("state", self.state)
            .finish()
    }
}
