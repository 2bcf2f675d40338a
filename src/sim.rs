//! Simulated SPI/DMA backend for host tests.
//!
//! The simulation records every register level call, advances a microsecond
//! clock each time the engine relaxes in a busy-wait, and models the two DMA
//! channels closely enough to check the engine's invariants:
//!
//! - an armed primary channel drains its descriptor after
//!   `major_count * WORD_TIME` microseconds, logs the words it read as one
//!   frame, disables itself and fires the completion handler;
//! - while SPI DMA requests are enabled at least one channel must be able to
//!   answer them, otherwise the line would glitch.

extern crate std;

use std::boxed::Box;
use std::rc::Rc;
use std::vec::Vec;

use core::cell::RefCell;

use crate::config::{BusClock, SpiTiming};
use crate::hal::{Acknowledge, Clock, Descriptor, Hal, Instant, Source};
use crate::transfer::TransferState;

/// Microseconds needed to shift one 12 bit frame at 2.4 MHz.
pub const WORD_TIME: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    PowerUp,
    ConfigureSpi(SpiTiming),
    AttachPin,
    Load(Source, Descriptor),
    SetPriority(Source, u8),
    Route(Source, bool),
    Enable(Source),
    Disable(Source),
    RequestStop(Source),
    ClearStop(Source),
    ClearTxFillFlag,
    SetTxDmaRequests(bool),
    SetCompletionInterrupt(bool),
    PowerDown,
}

#[derive(Default)]
struct Channel {
    descriptor: Option<Descriptor>,
    enabled: bool,
    routed: bool,
    stop_requested: bool,
}

#[derive(Default)]
struct Inner {
    now: u32,
    calls: Vec<Call>,
    channels: [Channel; 2],
    tx_dma: bool,
    irq_enabled: bool,
    armed_at: Option<u32>,
    frames: Vec<Vec<u32>>,
    arms: Vec<u32>,
    completions: Vec<u32>,
    acks: usize,
    state: Option<&'static TransferState>,
}

impl Inner {
    fn channel(&mut self, source: Source) -> &mut Channel {
        match source {
            Source::Primary => &mut self.channels[0],
            Source::Filler => &mut self.channels[1],
        }
    }
}

/// Cloneable handle to one simulated peripheral.
#[derive(Clone, Default)]
pub struct Sim {
    inner: Rc<RefCell<Inner>>,
}

impl Sim {
    pub fn new() -> Self {
        Self::default()
    }

    /// A simulation that reports completions to `state`.
    pub fn with_state(state: &'static TransferState) -> Self {
        let sim = Self::new();
        sim.inner.borrow_mut().state = Some(state);
        sim
    }

    pub fn leak_state() -> &'static TransferState {
        Box::leak(Box::new(TransferState::new()))
    }

    pub fn advance(&self, micros: u32) {
        let mut inner = self.inner.borrow_mut();
        inner.now = inner.now.wrapping_add(micros);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.borrow_mut().calls.clear();
    }

    /// Frames sent by the primary channel, in order.
    pub fn frames(&self) -> Vec<Vec<u32>> {
        self.inner.borrow().frames.clone()
    }

    /// Times the primary channel was armed.
    pub fn arms(&self) -> Vec<u32> {
        self.inner.borrow().arms.clone()
    }

    /// Times the primary channel completed.
    pub fn completions(&self) -> Vec<u32> {
        self.inner.borrow().completions.clone()
    }

    pub fn acks(&self) -> usize {
        self.inner.borrow().acks
    }

    pub fn any_channel_enabled(&self) -> bool {
        self.inner.borrow().channels.iter().any(|c| c.enabled)
    }

    pub fn primary_armed(&self) -> bool {
        self.inner.borrow().armed_at.is_some()
    }

    /// Run the clock until no transfer is in flight.
    pub fn run_until_idle(&self) {
        while self.primary_armed() {
            self.tick();
        }
    }

    /// Advance the clock by one microsecond and let DMA make progress.
    pub fn tick(&self) {
        let finished = {
            let mut inner = self.inner.borrow_mut();
            inner.now = inner.now.wrapping_add(1);

            // a requested stop takes effect on the next request
            for channel in &mut inner.channels {
                if channel.stop_requested {
                    channel.enabled = false;
                }
            }

            if inner.tx_dma {
                assert!(
                    inner.channels.iter().any(|c| c.enabled && c.routed),
                    "SPI requests data but no DMA channel can answer"
                );
            }

            match (inner.armed_at, inner.channels[0].descriptor) {
                (Some(armed_at), Some(descriptor))
                    if inner.now.wrapping_sub(armed_at)
                        >= u32::from(descriptor.major_count) * WORD_TIME =>
                {
                    let words = unsafe {
                        core::slice::from_raw_parts(
                            descriptor.source,
                            usize::from(descriptor.major_count),
                        )
                    };
                    inner.frames.push(words.to_vec());
                    inner.armed_at = None;
                    if descriptor.stop_on_major {
                        inner.channels[0].enabled = false;
                    }
                    let now = inner.now;
                    inner.completions.push(now);
                    descriptor.interrupt_on_major && inner.irq_enabled
                }
                _ => false,
            }
        };

        if finished {
            let state = self.inner.borrow().state;
            if let Some(state) = state {
                let mut ack = self.clone();
                state.on_interrupt(&mut ack, self);
            }
        }
    }

    fn record(&self, call: Call) {
        self.inner.borrow_mut().calls.push(call);
    }
}

impl Hal for Sim {
    const BUS_CLOCK: BusClock = BusClock::Mhz48;

    fn power_up(&mut self) {
        self.record(Call::PowerUp);
    }

    fn configure_spi(&mut self, timing: &SpiTiming) {
        self.record(Call::ConfigureSpi(*timing));
    }

    fn attach_pin(&mut self) {
        self.record(Call::AttachPin);
    }

    fn load(&mut self, source: Source, descriptor: &Descriptor) {
        self.record(Call::Load(source, *descriptor));
        self.inner.borrow_mut().channel(source).descriptor = Some(*descriptor);
    }

    fn set_priority(&mut self, source: Source, priority: u8) {
        self.record(Call::SetPriority(source, priority));
    }

    fn route(&mut self, source: Source, enabled: bool) {
        self.record(Call::Route(source, enabled));
        self.inner.borrow_mut().channel(source).routed = enabled;
    }

    fn enable(&mut self, source: Source) {
        self.record(Call::Enable(source));
        let mut inner = self.inner.borrow_mut();
        inner.channel(source).enabled = true;
        if source == Source::Primary {
            assert!(inner.armed_at.is_none(), "primary armed twice");
            let now = inner.now;
            inner.armed_at = Some(now);
            inner.arms.push(now);
        }
    }

    fn disable(&mut self, source: Source) {
        self.record(Call::Disable(source));
        let mut inner = self.inner.borrow_mut();
        inner.channel(source).enabled = false;
        if source == Source::Primary {
            inner.armed_at = None;
        }
    }

    fn request_stop(&mut self, source: Source) {
        self.record(Call::RequestStop(source));
        self.inner.borrow_mut().channel(source).stop_requested = true;
    }

    fn is_stopped(&mut self, source: Source) -> bool {
        let mut inner = self.inner.borrow_mut();
        let channel = inner.channel(source);
        if channel.stop_requested {
            // a one word major loop finishes on the next request
            channel.enabled = false;
        }
        channel.stop_requested
    }

    fn clear_stop(&mut self, source: Source) {
        self.record(Call::ClearStop(source));
        self.inner.borrow_mut().channel(source).stop_requested = false;
    }

    fn clear_tx_fill_flag(&mut self) {
        self.record(Call::ClearTxFillFlag);
    }

    fn set_tx_dma_requests(&mut self, enabled: bool) {
        self.record(Call::SetTxDmaRequests(enabled));
        self.inner.borrow_mut().tx_dma = enabled;
    }

    fn set_completion_interrupt(&mut self, enabled: bool) {
        self.record(Call::SetCompletionInterrupt(enabled));
        self.inner.borrow_mut().irq_enabled = enabled;
    }

    fn power_down(&mut self) {
        self.record(Call::PowerDown);
    }

    fn relax(&mut self) {
        self.tick();
    }
}

impl Clock for Sim {
    fn now(&self) -> Instant {
        Instant::from_ticks(self.inner.borrow().now)
    }
}

impl Acknowledge for Sim {
    fn acknowledge(&mut self) {
        self.inner.borrow_mut().acks += 1;
    }
}
