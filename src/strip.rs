//! The LED strip: pixel access, lifecycle and transmission.
//!
//! # Example
//! ```rust,ignore
//! use stable_ws2811::{Config, Strip, TransferState};
//!
//! const STRIP_LEN: usize = 60;
//!
//! static STATE: TransferState = TransferState::new();
//! #[link_section = ".dmabuffers"]
//! static mut SPI_BUF: [u32; STRIP_LEN * 6] = [0; STRIP_LEN * 6];
//! static mut PIXEL_BUF: [u8; STRIP_LEN * 3] = [0; STRIP_LEN * 3];
//!
//! let mut strip = Strip::new(
//!     board::Spi0Dma::take(),
//!     board::MICROS,
//!     &STATE,
//!     STRIP_LEN,
//!     unsafe { &mut *core::ptr::addr_of_mut!(SPI_BUF) },
//!     unsafe { &mut *core::ptr::addr_of_mut!(PIXEL_BUF) },
//!     Config::default(),
//! )?;
//! strip.begin();
//! loop {
//!     for i in 0..strip.num_pixels() {
//!         strip.set_pixel(i, stable_ws2811::color(0x10, 0, 0x20));
//!     }
//!     strip.show();
//! }
//! ```

use core::convert::Infallible;

use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::prelude::{OriginDimensions, Size};
use embedded_graphics::Pixel;

use crate::config::{Config, SpiTiming};
use crate::encode::{TransferBuffer, BYTES_PER_PIXEL, WORDS_PER_PIXEL};
use crate::hal::{Clock, Hal};
use crate::pixels::PixelStore;
use crate::transfer::{Phase, TransferEngine, TransferState};
use crate::{pack, unpack, Color, Error, MAX_PIXELS};

/// A WS2811/WS2812 strip driven through SPI and two DMA channels.
///
/// Pixels are written into the caller supplied pixel store and only reach
/// the LEDs when [`Strip::show`] is called. `show` returns as soon as the
/// DMA transfer is armed; [`Strip::busy`] tells whether the next `show`
/// would have to wait.
pub struct Strip<'a, H, C> {
    engine: TransferEngine<'a, H, C>,
    pixels: PixelStore<'a>,
    config: Config,
    capacity: usize,
    len: usize,
}

impl<'a, H, C> Strip<'a, H, C>
where
    H: Hal,
    C: Clock,
{
    /// Create a strip for up to `capacity` pixels.
    ///
    /// `words` must hold at least `capacity * 6` words and live in memory
    /// the DMA engine can read; `pixels` must hold at least `capacity * 3`
    /// bytes. The SPI divider is picked from [`Hal::BUS_CLOCK`] and the
    /// configured speed. The strip starts inactive with all `capacity`
    /// pixels in use.
    ///
    /// # Errors
    /// - [`Error::TooManyPixels`] if `capacity` exceeds [`MAX_PIXELS`]
    /// - [`Error::TransferBufferTooSmall`] if `words` is too short
    /// - [`Error::PixelBufferTooSmall`] if `pixels` is too short
    pub fn new(
        hal: H,
        clock: C,
        state: &'a TransferState,
        capacity: usize,
        words: &'a mut [u32],
        pixels: &'a mut [u8],
        config: Config,
    ) -> Result<Self, Error> {
        if capacity > MAX_PIXELS {
            return Err(Error::TooManyPixels);
        }
        if words.len() < capacity * WORDS_PER_PIXEL {
            return Err(Error::TransferBufferTooSmall);
        }
        if pixels.len() < capacity * BYTES_PER_PIXEL {
            return Err(Error::PixelBufferTooSmall);
        }

        let timing = SpiTiming::select(H::BUS_CLOCK, config.speed());
        Ok(Self {
            engine: TransferEngine::new(hal, clock, state, timing, TransferBuffer::new(words)),
            pixels: PixelStore::new(pixels, config.order()),
            config,
            capacity,
            len: capacity,
        })
    }

    /// Pack three channels into a `0x00RRGGBB` color.
    #[must_use]
    pub const fn color(red: u8, green: u8, blue: u8) -> u32 {
        crate::color(red, green, blue)
    }

    /// Clear the pixels and start the hardware.
    ///
    /// Calling it on an active strip restarts the hardware.
    pub fn begin(&mut self) {
        self.pixels.clear(self.len);
        self.engine.begin(self.len);
        info!("strip started with {} pixels", self.len);
    }

    /// Wait for the current transfer to finish, then stop the hardware.
    ///
    /// Safe to call more than once.
    pub fn end(&mut self) {
        self.engine.end();
    }

    /// Whether the hardware is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.engine.is_active()
    }

    /// Change the number of pixels in use, clamped to the capacity.
    ///
    /// # Errors
    /// [`Error::Active`] if called between `begin` and `end`; the length is
    /// left unchanged.
    pub fn set_strip_len(&mut self, len: usize) -> Result<(), Error> {
        if self.engine.is_active() {
            warn!("strip length can only change while the strip is stopped");
            return Err(Error::Active);
        }
        self.len = len.min(self.capacity);
        Ok(())
    }

    /// Number of pixels in use.
    #[must_use]
    pub fn num_pixels(&self) -> usize {
        self.len
    }

    /// Maximum number of pixels the buffers can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The strip configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        self.config
    }

    /// Set pixel `index` to a packed `0x00RRGGBB` color.
    ///
    /// The index is not checked against [`Strip::num_pixels`]: pixels past
    /// the active length are stored but never sent.
    ///
    /// # Panics
    /// Panics if `index` is not below [`Strip::capacity`].
    #[inline]
    pub fn set_pixel(&mut self, index: usize, color: u32) {
        self.pixels.set(index, color);
    }

    /// Set pixel `index` from separate channels.
    ///
    /// # Panics
    /// Panics if `index` is not below [`Strip::capacity`].
    #[inline]
    pub fn set_pixel_rgb(&mut self, index: usize, red: u8, green: u8, blue: u8) {
        self.set_pixel(index, Self::color(red, green, blue));
    }

    /// Packed color of pixel `index`.
    ///
    /// # Panics
    /// Panics if `index` is not below [`Strip::capacity`].
    #[inline]
    #[must_use]
    pub fn get_pixel(&self, index: usize) -> u32 {
        self.pixels.get(index)
    }

    /// Set pixel `index`, rejecting indices outside the active length.
    ///
    /// # Errors
    /// [`Error::OutOfBounds`] if `index` is not below [`Strip::num_pixels`].
    pub fn try_set_pixel(&mut self, index: usize, color: u32) -> Result<(), Error> {
        if index >= self.len {
            return Err(Error::OutOfBounds);
        }
        self.set_pixel(index, color);
        Ok(())
    }

    /// Packed color of pixel `index`, rejecting indices outside the active
    /// length.
    ///
    /// # Errors
    /// [`Error::OutOfBounds`] if `index` is not below [`Strip::num_pixels`].
    pub fn try_get_pixel(&self, index: usize) -> Result<u32, Error> {
        if index >= self.len {
            return Err(Error::OutOfBounds);
        }
        Ok(self.get_pixel(index))
    }

    /// Set pixel `index` to an `embedded-graphics` color.
    ///
    /// # Panics
    /// Panics if `index` is not below [`Strip::capacity`].
    pub fn set_color(&mut self, index: usize, color: Color) {
        self.set_pixel(index, pack(color));
    }

    /// Color of pixel `index`.
    ///
    /// # Panics
    /// Panics if `index` is not below [`Strip::capacity`].
    #[must_use]
    pub fn color_at(&self, index: usize) -> Color {
        unpack(self.get_pixel(index))
    }

    /// Stored bytes of the active pixels, in channel order.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        self.pixels.bytes(self.len)
    }

    /// Encoded words of the last `show` (or the idle frames after `begin`).
    #[must_use]
    pub fn transfer_words(&self) -> &[u32] {
        self.engine.buffer().words()
    }

    /// Send the pixels to the LEDs.
    ///
    /// Waits for the previous transfer to finish, encodes every active pixel
    /// into the transfer buffer, waits for the LEDs to latch the previous
    /// frame, then arms DMA and returns. On an inactive strip the pixels are
    /// encoded but nothing is sent.
    pub fn show(&mut self) {
        self.engine.show(self.pixels.bytes(self.len));
    }

    /// Whether a transfer is in flight or the LEDs are still latching.
    #[must_use]
    pub fn busy(&self) -> bool {
        self.engine.busy()
    }

    /// Current phase of the transfer cycle.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.engine.phase()
    }

    /// Stop the hardware and give back the peripherals and buffers.
    pub fn release(self) -> (H, C, &'a mut [u32], &'a mut [u8]) {
        let (hal, clock, words) = self.engine.release();
        (hal, clock, words, self.pixels.into_inner())
    }
}

impl<H, C> core::fmt::Debug for Strip<'_, H, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Strip")
            .field("config", &self.config)
            .field("capacity", &self.capacity)
            .field("len", &self.len)
            .field("engine", &self.engine)
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl<H, C> defmt::Format for Strip<'_, H, C> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Strip {{ config: {}, capacity: {}, len: {}, active: {} }}",
            self.config,
            self.capacity,
            self.len,
            self.engine.is_active()
        );
    }
}

impl<H, C> OriginDimensions for Strip<'_, H, C> {
    fn size(&self) -> Size {
        Size::new(self.len as u32, 1)
    }
}

impl<H, C> DrawTarget for Strip<'_, H, C>
where
    H: Hal,
    C: Clock,
{
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.y != 0 || point.x < 0 || point.x as usize >= self.len {
                continue;
            }
            self.set_color(point.x as usize, color);
        }
        Ok(())
    }
}
