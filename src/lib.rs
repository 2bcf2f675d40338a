//! DMA driven WS2811/WS2812 LED strip driver.
//!
//! ## How WS2811 LEDs Work
//!
//! WS2811 (and the WS2812 family built around it) are LEDs with an embedded
//! controller, chained on a single data wire. Each controller takes the first
//! 24 bits it sees, forwards everything after that to the next LED in the
//! chain, and latches the color once the line has been low for long enough.
//!
//! ### Bit encoding
//! - Every bit is a fixed length period that starts high and ends low.
//! - A `0` is a short high pulse, a `1` is a long high pulse.
//! - At 800 kHz a bit lasts 1.25 µs; at 400 kHz (early WS2811 strips) 2.5 µs.
//! - Colors are sent most significant bit first, one byte per channel, in an
//!   order that depends on how the strip was wired (usually GRB).
//!
//! ### Reset / latch
//! Holding the line low for at least [`RESET_TIME`] (50 µs) ends a frame: every
//! LED latches the color it captured and the next bit starts a new frame at
//! the first LED.
//!
//! ### Implications for drivers
//! - Timing is strict at the sub-microsecond level and a stall mid-frame
//!   latches a partial frame.
//! - Bit-banging therefore needs interrupts disabled for the whole frame;
//!   a 300 LED strip at 800 kHz takes 9 ms to send.
//!
//! ## Approach
//!
//! This crate generates the waveform with an SPI peripheral and two DMA
//! channels, so the CPU is free while a frame is on the wire:
//!
//! 1. Each protocol bit is expanded to three SPI bits, `100` for a `0` and
//!    `110` for a `1`, with the SPI clock at three times the protocol rate
//!    (see [`encode`]).
//! 2. Every nibble becomes one 12 bit SPI frame, packed into a 32-bit push
//!    word that also carries the peripheral's "continuous" command bit. A
//!    pixel is therefore six words.
//! 3. A primary DMA channel streams the encoded frame into the SPI peripheral
//!    and raises an interrupt when done. A lower priority filler channel keeps
//!    feeding an all zero frame so the line idles low between frames and the
//!    peripheral never underruns.
//! 4. After the interrupt, the next frame is held back until [`RESET_TIME`]
//!    has passed, so the LEDs always latch.
//!
//! Register access lives behind the [`hal::Hal`] trait, implemented by the
//! board support layer.
//!
//! ## Usage
//!
//! Create a [`Strip`] over caller supplied buffers, call [`Strip::begin`],
//! write pixels and call [`Strip::show`]. The completion interrupt must be
//! forwarded to the strip's [`TransferState`]:
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
//! [`Strip`] also implements `embedded-graphics`' `DrawTarget` as a
//! `len x 1` display, so the usual drawing primitives work on it.
//!
//! ## Available Feature Flags
//!
//! ### `defmt` Feature
//! Implements `defmt::Format` for the public types and routes the driver's
//! log messages through `defmt`.
//!
//! ### `log` Feature
//! Routes the driver's log messages through the `log` crate. Mutually
//! exclusive with `defmt`.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

// MUST be the first module
#[macro_use]
mod fmt;

use embedded_graphics::pixelcolor::{Rgb888, RgbColor};

pub mod config;
pub mod encode;
pub mod hal;
pub mod pixels;
pub mod strip;
pub mod transfer;

#[cfg(test)]
mod sim;

pub use config::{BusClock, ChannelOrder, Config, Speed};
pub use strip::Strip;
pub use transfer::{Phase, TransferState};

/// Color type used by the `embedded-graphics` integration
pub type Color = Rgb888;

/// Minimum time the line must stay low for the LEDs to latch a frame.
pub const RESET_TIME: hal::Duration = hal::Duration::from_ticks(50);

/// Largest transfer, in words, a single DMA major loop can move.
pub const MAX_TRANSFER_WORDS: usize = 0x7fff;

/// Largest strip a single transfer can drive.
pub const MAX_PIXELS: usize = MAX_TRANSFER_WORDS / encode::WORDS_PER_PIXEL;

/// Pack three channels into a `0x00RRGGBB` color.
#[must_use]
pub const fn color(red: u8, green: u8, blue: u8) -> u32 {
    ((red as u32) << 16) | ((green as u32) << 8) | blue as u32
}

/// Pack an `embedded-graphics` color.
#[must_use]
pub fn pack(color: Color) -> u32 {
    self::color(color.r(), color.g(), color.b())
}

/// Unpack a `0x00RRGGBB` color, ignoring the top byte.
#[must_use]
pub fn unpack(color: u32) -> Color {
    Color::new((color >> 16) as u8, (color >> 8) as u8, color as u8)
}

/// Errors reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The pixel buffer holds fewer than `capacity * 3` bytes
    PixelBufferTooSmall,
    /// The transfer buffer holds fewer than `capacity * 6` words
    TransferBufferTooSmall,
    /// The strip needs more words than one DMA transfer can move
    TooManyPixels,
    /// A configuration byte names an undefined channel order or sets
    /// reserved bits
    InvalidConfig,
    /// A pixel index is past the end of the strip
    OutOfBounds,
    /// The operation is not allowed while the strip is running
    Active,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::PixelBufferTooSmall => f.write_str("pixel buffer too small"),
            Error::TransferBufferTooSmall => f.write_str("transfer buffer too small"),
            Error::TooManyPixels => write!(f, "strip longer than {MAX_PIXELS} pixels"),
            Error::InvalidConfig => f.write_str("invalid configuration byte"),
            Error::OutOfBounds => f.write_str("pixel index out of bounds"),
            Error::Active => f.write_str("strip is active"),
        }
    }
}

impl core::error::Error for Error {}
