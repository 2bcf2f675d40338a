//! Bit encoder and DMA transfer buffer.
//!
//! The WS2811 protocol encodes every bit as a high pulse followed by a low
//! period: a short high pulse for a `0` and a long one for a `1`. Clocking
//! SPI at three times the protocol rate lets each protocol bit be sent as
//! three SPI bits:
//!
//! - a `0` bit is sent as `100`
//! - a `1` bit is sent as `110`
//!
//! A nibble therefore expands to a 12 bit SPI frame and every pixel byte to
//! two frames (high nibble first).
//!
//! # Memory Layout
//! Each pixel contains 3 bytes:
//! `RRRRrrrrGGGGggggBBBBbbbb`
//!
//! These are split into 6 words that are written to the SPI push register:
//!
//! ```text
//! 1000 0000 0000 0000 0000 1R01 R01R 01R0
//! 1000 0000 0000 0000 0000 1r01 r01r 01r0
//! 1000 0000 0000 0000 0000 1G01 G01G 01G0
//! 1000 0000 0000 0000 0000 1g01 g01g 01g0
//! 1000 0000 0000 0000 0000 1B01 B01B 01B0
//! 1000 0000 0000 0000 0000 1b01 b01b 01b0
//! ------------------- ++++ ==============
//! ```
//!
//! Only the low 12 bits (`=`) are shifted out. The next 4 bits (`+`) are
//! ignored. The upper 16 bits (`-`) carry the command half of the push
//! register, which only accepts 32 bit writes.

use bitfield::bitfield;
use embedded_dma::ReadBuffer;

/// Number of transfer words per pixel: three channels, two nibbles each.
pub const WORDS_PER_PIXEL: usize = 6;

/// Number of pixel store bytes per pixel.
pub const BYTES_PER_PIXEL: usize = 3;

/// Map a 4 bit nibble into a 12 bit value to be written to the SPI bus.
///
/// A 0 bit is sent as 0b100 (octal 4), a 1 bit as 0b110 (octal 6).
const NIBBLE_LOOKUP: [u16; 16] = [
    0o4444, 0o4446, 0o4464, 0o4466, 0o4644, 0o4646, 0o4664, 0o4666, //
    0o6444, 0o6446, 0o6464, 0o6466, 0o6644, 0o6646, 0o6664, 0o6666,
];

/// Encode a nibble (only the low 4 bits of `nibble` are used) as a 12 bit
/// serial frame.
#[inline]
#[must_use]
pub const fn encode_nibble(nibble: u8) -> u16 {
    NIBBLE_LOOKUP[(nibble & 0x0f) as usize]
}

bitfield! {
    /// 32-bit word written to the SPI push register.
    ///
    /// The bit layout is as follows:
    /// - Bit 31: Continuous chip select, keeps the frame stream going
    /// - Bits 30-28: Clock and transfer attribute register select
    /// - Bit 27: End of queue
    /// - Bit 26: Clear transfer counter
    /// - Bits 21-16: Peripheral chip selects
    /// - Bits 15-0: Frame data (only the low 12 bits are shifted)
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct PushWord(u32);
    impl Debug;
    /// Keep chip select asserted between frames
    pub continuous, set_continuous: 31;
    /// Clock and transfer attribute register used for the frame
    pub ctas, set_ctas: 30, 28;
    /// Last frame of a queue
    pub end_of_queue, set_end_of_queue: 27;
    /// Reset the transfer counter before this frame
    pub clear_count, set_clear_count: 26;
    /// Chip selects asserted for the frame
    pub pcs, set_pcs: 21, 16;
    /// Frame data
    pub data, set_data: 15, 0;
}

impl PushWord {
    const CONTINUOUS: u32 = 1 << 31;

    /// A data frame using attribute register 0 in continuous mode.
    #[inline]
    #[must_use]
    pub const fn frame(data: u16) -> Self {
        Self(Self::CONTINUOUS | data as u32)
    }

    /// The frame sent while no pixel data is pending, holding the line low.
    #[must_use]
    pub const fn idle() -> Self {
        Self::frame(0)
    }

    /// Raw register value.
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.0
    }
}

/// Encode the pixel store bytes into transfer words.
///
/// Every byte becomes two words, high nibble first. Exactly
/// `pixels.len() * 2` words at the start of `words` are written, the rest
/// are left untouched.
///
/// # Panics
/// Panics if `words` holds fewer than `pixels.len() * 2` words.
pub fn encode(pixels: &[u8], words: &mut [u32]) {
    let words = &mut words[..pixels.len() * 2];
    for (byte, pair) in pixels.iter().zip(words.chunks_exact_mut(2)) {
        pair[0] = PushWord::frame(encode_nibble(byte >> 4)).bits();
        pair[1] = PushWord::frame(encode_nibble(byte & 0x0f)).bits();
    }
}

/// Caller supplied storage for the encoded SPI frames.
///
/// The storage must be reachable by the DMA engine; on parts with tightly
/// coupled memory that usually means placing it in a dedicated DMA section.
/// It is rewritten by [`TransferBuffer::encode`] on every `show` and read by
/// the DMA engine while a transfer is in flight.
pub struct TransferBuffer<'a> {
    words: &'a mut [u32],
    len: usize,
}

impl<'a> TransferBuffer<'a> {
    /// Wrap `words`, with no active words.
    pub fn new(words: &'a mut [u32]) -> Self {
        Self { words, len: 0 }
    }

    /// Number of words the storage can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    /// Number of pixels the storage can hold.
    #[must_use]
    pub fn pixel_capacity(&self) -> usize {
        self.words.len() / WORDS_PER_PIXEL
    }

    /// Number of words the DMA engine transfers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when no words are active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Active words.
    #[must_use]
    pub fn words(&self) -> &[u32] {
        &self.words[..self.len]
    }

    /// Fill the words for `pixels` pixels with the idle frame and make them
    /// the active words.
    pub fn format(&mut self, pixels: usize) {
        self.len = pixels * WORDS_PER_PIXEL;
        self.words[..self.len].fill(PushWord::idle().bits());
    }

    /// Encode `pixels` into the active words, resizing them to match.
    pub fn encode(&mut self, pixels: &[u8]) {
        self.len = pixels.len() * 2;
        encode(pixels, self.words);
    }

    /// Give back the caller's storage.
    pub fn into_inner(self) -> &'a mut [u32] {
        self.words
    }
}

unsafe impl ReadBuffer for TransferBuffer<'_> {
    type Word = u32;

    unsafe fn read_buffer(&self) -> (*const u32, usize) {
        (self.words.as_ptr(), self.len)
    }
}

impl core::fmt::Debug for TransferBuffer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransferBuffer")
            .field("capacity", &self.words.len())
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TransferBuffer<'_> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "TransferBuffer {{ capacity: {}, len: {} }}",
            self.words.len(),
            self.len
        );
    }
}
