//! Pixel store with channel order translation.
//!
//! Colors are handled as packed `0x00RRGGBB` values. The store keeps three
//! bytes per pixel in the order the LEDs expect them, as selected by the
//! strip's [`ChannelOrder`].

use crate::config::ChannelOrder;
use crate::encode::BYTES_PER_PIXEL;

/// Write the packed `color` into a stored pixel.
///
/// # Panics
/// Panics if `pixel` is shorter than three bytes.
#[inline]
pub fn write(order: ChannelOrder, pixel: &mut [u8], color: u32) {
    let [r, g, b] = order.offsets();
    pixel[r] = (color >> 16) as u8;
    pixel[g] = (color >> 8) as u8;
    pixel[b] = color as u8;
}

/// Read a stored pixel back as a packed color.
///
/// # Panics
/// Panics if `pixel` is shorter than three bytes.
#[inline]
#[must_use]
pub fn read(order: ChannelOrder, pixel: &[u8]) -> u32 {
    let [r, g, b] = order.offsets();
    (u32::from(pixel[r]) << 16) | (u32::from(pixel[g]) << 8) | u32::from(pixel[b])
}

/// Caller supplied storage for pixel colors.
pub struct PixelStore<'a> {
    bytes: &'a mut [u8],
    order: ChannelOrder,
}

impl<'a> PixelStore<'a> {
    /// Wrap `bytes`, storing pixels in `order`.
    pub fn new(bytes: &'a mut [u8], order: ChannelOrder) -> Self {
        Self { bytes, order }
    }

    /// Channel order used for every pixel.
    #[must_use]
    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    /// Number of pixels the storage can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len() / BYTES_PER_PIXEL
    }

    /// Set pixel `index` to the packed `color`.
    ///
    /// # Panics
    /// Panics if `index` is past the end of the storage.
    #[inline]
    pub fn set(&mut self, index: usize, color: u32) {
        let start = index * BYTES_PER_PIXEL;
        write(self.order, &mut self.bytes[start..start + BYTES_PER_PIXEL], color);
    }

    /// Packed color of pixel `index`.
    ///
    /// # Panics
    /// Panics if `index` is past the end of the storage.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> u32 {
        let start = index * BYTES_PER_PIXEL;
        read(self.order, &self.bytes[start..start + BYTES_PER_PIXEL])
    }

    /// Raw bytes of the first `pixels` pixels.
    #[must_use]
    pub fn bytes(&self, pixels: usize) -> &[u8] {
        &self.bytes[..pixels * BYTES_PER_PIXEL]
    }

    /// Zero the first `pixels` pixels.
    pub fn clear(&mut self, pixels: usize) {
        self.bytes[..pixels * BYTES_PER_PIXEL].fill(0);
    }

    /// Give back the caller's storage.
    pub fn into_inner(self) -> &'a mut [u8] {
        self.bytes
    }
}

impl core::fmt::Debug for PixelStore<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PixelStore")
            .field("capacity", &self.capacity())
            .field("order", &self.order)
            .finish()
    }
}
