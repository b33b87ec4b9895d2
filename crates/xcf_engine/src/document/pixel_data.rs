use crate::{Result, XcfError};

/// A pixel rectangle in buffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One drawable's pixels, row-major and interleaved.
///
/// The serializer only ever sees the dimensions, the bytes-per-pixel and
/// rectangular reads; how the editing application stores pixels internally
/// (tiles, strips, whatever) is its own business, this is the flattened
/// exchange form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PixelData {
    width: u32,
    height: u32,
    bpp: usize,
    data: Vec<u8>,
}

impl PixelData {
    /// A zero-filled (fully transparent/empty) buffer.
    pub fn new(width: u32, height: u32, bpp: usize) -> Self {
        PixelData {
            width,
            height,
            bpp,
            data: vec![0; width as usize * height as usize * bpp],
        }
    }

    pub fn from_vec(width: u32, height: u32, bpp: usize, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * bpp;
        if data.len() != expected {
            return Err(XcfError::PixelDataLengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(PixelData {
            width,
            height,
            bpp,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bpp(&self) -> usize {
        self.bpp
    }

    /// Append the pixels of `rect` to `out`, row by row.
    ///
    /// The rectangle must lie within the buffer; callers get their
    /// rectangles from the tile geometry helpers which guarantee that.
    pub fn read_rect(&self, rect: Rect, out: &mut Vec<u8>) {
        debug_assert!(rect.x + rect.width <= self.width && rect.y + rect.height <= self.height);
        let row_len = rect.width as usize * self.bpp;
        for y in rect.y..rect.y + rect.height {
            let start = (y as usize * self.width as usize + rect.x as usize) * self.bpp;
            out.extend_from_slice(&self.data[start..start + row_len]);
        }
    }

    /// True when every byte is zero, i.e. the buffer has empty bounds.
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    pub fn fill(&mut self, pixel: &[u8]) {
        debug_assert_eq!(pixel.len(), self.bpp);
        for chunk in self.data.chunks_exact_mut(self.bpp) {
            chunk.copy_from_slice(pixel);
        }
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: &[u8]) {
        debug_assert_eq!(pixel.len(), self.bpp);
        let start = (y as usize * self.width as usize + x as usize) * self.bpp;
        self.data[start..start + self.bpp].copy_from_slice(pixel);
    }
}
