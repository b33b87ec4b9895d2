//! Tile geometry over a rectangular pixel buffer.

use crate::Rect;

/// Number of tile rows covering `height` pixels.
pub(crate) fn tile_rows(height: u32, tile_height: u32) -> u32 {
    height.div_ceil(tile_height)
}

/// Number of tile columns covering `width` pixels.
pub(crate) fn tile_cols(width: u32, tile_width: u32) -> u32 {
    width.div_ceil(tile_width)
}

/// Pixel rectangle of the row-major tile `index`, truncated at the buffer
/// edges. `index` must be below `tile_rows * tile_cols`.
pub(crate) fn tile_rect(width: u32, height: u32, tile_width: u32, tile_height: u32, index: u32) -> Rect {
    let cols = tile_cols(width, tile_width);
    debug_assert!(index < tile_rows(height, tile_height) * cols);

    let x = (index % cols) * tile_width;
    let y = (index / cols) * tile_height;
    Rect {
        x,
        y,
        width: tile_width.min(width - x),
        height: tile_height.min(height - y),
    }
}

/// Number of pyramid levels for one axis: halving steps until the size
/// fits a single tile, at least 1.
pub(crate) fn levels(mut size: u32, tile_size: u32) -> u32 {
    let mut levels = 1;
    while size > tile_size {
        size /= 2;
        levels += 1;
    }
    levels
}
