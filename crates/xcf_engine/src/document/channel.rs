use crate::{Item, PixelData};

/// A channel: a single-plane mask with a display color. Layer masks and
/// the selection mask are channels too.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    pub item: Item,
    /// 0.0 to 1.0.
    pub opacity: f64,
    /// Display color used to paint the masked area.
    pub color: [u8; 3],
    /// Invert the overlay: show masked areas instead of selected ones.
    pub show_masked: bool,
    pub pixels: PixelData,
}

impl Channel {
    pub fn new(name: impl Into<String>, tattoo: u32, pixels: PixelData) -> Self {
        Channel {
            item: Item::new(name, tattoo),
            opacity: 0.5,
            pixels,
            ..Channel::default()
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}
