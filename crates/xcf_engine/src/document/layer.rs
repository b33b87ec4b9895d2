use crate::{Channel, Item, PixelData};

/// Layer blend modes, numbered as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum LayerMode {
    #[default]
    Normal = 0,
    Dissolve = 1,
    Behind = 2,
    Multiply = 3,
    Screen = 4,
    Overlay = 5,
    Difference = 6,
    Addition = 7,
    Subtract = 8,
    DarkenOnly = 9,
    LightenOnly = 10,
    Hue = 11,
    Saturation = 12,
    Color = 13,
    Value = 14,
    Divide = 15,
    Dodge = 16,
    Burn = 17,
    Hardlight = 18,
    Softlight = 19,
    GrainExtract = 20,
    GrainMerge = 21,
    ColorErase = 22,
}

impl LayerMode {
    /// Modes the 1.x file format does not know about.
    pub(crate) fn requires_version_2(self) -> bool {
        matches!(
            self,
            LayerMode::Softlight | LayerMode::GrainExtract | LayerMode::GrainMerge | LayerMode::ColorErase
        )
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TextLayerFlags: u32 {
        const DONT_AUTO_RENAME = 0x01;
        const MODIFIED = 0x02;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GroupItemFlags: u32 {
        const EXPANDED = 0x01;
    }
}

/// A layer mask and its three display switches.
#[derive(Debug, Clone)]
pub struct LayerMask {
    pub channel: Channel,
    pub apply: bool,
    pub edit: bool,
    pub show: bool,
}

impl LayerMask {
    pub fn new(channel: Channel) -> Self {
        LayerMask {
            channel,
            apply: true,
            edit: false,
            show: false,
        }
    }
}

/// One layer of the image. A layer owning a `children` list is a group.
#[derive(Debug, Clone, Default)]
pub struct Layer {
    pub item: Item,
    pub mode: LayerMode,
    /// 0.0 to 1.0.
    pub opacity: f64,
    pub has_alpha: bool,
    pub lock_alpha: bool,
    pub pixels: PixelData,
    pub mask: Option<LayerMask>,
    /// `Some` makes this layer a group item, even when the list is empty.
    pub children: Option<Vec<Layer>>,
    /// Whether a group is shown expanded in the layers UI.
    pub expanded: bool,
    /// Non-empty only on text layers.
    pub text_layer_flags: TextLayerFlags,
    /// When this layer is the floating selection: the tattoo of the
    /// drawable it is attached to.
    pub floating_selection: Option<u32>,
}

impl Layer {
    pub fn new(name: impl Into<String>, tattoo: u32, pixels: PixelData) -> Self {
        Layer {
            item: Item::new(name, tattoo),
            opacity: 1.0,
            pixels,
            ..Layer::default()
        }
    }

    pub fn group(name: impl Into<String>, tattoo: u32, pixels: PixelData, children: Vec<Layer>) -> Self {
        Layer {
            children: Some(children),
            expanded: true,
            ..Layer::new(name, tattoo, pixels)
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn is_group(&self) -> bool {
        self.children.is_some()
    }
}
