//! The in-memory document model the serializer walks.
//!
//! Everything in here is plain read-only data as far as the save engine is
//! concerned: the editing application builds an [`Image`] (or keeps one
//! around) and hands it to [`crate::formats::xcf`] for encoding.

mod item;
pub use item::*;

mod layer;
pub use layer::*;

mod channel;
pub use channel::*;

mod pixel_data;
pub use pixel_data::*;

mod parasite;
pub use parasite::*;

mod guide;
pub use guide::*;

mod path;
pub use path::*;

mod unit;
pub use unit::*;

/// Base color mode of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum BaseType {
    #[default]
    Rgb = 0,
    Gray = 1,
    Indexed = 2,
}

/// Per-channel storage precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum Precision {
    #[default]
    U8 = 0,
    U16 = 1,
    U32 = 2,
    Half = 3,
    Float = 4,
}

/// A complete image document: canvas, layer tree, channels and metadata.
///
/// Layers form a tree, `layers` holds the top-level stack in stacking order
/// and group layers own their children. Channels are a flat list. The
/// selection mask is kept separately and only serialized when it has
/// non-empty bounds.
#[derive(Debug, Clone, Default)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub base_type: BaseType,
    pub precision: Precision,

    /// RGB triples, only meaningful in indexed mode.
    pub colormap: Option<Vec<[u8; 3]>>,

    pub layers: Vec<Layer>,
    pub channels: Vec<Channel>,
    pub selection: Option<Channel>,

    /// Tattoo of the active layer, if any.
    pub active_layer: Option<u32>,
    /// Tattoo of the active channel, if any.
    pub active_channel: Option<u32>,

    pub xresolution: f64,
    pub yresolution: f64,
    pub unit: Unit,

    /// Monotonic counter used to mint item tattoos.
    pub tattoo_state: u32,

    pub guides: Vec<Guide>,
    pub sample_points: Vec<SamplePoint>,
    pub grid: Option<Grid>,
    pub parasites: Vec<Parasite>,

    pub paths: Vec<VectorPath>,
    pub active_path: Option<usize>,
}

impl Image {
    pub fn new(width: u32, height: u32, base_type: BaseType) -> Self {
        Image {
            width,
            height,
            base_type,
            xresolution: 72.0,
            yresolution: 72.0,
            ..Image::default()
        }
    }

    /// Mint a fresh tattoo, advancing the document's tattoo state.
    pub fn next_tattoo(&mut self) -> u32 {
        self.tattoo_state += 1;
        self.tattoo_state
    }

    /// All layers in document order (groups before their children), each
    /// paired with its root-to-leaf child-index path.
    pub fn layer_list(&self) -> Vec<(&Layer, Vec<u32>)> {
        fn walk<'a>(layers: &'a [Layer], prefix: &[u32], out: &mut Vec<(&'a Layer, Vec<u32>)>) {
            for (i, layer) in layers.iter().enumerate() {
                let mut path = prefix.to_vec();
                path.push(i as u32);
                out.push((layer, path.clone()));
                if let Some(children) = &layer.children {
                    walk(children, &path, out);
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.layers, &[], &mut out);
        out
    }
}
