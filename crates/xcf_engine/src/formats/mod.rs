pub mod xcf;
pub use xcf::{choose_version, save, save_to_path, save_to_vec, save_with_progress};

use serde::{Deserialize, Serialize};

/// Tile compression of the pixel data.
///
/// Zlib and fractal compression have reserved codes in the format but were
/// never implemented; selecting them fails the save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Compression {
    None = 0,
    #[default]
    Rle = 1,
    Zlib = 2,
    Fractal = 3,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOptions {
    pub compression: Compression,
}

impl SaveOptions {
    pub const fn new() -> Self {
        SaveOptions {
            compression: Compression::Rle,
        }
    }
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self::new()
    }
}
