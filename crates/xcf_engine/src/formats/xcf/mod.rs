//! The native XCF file format (save only).
//!
//! Wire basics: everything is big-endian; strings are a u32 length
//! (including one NUL byte) followed by the bytes and the NUL, or a bare
//! 0 for the empty string; offset tables are zero-terminated lists of
//! absolute file offsets; property streams are `(tag, length, payload)`
//! records terminated by an END record.

pub(crate) mod constants {
    /// Header tags are written as exactly this many bytes.
    pub const MAGIC_LEN: usize = 14;

    pub const TILE_WIDTH: u32 = 64;
    pub const TILE_HEIGHT: u32 = 64;

    /// Property tags.
    pub mod prop {
        pub const END: u32 = 0;
        pub const COLORMAP: u32 = 1;
        pub const ACTIVE_LAYER: u32 = 2;
        pub const ACTIVE_CHANNEL: u32 = 3;
        pub const SELECTION: u32 = 4;
        pub const FLOATING_SELECTION: u32 = 5;
        pub const OPACITY: u32 = 6;
        pub const MODE: u32 = 7;
        pub const VISIBLE: u32 = 8;
        pub const LINKED: u32 = 9;
        pub const LOCK_ALPHA: u32 = 10;
        pub const APPLY_MASK: u32 = 11;
        pub const EDIT_MASK: u32 = 12;
        pub const SHOW_MASK: u32 = 13;
        pub const SHOW_MASKED: u32 = 14;
        pub const OFFSETS: u32 = 15;
        pub const COLOR: u32 = 16;
        pub const COMPRESSION: u32 = 17;
        pub const GUIDES: u32 = 18;
        pub const RESOLUTION: u32 = 19;
        pub const TATTOO: u32 = 20;
        pub const PARASITES: u32 = 21;
        pub const UNIT: u32 = 22;
        pub const PATHS: u32 = 23;
        pub const USER_UNIT: u32 = 24;
        pub const VECTORS: u32 = 25;
        pub const TEXT_LAYER_FLAGS: u32 = 26;
        pub const SAMPLE_POINTS: u32 = 27;
        pub const LOCK_CONTENT: u32 = 28;
        pub const GROUP_ITEM: u32 = 29;
        pub const ITEM_PATH: u32 = 30;
        pub const GROUP_ITEM_FLAGS: u32 = 31;
        pub const LOCK_POSITION: u32 = 32;
    }

    /// Guide orientation wire codes (not the same numbering as the model).
    pub mod orientation {
        pub const HORIZONTAL: u8 = 1;
        pub const VERTICAL: u8 = 2;
    }

    /// Legacy path point types.
    pub mod compat_point {
        pub const ANCHOR: u32 = 1;
        pub const CONTROL: u32 = 2;
    }

    pub const STROKETYPE_BEZIER: u32 = 1;
}

mod writer;
pub(crate) use writer::{OffsetSlot, OffsetTable, XcfWriter};

mod tiles;

mod rle;

mod props;

mod save;
pub use save::{choose_version, save, save_to_path, save_to_vec, save_with_progress};
