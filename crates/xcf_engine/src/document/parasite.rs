bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ParasiteFlags: u32 {
        /// Saved into the file; transient parasites are dropped on save.
        const PERSISTENT = 0x01;
        const UNDOABLE = 0x02;
    }
}

/// A named, flagged binary metadata blob attachable to the image or an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parasite {
    pub name: String,
    pub flags: ParasiteFlags,
    pub data: Vec<u8>,
}

impl Parasite {
    pub fn new(name: impl Into<String>, flags: ParasiteFlags, data: Vec<u8>) -> Self {
        Parasite {
            name: name.into(),
            flags,
            data,
        }
    }

    pub fn persistent(name: impl Into<String>, data: Vec<u8>) -> Self {
        Parasite::new(name, ParasiteFlags::PERSISTENT, data)
    }

    pub fn is_persistent(&self) -> bool {
        self.flags.contains(ParasiteFlags::PERSISTENT)
    }
}
