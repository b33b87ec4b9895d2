use crate::Parasite;

/// State shared by every saveable item (layers, channels).
#[derive(Debug, Clone, Default)]
pub struct Item {
    pub name: String,
    /// Persistent unique id within the document.
    pub tattoo: u32,
    pub visible: bool,
    pub linked: bool,
    pub lock_content: bool,
    pub lock_position: bool,
    /// Position of the item within the image canvas.
    pub offset_x: i32,
    pub offset_y: i32,
    pub parasites: Vec<Parasite>,
}

impl Item {
    pub fn new(name: impl Into<String>, tattoo: u32) -> Self {
        Item {
            name: name.into(),
            tattoo,
            visible: true,
            ..Item::default()
        }
    }
}
