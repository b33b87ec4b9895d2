use crate::Parasite;

/// Role of one control point within a bezier stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AnchorKind {
    /// A point the curve passes through.
    Anchor = 0,
    /// A bezier handle.
    Control = 1,
}

/// One control point of a stroke, with the full coordinate axes an input
/// device can produce. Only x/y are serialized (`num_axes` is 2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    pub kind: AnchorKind,
    pub x: f32,
    pub y: f32,
    pub pressure: f32,
    pub xtilt: f32,
    pub ytilt: f32,
    pub wheel: f32,
}

impl ControlPoint {
    pub fn anchor(x: f32, y: f32) -> Self {
        ControlPoint {
            kind: AnchorKind::Anchor,
            x,
            y,
            pressure: 1.0,
            xtilt: 0.5,
            ytilt: 0.5,
            wheel: 0.5,
        }
    }

    pub fn control(x: f32, y: f32) -> Self {
        ControlPoint {
            kind: AnchorKind::Control,
            ..ControlPoint::anchor(x, y)
        }
    }
}

/// One bezier stroke of a path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stroke {
    pub closed: bool,
    pub points: Vec<ControlPoint>,
}

/// A named vector path.
#[derive(Debug, Clone, Default)]
pub struct VectorPath {
    pub name: String,
    pub tattoo: u32,
    pub visible: bool,
    pub linked: bool,
    pub parasites: Vec<Parasite>,
    pub strokes: Vec<Stroke>,
}

impl VectorPath {
    pub fn new(name: impl Into<String>, tattoo: u32) -> Self {
        VectorPath {
            name: name.into(),
            tattoo,
            visible: true,
            ..VectorPath::default()
        }
    }

    /// Whether this path fits the legacy single-polyline encoding
    /// (exactly one bezier stroke).
    pub fn is_legacy_compatible(&self) -> bool {
        self.strokes.len() == 1
    }
}
