use crate::Parasite;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideOrientation {
    Horizontal,
    Vertical,
    /// Guides that lost their orientation (e.g. through a buggy plug-in)
    /// are skipped on save with a warning.
    Unknown,
}

/// A horizontal or vertical guide line across the whole canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guide {
    /// Pixel position on the perpendicular axis.
    pub position: i32,
    pub orientation: GuideOrientation,
}

/// A color sample point on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplePoint {
    pub x: i32,
    pub y: i32,
}

/// The canvas grid. Serialized as a persistent parasite on the image.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub xspacing: f64,
    pub yspacing: f64,
    pub xoffset: f64,
    pub yoffset: f64,
}

impl Default for Grid {
    fn default() -> Self {
        Grid {
            xspacing: 10.0,
            yspacing: 10.0,
            xoffset: 0.0,
            yoffset: 0.0,
        }
    }
}

impl Grid {
    /// The parasite name readers look the grid up under.
    pub const PARASITE_NAME: &'static str = "picman-image-grid";

    pub fn to_parasite(&self) -> Parasite {
        let text = format!(
            "(xspacing {})\n(yspacing {})\n(xoffset {})\n(yoffset {})\n",
            self.xspacing, self.yspacing, self.xoffset, self.yoffset
        );
        Parasite::persistent(Self::PARASITE_NAME, text.into_bytes())
    }
}
