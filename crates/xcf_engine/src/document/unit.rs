/// Number of builtin units (pixel, inch, mm, point, pica).
pub const N_BUILTIN_UNITS: u32 = 5;

/// A fully user-defined measurement unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UserUnit {
    /// Units per inch.
    pub factor: f32,
    /// Decimal digits shown in the UI.
    pub digits: u32,
    pub identifier: String,
    pub symbol: String,
    pub abbreviation: String,
    pub singular: String,
    pub plural: String,
}

/// The display unit of an image: one of the builtin units by index, or a
/// user-defined unit carried in full.
#[derive(Debug, Clone, PartialEq)]
pub enum Unit {
    Builtin(u32),
    User(UserUnit),
}

impl Default for Unit {
    fn default() -> Self {
        // inch
        Unit::Builtin(1)
    }
}
