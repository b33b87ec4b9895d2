//! Property record serialization.
//!
//! A property record is a u32 tag, a u32 payload length in bytes and the
//! payload. Image, layer and channel records each carry a property stream
//! ending in an END record. Fixed-size payloads write their length up
//! front; the list-shaped ones (parasites, paths, vectors) reserve the
//! length field and backpatch it once the payload has been written.

use std::io::{Seek, Write};

use crate::formats::xcf::constants::{orientation, prop};
use crate::formats::xcf::save::SaveSession;
use crate::formats::xcf::OffsetSlot;
use crate::{
    Compression, GroupItemFlags, Guide, GuideOrientation, Image, LayerMode, Parasite, Result, SamplePoint,
    TextLayerFlags, UserUnit,
};

const MIN_RESOLUTION: f64 = 5e-3;
const MAX_RESOLUTION: f64 = 65536.0;

/// One property record, borrowing its payload from the document.
pub(super) enum Property<'a> {
    End,
    Colormap(&'a [[u8; 3]]),
    ActiveLayer,
    ActiveChannel,
    Selection,
    /// Payload is the file offset of the attached drawable, which is not
    /// known yet when the property is written; a slot is reserved on the
    /// session and patched when that drawable is saved.
    FloatingSelection,
    Opacity(f64),
    Mode(LayerMode),
    Visible(bool),
    Linked(bool),
    LockAlpha(bool),
    ApplyMask(bool),
    EditMask(bool),
    ShowMask(bool),
    ShowMasked(bool),
    Offsets(i32, i32),
    Color([u8; 3]),
    Compression(Compression),
    Guides(&'a [Guide]),
    Resolution(f64, f64),
    Tattoo(u32),
    Parasites(&'a [Parasite]),
    Unit(u32),
    Paths(&'a Image),
    UserUnit(&'a UserUnit),
    Vectors(&'a Image),
    TextLayerFlags(TextLayerFlags),
    SamplePoints(&'a [SamplePoint]),
    LockContent(bool),
    GroupItem,
    ItemPath(&'a [u32]),
    GroupItemFlags(GroupItemFlags),
    LockPosition(bool),
}

impl Property<'_> {
    fn tag(&self) -> u32 {
        match self {
            Property::End => prop::END,
            Property::Colormap(_) => prop::COLORMAP,
            Property::ActiveLayer => prop::ACTIVE_LAYER,
            Property::ActiveChannel => prop::ACTIVE_CHANNEL,
            Property::Selection => prop::SELECTION,
            Property::FloatingSelection => prop::FLOATING_SELECTION,
            Property::Opacity(_) => prop::OPACITY,
            Property::Mode(_) => prop::MODE,
            Property::Visible(_) => prop::VISIBLE,
            Property::Linked(_) => prop::LINKED,
            Property::LockAlpha(_) => prop::LOCK_ALPHA,
            Property::ApplyMask(_) => prop::APPLY_MASK,
            Property::EditMask(_) => prop::EDIT_MASK,
            Property::ShowMask(_) => prop::SHOW_MASK,
            Property::ShowMasked(_) => prop::SHOW_MASKED,
            Property::Offsets(..) => prop::OFFSETS,
            Property::Color(_) => prop::COLOR,
            Property::Compression(_) => prop::COMPRESSION,
            Property::Guides(_) => prop::GUIDES,
            Property::Resolution(..) => prop::RESOLUTION,
            Property::Tattoo(_) => prop::TATTOO,
            Property::Parasites(_) => prop::PARASITES,
            Property::Unit(_) => prop::UNIT,
            Property::Paths(_) => prop::PATHS,
            Property::UserUnit(_) => prop::USER_UNIT,
            Property::Vectors(_) => prop::VECTORS,
            Property::TextLayerFlags(_) => prop::TEXT_LAYER_FLAGS,
            Property::SamplePoints(_) => prop::SAMPLE_POINTS,
            Property::LockContent(_) => prop::LOCK_CONTENT,
            Property::GroupItem => prop::GROUP_ITEM,
            Property::ItemPath(_) => prop::ITEM_PATH,
            Property::GroupItemFlags(_) => prop::GROUP_ITEM_FLAGS,
            Property::LockPosition(_) => prop::LOCK_POSITION,
        }
    }
}

/// Byte size of a serialized string field.
pub(super) fn string_len(s: &str) -> u32 {
    if s.is_empty() {
        4
    } else {
        4 + s.len() as u32 + 1
    }
}

impl<W: Write + Seek> SaveSession<'_, W> {
    pub(super) fn write_prop(&mut self, property: Property<'_>) -> Result<()> {
        self.w.write_u32(property.tag())?;

        match property {
            Property::End
            | Property::ActiveLayer
            | Property::ActiveChannel
            | Property::Selection
            | Property::GroupItem => self.w.write_u32(0)?,

            Property::Colormap(colors) => {
                self.w.write_u32(4 + colors.len() as u32 * 3)?;
                self.w.write_u32(colors.len() as u32)?;
                for color in colors {
                    self.w.write_bytes(color)?;
                }
            }

            Property::FloatingSelection => {
                self.w.write_u32(4)?;
                self.floating_sel_slot = Some(OffsetSlot::reserve(&mut self.w)?);
            }

            Property::Opacity(opacity) => {
                self.w.write_u32(4)?;
                self.w.write_u32((opacity * 255.999) as u32)?;
            }

            Property::Mode(mode) => {
                self.w.write_u32(4)?;
                self.w.write_u32(mode as u32)?;
            }

            Property::Visible(v)
            | Property::Linked(v)
            | Property::LockAlpha(v)
            | Property::ApplyMask(v)
            | Property::EditMask(v)
            | Property::ShowMask(v)
            | Property::ShowMasked(v)
            | Property::LockContent(v)
            | Property::LockPosition(v) => {
                self.w.write_u32(4)?;
                self.w.write_u32(u32::from(v))?;
            }

            Property::Offsets(x, y) => {
                self.w.write_u32(8)?;
                self.w.write_i32(x)?;
                self.w.write_i32(y)?;
            }

            Property::Color(color) => {
                self.w.write_u32(3)?;
                self.w.write_bytes(&color)?;
            }

            Property::Compression(compression) => {
                self.w.write_u32(1)?;
                self.w.write_u8(compression as u8)?;
            }

            Property::Guides(guides) => {
                let valid: Vec<&Guide> = guides
                    .iter()
                    .filter(|g| {
                        if g.orientation == GuideOrientation::Unknown {
                            log::warn!("xcf: skipping guide at {} with unknown orientation", g.position);
                            false
                        } else {
                            true
                        }
                    })
                    .collect();
                self.w.write_u32(valid.len() as u32 * 5)?;
                for guide in valid {
                    self.w.write_i32(guide.position)?;
                    self.w.write_u8(match guide.orientation {
                        GuideOrientation::Horizontal => orientation::HORIZONTAL,
                        GuideOrientation::Vertical => orientation::VERTICAL,
                        GuideOrientation::Unknown => unreachable!(),
                    })?;
                }
            }

            Property::Resolution(mut xres, mut yres) => {
                if !(MIN_RESOLUTION..=MAX_RESOLUTION).contains(&xres)
                    || !(MIN_RESOLUTION..=MAX_RESOLUTION).contains(&yres)
                {
                    log::warn!("xcf: out of range resolution {xres}x{yres}, saving 72 dpi instead");
                    xres = 72.0;
                    yres = 72.0;
                }
                self.w.write_u32(8)?;
                self.w.write_f32(xres as f32)?;
                self.w.write_f32(yres as f32)?;
            }

            Property::Tattoo(tattoo) => {
                self.w.write_u32(4)?;
                self.w.write_u32(tattoo)?;
            }

            Property::Parasites(parasites) => {
                let length = OffsetSlot::reserve(&mut self.w)?;
                let start = self.w.position();
                self.save_parasite_list(parasites)?;
                let size = self.w.position() - start;
                length.commit(&mut self.w, size)?;
            }

            Property::Unit(unit) => {
                self.w.write_u32(4)?;
                self.w.write_u32(unit)?;
            }

            Property::Paths(image) => {
                let length = OffsetSlot::reserve(&mut self.w)?;
                let start = self.w.position();
                self.save_old_paths(image)?;
                let size = self.w.position() - start;
                length.commit(&mut self.w, size)?;
            }

            Property::UserUnit(unit) => {
                let strings = [
                    unit.identifier.as_str(),
                    unit.symbol.as_str(),
                    unit.abbreviation.as_str(),
                    unit.singular.as_str(),
                    unit.plural.as_str(),
                ];
                self.w.write_u32(8 + strings.iter().map(|s| string_len(s)).sum::<u32>())?;
                self.w.write_f32(unit.factor)?;
                self.w.write_u32(unit.digits)?;
                for s in strings {
                    self.w.write_string(s)?;
                }
            }

            Property::Vectors(image) => {
                let length = OffsetSlot::reserve(&mut self.w)?;
                let start = self.w.position();
                self.save_vectors(image)?;
                let size = self.w.position() - start;
                length.commit(&mut self.w, size)?;
            }

            Property::TextLayerFlags(flags) => {
                self.w.write_u32(4)?;
                self.w.write_u32(flags.bits())?;
            }

            Property::SamplePoints(points) => {
                self.w.write_u32(points.len() as u32 * 8)?;
                for point in points {
                    self.w.write_i32(point.x)?;
                    self.w.write_i32(point.y)?;
                }
            }

            Property::ItemPath(path) => {
                self.w.write_u32(path.len() as u32 * 4)?;
                for index in path {
                    self.w.write_u32(*index)?;
                }
            }

            Property::GroupItemFlags(flags) => {
                self.w.write_u32(4)?;
                self.w.write_u32(flags.bits())?;
            }
        }

        Ok(())
    }

    /// The persistent parasites of `parasites`, back to back. Transient
    /// ones never reach the file.
    pub(super) fn save_parasite_list(&mut self, parasites: &[Parasite]) -> Result<()> {
        for parasite in parasites.iter().filter(|p| p.is_persistent()) {
            self.w.write_string(&parasite.name)?;
            self.w.write_u32(parasite.flags.bits())?;
            self.w.write_u32(parasite.data.len() as u32)?;
            self.w.write_bytes(&parasite.data)?;
        }
        Ok(())
    }
}
