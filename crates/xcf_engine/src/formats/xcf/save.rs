//! The save walk: header, image, layer tree, channels, hierarchies.
//!
//! The file is written front to back in one pass; every forward reference
//! (the layer/channel table, hierarchy and level tables, the floating
//! selection link) is a reserved slot patched once the target position is
//! known.

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

use super::constants::{self, compat_point, STROKETYPE_BEZIER, TILE_HEIGHT, TILE_WIDTH};
use super::props::Property;
use super::{rle, tiles, OffsetSlot, OffsetTable, XcfWriter};
use crate::{
    AnchorKind, Channel, Compression, GroupItemFlags, Image, Layer, Parasite, PixelData, Precision, Result,
    SaveOptions, Stroke, Unit, VectorPath, XcfError,
};

/// The lowest format version able to represent `image`.
///
/// Old readers refuse files with a version above what they know, so the
/// version is only raised when a feature of the document requires it: a
/// colormap needs 1, the newer blend modes need 2, layer groups need 3
/// and any precision beyond 8 bit needs 4.
pub fn choose_version(image: &Image) -> u32 {
    let mut version = 0;

    if image.colormap.is_some() {
        version = version.max(1);
    }
    for (layer, _) in image.layer_list() {
        if layer.mode.requires_version_2() {
            version = version.max(2);
        }
        if layer.is_group() {
            version = version.max(3);
        }
    }
    if image.precision != Precision::U8 {
        version = version.max(4);
    }

    version
}

/// Serialize `image` to `out`.
pub fn save<W: Write + Seek>(image: &Image, options: &SaveOptions, out: W) -> Result<()> {
    save_impl(image, options, out, None)
}

/// Like [`save`], reporting completion in the 0.0 to 1.0 range after each
/// saved entity.
pub fn save_with_progress<W: Write + Seek>(
    image: &Image,
    options: &SaveOptions,
    out: W,
    progress: &mut dyn FnMut(f64),
) -> Result<()> {
    save_impl(image, options, out, Some(progress))
}

pub fn save_to_vec(image: &Image, options: &SaveOptions) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    save(image, options, &mut cursor)?;
    Ok(cursor.into_inner())
}

pub fn save_to_path(image: &Image, options: &SaveOptions, path: impl AsRef<Path>) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    save(image, options, &mut out)?;
    out.flush()?;
    Ok(())
}

fn save_impl<W: Write + Seek>(
    image: &Image,
    options: &SaveOptions,
    out: W,
    progress: Option<&mut dyn FnMut(f64)>,
) -> Result<()> {
    match options.compression {
        Compression::None | Compression::Rle => {}
        compression => return Err(XcfError::UnsupportedCompression { compression }),
    }

    let layers = image.layer_list();
    let has_selection = image.selection.as_ref().is_some_and(|s| !s.pixels.is_blank());
    let total = 1 + layers.len() + image.channels.len() + usize::from(has_selection);

    let mut session = SaveSession {
        w: XcfWriter::new(out),
        version: choose_version(image),
        compression: options.compression,
        floating_sel_target: layers.iter().find_map(|(layer, _)| layer.floating_selection),
        floating_sel_slot: None,
        progress,
        saved: 0,
        total: total as u32,
    };
    session.save_image(image)?;

    log::debug!(
        "xcf: saved {}x{} image, version {}",
        image.width,
        image.height,
        session.version
    );
    Ok(())
}

pub(super) struct SaveSession<'a, W: Write + Seek> {
    pub(super) w: XcfWriter<W>,
    version: u32,
    compression: Compression,
    /// Tattoo of the drawable the floating selection is attached to.
    floating_sel_target: Option<u32>,
    /// The reserved FLOATING_SELECTION payload, patched when the target
    /// drawable is reached.
    pub(super) floating_sel_slot: Option<OffsetSlot>,
    progress: Option<&'a mut dyn FnMut(f64)>,
    saved: u32,
    total: u32,
}

impl<W: Write + Seek> SaveSession<'_, W> {
    fn save_image(&mut self, image: &Image) -> Result<()> {
        self.write_header(image)?;
        self.save_image_props(image)?;
        self.step_progress();

        let layers = image.layer_list();
        let selection = image.selection.as_ref().filter(|s| !s.pixels.is_blank());
        let n_channels = image.channels.len() + usize::from(selection.is_some());

        // one combined table: the layer offsets, a 0 terminator, the
        // channel offsets, a 0 terminator
        let mut table = OffsetTable::reserve(&mut self.w, layers.len() + n_channels + 2)?;

        for (layer, item_path) in &layers {
            let offset = self.w.position();
            self.save_layer(image, layer, item_path)?;
            table.commit_next(&mut self.w, offset)?;
            self.step_progress();
        }
        table.skip_terminator();

        for channel in &image.channels {
            let offset = self.w.position();
            self.save_channel(image, channel, false)?;
            table.commit_next(&mut self.w, offset)?;
            self.step_progress();
        }
        if let Some(selection) = selection {
            let offset = self.w.position();
            self.save_channel(image, selection, true)?;
            table.commit_next(&mut self.w, offset)?;
            self.step_progress();
        }

        Ok(())
    }

    fn write_header(&mut self, image: &Image) -> Result<()> {
        let tag = if self.version == 0 {
            String::from("picman xcf file\0")
        } else {
            format!("picman xcf v{:03}\0", self.version)
        };
        // the header field is fixed width, longer tags are cut off
        self.w.write_bytes(&tag.as_bytes()[..constants::MAGIC_LEN])?;

        self.w.write_u32(image.width)?;
        self.w.write_u32(image.height)?;
        self.w.write_u32(image.base_type as u32)?;
        if self.version >= 4 {
            self.w.write_u32(image.precision as u32)?;
        }
        Ok(())
    }

    fn save_image_props(&mut self, image: &Image) -> Result<()> {
        if let Some(colormap) = &image.colormap {
            self.write_prop(Property::Colormap(colormap))?;
        }
        if self.compression != Compression::None {
            self.write_prop(Property::Compression(self.compression))?;
        }
        if !image.guides.is_empty() {
            self.write_prop(Property::Guides(&image.guides))?;
        }
        if !image.sample_points.is_empty() {
            self.write_prop(Property::SamplePoints(&image.sample_points))?;
        }
        self.write_prop(Property::Resolution(image.xresolution, image.yresolution))?;
        if image.tattoo_state != 0 {
            self.write_prop(Property::Tattoo(image.tattoo_state))?;
        }
        if let Unit::Builtin(index) = image.unit {
            self.write_prop(Property::Unit(index))?;
        }
        if !image.paths.is_empty() {
            if image.paths.iter().all(VectorPath::is_legacy_compatible) {
                self.write_prop(Property::Paths(image))?;
            } else {
                self.write_prop(Property::Vectors(image))?;
            }
        }
        if let Unit::User(unit) = &image.unit {
            self.write_prop(Property::UserUnit(unit))?;
        }

        let mut parasites = image.parasites.clone();
        if let Some(grid) = &image.grid {
            parasites.push(grid.to_parasite());
        }
        if parasites.iter().any(Parasite::is_persistent) {
            self.write_prop(Property::Parasites(&parasites))?;
        }

        self.write_prop(Property::End)
    }

    fn save_layer(&mut self, image: &Image, layer: &Layer, item_path: &[u32]) -> Result<()> {
        self.note_drawable_offset(layer.item.tattoo)?;

        self.w.write_u32(layer.width())?;
        self.w.write_u32(layer.height())?;
        self.w.write_u32(image.base_type as u32 * 2 + u32::from(layer.has_alpha))?;
        self.w.write_string(&layer.item.name)?;

        self.save_layer_props(image, layer, item_path)?;

        let hierarchy_slot = OffsetSlot::reserve(&mut self.w)?;
        let mask_slot = OffsetSlot::reserve(&mut self.w)?;

        let offset = self.w.position();
        hierarchy_slot.commit(&mut self.w, offset)?;
        self.save_hierarchy(&layer.pixels)?;

        // an uncommitted mask slot keeps its 0 placeholder, meaning no mask
        if let Some(mask) = &layer.mask {
            let offset = self.w.position();
            mask_slot.commit(&mut self.w, offset)?;
            self.save_channel(image, &mask.channel, false)?;
        }

        Ok(())
    }

    fn save_layer_props(&mut self, image: &Image, layer: &Layer, item_path: &[u32]) -> Result<()> {
        if layer.is_group() {
            self.write_prop(Property::GroupItem)?;
        }
        if item_path.len() > 1 {
            self.write_prop(Property::ItemPath(item_path))?;
        }
        if image.active_layer == Some(layer.item.tattoo) {
            self.write_prop(Property::ActiveLayer)?;
        }
        if layer.floating_selection.is_some() {
            self.write_prop(Property::FloatingSelection)?;
        }
        self.write_prop(Property::Opacity(layer.opacity))?;
        self.write_prop(Property::Visible(layer.item.visible))?;
        self.write_prop(Property::Linked(layer.item.linked))?;
        self.write_prop(Property::LockContent(layer.item.lock_content))?;
        self.write_prop(Property::LockAlpha(layer.lock_alpha))?;
        self.write_prop(Property::LockPosition(layer.item.lock_position))?;

        let mask = layer.mask.as_ref();
        self.write_prop(Property::ApplyMask(mask.is_some_and(|m| m.apply)))?;
        self.write_prop(Property::EditMask(mask.is_some_and(|m| m.edit)))?;
        self.write_prop(Property::ShowMask(mask.is_some_and(|m| m.show)))?;

        self.write_prop(Property::Offsets(layer.item.offset_x, layer.item.offset_y))?;
        self.write_prop(Property::Mode(layer.mode))?;
        if layer.item.tattoo != 0 {
            self.write_prop(Property::Tattoo(layer.item.tattoo))?;
        }
        if !layer.text_layer_flags.is_empty() {
            self.write_prop(Property::TextLayerFlags(layer.text_layer_flags))?;
        }
        if layer.is_group() {
            let mut flags = GroupItemFlags::empty();
            if layer.expanded {
                flags |= GroupItemFlags::EXPANDED;
            }
            self.write_prop(Property::GroupItemFlags(flags))?;
        }
        if layer.item.parasites.iter().any(Parasite::is_persistent) {
            self.write_prop(Property::Parasites(&layer.item.parasites))?;
        }

        self.write_prop(Property::End)
    }

    fn save_channel(&mut self, image: &Image, channel: &Channel, is_selection: bool) -> Result<()> {
        self.note_drawable_offset(channel.item.tattoo)?;

        self.w.write_u32(channel.width())?;
        self.w.write_u32(channel.height())?;
        self.w.write_string(&channel.item.name)?;

        self.save_channel_props(image, channel, is_selection)?;

        let hierarchy_slot = OffsetSlot::reserve(&mut self.w)?;
        let offset = self.w.position();
        hierarchy_slot.commit(&mut self.w, offset)?;
        self.save_hierarchy(&channel.pixels)
    }

    fn save_channel_props(&mut self, image: &Image, channel: &Channel, is_selection: bool) -> Result<()> {
        if image.active_channel == Some(channel.item.tattoo) {
            self.write_prop(Property::ActiveChannel)?;
        }
        if is_selection {
            self.write_prop(Property::Selection)?;
        }
        self.write_prop(Property::Opacity(channel.opacity))?;
        self.write_prop(Property::Visible(channel.item.visible))?;
        self.write_prop(Property::Linked(channel.item.linked))?;
        self.write_prop(Property::LockContent(channel.item.lock_content))?;
        self.write_prop(Property::LockPosition(channel.item.lock_position))?;
        self.write_prop(Property::ShowMasked(channel.show_masked))?;
        self.write_prop(Property::Color(channel.color))?;
        if channel.item.tattoo != 0 {
            self.write_prop(Property::Tattoo(channel.item.tattoo))?;
        }
        if channel.item.parasites.iter().any(Parasite::is_persistent) {
            self.write_prop(Property::Parasites(&channel.item.parasites))?;
        }

        self.write_prop(Property::End)
    }

    fn save_hierarchy(&mut self, pixels: &PixelData) -> Result<()> {
        let width = pixels.width();
        let height = pixels.height();

        self.w.write_u32(width)?;
        self.w.write_u32(height)?;
        self.w.write_u32(pixels.bpp() as u32)?;

        let nlevels = tiles::levels(width, TILE_WIDTH).max(tiles::levels(height, TILE_HEIGHT));
        let mut table = OffsetTable::reserve(&mut self.w, nlevels as usize + 1)?;

        let offset = self.w.position();
        table.commit_next(&mut self.w, offset)?;
        self.save_level(pixels)?;

        // readers only consume the first level; the rest of the pyramid is
        // written as empty levels carrying the halved dimensions
        for i in 1..nlevels {
            let offset = self.w.position();
            table.commit_next(&mut self.w, offset)?;
            self.w.write_u32(width >> i)?;
            self.w.write_u32(height >> i)?;
            self.w.write_u32(0)?;
        }

        Ok(())
    }

    fn save_level(&mut self, pixels: &PixelData) -> Result<()> {
        let width = pixels.width();
        let height = pixels.height();

        self.w.write_u32(width)?;
        self.w.write_u32(height)?;

        let ntiles = tiles::tile_rows(height, TILE_HEIGHT) * tiles::tile_cols(width, TILE_WIDTH);
        let mut table = OffsetTable::reserve(&mut self.w, ntiles as usize + 1)?;

        let mut tile = Vec::new();
        let mut encoded = Vec::new();
        for index in 0..ntiles {
            let rect = tiles::tile_rect(width, height, TILE_WIDTH, TILE_HEIGHT, index);
            tile.clear();
            pixels.read_rect(rect, &mut tile);

            let offset = self.w.position();
            match self.compression {
                Compression::None => self.w.write_bytes(&tile)?,
                Compression::Rle => {
                    let area = (rect.width * rect.height) as usize;
                    encoded.clear();
                    rle::encode_tile(&tile, area, pixels.bpp(), &mut encoded);
                    if encoded.len() > rle::worst_case_len(area, pixels.bpp()) {
                        log::error!("xcf: tile {index} encoded to {} bytes, above the worst case", encoded.len());
                    }
                    self.w.write_bytes(&encoded)?;
                }
                compression => return Err(XcfError::UnsupportedCompression { compression }),
            }
            table.commit_next(&mut self.w, offset)?;
        }

        Ok(())
    }

    /// The legacy path list: a flat point list per path, usable by 1.x
    /// readers. Only emitted when every path has exactly one stroke.
    pub(super) fn save_old_paths(&mut self, image: &Image) -> Result<()> {
        self.w.write_u32(image.active_path.map_or(0, |i| i as u32))?;
        self.w.write_u32(image.paths.len() as u32)?;

        let empty = Stroke::default();
        for path in &image.paths {
            let stroke = path.strokes.first().unwrap_or(&empty);

            self.w.write_string(&path.name)?;
            self.w.write_u32(u32::from(path.linked))?;
            self.w.write_u8(if stroke.closed { 4 } else { 2 })?;
            self.w.write_u32(u32::from(stroke.closed))?;
            self.w.write_u32(stroke.points.len() as u32)?;
            self.w.write_u32(3)?; // point list format version
            self.w.write_u32(1)?; // bezier
            self.w.write_u32(path.tattoo)?;

            for point in &stroke.points {
                self.w.write_u32(match point.kind {
                    AnchorKind::Anchor => compat_point::ANCHOR,
                    AnchorKind::Control => compat_point::CONTROL,
                })?;
                self.w.write_f32(point.x)?;
                self.w.write_f32(point.y)?;
            }
        }

        Ok(())
    }

    /// The stroke-based path list.
    pub(super) fn save_vectors(&mut self, image: &Image) -> Result<()> {
        self.w.write_u32(1)?; // payload format version
        self.w.write_u32(image.active_path.map_or(0, |i| i as u32))?;
        self.w.write_u32(image.paths.len() as u32)?;

        for path in &image.paths {
            let n_parasites = path.parasites.iter().filter(|p| p.is_persistent()).count();

            self.w.write_string(&path.name)?;
            self.w.write_u32(path.tattoo)?;
            self.w.write_u32(u32::from(path.visible))?;
            self.w.write_u32(u32::from(path.linked))?;
            self.w.write_u32(n_parasites as u32)?;
            self.w.write_u32(path.strokes.len() as u32)?;

            self.save_parasite_list(&path.parasites)?;

            for stroke in &path.strokes {
                self.w.write_u32(STROKETYPE_BEZIER)?;
                self.w.write_u32(u32::from(stroke.closed))?;
                self.w.write_u32(2)?; // axes per point: x and y
                self.w.write_u32(stroke.points.len() as u32)?;
                for point in &stroke.points {
                    self.w.write_u32(point.kind as u32)?;
                    self.w.write_f32(point.x)?;
                    self.w.write_f32(point.y)?;
                }
            }
        }

        Ok(())
    }

    /// Patch the floating selection link when the drawable it is attached
    /// to is about to be written at the current position.
    fn note_drawable_offset(&mut self, tattoo: u32) -> Result<()> {
        if self.floating_sel_target == Some(tattoo) {
            if let Some(slot) = self.floating_sel_slot.take() {
                let offset = self.w.position();
                slot.commit(&mut self.w, offset)?;
            }
        }
        Ok(())
    }

    fn step_progress(&mut self) {
        self.saved += 1;
        if let Some(progress) = self.progress.as_mut() {
            progress(f64::from(self.saved) / f64::from(self.total));
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::constants::prop;
    use super::*;
    use crate::{
        BaseType, ControlPoint, Grid, Guide, GuideOrientation, LayerMask, LayerMode, ParasiteFlags, Rect,
        SamplePoint, TextLayerFlags, UserUnit,
    };

    fn be32(bytes: &[u8], pos: usize) -> u32 {
        u32::from_be_bytes(bytes[pos..pos + 4].try_into().unwrap())
    }

    fn bf32(bytes: &[u8], pos: usize) -> f32 {
        f32::from_be_bytes(bytes[pos..pos + 4].try_into().unwrap())
    }

    fn string_at(bytes: &[u8], pos: usize) -> (String, usize) {
        let len = be32(bytes, pos) as usize;
        if len == 0 {
            (String::new(), pos + 4)
        } else {
            let s = String::from_utf8(bytes[pos + 4..pos + 4 + len - 1].to_vec()).unwrap();
            (s, pos + 4 + len)
        }
    }

    /// Scan a property stream; returns `(tag, payload_pos, payload_len)`
    /// triples and the position just past the END record.
    fn scan_props(bytes: &[u8], mut pos: usize) -> (Vec<(u32, usize, usize)>, usize) {
        let mut props = Vec::new();
        loop {
            let tag = be32(bytes, pos);
            let len = be32(bytes, pos + 4) as usize;
            pos += 8;
            if tag == prop::END {
                assert_eq!(len, 0);
                return (props, pos);
            }
            props.push((tag, pos, len));
            pos += len;
        }
    }

    fn find_prop(props: &[(u32, usize, usize)], tag: u32) -> Option<(usize, usize)> {
        props.iter().find(|p| p.0 == tag).map(|p| (p.1, p.2))
    }

    /// Position of the layer/channel offset table of a version <4 file.
    fn toc_pos(bytes: &[u8]) -> usize {
        scan_props(bytes, 26).1
    }

    /// Parse a layer record up to its hierarchy/mask slots.
    fn parse_layer(bytes: &[u8], offset: usize) -> (String, Vec<(u32, usize, usize)>, usize) {
        let (name, pos) = string_at(bytes, offset + 12);
        let (props, end) = scan_props(bytes, pos);
        (name, props, end)
    }

    fn parse_channel(bytes: &[u8], offset: usize) -> (String, Vec<(u32, usize, usize)>, usize) {
        let (name, pos) = string_at(bytes, offset + 8);
        let (props, end) = scan_props(bytes, pos);
        (name, props, end)
    }

    fn solid_layer(image: &mut Image, name: &str, width: u32, height: u32, color: [u8; 3]) -> Layer {
        let mut pixels = PixelData::new(width, height, 3);
        pixels.fill(&color);
        Layer::new(name, image.next_tattoo(), pixels)
    }

    fn save_with(image: &Image, compression: Compression) -> Vec<u8> {
        save_to_vec(image, &SaveOptions { compression }).unwrap()
    }

    #[test]
    fn single_layer_file_structure() {
        let mut image = Image::new(64, 64, BaseType::Rgb);
        let layer = solid_layer(&mut image, "Background", 64, 64, [10, 20, 30]);
        image.layers.push(layer);

        let bytes = save_with(&image, Compression::None);

        assert_eq!(&bytes[..14], &b"picman xcf file"[..14]);
        assert_eq!(be32(&bytes, 14), 64);
        assert_eq!(be32(&bytes, 18), 64);
        assert_eq!(be32(&bytes, 22), 0);

        let (image_props, pos) = scan_props(&bytes, 26);
        assert!(find_prop(&image_props, prop::RESOLUTION).is_some());
        assert!(find_prop(&image_props, prop::UNIT).is_some());
        // uncompressed saves carry no compression property
        assert!(find_prop(&image_props, prop::COMPRESSION).is_none());

        // one layer, no channels: offset, 0, 0
        let layer_offset = be32(&bytes, pos) as usize;
        assert_eq!(be32(&bytes, pos + 4), 0);
        assert_eq!(be32(&bytes, pos + 8), 0);
        assert_eq!(layer_offset, pos + 12);

        assert_eq!(be32(&bytes, layer_offset), 64);
        assert_eq!(be32(&bytes, layer_offset + 4), 64);
        assert_eq!(be32(&bytes, layer_offset + 8), 0); // RGB without alpha
        let (name, layer_props, slots) = parse_layer(&bytes, layer_offset);
        assert_eq!(name, "Background");
        let (opacity, _) = find_prop(&layer_props, prop::OPACITY).unwrap();
        assert_eq!(be32(&bytes, opacity), 255);
        let (mode, _) = find_prop(&layer_props, prop::MODE).unwrap();
        assert_eq!(be32(&bytes, mode), LayerMode::Normal as u32);
        let (tattoo, _) = find_prop(&layer_props, prop::TATTOO).unwrap();
        assert_eq!(be32(&bytes, tattoo), 1);

        let hierarchy = be32(&bytes, slots) as usize;
        assert_eq!(be32(&bytes, slots + 4), 0); // no mask
        assert_eq!(hierarchy, slots + 8);

        assert_eq!(be32(&bytes, hierarchy), 64);
        assert_eq!(be32(&bytes, hierarchy + 4), 64);
        assert_eq!(be32(&bytes, hierarchy + 8), 3);
        // 64x64 fits one tile: a single level plus the terminator
        let level = be32(&bytes, hierarchy + 12) as usize;
        assert_eq!(be32(&bytes, hierarchy + 16), 0);
        assert_eq!(level, hierarchy + 20);

        assert_eq!(be32(&bytes, level), 64);
        assert_eq!(be32(&bytes, level + 4), 64);
        let tile = be32(&bytes, level + 8) as usize;
        assert_eq!(be32(&bytes, level + 12), 0);
        assert_eq!(tile, level + 16);

        assert_eq!(bytes.len(), tile + 64 * 64 * 3);
        assert_eq!(&bytes[tile..tile + 3], &[10, 20, 30]);
    }

    #[test]
    fn rle_compressed_solid_tile() {
        let mut image = Image::new(64, 64, BaseType::Rgb);
        let layer = solid_layer(&mut image, "fill", 64, 64, [10, 20, 30]);
        image.layers.push(layer);

        let bytes = save_with(&image, Compression::Rle);

        let (image_props, pos) = scan_props(&bytes, 26);
        let (compression, len) = find_prop(&image_props, prop::COMPRESSION).unwrap();
        assert_eq!(len, 1);
        assert_eq!(bytes[compression], 1);

        let layer_offset = be32(&bytes, pos) as usize;
        let (_, _, slots) = parse_layer(&bytes, layer_offset);
        let hierarchy = be32(&bytes, slots) as usize;
        let level = be32(&bytes, hierarchy + 12) as usize;
        let tile = be32(&bytes, level + 8) as usize;

        // 4096 identical bytes per plane: one long repeat run each
        assert_eq!(
            &bytes[tile..],
            &[127, 16, 0, 10, 127, 16, 0, 20, 127, 16, 0, 30]
        );
    }

    #[test]
    fn multi_tile_level_and_pyramid() {
        let mut image = Image::new(100, 70, BaseType::Rgb);
        let layer = solid_layer(&mut image, "big", 100, 70, [1, 2, 3]);
        image.layers.push(layer);

        let bytes = save_with(&image, Compression::None);

        let pos = toc_pos(&bytes);
        let layer_offset = be32(&bytes, pos) as usize;
        let (_, _, slots) = parse_layer(&bytes, layer_offset);
        let hierarchy = be32(&bytes, slots) as usize;

        assert_eq!(be32(&bytes, hierarchy), 100);
        assert_eq!(be32(&bytes, hierarchy + 4), 70);
        assert_eq!(be32(&bytes, hierarchy + 8), 3);

        // both axes need one halving: two levels plus the terminator
        let level0 = be32(&bytes, hierarchy + 12) as usize;
        let level1 = be32(&bytes, hierarchy + 16) as usize;
        assert_eq!(be32(&bytes, hierarchy + 20), 0);

        assert_eq!(be32(&bytes, level0), 100);
        assert_eq!(be32(&bytes, level0 + 4), 70);
        // 2x2 tiles, row-major, offsets strictly increasing
        let tiles: Vec<usize> = (0..4).map(|i| be32(&bytes, level0 + 8 + i * 4) as usize).collect();
        assert_eq!(be32(&bytes, level0 + 24), 0);
        assert!(tiles.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(tiles[1] - tiles[0], 64 * 64 * 3);
        assert_eq!(tiles[2] - tiles[1], 36 * 64 * 3);
        assert_eq!(tiles[3] - tiles[2], 64 * 6 * 3);
        assert_eq!(level1 - tiles[3], 36 * 6 * 3);

        // the second level is a dummy with halved dimensions and no tiles
        assert_eq!(be32(&bytes, level1), 50);
        assert_eq!(be32(&bytes, level1 + 4), 35);
        assert_eq!(be32(&bytes, level1 + 8), 0);
        assert_eq!(bytes.len(), level1 + 12);
    }

    #[test]
    fn version_upgrades() {
        let mut image = Image::new(8, 8, BaseType::Rgb);
        let layer = solid_layer(&mut image, "a", 8, 8, [0; 3]);
        image.layers.push(layer);
        assert_eq!(choose_version(&image), 0);

        image.layers[0].mode = LayerMode::GrainMerge;
        assert_eq!(choose_version(&image), 2);

        let child = solid_layer(&mut image, "child", 8, 8, [0; 3]);
        let group = Layer::group("group", image.next_tattoo(), PixelData::new(8, 8, 3), vec![child]);
        image.layers.push(group);
        assert_eq!(choose_version(&image), 3);

        image.precision = Precision::U16;
        assert_eq!(choose_version(&image), 4);

        let mut indexed = Image::new(8, 8, BaseType::Indexed);
        indexed.colormap = Some(vec![[0, 0, 0], [255, 255, 255]]);
        assert_eq!(choose_version(&indexed), 1);
    }

    #[test]
    fn versioned_header_and_colormap() {
        let mut image = Image::new(4, 4, BaseType::Indexed);
        image.colormap = Some(vec![[1, 2, 3], [4, 5, 6]]);
        let mut pixels = PixelData::new(4, 4, 1);
        pixels.fill(&[1]);
        let tattoo = image.next_tattoo();
        image.layers.push(Layer::new("bg", tattoo, pixels));

        let bytes = save_with(&image, Compression::Rle);

        assert_eq!(&bytes[..14], &format!("picman xcf v{:03}", 1).as_bytes()[..14]);
        assert_eq!(be32(&bytes, 22), BaseType::Indexed as u32);

        let (image_props, _) = scan_props(&bytes, 26);
        let (colormap, len) = find_prop(&image_props, prop::COLORMAP).unwrap();
        assert_eq!(len, 4 + 6);
        assert_eq!(be32(&bytes, colormap), 2);
        assert_eq!(&bytes[colormap + 4..colormap + 10], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn precision_field_written_from_version_4() {
        let mut image = Image::new(8, 8, BaseType::Gray);
        image.precision = Precision::Float;
        let mut pixels = PixelData::new(8, 8, 1);
        pixels.fill(&[128]);
        let tattoo = image.next_tattoo();
        image.layers.push(Layer::new("g", tattoo, pixels));

        let bytes = save_with(&image, Compression::Rle);

        assert_eq!(&bytes[..14], &format!("picman xcf v{:03}", 4).as_bytes()[..14]);
        assert_eq!(be32(&bytes, 22), BaseType::Gray as u32);
        assert_eq!(be32(&bytes, 26), Precision::Float as u32);
        // the property stream moves back by one header field
        let (image_props, _) = scan_props(&bytes, 30);
        assert!(find_prop(&image_props, prop::RESOLUTION).is_some());
    }

    #[test]
    fn layers_and_channels_share_one_offset_table() {
        let mut image = Image::new(64, 64, BaseType::Rgb);
        let a = solid_layer(&mut image, "a", 64, 64, [1; 3]);
        let b = solid_layer(&mut image, "b", 64, 64, [2; 3]);
        image.layers.push(a);
        image.layers.push(b);
        let tattoo = image.next_tattoo();
        image.channels.push(Channel::new("alpha mask", tattoo, PixelData::new(64, 64, 1)));

        let bytes = save_with(&image, Compression::Rle);
        let pos = toc_pos(&bytes);

        let a_off = be32(&bytes, pos) as usize;
        let b_off = be32(&bytes, pos + 4) as usize;
        assert_eq!(be32(&bytes, pos + 8), 0);
        let c_off = be32(&bytes, pos + 12) as usize;
        assert_eq!(be32(&bytes, pos + 16), 0);

        assert!(a_off < b_off && b_off < c_off);
        assert_eq!(parse_layer(&bytes, a_off).0, "a");
        assert_eq!(parse_layer(&bytes, b_off).0, "b");
        let (name, channel_props, _) = parse_channel(&bytes, c_off);
        assert_eq!(name, "alpha mask");
        let (color, len) = find_prop(&channel_props, prop::COLOR).unwrap();
        assert_eq!(len, 3);
        assert_eq!(&bytes[color..color + 3], &[0, 0, 0]);
    }

    #[test]
    fn selection_saved_only_when_not_blank() {
        let mut image = Image::new(16, 16, BaseType::Rgb);
        let layer = solid_layer(&mut image, "bg", 16, 16, [0; 3]);
        image.layers.push(layer);
        let tattoo = image.next_tattoo();
        image.selection = Some(Channel::new("Selection", tattoo, PixelData::new(16, 16, 1)));

        let bytes = save_with(&image, Compression::Rle);
        let pos = toc_pos(&bytes);
        // layer, terminator, empty channel list
        assert_eq!(be32(&bytes, pos + 4), 0);
        assert_eq!(be32(&bytes, pos + 8), 0);

        if let Some(selection) = &mut image.selection {
            selection.pixels.fill(&[255]);
        }
        let bytes = save_with(&image, Compression::Rle);
        let pos = toc_pos(&bytes);
        let sel_off = be32(&bytes, pos + 8) as usize;
        assert_ne!(sel_off, 0);
        let (name, props, _) = parse_channel(&bytes, sel_off);
        assert_eq!(name, "Selection");
        assert!(find_prop(&props, prop::SELECTION).is_some());
    }

    #[test]
    fn group_children_carry_item_paths() {
        let mut image = Image::new(32, 32, BaseType::Rgb);
        let first = solid_layer(&mut image, "first", 32, 32, [1; 3]);
        let second = solid_layer(&mut image, "second", 32, 32, [2; 3]);
        let group = Layer::group("group", image.next_tattoo(), PixelData::new(32, 32, 3), vec![first, second]);
        image.layers.push(group);

        let bytes = save_with(&image, Compression::Rle);
        let pos = toc_pos(&bytes);

        let group_off = be32(&bytes, pos) as usize;
        let first_off = be32(&bytes, pos + 4) as usize;
        let second_off = be32(&bytes, pos + 8) as usize;
        assert_eq!(be32(&bytes, pos + 12), 0);

        let (name, props, _) = parse_layer(&bytes, group_off);
        assert_eq!(name, "group");
        assert_eq!(props[0].0, prop::GROUP_ITEM);
        assert!(find_prop(&props, prop::ITEM_PATH).is_none());
        let (flags, _) = find_prop(&props, prop::GROUP_ITEM_FLAGS).unwrap();
        assert_eq!(be32(&bytes, flags), GroupItemFlags::EXPANDED.bits());

        let (_, props, _) = parse_layer(&bytes, first_off);
        let (path, len) = find_prop(&props, prop::ITEM_PATH).unwrap();
        assert_eq!(len, 8);
        assert_eq!((be32(&bytes, path), be32(&bytes, path + 4)), (0, 0));

        let (_, props, _) = parse_layer(&bytes, second_off);
        let (path, _) = find_prop(&props, prop::ITEM_PATH).unwrap();
        assert_eq!((be32(&bytes, path), be32(&bytes, path + 4)), (0, 1));
    }

    #[test]
    fn floating_selection_link_is_backpatched() {
        let mut image = Image::new(16, 16, BaseType::Rgb);
        let below = solid_layer(&mut image, "Background", 16, 16, [5; 3]);
        let mut floating = solid_layer(&mut image, "Floating Selection", 16, 16, [9; 3]);
        floating.floating_selection = Some(below.item.tattoo);
        image.layers.push(floating);
        image.layers.push(below);

        let bytes = save_with(&image, Compression::Rle);
        let pos = toc_pos(&bytes);
        let float_off = be32(&bytes, pos) as usize;
        let below_off = be32(&bytes, pos + 4) as usize;

        let (_, props, _) = parse_layer(&bytes, float_off);
        let (link, len) = find_prop(&props, prop::FLOATING_SELECTION).unwrap();
        assert_eq!(len, 4);
        assert_eq!(be32(&bytes, link) as usize, below_off);
    }

    #[test]
    fn layer_mask_slot_and_flags() {
        let mut image = Image::new(64, 64, BaseType::Rgb);
        let mut layer = solid_layer(&mut image, "masked", 64, 64, [7; 3]);
        let tattoo = image.next_tattoo();
        layer.mask = Some(LayerMask::new(Channel::new("masked mask", tattoo, PixelData::new(64, 64, 1))));
        image.layers.push(layer);

        let bytes = save_with(&image, Compression::Rle);
        let pos = toc_pos(&bytes);
        let layer_off = be32(&bytes, pos) as usize;

        let (_, props, slots) = parse_layer(&bytes, layer_off);
        let (apply, _) = find_prop(&props, prop::APPLY_MASK).unwrap();
        assert_eq!(be32(&bytes, apply), 1);
        let (edit, _) = find_prop(&props, prop::EDIT_MASK).unwrap();
        assert_eq!(be32(&bytes, edit), 0);

        let mask_off = be32(&bytes, slots + 4) as usize;
        assert_ne!(mask_off, 0);
        assert_eq!(be32(&bytes, mask_off), 64);
        assert_eq!(parse_channel(&bytes, mask_off).0, "masked mask");
    }

    #[test]
    fn guides_sample_points_and_opacity_quantization() {
        let mut image = Image::new(16, 16, BaseType::Rgb);
        image.guides = vec![
            Guide { position: 10, orientation: GuideOrientation::Horizontal },
            Guide { position: 20, orientation: GuideOrientation::Vertical },
            Guide { position: 30, orientation: GuideOrientation::Unknown },
        ];
        image.sample_points = vec![SamplePoint { x: 3, y: 4 }];
        let mut layer = solid_layer(&mut image, "half", 16, 16, [1; 3]);
        layer.opacity = 0.5;
        image.layers.push(layer);

        let bytes = save_with(&image, Compression::Rle);

        let (image_props, pos) = scan_props(&bytes, 26);
        let (guides, len) = find_prop(&image_props, prop::GUIDES).unwrap();
        // the orientation-less guide is dropped
        assert_eq!(len, 10);
        assert_eq!(be32(&bytes, guides), 10);
        assert_eq!(bytes[guides + 4], 1);
        assert_eq!(be32(&bytes, guides + 5), 20);
        assert_eq!(bytes[guides + 9], 2);

        let (points, len) = find_prop(&image_props, prop::SAMPLE_POINTS).unwrap();
        assert_eq!(len, 8);
        assert_eq!((be32(&bytes, points), be32(&bytes, points + 4)), (3, 4));

        let layer_off = be32(&bytes, pos) as usize;
        let (_, props, _) = parse_layer(&bytes, layer_off);
        let (opacity, _) = find_prop(&props, prop::OPACITY).unwrap();
        assert_eq!(be32(&bytes, opacity), 127);
    }

    #[test]
    fn parasites_keep_persistent_and_grid_drop_transient() {
        let mut image = Image::new(8, 8, BaseType::Rgb);
        image.parasites.push(Parasite::persistent("comment", b"hello".to_vec()));
        image.parasites.push(Parasite::new("scratch", ParasiteFlags::empty(), b"gone".to_vec()));
        image.grid = Some(Grid::default());
        let layer = solid_layer(&mut image, "bg", 8, 8, [0; 3]);
        image.layers.push(layer);

        let bytes = save_with(&image, Compression::Rle);
        let (image_props, _) = scan_props(&bytes, 26);
        let (mut pos, len) = find_prop(&image_props, prop::PARASITES).unwrap();
        let end = pos + len;

        let mut names = Vec::new();
        while pos < end {
            let (name, next) = string_at(&bytes, pos);
            let flags = be32(&bytes, next);
            let data_len = be32(&bytes, next + 4) as usize;
            assert_ne!(flags & ParasiteFlags::PERSISTENT.bits(), 0);
            names.push(name);
            pos = next + 8 + data_len;
        }
        assert_eq!(pos, end);
        assert_eq!(names, vec!["comment".to_string(), Grid::PARASITE_NAME.to_string()]);
    }

    #[test]
    fn single_stroke_paths_use_the_legacy_encoding() {
        let mut image = Image::new(8, 8, BaseType::Rgb);
        let tattoo = image.next_tattoo();
        let mut path = VectorPath::new("Outline", tattoo);
        path.strokes.push(Stroke {
            closed: true,
            points: vec![ControlPoint::anchor(1.0, 2.0), ControlPoint::control(3.0, 4.0)],
        });
        image.paths.push(path);
        image.active_path = Some(0);
        let layer = solid_layer(&mut image, "bg", 8, 8, [0; 3]);
        image.layers.push(layer);

        let bytes = save_with(&image, Compression::Rle);
        let (image_props, _) = scan_props(&bytes, 26);
        assert!(find_prop(&image_props, prop::VECTORS).is_none());
        let (pos, _) = find_prop(&image_props, prop::PATHS).unwrap();

        assert_eq!(be32(&bytes, pos), 0); // active index
        assert_eq!(be32(&bytes, pos + 4), 1); // path count
        let (name, pos) = string_at(&bytes, pos + 8);
        assert_eq!(name, "Outline");
        assert_eq!(be32(&bytes, pos), 0); // not linked
        assert_eq!(bytes[pos + 4], 4); // closed state
        assert_eq!(be32(&bytes, pos + 5), 1); // closed
        assert_eq!(be32(&bytes, pos + 9), 2); // point count
        assert_eq!(be32(&bytes, pos + 13), 3); // format version
        assert_eq!(be32(&bytes, pos + 17), 1); // bezier
        assert_eq!(be32(&bytes, pos + 21), 1); // tattoo

        let points = pos + 25;
        assert_eq!(be32(&bytes, points), compat_point::ANCHOR);
        assert_eq!(bf32(&bytes, points + 4), 1.0);
        assert_eq!(bf32(&bytes, points + 8), 2.0);
        assert_eq!(be32(&bytes, points + 12), compat_point::CONTROL);
    }

    #[test]
    fn multi_stroke_paths_use_the_stroke_encoding() {
        let mut image = Image::new(8, 8, BaseType::Rgb);
        let tattoo = image.next_tattoo();
        let mut path = VectorPath::new("Two strokes", tattoo);
        path.strokes.push(Stroke {
            closed: false,
            points: vec![ControlPoint::anchor(0.0, 0.0)],
        });
        path.strokes.push(Stroke {
            closed: true,
            points: vec![ControlPoint::anchor(5.0, 5.0)],
        });
        image.paths.push(path);
        let layer = solid_layer(&mut image, "bg", 8, 8, [0; 3]);
        image.layers.push(layer);

        let bytes = save_with(&image, Compression::Rle);
        let (image_props, _) = scan_props(&bytes, 26);
        assert!(find_prop(&image_props, prop::PATHS).is_none());
        let (pos, _) = find_prop(&image_props, prop::VECTORS).unwrap();

        assert_eq!(be32(&bytes, pos), 1); // payload format version
        assert_eq!(be32(&bytes, pos + 4), 0); // active index
        assert_eq!(be32(&bytes, pos + 8), 1); // path count
        let (name, pos) = string_at(&bytes, pos + 12);
        assert_eq!(name, "Two strokes");
        assert_eq!(be32(&bytes, pos), 1); // tattoo
        assert_eq!(be32(&bytes, pos + 4), 1); // visible
        assert_eq!(be32(&bytes, pos + 8), 0); // linked
        assert_eq!(be32(&bytes, pos + 12), 0); // parasite count
        assert_eq!(be32(&bytes, pos + 16), 2); // stroke count

        let stroke = pos + 20;
        assert_eq!(be32(&bytes, stroke), STROKETYPE_BEZIER);
        assert_eq!(be32(&bytes, stroke + 4), 0); // open
        assert_eq!(be32(&bytes, stroke + 8), 2); // axes
        assert_eq!(be32(&bytes, stroke + 12), 1); // point count
        assert_eq!(be32(&bytes, stroke + 16), AnchorKind::Anchor as u32);

        let second = stroke + 28;
        assert_eq!(be32(&bytes, second), STROKETYPE_BEZIER);
        assert_eq!(be32(&bytes, second + 4), 1); // closed
    }

    #[test]
    fn user_units_replace_the_unit_index() {
        let mut image = Image::new(8, 8, BaseType::Rgb);
        image.unit = Unit::User(UserUnit {
            factor: 0.25,
            digits: 3,
            identifier: "beard-second".into(),
            symbol: "bs".into(),
            abbreviation: "bs".into(),
            singular: "beard-second".into(),
            plural: "beard-seconds".into(),
        });
        let layer = solid_layer(&mut image, "bg", 8, 8, [0; 3]);
        image.layers.push(layer);

        let bytes = save_with(&image, Compression::Rle);
        let (image_props, _) = scan_props(&bytes, 26);

        // a user-defined unit is carried in full instead of by index
        assert!(find_prop(&image_props, prop::UNIT).is_none());

        let (pos, _) = find_prop(&image_props, prop::USER_UNIT).unwrap();
        assert_eq!(bf32(&bytes, pos), 0.25);
        assert_eq!(be32(&bytes, pos + 4), 3);
        assert_eq!(string_at(&bytes, pos + 8).0, "beard-second");
    }

    #[test]
    fn text_layer_flags_only_on_text_layers() {
        let mut image = Image::new(8, 8, BaseType::Rgb);
        let plain = solid_layer(&mut image, "plain", 8, 8, [0; 3]);
        let mut text = solid_layer(&mut image, "text", 8, 8, [0; 3]);
        text.text_layer_flags = TextLayerFlags::MODIFIED;
        image.layers.push(plain);
        image.layers.push(text);

        let bytes = save_with(&image, Compression::Rle);
        let pos = toc_pos(&bytes);

        let (_, props, _) = parse_layer(&bytes, be32(&bytes, pos) as usize);
        assert!(find_prop(&props, prop::TEXT_LAYER_FLAGS).is_none());

        let (_, props, _) = parse_layer(&bytes, be32(&bytes, pos + 4) as usize);
        let (flags, _) = find_prop(&props, prop::TEXT_LAYER_FLAGS).unwrap();
        assert_eq!(be32(&bytes, flags), TextLayerFlags::MODIFIED.bits());
    }

    #[test]
    fn active_layer_and_channel_markers() {
        let mut image = Image::new(8, 8, BaseType::Rgb);
        let layer = solid_layer(&mut image, "bg", 8, 8, [0; 3]);
        image.active_layer = Some(layer.item.tattoo);
        image.layers.push(layer);
        let tattoo = image.next_tattoo();
        image.active_channel = Some(tattoo);
        image.channels.push(Channel::new("c", tattoo, PixelData::new(8, 8, 1)));

        let bytes = save_with(&image, Compression::Rle);
        let pos = toc_pos(&bytes);

        let (_, props, _) = parse_layer(&bytes, be32(&bytes, pos) as usize);
        assert!(find_prop(&props, prop::ACTIVE_LAYER).is_some());

        let (_, props, _) = parse_channel(&bytes, be32(&bytes, pos + 8) as usize);
        assert!(find_prop(&props, prop::ACTIVE_CHANNEL).is_some());
    }

    #[test]
    fn progress_reaches_one() {
        let mut image = Image::new(16, 16, BaseType::Rgb);
        let layer = solid_layer(&mut image, "a", 16, 16, [0; 3]);
        image.layers.push(layer);
        let layer = solid_layer(&mut image, "b", 16, 16, [0; 3]);
        image.layers.push(layer);
        let tattoo = image.next_tattoo();
        image.channels.push(Channel::new("c", tattoo, PixelData::new(16, 16, 1)));

        let mut reports = Vec::new();
        let mut cursor = Cursor::new(Vec::new());
        save_with_progress(&image, &SaveOptions::new(), &mut cursor, &mut |f| reports.push(f)).unwrap();

        assert_eq!(reports.len(), 4);
        assert!(reports.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(reports.last(), Some(&1.0));
    }

    #[test]
    fn unsupported_compression_is_rejected() {
        let image = Image::new(8, 8, BaseType::Rgb);
        for compression in [Compression::Zlib, Compression::Fractal] {
            let err = save_to_vec(&image, &SaveOptions { compression }).unwrap_err();
            assert!(matches!(err, XcfError::UnsupportedCompression { .. }));
        }
    }

    #[test]
    fn uncompressed_tiles_hold_raw_pixels() {
        let mut image = Image::new(70, 70, BaseType::Rgb);
        let mut pixels = PixelData::new(70, 70, 3);
        pixels.put_pixel(64, 0, &[200, 201, 202]);
        let tattoo = image.next_tattoo();
        image.layers.push(Layer::new("bg", tattoo, pixels));

        let bytes = save_with(&image, Compression::None);
        let pos = toc_pos(&bytes);
        let (_, _, slots) = parse_layer(&bytes, be32(&bytes, pos) as usize);
        let hierarchy = be32(&bytes, slots) as usize;
        let level = be32(&bytes, hierarchy + 12) as usize;

        // pixel (64, 0) lands at the origin of the second tile
        let tile1 = be32(&bytes, level + 12) as usize;
        assert_eq!(&bytes[tile1..tile1 + 3], &[200, 201, 202]);

        let mut expected = Vec::new();
        image.layers[0].pixels.read_rect(Rect { x: 64, y: 0, width: 6, height: 64 }, &mut expected);
        assert_eq!(&bytes[tile1..tile1 + expected.len()], &expected[..]);
    }
}
