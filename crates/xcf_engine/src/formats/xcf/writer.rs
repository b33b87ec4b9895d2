use std::io::{Seek, SeekFrom, Write};

use byteorder::{BigEndian, WriteBytesExt};

use crate::Result;

/// Seekable big-endian stream writer with an explicit position counter.
///
/// The counter mirrors the stream position at all times so offset fields
/// can be captured without querying the underlying sink.
pub(crate) struct XcfWriter<W: Write + Seek> {
    out: W,
    cp: u32,
}

impl<W: Write + Seek> XcfWriter<W> {
    pub fn new(out: W) -> Self {
        XcfWriter { out, cp: 0 }
    }

    /// Current write position (absolute file offset).
    pub fn position(&self) -> u32 {
        self.cp
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.out.write_u8(value)?;
        self.cp += 1;
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.out.write_all(bytes)?;
        self.cp += bytes.len() as u32;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.out.write_u32::<BigEndian>(value)?;
        self.cp += 4;
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.out.write_i32::<BigEndian>(value)?;
        self.cp += 4;
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.out.write_f32::<BigEndian>(value)?;
        self.cp += 4;
        Ok(())
    }

    /// The format's maybe-null string: u32 byte length including one NUL,
    /// then the bytes and the NUL. Empty strings are a bare 0.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        if value.is_empty() {
            self.write_u32(0)
        } else {
            self.write_u32(value.len() as u32 + 1)?;
            self.write_bytes(value.as_bytes())?;
            self.write_u8(0)
        }
    }

    pub fn seek_to(&mut self, pos: u32) -> Result<()> {
        self.out.seek(SeekFrom::Start(u64::from(pos)))?;
        self.cp = pos;
        Ok(())
    }

    pub fn seek_end(&mut self) -> Result<()> {
        let pos = self.out.seek(SeekFrom::End(0))?;
        self.cp = pos as u32;
        Ok(())
    }
}

/// One reserved u32 field, committed once its real value is known.
///
/// This is the backpatch pattern: reserve writes a zero placeholder at the
/// current position, commit seeks back, overwrites it and returns the
/// writer to the end of the stream.
#[must_use]
pub(crate) struct OffsetSlot {
    pos: u32,
}

impl OffsetSlot {
    pub fn reserve<W: Write + Seek>(w: &mut XcfWriter<W>) -> Result<Self> {
        let pos = w.position();
        w.write_u32(0)?;
        Ok(OffsetSlot { pos })
    }

    pub fn commit<W: Write + Seek>(self, w: &mut XcfWriter<W>, value: u32) -> Result<()> {
        w.seek_to(self.pos)?;
        w.write_u32(value)?;
        w.seek_end()
    }
}

/// A reserved table of u32 offset slots, committed front to back.
///
/// The slots are zero-filled on reservation, so any slot never committed
/// (the terminators) already holds the 0 sentinel.
pub(crate) struct OffsetTable {
    next: u32,
}

impl OffsetTable {
    pub fn reserve<W: Write + Seek>(w: &mut XcfWriter<W>, slots: usize) -> Result<Self> {
        let next = w.position();
        for _ in 0..slots {
            w.write_u32(0)?;
        }
        Ok(OffsetTable { next })
    }

    /// Patch the next slot with `offset` and return to the end of the
    /// stream.
    pub fn commit_next<W: Write + Seek>(&mut self, w: &mut XcfWriter<W>, offset: u32) -> Result<()> {
        w.seek_to(self.next)?;
        w.write_u32(offset)?;
        self.next = w.position();
        w.seek_end()
    }

    /// Leave the next slot as the 0 terminator of the current list.
    pub fn skip_terminator(&mut self) {
        self.next += 4;
    }
}
