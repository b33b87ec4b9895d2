//! Run-length encoding for tile data.
//!
//! Each of the `bpp` interleaved byte planes of a tile is encoded
//! independently and the plane streams are concatenated. Two run kinds
//! exist: repeat runs (a count and one value) and literal runs (a count
//! and that many raw bytes). Runs shorter than 128 use a one-byte length,
//! longer runs a marker byte plus a 16-bit big-endian length. No run is
//! ever longer than `MAX_RUN` elements.

/// Longest run either kind may carry.
const MAX_RUN: usize = 32767;

/// Encode one tile (interleaved, `area = width * height` pixels of `bpp`
/// bytes each), appending the output to `out`.
pub(crate) fn encode_tile(tile: &[u8], area: usize, bpp: usize, out: &mut Vec<u8>) {
    debug_assert_eq!(tile.len(), area * bpp);
    for plane in 0..bpp {
        encode_plane(tile, plane, bpp, area, out);
    }
}

/// Worst-case output size for one tile: a pathological alternation can
/// cost one extra byte for every two input bytes.
pub(crate) fn worst_case_len(area: usize, bpp: usize) -> usize {
    area * bpp * 3 / 2 + bpp * 4
}

fn encode_plane(tile: &[u8], plane: usize, bpp: usize, area: usize, out: &mut Vec<u8>) {
    let at = |i: usize| tile[plane + i * bpp];

    // Two-state machine: state 0 accumulates a repeat run, state 1 a
    // literal run. `size` counts the not-yet-flushed pixels, `length` the
    // pending run, `consumed` how many plane bytes have been looked at;
    // at(consumed) is the lookahead byte.
    let mut state = 0;
    let mut size = area;
    let mut length: usize = 0;
    let mut consumed: usize = 0;
    let mut count: usize = 0;
    let mut last: u32 = u32::MAX;

    while size > 0 {
        if state == 0 {
            if length == MAX_RUN || size <= length || (length > 1 && u32::from(at(consumed)) != last) {
                count += length;
                if length >= 128 {
                    out.push(127);
                    out.push((length >> 8) as u8);
                    out.push((length & 0xFF) as u8);
                } else {
                    out.push((length - 1) as u8);
                }
                out.push(last as u8);
                size -= length;
                length = 0;
            } else if length == 1 && u32::from(at(consumed)) != last {
                state = 1;
            }
        } else if length == MAX_RUN
            || size == length
            || (length > 0
                && u32::from(at(consumed)) == last
                && (size - length == 1 || u32::from(at(consumed + 1)) == last))
        {
            // The tail of the literal run is about to become a repeat run
            // (or the input is exhausted), flush it.
            count += length;
            state = 0;
            if length >= 128 {
                out.push(255 - 127);
                out.push((length >> 8) as u8);
                out.push((length & 0xFF) as u8);
            } else {
                out.push(255 - (length - 1) as u8);
            }
            let start = consumed - length;
            for j in 0..length {
                out.push(at(start + j));
            }
            size -= length;
            length = 0;
        }

        if size > 0 {
            length += 1;
            last = u32::from(at(consumed));
            consumed += 1;
        }
    }

    if count != area {
        log::error!("xcf: rle tile encoding error: encoded {count} of {area} bytes");
    }
}
