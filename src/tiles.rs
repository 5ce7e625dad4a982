//! Page reconstruction from tiles, and palette harmonisation.
//!
//! Tiles arrive in row major order, twenty to a 160 pixel strip. Each pixel is
//! stored as a raw 2 bit tone index until a PRINT instruction supplies the
//! palette, at which point every finished strip not yet remapped is run
//! through the palette once.

use crate::consts::{
    DEFAULT_PALETTE, MAX_TONES, PACKED_LINE_LEN, PAGE_WIDTH, PIXELS_PER_BYTE, TILE_HEIGHT,
    TILE_WIDTH, TILES_PER_LINE,
};
use crate::error::{Error, Result};
use crate::rle::Tile;

/// Gray level per tone, lightest first.
pub const GRAY_LEVELS: [u8; MAX_TONES] = [255, 130, 64, 0];

/// Maps a tone index to an 8 bit gray level. Out of range tones clamp to black.
pub const fn gray_level(tone: u8) -> u8 {
    match tone {
        0 => GRAY_LEVELS[0],
        1 => GRAY_LEVELS[1],
        2 => GRAY_LEVELS[2],
        _ => GRAY_LEVELS[3],
    }
}

/// Which end of the palette byte describes tone 0.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum PaletteOrder {
    /// Bits 1..0 map tone 0, bits 7..6 map tone 3. `0xE4` is the identity.
    #[default]
    LsbFirst,
    /// Bits 7..6 map tone 0, bits 1..0 map tone 3.
    MsbFirst,
}

/// Expands a palette byte into a tone lookup table.
pub const fn tone_table(palette: u8, order: PaletteOrder) -> [u8; MAX_TONES] {
    let p = if palette == 0 { DEFAULT_PALETTE } else { palette };
    match order {
        PaletteOrder::LsbFirst => [p & 3, (p >> 2) & 3, (p >> 4) & 3, (p >> 6) & 3],
        PaletteOrder::MsbFirst => [(p >> 6) & 3, (p >> 4) & 3, (p >> 2) & 3, p & 3],
    }
}

/// 160 pixel wide page holding up to `ROWS` strips of tiles.
///
/// Pixels are packed four to a byte, leftmost pixel in the top bits.
#[derive(Clone, Debug)]
pub struct PageBuffer<const ROWS: usize> {
    lines: [[[u8; PACKED_LINE_LEN]; TILE_HEIGHT]; ROWS],
    /// Next free column in the current strip.
    column: usize,
    /// Strips completed.
    row: usize,
    /// Strips already remapped through a palette.
    harmonised: usize,
}

impl<const ROWS: usize> Default for PageBuffer<ROWS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const ROWS: usize> PageBuffer<ROWS> {
    /// Creates an empty page.
    pub const fn new() -> Self {
        Self {
            lines: [[[0; PACKED_LINE_LEN]; TILE_HEIGHT]; ROWS],
            column: 0,
            row: 0,
            harmonised: 0,
        }
    }

    /// Strip capacity.
    pub const fn capacity(&self) -> usize {
        ROWS
    }

    /// Completed strips.
    pub const fn rows(&self) -> usize {
        self.row
    }

    /// Completed pixel lines.
    pub const fn height(&self) -> usize {
        self.row * TILE_HEIGHT
    }

    /// Strips already harmonised.
    pub const fn harmonised_rows(&self) -> usize {
        self.harmonised
    }

    /// Tiles placed in the strip under construction.
    pub const fn pending_tiles(&self) -> usize {
        self.column
    }

    /// Nothing decoded since the last reset.
    pub const fn is_empty(&self) -> bool {
        self.row == 0 && self.column == 0
    }

    /// Clears the page and all cursors.
    pub fn reset(&mut self) {
        self.lines = [[[0; PACKED_LINE_LEN]; TILE_HEIGHT]; ROWS];
        self.column = 0;
        self.row = 0;
        self.harmonised = 0;
    }

    /// Places the next tile in sequence.
    ///
    /// Returns `Ok(true)` when the tile finished a strip.
    pub fn decode_tile(&mut self, tile: &Tile) -> Result<bool> {
        if self.row >= ROWS {
            return Err(Error::PageFull { rows: ROWS });
        }
        self.write_tile(tile, self.column, self.row)?;
        self.column += 1;
        if self.column < TILES_PER_LINE {
            return Ok(false);
        }
        self.column = 0;
        self.row += 1;
        Ok(true)
    }

    /// Writes a tile at an explicit slot without moving the cursors.
    pub fn write_tile(&mut self, tile: &Tile, column: usize, row: usize) -> Result<()> {
        if column >= TILES_PER_LINE || row >= ROWS {
            return Err(Error::TileSlot { column, row });
        }
        for (j, planes) in tile.chunks_exact(2).enumerate() {
            let (lo, hi) = (planes[0], planes[1]);
            let line = &mut self.lines[row][j];
            for i in 0..TILE_WIDTH {
                let bit = 7 - i;
                let tone = (((hi >> bit) & 1) << 1) | ((lo >> bit) & 1);
                set_packed(line, column * TILE_WIDTH + i, tone);
            }
        }
        Ok(())
    }

    /// Tone at `(x, y)`, if that pixel exists.
    pub fn pixel(&self, x: usize, y: usize) -> Option<u8> {
        if x >= PAGE_WIDTH {
            return None;
        }
        let line = self.lines.get(y / TILE_HEIGHT)?.get(y % TILE_HEIGHT)?;
        Some(get_packed(line, x))
    }

    /// Packed storage of pixel line `y`.
    pub fn packed_line(&self, y: usize) -> Option<&[u8; PACKED_LINE_LEN]> {
        self.lines.get(y / TILE_HEIGHT)?.get(y % TILE_HEIGHT)
    }

    /// Unpacks completed pixel line `y` into one tone per byte.
    pub fn line_into(&self, y: usize, out: &mut [u8]) -> Result<()> {
        let out = out.get_mut(..PAGE_WIDTH).ok_or(Error::BufferTooSmall)?;
        let line = match self.packed_line(y) {
            Some(line) if y < self.height() => line,
            _ => {
                return Err(Error::TileSlot {
                    column: 0,
                    row: y / TILE_HEIGHT,
                });
            }
        };
        for (x, px) in out.iter_mut().enumerate() {
            *px = get_packed(line, x);
        }
        Ok(())
    }

    /// Remaps every completed strip past the watermark through `palette`.
    ///
    /// Returns the number of strips touched. A repeat call with nothing new
    /// decoded leaves the page alone.
    pub fn harmonise(&mut self, palette: u8, order: PaletteOrder) -> usize {
        let tones = tone_table(palette, order);
        let start = self.harmonised;
        for strip in &mut self.lines[start..self.row] {
            for line in strip.iter_mut() {
                for byte in line.iter_mut() {
                    *byte = remap_byte(*byte, &tones);
                }
            }
        }
        self.harmonised = self.row;
        self.row - start
    }
}

fn set_packed(line: &mut [u8; PACKED_LINE_LEN], x: usize, tone: u8) {
    let shift = 6 - 2 * (x % PIXELS_PER_BYTE);
    let byte = &mut line[x / PIXELS_PER_BYTE];
    *byte = (*byte & !(3 << shift)) | ((tone & 3) << shift);
}

fn get_packed(line: &[u8; PACKED_LINE_LEN], x: usize) -> u8 {
    let shift = 6 - 2 * (x % PIXELS_PER_BYTE);
    (line[x / PIXELS_PER_BYTE] >> shift) & 3
}

fn remap_byte(byte: u8, tones: &[u8; MAX_TONES]) -> u8 {
    let mut out = 0;
    for shift in [0, 2, 4, 6] {
        let tone = (byte >> shift) & 3;
        out |= tones[usize::from(tone)] << shift;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Tile whose row `j` has every pixel set to tone `j % 4`.
    fn striped_tile() -> Tile {
        let mut tile = [0u8; 16];
        for j in 0..8 {
            let tone = j % 4;
            tile[j * 2] = if tone & 1 != 0 { 0xFF } else { 0x00 };
            tile[j * 2 + 1] = if tone & 2 != 0 { 0xFF } else { 0x00 };
        }
        tile
    }

    #[test]
    fn test_tone_tables() {
        assert_eq!(tone_table(0xE4, PaletteOrder::LsbFirst), [0, 1, 2, 3]);
        assert_eq!(tone_table(0x00, PaletteOrder::LsbFirst), [0, 1, 2, 3]);
        assert_eq!(tone_table(0xE4, PaletteOrder::MsbFirst), [3, 2, 1, 0]);
        assert_eq!(tone_table(0x1B, PaletteOrder::LsbFirst), [3, 2, 1, 0]);
    }

    #[test]
    fn test_gray_levels() {
        assert_eq!(gray_level(0), 255);
        assert_eq!(gray_level(1), 130);
        assert_eq!(gray_level(2), 64);
        assert_eq!(gray_level(3), 0);
        assert_eq!(gray_level(9), 0);
    }

    #[test]
    fn test_decode_tile_bit_planes() {
        let mut page: PageBuffer<2> = PageBuffer::new();
        let mut tile = [0u8; 16];
        // Row 0: lo = 1000_0001, hi = 1100_0000
        tile[0] = 0b1000_0001;
        tile[1] = 0b1100_0000;
        assert_eq!(page.decode_tile(&tile), Ok(false));
        assert_eq!(page.pixel(0, 0), Some(3));
        assert_eq!(page.pixel(1, 0), Some(2));
        assert_eq!(page.pixel(2, 0), Some(0));
        assert_eq!(page.pixel(7, 0), Some(1));
        assert_eq!(page.pixel(0, 1), Some(0));
        assert_eq!(page.pixel(PAGE_WIDTH, 0), None);
    }

    #[test]
    fn test_twenty_tiles_complete_a_strip() {
        let mut page: PageBuffer<2> = PageBuffer::new();
        let tile = striped_tile();
        for i in 0..TILES_PER_LINE {
            let done = page.decode_tile(&tile).expect("room");
            assert_eq!(done, i == TILES_PER_LINE - 1);
        }
        assert_eq!(page.rows(), 1);
        assert_eq!(page.height(), 8);
        assert_eq!(page.pending_tiles(), 0);

        let mut line = [0u8; PAGE_WIDTH];
        page.line_into(3, &mut line).expect("line");
        assert!(line.iter().all(|t| *t == 3));
        assert_eq!(page.line_into(8, &mut line), Err(Error::TileSlot { column: 0, row: 1 }));
        let mut short = [0u8; 10];
        assert_eq!(page.line_into(0, &mut short), Err(Error::BufferTooSmall));
    }

    #[test]
    fn test_page_full_is_reported() {
        let mut page: PageBuffer<1> = PageBuffer::new();
        let tile = [0u8; 16];
        for _ in 0..TILES_PER_LINE {
            let _ = page.decode_tile(&tile).expect("room");
        }
        assert_eq!(page.decode_tile(&tile), Err(Error::PageFull { rows: 1 }));
        assert_eq!(
            page.write_tile(&tile, TILES_PER_LINE, 0),
            Err(Error::TileSlot { column: 20, row: 0 })
        );
    }

    #[test]
    fn test_harmonise_is_idempotent() {
        let mut page: PageBuffer<3> = PageBuffer::new();
        let tile = striped_tile();
        for _ in 0..TILES_PER_LINE {
            let _ = page.decode_tile(&tile).expect("room");
        }
        assert_eq!(page.harmonise(0x1B, PaletteOrder::LsbFirst), 1);
        assert_eq!(page.pixel(0, 0), Some(3));
        assert_eq!(page.pixel(0, 3), Some(0));

        let before = page.clone();
        assert_eq!(page.harmonise(0x1B, PaletteOrder::LsbFirst), 0);
        assert_eq!(page.lines, before.lines);

        // A later strip is remapped on its own.
        for _ in 0..TILES_PER_LINE {
            let _ = page.decode_tile(&tile).expect("room");
        }
        assert_eq!(page.harmonise(0x1B, PaletteOrder::LsbFirst), 1);
        assert_eq!(page.harmonised_rows(), 2);
        assert_eq!(page.pixel(0, 8), Some(3));
        assert_eq!(page.pixel(0, 0), Some(3));
    }

    #[test]
    fn test_reset_clears_page() {
        let mut page: PageBuffer<1> = PageBuffer::new();
        let _ = page.decode_tile(&[0xFF; 16]).expect("room");
        assert!(!page.is_empty());
        page.reset();
        assert!(page.is_empty());
        assert_eq!(page.pixel(0, 0), Some(0));
        assert_eq!(page.capacity(), 1);
    }

    proptest! {
        #[test]
        fn prop_tile_survives_page_round_trip(tile in any::<[u8; 16]>(), column in 0usize..20) {
            let mut page: PageBuffer<1> = PageBuffer::new();
            page.write_tile(&tile, column, 0).expect("slot");
            let mut rebuilt = [0u8; 16];
            for j in 0..8 {
                for i in 0..8 {
                    let tone = page.pixel(column * 8 + i, j).expect("pixel");
                    rebuilt[j * 2] |= (tone & 1) << (7 - i);
                    rebuilt[j * 2 + 1] |= ((tone >> 1) & 1) << (7 - i);
                }
            }
            prop_assert_eq!(rebuilt, tile);
        }
    }
}
