//! Tile accumulation and run length decoding of DATA payloads.
//!
//! Compressed payloads are a sequence of runs, each led by a control byte `b`:
//!
//! - `b < 0x80`: `b + 1` literal bytes follow.
//! - `b >= 0x80`: one byte follows and is repeated `b - 0x80 + 2` times.
//!
//! Runs may straddle chunk and packet boundaries, so the decoder keeps its run
//! state between calls.

use crate::consts::TILE_SIZE;
use crate::error::{Error, Result};

/// One 8x8 tile, two bit planes interleaved per row.
pub type Tile = [u8; TILE_SIZE];

/// Longest literal run a single control byte can describe.
const MAX_LITERAL_RUN: usize = 128;

/// Shortest and longest repeat run a single control byte can describe.
const MIN_REPEAT_RUN: usize = 2;
const MAX_REPEAT_RUN: usize = 129;

/// Collects bytes until a full tile is available.
#[derive(Clone, Debug, Default)]
pub struct TileAccumulator {
    tile: Tile,
    count: usize,
}

impl TileAccumulator {
    /// Creates an empty accumulator.
    pub const fn new() -> Self {
        Self {
            tile: [0; TILE_SIZE],
            count: 0,
        }
    }

    /// Bytes collected so far.
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Nothing collected.
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// A whole tile is waiting to be taken.
    pub const fn is_full(&self) -> bool {
        self.count == TILE_SIZE
    }

    /// Adds a byte; returns `true` once the tile is complete.
    ///
    /// A full accumulator refuses further bytes until the tile is taken.
    pub fn insert_byte(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return true;
        }
        self.tile[self.count] = byte;
        self.count += 1;
        self.is_full()
    }

    /// Clears a completed tile; returns `false` if it was not complete yet.
    pub fn ready(&mut self) -> bool {
        if !self.is_full() {
            return false;
        }
        self.count = 0;
        true
    }

    /// Tile contents. Only meaningful once [`is_full`](Self::is_full).
    pub const fn tile(&self) -> &Tile {
        &self.tile
    }

    /// Hands out the completed tile and starts a new one.
    pub fn take(&mut self) -> Option<Tile> {
        if self.ready() {
            Some(self.tile)
        } else {
            None
        }
    }

    /// Drops any partial tile.
    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// Streaming payload decoder feeding a [`TileAccumulator`].
///
/// Each call consumes the chunk until a tile completes or the chunk runs out.
/// The read position in the chunk is kept between calls, so the same chunk
/// must be passed again until [`decompress`](Self::decompress) returns
/// `false`; at that point the position rewinds for the next chunk.
#[derive(Clone, Debug, Default)]
pub struct Decompressor {
    compressed: bool,
    /// Current run repeats a single byte.
    compressed_run: bool,
    /// The control byte was read; its repeat byte was not.
    awaiting_repeat: bool,
    repeat_byte: u8,
    /// Bytes left to emit from the current run.
    run_left: u8,
    cursor: usize,
}

impl Decompressor {
    /// Creates a decoder for uncompressed payloads.
    pub const fn new() -> Self {
        Self {
            compressed: false,
            compressed_run: false,
            awaiting_repeat: false,
            repeat_byte: 0,
            run_left: 0,
            cursor: 0,
        }
    }

    /// Whether incoming data is run length encoded.
    pub const fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Switches mode for the next packet. Leaving compressed mode drops any open run.
    pub fn set_compression(&mut self, compressed: bool) {
        if !compressed {
            self.clear_run();
        }
        self.compressed = compressed;
    }

    /// Forgets all run state and the chunk position.
    pub fn reset(&mut self) {
        *self = Self {
            compressed: self.compressed,
            ..Self::new()
        };
    }

    /// Decodes from `chunk` into `acc`.
    ///
    /// Returns `true` when `acc` holds a full tile. Returns `false` once the
    /// chunk is exhausted; a run cut short resumes on the next chunk.
    pub fn decompress(&mut self, chunk: &[u8], acc: &mut TileAccumulator) -> bool {
        if acc.is_full() {
            return true;
        }
        if !self.compressed {
            loop {
                let Some(byte) = self.next_input(chunk) else {
                    return false;
                };
                if acc.insert_byte(byte) {
                    return true;
                }
            }
        }

        loop {
            if self.run_left == 0 {
                let Some(control) = self.next_input(chunk) else {
                    return false;
                };
                if control < 0x80 {
                    self.run_left = control + 1;
                    self.compressed_run = false;
                } else {
                    self.run_left = control - 0x80 + 2;
                    self.compressed_run = true;
                    self.awaiting_repeat = true;
                }
            } else if self.awaiting_repeat {
                let Some(byte) = self.next_input(chunk) else {
                    return false;
                };
                self.repeat_byte = byte;
                self.awaiting_repeat = false;
            } else {
                let byte = if self.compressed_run {
                    self.repeat_byte
                } else {
                    let Some(byte) = self.next_input(chunk) else {
                        return false;
                    };
                    byte
                };
                self.run_left -= 1;
                if acc.insert_byte(byte) {
                    return true;
                }
            }
        }
    }

    fn next_input(&mut self, chunk: &[u8]) -> Option<u8> {
        match chunk.get(self.cursor) {
            Some(&byte) => {
                self.cursor += 1;
                Some(byte)
            }
            None => {
                self.cursor = 0;
                None
            }
        }
    }

    fn clear_run(&mut self) {
        self.compressed_run = false;
        self.awaiting_repeat = false;
        self.repeat_byte = 0;
        self.run_left = 0;
    }
}

/// Run length encodes `input` into `output`, returning the encoded length.
///
/// Two or more equal bytes become a repeat run; everything else is packed
/// into literal runs. Fails with [`Error::BufferTooSmall`] if `output` cannot
/// hold the result.
pub fn compress(input: &[u8], output: &mut [u8]) -> Result<usize> {
    let mut out = 0;
    let mut literal_start = 0;
    let mut i = 0;

    while i < input.len() {
        let mut run = 1;
        while i + run < input.len() && run < MAX_REPEAT_RUN && input[i + run] == input[i] {
            run += 1;
        }

        if run >= MIN_REPEAT_RUN {
            out = flush_literals(&input[literal_start..i], output, out)?;
            let slot = output.get_mut(out..out + 2).ok_or(Error::BufferTooSmall)?;
            slot[0] = 0x80 + (run - MIN_REPEAT_RUN) as u8;
            slot[1] = input[i];
            out += 2;
            i += run;
            literal_start = i;
        } else {
            i += 1;
        }
    }
    flush_literals(&input[literal_start..], output, out)
}

fn flush_literals(literals: &[u8], output: &mut [u8], mut out: usize) -> Result<usize> {
    for run in literals.chunks(MAX_LITERAL_RUN) {
        let slot = output
            .get_mut(out..out + 1 + run.len())
            .ok_or(Error::BufferTooSmall)?;
        slot[0] = (run.len() - 1) as u8;
        slot[1..].copy_from_slice(run);
        out += slot.len();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn drain(dec: &mut Decompressor, chunk: &[u8], acc: &mut TileAccumulator, tiles: &mut Vec<Tile>) {
        while dec.decompress(chunk, acc) {
            tiles.push(acc.take().expect("full tile"));
        }
    }

    #[test]
    fn test_accumulator_fires_once_per_tile() {
        let mut acc = TileAccumulator::new();
        for i in 0..15u8 {
            assert!(!acc.insert_byte(i));
        }
        assert!(!acc.ready());
        assert!(acc.insert_byte(15));
        assert!(acc.insert_byte(99));
        assert_eq!(acc.tile()[15], 15);
        assert!(acc.ready());
        assert!(acc.is_empty());
        assert!(!acc.ready());
    }

    #[test]
    fn test_uncompressed_chunk_yields_tiles() {
        let mut dec = Decompressor::new();
        let mut acc = TileAccumulator::new();
        let data: Vec<u8> = (0..40).collect();
        let mut tiles = Vec::new();
        drain(&mut dec, &data, &mut acc, &mut tiles);
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[1][0], 16);
        assert_eq!(acc.len(), 8);
    }

    #[test]
    fn test_literal_and_repeat_runs() {
        let mut dec = Decompressor::new();
        dec.set_compression(true);
        let mut acc = TileAccumulator::new();
        // 4 literals, then 0xAB repeated 12 times.
        let data = [0x03, 1, 2, 3, 4, 0x8A, 0xAB];
        let mut tiles = Vec::new();
        drain(&mut dec, &data, &mut acc, &mut tiles);
        assert_eq!(tiles.len(), 1);
        assert_eq!(&tiles[0][..4], &[1, 2, 3, 4]);
        assert!(tiles[0][4..].iter().all(|b| *b == 0xAB));
    }

    #[test]
    fn test_run_spans_chunk_boundary() {
        let mut dec = Decompressor::new();
        dec.set_compression(true);
        let mut acc = TileAccumulator::new();
        let mut tiles = Vec::new();
        // Control byte in one chunk, repeat byte in the next.
        drain(&mut dec, &[0x8E], &mut acc, &mut tiles);
        assert!(tiles.is_empty());
        drain(&mut dec, &[0x5A], &mut acc, &mut tiles);
        assert_eq!(tiles, vec![[0x5A; 16]]);

        // Literal run split over two chunks.
        drain(&mut dec, &[0x0F, 0, 1, 2, 3, 4, 5, 6, 7], &mut acc, &mut tiles);
        drain(&mut dec, &[8, 9, 10, 11, 12, 13, 14, 15], &mut acc, &mut tiles);
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[1][15], 15);
    }

    #[test]
    fn test_repeat_run_finishes_without_more_input() {
        let mut dec = Decompressor::new();
        dec.set_compression(true);
        let mut acc = TileAccumulator::new();
        let mut tiles = Vec::new();
        // 34 copies: two full tiles and two bytes left over.
        drain(&mut dec, &[0xA0, 0x11], &mut acc, &mut tiles);
        assert_eq!(tiles.len(), 2);
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn test_disabling_compression_drops_open_run() {
        let mut dec = Decompressor::new();
        dec.set_compression(true);
        let mut acc = TileAccumulator::new();
        assert!(!dec.decompress(&[0x85], &mut acc));
        dec.set_compression(false);
        let data = [7u8; 16];
        assert!(dec.decompress(&data, &mut acc));
        assert_eq!(acc.take(), Some([7u8; 16]));
    }

    #[test]
    fn test_compress_uses_both_run_kinds() {
        let input = [1, 2, 3, 9, 9, 9, 9];
        let mut out = [0u8; 16];
        let n = compress(&input, &mut out).expect("fits");
        assert_eq!(&out[..n], &[0x02, 1, 2, 3, 0x82, 9]);
    }

    #[test]
    fn test_compress_reports_small_buffer() {
        let mut out = [0u8; 3];
        assert_eq!(compress(&[1, 2, 3, 4], &mut out), Err(Error::BufferTooSmall));
    }

    #[test]
    fn test_compress_splits_long_runs() {
        let input = [0u8; 300];
        let mut out = [0u8; 16];
        let n = compress(&input, &mut out).expect("fits");
        // 129 + 129 + 42
        assert_eq!(&out[..n], &[0xFF, 0, 0xFF, 0, 0xA8, 0]);
    }

    proptest! {
        #[test]
        fn prop_uncompressed_tile_round_trip(tile in any::<[u8; 16]>()) {
            let mut dec = Decompressor::new();
            let mut acc = TileAccumulator::new();
            prop_assert!(dec.decompress(&tile, &mut acc));
            prop_assert_eq!(acc.take(), Some(tile));
            prop_assert!(!dec.decompress(&tile, &mut acc));
        }

        #[test]
        fn prop_rle_round_trip(
            tiles in prop::collection::vec(any::<[u8; 16]>(), 0..8),
            runs in prop::collection::vec(0usize..4, 0..8),
            chunk_len in 1usize..40,
        ) {
            // Bias towards repeats so both run kinds are exercised.
            let mut raw: Vec<u8> = tiles.iter().flatten().copied().collect();
            for (i, len) in runs.iter().enumerate() {
                if let Some(pos) = raw.len().checked_sub(16 * (i + 1)) {
                    let value = raw[pos];
                    for b in raw.iter_mut().skip(pos).take(*len * 4) {
                        *b = value;
                    }
                }
            }

            let mut encoded = vec![0u8; raw.len() * 2 + 2];
            let n = compress(&raw, &mut encoded).expect("worst case fits");

            let mut dec = Decompressor::new();
            dec.set_compression(true);
            let mut acc = TileAccumulator::new();
            let mut decoded: Vec<Tile> = Vec::new();
            for chunk in encoded[..n].chunks(chunk_len) {
                drain(&mut dec, chunk, &mut acc, &mut decoded);
            }
            let flat: Vec<u8> = decoded.iter().flatten().copied().collect();
            prop_assert_eq!(flat, raw);
            prop_assert!(acc.is_empty());
        }
    }
}
