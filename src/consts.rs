//! Constants used across the printer link protocol implementation.
//!
//! This module defines the wire constants of the Game Boy Printer packet
//! protocol, the status register layout, the tile and page geometry used by
//! the image reconstructor, and the timing/countdown values used to fake a
//! real printer's busy behaviour.
//!
//! ## Packet Layout
//!
//! ```text
//! | 0x88 0x33 | CMD | COMP | LEN_LO LEN_HI | PAYLOAD (LEN) | SUM_LO SUM_HI | DEV_ID | STATUS |
//! ```
//!
//! - **Sync word**: `0x8833`, sent MSB first, is the only framing marker.
//! - **Length and checksum** are little-endian.
//! - **Device ID and status** are clocked back to the console while it sends
//!   two filler bytes.

/// First byte of the sync word.
pub const SYNC_BYTE_0: u8 = 0x88;

/// Second byte of the sync word.
pub const SYNC_BYTE_1: u8 = 0x33;

/// The 16 bit preamble that marks the start of every packet.
pub const SYNC_WORD: u16 = 0x8833;

/// Device ID answered during the status exchange.
///
/// MSB is always set, the lower 7 bits are the device number (1 = Pocket Printer).
pub const DEVICE_ID: u8 = 0x81;

/// Compression byte value for raw tile data.
pub const COMPRESSION_DISABLED: u8 = 0x00;

/// Compression byte value for run length encoded tile data.
pub const COMPRESSION_ENABLED: u8 = 0x01;

/// Size of the print instruction payload.
pub const PRINT_INSTRUCTION_LEN: usize = 4;

/// Index of the sheet count inside the print instruction.
pub const PRINT_INDEX_SHEETS: usize = 0;

/// Index of the linefeed nibbles inside the print instruction.
pub const PRINT_INDEX_LINEFEED: usize = 1;

/// Index of the palette byte inside the print instruction.
pub const PRINT_INDEX_PALETTE: usize = 2;

/// Index of the print density inside the print instruction.
pub const PRINT_INDEX_DENSITY: usize = 3;

/// A palette byte of `0x00` behaves like this palette on real hardware.
pub const DEFAULT_PALETTE: u8 = 0xE4;

/// Status bit: battery too low.
pub const STATUS_LOW_BATTERY: u8 = 1 << 7;
/// Status bit: other error.
pub const STATUS_OTHER_ERROR: u8 = 1 << 6;
/// Status bit: paper jam.
pub const STATUS_PAPER_JAM: u8 = 1 << 5;
/// Status bit: packet error.
pub const STATUS_PACKET_ERROR: u8 = 1 << 4;
/// Status bit: unprocessed data.
pub const STATUS_UNPROCESSED_DATA: u8 = 1 << 3;
/// Status bit: image data buffer full.
pub const STATUS_BUFFER_FULL: u8 = 1 << 2;
/// Status bit: printer busy.
pub const STATUS_PRINTER_BUSY: u8 = 1 << 1;
/// Status bit: checksum error.
pub const STATUS_CHECKSUM_ERROR: u8 = 1 << 0;

/// Link inactivity after which the whole session is reset.
pub const LINK_TIMEOUT_MS: u32 = 500;

/// Inquiry packets the fake printer reports busy after a print instruction.
///
/// A real printer takes roughly 68 inquiries to finish; games accept less.
pub const BUSY_PACKET_COUNT: u8 = 20;

/// DATA packets counted down after an INIT.
pub const DATA_PACKET_COUNT: u8 = 6;

/// Inquiry packets after a DATA packet before unprocessed data clears.
pub const UNTRANS_PACKET_COUNT: u8 = 3;

/// Bytes in one 8x8 2bpp tile.
pub const TILE_SIZE: usize = 16;

/// Tile width in pixels.
pub const TILE_WIDTH: usize = 8;

/// Tile height in pixels.
pub const TILE_HEIGHT: usize = 8;

/// Tiles across one printed line.
pub const TILES_PER_LINE: usize = 20;

/// Page width in pixels.
pub const PAGE_WIDTH: usize = TILE_WIDTH * TILES_PER_LINE;

/// Pixels packed into a single byte of the page buffer.
pub const PIXELS_PER_BYTE: usize = 4;

/// Bytes used by one packed pixel line.
pub const PACKED_LINE_LEN: usize = PAGE_WIDTH / PIXELS_PER_BYTE;

/// Number of distinct tones (2 bits per pixel).
pub const MAX_TONES: usize = 4;

/// Packet events that may wait for the consumer.
pub const EVENT_QUEUE_LEN: usize = 16;

/// Payload bytes pulled from the ring per decoder pass.
pub const DECODE_CHUNK_LEN: usize = 32;
