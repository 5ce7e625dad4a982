//! Error type for the consumer-side APIs.
//!
//! Link and framing faults are never reported through here: they are
//! recovered in place and only show up in the status register. These errors
//! cover misuse of the page buffer and encoder.

use thiserror::Error;

/// Errors reported by the decoding pipeline.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Error {
    /// Every tile row of the page buffer is in use.
    #[error("page buffer full ({rows} tile rows)")]
    PageFull {
        /// Capacity of the page in tile rows.
        rows: usize,
    },

    /// A tile was addressed outside the page.
    #[error("tile slot out of range (column {column}, row {row})")]
    TileSlot {
        /// Requested column slot.
        column: usize,
        /// Requested row slot.
        row: usize,
    },

    /// Output buffer cannot hold the encoded data.
    #[error("output buffer too small")]
    BufferTooSmall,
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
