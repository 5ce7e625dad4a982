//! Printer status register.
//!
//! The status byte is clocked back to the console at the end of every packet.
//! Only the framing state machine mutates it; everything else reads it.

use crate::consts::{
    DEVICE_ID, STATUS_BUFFER_FULL, STATUS_CHECKSUM_ERROR, STATUS_LOW_BATTERY,
    STATUS_OTHER_ERROR, STATUS_PACKET_ERROR, STATUS_PAPER_JAM, STATUS_PRINTER_BUSY,
    STATUS_UNPROCESSED_DATA,
};

/// 8 bit printer status bitfield.
///
/// | Bit | Meaning |
/// |-----|---------|
/// | 7 | low battery |
/// | 6 | other error |
/// | 5 | paper jam |
/// | 4 | packet error |
/// | 3 | unprocessed data |
/// | 2 | buffer full |
/// | 1 | printer busy |
/// | 0 | checksum error |
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Status(u8);

impl Status {
    /// Builds a status from raw bits.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw status byte as sent on the wire.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// The 16 bit word sent during the status exchange: device ID high, status low.
    pub const fn exchange_word(self) -> u16 {
        ((DEVICE_ID as u16) << 8) | self.0 as u16
    }

    /// Returns `true` if every bit in `mask` is set.
    pub const fn contains(self, mask: u8) -> bool {
        self.0 & mask == mask
    }

    /// Sets or clears the bits in `mask`.
    pub fn set(&mut self, mask: u8, on: bool) {
        if on {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    /// Clears every bit.
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Battery too low.
    pub const fn low_battery(self) -> bool {
        self.contains(STATUS_LOW_BATTERY)
    }

    /// Other error.
    pub const fn other_error(self) -> bool {
        self.contains(STATUS_OTHER_ERROR)
    }

    /// Paper jam.
    pub const fn paper_jam(self) -> bool {
        self.contains(STATUS_PAPER_JAM)
    }

    /// Packet error.
    pub const fn packet_error(self) -> bool {
        self.contains(STATUS_PACKET_ERROR)
    }

    /// Image data received but not yet processed.
    pub const fn unprocessed_data(self) -> bool {
        self.contains(STATUS_UNPROCESSED_DATA)
    }

    /// Image buffer full.
    pub const fn buffer_full(self) -> bool {
        self.contains(STATUS_BUFFER_FULL)
    }

    /// Printer busy printing.
    pub const fn printer_busy(self) -> bool {
        self.contains(STATUS_PRINTER_BUSY)
    }

    /// Last packet failed its checksum.
    pub const fn checksum_error(self) -> bool {
        self.contains(STATUS_CHECKSUM_ERROR)
    }

    /// Any of the error bits (4..=7 and checksum) set.
    pub const fn has_error(self) -> bool {
        self.0
            & (STATUS_LOW_BATTERY
                | STATUS_OTHER_ERROR
                | STATUS_PAPER_JAM
                | STATUS_PACKET_ERROR
                | STATUS_CHECKSUM_ERROR)
            != 0
    }
}

impl From<u8> for Status {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_set_and_clear_bits() {
        let mut status = Status::default();
        status.set(STATUS_BUFFER_FULL, true);
        status.set(STATUS_PRINTER_BUSY, true);
        assert!(status.buffer_full());
        assert!(status.printer_busy());
        assert_eq!(status.bits(), 0b0000_0110);

        status.set(STATUS_BUFFER_FULL, false);
        assert!(!status.buffer_full());
        assert!(status.printer_busy());

        status.clear();
        assert_eq!(status.bits(), 0);
    }

    #[test]
    fn test_status_exchange_word_carries_device_id() {
        let status = Status::from_bits(STATUS_UNPROCESSED_DATA);
        assert_eq!(status.exchange_word(), 0x8108);
    }

    #[test]
    fn test_status_error_bits() {
        assert!(!Status::from_bits(STATUS_PRINTER_BUSY | STATUS_BUFFER_FULL).has_error());
        assert!(Status::from_bits(STATUS_PAPER_JAM).has_error());
        assert!(Status::from_bits(STATUS_CHECKSUM_ERROR).checksum_error());
        assert!(Status::from_bits(STATUS_LOW_BATTERY).low_battery());
        assert!(Status::from_bits(STATUS_OTHER_ERROR).other_error());
        assert!(Status::from_bits(STATUS_PACKET_ERROR).packet_error());
    }
}
