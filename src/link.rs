//! Bit level link transceiver.
//!
//! The console is the clock master. It idles the clock high, changes its data
//! line on the falling edge and samples ours on the rising edge (CPOL = 1,
//! CPHA = 1). The printer mirrors that: every rising edge shifts one bit into
//! the receive register and the falling edge before it puts the next transmit
//! bit on the output line.
//!
//! Two front ends are provided:
//!
//! - [`LinkTransceiver`] is fed pin levels, one edge at a time. It supports a
//!   dual edge ISR ([`clock_edge`](LinkTransceiver::clock_edge)) and a rising
//!   edge only ISR ([`clock_rising`](LinkTransceiver::clock_rising)).
//! - [`ByteLink`] is fed whole bytes, for replaying captured packets.
//!
//! Neither decides what the next word looks like. Every completed word is
//! returned as a [`LinkEvent::Word`] and the caller must load the next
//! exchange with `next()` before the following clock edge arrives.

use crate::consts::SYNC_WORD;
use heapless::Vec;

/// Shape of the word being exchanged.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum WordMode {
    /// No exchange in progress; the link goes back to hunting for the sync word.
    #[default]
    Reset,
    /// One byte, MSB first.
    Bits8,
    /// Two bytes, high byte first.
    Bits16BigEndian,
    /// Two bytes, low byte first.
    Bits16LittleEndian,
}

impl WordMode {
    /// Number of bytes clocked for this mode.
    pub const fn wire_len(self) -> usize {
        match self {
            WordMode::Reset => 0,
            WordMode::Bits8 => 1,
            WordMode::Bits16BigEndian | WordMode::Bits16LittleEndian => 2,
        }
    }
}

/// A completed exchange, as both sides saw it on the wire.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct LinkWord {
    /// Mode the word was clocked in.
    pub mode: WordMode,
    /// Bits received from the console, first bit in the MSB of the word.
    pub rx: u16,
    /// Bits sent to the console, same layout as `rx`.
    pub tx: u16,
}

impl LinkWord {
    /// The received value with the byte order of `mode` applied.
    pub const fn value(self) -> u16 {
        match self.mode {
            WordMode::Bits8 => self.rx & 0x00FF,
            WordMode::Bits16LittleEndian => self.rx.swap_bytes(),
            WordMode::Reset | WordMode::Bits16BigEndian => self.rx,
        }
    }

    /// Low byte of the received register.
    pub const fn low_byte(self) -> u8 {
        (self.rx & 0x00FF) as u8
    }

    /// High byte of the received register.
    pub const fn high_byte(self) -> u8 {
        (self.rx >> 8) as u8
    }

    /// Console to printer bytes in the order they were clocked.
    pub fn rx_bytes(self) -> Vec<u8, 2> {
        wire_bytes(self.rx, self.mode)
    }

    /// Printer to console bytes in the order they were clocked.
    pub fn tx_bytes(self) -> Vec<u8, 2> {
        wire_bytes(self.tx, self.mode)
    }
}

fn wire_bytes(reg: u16, mode: WordMode) -> Vec<u8, 2> {
    let mut out = Vec::new();
    match mode.wire_len() {
        1 => {
            let _ = out.push((reg & 0x00FF) as u8);
        }
        2 => {
            let _ = out.push((reg >> 8) as u8);
            let _ = out.push((reg & 0x00FF) as u8);
        }
        _ => {}
    }
    out
}

/// What a clock edge produced.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum LinkEvent {
    /// Nothing to report.
    #[default]
    None,
    /// The sync word was matched; a packet header follows.
    Synchronised,
    /// A word exchange finished. The caller must call `next()` now.
    Word(LinkWord),
}

/// Mask driven shift register shared by both front ends.
#[derive(Clone, Copy, Debug)]
struct Shifter {
    mode: WordMode,
    /// Single bit marking the current position; zero when idle.
    mask: u16,
    rx: u16,
    tx: u16,
}

impl Shifter {
    const fn idle() -> Self {
        Self {
            mode: WordMode::Reset,
            mask: 0,
            rx: 0,
            tx: 0xFFFF,
        }
    }

    fn load(&mut self, mode: WordMode, tx: u16) {
        self.rx = 0;
        self.mode = mode;
        match mode {
            WordMode::Reset => *self = Self::idle(),
            WordMode::Bits8 => {
                self.mask = 1 << 7;
                self.tx = tx;
            }
            WordMode::Bits16BigEndian => {
                self.mask = 1 << 15;
                self.tx = tx;
            }
            WordMode::Bits16LittleEndian => {
                self.mask = 1 << 15;
                self.tx = tx.swap_bytes();
            }
        }
    }

    const fn active(&self) -> bool {
        self.mask != 0
    }

    const fn tx_bit(&self) -> bool {
        self.mask & self.tx != 0
    }

    /// Samples one bit; returns `true` when the word is complete.
    fn shift_in(&mut self, bit: bool) -> bool {
        if bit {
            self.rx |= self.mask;
        }
        self.mask >>= 1;
        self.mask == 0
    }

    const fn word(&self) -> LinkWord {
        LinkWord {
            mode: self.mode,
            rx: self.rx,
            tx: self.tx,
        }
    }
}

/// Pin level transceiver for the printer side of the link.
///
/// Drive it from the clock line interrupt and write [`output`](Self::output)
/// to the console's serial-in pin after every call.
#[derive(Clone, Debug)]
pub struct LinkTransceiver {
    preamble: u16,
    synced: bool,
    shifter: Shifter,
    out: bool,
}

impl Default for LinkTransceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkTransceiver {
    /// Creates an unsynchronised transceiver.
    pub const fn new() -> Self {
        Self {
            preamble: 0,
            synced: false,
            shifter: Shifter::idle(),
            out: false,
        }
    }

    /// `true` between a matched sync word and the end of the status exchange.
    pub const fn is_synchronised(&self) -> bool {
        self.synced
    }

    /// Mode of the exchange in progress.
    pub const fn mode(&self) -> WordMode {
        self.shifter.mode
    }

    /// Level to drive on the console's serial-in line.
    pub const fn output(&self) -> bool {
        self.out
    }

    /// Drops sync and goes back to hunting for the preamble.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Loads the next exchange.
    ///
    /// `tx` is the value to send, given in the same byte order as the value
    /// that will be received. [`WordMode::Reset`] ends the packet and drops sync.
    pub fn next(&mut self, mode: WordMode, tx: u16) {
        self.shifter.load(mode, tx);
        if mode == WordMode::Reset {
            self.synced = false;
            self.out = false;
        }
    }

    /// Puts the first bit of a freshly loaded word on the output.
    ///
    /// Only needed with [`clock_rising`](Self::clock_rising), which has no
    /// falling edge to do it.
    pub fn prime_output(&mut self) {
        self.out = self.shifter.tx_bit();
    }

    /// Handles a rising clock edge when falling edges are not observed.
    ///
    /// The output for the next bit is updated straight after sampling.
    pub fn clock_rising(&mut self, sout: bool) -> LinkEvent {
        if !self.synced {
            return self.hunt(sout);
        }
        if !self.shifter.active() {
            return LinkEvent::None;
        }
        let done = self.shifter.shift_in(sout);
        self.out = self.shifter.tx_bit();
        if done {
            LinkEvent::Word(self.shifter.word())
        } else {
            LinkEvent::None
        }
    }

    /// Handles either clock edge. `sclk` is the clock level after the edge.
    pub fn clock_edge(&mut self, sclk: bool, sout: bool) -> LinkEvent {
        if !self.synced {
            if !sclk {
                return LinkEvent::None;
            }
            return self.hunt(sout);
        }
        if !self.shifter.active() {
            return LinkEvent::None;
        }
        if !sclk {
            self.out = self.shifter.tx_bit();
            return LinkEvent::None;
        }
        if self.shifter.shift_in(sout) {
            LinkEvent::Word(self.shifter.word())
        } else {
            LinkEvent::None
        }
    }

    fn hunt(&mut self, sout: bool) -> LinkEvent {
        self.preamble = (self.preamble << 1) | u16::from(sout);
        if self.preamble != SYNC_WORD {
            return LinkEvent::None;
        }
        trace!("link: sync word found");
        self.preamble = 0;
        self.synced = true;
        self.shifter.load(WordMode::Bits16BigEndian, 0);
        LinkEvent::Synchronised
    }
}

/// Byte level front end for replaying captured traffic.
///
/// The sync word is matched on byte boundaries only, so stray bit patterns in
/// noise cannot trigger it. Once synchronised, each byte is clocked through
/// the same shift register as [`LinkTransceiver`].
#[derive(Clone, Debug)]
pub struct ByteLink {
    preamble: u16,
    synced: bool,
    shifter: Shifter,
}

impl Default for ByteLink {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteLink {
    /// Creates an unsynchronised byte link.
    pub const fn new() -> Self {
        Self {
            preamble: 0,
            synced: false,
            shifter: Shifter::idle(),
        }
    }

    /// `true` between a matched sync word and the end of the status exchange.
    pub const fn is_synchronised(&self) -> bool {
        self.synced
    }

    /// Drops sync and goes back to hunting for the preamble.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Loads the next exchange, see [`LinkTransceiver::next`].
    pub fn next(&mut self, mode: WordMode, tx: u16) {
        self.shifter.load(mode, tx);
        if mode == WordMode::Reset {
            self.synced = false;
            self.preamble = 0;
        }
    }

    /// Clocks one byte from the console.
    ///
    /// Returns the byte the printer drives back during the same eight clocks,
    /// and the event the byte completed.
    pub fn push(&mut self, byte: u8) -> (u8, LinkEvent) {
        if !self.synced {
            self.preamble = (self.preamble << 8) | u16::from(byte);
            if self.preamble != SYNC_WORD {
                return (0, LinkEvent::None);
            }
            trace!("link: sync bytes found");
            self.preamble = 0;
            self.synced = true;
            self.shifter.load(WordMode::Bits16BigEndian, 0);
            return (0, LinkEvent::Synchronised);
        }

        let mut response = 0u8;
        for bit in (0..8).rev() {
            if !self.shifter.active() {
                break;
            }
            response = (response << 1) | u8::from(self.shifter.tx_bit());
            if self.shifter.shift_in(byte & (1 << bit) != 0) {
                return (response, LinkEvent::Word(self.shifter.word()));
            }
        }
        (response, LinkEvent::None)
    }
}
