//! A complete printer session: link, framing, payload staging and decoding.
//!
//! [`Session`] owns every piece of protocol state. It has two sides:
//!
//! - **Producer**: [`on_rising`](Session::on_rising), [`on_change`](Session::on_change)
//!   or [`feed_byte`](Session::feed_byte), called per clock edge or per byte.
//!   These never block and return the level or byte to send back.
//! - **Consumer**: [`service`](Session::service), called from the main loop.
//!   It does at most one unit of work per call and returns
//!   [`nb::Error::WouldBlock`] once there is nothing left to do.
//!
//! Payload bytes of a DATA packet are staged while the packet is received and
//! only become visible to the consumer after its status exchange.
//!
//! ## Example
//!
//! ```rust
//! use gbprinter::session::{Config, Progress, Session};
//!
//! let mut session: Session<1024, 8> = Session::new(Config::new());
//! for byte in [0x88, 0x33, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00] {
//!     let _ = session.feed_byte(byte);
//! }
//! assert!(matches!(session.service(), Ok(Progress::Packet(_))));
//! ```

use crate::consts::{
    BUSY_PACKET_COUNT, DECODE_CHUNK_LEN, EVENT_QUEUE_LEN, LINK_TIMEOUT_MS, SYNC_BYTE_0,
    SYNC_BYTE_1,
};
use crate::error::Error;
use crate::link::{ByteLink, LinkEvent, LinkTransceiver, LinkWord};
use crate::packet::{Command, PacketEvent, PacketFramer, ParseState, PrintInstruction, WordRequest};
use crate::ring::RingBuffer;
use crate::rle::{Decompressor, TileAccumulator};
use crate::status::Status;
use crate::tiles::{PageBuffer, PaletteOrder};
use heapless::{Deque, Vec};

/// Session settings.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Config {
    /// Flag checksum mismatches and throw away the packet's image data.
    pub strict_checksum: bool,
    /// Link silence after which the session resets.
    pub timeout_ms: u32,
    /// Inquiries answered busy after a PRINT.
    pub busy_packet_count: u8,
    /// Palette bit order used when harmonising.
    pub palette_order: PaletteOrder,
    /// Keep a copy of every byte on the wire for a dumper.
    pub raw_dump: bool,
}

impl Config {
    /// Default settings, usable in `const` context.
    pub const fn new() -> Self {
        Self {
            strict_checksum: false,
            timeout_ms: LINK_TIMEOUT_MS,
            busy_packet_count: BUSY_PACKET_COUNT,
            palette_order: PaletteOrder::LsbFirst,
            raw_dump: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// One unit of consumer side work.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Progress {
    /// A packet other than PRINT was taken off the queue.
    Packet(PacketEvent),
    /// A tile was placed on the page.
    Tile {
        /// Column slot it went into.
        column: usize,
        /// Strip it went into.
        row: usize,
    },
    /// A tile finished strip `row`; its eight pixel lines are final.
    Line {
        /// Completed strip.
        row: usize,
    },
    /// A PRINT was applied to the page.
    ///
    /// With `page_end` set the page stays readable until the first tile of
    /// the next image is placed, or until [`Session::finish_page`].
    Printed {
        /// The instruction as received.
        instruction: PrintInstruction,
        /// Strips harmonised by this instruction.
        rows: usize,
        /// The instruction feeds paper after printing.
        page_end: bool,
    },
}

/// A queued packet with the number of payload bytes it committed.
#[derive(Clone, Copy, Debug)]
struct Pending {
    event: PacketEvent,
    payload: usize,
}

/// Printer emulation state for one link.
///
/// `N` is the capacity of the payload ring (and of the raw dump ring).
/// `ROWS` is the page height in tile strips.
#[derive(Debug)]
pub struct Session<const N: usize, const ROWS: usize> {
    config: Config,
    link: LinkTransceiver,
    bytes: ByteLink,
    framer: PacketFramer,
    payload: RingBuffer<N>,
    raw: RingBuffer<N>,
    events: Deque<Pending, EVENT_QUEUE_LEN>,
    events_dropped: u32,
    decoder: Decompressor,
    acc: TileAccumulator,
    page: PageBuffer<ROWS>,
    chunk: Vec<u8, DECODE_CHUNK_LEN>,
    /// Committed payload bytes of the packet being decoded, still in the ring.
    packet_left: usize,
    /// Watchdog countdown; zero when disarmed.
    timeout: u32,
    clear_page: bool,
}

impl<const N: usize, const ROWS: usize> Default for Session<N, ROWS> {
    fn default() -> Self {
        Self::new(Config::new())
    }
}

impl<const N: usize, const ROWS: usize> Session<N, ROWS> {
    /// Creates an idle session.
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            link: LinkTransceiver::new(),
            bytes: ByteLink::new(),
            framer: PacketFramer::new(config.busy_packet_count, config.strict_checksum),
            payload: RingBuffer::new(),
            raw: RingBuffer::new(),
            events: Deque::new(),
            events_dropped: 0,
            decoder: Decompressor::new(),
            acc: TileAccumulator::new(),
            page: PageBuffer::new(),
            chunk: Vec::new(),
            packet_left: 0,
            timeout: 0,
            clear_page: false,
        }
    }

    /// Active settings.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Live status register.
    pub const fn status(&self) -> Status {
        self.framer.status()
    }

    /// Framing position of the packet on the wire.
    pub const fn parse_state(&self) -> ParseState {
        self.framer.state()
    }

    /// A packet is being received on either front end.
    pub const fn is_synchronised(&self) -> bool {
        self.link.is_synchronised() || self.bytes.is_synchronised()
    }

    /// Level currently driven on the console's serial-in line.
    pub const fn output(&self) -> bool {
        self.link.output()
    }

    /// The page being assembled.
    pub const fn page(&self) -> &PageBuffer<ROWS> {
        &self.page
    }

    /// Payload ring high-water mark, optionally restarting it.
    pub fn waterline(&mut self, reset: bool) -> usize {
        self.payload.waterline(reset)
    }

    /// Payload bytes lost to a full ring.
    pub const fn dropped_bytes(&self) -> u32 {
        self.payload.dropped()
    }

    /// Packet events lost to a full queue.
    pub const fn dropped_events(&self) -> u32 {
        self.events_dropped
    }

    /// Next byte of the raw wire capture, when `raw_dump` is enabled.
    pub fn raw_byte(&mut self) -> Option<u8> {
        self.raw.dequeue()
    }

    /// Clears the page now.
    ///
    /// After a `Printed { page_end: true }` this happens by itself when the
    /// next tile arrives; call it to free the page earlier.
    pub fn finish_page(&mut self) {
        self.clear_page = false;
        self.page.reset();
    }

    /// `true` once a page end was printed and the page awaits clearing.
    pub const fn page_finished(&self) -> bool {
        self.clear_page
    }

    /// Drops everything: link sync, status, countdowns, buffers, decoder and page.
    pub fn reset(&mut self) {
        self.link.reset();
        self.bytes.reset();
        self.framer.reset();
        self.payload.reset();
        self.raw.reset();
        self.events.clear();
        self.decoder.reset();
        self.acc.reset();
        self.page.reset();
        self.chunk.clear();
        self.packet_left = 0;
        self.timeout = 0;
        self.clear_page = false;
    }

    /// Advances the watchdog by `elapsed_ms`.
    ///
    /// Returns `true` if the link was silent long enough to reset the session.
    pub fn tick(&mut self, elapsed_ms: u32) -> bool {
        if self.timeout == 0 {
            return false;
        }
        self.timeout = self.timeout.saturating_sub(elapsed_ms);
        if self.timeout > 0 {
            return false;
        }
        warn!("session: link timeout, resetting");
        self.reset();
        true
    }

    /// Rising clock edge, for ISRs that only see rising edges.
    ///
    /// Returns the level to drive on the console's serial-in line.
    pub fn on_rising(&mut self, sout: bool) -> bool {
        if let LinkEvent::Word(word) = self.link.clock_rising(sout) {
            let next = self.on_word(word);
            self.link.next(next.mode, next.tx);
            self.link.prime_output();
        }
        self.link.output()
    }

    /// Any clock edge; `sclk` is the clock level after the edge.
    ///
    /// Returns the level to drive on the console's serial-in line.
    pub fn on_change(&mut self, sclk: bool, sout: bool) -> bool {
        if let LinkEvent::Word(word) = self.link.clock_edge(sclk, sout) {
            let next = self.on_word(word);
            self.link.next(next.mode, next.tx);
        }
        self.link.output()
    }

    /// One byte from the console; returns the byte the printer answers with.
    pub fn feed_byte(&mut self, byte: u8) -> u8 {
        let (response, event) = self.bytes.push(byte);
        if let LinkEvent::Word(word) = event {
            let next = self.on_word(word);
            self.bytes.next(next.mode, next.tx);
        }
        response
    }

    fn on_word(&mut self, word: LinkWord) -> WordRequest {
        self.timeout = self.config.timeout_ms;

        if self.config.raw_dump {
            if self.framer.state() == ParseState::HeaderCommand {
                let _ = self.raw.enqueue(SYNC_BYTE_0);
                let _ = self.raw.enqueue(SYNC_BYTE_1);
            }
            let wire = if self.framer.state() == ParseState::StatusExchange {
                word.tx_bytes()
            } else {
                word.rx_bytes()
            };
            for byte in wire {
                let _ = self.raw.enqueue(byte);
            }
        }

        let step = self.framer.consume(word);
        if let Some(byte) = step.payload {
            if !self.payload.enqueue_staged(byte) {
                warn!("session: payload ring full, byte dropped");
            }
        }
        if let Some(event) = step.packet {
            self.commit(event);
        }
        step.next
    }

    /// Queues a finished packet and settles its staged payload.
    fn commit(&mut self, event: PacketEvent) {
        let accept = !self.config.strict_checksum || event.checksum_ok();
        let payload = if accept { self.payload.staged_count() } else { 0 };
        if self.events.push_back(Pending { event, payload }).is_err() {
            self.events_dropped = self.events_dropped.saturating_add(1);
            warn!("session: event queue full, packet dropped");
            self.payload.discard_staged();
            return;
        }
        if accept {
            self.payload.accept_staged();
        } else {
            debug!("session: discarding {} staged bytes", self.payload.staged_count());
            self.payload.discard_staged();
        }
    }

    /// Performs one unit of consumer work.
    ///
    /// Tiles of the current DATA packet are decoded before the next packet
    /// event is looked at, so a PRINT always sees the image sent before it.
    pub fn service(&mut self) -> nb::Result<Progress, Error> {
        if self.acc.is_full() {
            return self.place_tile();
        }

        loop {
            if !self.chunk.is_empty() {
                if self.decoder.decompress(&self.chunk, &mut self.acc) {
                    return self.place_tile();
                }
                self.chunk.clear();
            }
            if self.packet_left == 0 {
                break;
            }
            self.refill_chunk();
        }

        let Some(Pending { event, payload }) = self.events.pop_front() else {
            return Err(nb::Error::WouldBlock);
        };
        match event.command {
            Command::Init => {
                self.decoder.reset();
                self.acc.reset();
                Ok(Progress::Packet(event))
            }
            Command::Data => {
                self.decoder.set_compression(event.compressed);
                self.packet_left = payload;
                Ok(Progress::Packet(event))
            }
            Command::Print => {
                let instruction = event.print.unwrap_or_default();
                let rows = self
                    .page
                    .harmonise(instruction.palette, self.config.palette_order);
                let page_end = instruction.is_page_end();
                if page_end {
                    self.clear_page = true;
                }
                Ok(Progress::Printed {
                    instruction,
                    rows,
                    page_end,
                })
            }
            Command::Break | Command::Inquiry | Command::Unknown(_) => Ok(Progress::Packet(event)),
        }
    }

    fn refill_chunk(&mut self) {
        while self.packet_left > 0 && !self.chunk.is_full() {
            match self.payload.dequeue() {
                Some(byte) => {
                    let _ = self.chunk.push(byte);
                    self.packet_left -= 1;
                }
                None => {
                    self.packet_left = 0;
                }
            }
        }
        if self.timeout > 0 {
            self.timeout = self.config.timeout_ms;
        }
    }

    fn place_tile(&mut self) -> nb::Result<Progress, Error> {
        let Some(tile) = self.acc.take() else {
            return Err(nb::Error::WouldBlock);
        };
        if self.clear_page {
            self.finish_page();
        }
        let column = self.page.pending_tiles();
        let row = self.page.rows();
        match self.page.decode_tile(&tile) {
            Ok(true) => Ok(Progress::Line { row }),
            Ok(false) => Ok(Progress::Tile { column, row }),
            Err(err) => {
                warn!("session: page full, tile dropped");
                Err(nb::Error::Other(err))
            }
        }
    }
}
