//! Packet framing and printer status emulation.
//!
//! [`PacketFramer`] consumes the words assembled by the link and decides what
//! the next exchange looks like. It tracks the packet structure, sums the
//! checksum, captures the print instruction, and runs the countdown timers a
//! real printer would expose as status bits.
//!
//! ```text
//! HeaderCommand -> HeaderLength -> Payload* -> Checksum -> StatusExchange -+
//!       ^                                                                  |
//!       +------------------------------------------------------------------+
//! ```
//!
//! The framer never touches buffers. Payload bytes and finished packets are
//! returned in a [`FramerStep`] and it is up to the caller to store them.

use crate::consts::{
    COMPRESSION_ENABLED, DATA_PACKET_COUNT, DEFAULT_PALETTE, PRINT_INDEX_DENSITY,
    PRINT_INDEX_LINEFEED, PRINT_INDEX_PALETTE, PRINT_INDEX_SHEETS, PRINT_INSTRUCTION_LEN,
    STATUS_BUFFER_FULL, STATUS_CHECKSUM_ERROR, STATUS_LOW_BATTERY, STATUS_OTHER_ERROR,
    STATUS_PACKET_ERROR, STATUS_PAPER_JAM, STATUS_PRINTER_BUSY, STATUS_UNPROCESSED_DATA,
    UNTRANS_PACKET_COUNT,
};
use crate::link::{LinkWord, WordMode};
use crate::status::Status;

/// Packet command byte.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Command {
    /// `0x01`: start of a new print job.
    Init,
    /// `0x02`: print the buffered image.
    Print,
    /// `0x04`: image data; an empty one marks the end of data.
    Data,
    /// `0x08`: abort printing.
    Break,
    /// `0x0F`: status poll.
    Inquiry,
    /// Anything else. Framed and answered, but leaves the status alone.
    Unknown(u8),
}

impl Command {
    /// Wire value.
    pub const fn code(self) -> u8 {
        match self {
            Command::Init => 0x01,
            Command::Print => 0x02,
            Command::Data => 0x04,
            Command::Break => 0x08,
            Command::Inquiry => 0x0F,
            Command::Unknown(code) => code,
        }
    }
}

impl From<u8> for Command {
    fn from(code: u8) -> Self {
        match code {
            0x01 => Command::Init,
            0x02 => Command::Print,
            0x04 => Command::Data,
            0x08 => Command::Break,
            0x0F => Command::Inquiry,
            other => Command::Unknown(other),
        }
    }
}

/// The four byte payload of a PRINT packet.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct PrintInstruction {
    /// Number of copies. Zero only feeds paper.
    pub sheets: u8,
    /// High nibble: lines fed before printing. Low nibble: lines fed after.
    pub linefeed: u8,
    /// Four 2 bit tone fields.
    pub palette: u8,
    /// Heater intensity.
    pub density: u8,
}

impl PrintInstruction {
    /// Builds an instruction from its wire bytes.
    pub const fn from_bytes(bytes: [u8; PRINT_INSTRUCTION_LEN]) -> Self {
        Self {
            sheets: bytes[PRINT_INDEX_SHEETS],
            linefeed: bytes[PRINT_INDEX_LINEFEED],
            palette: bytes[PRINT_INDEX_PALETTE],
            density: bytes[PRINT_INDEX_DENSITY],
        }
    }

    /// Lines fed before the image.
    pub const fn feed_before(self) -> u8 {
        self.linefeed >> 4
    }

    /// Lines fed after the image.
    pub const fn feed_after(self) -> u8 {
        self.linefeed & 0x0F
    }

    /// Palette to apply; `0x00` is treated as the default `0xE4`.
    pub const fn effective_palette(self) -> u8 {
        if self.palette == 0 {
            DEFAULT_PALETTE
        } else {
            self.palette
        }
    }

    /// A trailing feed means the console is done with this page.
    pub const fn is_page_end(self) -> bool {
        self.feed_after() != 0
    }
}

/// Framing position within the current packet.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum ParseState {
    /// Waiting for the command and compression bytes.
    #[default]
    HeaderCommand,
    /// Waiting for the little-endian payload length.
    HeaderLength,
    /// Receiving payload bytes.
    Payload,
    /// Waiting for the little-endian checksum.
    Checksum,
    /// Sending device ID and status while the console sends filler.
    StatusExchange,
}

/// A completed packet, reported once its status exchange has finished.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct PacketEvent {
    /// Packet command.
    pub command: Command,
    /// Payload is run length encoded.
    pub compressed: bool,
    /// Length field as sent by the console.
    pub data_length: u16,
    /// Checksum sent by the console.
    pub checksum: u16,
    /// Checksum computed over the received bytes.
    pub checksum_calc: u16,
    /// Status byte answered for this packet.
    pub status: Status,
    /// Instruction carried by a PRINT packet.
    pub print: Option<PrintInstruction>,
}

impl PacketEvent {
    /// Sent and computed checksums agree.
    pub const fn checksum_ok(&self) -> bool {
        self.checksum == self.checksum_calc
    }

    /// An empty DATA packet, sent after the last image chunk.
    pub fn is_data_end(&self) -> bool {
        self.command == Command::Data && self.data_length == 0
    }
}

/// The exchange the link should load next.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct WordRequest {
    /// Shape of the next word.
    pub mode: WordMode,
    /// Value to send back during it.
    pub tx: u16,
}

/// Result of feeding one word to the framer.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct FramerStep {
    /// Load this into the link before the next clock.
    pub next: WordRequest,
    /// Image data byte to stage.
    pub payload: Option<u8>,
    /// Set once per packet, after the status exchange.
    pub packet: Option<PacketEvent>,
}

impl FramerStep {
    const fn request(mode: WordMode, tx: u16) -> Self {
        Self {
            next: WordRequest { mode, tx },
            payload: None,
            packet: None,
        }
    }
}

/// Packet state machine and status register.
#[derive(Clone, Debug)]
pub struct PacketFramer {
    state: ParseState,
    command: u8,
    compression: u8,
    data_length: u16,
    /// Payload bytes still expected.
    payload_left: u16,
    instruction_index: usize,
    instruction: [u8; PRINT_INSTRUCTION_LEN],
    checksum: u16,
    checksum_calc: u16,
    status: Status,
    data_countdown: u8,
    untrans_countdown: u8,
    busy_countdown: u8,
    busy_packet_count: u8,
    strict_checksum: bool,
}

impl PacketFramer {
    /// Creates a framer waiting for the first header.
    ///
    /// `busy_packet_count` is how many inquiries report busy after a PRINT.
    /// With `strict_checksum` a mismatch raises the checksum error bit.
    pub const fn new(busy_packet_count: u8, strict_checksum: bool) -> Self {
        Self {
            state: ParseState::HeaderCommand,
            command: 0,
            compression: 0,
            data_length: 0,
            payload_left: 0,
            instruction_index: 0,
            instruction: [0; PRINT_INSTRUCTION_LEN],
            checksum: 0,
            checksum_calc: 0,
            status: Status::from_bits(0),
            data_countdown: 0,
            untrans_countdown: 0,
            busy_countdown: 0,
            busy_packet_count,
            strict_checksum,
        }
    }

    /// Current framing position.
    pub const fn state(&self) -> ParseState {
        self.state
    }

    /// Live status register.
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Command of the packet being framed.
    pub fn command(&self) -> Command {
        Command::from(self.command)
    }

    /// Back to idle with a clear status and stopped countdowns.
    pub fn reset(&mut self) {
        *self = Self::new(self.busy_packet_count, self.strict_checksum);
    }

    /// Consumes one completed link word.
    pub fn consume(&mut self, word: LinkWord) -> FramerStep {
        match self.state {
            ParseState::HeaderCommand => {
                self.command = word.high_byte();
                self.compression = word.low_byte();
                self.checksum_calc = 0;
                self.instruction = [0; PRINT_INSTRUCTION_LEN];
                self.instruction_index = 0;
                self.state = ParseState::HeaderLength;
                FramerStep::request(WordMode::Bits16LittleEndian, 0)
            }
            ParseState::HeaderLength => {
                self.data_length = word.value();
                self.payload_left = match Command::from(self.command) {
                    Command::Data => self.data_length,
                    Command::Print => {
                        // The clamped length is also what the checksum sums.
                        self.data_length = self.data_length.min(PRINT_INSTRUCTION_LEN as u16);
                        self.data_length
                    }
                    _ => 0,
                };
                self.after_payload_byte()
            }
            ParseState::Payload => {
                let byte = word.low_byte();
                self.checksum_calc = self.checksum_calc.wrapping_add(u16::from(byte));
                self.payload_left = self.payload_left.saturating_sub(1);
                let mut payload = None;
                match Command::from(self.command) {
                    Command::Data => payload = Some(byte),
                    Command::Print => {
                        if let Some(slot) = self.instruction.get_mut(self.instruction_index) {
                            *slot = byte;
                        }
                        self.instruction_index += 1;
                    }
                    _ => {}
                }
                let mut step = self.after_payload_byte();
                step.payload = payload;
                step
            }
            ParseState::Checksum => {
                self.checksum = word.value();
                self.checksum_calc = self
                    .checksum_calc
                    .wrapping_add(u16::from(self.command))
                    .wrapping_add(u16::from(self.compression))
                    .wrapping_add(self.data_length >> 8)
                    .wrapping_add(self.data_length & 0x00FF);

                if self.strict_checksum {
                    let mismatch = self.checksum != self.checksum_calc;
                    if mismatch {
                        warn!(
                            "packet: checksum mismatch (sent {}, calc {})",
                            self.checksum,
                            self.checksum_calc
                        );
                    }
                    self.status.set(STATUS_CHECKSUM_ERROR, mismatch);
                }

                self.update_status_at_checksum();
                self.state = ParseState::StatusExchange;
                FramerStep::request(WordMode::Bits16BigEndian, self.status.exchange_word())
            }
            ParseState::StatusExchange => {
                let answered = self.status;
                self.update_status_at_exchange();
                let command = Command::from(self.command);
                let event = PacketEvent {
                    command,
                    compressed: self.compression == COMPRESSION_ENABLED,
                    data_length: self.data_length,
                    checksum: self.checksum,
                    checksum_calc: self.checksum_calc,
                    status: answered,
                    print: match command {
                        Command::Print => Some(PrintInstruction::from_bytes(self.instruction)),
                        _ => None,
                    },
                };
                debug!(
                    "packet: cmd {} len {} status {}",
                    self.command,
                    self.data_length,
                    answered.bits()
                );
                self.state = ParseState::HeaderCommand;
                let mut step = FramerStep::request(WordMode::Reset, 0);
                step.packet = Some(event);
                step
            }
        }
    }

    /// Picks the next word once a header or payload byte is consumed.
    fn after_payload_byte(&mut self) -> FramerStep {
        if self.payload_left > 0 {
            self.state = ParseState::Payload;
            FramerStep::request(WordMode::Bits8, 0)
        } else {
            self.state = ParseState::Checksum;
            FramerStep::request(WordMode::Bits16LittleEndian, 0)
        }
    }

    fn update_status_at_checksum(&mut self) {
        match Command::from(self.command) {
            Command::Init => {
                self.data_countdown = DATA_PACKET_COUNT;
                self.untrans_countdown = 0;
                self.busy_countdown = 0;
                self.status.set(STATUS_BUFFER_FULL, false);
                self.status.set(STATUS_PRINTER_BUSY, false);
            }
            Command::Print => {
                self.busy_countdown = self.busy_packet_count;
            }
            Command::Data => {
                self.untrans_countdown = UNTRANS_PACKET_COUNT;
            }
            Command::Break => {
                self.status.set(
                    STATUS_LOW_BATTERY
                        | STATUS_OTHER_ERROR
                        | STATUS_PAPER_JAM
                        | STATUS_PACKET_ERROR
                        | STATUS_UNPROCESSED_DATA
                        | STATUS_CHECKSUM_ERROR,
                    false,
                );
                self.status.set(STATUS_BUFFER_FULL | STATUS_PRINTER_BUSY, true);
            }
            Command::Inquiry => {
                if self.untrans_countdown > 0 {
                    self.untrans_countdown -= 1;
                    if self.untrans_countdown == 0 {
                        self.status.set(STATUS_UNPROCESSED_DATA, false);
                        if self.busy_countdown > 0 {
                            self.status.set(STATUS_PRINTER_BUSY | STATUS_BUFFER_FULL, true);
                        }
                    }
                } else if self.busy_countdown > 0 {
                    self.busy_countdown -= 1;
                    if self.busy_countdown == 0 {
                        self.status.set(STATUS_PRINTER_BUSY, false);
                    }
                }
            }
            Command::Unknown(_) => {}
        }
    }

    fn update_status_at_exchange(&mut self) {
        match Command::from(self.command) {
            Command::Data => {
                if self.data_countdown > 0 {
                    self.data_countdown -= 1;
                    if self.data_countdown == 0 {
                        self.status.set(STATUS_UNPROCESSED_DATA, false);
                    }
                }
                self.status.set(STATUS_BUFFER_FULL | STATUS_UNPROCESSED_DATA, false);
                if self.data_length == 0 {
                    self.status.set(STATUS_UNPROCESSED_DATA, false);
                    self.status.set(STATUS_BUFFER_FULL, true);
                }
            }
            Command::Inquiry => {
                self.status.set(STATUS_UNPROCESSED_DATA, false);
                if self.untrans_countdown == 0 && self.busy_countdown == 0 {
                    self.status.set(STATUS_BUFFER_FULL, false);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{ByteLink, LinkEvent};

    /// Builds a complete packet, filler bytes included.
    fn packet(command: u8, compression: u8, payload: &[u8]) -> Vec<u8> {
        let len = payload.len() as u16;
        let mut sum = u16::from(command)
            .wrapping_add(u16::from(compression))
            .wrapping_add(len & 0xFF)
            .wrapping_add(len >> 8);
        for b in payload {
            sum = sum.wrapping_add(u16::from(*b));
        }
        let mut bytes = vec![0x88, 0x33, command, compression, len as u8, (len >> 8) as u8];
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(&[sum as u8, (sum >> 8) as u8, 0x00, 0x00]);
        bytes
    }

    struct Harness {
        link: ByteLink,
        framer: PacketFramer,
        responses: Vec<u8>,
        payload: Vec<u8>,
        events: Vec<PacketEvent>,
    }

    impl Harness {
        fn new(strict: bool) -> Self {
            Self {
                link: ByteLink::new(),
                framer: PacketFramer::new(20, strict),
                responses: Vec::new(),
                payload: Vec::new(),
                events: Vec::new(),
            }
        }

        fn feed(&mut self, bytes: &[u8]) {
            for b in bytes {
                let (response, event) = self.link.push(*b);
                self.responses.push(response);
                if let LinkEvent::Word(word) = event {
                    let step = self.framer.consume(word);
                    self.link.next(step.next.mode, step.next.tx);
                    if let Some(p) = step.payload {
                        self.payload.push(p);
                    }
                    if let Some(ev) = step.packet {
                        self.events.push(ev);
                    }
                }
            }
        }
    }

    #[test]
    fn test_command_codes_round_trip() {
        for code in [0x01u8, 0x02, 0x04, 0x08, 0x0F, 0x42] {
            assert_eq!(Command::from(code).code(), code);
        }
        assert_eq!(Command::from(0x42), Command::Unknown(0x42));
    }

    #[test]
    fn test_print_instruction_fields() {
        let inst = PrintInstruction::from_bytes([0x01, 0x13, 0x00, 0x40]);
        assert_eq!(inst.feed_before(), 1);
        assert_eq!(inst.feed_after(), 3);
        assert_eq!(inst.effective_palette(), 0xE4);
        assert!(inst.is_page_end());
        assert!(!PrintInstruction::from_bytes([1, 0x10, 0xE4, 0x40]).is_page_end());
    }

    #[test]
    fn test_init_packet_end_to_end() {
        let mut h = Harness::new(false);
        h.feed(&[0x88, 0x33, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(h.events.len(), 1);
        let ev = h.events[0];
        assert_eq!(ev.command, Command::Init);
        assert_eq!(ev.data_length, 0);
        assert!(ev.checksum_ok());
        assert_eq!(h.responses[8], 0x81);
        let status = Status::from_bits(h.responses[9]);
        assert!(!status.buffer_full());
        assert!(!status.printer_busy());
        assert_eq!(h.framer.state(), ParseState::HeaderCommand);
        assert!(!h.link.is_synchronised());
    }

    #[test]
    fn test_data_checksum_matches_formula() {
        let mut h = Harness::new(true);
        h.feed(&packet(0x04, 0x00, &[0x01; 16]));
        let ev = h.events[0];
        let expected = 0x04u16 + 0x00 + 16 + 0 + 16;
        assert_eq!(ev.checksum_calc, expected);
        assert!(ev.checksum_ok());
        assert!(!ev.status.checksum_error());
        assert_eq!(h.payload, vec![0x01; 16]);
    }

    #[test]
    fn test_strict_checksum_flags_mismatch_then_recovers() {
        let mut h = Harness::new(true);
        let mut bad = packet(0x04, 0x00, &[0x10; 4]);
        bad[10] ^= 0xFF;
        h.feed(&bad);
        assert!(!h.events[0].checksum_ok());
        assert!(h.events[0].status.checksum_error());

        h.feed(&packet(0x0F, 0x00, &[]));
        assert!(!h.events[1].status.checksum_error());
    }

    #[test]
    fn test_lenient_checksum_ignores_mismatch() {
        let mut h = Harness::new(false);
        let mut bad = packet(0x0F, 0x00, &[]);
        bad[6] = 0xAA;
        h.feed(&bad);
        assert!(!h.events[0].checksum_ok());
        assert!(!h.events[0].status.checksum_error());
    }

    #[test]
    fn test_status_sequence_without_print() {
        let mut h = Harness::new(false);
        h.feed(&packet(0x01, 0x00, &[]));
        h.feed(&packet(0x04, 0x00, &[0x55; 16]));
        for _ in 0..3 {
            h.feed(&packet(0x0F, 0x00, &[]));
        }
        assert_eq!(h.events.len(), 5);
        for ev in &h.events {
            assert!(!ev.status.printer_busy());
        }
        assert!(!h.framer.status().unprocessed_data());
        assert!(!h.framer.status().printer_busy());
    }

    #[test]
    fn test_print_sets_busy_until_countdown_expires() {
        let mut h = Harness::new(false);
        h.feed(&packet(0x01, 0x00, &[]));
        h.feed(&packet(0x04, 0x00, &[0x00; 16]));
        h.feed(&packet(0x04, 0x00, &[]));
        assert!(h.framer.status().buffer_full());
        h.feed(&packet(0x02, 0x00, &[0x01, 0x13, 0xE4, 0x40]));
        let print = h.events[3].print.expect("print instruction");
        assert_eq!(print.palette, 0xE4);
        assert_eq!(print.feed_after(), 3);

        // Three inquiries burn the untransmitted countdown, the third raises busy.
        for _ in 0..3 {
            h.feed(&packet(0x0F, 0x00, &[]));
        }
        assert!(h.framer.status().printer_busy());
        for _ in 0..19 {
            h.feed(&packet(0x0F, 0x00, &[]));
        }
        assert!(h.framer.status().printer_busy());
        h.feed(&packet(0x0F, 0x00, &[]));
        assert!(!h.framer.status().printer_busy());
        assert!(!h.framer.status().buffer_full());
    }

    #[test]
    fn test_break_forces_busy_and_full() {
        let mut h = Harness::new(false);
        h.feed(&packet(0x08, 0x00, &[]));
        let status = h.events[0].status;
        assert!(status.printer_busy());
        assert!(status.buffer_full());
        assert!(!status.has_error());
    }

    #[test]
    fn test_print_payload_longer_than_instruction_is_clamped() {
        let mut h = Harness::new(true);
        // Length 6 is read as 4, and the checksum covers the clamped length.
        let instruction = [0x01u8, 0x00, 0x1B, 0x7F];
        let sum = instruction
            .iter()
            .fold(0x02u16 + 0x04, |acc, b| acc.wrapping_add(u16::from(*b)));
        let mut bytes = vec![0x88, 0x33, 0x02, 0x00, 0x06, 0x00];
        bytes.extend_from_slice(&instruction);
        bytes.extend_from_slice(&[sum as u8, (sum >> 8) as u8, 0x00, 0x00]);
        h.feed(&bytes);

        let ev = h.events[0];
        assert_eq!(ev.print.map(|p| p.palette), Some(0x1B));
        assert_eq!(ev.data_length, 4);
        assert_eq!(ev.checksum, 0x00A1);
        assert!(ev.checksum_ok());
        assert!(!h.framer.status().checksum_error());
        assert!(!Status::from_bits(h.responses[13]).checksum_error());
        assert!(h.payload.is_empty());
    }

    #[test]
    fn test_print_with_unclamped_checksum_is_flagged() {
        let mut h = Harness::new(true);
        // Summing the raw length 6 instead of 4 is a mismatch.
        let instruction = [0x01u8, 0x00, 0x1B, 0x7F];
        let sum = instruction
            .iter()
            .fold(0x02u16 + 0x06, |acc, b| acc.wrapping_add(u16::from(*b)));
        let mut bytes = vec![0x88, 0x33, 0x02, 0x00, 0x06, 0x00];
        bytes.extend_from_slice(&instruction);
        bytes.extend_from_slice(&[sum as u8, (sum >> 8) as u8, 0x00, 0x00]);
        h.feed(&bytes);

        assert!(!h.events[0].checksum_ok());
        assert!(h.framer.status().checksum_error());
    }

    #[test]
    fn test_unknown_command_is_framed() {
        let mut h = Harness::new(false);
        h.feed(&packet(0x42, 0x00, &[]));
        assert_eq!(h.events[0].command, Command::Unknown(0x42));
        assert_eq!(h.events[0].status.bits(), 0);
    }

    #[test]
    fn test_reset_clears_status_and_state() {
        let mut h = Harness::new(false);
        h.feed(&packet(0x08, 0x00, &[]));
        h.feed(&[0x88, 0x33, 0x04]);
        h.framer.reset();
        assert_eq!(h.framer.status().bits(), 0);
        assert_eq!(h.framer.state(), ParseState::HeaderCommand);
    }
}
