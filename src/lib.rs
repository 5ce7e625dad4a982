//! # gbprinter
//!
//! A portable, no_std Rust emulator of the Game Boy Printer, for boards wired
//! to a Game Boy link cable.
//!
//! The console believes it is talking to a real printer; this crate answers
//! every packet with the status byte a printer would give and reconstructs the
//! printed image as 2 bit-per-pixel lines. It is built from:
//! - `embedded-hal` traits for the link port pins and for delays
//! - a bit-level serial transceiver that hunts for the `0x88 0x33` sync word
//! - a packet framer with printer status emulation (busy countdowns,
//!   checksum errors, untransferred data)
//! - a staged ring buffer that only commits payloads of complete packets
//! - RLE decompression and tile to page reconstruction with palette remapping
//! - interrupt-safe global access with `critical-section`
//!
//! ## Crate features
//! | Feature               | Description |
//! |-----------------------|-------------|
//! | `std`                 | Disables `#![no_std]` support |
//! | `delay-loop`          | Uses `embedded_hal::delay::DelayNs` for a blocking poll loop |
//! | `timer-isr` (default) | Uses `critical_section::with` for interrupt-driven clocking |
//! | `defmt-0-3`           | Uses `defmt` logging |
//! | `log`                 | Uses `log` logging |
//!
//! ## Usage
//!
//! Link bytes can be fed directly, which is handy on a host or behind a
//! hardware SPI slave:
//!
//! ```rust
//! use gbprinter::session::{Config, Progress, Session};
//!
//! let mut session: Session<1024, 18> = Session::new(Config::new());
//! // INIT packet
//! for byte in [0x88, 0x33, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00] {
//!     let _ = session.feed_byte(byte);
//! }
//! assert!(matches!(session.service(), Ok(Progress::Packet(_))));
//! ```
//!
//! On a microcontroller, wrap the pins in a [`driver::PrinterDriver`] and call
//! [`on_rising`](driver::PrinterDriver::on_rising) from a clock interrupt, or
//! use the helpers in [`timer`].
//!
//! ## Integration Notes
//!
//! - The console drives the clock at ~8 kHz (127.63 µs per bit), or twice that
//!   in double speed mode
//! - Edge handling is short and bounded; decoding happens in
//!   [`service`](session::Session::service) from the main loop
//! - The link watchdog needs [`tick`](session::Session::tick) with the elapsed
//!   milliseconds
//! - Only one driver instance should be active at a time in interrupt-driven mode

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

#[macro_use]
mod fmt;

#[cfg(feature = "timer-isr")]
pub use critical_section;

pub use heapless;

pub mod consts;
pub mod driver;
pub mod error;
pub mod link;
pub mod packet;
pub mod ring;
pub mod rle;
pub mod session;
pub mod status;
pub mod tiles;
pub mod timer;
