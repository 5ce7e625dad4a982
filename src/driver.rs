//! Pin level printer driver.
//!
//! [`PrinterDriver`] connects a [`Session`] to three GPIO lines of the link
//! port, seen from the printer side:
//!
//! | Line | Direction | Pin trait |
//! |------|-----------|-----------|
//! | `SCLK` | console to printer | [`InputPin`] |
//! | `SOUT` (console serial out) | console to printer | [`InputPin`] |
//! | `SIN` (console serial in) | printer to console | [`OutputPin`] |
//!
//! Three ways of clocking are supported:
//!
//! - [`on_rising`](PrinterDriver::on_rising) from a rising edge interrupt on `SCLK`.
//! - [`on_edge`](PrinterDriver::on_edge) from a pin change interrupt on `SCLK`.
//! - [`poll`](PrinterDriver::poll) from a fast timer or busy loop, which detects
//!   edges itself.
//!
//! ## Example
//!
//! ```rust
//! # use embedded_hal_mock::eh1::digital::{Mock as Pin, State as PinState, Transaction as PinTransaction};
//! use gbprinter::driver::PrinterDriver;
//! use gbprinter::session::Config;
//!
//! # let sclk = Pin::new(&[]);
//! # let sout = Pin::new(&[]);
//! # let sin = Pin::new(&[PinTransaction::set(PinState::Low)]);
//! let mut driver: PrinterDriver<Pin, Pin, Pin, 1024, 8> =
//!     PrinterDriver::new(sclk, sout, sin, Config::new());
//!
//! // From the main loop:
//! let _ = driver.service();
//! # driver.sclk.done();
//! # driver.sout.done();
//! # driver.sin.done();
//! ```
//!
//! For timer and interrupt helpers, see [`crate::timer`].

use crate::error::Error;
use crate::session::{Config, Progress, Session};
use embedded_hal::digital::{InputPin, OutputPin};

/// A printer emulator bound to link port pins.
///
/// ## Type Parameters
///
/// - `CLK`: serial clock input
/// - `DIN`: console serial out, read by the printer
/// - `DOUT`: console serial in, driven by the printer
/// - `N`: payload ring capacity in bytes
/// - `ROWS`: page height in tile strips
///
/// Pin read errors are treated as a low level, write errors are ignored; the
/// link has no way to report them and the watchdog recovers a broken packet.
#[derive(Debug)]
pub struct PrinterDriver<CLK, DIN, DOUT, const N: usize, const ROWS: usize>
where
    CLK: InputPin,
    DIN: InputPin,
    DOUT: OutputPin,
{
    /// Serial clock pin
    pub sclk: CLK,
    /// Console serial out pin
    pub sout: DIN,
    /// Console serial in pin
    pub sin: DOUT,
    session: Session<N, ROWS>,
    /// Clock level seen by the last [`poll`](Self::poll).
    last_clock: bool,
    /// Level last written to `sin`.
    last_output: bool,
}

impl<CLK, DIN, DOUT, const N: usize, const ROWS: usize> PrinterDriver<CLK, DIN, DOUT, N, ROWS>
where
    CLK: InputPin,
    DIN: InputPin,
    DOUT: OutputPin,
{
    /// Creates a driver and drives `sin` low.
    pub fn new(sclk: CLK, sout: DIN, mut sin: DOUT, config: Config) -> Self {
        let _ = sin.set_low();
        Self {
            sclk,
            sout,
            sin,
            session: Session::new(config),
            // The clock idles high.
            last_clock: true,
            last_output: false,
        }
    }

    /// The wrapped session.
    pub fn session(&self) -> &Session<N, ROWS> {
        &self.session
    }

    /// The wrapped session, mutably.
    pub fn session_mut(&mut self) -> &mut Session<N, ROWS> {
        &mut self.session
    }

    /// Handles a rising edge on `SCLK`.
    ///
    /// Call from a rising edge interrupt when falling edges are not observed.
    pub fn on_rising(&mut self) {
        let bit = self.sout.is_high().unwrap_or(false);
        let level = self.session.on_rising(bit);
        self.write_sin(level);
    }

    /// Handles any edge on `SCLK`.
    pub fn on_edge(&mut self) {
        let clock = self.sclk.is_high().unwrap_or(false);
        self.clock(clock);
    }

    /// Samples `SCLK` and handles an edge if the level changed.
    ///
    /// Returns `true` if an edge was processed. Must run at least twice per
    /// clock period.
    pub fn poll(&mut self) -> bool {
        let clock = self.sclk.is_high().unwrap_or(false);
        if clock == self.last_clock {
            return false;
        }
        self.clock(clock);
        true
    }

    /// Advances the link watchdog, see [`Session::tick`].
    pub fn tick(&mut self, elapsed_ms: u32) -> bool {
        let reset = self.session.tick(elapsed_ms);
        if reset {
            self.write_sin(false);
        }
        reset
    }

    /// Runs one unit of decoding work, see [`Session::service`].
    pub fn service(&mut self) -> nb::Result<Progress, Error> {
        self.session.service()
    }

    fn clock(&mut self, clock: bool) {
        self.last_clock = clock;
        let bit = self.sout.is_high().unwrap_or(false);
        let level = self.session.on_change(clock, bit);
        self.write_sin(level);
    }

    fn write_sin(&mut self, level: bool) {
        if level == self.last_output {
            return;
        }
        self.last_output = level;
        let _ = if level {
            self.sin.set_high()
        } else {
            self.sin.set_low()
        };
    }
}
