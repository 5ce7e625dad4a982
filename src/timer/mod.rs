//! Timer and poll-loop utilities for the printer driver.
//!
//! The link clock is generated by the console, so the printer side only has
//! to look at `SCLK` often enough. This employs two approaches: an interrupt
//! service routine using `critical_section::with` (`timer-isr` feature), or a
//! busy-loop poller built on a delay provider (`delay-loop` feature).
//!
//! Contains helpers for polling- and ISR-based scheduling, including:
//! - `compute_ocr_value`: runtime OCR calculator for a polling timer
//! - `const_ocr_value`: compile-time OCR calculator
//! - `run_poll_loop`: blocking driver loop for `DelayNs` (feature `delay-loop`)
//! - `global_printer_on_edge` and `printer_on_edge!()`: interrupt callback
//!   wrappers (feature `timer-isr`)
//!
//! Link clock as measured on hardware:
//!
//! | Mode         | Frequency | Bit period |
//! |--------------|-----------|------------|
//! | Normal speed |    ~8 kHz |  127.63 µs |
//! | Double speed |   ~16 kHz |   63.81 µs |
//!
//! A polling timer must sample the clock at least [`MIN_SAMPLES_PER_BIT`]
//! times per bit period. An edge interrupt on `SCLK` has no such limit.

use libm::round;

#[cfg(feature = "delay-loop")]
mod delay;
#[cfg_attr(feature = "delay-loop", allow(unused_imports))]
#[cfg(feature = "delay-loop")]
pub use delay::*;

#[cfg(feature = "timer-isr")]
mod isr;
#[cfg_attr(feature = "timer-isr", allow(unused_imports))]
#[cfg(feature = "timer-isr")]
pub use isr::*;

#[cfg(feature = "timer-isr")]
mod macros;
#[cfg_attr(feature = "timer-isr", allow(unused_imports))]
#[cfg(feature = "timer-isr")]
pub use macros::*;

/// Normal speed link bit period, in microseconds
pub const BIT_PERIOD_US: f32 = 127.63;
/// Normal speed link bit period, in nanoseconds
pub const BIT_PERIOD_NS: u32 = 127_630;
/// Double speed link bit period, in microseconds
pub const DOUBLE_SPEED_BIT_PERIOD_US: f32 = 63.81;
/// Double speed link bit period, in nanoseconds
pub const DOUBLE_SPEED_BIT_PERIOD_NS: u32 = 63_810;
/// Polls per bit period needed to see both clock edges reliably
pub const MIN_SAMPLES_PER_BIT: u8 = 4;
/// 1,000 nanoseconds = 1 microsecond
pub const NANOSECONDS_PER_MICROSECOND: u32 = 1_000;
/// 1,000,000,000 nanoseconds = 1 second
pub const NANOSECONDS_PER_SECOND: u64 = 1_000_000_000;
/// 1,000 microseconds = 1 millisecond
pub const MICROSECONDS_PER_MILLISECOND: u32 = 1_000;

/// Computes the OCR value for an AVR timer (CTC mode) used to poll the link
///
/// # Arguments
/// - `f_cpu`: CPU frequency in Hz
/// - `prescaler`: timer prescaler (e.g., 8, 64, 256)
/// - `tick_us`: desired poll interval in microseconds (e.g., 30.0)
///
/// # Returns
/// - OCR value for OCRnA (rounds to nearest integer)
/// - Number of polls per normal speed bit period
pub fn compute_ocr_value(f_cpu: u32, prescaler: u32, tick_us: f32) -> (u16, u8) {
    let ticks_per_second: f32 = f_cpu as f32 / prescaler as f32;
    let ticks_per_tick: f32 = ticks_per_second * (tick_us / 1_000_000.0);
    (round(ticks_per_tick as f64) as u16, samples_per_bit(tick_us))
}

/// Compile-time OCR value calculator
///
/// # Arguments
/// - `f_cpu`: CPU frequency in Hz
/// - `prescaler`: timer prescaler (e.g., 8, 64, 256)
/// - `tick_ns`: desired poll interval in nanoseconds (e.g., 30_000)
///
/// # Returns
/// - OCR value for OCRnA (truncated)
/// - Number of polls per normal speed bit period
pub const fn const_ocr_value(f_cpu: u32, prescaler: u32, tick_ns: u32) -> (u16, u8) {
    let ticks_per_tick = (f_cpu / prescaler) as u64 * tick_ns as u64 / NANOSECONDS_PER_SECOND;
    (ticks_per_tick as u16, const_samples_per_bit(tick_ns))
}

/// Polls per normal speed bit period for a poll interval in microseconds.
pub fn samples_per_bit(tick_us: f32) -> u8 {
    if tick_us <= 0.0 {
        return u8::MAX;
    }
    (BIT_PERIOD_US / tick_us) as u8
}

/// Compile-time polls per normal speed bit period for an interval in nanoseconds.
pub const fn const_samples_per_bit(tick_ns: u32) -> u8 {
    if tick_ns == 0 {
        return u8::MAX;
    }
    let samples = BIT_PERIOD_NS / tick_ns;
    if samples > u8::MAX as u32 {
        u8::MAX
    } else {
        samples as u8
    }
}

/// Converts a stream of microsecond steps into whole milliseconds for the
/// link watchdog.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct MillisAccumulator {
    micros: u32,
}

impl MillisAccumulator {
    /// Creates an empty accumulator.
    pub const fn new() -> Self {
        Self { micros: 0 }
    }

    /// Adds `elapsed_us` and returns the number of whole milliseconds that
    /// completed; the remainder carries over.
    pub fn advance(&mut self, elapsed_us: u32) -> u32 {
        self.micros = self.micros.saturating_add(elapsed_us);
        let ms = self.micros / MICROSECONDS_PER_MILLISECOND;
        self.micros %= MICROSECONDS_PER_MILLISECOND;
        ms
    }
}
