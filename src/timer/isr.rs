use crate::driver::PrinterDriver;
use crate::error::Error;
use crate::session::{Config, Progress};
use core::cell::RefCell;
use critical_section::Mutex;
use embedded_hal::digital::{InputPin, OutputPin};

/// A `PrinterDriver` shared between the main loop and interrupt handlers.
pub type GlobalPrinter<CLK, DIN, DOUT, const N: usize, const ROWS: usize> =
    Mutex<RefCell<Option<PrinterDriver<CLK, DIN, DOUT, N, ROWS>>>>;

/// Used to initialize the global static `PrinterDriver` for use with
/// `critical_section`.
///
/// # Returns
/// * An empty mutable ref-cell
///
/// # Example
/// ```rust,ignore
/// use gbprinter::timer::{GlobalPrinter, global_printer_init};
/// use some_hal::{PD2, PD3, PD4};
///
/// static PRINTER: GlobalPrinter<PD2, PD3, PD4, 1024, 18> = global_printer_init();
/// ```
pub const fn global_printer_init<
    CLK: InputPin,
    DIN: InputPin,
    DOUT: OutputPin,
    const N: usize,
    const ROWS: usize,
>() -> GlobalPrinter<CLK, DIN, DOUT, N, ROWS> {
    Mutex::new(RefCell::new(None))
}

/// Builds a driver from the pins and stores it in the global slot,
/// replacing any previous one.
///
/// # Example
/// ```rust,ignore
/// fn main() {
///     global_printer_setup(&PRINTER, sclk, sout, sin, Config::new());
/// }
/// ```
pub fn global_printer_setup<
    CLK: InputPin,
    DIN: InputPin,
    DOUT: OutputPin,
    const N: usize,
    const ROWS: usize,
>(
    global_driver: &'static GlobalPrinter<CLK, DIN, DOUT, N, ROWS>,
    sclk: CLK,
    sout: DIN,
    sin: DOUT,
    config: Config,
) {
    critical_section::with(|cs| {
        let _ = global_driver
            .borrow(cs)
            .replace(Some(PrinterDriver::new(sclk, sout, sin, config)));
    });
}

/// Handles a rising `SCLK` edge.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn INT0() {
///     global_printer_on_rising(&PRINTER);
/// }
/// ```
pub fn global_printer_on_rising<
    CLK: InputPin,
    DIN: InputPin,
    DOUT: OutputPin,
    const N: usize,
    const ROWS: usize,
>(
    global_driver: &'static GlobalPrinter<CLK, DIN, DOUT, N, ROWS>,
) {
    critical_section::with(|cs| {
        if let Some(driver) = global_driver.borrow(cs).borrow_mut().as_mut() {
            driver.on_rising();
        }
    });
}

/// Handles a pin change on `SCLK`.
pub fn global_printer_on_edge<
    CLK: InputPin,
    DIN: InputPin,
    DOUT: OutputPin,
    const N: usize,
    const ROWS: usize,
>(
    global_driver: &'static GlobalPrinter<CLK, DIN, DOUT, N, ROWS>,
) {
    critical_section::with(|cs| {
        if let Some(driver) = global_driver.borrow(cs).borrow_mut().as_mut() {
            driver.on_edge();
        }
    });
}

/// Samples `SCLK` from a fast timer interrupt. Returns `true` if an edge was
/// processed.
pub fn global_printer_poll<
    CLK: InputPin,
    DIN: InputPin,
    DOUT: OutputPin,
    const N: usize,
    const ROWS: usize,
>(
    global_driver: &'static GlobalPrinter<CLK, DIN, DOUT, N, ROWS>,
) -> bool {
    critical_section::with(|cs| {
        global_driver
            .borrow(cs)
            .borrow_mut()
            .as_mut()
            .is_some_and(|driver| driver.poll())
    })
}

/// Advances the link watchdog, typically from a millisecond timer.
///
/// Returns `true` if the link was reset.
pub fn global_printer_tick<
    CLK: InputPin,
    DIN: InputPin,
    DOUT: OutputPin,
    const N: usize,
    const ROWS: usize,
>(
    global_driver: &'static GlobalPrinter<CLK, DIN, DOUT, N, ROWS>,
    elapsed_ms: u32,
) -> bool {
    critical_section::with(|cs| {
        global_driver
            .borrow(cs)
            .borrow_mut()
            .as_mut()
            .is_some_and(|driver| driver.tick(elapsed_ms))
    })
}

/// Runs one unit of decoding work from the main loop.
///
/// Each call holds the critical section for a single step, so link
/// interrupts are delayed by at most one tile of work. Returns
/// `WouldBlock` if the driver has not been set up.
pub fn global_printer_service<
    CLK: InputPin,
    DIN: InputPin,
    DOUT: OutputPin,
    const N: usize,
    const ROWS: usize,
>(
    global_driver: &'static GlobalPrinter<CLK, DIN, DOUT, N, ROWS>,
) -> nb::Result<Progress, Error> {
    critical_section::with(|cs| match global_driver.borrow(cs).borrow_mut().as_mut() {
        Some(driver) => driver.service(),
        None => Err(nb::Error::WouldBlock),
    })
}
