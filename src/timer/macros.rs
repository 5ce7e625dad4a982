/// Declares a static global `PRINTER` instance protected by a `critical_section` mutex.
///
/// This macro creates a `static` singleton `PRINTER` suitable for use in
/// interrupt-based environments, where both the main loop and the clock ISR
/// need to safely access the shared driver state.
///
/// # Arguments
/// - `$clk`: The concrete type of the `SCLK` pin (must implement `InputPin`)
/// - `$din`: The concrete type of the console serial out pin (must implement `InputPin`)
/// - `$dout`: The concrete type of the console serial in pin (must implement `OutputPin`)
/// - `$n`: Payload ring capacity in bytes
/// - `$rows`: Page height in tile strips
///
/// # Example
/// ```rust,ignore
/// init_printer!(ClkPin, SoutPin, SinPin, 1024, 18);
/// ```
#[macro_export]
macro_rules! init_printer {
    ( $clk:ty, $din:ty, $dout:ty, $n:expr, $rows:expr ) => {
        pub static PRINTER: $crate::timer::GlobalPrinter<$clk, $din, $dout, { $n }, { $rows }> =
            $crate::critical_section::Mutex::new(core::cell::RefCell::new(None));
    };
}

/// Initializes the global `PRINTER` singleton with a new driver instance.
///
/// # Arguments
/// - `$sclk`, `$sout`, `$sin`: The pins, in that order
/// - `$config`: Optional session [`Config`](crate::session::Config); defaults to `Config::new()`
///
/// # Example
/// ```rust,ignore
/// fn main() {
///     setup_printer!(sclk, sout, sin);
/// }
/// ```
///
/// # Notes
/// - Requires `init_printer!` to have been used earlier.
#[macro_export]
macro_rules! setup_printer {
    ( $sclk:expr, $sout:expr, $sin:expr ) => {
        $crate::setup_printer!($sclk, $sout, $sin, $crate::session::Config::new())
    };
    ( $sclk:expr, $sout:expr, $sin:expr, $config:expr ) => {
        $crate::timer::global_printer_setup(&PRINTER, $sclk, $sout, $sin, $config)
    };
}

/// Feeds a rising `SCLK` edge to the global `PRINTER`.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn INT0() {
///     printer_on_rising!();
/// }
/// ```
///
/// Silently does nothing if the driver hasn't been set up yet.
#[macro_export]
macro_rules! printer_on_rising {
    () => {
        $crate::timer::global_printer_on_rising(&PRINTER)
    };
}

/// Feeds a pin change on `SCLK` to the global `PRINTER`.
#[macro_export]
macro_rules! printer_on_edge {
    () => {
        $crate::timer::global_printer_on_edge(&PRINTER)
    };
}

/// Advances the watchdog of the global `PRINTER` by `$ms` milliseconds.
///
/// Evaluates to `true` if the link was reset.
#[macro_export]
macro_rules! printer_tick {
    () => {
        $crate::printer_tick!(1)
    };
    ( $ms:expr ) => {
        $crate::timer::global_printer_tick(&PRINTER, $ms)
    };
}

/// Runs one unit of decoding work on the global `PRINTER`.
///
/// Evaluates to `nb::Result<Progress, Error>`.
#[macro_export]
macro_rules! printer_service {
    () => {
        $crate::timer::global_printer_service(&PRINTER)
    };
}
