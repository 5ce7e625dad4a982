use super::MillisAccumulator;
use crate::driver::PrinterDriver;
use crate::error::Error;
use crate::session::Progress;
use crate::tiles::PageBuffer;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

/// Runs a blocking loop that polls the link clock, feeds the watchdog and
/// services the decoder.
///
/// This is a simple timing loop for use in environments where pin interrupts
/// are unavailable or undesired. Every pass samples `SCLK` once, so `poll_us`
/// must stay well below the link bit period (see
/// [`MIN_SAMPLES_PER_BIT`](super::MIN_SAMPLES_PER_BIT)).
///
/// # Arguments
/// - `driver`: A mutable reference to a `PrinterDriver` instance.
/// - `delay`: A delay provider implementing `DelayNs`, typically from the HAL.
/// - `poll_us`: The delay between each poll, in microseconds (e.g. 30 for normal speed).
/// - `on_progress`: Called with every completed unit of decoding work and the
///   page it applies to, so finished lines can be read out right away.
///
/// # Example
/// ```rust,ignore
/// use gbprinter::timer::run_poll_loop;
/// let mut driver = PrinterDriver::<_, _, _, 1024, 18>::new(sclk, sout, sin, Config::new());
/// let mut line = [0u8; 160];
/// run_poll_loop(&mut driver, &mut delay, 30, |progress, page| {
///     if let Ok(Progress::Line { row }) = progress {
///         for y in row * 8..row * 8 + 8 {
///             let _ = page.line_into(y, &mut line);
///             // hand the line off
///         }
///     }
/// });
/// ```
///
/// # Notes
/// - This loop will never return; it is intended for single-purpose polling firmware.
/// - Decoding runs between polls, so a slow `on_progress` will miss clock edges.
pub fn run_poll_loop<D, CLK, DIN, DOUT, F, const N: usize, const ROWS: usize>(
    driver: &mut PrinterDriver<CLK, DIN, DOUT, N, ROWS>,
    delay: &mut D,
    poll_us: u32,
    mut on_progress: F,
) -> !
where
    D: DelayNs,
    CLK: InputPin,
    DIN: InputPin,
    DOUT: OutputPin,
    F: FnMut(Result<Progress, Error>, &PageBuffer<ROWS>),
{
    let mut clock = MillisAccumulator::new();
    loop {
        poll_step(driver, delay, poll_us, &mut clock, &mut on_progress);
    }
}

/// Same as [`run_poll_loop`], but returns after `passes` polls.
pub fn run_poll_passes<D, CLK, DIN, DOUT, F, const N: usize, const ROWS: usize>(
    driver: &mut PrinterDriver<CLK, DIN, DOUT, N, ROWS>,
    delay: &mut D,
    poll_us: u32,
    passes: usize,
    mut on_progress: F,
) where
    D: DelayNs,
    CLK: InputPin,
    DIN: InputPin,
    DOUT: OutputPin,
    F: FnMut(Result<Progress, Error>, &PageBuffer<ROWS>),
{
    let mut clock = MillisAccumulator::new();
    for _ in 0..passes {
        poll_step(driver, delay, poll_us, &mut clock, &mut on_progress);
    }
}

fn poll_step<D, CLK, DIN, DOUT, F, const N: usize, const ROWS: usize>(
    driver: &mut PrinterDriver<CLK, DIN, DOUT, N, ROWS>,
    delay: &mut D,
    poll_us: u32,
    clock: &mut MillisAccumulator,
    on_progress: &mut F,
) where
    D: DelayNs,
    CLK: InputPin,
    DIN: InputPin,
    DOUT: OutputPin,
    F: FnMut(Result<Progress, Error>, &PageBuffer<ROWS>),
{
    let _ = driver.poll();
    match driver.service() {
        Ok(progress) => on_progress(Ok(progress), driver.session().page()),
        Err(nb::Error::Other(e)) => on_progress(Err(e), driver.session().page()),
        Err(nb::Error::WouldBlock) => {}
    }
    delay.delay_us(poll_us);
    let elapsed_ms = clock.advance(poll_us);
    if elapsed_ms > 0 {
        let _ = driver.tick(elapsed_ms);
    }
}
