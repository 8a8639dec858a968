use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::debug;

use super::{
    DisplayGeometry, DisplayState, LcdCommand, Orientation, Register, Window, DISPLAY_ON_SEQUENCE,
    FULL_WINDOW, LCD_DATA, LCD_REGISTER, POWER_ON_SEQUENCE, RESET_PULSE_MS, RESET_RECOVERY_MS,
};
use crate::bus::{Peripheral, Selected, SharedBus, SpiFrequency};
use crate::error::Error;

/// Bytes buffered per SPI write while streaming pixels
const STREAM_CHUNK: usize = 64;
const STREAM_CHUNK_PIXELS: u64 = (STREAM_CHUNK / 2) as u64;

/// HX8347-D display controller.
///
/// Owns the reset line and the delay used for power-up timing. The SPI bus is
/// borrowed per call, so the caller decides how display and touch traffic
/// interleave.
#[derive(Debug)]
pub struct Hx8347d<RST, DELAY> {
    rst: RST,
    delay: DELAY,
    state: DisplayState,
    geometry: DisplayGeometry,
}

impl<RST, DELAY> Hx8347d<RST, DELAY>
where
    RST: OutputPin,
    DELAY: DelayNs,
{
    pub fn new(rst: RST, delay: DELAY) -> Self {
        Self {
            rst,
            delay,
            state: DisplayState::Unpowered,
            geometry: DisplayGeometry::new(Orientation::Deg90),
        }
    }

    pub fn state(&self) -> DisplayState {
        self.state
    }

    pub fn geometry(&self) -> DisplayGeometry {
        self.geometry
    }

    /// Hardware reset, then the full configuration and `orientation`
    pub fn init<SPI, DCS, TCS>(
        &mut self,
        bus: &mut SharedBus<SPI, DCS, TCS>,
        orientation: Orientation,
    ) -> Result<(), Error>
    where
        SPI: SpiFrequency,
        DCS: OutputPin,
        TCS: OutputPin,
    {
        self.reset(bus)?;
        self.configure(bus)?;
        self.set_orientation(bus, orientation)
    }

    /// Pulses the reset line. Accepted from any state.
    pub fn reset<SPI, DCS, TCS>(&mut self, bus: &mut SharedBus<SPI, DCS, TCS>) -> Result<(), Error>
    where
        SPI: SpiFrequency,
        DCS: OutputPin,
        TCS: OutputPin,
    {
        self.state = DisplayState::Resetting;

        bus.deselect_all()?;
        self.rst.set_low().map_err(Error::pin)?;
        self.delay.delay_ms(RESET_PULSE_MS);
        self.rst.set_high().map_err(Error::pin)?;
        self.delay.delay_ms(RESET_RECOVERY_MS);

        self.state = DisplayState::Configuring;
        debug!("HX8347-D reset complete");
        Ok(())
    }

    /// Runs the power-up register sequence and turns the display on
    pub fn configure<SPI, DCS, TCS>(
        &mut self,
        bus: &mut SharedBus<SPI, DCS, TCS>,
    ) -> Result<(), Error>
    where
        SPI: SpiFrequency,
        DCS: OutputPin,
        TCS: OutputPin,
    {
        self.require(DisplayState::Configuring)?;

        self.run_sequence(bus, POWER_ON_SEQUENCE)?;
        write_window(bus, &FULL_WINDOW)?;
        self.run_sequence(bus, DISPLAY_ON_SEQUENCE)?;

        // The sequence leaves the controller in its native scan direction.
        self.geometry = DisplayGeometry::new(Orientation::Deg90);
        self.state = DisplayState::Ready;
        debug!("HX8347-D configured");
        Ok(())
    }

    pub fn set_orientation<SPI, DCS, TCS>(
        &mut self,
        bus: &mut SharedBus<SPI, DCS, TCS>,
        orientation: Orientation,
    ) -> Result<(), Error>
    where
        SPI: SpiFrequency,
        DCS: OutputPin,
        TCS: OutputPin,
    {
        self.require(DisplayState::Ready)?;

        command(bus, Register::MemoryAccessControl.into(), orientation.madctl())?;
        self.geometry = DisplayGeometry::new(orientation);
        debug!(
            "Orientation {}°: {}x{}",
            orientation.degrees(),
            self.geometry.width,
            self.geometry.height
        );
        Ok(())
    }

    /// Writes `value` into register `addr`
    pub fn write_register<SPI, DCS, TCS>(
        &mut self,
        bus: &mut SharedBus<SPI, DCS, TCS>,
        addr: impl Into<u8>,
        value: u8,
    ) -> Result<(), Error>
    where
        SPI: SpiFrequency,
        DCS: OutputPin,
        TCS: OutputPin,
    {
        if self.state != DisplayState::Configuring {
            self.require(DisplayState::Ready)?;
        }
        command(bus, addr.into(), value)
    }

    /// Addresses the region the next pixel stream writes into.
    ///
    /// Coordinates are not checked against the geometry.
    pub fn set_window<SPI, DCS, TCS>(
        &mut self,
        bus: &mut SharedBus<SPI, DCS, TCS>,
        window: &Window,
    ) -> Result<(), Error>
    where
        SPI: SpiFrequency,
        DCS: OutputPin,
        TCS: OutputPin,
    {
        self.require(DisplayState::Ready)?;
        write_window(bus, window)
    }

    /// Opens a GRAM write. The display stays selected until the stream ends.
    pub fn begin_pixel_stream<'a, SPI, DCS, TCS>(
        &self,
        bus: &'a mut SharedBus<SPI, DCS, TCS>,
    ) -> Result<PixelStream<'a, SPI, DCS, TCS>, Error>
    where
        SPI: SpiFrequency,
        DCS: OutputPin,
        TCS: OutputPin,
    {
        self.require(DisplayState::Ready)?;

        bus.transaction(Peripheral::Display, |sel| {
            sel.write(&[LCD_REGISTER])?;
            sel.write(&[Register::SramWrite.into()])
        })?;

        let mut selected = bus.select(Peripheral::Display)?;
        selected.write(&[LCD_DATA])?;
        Ok(PixelStream { selected })
    }

    /// Paints the whole panel with one RGB565 colour.
    ///
    /// Columns span the logical height and rows the logical width.
    pub fn fill<SPI, DCS, TCS>(
        &mut self,
        bus: &mut SharedBus<SPI, DCS, TCS>,
        color: u16,
    ) -> Result<(), Error>
    where
        SPI: SpiFrequency,
        DCS: OutputPin,
        TCS: OutputPin,
    {
        let DisplayGeometry { width, height, .. } = self.geometry;
        let window = Window::new(0, 0, height - 1, width - 1);

        self.set_window(bus, &window)?;
        let mut stream = self.begin_pixel_stream(bus)?;
        stream.write_repeated(color, u64::from(width) * u64::from(height))?;
        stream.end()
    }

    /// Gives back the reset line and the delay
    pub fn release(self) -> (RST, DELAY) {
        (self.rst, self.delay)
    }

    fn require(&self, expected: DisplayState) -> Result<(), Error> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    fn run_sequence<SPI, DCS, TCS>(
        &mut self,
        bus: &mut SharedBus<SPI, DCS, TCS>,
        sequence: &[LcdCommand],
    ) -> Result<(), Error>
    where
        SPI: SpiFrequency,
        DCS: OutputPin,
        TCS: OutputPin,
    {
        for cmd in sequence {
            command(bus, cmd.addr, cmd.value)?;
            if let Some(ms) = cmd.delay_after {
                self.delay.delay_ms(ms);
            }
        }
        Ok(())
    }
}

/// Register address then value, each in its own chip-select bracket
fn command<SPI, DCS, TCS>(
    bus: &mut SharedBus<SPI, DCS, TCS>,
    addr: u8,
    value: u8,
) -> Result<(), Error>
where
    SPI: SpiFrequency,
    DCS: OutputPin,
    TCS: OutputPin,
{
    bus.transaction(Peripheral::Display, |sel| {
        sel.write(&[LCD_REGISTER])?;
        sel.write(&[addr])
    })?;
    bus.transaction(Peripheral::Display, |sel| {
        sel.write(&[LCD_DATA])?;
        sel.write(&[value])
    })
}

fn write_window<SPI, DCS, TCS>(
    bus: &mut SharedBus<SPI, DCS, TCS>,
    window: &Window,
) -> Result<(), Error>
where
    SPI: SpiFrequency,
    DCS: OutputPin,
    TCS: OutputPin,
{
    for (register, value) in window.registers() {
        command(bus, register.into(), value)?;
    }
    Ok(())
}

/// An open GRAM write.
///
/// Holds the display selected, which keeps the touch controller off the bus
/// until [`PixelStream::end`] or drop. A stream cut short cannot be resumed;
/// set the window and start over.
pub struct PixelStream<'a, SPI, DCS, TCS>
where
    SPI: SpiFrequency,
    DCS: OutputPin,
    TCS: OutputPin,
{
    selected: Selected<'a, SPI, DCS, TCS>,
}

impl<SPI, DCS, TCS> PixelStream<'_, SPI, DCS, TCS>
where
    SPI: SpiFrequency,
    DCS: OutputPin,
    TCS: OutputPin,
{
    /// Raw bytes, already in wire order
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.selected.write(bytes)
    }

    /// Native RGB565 pixels, swapped to big-endian on the wire
    pub fn write_pixels(&mut self, pixels: &[u16]) -> Result<(), Error> {
        self.write_iter(pixels.iter().copied())
    }

    pub fn write_iter(&mut self, pixels: impl IntoIterator<Item = u16>) -> Result<(), Error> {
        let mut buf = [0u8; STREAM_CHUNK];
        let mut len = 0;
        for pixel in pixels {
            buf[len..len + 2].copy_from_slice(&pixel.to_be_bytes());
            len += 2;
            if len == STREAM_CHUNK {
                self.write(&buf)?;
                len = 0;
            }
        }
        if len > 0 {
            self.write(&buf[..len])?;
        }
        Ok(())
    }

    /// `count` copies of one RGB565 colour
    pub fn write_repeated(&mut self, color: u16, count: u64) -> Result<(), Error> {
        let mut buf = [0u8; STREAM_CHUNK];
        for px in buf.chunks_exact_mut(2) {
            px.copy_from_slice(&color.to_be_bytes());
        }

        let mut remaining = count;
        while remaining > 0 {
            let n = remaining.min(STREAM_CHUNK_PIXELS);
            self.write(&buf[..n as usize * 2])?;
            remaining -= n;
        }
        Ok(())
    }

    /// Deselects the display
    pub fn end(self) -> Result<(), Error> {
        self.selected.release()
    }
}
