//! Shared SPI bus for the display and touch controllers
//!
//! The HX8347-D and the ADS7846 sit on the same SPI lines with their own
//! chip-select, but they are rated for different clock speeds. `SharedBus`
//! owns the bus and both chip-selects. A peripheral is only reachable through
//! a [`Selected`] guard, which reprograms the clock to that peripheral's rate
//! before asserting its chip-select and holds the bus mutably until it is
//! released, so the two can never be selected at the same time.

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use fugit::HertzU32;
use log::warn;

use crate::error::Error;

/// SPI bus whose clock can be changed between transactions.
///
/// `embedded-hal` has no notion of bus speed, so HAL users implement this for
/// their SPI peripheral (e.g. by re-applying the peripheral config).
pub trait SpiFrequency: SpiBus<u8> {
    fn set_frequency(&mut self, frequency: HertzU32) -> Result<(), Self::Error>;
}

/// The two endpoints sharing the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Peripheral {
    Display,
    Touch,
}

pub struct SharedBus<SPI, DCS, TCS> {
    spi: SPI,
    display_cs: DCS,
    touch_cs: Option<TCS>,
    display_rate: HertzU32,
    touch_rate: HertzU32,
    /// Last rate handed to the SPI peripheral, `None` when unknown
    frequency: Option<HertzU32>,
    /// Rate forced by [`SharedBus::with_speed`] while its closure runs
    speed_override: Option<HertzU32>,
}

impl<SPI, DCS, TCS> SharedBus<SPI, DCS, TCS>
where
    SPI: SpiFrequency,
    DCS: OutputPin,
    TCS: OutputPin,
{
    /// Takes ownership of the bus and deasserts both chip-selects.
    ///
    /// `touch_cs` may be `None` for panels without the touch controller fitted.
    pub fn new(
        spi: SPI,
        mut display_cs: DCS,
        mut touch_cs: Option<TCS>,
        display_rate: HertzU32,
        touch_rate: HertzU32,
    ) -> Result<Self, Error> {
        display_cs.set_high().map_err(Error::pin)?;
        if let Some(cs) = touch_cs.as_mut() {
            cs.set_high().map_err(Error::pin)?;
        }

        Ok(Self {
            spi,
            display_cs,
            touch_cs,
            display_rate,
            touch_rate,
            frequency: None,
            speed_override: None,
        })
    }

    pub fn has_touch(&self) -> bool {
        self.touch_cs.is_some()
    }

    /// Rated clock for `peripheral`
    pub fn rate(&self, peripheral: Peripheral) -> HertzU32 {
        match peripheral {
            Peripheral::Display => self.display_rate,
            Peripheral::Touch => self.touch_rate,
        }
    }

    /// Clock currently programmed into the SPI peripheral
    pub fn frequency(&self) -> Option<HertzU32> {
        self.frequency
    }

    /// Sets the bus clock to `speed` and runs `f` with exclusive access.
    ///
    /// Every selection made inside `f` runs at `speed` instead of the
    /// peripheral's rated clock. The clock is not restored afterwards; whoever
    /// uses the bus next sets the speed it needs.
    pub fn with_speed<R>(
        &mut self,
        speed: HertzU32,
        f: impl FnOnce(&mut Self) -> Result<R, Error>,
    ) -> Result<R, Error> {
        self.apply_frequency(speed)?;
        let outer = self.speed_override.replace(speed);
        let result = f(self);
        self.speed_override = outer;
        result
    }

    /// Switches to the rated clock of `peripheral`, or the speed forced by an
    /// enclosing [`SharedBus::with_speed`], and asserts its chip-select.
    ///
    /// The chip-select stays asserted until the returned guard is released or
    /// dropped.
    pub fn select(
        &mut self,
        peripheral: Peripheral,
    ) -> Result<Selected<'_, SPI, DCS, TCS>, Error> {
        if peripheral == Peripheral::Touch && self.touch_cs.is_none() {
            return Err(Error::TouchUnavailable);
        }

        let rate = self.speed_override.unwrap_or(self.rate(peripheral));
        self.apply_frequency(rate)?;
        self.chip_select(peripheral, true)?;

        Ok(Selected {
            bus: self,
            peripheral,
            released: false,
        })
    }

    /// Runs `f` inside one chip-select bracket.
    ///
    /// The bus is flushed and the chip-select deasserted on every exit path.
    /// The first error wins: the transfer, then the release.
    pub fn transaction<R>(
        &mut self,
        peripheral: Peripheral,
        f: impl FnOnce(&mut Selected<'_, SPI, DCS, TCS>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let mut selected = self.select(peripheral)?;
        let result = f(&mut selected);
        let released = selected.release();

        if let Err(err) = &result {
            warn!("Error communicating with the {peripheral:?} controller: {err}");
        }

        let value = result?;
        released?;
        Ok(value)
    }

    /// Drives every chip-select high
    pub fn deselect_all(&mut self) -> Result<(), Error> {
        self.display_cs.set_high().map_err(Error::pin)?;
        if let Some(cs) = self.touch_cs.as_mut() {
            cs.set_high().map_err(Error::pin)?;
        }
        Ok(())
    }

    /// Hands back the bus and both chip-selects
    pub fn release(self) -> (SPI, DCS, Option<TCS>) {
        (self.spi, self.display_cs, self.touch_cs)
    }

    fn apply_frequency(&mut self, rate: HertzU32) -> Result<(), Error> {
        if self.frequency == Some(rate) {
            return Ok(());
        }

        // Unknown until the peripheral confirms the new rate.
        self.frequency = None;
        self.spi.set_frequency(rate).map_err(Error::spi)?;
        self.frequency = Some(rate);
        Ok(())
    }

    fn chip_select(&mut self, peripheral: Peripheral, asserted: bool) -> Result<(), Error> {
        match peripheral {
            Peripheral::Display => drive(&mut self.display_cs, asserted),
            Peripheral::Touch => match self.touch_cs.as_mut() {
                Some(cs) => drive(cs, asserted),
                None => Err(Error::TouchUnavailable),
            },
        }
    }
}

// Chip-selects are active low.
fn drive<P: OutputPin>(pin: &mut P, asserted: bool) -> Result<(), Error> {
    let result = if asserted {
        pin.set_low()
    } else {
        pin.set_high()
    };
    result.map_err(Error::pin)
}

/// A peripheral with its chip-select asserted.
///
/// Borrows the bus mutably, so no other peripheral can be selected while this
/// exists. Dropping it deasserts the chip-select; use [`Selected::release`] to
/// observe errors from doing so.
pub struct Selected<'a, SPI, DCS, TCS>
where
    SPI: SpiFrequency,
    DCS: OutputPin,
    TCS: OutputPin,
{
    bus: &'a mut SharedBus<SPI, DCS, TCS>,
    peripheral: Peripheral,
    released: bool,
}

impl<SPI, DCS, TCS> Selected<'_, SPI, DCS, TCS>
where
    SPI: SpiFrequency,
    DCS: OutputPin,
    TCS: OutputPin,
{
    pub fn peripheral(&self) -> Peripheral {
        self.peripheral
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.bus.spi.write(bytes).map_err(Error::spi)
    }

    /// Clocks in `buffer.len()` bytes
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<(), Error> {
        self.bus.spi.read(buffer).map_err(Error::spi)
    }

    /// Flushes the bus and deasserts the chip-select
    pub fn release(mut self) -> Result<(), Error> {
        self.released = true;
        self.finish()
    }

    fn finish(&mut self) -> Result<(), Error> {
        // On failure, still deassert CS.
        let flushed = self.bus.spi.flush().map_err(Error::spi);
        let deselected = self.bus.chip_select(self.peripheral, false);
        flushed?;
        deselected
    }
}

impl<SPI, DCS, TCS> Drop for Selected<'_, SPI, DCS, TCS>
where
    SPI: SpiFrequency,
    DCS: OutputPin,
    TCS: OutputPin,
{
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.finish() {
                warn!("Failed to release the {:?} chip-select: {err}", self.peripheral);
            }
        }
    }
}
