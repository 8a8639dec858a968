use embedded_hal::digital::OutputPin;
use log::trace;

use super::{command, pressure, Calibration, Channel, RawSample, Resolution, TouchPoint};
use crate::bus::{Peripheral, Selected, SharedBus, SpiFrequency};
use crate::error::Error;
use crate::hx8347d::DisplayGeometry;

/// ADS7846 / XPT2046 touch controller.
///
/// Stateless between polls: every call goes out to the controller.
#[derive(Debug, Clone, Copy)]
pub struct Ads7846 {
    calibration: Calibration,
    min_pressure: u8,
}

impl Ads7846 {
    pub fn new(calibration: Calibration, min_pressure: u8) -> Self {
        Self {
            calibration,
            min_pressure,
        }
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn set_calibration(&mut self, calibration: Calibration) {
        self.calibration = calibration;
    }

    pub fn min_pressure(&self) -> u8 {
        self.min_pressure
    }

    /// Polls the panel once.
    ///
    /// Returns `None` when nothing presses the panel or when no touch
    /// chip-select is wired. The bus is left at the touch rate.
    pub fn read_touch<SPI, DCS, TCS>(
        &self,
        bus: &mut SharedBus<SPI, DCS, TCS>,
        geometry: &DisplayGeometry,
    ) -> Result<Option<TouchPoint>, Error>
    where
        SPI: SpiFrequency,
        DCS: OutputPin,
        TCS: OutputPin,
    {
        if !bus.has_touch() {
            return Ok(None);
        }

        let rate = bus.rate(Peripheral::Touch);
        bus.with_speed(rate, |bus| {
            let pressure = self.pressure(bus)?;
            if pressure < self.min_pressure {
                return Ok(None);
            }

            let raw = self.read_raw(bus)?;
            let point = self.calibration.to_screen(raw, geometry);
            trace!(
                "Touch p={} raw=({}, {}) -> ({}, {})",
                pressure,
                raw.x,
                raw.y,
                point.x,
                point.y
            );
            Ok(Some(point))
        })
    }

    /// Contact pressure from one Z1/Z2 probe
    pub fn pressure<SPI, DCS, TCS>(&self, bus: &mut SharedBus<SPI, DCS, TCS>) -> Result<u8, Error>
    where
        SPI: SpiFrequency,
        DCS: OutputPin,
        TCS: OutputPin,
    {
        bus.transaction(Peripheral::Touch, |sel| {
            let z1 = read_8bit(sel, Channel::Z1)?;
            let z2 = read_8bit(sel, Channel::Z2)?;
            Ok(pressure(z1, z2))
        })
    }

    /// Samples both plates at 12 bits.
    ///
    /// Each axis is converted twice and the first result discarded, giving the
    /// plate time to settle after the channel switch.
    pub fn read_raw<SPI, DCS, TCS>(
        &self,
        bus: &mut SharedBus<SPI, DCS, TCS>,
    ) -> Result<RawSample, Error>
    where
        SPI: SpiFrequency,
        DCS: OutputPin,
        TCS: OutputPin,
    {
        bus.transaction(Peripheral::Touch, |sel| {
            let x = read_settled(sel, Channel::X)?;
            let y = read_settled(sel, Channel::Y)?;
            Ok(RawSample { x, y })
        })
    }
}

impl Default for Ads7846 {
    fn default() -> Self {
        Self::new(Calibration::default(), super::MIN_PRESSURE)
    }
}

fn read_8bit<SPI, DCS, TCS>(
    sel: &mut Selected<'_, SPI, DCS, TCS>,
    channel: Channel,
) -> Result<u8, Error>
where
    SPI: SpiFrequency,
    DCS: OutputPin,
    TCS: OutputPin,
{
    let mut buf = [0u8; 1];
    sel.write(&[command(channel, Resolution::Bits8)])?;
    sel.read(&mut buf)?;
    Ok(buf[0])
}

fn read_12bit<SPI, DCS, TCS>(
    sel: &mut Selected<'_, SPI, DCS, TCS>,
    channel: Channel,
) -> Result<u16, Error>
where
    SPI: SpiFrequency,
    DCS: OutputPin,
    TCS: OutputPin,
{
    let mut buf = [0u8; 2];
    sel.write(&[command(channel, Resolution::Bits12)])?;
    sel.read(&mut buf)?;
    // result sits in bits 14..3 of the response
    Ok((u16::from_be_bytes(buf) >> 3) & 0x0FFF)
}

fn read_settled<SPI, DCS, TCS>(
    sel: &mut Selected<'_, SPI, DCS, TCS>,
    channel: Channel,
) -> Result<u16, Error>
where
    SPI: SpiFrequency,
    DCS: OutputPin,
    TCS: OutputPin,
{
    read_12bit(sel, channel)?;
    read_12bit(sel, channel)
}
