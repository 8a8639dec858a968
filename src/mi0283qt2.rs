//! MI0283QT2 panel: HX8347-D display and ADS7846 touch on one SPI bus
//!
//! [`Mi0283qt2`] owns every line of the panel and is what a graphics stack
//! talks to. Rendering goes through [`Mi0283qt2::flush`] and input through
//! [`Mi0283qt2::read_input`]; both are blocking and take the bus for their
//! whole duration, so a flush and a touch poll never interleave.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{debug, info};

use crate::ads7846::blocking::Ads7846;
use crate::ads7846::TouchPoint;
use crate::bus::{SharedBus, SpiFrequency};
use crate::config::Config;
use crate::error::Error;
use crate::hx8347d::blocking::Hx8347d;
use crate::hx8347d::{DisplayGeometry, DisplayState, Orientation, Window};

/// Pointer state reported to the input layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputState {
    Released,
    Pressed { x: i32, y: i32 },
}

impl From<Option<TouchPoint>> for InputState {
    fn from(point: Option<TouchPoint>) -> Self {
        match point {
            Some(TouchPoint { x, y }) => InputState::Pressed { x, y },
            None => InputState::Released,
        }
    }
}

pub struct Mi0283qt2<SPI, DCS, TCS, RST, LED, DELAY> {
    bus: SharedBus<SPI, DCS, TCS>,
    display: Hx8347d<RST, DELAY>,
    touch: Ads7846,
    backlight: LED,
}

impl<SPI, DCS, TCS, RST, LED, DELAY> Mi0283qt2<SPI, DCS, TCS, RST, LED, DELAY>
where
    SPI: SpiFrequency,
    DCS: OutputPin,
    TCS: OutputPin,
    RST: OutputPin,
    LED: OutputPin,
    DELAY: DelayNs,
{
    /// Brings the panel up and switches the backlight on.
    ///
    /// The backlight stays off and the controller held in reset until the
    /// bus is idle. Pass `None` for `touch_cs` on panels without the touch
    /// controller.
    pub fn new(
        config: Config,
        spi: SPI,
        display_cs: DCS,
        touch_cs: Option<TCS>,
        mut reset: RST,
        mut backlight: LED,
        delay: DELAY,
    ) -> Result<Self, Error> {
        backlight.set_low().map_err(Error::pin)?;
        reset.set_low().map_err(Error::pin)?;

        let mut bus = SharedBus::new(
            spi,
            display_cs,
            touch_cs,
            config.display_frequency,
            config.touch_frequency,
        )?;
        let mut display = Hx8347d::new(reset, delay);
        display.init(&mut bus, config.orientation)?;

        backlight.set_high().map_err(Error::pin)?;

        let geometry = display.geometry();
        info!(
            "MI0283QT2 ready: {}x{} at {}°, touch {}",
            geometry.width,
            geometry.height,
            geometry.orientation.degrees(),
            if bus.has_touch() { "enabled" } else { "disabled" }
        );

        Ok(Self {
            bus,
            display,
            touch: Ads7846::new(config.calibration, config.min_pressure),
            backlight,
        })
    }

    /// Draws `pixels` into `area`, then signals `flush_ready`.
    ///
    /// `flush_ready` runs exactly once whether or not the transfer succeeded,
    /// so the caller's render loop is never left waiting.
    pub fn flush(
        &mut self,
        area: &Window,
        pixels: &[u16],
        flush_ready: impl FnOnce(),
    ) -> Result<(), Error> {
        let result = self.write_window(area, pixels.iter().copied());
        flush_ready();
        result
    }

    /// Addresses `area` and streams `pixels` into it in row-major order
    pub fn write_window(
        &mut self,
        area: &Window,
        pixels: impl IntoIterator<Item = u16>,
    ) -> Result<(), Error> {
        self.display.set_window(&mut self.bus, area)?;
        let mut stream = self.display.begin_pixel_stream(&mut self.bus)?;
        stream.write_iter(pixels)?;
        stream.end()
    }

    /// Paints `area` with one colour
    pub fn fill_window(&mut self, area: &Window, color: u16) -> Result<(), Error> {
        self.display.set_window(&mut self.bus, area)?;
        let mut stream = self.display.begin_pixel_stream(&mut self.bus)?;
        stream.write_repeated(color, area.pixel_count())?;
        stream.end()
    }

    /// Paints the whole panel with one colour
    pub fn fill(&mut self, color: u16) -> Result<(), Error> {
        self.display.fill(&mut self.bus, color)
    }

    /// One touch poll, in logical pixels of the current orientation
    pub fn read_touch(&mut self) -> Result<Option<TouchPoint>, Error> {
        let geometry = self.display.geometry();
        self.touch.read_touch(&mut self.bus, &geometry)
    }

    pub fn read_input(&mut self) -> Result<InputState, Error> {
        self.read_touch().map(InputState::from)
    }

    pub fn set_backlight(&mut self, on: bool) -> Result<(), Error> {
        if on {
            self.backlight.set_high().map_err(Error::pin)
        } else {
            self.backlight.set_low().map_err(Error::pin)
        }
    }

    /// Rotates the panel; `degrees` must be 0, 90, 180 or 270
    pub fn set_orientation(&mut self, degrees: u16) -> Result<(), Error> {
        let orientation = Orientation::from_degrees(degrees)?;
        self.display.set_orientation(&mut self.bus, orientation)
    }

    /// Pulses reset and reapplies the full configuration, keeping the current
    /// orientation
    pub fn reinit(&mut self) -> Result<(), Error> {
        let orientation = self.display.geometry().orientation;
        debug!("Reinitialising display");
        self.display.reset(&mut self.bus)?;
        self.display.configure(&mut self.bus)?;
        self.display.set_orientation(&mut self.bus, orientation)
    }

    pub fn width(&self) -> u16 {
        self.display.geometry().width
    }

    pub fn height(&self) -> u16 {
        self.display.geometry().height
    }

    pub fn orientation(&self) -> Orientation {
        self.display.geometry().orientation
    }

    pub fn geometry(&self) -> DisplayGeometry {
        self.display.geometry()
    }

    pub fn state(&self) -> DisplayState {
        self.display.state()
    }

    pub fn touch(&mut self) -> &mut Ads7846 {
        &mut self.touch
    }

    /// Gives back every owned line: `(spi, display_cs, touch_cs, reset,
    /// backlight, delay)`
    #[allow(clippy::type_complexity)]
    pub fn release(self) -> (SPI, DCS, Option<TCS>, RST, LED, DELAY) {
        let (spi, display_cs, touch_cs) = self.bus.release();
        let (reset, delay) = self.display.release();
        (spi, display_cs, touch_cs, reset, self.backlight, delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Event, FakeDelay, FakePin, FakeSpi, Wire};
    use core::cell::Cell;
    use embedded_hal::spi::ErrorKind;

    type Panel = Mi0283qt2<FakeSpi, FakePin, FakePin, FakePin, FakePin, FakeDelay>;

    fn panel_with(wire: &Wire, config: Config, touch: bool) -> Panel {
        Mi0283qt2::new(
            config,
            FakeSpi::new(wire),
            FakePin::new("display_cs", wire),
            touch.then(|| FakePin::new("touch_cs", wire)),
            FakePin::new("rst", wire),
            FakePin::new("backlight", wire),
            FakeDelay::new(wire),
        )
        .unwrap()
    }

    fn panel(wire: &Wire) -> Panel {
        let panel = panel_with(wire, Config::default(), true);
        wire.clear();
        panel
    }

    #[test]
    fn test_construction_order() {
        let wire = Wire::new();
        let panel = panel_with(&wire, Config::default(), true);

        let events = wire.events();
        assert_eq!(
            &events[..4],
            &[
                Event::Pin("backlight", false),
                Event::Pin("rst", false),
                Event::Pin("display_cs", true),
                Event::Pin("touch_cs", true),
            ]
        );
        assert_eq!(events.last(), Some(&Event::Pin("backlight", true)));

        // configured orientation applied last
        assert_eq!(wire.registers().last(), Some(&(0x16, 0x08)));
        assert_eq!(panel.state(), DisplayState::Ready);
        assert_eq!(panel.orientation(), Orientation::Deg0);
        assert_eq!((panel.width(), panel.height()), (240, 320));
    }

    #[test]
    fn test_construction_failure_is_returned() {
        let wire = Wire::new();
        wire.fail_spi(true);

        let result: Result<Panel, Error> = Mi0283qt2::new(
            Config::default(),
            FakeSpi::new(&wire),
            FakePin::new("display_cs", &wire),
            Some(FakePin::new("touch_cs", &wire)),
            FakePin::new("rst", &wire),
            FakePin::new("backlight", &wire),
            FakeDelay::new(&wire),
        );

        assert!(matches!(result, Err(Error::Bus(ErrorKind::Other))));
        assert!(!wire.events().contains(&Event::Pin("backlight", true)));
    }

    #[test]
    fn test_flush_10x10() {
        let wire = Wire::new();
        let mut panel = panel(&wire);
        let pixels = [0xF800u16; 100];
        let calls = Cell::new(0);

        panel
            .flush(&Window::new(0, 0, 9, 9), &pixels, || {
                calls.set(calls.get() + 1)
            })
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(
            &wire.registers()[..8],
            &[
                (0x03, 0),
                (0x02, 0),
                (0x05, 9),
                (0x04, 0),
                (0x07, 0),
                (0x06, 0),
                (0x09, 9),
                (0x08, 0),
            ]
        );

        let events = wire.events();
        let begins: std::vec::Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| **e == Event::Write(std::vec![0x22]))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(begins.len(), 1);

        // after the GRAM command: deselect, select, data prefix, pixels, end
        let stream = &events[begins[0] + 1..];
        assert_eq!(stream[0], Event::Pin("display_cs", true));
        assert_eq!(stream[1], Event::Pin("display_cs", false));
        assert_eq!(stream[2], Event::Write(std::vec![0x72]));
        let (last, body) = stream[3..].split_last().unwrap();
        assert_eq!(*last, Event::Pin("display_cs", true));
        let bytes: std::vec::Vec<u8> = body
            .iter()
            .flat_map(|e| match e {
                Event::Write(bytes) => bytes.clone(),
                other => panic!("unexpected {other:?} while streaming"),
            })
            .collect();
        assert_eq!(bytes.len(), 200);
        assert!(bytes.chunks(2).all(|px| px == [0xF8, 0x00]));
    }

    #[test]
    fn test_flush_ready_called_on_failure() {
        let wire = Wire::new();
        let mut panel = panel(&wire);
        wire.fail_spi(true);
        let calls = Cell::new(0);

        let result = panel.flush(&Window::new(0, 0, 1, 1), &[0; 4], || {
            calls.set(calls.get() + 1)
        });

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
        assert_eq!(wire.events().last(), Some(&Event::Pin("display_cs", true)));
    }

    #[test]
    fn test_invalid_orientation() {
        let wire = Wire::new();
        let mut panel = panel(&wire);

        assert_eq!(
            panel.set_orientation(45),
            Err(Error::InvalidOrientation(45))
        );
        assert!(wire.events().is_empty());
        assert_eq!(panel.orientation(), Orientation::Deg0);

        panel.set_orientation(90).unwrap();
        assert_eq!((panel.width(), panel.height()), (320, 240));
    }

    #[test]
    fn test_read_input() {
        let wire = Wire::new();
        let mut panel = panel(&wire);

        wire.push_rx(&[0x00, 0xFF]);
        assert_eq!(panel.read_input(), Ok(InputState::Released));

        wire.push_rx(&[0x40, 0xBF]);
        wire.push_rx(&[0, 0, 0x3E, 0x80, 0, 0, 0x3E, 0x80]);
        assert_eq!(
            panel.read_input(),
            Ok(InputState::Pressed { x: 119, y: 153 })
        );
    }

    #[test]
    fn test_touch_poll_between_frames() {
        let wire = Wire::new();
        let mut panel = panel(&wire);
        wire.push_rx(&[0x7F, 0x80]);

        panel.read_input().unwrap();
        panel.fill_window(&Window::new(0, 0, 0, 0), 0xFFFF).unwrap();

        assert_eq!(wire.frequencies(), [1_000_000, 24_000_000]);
    }

    #[test]
    fn test_without_touch_controller() {
        let wire = Wire::new();
        let mut panel = panel_with(&wire, Config::default(), false);
        wire.clear();

        assert_eq!(panel.read_input(), Ok(InputState::Released));
        assert!(wire.events().is_empty());
    }

    #[test]
    fn test_backlight() {
        let wire = Wire::new();
        let mut panel = panel(&wire);

        panel.set_backlight(false).unwrap();
        panel.set_backlight(true).unwrap();

        assert_eq!(
            wire.events(),
            [Event::Pin("backlight", false), Event::Pin("backlight", true)]
        );
    }

    #[test]
    fn test_reinit_keeps_orientation() {
        let wire = Wire::new();
        let mut panel = panel(&wire);
        panel.set_orientation(180).unwrap();
        wire.clear();

        panel.reinit().unwrap();

        assert!(wire.events().contains(&Event::Pin("rst", false)));
        assert_eq!(wire.registers().last(), Some(&(0x16, 0xC8)));
        assert_eq!(panel.orientation(), Orientation::Deg180);
        assert_eq!(panel.state(), DisplayState::Ready);
    }

    #[test]
    fn test_release_returns_lines() {
        let wire = Wire::new();
        let panel = panel(&wire);
        let (_spi, _dcs, touch_cs, _rst, mut backlight, _delay) = panel.release();

        assert!(touch_cs.is_some());
        backlight.set_low().unwrap();
        assert_eq!(wire.events(), [Event::Pin("backlight", false)]);
    }
}
