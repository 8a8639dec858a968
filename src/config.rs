use fugit::HertzU32;

use crate::ads7846::{Calibration, MIN_PRESSURE};
use crate::hx8347d::Orientation;

/// Construction-time settings for [`crate::Mi0283qt2`].
///
/// ```
/// use fugit::HertzU32;
/// use mi0283qt2::{Config, Orientation};
///
/// let config = Config::default()
///     .with_display_frequency(HertzU32::MHz(20))
///     .with_orientation(Orientation::Deg180);
/// assert_eq!(config.touch_frequency, HertzU32::MHz(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// SPI clock while the display is selected
    pub display_frequency: HertzU32,
    /// SPI clock while the touch controller is selected
    pub touch_frequency: HertzU32,
    pub calibration: Calibration,
    /// Touches below this pressure are reported as released
    pub min_pressure: u8,
    /// Rotation applied once the display is configured
    pub orientation: Orientation,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            display_frequency: HertzU32::MHz(24),
            touch_frequency: HertzU32::MHz(1),
            calibration: Calibration::default(),
            min_pressure: MIN_PRESSURE,
            orientation: Orientation::Deg0,
        }
    }
}

impl Config {
    pub fn with_display_frequency(mut self, frequency: HertzU32) -> Self {
        self.display_frequency = frequency;
        self
    }

    pub fn with_touch_frequency(mut self, frequency: HertzU32) -> Self {
        self.touch_frequency = frequency;
        self
    }

    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_min_pressure(mut self, min_pressure: u8) -> Self {
        self.min_pressure = min_pressure;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }
}
