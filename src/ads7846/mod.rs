//! ADS7846 / XPT2046 resistive touch controller
//!
//! Each poll probes pressure with two 8-bit differential reads (Z1, Z2) and,
//! only when the panel is pressed, samples X and Y at 12 bits. Raw samples are
//! mapped onto the display's logical pixel range with fixed per-unit
//! calibration bounds. Nothing is cached between polls.

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::hx8347d::DisplayGeometry;

pub mod blocking;

/// Largest 12-bit ADC reading
pub const ADC_MAX: u16 = 4095;

/// Default minimum pressure for a touch to count (range 1 to 254)
pub const MIN_PRESSURE: u8 = 2;

bitflags! {
    /// Control byte bits outside the channel field
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AdsCommand: u8 {
        /// Bit 7: start bit, always set
        const START = 0x80;
        /// Bit 3: 8-bit conversion (cleared for 12-bit)
        const MODE_8BIT = 0x08;
        /// Bit 2: single-ended reference (cleared for differential)
        const SINGLE_ENDED = 0x04;
        /// Bit 1: keep the ADC powered between conversions
        const ALWAYS_ON = 0x02;
        /// Bit 0: keep the reference powered between conversions
        const REF_ON = 0x01;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AdsCommand {
    fn format(&self, f: defmt::Formatter) {
        self.iter_names().for_each(|name| {
            defmt::write!(f, "{}", name);
        });
    }
}

/// Channel select field, bits 6..4 of the control byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Y = 0x10,
    Z1 = 0x30,
    Z2 = 0x40,
    X = 0x50,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    Bits8,
    Bits12,
}

impl Resolution {
    /// Response bytes clocked in after the command byte
    pub fn response_len(self) -> usize {
        match self {
            Resolution::Bits8 => 1,
            Resolution::Bits12 => 2,
        }
    }
}

/// Differential conversion of `channel`, ADC kept powered
pub fn command(channel: Channel, resolution: Resolution) -> u8 {
    let mut flags = AdsCommand::START | AdsCommand::ALWAYS_ON;
    if resolution == Resolution::Bits8 {
        flags |= AdsCommand::MODE_8BIT;
    }
    flags.bits() | u8::from(channel)
}

/// Contact pressure from the two 8-bit Z readings
pub fn pressure(z1: u8, z2: u8) -> u8 {
    (z1 & 0x7F) + ((255 - z2) & 0x7F)
}

/// Raw ADC extremes matching the panel edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    pub x_min: u16,
    pub x_max: u16,
    pub y_min: u16,
    pub y_max: u16,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            x_min: 170,
            x_max: 3815,
            y_min: 286,
            y_max: 3839,
        }
    }
}

/// 12-bit readings of both plates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    pub x: u16,
    pub y: u16,
}

/// Touch position in logical pixels.
///
/// Not clamped: readings beyond the calibration bounds land outside the
/// visible area, possibly negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchPoint {
    pub x: i32,
    pub y: i32,
}

/// Linear rescale of `value` from `[in_min, in_max]` onto `[out_min, out_max]`,
/// floored, without clamping
pub fn map_range(value: i32, in_min: i32, in_max: i32, out_min: i32, out_max: i32) -> i32 {
    let scaled = f64::from(value - in_min) * f64::from(out_max - out_min)
        / f64::from(in_max - in_min);
    libm::floor(scaled + f64::from(out_min)) as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, Copy)]
struct AxisSource {
    axis: Axis,
    inverted: bool,
}

const fn src(axis: Axis, inverted: bool) -> AxisSource {
    AxisSource { axis, inverted }
}

/// Raw axis feeding screen `[x, y]`, per orientation
const TOUCH_AXES: [[AxisSource; 2]; 4] = [
    // 0°
    [src(Axis::X, false), src(Axis::Y, false)],
    // 90°
    [src(Axis::Y, true), src(Axis::X, false)],
    // 180°
    [src(Axis::X, true), src(Axis::Y, true)],
    // 270°
    [src(Axis::Y, false), src(Axis::X, true)],
];

impl Calibration {
    /// Maps a raw sample onto the logical pixel grid of `geometry`
    pub fn to_screen(&self, raw: RawSample, geometry: &DisplayGeometry) -> TouchPoint {
        let [x_src, y_src] = TOUCH_AXES[geometry.orientation.index()];
        TouchPoint {
            x: self.map_axis(raw, x_src, geometry.width),
            y: self.map_axis(raw, y_src, geometry.height),
        }
    }

    fn map_axis(&self, raw: RawSample, source: AxisSource, extent: u16) -> i32 {
        let (value, min, max) = match source.axis {
            Axis::X => (raw.x, self.x_min, self.x_max),
            Axis::Y => (raw.y, self.y_min, self.y_max),
        };
        let value = if source.inverted {
            i32::from(ADC_MAX) - i32::from(value)
        } else {
            i32::from(value)
        };
        map_range(
            value,
            i32::from(min),
            i32::from(max),
            0,
            i32::from(extent) - 1,
        )
    }
}
