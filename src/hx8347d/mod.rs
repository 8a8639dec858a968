use core::fmt::{Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::Error;

pub mod blocking;

/// Physical panel size in the controller's native (90°) scan direction
pub const LCD_WIDTH: u16 = 320;
pub const LCD_HEIGHT: u16 = 240;

/// 2-bit device id strapped on the panel
pub const LCD_ID: u8 = 0;
/// Prefix announcing a register address
pub const LCD_REGISTER: u8 = 0x70 | (LCD_ID << 2);
/// Prefix announcing register data or pixel payload
pub const LCD_DATA: u8 = 0x72 | (LCD_ID << 2);

/// Minimum time the reset line is held low
pub(crate) const RESET_PULSE_MS: u32 = 50;
/// Minimum time after releasing reset before the first register access
pub(crate) const RESET_RECOVERY_MS: u32 = 120;

/// HX8347-D command set registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    DisplayModeControl = 0x01,
    ColumnStartHigh = 0x02,
    ColumnStartLow = 0x03,
    ColumnEndHigh = 0x04,
    ColumnEndLow = 0x05,
    RowStartHigh = 0x06,
    RowStartLow = 0x07,
    RowEndHigh = 0x08,
    RowEndLow = 0x09,
    MemoryAccessControl = 0x16,
    Colmod = 0x17,
    OscControl2 = 0x18,
    OscControl1 = 0x19,
    PowerControl1 = 0x1A,
    PowerControl2 = 0x1B,
    PowerControl6 = 0x1F,
    /// Write to GRAM; the payload that follows is pixel data
    SramWrite = 0x22,
    VcomControl1 = 0x23,
    VcomControl2 = 0x24,
    VcomControl3 = 0x25,
    DisplayControl2 = 0x27,
    DisplayControl3 = 0x28,
    PanelCharacteristic = 0x36,
    SourceOpControlNormal = 0xE8,
    SourceOpControlIdle = 0xE9,
    PowerControlInternal1 = 0xEA,
    PowerControlInternal2 = 0xEB,
    SourceControlInternal1 = 0xEC,
    SourceControlInternal2 = 0xED,
}

/// Lifecycle of the display controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayState {
    Unpowered,
    Resetting,
    Configuring,
    Ready,
}

impl Display for DisplayState {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            DisplayState::Unpowered => write!(f, "unpowered"),
            DisplayState::Resetting => write!(f, "resetting"),
            DisplayState::Configuring => write!(f, "configuring"),
            DisplayState::Ready => write!(f, "ready"),
        }
    }
}

/// Panel rotation in degrees
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Orientation {
    #[default]
    Deg0 = 0,
    Deg90 = 90,
    Deg180 = 180,
    Deg270 = 270,
}

struct OrientationEntry {
    madctl: u8,
    width: u16,
    height: u16,
}

// Width/height pairs look swapped against the usual portrait/landscape
// naming; they match the scan direction of this panel revision.
const ORIENTATIONS: [OrientationEntry; 4] = [
    OrientationEntry {
        madctl: 0x08,
        width: LCD_HEIGHT,
        height: LCD_WIDTH,
    },
    OrientationEntry {
        madctl: 0xA8,
        width: LCD_WIDTH,
        height: LCD_HEIGHT,
    },
    OrientationEntry {
        madctl: 0xC8,
        width: LCD_HEIGHT,
        height: LCD_WIDTH,
    },
    OrientationEntry {
        madctl: 0x68,
        width: LCD_WIDTH,
        height: LCD_HEIGHT,
    },
];

impl Orientation {
    /// Parses a rotation in degrees
    pub fn from_degrees(degrees: u16) -> Result<Self, Error> {
        Orientation::try_from(degrees).map_err(|e| Error::InvalidOrientation(e.number))
    }

    pub fn degrees(self) -> u16 {
        self.into()
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Orientation::Deg0 => 0,
            Orientation::Deg90 => 1,
            Orientation::Deg180 => 2,
            Orientation::Deg270 => 3,
        }
    }

    /// Memory access control value selecting this rotation
    pub fn madctl(self) -> u8 {
        ORIENTATIONS[self.index()].madctl
    }
}

/// Logical drawing area for the current orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayGeometry {
    pub width: u16,
    pub height: u16,
    pub orientation: Orientation,
}

impl DisplayGeometry {
    pub fn new(orientation: Orientation) -> Self {
        let entry = &ORIENTATIONS[orientation.index()];
        Self {
            width: entry.width,
            height: entry.height,
            orientation,
        }
    }
}

impl From<Orientation> for DisplayGeometry {
    fn from(orientation: Orientation) -> Self {
        DisplayGeometry::new(orientation)
    }
}

/// Inclusive rectangle in logical pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Window {
    pub x0: u16,
    pub y0: u16,
    pub x1: u16,
    pub y1: u16,
}

impl Window {
    pub const fn new(x0: u16, y0: u16, x1: u16, y1: u16) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Number of pixels covered, zero when the corners are inverted.
    ///
    /// `u64` so a full 16-bit window (2^32 pixels) fits on 32-bit targets.
    pub fn pixel_count(&self) -> u64 {
        let columns = u64::from(self.x1).checked_sub(u64::from(self.x0));
        let rows = u64::from(self.y1).checked_sub(u64::from(self.y0));
        match (columns, rows) {
            (Some(c), Some(r)) => (c + 1) * (r + 1),
            _ => 0,
        }
    }

    /// The eight register writes that address this window, in wire order
    pub fn registers(&self) -> [(Register, u8); 8] {
        let [x0_lo, x0_hi] = self.x0.to_le_bytes();
        let [x1_lo, x1_hi] = self.x1.to_le_bytes();
        let [y0_lo, y0_hi] = self.y0.to_le_bytes();
        let [y1_lo, y1_hi] = self.y1.to_le_bytes();
        [
            (Register::ColumnStartLow, x0_lo),
            (Register::ColumnStartHigh, x0_hi),
            (Register::ColumnEndLow, x1_lo),
            (Register::ColumnEndHigh, x1_hi),
            (Register::RowStartLow, y0_lo),
            (Register::RowStartHigh, y0_hi),
            (Register::RowEndLow, y1_lo),
            (Register::RowEndHigh, y1_hi),
        ]
    }
}

// Define a structure for the LCD command
pub(crate) struct LcdCommand {
    addr: u8,
    value: u8,
    /// Settle time in milliseconds after the write
    delay_after: Option<u32>,
}

const fn cmd(addr: Register, value: u8) -> LcdCommand {
    LcdCommand {
        addr: addr as u8,
        value,
        delay_after: None,
    }
}

const fn cmd_wait(addr: Register, value: u8, ms: u32) -> LcdCommand {
    LcdCommand {
        addr: addr as u8,
        value,
        delay_after: Some(ms),
    }
}

/// Power-up sequence up to the default window
pub(crate) const POWER_ON_SEQUENCE: &[LcdCommand] = &[
    // driving ability
    cmd(Register::PowerControlInternal1, 0x00),
    cmd(Register::PowerControlInternal2, 0x20),
    cmd(Register::SourceControlInternal1, 0x0C),
    cmd(Register::SourceControlInternal2, 0xC4),
    cmd(Register::SourceOpControlNormal, 0x40),
    cmd(Register::SourceOpControlIdle, 0x38),
    LcdCommand {
        addr: 0xF1,
        value: 0x01,
        delay_after: None,
    },
    LcdCommand {
        addr: 0xF2,
        value: 0x10,
        delay_after: None,
    },
    cmd(Register::DisplayControl2, 0xA3),
    // power voltage
    cmd(Register::PowerControl2, 0x1B),
    cmd(Register::PowerControl1, 0x01),
    cmd(Register::VcomControl2, 0x2F),
    cmd(Register::VcomControl3, 0x57),
    // VCOM offset
    cmd(Register::VcomControl1, 0x8D),
    // power on
    cmd(Register::OscControl2, 0x36),
    // start osc
    cmd(Register::OscControl1, 0x01),
    // wakeup
    cmd(Register::DisplayModeControl, 0x00),
    // power stages, strictly in this order
    cmd_wait(Register::PowerControl6, 0x88, 5),
    cmd_wait(Register::PowerControl6, 0x80, 5),
    cmd_wait(Register::PowerControl6, 0x90, 5),
    cmd_wait(Register::PowerControl6, 0xD0, 5),
    // 65K colors
    cmd(Register::Colmod, 0x05),
    cmd(Register::PanelCharacteristic, 0x00),
    // native scan direction, RGB order
    cmd(Register::MemoryAccessControl, 0xA8),
];

/// Display on, after the default window has been written
pub(crate) const DISPLAY_ON_SEQUENCE: &[LcdCommand] = &[
    cmd_wait(Register::DisplayControl3, 0x38, 50),
    cmd_wait(Register::DisplayControl3, 0x3C, 5),
];

/// Window covering the whole panel in its native scan direction
pub(crate) const FULL_WINDOW: Window = Window::new(0, 0, LCD_WIDTH - 1, LCD_HEIGHT - 1);
