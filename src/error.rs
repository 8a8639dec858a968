use core::fmt::{self, Display, Formatter};

use embedded_hal::{digital, spi};

use crate::hx8347d::DisplayState;

/// Errors that can occur when driving the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Orientation is not one of 0, 90, 180 or 270 degrees
    InvalidOrientation(u16),
    /// Display controller is not in a state that accepts the operation
    InvalidState {
        expected: DisplayState,
        actual: DisplayState,
    },
    /// No touch chip-select was wired when the bus was built
    TouchUnavailable,
    /// The SPI transfer or the clock reconfiguration failed
    Bus(spi::ErrorKind),
    /// A chip-select, reset or backlight line could not be driven
    Pin(digital::ErrorKind),
}

impl Error {
    pub(crate) fn spi<E: spi::Error>(err: E) -> Self {
        Error::Bus(err.kind())
    }

    pub(crate) fn pin<E: digital::Error>(err: E) -> Self {
        Error::Pin(err.kind())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidOrientation(deg) => {
                write!(f, "Orientation can only be 0, 90, 180 and 270 (got {deg})")
            }
            Error::InvalidState { expected, actual } => {
                write!(f, "Display is {actual}, operation requires {expected}")
            }
            Error::TouchUnavailable => write!(f, "No touch controller on the bus"),
            Error::Bus(kind) => write!(f, "SPI transaction failed: {kind}"),
            Error::Pin(kind) => write!(f, "Pin error: {kind:?}"),
        }
    }
}
