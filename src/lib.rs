#![cfg_attr(not(test), no_std)]
//! MI0283QT2 TFT panel driver
//!
//! Drives the HX8347-D display controller and the ADS7846 / XPT2046 resistive
//! touch controller of the MI0283QT2 module. Both sit on one SPI bus with
//! separate chip-selects and different clock limits, so all traffic goes
//! through a [`SharedBus`] that switches the clock and the chip-select as one
//! step.
//!
//! [`Mi0283qt2`] is the entry point for a graphics stack: `flush` renders a
//! rectangle of RGB565 pixels and `read_input` polls the touch panel. The
//! controller drivers in [`hx8347d`] and [`ads7846`] can also be used on
//! their own with a borrowed [`SharedBus`].
//!
//! The SPI peripheral must implement [`SpiFrequency`] on top of
//! `embedded_hal::spi::SpiBus<u8>` so the bus clock can follow the selected
//! controller.

/// ADS7846 / XPT2046 resistive touch controller driver.
pub mod ads7846;

/// Shared SPI bus with per-peripheral clock and chip-select.
pub mod bus;

/// Construction-time panel settings.
pub mod config;

/// Error type shared by every driver in the crate.
pub mod error;

/// HX8347-D display controller driver.
pub mod hx8347d;

/// MI0283QT2 panel driver combining display, touch and backlight.
pub mod mi0283qt2;

/// `embedded-graphics` draw target for the panel.
#[cfg(feature = "graphics")]
pub mod graphics;

#[cfg(test)]
mod mock;

pub use ads7846::{blocking::Ads7846, Calibration, RawSample, TouchPoint};
pub use bus::{Peripheral, SharedBus, SpiFrequency};
pub use config::Config;
pub use error::Error;
pub use hx8347d::{blocking::Hx8347d, DisplayGeometry, DisplayState, Orientation, Window};
pub use mi0283qt2::{InputState, Mi0283qt2};
