//! `embedded-graphics` support for [`Mi0283qt2`]
//!
//! The panel has no framebuffer on the host side, so every draw call goes
//! straight to GRAM. Prefer `fill_contiguous`/`fill_solid` over single pixels:
//! each pixel drawn through `draw_iter` costs a full window setup.

use embedded_graphics_core::pixelcolor::{IntoStorage, Rgb565};
use embedded_graphics_core::prelude::*;
use embedded_graphics_core::primitives::Rectangle;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::bus::SpiFrequency;
use crate::error::Error;
use crate::hx8347d::Window;
use crate::mi0283qt2::Mi0283qt2;

/// Window covering `area`, which must already be clipped to the screen
fn window(area: &Rectangle) -> Option<Window> {
    let bottom_right = area.bottom_right()?;
    Some(Window::new(
        area.top_left.x as u16,
        area.top_left.y as u16,
        bottom_right.x as u16,
        bottom_right.y as u16,
    ))
}

impl<SPI, DCS, TCS, RST, LED, DELAY> OriginDimensions for Mi0283qt2<SPI, DCS, TCS, RST, LED, DELAY>
where
    SPI: SpiFrequency,
    DCS: OutputPin,
    TCS: OutputPin,
    RST: OutputPin,
    LED: OutputPin,
    DELAY: DelayNs,
{
    fn size(&self) -> Size {
        Size::new(u32::from(self.width()), u32::from(self.height()))
    }
}

impl<SPI, DCS, TCS, RST, LED, DELAY> DrawTarget for Mi0283qt2<SPI, DCS, TCS, RST, LED, DELAY>
where
    SPI: SpiFrequency,
    DCS: OutputPin,
    TCS: OutputPin,
    RST: OutputPin,
    LED: OutputPin,
    DELAY: DelayNs,
{
    type Color = Rgb565;
    type Error = Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let bounds = self.bounding_box();
        for Pixel(point, color) in pixels {
            if !bounds.contains(point) {
                continue;
            }
            let (x, y) = (point.x as u16, point.y as u16);
            self.write_window(&Window::new(x, y, x, y), [color.into_storage()])?;
        }
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        let drawable = area.intersection(&self.bounding_box());
        let Some(target) = window(&drawable) else {
            return Ok(());
        };

        if drawable == *area {
            self.write_window(&target, colors.into_iter().map(IntoStorage::into_storage))
        } else {
            // Both walk row-major, so the clipped points keep GRAM order.
            let clipped = area
                .points()
                .zip(colors)
                .filter(|(point, _)| drawable.contains(*point))
                .map(|(_, color)| color.into_storage());
            self.write_window(&target, clipped)
        }
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let drawable = area.intersection(&self.bounding_box());
        match window(&drawable) {
            Some(target) => self.fill_window(&target, color.into_storage()),
            None => Ok(()),
        }
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let screen = self.bounding_box();
        self.fill_solid(&screen, color)
    }
}
