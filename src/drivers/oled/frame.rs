use std::convert::Infallible;

use embedded_graphics::{Pixel, pixelcolor::BinaryColor, prelude::*};

pub const WIDTH: u32 = 128;
pub const HEIGHT: u32 = 64;
const PAGES: u32 = HEIGHT / 8;

/// Monochrome frame in SSD1306 page layout: one byte covers eight
/// vertically stacked pixels, least significant bit on top.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    ram: Vec<u8>,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self {
            ram: vec![0; (WIDTH * PAGES) as usize],
        }
    }
}

impl FrameBuffer {
    pub fn clear(&mut self) {
        self.ram.fill(0);
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, on: bool) {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return;
        };
        if x >= WIDTH || y >= HEIGHT {
            return;
        }
        let index = ((y / 8) * WIDTH + x) as usize;
        let bit = 1 << (y % 8);
        if on {
            self.ram[index] |= bit;
        } else {
            self.ram[index] &= !bit;
        }
    }

    pub fn pixel(&self, x: i32, y: i32) -> bool {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return false;
        };
        if x >= WIDTH || y >= HEIGHT {
            return false;
        }
        self.ram[((y / 8) * WIDTH + x) as usize] & (1 << (y % 8)) != 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.ram
    }

    pub fn lit_pixels(&self) -> u32 {
        self.ram.iter().map(|b| b.count_ones()).sum()
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(WIDTH, HEIGHT)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set_pixel(point.x, point.y, color.is_on());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
    use pretty_assertions::assert_eq;

    #[test]
    fn page_layout() {
        let mut frame = FrameBuffer::default();
        frame.set_pixel(3, 0, true);
        frame.set_pixel(3, 9, true);
        frame.set_pixel(127, 63, true);

        assert_eq!(frame.as_bytes()[3], 0b0000_0001);
        assert_eq!(frame.as_bytes()[128 + 3], 0b0000_0010);
        assert_eq!(frame.as_bytes()[7 * 128 + 127], 0b1000_0000);
        assert!(frame.pixel(3, 9));
        assert!(!frame.pixel(4, 9));
    }

    #[test]
    fn out_of_bounds_is_ignored() {
        let mut frame = FrameBuffer::default();
        frame.set_pixel(-1, 0, true);
        frame.set_pixel(128, 0, true);
        frame.set_pixel(0, 64, true);
        assert_eq!(frame.lit_pixels(), 0);
    }

    #[test]
    fn draws_primitives() {
        let mut frame = FrameBuffer::default();
        Rectangle::new(Point::new(24, 30), Size::new(3, 10))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut frame)
            .unwrap();
        assert_eq!(frame.lit_pixels(), 30);

        frame.clear();
        assert_eq!(frame.lit_pixels(), 0);
    }
}
