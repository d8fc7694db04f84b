/*
 *  canvas.rs
 *
 *  PixooArt - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use image::{Rgb, RgbImage};

/// embedded-graphics draw target over a borrowed true colour image.
pub struct RgbCanvas<'a> {
    img: &'a mut RgbImage,
}

impl<'a> RgbCanvas<'a> {
    pub fn new(img: &'a mut RgbImage) -> Self {
        Self { img }
    }

    /// Map (x,y) to pixel coordinates; returns None if out of bounds
    #[inline]
    fn coords(&self, p: Point) -> Option<(u32, u32)> {
        if p.x >= 0 && p.y >= 0 {
            let (x, y) = (p.x as u32, p.y as u32);
            if x < self.img.width() && y < self.img.height() {
                return Some((x, y));
            }
        }
        None
    }

    /// Alpha blend a solid colour over a rectangle, clipped to the canvas.
    pub fn blend_rect(&mut self, area: &Rectangle, color: [u8; 3], opacity: f32) {
        let a = opacity.clamp(0.0, 1.0);
        let Some(bottom_right) = area.bottom_right() else { return };
        for y in area.top_left.y..=bottom_right.y {
            for x in area.top_left.x..=bottom_right.x {
                if let Some((px, py)) = self.coords(Point::new(x, y)) {
                    let p = self.img.get_pixel_mut(px, py);
                    for c in 0..3 {
                        p[c] = (color[c] as f32 * a + p[c] as f32 * (1.0 - a)).round() as u8;
                    }
                }
            }
        }
    }
}

#[inline]
pub fn to_rgb888(c: [u8; 3]) -> Rgb888 {
    Rgb888::new(c[0], c[1], c[2])
}

impl OriginDimensions for RgbCanvas<'_> {
    fn size(&self) -> Size {
        Size::new(self.img.width(), self.img.height())
    }
}

impl DrawTarget for RgbCanvas<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some((x, y)) = self.coords(p) {
                self.img.put_pixel(x, y, Rgb([c.r(), c.g(), c.b()]));
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let fill = Rgb([color.r(), color.g(), color.b()]);
        self.img.pixels_mut().for_each(|p| *p = fill);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

    #[test]
    fn test_draw_clips_to_canvas() {
        let mut img = RgbImage::new(4, 4);
        let mut canvas = RgbCanvas::new(&mut img);
        Rectangle::new(Point::new(2, 2), Size::new(10, 10))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::RED))
            .draw(&mut canvas)
            .ok();
        assert_eq!(img.get_pixel(3, 3).0, [255, 0, 0]);
        assert_eq!(img.get_pixel(1, 1).0, [0, 0, 0]);
    }

    #[test]
    fn test_blend_rect() {
        let mut img = RgbImage::from_pixel(2, 2, Rgb([200, 200, 200]));
        let mut canvas = RgbCanvas::new(&mut img);
        canvas.blend_rect(&Rectangle::new(Point::new(-1, 0), Size::new(2, 1)), [0, 0, 0], 0.5);
        assert_eq!(img.get_pixel(0, 0).0, [100, 100, 100]);
        assert_eq!(img.get_pixel(1, 0).0, [200, 200, 200]);
    }
}
