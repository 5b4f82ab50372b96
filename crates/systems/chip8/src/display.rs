//! 64x32 monochrome framebuffer with XOR sprite compositing

use emu_core::types::{Frame, PIXEL_OFF, PIXEL_ON};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;

/// Sprites are always one byte (8 pixels) wide.
const SPRITE_WIDTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("framebuffer snapshot has {0} cells, expected 2048")]
pub struct FrameSizeError(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<bool>", into = "Vec<bool>")]
pub struct Framebuffer {
    pixels: Vec<bool>,
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framebuffer {
    pub fn new() -> Self {
        Self {
            pixels: vec![false; WIDTH * HEIGHT],
        }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(false);
    }

    /// XOR `sprite` onto the screen with its top-left corner at (x, y).
    ///
    /// The origin is reduced modulo the screen size and every pixel wraps
    /// independently, so a sprite straddling an edge continues on the
    /// opposite side. Returns true if any lit pixel was turned off.
    pub fn draw(&mut self, x: u8, y: u8, sprite: &[u8]) -> bool {
        let ox = x as usize % WIDTH;
        let oy = y as usize % HEIGHT;
        let mut collision = false;

        for (row, &bits) in sprite.iter().enumerate() {
            let py = (oy + row) % HEIGHT;
            for col in 0..SPRITE_WIDTH {
                if bits & (0x80 >> col) == 0 {
                    continue;
                }
                let px = (ox + col) % WIDTH;
                let cell = &mut self.pixels[py * WIDTH + px];
                collision |= *cell;
                *cell ^= true;
            }
        }

        collision
    }

    /// Pixel at (x, y), with the same wraparound as `draw`.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.pixels[(y % HEIGHT) * WIDTH + (x % WIDTH)]
    }

    /// Row-major snapshot, `WIDTH * HEIGHT` cells.
    pub fn pixels(&self) -> &[bool] {
        &self.pixels
    }

    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|&&p| p).count()
    }

    pub fn to_frame(&self) -> Frame {
        let mut frame = Frame::new(WIDTH as u32, HEIGHT as u32);
        for (dst, &lit) in frame.pixels.iter_mut().zip(&self.pixels) {
            *dst = if lit { PIXEL_ON } else { PIXEL_OFF };
        }
        frame
    }
}

impl TryFrom<Vec<bool>> for Framebuffer {
    type Error = FrameSizeError;

    fn try_from(pixels: Vec<bool>) -> Result<Self, Self::Error> {
        if pixels.len() != WIDTH * HEIGHT {
            return Err(FrameSizeError(pixels.len()));
        }
        Ok(Self { pixels })
    }
}

impl From<Framebuffer> for Vec<bool> {
    fn from(fb: Framebuffer) -> Self {
        fb.pixels
    }
}
