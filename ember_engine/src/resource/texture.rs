//! CPU-side texture data (tightly packed RGBA8)

use crate::error::{Error, Result};

/// Bytes per texel
pub const RGBA8_TEXEL_SIZE: usize = 4;

/// Decoded 2D image, row-major, top row first
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TextureData {
    /// Wrap decoded RGBA8 pixels, checking the buffer matches the dimensions
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidResource(format!(
                "texture has zero extent {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize * RGBA8_TEXEL_SIZE;
        if pixels.len() != expected {
            return Err(Error::InvalidResource(format!(
                "texture {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }

    /// Two-colour checkerboard with square cells of `cell` texels
    pub fn checkerboard(size: u32, cell: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let size = size.max(1);
        let cell = cell.max(1);
        let mut pixels = Vec::with_capacity(size as usize * size as usize * RGBA8_TEXEL_SIZE);
        for y in 0..size {
            for x in 0..size {
                let texel = if ((x / cell) + (y / cell)) % 2 == 0 { a } else { b };
                pixels.extend_from_slice(&texel);
            }
        }
        Self { width: size, height: size, pixels }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn byte_size(&self) -> u64 {
        self.pixels.len() as u64
    }

    pub fn texel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * RGBA8_TEXEL_SIZE;
        let mut texel = [0u8; 4];
        texel.copy_from_slice(&self.pixels[offset..offset + RGBA8_TEXEL_SIZE]);
        Some(texel)
    }
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
