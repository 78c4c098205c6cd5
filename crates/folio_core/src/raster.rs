use crate::geometry::{PixelRect, Size};

const CHANNELS: usize = 4;

/// RGBA8 pixel buffer a page is rendered into.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct RasterSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl RasterSurface {
    /// Opaque white surface.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0xff; width as usize * height as usize * CHANNELS],
        }
    }

    /// Wraps row-major RGBA bytes; `None` when the length does not match.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize * CHANNELS {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * CHANNELS;
        let px = &self.pixels[at..at + CHANNELS];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Copies `rect` into a new surface of exactly that size.
    pub fn crop(&self, rect: PixelRect) -> Option<RasterSurface> {
        if rect.width == 0
            || rect.height == 0
            || rect.x.checked_add(rect.width)? > self.width
            || rect.y.checked_add(rect.height)? > self.height
        {
            return None;
        }
        let row_bytes = rect.width as usize * CHANNELS;
        let stride = self.width as usize * CHANNELS;
        let mut out = Vec::with_capacity(row_bytes * rect.height as usize);
        for row in rect.y..rect.y + rect.height {
            let start = row as usize * stride + rect.x as usize * CHANNELS;
            out.extend_from_slice(&self.pixels[start..start + row_bytes]);
        }
        Some(RasterSurface {
            width: rect.width,
            height: rect.height,
            pixels: out,
        })
    }
}
