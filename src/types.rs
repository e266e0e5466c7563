// Core types shared by the window, the renderers and the trail raster.

#[derive(Clone)]
pub struct FrameBuffer {
    pub width: usize,      // how wide the rendered frame is (device pixels)
    pub height: usize,     // how tall the rendered frame is (device pixels)
    pub pixels: Vec<u32>,  // each entry is 0x00RRGGBB for minifb
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0u32; width * height] }
    }

    /// Reallocate for a new size. Only called on resize, never per frame.
    pub fn resize(&mut self, width: usize, height: usize) {
        if self.width == width && self.height == height { return; }
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(width * height, 0);
    }

    pub fn fill(&mut self, color: u32) {
        self.pixels.fill(color);
    }
}

/// Window size in logical pixels plus device pixel density.
/// Visual: `device_size()` is how many pixels we actually render.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sizes {
    pub width: usize,
    pub height: usize,
    pub pixel_ratio: f32,
}

impl Sizes {
    /// Density is capped at 2 to keep fill-rate sane on very dense screens.
    pub const MAX_PIXEL_RATIO: f32 = 2.0;

    pub fn new(width: usize, height: usize, pixel_ratio: f32) -> Self {
        Self { width, height, pixel_ratio: pixel_ratio.min(Self::MAX_PIXEL_RATIO) }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Shader resolution uniform: (width * ratio, height * ratio).
    pub fn resolution(&self) -> [f32; 2] {
        [self.width as f32 * self.pixel_ratio, self.height as f32 * self.pixel_ratio]
    }

    /// Size of the rendered frame in whole pixels (never zero).
    pub fn device_size(&self) -> (usize, usize) {
        let [w, h] = self.resolution();
        ((w.round() as usize).max(1), (h.round() as usize).max(1))
    }
}

#[inline]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

#[inline]
pub fn unpack_rgb(px: u32) -> (u8, u8, u8) {
    (((px >> 16) & 0xFF) as u8, ((px >> 8) & 0xFF) as u8, (px & 0xFF) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_scales_by_pixel_ratio() {
        let s = Sizes::new(800, 600, 1.5);
        assert_eq!(s.resolution(), [1200.0, 900.0]);
        assert_eq!(s.device_size(), (1200, 900));
    }

    #[test]
    fn pixel_ratio_is_capped() {
        let s = Sizes::new(100, 100, 3.0);
        assert_eq!(s.pixel_ratio, 2.0);
        assert_eq!(s.resolution(), [200.0, 200.0]);
    }

    #[test]
    fn pack_round_trips_channels() {
        let px = pack_rgb(0x12, 0x34, 0x56);
        assert_eq!(px, 0x00_12_34_56);
        assert_eq!(unpack_rgb(px), (0x12, 0x34, 0x56));
    }

    #[test]
    fn resize_keeps_buffer_consistent() {
        let mut fb = FrameBuffer::new(4, 4);
        fb.resize(8, 2);
        assert_eq!(fb.pixels.len(), 16);
        assert_eq!((fb.width, fb.height), (8, 2));
    }
}
