// Window + input polling + a software preview of the trail raster.
// Visual effects provided here:
// 1) A resizable window that shows the rendered particle frame.
// 2) Mouse position / buttons / wheel, read once per frame.
// 3) An optional top-left preview of the trail raster (toggle with D).

use crate::error::Error;
use crate::trail::TrailRaster;
use crate::types::{pack_rgb, FrameBuffer};
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, ScaleMode, Window, WindowOptions};

pub struct Drawer {
    window: Window, // the on-screen window you see
}

impl Drawer {
    /// Create a resizable window; the frame buffer is stretched to fill it.
    /// Visual: a new empty window appears with your chosen title.
    pub fn new(title: &str, width: usize, height: usize, fps: usize) -> Result<Self, Error> {
        let options = WindowOptions {
            resize: true,
            scale_mode: ScaleMode::Stretch,
            ..WindowOptions::default()
        };
        let mut window = Window::new(title, width, height, options)
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        // Paces the loop to the display, like a refresh callback would.
        window.set_target_fps(fps);
        Ok(Self { window })
    }

    /// Push the pixels for this frame to the screen.
    /// Visual: the window immediately displays the new image.
    pub fn present(&mut self, framebuffer: &FrameBuffer) -> Result<(), Error> {
        self.window
            .update_with_buffer(&framebuffer.pixels, framebuffer.width, framebuffer.height)
            .map_err(|e| Error::WindowUpdate(e.to_string()))?;
        Ok(())
    }

    /// Returns false when the user closes the window (so we can stop the loop).
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    /// True while ESC is held down (we'll exit when this is pressed).
    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }

    /// Current window size in logical pixels.
    pub fn size(&self) -> (usize, usize) {
        self.window.get_size()
    }

    /// Mouse position in window pixels, *not* clamped: leaving the window keeps reporting.
    pub fn mouse_pos(&self) -> Option<(f32, f32)> {
        self.window.get_mouse_pos(MouseMode::Pass)
    }

    /// Visual: while held, dragging swings the camera around the picture.
    pub fn left_mouse_down(&self) -> bool {
        self.window.get_mouse_down(MouseButton::Left)
    }

    /// Vertical wheel movement since last frame (positive = away from the user).
    pub fn scroll(&self) -> f32 {
        self.window.get_scroll_wheel().map(|(_, y)| y).unwrap_or(0.0)
    }

    // we flip a boolean in main to show/hide the raster preview.
    pub fn d_pressed_once(&self) -> bool {
        self.window.is_key_pressed(Key::D, KeyRepeat::No)
    }
}

/* ---------- Software drawing: raster preview ---------- */

/// Copy the trail raster into the top-left corner, scaled to `side` x `side` (nearest).
/// Visual: a small black square with the glowing cursor trail on it.
pub fn draw_raster_preview(fb: &mut FrameBuffer, raster: &TrailRaster, side: usize) {
    let side = side.min(fb.width).min(fb.height);
    if side == 0 { return; }
    for y in 0..side {
        let ry = y * raster.height() / side;
        for x in 0..side {
            let rx = x * raster.width() / side;
            let t = raster.texel(rx, ry);
            let q = |c: f32| c.round().clamp(0.0, 255.0) as u8;
            fb.pixels[y * fb.width + x] = pack_rgb(q(t[0]), q(t[1]), q(t[2]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::procedural_glow;
    use crate::trail::TrailParams;
    use glam::Vec2;

    #[test]
    fn preview_covers_only_the_corner() {
        let mut raster = TrailRaster::new(16, 16, &procedural_glow(8), TrailParams::default());
        raster.stamp(Vec2::new(0.0, 0.0), 1.0);
        let mut fb = FrameBuffer::new(64, 64);
        fb.fill(0x00_12_34_56);
        draw_raster_preview(&mut fb, &raster, 32);
        assert_ne!(fb.pixels[0], 0x00_12_34_56);
        assert_eq!(fb.pixels[31], 0); // black raster texel
        assert_eq!(fb.pixels[32], 0x00_12_34_56);
        assert_eq!(fb.pixels[32 * 64], 0x00_12_34_56);
    }

    #[test]
    fn preview_shrinks_to_fit_small_frames() {
        let raster = TrailRaster::new(16, 16, &procedural_glow(8), TrailParams::default());
        let mut fb = FrameBuffer::new(10, 6);
        fb.fill(0x00_FF_FF_FF);
        draw_raster_preview(&mut fb, &raster, 256);
        assert_eq!(fb.pixels[5 * 10 + 5], 0);
        assert_eq!(fb.pixels[5 * 10 + 6], 0x00_FF_FF_FF);
    }
}
