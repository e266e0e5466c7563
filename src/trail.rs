// Trail raster: the small offscreen image that remembers where the cursor went.
// Visual: a soft bright smear follows the cursor over the picture and slowly
// fades back to black; the particle shader pushes points away wherever it's bright.

use glam::Vec2;
use image::{imageops, RgbaImage};

/// Tunables for the per-frame trail update (reference values in `Default`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrailParams {
    pub gain: f32,       // alpha per raster pixel of cursor travel
    pub fade_alpha: f32, // opacity of the background fill painted every frame
    pub glow_scale: f32, // glow sprite size as a fraction of raster width
}

impl Default for TrailParams {
    fn default() -> Self {
        Self { gain: 0.1, fade_alpha: 0.02, glow_scale: 0.25 }
    }
}

/// Stamp opacity for a cursor that travelled `distance` raster pixels this frame.
/// Grows linearly with speed and saturates at 1 once `distance >= 1 / gain`.
#[inline]
pub fn stamp_alpha(distance: f32, gain: f32) -> f32 {
    (distance * gain).clamp(0.0, 1.0)
}

/// Cursor position in raster pixels, plus where it was last frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrailCursor {
    pub current: Vec2,
    pub previous: Vec2,
}

impl Default for TrailCursor {
    fn default() -> Self {
        let far = Vec2::new(9999.0, 9999.0);
        Self { current: far, previous: far }
    }
}

impl TrailCursor {
    /// Distance travelled since the last call; the current position becomes "previous".
    pub fn advance(&mut self) -> f32 {
        let distance = self.previous.distance(self.current);
        self.previous = self.current;
        distance
    }
}

/// Upload flag for the GPU copy of the raster.
/// There is no change detection: whoever mutates the raster must call `invalidate()`.
#[derive(Debug, Default)]
pub struct TrailTexture {
    dirty: bool,
}

impl TrailTexture {
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Check-and-clear, called by the render stage right before uploading.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

pub struct TrailRaster {
    width: usize,
    height: usize,
    texels: Vec<[f32; 3]>, // RGB in [0, 255]; f32 so the fade never stalls on rounding
    background: [f32; 3],
    brush: RgbaImage,      // glow sprite pre-scaled to the stamp size
    params: TrailParams,
    pub texture: TrailTexture,
}

impl TrailRaster {
    pub const BACKGROUND: [f32; 3] = [0.0, 0.0, 0.0];
    /// Texels this close to the background are snapped onto it.
    const FADE_SNAP: f32 = 1e-3;

    /// Allocate the raster once, filled with the background, and schedule the first upload.
    pub fn new(width: usize, height: usize, glow: &RgbaImage, params: TrailParams) -> Self {
        let side = ((width as f32 * params.glow_scale).round() as u32).max(1);
        let brush = imageops::resize(glow, side, side, imageops::FilterType::Triangle);
        let mut texture = TrailTexture::default();
        texture.invalidate();
        Self {
            width,
            height,
            texels: vec![Self::BACKGROUND; width * height],
            background: Self::BACKGROUND,
            brush,
            params,
            texture,
        }
    }

    pub fn width(&self) -> usize { self.width }
    pub fn height(&self) -> usize { self.height }
    pub fn brush_size(&self) -> u32 { self.brush.width() }

    pub fn texel(&self, x: usize, y: usize) -> [f32; 3] {
        self.texels[y * self.width + x]
    }

    /// One frame of the trail, in fixed order:
    /// speed -> alpha, remember cursor, fade everything, stamp the glow, invalidate.
    /// Returns the alpha the glow was stamped with.
    pub fn update(&mut self, cursor: &mut TrailCursor) -> f32 {
        let alpha = stamp_alpha(cursor.advance(), self.params.gain);
        self.fade();
        self.stamp(cursor.current, alpha);
        self.texture.invalidate();
        alpha
    }

    /// Paint the background over everything at `fade_alpha` ("source-over").
    /// Visual: every bright texel loses a little each frame (exponential decay),
    /// then lands exactly on the background instead of creeping into subnormals.
    pub fn fade(&mut self) {
        let a = self.params.fade_alpha;
        let bg = self.background;
        for t in &mut self.texels {
            for c in 0..3 {
                t[c] += (bg[c] - t[c]) * a;
                if (t[c] - bg[c]).abs() < Self::FADE_SNAP {
                    t[c] = bg[c];
                }
            }
        }
    }

    /// Draw the glow brush centred on `center` with "keep the lighter" blending.
    /// Texels outside the raster are skipped; alpha 0 is a no-op.
    pub fn stamp(&mut self, center: Vec2, alpha: f32) {
        if alpha <= 0.0 { return; }
        let side = self.brush.width() as i64;
        let left = (center.x - side as f32 * 0.5).round() as i64;
        let top = (center.y - side as f32 * 0.5).round() as i64;
        let (w, h) = (self.width as i64, self.height as i64);

        // Whole brush off-raster (e.g. the far-away starting cursor): nothing to do.
        if left >= w || top >= h || left + side <= 0 || top + side <= 0 { return; }

        for by in 0..side {
            let y = top + by;
            if y < 0 || y >= h { continue; }
            for bx in 0..side {
                let x = left + bx;
                if x < 0 || x >= w { continue; }
                let src = self.brush.get_pixel(bx as u32, by as u32).0;
                let a = (src[3] as f32 / 255.0) * alpha;
                if a <= 0.0 { continue; }
                let t = &mut self.texels[(y * w + x) as usize];
                for c in 0..3 {
                    let lighter = t[c].max(src[c] as f32);
                    t[c] = t[c] * (1.0 - a) + lighter * a;
                }
            }
        }
    }

    /// Sum of all channels: a cheap brightness measure.
    pub fn luminance(&self) -> f64 {
        self.texels.iter().map(|t| (t[0] + t[1] + t[2]) as f64).sum()
    }

    /// Red channel in [0, 1] at texture coordinates (row 0 = top), bilinear.
    pub fn sample_red(&self, tu: f32, tv: f32) -> f32 {
        let x = (tu * self.width as f32 - 0.5).clamp(0.0, (self.width - 1) as f32);
        let y = (tv * self.height as f32 - 0.5).clamp(0.0, (self.height - 1) as f32);
        let (x0, y0) = (x.floor() as usize, y.floor() as usize);
        let (x1, y1) = ((x0 + 1).min(self.width - 1), (y0 + 1).min(self.height - 1));
        let (fx, fy) = (x - x0 as f32, y - y0 as f32);
        let r = |xx: usize, yy: usize| self.texels[yy * self.width + xx][0];
        let top = r(x0, y0) * (1.0 - fx) + r(x1, y0) * fx;
        let bottom = r(x0, y1) * (1.0 - fx) + r(x1, y1) * fx;
        (top * (1.0 - fy) + bottom * fy) / 255.0
    }

    /// Quantize into tightly packed RGBA8 rows for upload. `out` is reused across frames.
    pub fn write_rgba8(&self, out: &mut Vec<u8>) {
        out.clear();
        out.reserve(self.texels.len() * 4);
        for t in &self.texels {
            out.extend_from_slice(&[
                t[0].round().clamp(0.0, 255.0) as u8,
                t[1].round().clamp(0.0, 255.0) as u8,
                t[2].round().clamp(0.0, 255.0) as u8,
                255,
            ]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::procedural_glow;

    fn raster() -> TrailRaster {
        TrailRaster::new(128, 128, &procedural_glow(64), TrailParams::default())
    }

    #[test]
    fn alpha_grows_with_distance_and_saturates() {
        let k = 0.1;
        let mut last = 0.0;
        for i in 0..200 {
            let a = stamp_alpha(i as f32 * 0.1, k);
            assert!(a >= last);
            last = a;
        }
        assert_eq!(stamp_alpha(1.0 / k, k), 1.0);
        assert_eq!(stamp_alpha(50.0, k), 1.0);
        assert_eq!(stamp_alpha(0.0, k), 0.0);
    }

    #[test]
    fn diagonal_swipe_saturates() {
        let mut cursor = TrailCursor { current: Vec2::new(64.0, 64.0), previous: Vec2::ZERO };
        let d = cursor.advance();
        assert!((d - 90.51).abs() < 0.01);
        assert_eq!(stamp_alpha(d, 0.1), 1.0);
        assert_eq!(cursor.previous, Vec2::new(64.0, 64.0));
    }

    #[test]
    fn stationary_cursor_only_fades() {
        let mut r = raster();
        let mut cursor = TrailCursor::default();
        cursor.current = Vec2::new(10.0, 10.0);

        // First tick jumps from the far-away start: full-strength stamp.
        assert_eq!(r.update(&mut cursor), 1.0);
        let mut lum = r.luminance();
        let mut spot = r.texel(10, 10)[0];
        assert!(spot > 0.0);

        for _ in 0..49 {
            assert_eq!(r.update(&mut cursor), 0.0);
            let now = r.luminance();
            assert!(now < lum, "luminance must strictly drop");
            assert!(r.texel(10, 10)[0] < spot);
            lum = now;
            spot = r.texel(10, 10)[0];
        }
    }

    #[test]
    fn fade_approaches_background() {
        let mut r = raster();
        r.stamp(Vec2::new(64.0, 64.0), 1.0);
        for _ in 0..2000 {
            r.fade();
        }
        assert!(r.texel(64, 64)[0] < 0.01);
    }

    #[test]
    fn long_fade_decreases_until_exactly_background() {
        let mut r = raster();
        let mut cursor = TrailCursor::default();
        cursor.current = Vec2::new(64.0, 64.0);
        r.update(&mut cursor);

        let mut lum = r.luminance();
        let mut frames = 0;
        while lum > 0.0 {
            assert_eq!(r.update(&mut cursor), 0.0);
            let now = r.luminance();
            assert!(now < lum, "stalled at frame {frames} with luminance {lum}");
            lum = now;
            frames += 1;
            assert!(frames < 2000);
        }
        assert_eq!(r.texel(64, 64), TrailRaster::BACKGROUND);
    }

    #[test]
    fn lighten_never_darkens() {
        let mut r = raster();
        r.stamp(Vec2::new(64.0, 64.0), 1.0);
        let before = r.texel(64, 64);
        // Weak stamp over a bright texel.
        r.stamp(Vec2::new(64.0, 64.0), 0.1);
        let after = r.texel(64, 64);
        assert!(after[0] >= before[0]);
    }

    #[test]
    fn far_away_cursor_is_a_no_op() {
        let mut r = raster();
        let mut cursor = TrailCursor::default();
        cursor.current = Vec2::new(9999.0, 0.0);
        r.update(&mut cursor);
        assert_eq!(r.luminance(), 0.0);
    }

    #[test]
    fn update_invalidates_and_render_clears() {
        let mut r = raster();
        assert!(r.texture.take_dirty(), "first upload is pending");
        assert!(!r.texture.is_dirty());
        r.update(&mut TrailCursor::default());
        assert!(r.texture.is_dirty());
        assert!(r.texture.take_dirty());
        assert!(!r.texture.take_dirty());
    }

    #[test]
    fn buffer_is_never_reallocated() {
        let mut r = raster();
        let ptr = r.texels.as_ptr();
        let mut cursor = TrailCursor::default();
        for i in 0..20 {
            cursor.current = Vec2::new(i as f32 * 5.0, 64.0);
            r.update(&mut cursor);
        }
        assert_eq!(ptr, r.texels.as_ptr());
        assert_eq!(r.texels.len(), 128 * 128);
    }

    #[test]
    fn brush_is_a_quarter_of_the_raster() {
        assert_eq!(raster().brush_size(), 32);
    }

    #[test]
    fn upload_bytes_are_rgba8() {
        let mut r = raster();
        r.stamp(Vec2::new(0.0, 0.0), 1.0);
        let mut bytes = Vec::new();
        r.write_rgba8(&mut bytes);
        assert_eq!(bytes.len(), 128 * 128 * 4);
        assert!(bytes.chunks(4).all(|px| px[3] == 255));
        assert_eq!(bytes[0], r.texel(0, 0)[0].round() as u8);
    }

    #[test]
    fn sample_red_reads_top_rows_first() {
        let mut r = raster();
        r.stamp(Vec2::new(64.0, 4.0), 1.0);
        assert!(r.sample_red(0.5, 0.03) > r.sample_red(0.5, 0.97));
    }
}
