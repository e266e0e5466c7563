// CPU particle renderer, used when no GPU adapter is available (or --software).
// Visual: same picture-of-dots as the GPU path, drawn as additive discs.

use crate::camera::PerspectiveCamera;
use crate::error::Error;
use crate::particles::{displaced_position, fragment_color, point_size, texture_uv, ParticleField};
use crate::render::{ParticleRenderer, CLEAR_COLOR};
use crate::trail::TrailRaster;
use crate::types::{pack_rgb, unpack_rgb, FrameBuffer};
use glam::Vec4;
use image::RgbaImage;

pub struct SoftwareRenderer {
    picture: RgbaImage,
    accum: Vec<[f32; 3]>, // linear [0, 1] per channel, reused every frame
}

impl SoftwareRenderer {
    pub fn new(picture: RgbaImage) -> Self {
        Self { picture, accum: Vec::new() }
    }
}

/// Bilinear RGB in [0, 1] at texture coordinates (row 0 = top), clamped at the edges.
fn sample_rgb(img: &RgbaImage, tu: f32, tv: f32) -> [f32; 3] {
    let (w, h) = (img.width(), img.height());
    let x = (tu * w as f32 - 0.5).clamp(0.0, (w - 1) as f32);
    let y = (tv * h as f32 - 0.5).clamp(0.0, (h - 1) as f32);
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);
    let mut out = [0.0; 3];
    for (c, o) in out.iter_mut().enumerate() {
        let p = |xx, yy| img.get_pixel(xx, yy).0[c] as f32 / 255.0;
        let top = p(x0, y0) * (1.0 - fx) + p(x1, y0) * fx;
        let bottom = p(x0, y1) * (1.0 - fx) + p(x1, y1) * fx;
        *o = top * (1.0 - fy) + bottom * fy;
    }
    out
}

/// Add `color` to every pixel whose centre lies inside the disc (saturating later, on pack).
/// Visual: one round dot; overlapping dots brighten instead of hiding each other.
fn add_disc(accum: &mut [[f32; 3]], width: usize, height: usize, cx: f32, cy: f32, radius: f32, color: [f32; 3]) {
    if radius <= 0.0 { return; }
    let r2 = radius * radius;
    let x_min = (cx - radius).floor().max(0.0) as i64;
    let y_min = (cy - radius).floor().max(0.0) as i64;
    let x_max = ((cx + radius).ceil() as i64).min(width as i64 - 1);
    let y_max = ((cy + radius).ceil() as i64).min(height as i64 - 1);
    for y in y_min..=y_max {
        let dy = y as f32 + 0.5 - cy;
        for x in x_min..=x_max {
            let dx = x as f32 + 0.5 - cx;
            if dx * dx + dy * dy > r2 { continue; } // outside the sprite: discarded
            let px = &mut accum[y as usize * width + x as usize];
            for c in 0..3 {
                px[c] += color[c];
            }
        }
    }
}

impl ParticleRenderer for SoftwareRenderer {
    fn name(&self) -> &'static str {
        "software"
    }

    fn render(
        &mut self,
        camera: &PerspectiveCamera,
        field: &ParticleField,
        trail: &mut TrailRaster,
        out: &mut FrameBuffer,
    ) -> Result<(), Error> {
        // The raster is read in place; the "upload" is just consuming the flag.
        trail.texture.take_dirty();

        let (w, h) = (out.width, out.height);
        let (cr, cg, cb) = unpack_rgb(CLEAR_COLOR);
        let clear = [cr as f32 / 255.0, cg as f32 / 255.0, cb as f32 / 255.0];
        self.accum.clear();
        self.accum.resize(w * h, clear);

        let view = camera.view();
        let projection = camera.projection();
        let resolution = field.resolution();
        let params = field.params();
        // Pixels per NDC unit along y on the actual target, relative to the uniform.
        let target_scale = h as f32 / resolution[1].max(1.0);

        for v in field.vertices() {
            let tuv = texture_uv(v.uv);
            let trail_red = trail.sample_red(tuv.x, tuv.y);
            let world = displaced_position(v, trail_red, params.displacement_strength);
            let view_pos = view * world.extend(1.0);
            let clip: Vec4 = projection * view_pos;
            if clip.w <= 0.0 { continue; }
            let ndc = clip.truncate() / clip.w;
            if !(0.0..=1.0).contains(&ndc.z) { continue; }

            let picture = sample_rgb(&self.picture, tuv.x, tuv.y);
            let size = point_size(params.point_scale, picture[0], resolution[1], view_pos.z);
            let cx = (ndc.x * 0.5 + 0.5) * w as f32;
            let cy = (0.5 - ndc.y * 0.5) * h as f32;
            add_disc(&mut self.accum, w, h, cx, cy, size * 0.5 * target_scale, fragment_color(picture));
        }

        for (dst, src) in out.pixels.iter_mut().zip(&self.accum) {
            let q = |c: f32| (c * 255.0).round().clamp(0.0, 255.0) as u8;
            *dst = pack_rgb(q(src[0]), q(src[1]), q(src[2]));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::procedural_glow;
    use crate::particles::FieldParams;
    use crate::trail::{TrailCursor, TrailParams};
    use glam::Vec2;
    use image::Rgba;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scene(picture: Rgba<u8>) -> (SoftwareRenderer, PerspectiveCamera, ParticleField, TrailRaster, FrameBuffer) {
        let renderer = SoftwareRenderer::new(RgbaImage::from_pixel(8, 8, picture));
        let camera = PerspectiveCamera::new(1.0);
        let params = FieldParams { segments: 32, ..Default::default() };
        let field = ParticleField::new(params, [200.0, 200.0], &mut StdRng::seed_from_u64(1));
        let trail = TrailRaster::new(32, 32, &procedural_glow(16), TrailParams::default());
        (renderer, camera, field, trail, FrameBuffer::new(200, 200))
    }

    #[test]
    fn black_picture_renders_only_background() {
        let (mut r, cam, field, mut trail, mut fb) = scene(Rgba([0, 0, 0, 255]));
        r.render(&cam, &field, &mut trail, &mut fb).unwrap();
        assert!(fb.pixels.iter().all(|&p| p == CLEAR_COLOR));
    }

    #[test]
    fn white_picture_brightens_the_centre() {
        let (mut r, cam, field, mut trail, mut fb) = scene(Rgba([255, 255, 255, 255]));
        r.render(&cam, &field, &mut trail, &mut fb).unwrap();
        let centre = fb.pixels[100 * 200 + 100];
        assert_ne!(centre, CLEAR_COLOR);
        // Corners are outside the 10x10 field.
        assert_eq!(fb.pixels[0], CLEAR_COLOR);
    }

    #[test]
    fn render_consumes_the_dirty_flag() {
        let (mut r, cam, field, mut trail, mut fb) = scene(Rgba([255, 255, 255, 255]));
        trail.update(&mut TrailCursor::default());
        assert!(trail.texture.is_dirty());
        r.render(&cam, &field, &mut trail, &mut fb).unwrap();
        assert!(!trail.texture.is_dirty());
    }

    #[test]
    fn bright_trail_moves_points() {
        let (mut r, cam, field, mut trail, mut fb) = scene(Rgba([255, 255, 255, 255]));
        r.render(&cam, &field, &mut trail, &mut fb).unwrap();
        let still = fb.pixels.clone();
        trail.stamp(Vec2::new(16.0, 16.0), 1.0);
        r.render(&cam, &field, &mut trail, &mut fb).unwrap();
        assert_ne!(still, fb.pixels);
    }

    #[test]
    fn disc_stays_inside_buffer() {
        let mut accum = vec![[0.0; 3]; 16];
        add_disc(&mut accum, 4, 4, 0.0, 0.0, 3.0, [0.5, 0.5, 0.5]);
        add_disc(&mut accum, 4, 4, 100.0, 100.0, 3.0, [0.5, 0.5, 0.5]);
        assert_eq!(accum[0], [0.5, 0.5, 0.5]);
        assert_eq!(accum[15], [0.0, 0.0, 0.0]);
    }
}
