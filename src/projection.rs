// Projection: pointer (NDC) -> ray -> hidden plane -> trail raster pixel.
// Visual: decides *where* on the picture the glow is painted.

use crate::camera::PerspectiveCamera;
use glam::{Vec2, Vec3, Vec4};

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3, // unit length
}

impl Ray {
    /// Ray from the camera through a point given in normalized device coordinates.
    pub fn from_camera(ndc: Vec2, camera: &PerspectiveCamera) -> Self {
        let inv = camera.view_projection().inverse();
        let p = inv * Vec4::new(ndc.x, ndc.y, 0.5, 1.0);
        let through = p.truncate() / p.w;
        Self {
            origin: camera.position,
            direction: (through - camera.position).normalize_or_zero(),
        }
    }
}

/// The invisible, double-sided square the particles sit on (XY plane, centred at the origin).
#[derive(Clone, Copy, Debug)]
pub struct InteractivePlane {
    pub width: f32,
    pub height: f32,
}

impl Default for InteractivePlane {
    fn default() -> Self {
        Self { width: 10.0, height: 10.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    pub distance: f32,
    pub point: Vec3,
    pub uv: Vec2, // u to the right, v upward, both in [0, 1]
}

impl InteractivePlane {
    /// Both faces count. Edge points are inside.
    pub fn intersect(&self, ray: &Ray) -> Option<Hit> {
        if ray.direction.z.abs() < 1e-8 {
            return None; // parallel to the plane
        }
        let t = -ray.origin.z / ray.direction.z;
        if t.is_nan() || t <= 0.0 {
            return None; // behind the camera
        }
        let point = ray.origin + ray.direction * t;
        let (hw, hh) = (self.width * 0.5, self.height * 0.5);
        if point.x.abs() > hw || point.y.abs() > hh {
            return None;
        }
        let uv = Vec2::new((point.x + hw) / self.width, (point.y + hh) / self.height);
        Some(Hit { distance: t, point, uv })
    }
}

/// Surface uv -> raster pixel.
///
/// Raster rows start at the top while `v` grows upward, so the vertical axis flips:
/// `x = u * width`, `y = (1 - v) * height`. The result is clamped into
/// `[0, width) x [0, height)` so a hit on the far edge still lands on a texel.
pub fn uv_to_raster(uv: Vec2, width: usize, height: usize) -> Vec2 {
    let (w, h) = (width as f32, height as f32);
    let below = |limit: f32| limit * (1.0 - f32::EPSILON);
    Vec2::new(
        (uv.x * w).clamp(0.0, below(w)),
        ((1.0 - uv.y) * h).clamp(0.0, below(h)),
    )
}

/// Casts the pointer ray against the plane once per frame.
pub struct Projector {
    pub plane: InteractivePlane,
}

impl Projector {
    pub fn new(plane: InteractivePlane) -> Self {
        Self { plane }
    }

    /// Raster position under the pointer, or None when the ray misses.
    /// On a miss the caller keeps the previous cursor: the trail stops, it does not jump.
    pub fn project(
        &self,
        ndc: Vec2,
        camera: &PerspectiveCamera,
        raster_width: usize,
        raster_height: usize,
    ) -> Option<Vec2> {
        let ray = Ray::from_camera(ndc, camera);
        self.plane
            .intersect(&ray)
            .map(|hit| uv_to_raster(hit.uv, raster_width, raster_height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::PointerState;

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-3
    }

    #[test]
    fn centre_of_screen_hits_centre_of_raster() {
        let cam = PerspectiveCamera::new(1.0);
        let p = Projector::new(InteractivePlane::default());
        let hit = p.project(Vec2::ZERO, &cam, 128, 128).expect("centre ray must hit");
        assert!(approx(hit, Vec2::new(64.0, 64.0)), "{hit:?}");
    }

    #[test]
    fn sentinel_pointer_misses() {
        let cam = PerspectiveCamera::new(1.0);
        let p = Projector::new(InteractivePlane::default());
        assert!(p.project(PointerState::SENTINEL, &cam, 128, 128).is_none());
    }

    #[test]
    fn upper_left_of_plane_is_top_left_of_raster() {
        // v grows upward, raster y grows downward.
        assert!(approx(uv_to_raster(Vec2::new(0.0, 1.0), 128, 128), Vec2::ZERO));
        assert!(approx(uv_to_raster(Vec2::new(0.25, 0.75), 128, 64), Vec2::new(32.0, 16.0)));
    }

    #[test]
    fn far_edges_stay_inside_raster() {
        let p = uv_to_raster(Vec2::new(1.0, 0.0), 128, 128);
        assert!(p.x < 128.0 && p.y < 128.0);
        assert!(p.x > 127.99 && p.y > 127.99);
    }

    #[test]
    fn pointer_above_centre_lands_in_upper_half() {
        let cam = PerspectiveCamera::new(1.0);
        let p = Projector::new(InteractivePlane::default());
        let hit = p.project(Vec2::new(0.0, 0.1), &cam, 128, 128).unwrap();
        assert!(hit.y < 64.0);
        assert!((hit.x - 64.0).abs() < 1e-3);
    }

    #[test]
    fn every_hit_is_within_raster_bounds() {
        let cam = PerspectiveCamera::new(4.0 / 3.0);
        let p = Projector::new(InteractivePlane::default());
        let mut hits = 0;
        for i in -20..=20 {
            for j in -20..=20 {
                let ndc = Vec2::new(i as f32 / 20.0, j as f32 / 20.0);
                if let Some(c) = p.project(ndc, &cam, 128, 96) {
                    hits += 1;
                    assert!(c.x >= 0.0 && c.x < 128.0, "{c:?}");
                    assert!(c.y >= 0.0 && c.y < 96.0, "{c:?}");
                }
            }
        }
        assert!(hits > 0);
    }

    #[test]
    fn back_face_hits_count() {
        let plane = InteractivePlane::default();
        let ray = Ray { origin: Vec3::new(1.0, 2.0, -5.0), direction: Vec3::Z };
        let hit = plane.intersect(&ray).expect("double-sided plane");
        assert!((hit.distance - 5.0).abs() < 1e-6);
        assert!(approx(hit.uv, Vec2::new(0.6, 0.7)));
    }

    #[test]
    fn parallel_ray_misses() {
        let plane = InteractivePlane::default();
        let ray = Ray { origin: Vec3::new(0.0, 0.0, 1.0), direction: Vec3::X };
        assert!(plane.intersect(&ray).is_none());
    }
}
