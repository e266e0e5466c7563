// Perspective camera plus orbit controls with damping.
// Visual: drag with the left mouse button to swing around the picture,
// scroll to move closer/further. Motion eases out instead of stopping dead.

use glam::{Mat4, Vec2, Vec3};
use std::f32::consts::{PI, TAU};

pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_y: f32, // radians
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    /// 35° lens, 18 units in front of the field, looking at its centre.
    pub fn new(aspect: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 18.0),
            target: Vec3::ZERO,
            fov_y: 35f32.to_radians(),
            aspect,
            near: 0.1,
            far: 100.0,
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    /// Depth maps to [0, 1] as wgpu expects.
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

/// Orbit around `camera.target` using spherical coordinates.
pub struct OrbitControls {
    pub damping: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    delta_theta: f32, // pending azimuth change
    delta_phi: f32,   // pending polar change
    scale: f32,       // pending distance multiplier
    drag_from: Option<Vec2>,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            damping: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 1.0,
            max_distance: 90.0,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            drag_from: None,
        }
    }
}

impl OrbitControls {
    const POLE_EPS: f32 = 1e-4;

    /// Feed the current drag state once per frame. `viewport_height` is logical pixels.
    pub fn drag(&mut self, pos: Option<Vec2>, pressed: bool, viewport_height: f32) {
        if !pressed {
            self.drag_from = None;
            return;
        }
        let Some(pos) = pos else { return };
        if let Some(from) = self.drag_from {
            let d = pos - from;
            let h = viewport_height.max(1.0);
            self.delta_theta -= TAU * d.x / h * self.rotate_speed;
            self.delta_phi -= TAU * d.y / h * self.rotate_speed;
        }
        self.drag_from = Some(pos);
    }

    /// Positive `steps` (wheel up) moves closer.
    pub fn zoom(&mut self, steps: f32) {
        if steps == 0.0 { return; }
        self.scale *= 0.95f32.powf(self.zoom_speed * steps.abs()).powf(steps.signum());
    }

    /// Apply a damped slice of the pending motion. Returns true when the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.position - camera.target;
        let radius = offset.length();
        if radius == 0.0 { return false; }

        // Spherical angles with +Y as the polar axis.
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        theta += self.delta_theta * self.damping;
        phi = (phi + self.delta_phi * self.damping).clamp(Self::POLE_EPS, PI - Self::POLE_EPS);

        // Zoom eases the same way rotation does.
        let step_scale = 1.0 + (self.scale - 1.0) * self.damping;
        let radius_new = (radius * step_scale).clamp(self.min_distance, self.max_distance);

        self.delta_theta *= 1.0 - self.damping;
        self.delta_phi *= 1.0 - self.damping;
        self.scale = 1.0 + (self.scale - 1.0) * (1.0 - self.damping);

        let new_offset = Vec3::new(
            radius_new * phi.sin() * theta.sin(),
            radius_new * phi.cos(),
            radius_new * phi.sin() * theta.cos(),
        );
        let moved = (new_offset - offset).length_squared() > 1e-12;
        camera.position = camera.target + new_offset;
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_controls_leave_camera_in_place() {
        let mut cam = PerspectiveCamera::new(1.0);
        let mut controls = OrbitControls::default();
        for _ in 0..10 {
            controls.update(&mut cam);
        }
        assert!((cam.position - Vec3::new(0.0, 0.0, 18.0)).length() < 1e-3);
    }

    #[test]
    fn drag_rotates_and_eases_out() {
        let mut cam = PerspectiveCamera::new(1.0);
        let mut controls = OrbitControls::default();
        controls.drag(Some(Vec2::new(100.0, 100.0)), true, 600.0);
        controls.drag(Some(Vec2::new(160.0, 100.0)), true, 600.0);
        controls.drag(None, false, 600.0);

        let start = cam.position;
        assert!(controls.update(&mut cam));
        let first_step = (cam.position - start).length();
        let mid = cam.position;
        controls.update(&mut cam);
        let second_step = (cam.position - mid).length();

        assert!(first_step > 0.0);
        assert!(second_step < first_step, "damping should shrink each step");
        // Orbiting keeps the distance to the target.
        assert!((cam.position.length() - 18.0).abs() < 1e-3);
    }

    #[test]
    fn zoom_in_moves_closer() {
        let mut cam = PerspectiveCamera::new(1.0);
        let mut controls = OrbitControls::default();
        controls.zoom(3.0);
        for _ in 0..30 {
            controls.update(&mut cam);
        }
        assert!(cam.position.length() < 18.0);
    }

    #[test]
    fn view_projection_maps_target_to_centre() {
        let cam = PerspectiveCamera::new(16.0 / 9.0);
        let clip = cam.view_projection() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
