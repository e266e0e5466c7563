// Frame driver: owns all mutable state of one running effect and advances it one tick at a time.
// Input handlers (pointer, resize) only write their own bits of state; `tick` reads them.

use crate::camera::{OrbitControls, PerspectiveCamera};
use crate::draw::draw_raster_preview;
use crate::error::Error;
use crate::particles::ParticleField;
use crate::pointer::PointerState;
use crate::projection::{InteractivePlane, Projector};
use crate::render::ParticleRenderer;
use crate::trail::{TrailCursor, TrailRaster};
use crate::types::{FrameBuffer, Sizes};
use glam::Vec2;
use tracing::{debug, info};

/// What one tick did, for logging and tests.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
    pub hit: bool,          // pointer ray met the plane this frame
    pub cursor: Vec2,       // raster cursor after projection
    pub stamp_alpha: f32,   // opacity the glow was stamped with
    pub camera_moved: bool,
}

pub struct Session {
    sizes: Sizes,
    pointer: PointerState,
    camera: PerspectiveCamera,
    controls: OrbitControls,
    projector: Projector,
    cursor: TrailCursor,
    trail: TrailRaster,
    field: ParticleField,
    renderer: Box<dyn ParticleRenderer>,
    show_raster: bool,
}

impl Session {
    pub fn new(
        sizes: Sizes,
        trail: TrailRaster,
        mut field: ParticleField,
        renderer: Box<dyn ParticleRenderer>,
    ) -> Self {
        field.set_resolution(sizes.resolution());
        Self {
            sizes,
            pointer: PointerState::default(),
            camera: PerspectiveCamera::new(sizes.aspect()),
            controls: OrbitControls::default(),
            projector: Projector::new(InteractivePlane::default()),
            cursor: TrailCursor::default(),
            trail,
            field,
            renderer,
            show_raster: false,
        }
    }

    pub fn renderer_name(&self) -> &'static str { self.renderer.name() }

    /// Raw pointer move in window pixels.
    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        self.pointer.on_move(x, y, self.sizes.width as f32, self.sizes.height as f32);
    }

    /// Camera drag/zoom input for this frame; applied (damped) on the next tick.
    pub fn orbit_input(&mut self, pos: Option<Vec2>, pressed: bool, scroll: f32) {
        self.controls.drag(pos, pressed, self.sizes.height as f32);
        self.controls.zoom(scroll);
    }

    /// Viewport change: new size, aspect and resolution uniform. Particle buffers stay as they are.
    pub fn resize(&mut self, sizes: Sizes) {
        self.sizes = sizes;
        self.camera.set_aspect(sizes.aspect());
        self.field.set_resolution(sizes.resolution());
        info!(width = sizes.width, height = sizes.height, pixel_ratio = sizes.pixel_ratio, "Viewport resized");
    }

    pub fn toggle_raster_preview(&mut self) -> bool {
        self.show_raster = !self.show_raster;
        debug!(visible = self.show_raster, "Raster preview toggled");
        self.show_raster
    }

    /// One frame, fixed order:
    /// 1) ease the camera 2) project the pointer 3) fade + stamp the trail (flags the texture)
    /// 4) render (uploads the trail if flagged) 5) optional raster preview.
    /// The caller presents `out` and comes back for the next tick.
    pub fn tick(&mut self, out: &mut FrameBuffer) -> Result<TickReport, Error> {
        let camera_moved = self.controls.update(&mut self.camera);

        let hit = self.projector.project(
            self.pointer.ndc,
            &self.camera,
            self.trail.width(),
            self.trail.height(),
        );
        if let Some(p) = hit {
            self.cursor.current = p;
        }

        let stamp_alpha = self.trail.update(&mut self.cursor);

        let (w, h) = self.sizes.device_size();
        out.resize(w, h);
        self.renderer.render(&self.camera, &self.field, &mut self.trail, out)?;

        if self.show_raster {
            let side = (256.0 * self.sizes.pixel_ratio) as usize;
            draw_raster_preview(out, &self.trail, side);
        }

        Ok(TickReport { hit: hit.is_some(), cursor: self.cursor.current, stamp_alpha, camera_moved })
    }
}

#[cfg(test)]
impl Session {
    fn trail(&self) -> &TrailRaster { &self.trail }
    fn field(&self) -> &ParticleField { &self.field }
    fn camera(&self) -> &PerspectiveCamera { &self.camera }
}
