// Particle field: a dense grid of points over the picture.
// Visual: each point takes its brightness from the picture; where the trail
// raster glows, points fly outward along their own random angle.
//
// The math below is the CPU twin of `shaders/particles.wgsl`. The GPU path runs
// the WGSL; the software renderer calls these functions. Keep them in step.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use rand::Rng;
use std::f32::consts::TAU;

/// Trail values below EDGE0 leave points alone, above EDGE1 push them fully.
pub const DISPLACEMENT_EDGE0: f32 = 0.1;
pub const DISPLACEMENT_EDGE1: f32 = 0.3;
/// Sideways share of the push; the rest goes toward the camera (+Z).
pub const DIRECTION_TILT: f32 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldParams {
    pub size: f32,     // plane side in world units
    pub segments: u32, // grid cells per side
    pub point_scale: f32,
    pub displacement_strength: f32,
}

impl Default for FieldParams {
    fn default() -> Self {
        Self { size: 10.0, segments: 128, point_scale: 0.15, displacement_strength: 3.0 }
    }
}

/// One point as the GPU sees it (instance-rate vertex buffer).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ParticleVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub intensity: f32, // [0, 1): how far this point travels when pushed
    pub angle: f32,     // [0, 2π): which way it goes
}

pub struct ParticleField {
    vertices: Vec<ParticleVertex>,
    params: FieldParams,
    resolution: [f32; 2],
}

impl ParticleField {
    /// Build the grid (row-major, top row first) and roll every point's attributes once.
    pub fn new(params: FieldParams, resolution: [f32; 2], rng: &mut impl Rng) -> Self {
        let seg = params.segments.max(1);
        let step = params.size / seg as f32;
        let half = params.size * 0.5;
        let mut vertices = Vec::with_capacity(((seg + 1) * (seg + 1)) as usize);
        for row in 0..=seg {
            let y = half - row as f32 * step;
            for col in 0..=seg {
                let x = col as f32 * step - half;
                vertices.push(ParticleVertex {
                    position: [x, y, 0.0],
                    uv: [col as f32 / seg as f32, 1.0 - row as f32 / seg as f32],
                    intensity: rng.gen_range(0.0..1.0),
                    angle: rng.gen_range(0.0..TAU),
                });
            }
        }
        Self { vertices, params, resolution }
    }

    pub fn vertices(&self) -> &[ParticleVertex] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn params(&self) -> &FieldParams {
        &self.params
    }

    /// Device-pixel resolution fed to the shader (point size and aspect).
    pub fn resolution(&self) -> [f32; 2] {
        self.resolution
    }

    pub fn set_resolution(&mut self, resolution: [f32; 2]) {
        self.resolution = resolution;
    }
}

#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Textures store the top row first, surface v grows upward.
#[inline]
pub fn texture_uv(uv: [f32; 2]) -> Vec2 {
    Vec2::new(uv[0], 1.0 - uv[1])
}

/// Vertex stage, position part: push the point along its angle by the trail strength.
pub fn displaced_position(v: &ParticleVertex, trail_red: f32, strength: f32) -> Vec3 {
    let push = smoothstep(DISPLACEMENT_EDGE0, DISPLACEMENT_EDGE1, trail_red);
    let dir = Vec3::new(v.angle.cos() * DIRECTION_TILT, v.angle.sin() * DIRECTION_TILT, 1.0).normalize();
    Vec3::from(v.position) + dir * push * strength * v.intensity
}

/// Vertex stage, size part: diameter in device pixels, shrinking with view depth.
#[inline]
pub fn point_size(point_scale: f32, picture_red: f32, resolution_y: f32, view_z: f32) -> f32 {
    if view_z >= 0.0 { return 0.0; } // behind the camera
    point_scale * picture_red * resolution_y / -view_z
}

/// Fragment stage: squared picture colour, so dark areas drop off faster.
#[inline]
pub fn fragment_color(picture_rgb: [f32; 3]) -> [f32; 3] {
    picture_rgb.map(|c| c * c)
}
