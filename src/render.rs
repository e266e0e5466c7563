// The render stage seam. Two implementations:
// - gpu::GpuRenderer: wgpu pipeline running shaders/particles.wgsl offscreen
// - software::SoftwareRenderer: the same math on the CPU (no adapter needed)

use crate::camera::PerspectiveCamera;
use crate::error::Error;
use crate::particles::ParticleField;
use crate::trail::TrailRaster;
use crate::types::FrameBuffer;

/// #181818: the dark grey behind the particles.
pub const CLEAR_COLOR: u32 = 0x00_18_18_18;

pub trait ParticleRenderer {
    fn name(&self) -> &'static str;

    /// Draw one frame of the field into `out` (already sized to the device resolution).
    /// Must upload the trail raster if, and only if, its texture is flagged dirty,
    /// and clear the flag when it does.
    fn render(
        &mut self,
        camera: &PerspectiveCamera,
        field: &ParticleField,
        trail: &mut TrailRaster,
        out: &mut FrameBuffer,
    ) -> Result<(), Error>;
}
