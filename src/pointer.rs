// Pointer tracking: window pixel coordinates -> normalized device coordinates.
// Visual: nothing by itself; the projection step turns this into the glowing
// spot on the trail raster.

use glam::Vec2;

/// Where the cursor points, in normalized device coordinates.
/// x grows to the right, y grows upward; the visible area is roughly [-1, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerState {
    pub ndc: Vec2,
}

impl PointerState {
    /// Far outside the view so the first rays miss the plane.
    pub const SENTINEL: Vec2 = Vec2::new(9999.0, 9999.0);
}

impl Default for PointerState {
    fn default() -> Self {
        Self { ndc: Self::SENTINEL }
    }
}

impl PointerState {
    /// Record a pointer move at client pixel (x, y) in a `width` x `height` viewport.
    /// No clamping: positions outside the window land outside [-1, 1].
    pub fn on_move(&mut self, client_x: f32, client_y: f32, width: f32, height: f32) {
        self.ndc = Vec2::new(
            (client_x / width) * 2.0 - 1.0,
            -(client_y / height) * 2.0 + 1.0,
        );
    }
}
