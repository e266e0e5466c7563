// Startup assets: the picture the particles reveal and the glow brush.
// Both are decoded once with the `image` crate and kept as RGBA buffers.

use crate::error::Error;
use image::{Rgba, RgbaImage};
use std::path::Path;
use tracing::info;

/// Decode any format `image` understands into RGBA8.
pub fn load_rgba(path: &Path) -> Result<RgbaImage, Error> {
    let img = image::open(path).map_err(|e| Error::AssetLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let rgba = img.to_rgba8();
    info!(path = %path.display(), width = rgba.width(), height = rgba.height(), "Loaded image");
    Ok(rgba)
}

/// Glow sprite from disk, or a generated one when no file is given.
pub fn load_glow(path: Option<&Path>) -> Result<RgbaImage, Error> {
    match path {
        Some(p) => load_rgba(p),
        None => {
            info!("No glow sprite given, using a generated radial glow");
            Ok(procedural_glow(128))
        }
    }
}

/// White disc whose alpha follows a Gaussian: 1 in the centre, ~0 at the rim.
/// Visual: a soft round light, brightest in the middle.
pub fn procedural_glow(size: u32) -> RgbaImage {
    let size = size.max(1);
    let radius = size as f32 * 0.5;
    let sigma = radius * 0.4;
    let s2 = 2.0 * sigma * sigma;
    RgbaImage::from_fn(size, size, |x, y| {
        let dx = x as f32 + 0.5 - radius;
        let dy = y as f32 + 0.5 - radius;
        let r2 = dx * dx + dy * dy;
        let a = if r2 > radius * radius { 0.0 } else { (-r2 / s2).exp() };
        Rgba([255, 255, 255, (a * 255.0).round() as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glow_is_bright_in_the_middle_and_clear_at_corners() {
        let g = procedural_glow(64);
        assert!(g.get_pixel(32, 32).0[3] > 240);
        assert_eq!(g.get_pixel(0, 0).0[3], 0);
        assert!(g.get_pixel(32, 32).0[3] > g.get_pixel(48, 32).0[3]);
    }

    #[test]
    fn bundled_glow_decodes_with_alpha() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("static/glow.png");
        let g = load_glow(Some(&path)).unwrap();
        assert_eq!(g.dimensions(), (128, 128));
        assert!(g.get_pixel(64, 64).0[3] > 200);
        assert_eq!(g.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_rgba(Path::new("definitely/not/here.png")).unwrap_err();
        match err {
            Error::AssetLoad { path, .. } => assert!(path.contains("here.png")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
