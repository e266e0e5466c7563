// Command-line configuration. Every tunable has the reference value as its default.

use crate::error::Error;
use crate::particles::FieldParams;
use crate::trail::TrailParams;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "particle-reveal")]
#[command(about = "Reveal a picture as particles pushed around by a glowing cursor trail")]
#[command(version)]
pub struct Config {
    /// Picture the particles take their colour and size from
    #[arg(short, long, default_value = "static/picture-1.png")]
    pub picture: PathBuf,

    /// Glow sprite used as the trail brush (a soft radial glow is generated if omitted)
    #[arg(short, long)]
    pub glow: Option<PathBuf>,

    /// Initial window width in logical pixels
    #[arg(long, default_value_t = 1024)]
    pub width: usize,

    /// Initial window height in logical pixels
    #[arg(long, default_value_t = 768)]
    pub height: usize,

    /// Device pixel density (capped at 2)
    #[arg(long, default_value_t = 1.0)]
    pub pixel_ratio: f32,

    /// Side of the square trail raster in pixels
    #[arg(long, default_value_t = 128)]
    pub raster_size: usize,

    /// Grid cells per side of the particle field
    #[arg(long, default_value_t = 128)]
    pub segments: u32,

    /// Stamp alpha per raster pixel of cursor travel
    #[arg(long, default_value_t = 0.1)]
    pub gain: f32,

    /// Opacity of the per-frame fade toward the background
    #[arg(long, default_value_t = 0.02)]
    pub fade: f32,

    /// Glow size as a fraction of the raster width
    #[arg(long, default_value_t = 0.25)]
    pub glow_scale: f32,

    /// Seed for the per-particle random attributes (random if omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Skip the GPU and draw particles on the CPU
    #[arg(long)]
    pub software: bool,

    /// Frame rate the window loop is paced to
    #[arg(long, default_value_t = 60)]
    pub fps: usize,
}

impl Config {
    /// Reject values that would make the effect degenerate.
    pub fn validate(&self) -> Result<(), Error> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config("window size must be non-zero".into()));
        }
        if self.raster_size == 0 {
            return Err(Error::Config("raster size must be non-zero".into()));
        }
        if self.segments == 0 {
            return Err(Error::Config("segments must be non-zero".into()));
        }
        if self.fps == 0 {
            return Err(Error::Config("fps must be non-zero".into()));
        }
        let positive = [
            ("pixel-ratio", self.pixel_ratio),
            ("gain", self.gain),
            ("glow-scale", self.glow_scale),
        ];
        for (name, v) in positive {
            if !v.is_finite() || v <= 0.0 {
                return Err(Error::Config(format!("{name} must be a positive number, got {v}")));
            }
        }
        if !self.fade.is_finite() || !(0.0..=1.0).contains(&self.fade) {
            return Err(Error::Config(format!("fade must be within [0, 1], got {}", self.fade)));
        }
        Ok(())
    }

    pub fn trail_params(&self) -> TrailParams {
        TrailParams { gain: self.gain, fade_alpha: self.fade, glow_scale: self.glow_scale }
    }

    pub fn field_params(&self) -> FieldParams {
        FieldParams { segments: self.segments, ..FieldParams::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let cfg = Config::parse_from(["particle-reveal"]);
        cfg.validate().unwrap();
        assert_eq!(cfg.trail_params(), TrailParams::default());
        assert_eq!(cfg.field_params(), FieldParams::default());
        assert_eq!(cfg.raster_size, 128);
        assert!(cfg.glow.is_none());
        assert!(!cfg.software);
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = Config::parse_from([
            "particle-reveal", "--picture", "a.png", "--glow", "g.png", "--gain", "0.5", "--software",
        ]);
        assert_eq!(cfg.picture, PathBuf::from("a.png"));
        assert_eq!(cfg.glow, Some(PathBuf::from("g.png")));
        assert_eq!(cfg.trail_params().gain, 0.5);
        assert!(cfg.software);
    }

    #[test]
    fn rejects_zero_raster() {
        let cfg = Config::parse_from(["particle-reveal", "--raster-size", "0"]);
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_negative_gain_and_oversized_fade() {
        let cfg = Config::parse_from(["particle-reveal", "--gain=-1"]);
        assert!(cfg.validate().is_err());
        let cfg = Config::parse_from(["particle-reveal", "--fade", "1.5"]);
        assert!(cfg.validate().is_err());
    }
}
