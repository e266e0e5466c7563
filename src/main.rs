// What you SEE:
// • The picture, rebuilt from thousands of glowing dots on a dark background.
// • Move the mouse over it: a soft trail follows the cursor and the dots under
//   it fly toward you, then settle back as the trail fades.
// • Drag with the left button to orbit, scroll to zoom.
// • D toggles a preview of the trail raster (top-left). ESC quits.

mod assets;
mod camera;
mod config;
mod draw;
mod error;
mod frame;
mod gpu;
mod particles;
mod pointer;
mod projection;
mod render;
mod software;
mod trail;
mod types;

use clap::Parser;
use config::Config;
use draw::Drawer;
use error::Error;
use frame::Session;
use glam::Vec2;
use gpu::GpuRenderer;
use particles::ParticleField;
use rand::rngs::StdRng;
use rand::SeedableRng;
use render::ParticleRenderer;
use software::SoftwareRenderer;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use trail::TrailRaster;
use types::{FrameBuffer, Sizes};

fn main() -> Result<(), Error> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=particle_reveal=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cfg = Config::parse();
    cfg.validate()?;

    /* --- Assets ---
       Visual: nothing yet; picture + glow brush decoded into RGBA buffers. */
    let picture = assets::load_rgba(&cfg.picture)?;
    let glow = assets::load_glow(cfg.glow.as_deref())?;

    /* --- Trail raster + particle field ---
       Visual: the raster starts black (no trail); the field is a flat grid of dots. */
    let sizes = Sizes::new(cfg.width, cfg.height, cfg.pixel_ratio);
    let trail = TrailRaster::new(cfg.raster_size, cfg.raster_size, &glow, cfg.trail_params());
    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let field = ParticleField::new(cfg.field_params(), sizes.resolution(), &mut rng);
    info!(particles = field.len(), raster = cfg.raster_size, brush = trail.brush_size(), "Particle field built");

    /* --- Renderer: GPU if we can, CPU otherwise --- */
    let renderer: Box<dyn ParticleRenderer> = if cfg.software {
        Box::new(SoftwareRenderer::new(picture))
    } else {
        match GpuRenderer::new(&picture, &field, &trail) {
            Ok(gpu) => Box::new(gpu),
            Err(e) => {
                warn!(error = %e, "GPU renderer unavailable, falling back to software");
                Box::new(SoftwareRenderer::new(picture))
            }
        }
    };

    let mut session = Session::new(sizes, trail, field, renderer);
    info!(renderer = session.renderer_name(), "Renderer ready");

    /* --- Window --- */
    let mut drawer = Drawer::new("Particle Reveal", cfg.width, cfg.height, cfg.fps)?;
    let (w, h) = sizes.device_size();
    let mut screen = FrameBuffer::new(w, h);

    /* --- FPS --- */
    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;

    let mut last_mouse: Option<(f32, f32)> = None;
    let mut last_size = (cfg.width, cfg.height);

    /* ------------------------------ Main loop ------------------------------ */
    while drawer.is_open() && !drawer.esc_pressed() {
        /* 1) Events: resize, pointer move, orbit input, toggles */
        let size = drawer.size();
        if size != last_size && size.0 > 0 && size.1 > 0 {
            session.resize(Sizes::new(size.0, size.1, cfg.pixel_ratio));
            last_size = size;
        }

        let mouse = drawer.mouse_pos();
        if mouse != last_mouse {
            if let Some((mx, my)) = mouse {
                session.pointer_moved(mx, my);
            }
            last_mouse = mouse;
        }
        session.orbit_input(
            mouse.map(|(x, y)| Vec2::new(x, y)),
            drawer.left_mouse_down(),
            drawer.scroll(),
        );

        if drawer.d_pressed_once() {
            session.toggle_raster_preview();
        }

        /* 2) One full tick: camera, projection, trail, render. */
        session.tick(&mut screen)?;

        /* 3) Present; the window paces us to the next frame. */
        drawer.present(&screen)?;

        /* 4) FPS counter (logged once per second) */
        frames_this_second += 1;
        let now = Instant::now();
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let secs = now.duration_since(last_fps_time).as_secs_f32();
            debug!(fps = frames_this_second as f32 / secs, "Frame rate");
            frames_this_second = 0;
            last_fps_time = now;
        }
    }

    Ok(())
}
