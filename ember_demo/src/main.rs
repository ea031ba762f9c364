//! Ember demo - draws one textured model until the window is closed
//!
//! ```text
//! ember_demo [model.gltf|model.glb] [texture.png] [--vsync]
//! ```
//!
//! SPIR-V shaders are read from `$EMBER_SHADER_DIR` (default `ember_demo/shaders`),
//! compiled from the GLSL sources there with
//! `glslc model.vert -o model.vert.spv` and `glslc model.frag -o model.frag.spv`.

mod assets;
mod window;

use ember_engine::ember::render::{FrameLoop, WindowSystem};
use ember_engine::ember::RendererConfig;
use ember_engine::{engine_error, engine_info};
use ember_engine_renderer_vulkan::ember::{ModelRecorder, VulkanDevice};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::assets::AssetError;
use crate::window::DemoWindow;

const DEFAULT_SHADER_DIR: &str = "ember_demo/shaders";

#[derive(Error, Debug)]
enum DemoError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Engine(#[from] ember_engine::ember::Error),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("Failed to read shader '{path}': {source}")]
    Shader {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Window closed before it was created")]
    NoWindow,
}

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct Options {
    model: Option<PathBuf>,
    texture: Option<PathBuf>,
    vsync: bool,
}

impl Options {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, DemoError> {
        let mut options = Options::default();
        for arg in args {
            match arg.as_str() {
                "--vsync" => options.vsync = true,
                flag if flag.starts_with("--") => {
                    return Err(DemoError::Usage(format!(
                        "unknown option '{}'\nusage: ember_demo [model.gltf|.glb] [texture.png] [--vsync]",
                        flag
                    )));
                }
                path if options.model.is_none() => options.model = Some(PathBuf::from(path)),
                path if options.texture.is_none() => options.texture = Some(PathBuf::from(path)),
                extra => return Err(DemoError::Usage(format!("unexpected argument '{}'", extra))),
            }
        }
        Ok(options)
    }
}

fn read_shader(dir: &Path, name: &str) -> Result<Vec<u8>, DemoError> {
    let path = dir.join(name);
    std::fs::read(&path).map_err(|source| DemoError::Shader { path, source })
}

fn run(options: Options) -> Result<(), DemoError> {
    let mesh = assets::model_or_default(options.model.as_deref())?;
    let texture = assets::texture_or_default(options.texture.as_deref())?;

    let shader_dir = std::env::var_os("EMBER_SHADER_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SHADER_DIR));
    let vertex_spirv = read_shader(&shader_dir, "model.vert.spv")?;
    let fragment_spirv = read_shader(&shader_dir, "model.frag.spv")?;

    let config = RendererConfig::default()
        .with_app_name("Ember Demo")
        .with_vsync(options.vsync);

    let demo_window = DemoWindow::new("Ember", 1280, 720)?;
    // Outlives the device, whose surface was created from it
    let window = demo_window.window().cloned().ok_or(DemoError::NoWindow)?;

    let device = Arc::new(VulkanDevice::new(window.as_ref(), &config)?);
    let recorder = ModelRecorder::new(
        Arc::clone(&device),
        &mesh,
        &texture,
        &vertex_spirv,
        &fragment_spirv,
    )?;

    let mut frame_loop = FrameLoop::new(Arc::clone(&device), recorder, demo_window, config)?;
    let resize_flag = frame_loop.resize_flag();
    frame_loop.window_mut().attach_resize_flag(resize_flag);

    engine_info!("ember_demo", "Entering main loop");

    loop {
        frame_loop.window_mut().pump(Some(Duration::ZERO));
        if frame_loop.window().close_requested() {
            break;
        }
        frame_loop.draw_frame()?;
    }

    let stats = frame_loop.stats();
    engine_info!(
        "ember_demo",
        "Presented {} frames ({} skipped, {} swapchain rebuilds, {} present failures)",
        stats.frames_presented,
        stats.frames_skipped,
        stats.recreations,
        stats.present_failures
    );

    drop(frame_loop);
    drop(device);
    drop(window);

    #[cfg(feature = "vulkan-validation")]
    ember_engine_renderer_vulkan::ember::print_validation_stats_report();

    Ok(())
}

fn main() -> ExitCode {
    let options = match Options::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    match run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            engine_error!("ember_demo", "{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
