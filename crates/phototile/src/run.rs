use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;
use winit::dpi::PhysicalSize;
use winit::event::{Event, StartCause, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::window::WindowBuilder;

use engine::gpu::{GpuContext, GpuScene};
use engine::{render_channel, RenderCadence, SceneRenderer, TextureManager, TextureManagerOptions};
use mediascan::MediaScanner;
use tileconfig::Settings;

use crate::cli::Args;

/// If the GPU has not presented a frame this long after a resume, the
/// surface is considered wedged and the daemon bails out for a restart.
const RESUME_WATCHDOG: Duration = Duration::from_secs(15);

/// Marker event sent by background threads to pull the loop out of waiting.
#[derive(Debug, Clone, Copy)]
struct WakeUp;

pub fn run(args: Args) -> Result<()> {
    initialise_tracing();

    let settings = load_settings(&args)?;
    let size = args
        .size
        .as_deref()
        .map(parse_surface_size)
        .transpose()?
        .unwrap_or((1920, 1080));
    let seed = args.seed.unwrap_or_else(time_seed);
    tracing::info!(
        width = size.0,
        height = size.1,
        sources = settings.media.sources.len(),
        "bootstrapping phototile wallpaper daemon"
    );

    let event_loop = EventLoopBuilder::<WakeUp>::with_user_event()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("phototile")
            .with_inner_size(PhysicalSize::new(size.0, size.1))
            .build(&event_loop)
            .map_err(|err| anyhow!("failed to create wallpaper window: {err}"))?,
    );

    let mut context = GpuContext::new(window.as_ref(), size)?;
    let mut scene = GpuScene::new(&context);

    let proxy = event_loop.create_proxy();
    let (dispatcher, jobs) = render_channel(Arc::new(move || {
        let _ = proxy.send_event(WakeUp);
    }));
    let scanner = MediaScanner::new(settings.media.sources.clone());
    let manager = TextureManager::new(
        dispatcher,
        scanner,
        TextureManagerOptions {
            screen: size,
            decode_dimensions: ((size.0 / 4).max(1), (size.1 / 4).max(1)),
            fix_aspect_ratio: settings.render.fix_aspect_ratio,
            effects: settings.render.effects.clone(),
            seed,
        },
    );
    let mut renderer = SceneRenderer::new(settings, manager, jobs, seed)
        .map_err(|err| anyhow!("invalid configuration: {err}"))?;
    renderer.resize(size.0, size.1, &mut scene);

    let failure: Arc<Mutex<Option<anyhow::Error>>> = Arc::new(Mutex::new(None));
    let failure_in_loop = Arc::clone(&failure);
    let mut ops = Vec::new();
    let mut watchdog = Some(Instant::now() + RESUME_WATCHDOG);
    window.request_redraw();

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::NewEvents(StartCause::ResumeTimeReached { .. }) => {
            window.request_redraw();
        }
        Event::UserEvent(WakeUp) => {
            window.request_redraw();
        }
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                elwt.exit();
            }
            WindowEvent::Resized(new_size) => {
                context.resize(new_size.width, new_size.height);
                renderer.resize(new_size.width, new_size.height, &mut scene);
                window.request_redraw();
            }
            WindowEvent::Occluded(occluded) => {
                if occluded {
                    tracing::debug!("surface occluded, pausing");
                    renderer.pause();
                } else {
                    tracing::debug!("surface visible again, resuming");
                    renderer.resume(Instant::now());
                    watchdog = Some(Instant::now() + RESUME_WATCHDOG);
                    window.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => {
                let frame = match context.surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                        let (width, height) = (context.config.width, context.config.height);
                        context.resize(width, height);
                        window.request_redraw();
                        return;
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        *failure_in_loop.lock().unwrap() =
                            Some(anyhow!("GPU surface ran out of memory"));
                        elwt.exit();
                        return;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "surface frame unavailable, retrying");
                        window.request_redraw();
                        return;
                    }
                };
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());

                ops.clear();
                let cadence = renderer.draw_frame(Instant::now(), &mut scene, &mut ops);
                scene.render(&view, &ops, renderer.background());
                frame.present();
                watchdog = None;

                if cadence == RenderCadence::Continuous {
                    window.request_redraw();
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            if let Some(deadline) = watchdog {
                if Instant::now() >= deadline {
                    *failure_in_loop.lock().unwrap() = Some(anyhow!(
                        "GPU failed to present a frame within {RESUME_WATCHDOG:?} of resume"
                    ));
                    elwt.exit();
                    return;
                }
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            } else if let Some(wake) = renderer.next_wake() {
                elwt.set_control_flow(ControlFlow::WaitUntil(wake));
            } else {
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        _ => {}
    });
    run_result.map_err(|err| anyhow!("event loop error: {err}"))?;

    if let Some(err) = failure.lock().unwrap().take() {
        return Err(err);
    }
    Ok(())
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Reads the TOML configuration and folds in the CLI overrides.
fn load_settings(args: &Args) -> Result<Settings> {
    let path = args.config.clone().or_else(default_config_path);
    let mut settings = match path {
        Some(path) if path.exists() => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config at {}", path.display()))?;
            let settings = Settings::from_toml_str(&raw)
                .with_context(|| format!("failed to parse config at {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded configuration");
            settings
        }
        Some(path) => {
            tracing::info!(path = %path.display(), "no config file found, using defaults");
            Settings::default()
        }
        None => {
            tracing::info!("no config directory available, using defaults");
            Settings::default()
        }
    };

    settings.media.sources.extend(args.sources.iter().cloned());
    if settings.media.sources.is_empty() {
        tracing::warn!("no photo sources configured; the wallpaper will stay empty");
    }
    Ok(settings)
}

fn default_config_path() -> Option<PathBuf> {
    directories_next::ProjectDirs::from("", "", "phototile")
        .map(|dirs| dirs.config_dir().join("phototile.toml"))
}

fn parse_surface_size(raw: &str) -> Result<(u32, u32)> {
    let (width, height) = raw
        .split_once('x')
        .ok_or_else(|| anyhow!("size '{raw}' must be WIDTHxHEIGHT"))?;
    let width: u32 = width
        .trim()
        .parse()
        .with_context(|| format!("invalid width in '{raw}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .with_context(|| format!("invalid height in '{raw}'"))?;
    if width == 0 || height == 0 {
        anyhow::bail!("size '{raw}' must be non-zero");
    }
    Ok((width, height))
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0)
}
