//! Vellum desktop: a paginated document viewer on wgpu.
//!
//! Uses `winit` 0.30 for windowing and input, `vellum-render` for GPU
//! rendering and `vellum-core`'s `DocView` for layout, caching and
//! gestures.  Pages come from image files, or blank ruled pages when
//! none are given.
//!
//! Keys: `i` ink tool, `t` text tool, `n` no tool, `0` reset zoom,
//! `Esc` close the editor or drop the tool.  Ctrl+wheel zooms.

mod editor;
mod pages;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};
use vellum_core::{PointerPhase, Tool, ViewerConfig};
use vellum_render::{GpuContext, RenderError};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalPosition},
    event::{ElementState, MouseButton, MouseScrollDelta, Touch, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, ModifiersState, NamedKey},
    window::{Window, WindowAttributes, WindowId},
};

use pages::PageSource;
use state::AppState;

const TITLE: &str = "Vellum";
/// Frames between stats log lines.
const STATS_EVERY: u64 = 300;
/// Pointer id of the mouse; touches are offset past it.
const MOUSE_POINTER: u64 = 0;

#[derive(Parser, Debug)]
#[command(name = "vellum", about = "Paginated document viewer", version)]
struct Args {
    /// Viewer settings (JSON).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Blank pages to show when no images are given.
    #[arg(short, long, default_value_t = 5)]
    pages: usize,

    /// Image files, one per page.
    images: Vec<PathBuf>,
}

/// Winit 0.30 application handler.
struct App {
    config: ViewerConfig,
    /// Taken when the window is created.
    source: Option<PageSource>,
    window: Option<Arc<Window>>,
    state: Option<AppState>,
    modifiers: ModifiersState,
    mouse_down: bool,
    last_mouse: (f64, f64),
    frame_count: u64,
}

impl App {
    fn new(config: ViewerConfig, source: PageSource) -> Self {
        Self {
            config,
            source: Some(source),
            window: None,
            state: None,
            modifiers: ModifiersState::empty(),
            mouse_down: false,
            last_mouse: (0.0, 0.0),
            frame_count: 0,
        }
    }
}

fn touch_phase(phase: TouchPhase) -> PointerPhase {
    match phase {
        TouchPhase::Started => PointerPhase::Down,
        TouchPhase::Moved => PointerPhase::Move,
        TouchPhase::Ended => PointerPhase::Up,
        TouchPhase::Cancelled => PointerPhase::Cancel,
    }
}

fn refresh_title(window: &Window, state: &AppState) {
    match state.editor.title() {
        Some(title) => window.set_title(&title),
        None => window.set_title(TITLE),
    }
}

/// Recreate the device and surface after the old device was lost.
fn recover_context(window: &Arc<Window>, state: &mut AppState) -> bool {
    let size = window.inner_size();
    match pollster::block_on(GpuContext::new_with_surface(
        window.clone(),
        size.width.max(1),
        size.height.max(1),
    )) {
        Ok(gpu) => {
            warn!("GPU device lost; recreated context");
            state.replace_context(gpu)
        }
        Err(e) => {
            error!("GPU context could not be recreated: {e}");
            false
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized.
        }
        let Some(source) = self.source.take() else {
            return;
        };

        let attrs = WindowAttributes::default()
            .with_title(TITLE)
            .with_inner_size(LogicalSize::new(1024, 900))
            .with_min_inner_size(LogicalSize::new(320, 240));

        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        let gpu = match pollster::block_on(GpuContext::new_with_surface(
            window.clone(),
            size.width.max(1),
            size.height.max(1),
        )) {
            Ok(gpu) => gpu,
            Err(e) => {
                error!("Failed to initialize GPU: {e}");
                event_loop.exit();
                return;
            }
        };
        info!(
            "Vellum initialized: {}x{} @{}x, GPU: {:?}",
            size.width,
            size.height,
            window.scale_factor(),
            gpu.adapter.get_info().name
        );

        let state = AppState::new(
            gpu,
            source,
            self.config.clone(),
            (size.width.max(1), size.height.max(1)),
            window.scale_factor(),
        );
        info!(
            "{} pages, content {}",
            state.view.document().page_count(),
            state.view.layout().size()
        );

        window.request_redraw();
        self.state = Some(state);
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let (Some(window), Some(state)) = (self.window.as_ref(), self.state.as_mut()) else {
            return;
        };

        let schedule = match event {
            // ── Close ───────────────────────────────────────────
            WindowEvent::CloseRequested => {
                let stats = state.stats();
                info!(
                    "Window closed after {} frames ({} updates, {} draws)",
                    self.frame_count, stats.updates, stats.draws
                );
                state.shutdown();
                event_loop.exit();
                false
            }

            // ── Keyboard ────────────────────────────────────────
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = modifiers.state();
                false
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                if state.editor.is_open() {
                    let handled = match &event.logical_key {
                        Key::Named(NamedKey::Escape) => {
                            state.view.stop_editing();
                            true
                        }
                        Key::Named(NamedKey::Backspace) => state.editor.backspace(),
                        Key::Named(NamedKey::Enter) => state.editor.insert("\n"),
                        Key::Named(NamedKey::Space) => state.editor.insert(" "),
                        _ => match event.text.as_deref() {
                            Some(text) if !text.chars().any(char::is_control) => {
                                state.editor.insert(text)
                            }
                            _ => false,
                        },
                    };
                    if handled {
                        refresh_title(window, state);
                    }
                    // stop_editing schedules its own frame.
                    state.needs_frame()
                } else {
                    match event.logical_key.as_ref() {
                        Key::Named(NamedKey::Escape) => {
                            state.set_tool(Tool::None);
                            false
                        }
                        Key::Character("i") => {
                            state.set_tool(Tool::Ink);
                            false
                        }
                        Key::Character("t") => {
                            state.set_tool(Tool::Text);
                            false
                        }
                        Key::Character("n") => {
                            state.set_tool(Tool::None);
                            false
                        }
                        Key::Character("0") => state.reset_zoom(),
                        _ => false,
                    }
                }
            }

            // ── Resize ──────────────────────────────────────────
            WindowEvent::Resized(new_size) => {
                state.resize(new_size.width, new_size.height, window.scale_factor())
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                let size = window.inner_size();
                state.resize(size.width, size.height, scale_factor)
            }

            // ── Mouse → pointer 0 ───────────────────────────────
            WindowEvent::CursorMoved {
                position: PhysicalPosition { x, y },
                ..
            } => {
                self.last_mouse = (x, y);
                if self.mouse_down {
                    state.pointer(MOUSE_POINTER, x, y, PointerPhase::Move)
                } else {
                    state.cursor_moved(x, y);
                    false
                }
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                self.mouse_down = true;
                let (x, y) = self.last_mouse;
                state.pointer(MOUSE_POINTER, x, y, PointerPhase::Down)
            }
            WindowEvent::MouseInput {
                state: ElementState::Released,
                button: MouseButton::Left,
                ..
            } if self.mouse_down => {
                self.mouse_down = false;
                let (x, y) = self.last_mouse;
                let scheduled = state.pointer(MOUSE_POINTER, x, y, PointerPhase::Up);
                refresh_title(window, state);
                scheduled
            }
            WindowEvent::CursorLeft { .. } if self.mouse_down => {
                self.mouse_down = false;
                let (x, y) = self.last_mouse;
                state.pointer(MOUSE_POINTER, x, y, PointerPhase::Cancel)
            }

            // ── Touch → pointers 1.. ────────────────────────────
            WindowEvent::Touch(Touch {
                id, phase, location, ..
            }) => {
                let scheduled = state.pointer(id + 1, location.x, location.y, touch_phase(phase));
                if phase == TouchPhase::Ended {
                    refresh_title(window, state);
                }
                scheduled
            }

            // ── Wheel → scroll, Ctrl+wheel → zoom ───────────────
            WindowEvent::MouseWheel { delta, .. } => {
                let zoom = self.modifiers.control_key();
                match delta {
                    MouseScrollDelta::LineDelta(dx, dy) => state.wheel(dx, dy, zoom),
                    MouseScrollDelta::PixelDelta(pos) if zoom => {
                        state.wheel(0.0, pos.y as f32 / 50.0, true)
                    }
                    MouseScrollDelta::PixelDelta(pos) => state.wheel_pixels(pos.x, pos.y),
                }
            }

            // ── Redraw ──────────────────────────────────────────
            WindowEvent::RedrawRequested => {
                match state.render_frame() {
                    Ok(stats) => {
                        self.frame_count += 1;
                        if self.frame_count % STATS_EVERY == 0 {
                            let view = state.stats();
                            info!(
                                "Frame {}: {} draw call(s), {} skipped; {} updates, {} redraw requests",
                                self.frame_count,
                                stats.draw_calls,
                                stats.skipped,
                                view.updates,
                                view.renders_requested
                            );
                        }
                    }
                    Err(RenderError::Surface(
                        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated,
                    )) => {
                        // Reconfigure surface on lost/outdated.
                        state.backend.context_mut().reconfigure();
                        state.view.request_redraw(false);
                    }
                    Err(RenderError::ContextLost) => {
                        recover_context(window, state);
                    }
                    Err(e) => {
                        error!("Render error: {e}");
                    }
                }
                // Coalesced gesture moves wait for the next frame.
                state.needs_frame()
            }

            _ => false,
        };

        if schedule {
            window.request_redraw();
        }
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match ViewerConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                std::process::exit(2);
            }
        },
        None => ViewerConfig::default(),
    };
    let source = match PageSource::from_args(&args.images, args.pages) {
        Ok(source) => source,
        Err(e) => {
            error!("{e}");
            std::process::exit(2);
        }
    };
    if !vellum_text::fonts::init() {
        warn!("text overlays disabled: no fonts");
    }

    info!("Starting Vellum...");
    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            error!("Failed to create event loop: {e}");
            std::process::exit(1);
        }
    };
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config, source);
    if let Err(e) = event_loop.run_app(&mut app) {
        error!("Event loop error: {e}");
    }
}
