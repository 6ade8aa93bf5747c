pub mod content;
pub mod device;
pub mod frame;
pub mod geometry;
pub mod shell;
pub mod transparency;
pub mod ui_host;

pub use device::{DeviceError, DeviceResources, DriverTier, GraphicsBackend};
pub use frame::{FrameDriver, FrameInfo, FrameOutcome};
pub use shell::{PendingResize, ShellEvent, ShellResponse, ShellState};
pub use transparency::{HoverOutcome, OverlaySurface, TransparencyController, UiHover};
pub use ui_host::{EguiHost, FontSettings, InputQueue, PaintFrame};

use std::cell::RefCell;

/// Everything the window procedure and the render loop both touch. Owned
/// by the native window for its whole lifetime.
#[derive(Debug)]
pub struct OverlayShared {
    pub shell: ShellState,
    pub input: RefCell<InputQueue>,
}

impl OverlayShared {
    pub fn new(pixels_per_point: f32) -> Self {
        Self {
            shell: ShellState::new(),
            input: RefCell::new(InputQueue::new(pixels_per_point)),
        }
    }
}

/// Run the overlay with the built-in panel until the window is closed.
#[cfg(windows)]
pub fn run(settings: &crate::settings::Settings) -> anyhow::Result<()> {
    let show_panel = settings.show_demo_panel;
    run_with_content(settings, move |ctx, info| {
        if show_panel {
            content::drawer_panel(ctx, info);
        }
    })
}

/// Create the window and device, then pump, render and update transparency
/// until a quit message arrives. Teardown runs device, window, class.
#[cfg(windows)]
pub fn run_with_content<F>(settings: &crate::settings::Settings, mut content: F) -> anyhow::Result<()>
where
    F: FnMut(&egui::Context, &FrameInfo),
{
    use crate::platform::d3d11::D3D11Backend;
    use crate::platform::window::{self, NativeWindow, WindowClass};
    use anyhow::Context as _;

    window::enable_dpi_awareness();
    let class = WindowClass::register(window::OVERLAY_CLASS_NAME)
        .context("failed to register overlay window class")?;
    // Sizes are logical and get scaled at creation, so the physical screen
    // size has to be brought back to points first.
    let requested = settings.window_size.unwrap_or_else(|| {
        geometry::logical_size(window::primary_screen_size(), window::primary_monitor_scale())
    });
    let window = NativeWindow::create(&class, &settings.title, requested)
        .context("failed to create overlay window")?;

    let resources = match DeviceResources::create(D3D11Backend::new(window.hwnd())) {
        Ok(resources) => resources,
        Err(err) => {
            tracing::error!(%err, "graphics device creation failed");
            return Err(anyhow::Error::new(err).context("failed to create graphics device"));
        }
    };

    window.enable_alpha_compositing();
    window.show();

    let fonts = FontSettings::load(settings.font_path.as_deref(), settings.font_size);
    let host = EguiHost::new(window.client_size(), &fonts);
    let mut driver = FrameDriver::new(resources, host, settings.clear_color);
    let mut controller = TransparencyController::new();
    tracing::info!(
        title = %settings.title,
        size = ?window.client_size(),
        scale = window.dpi_scale(),
        tier = ?driver.resources().driver_tier(),
        "overlay running"
    );

    loop {
        if window.pump_messages() {
            break;
        }
        driver.render_frame(window.shared(), &mut content);
        controller.update(&window, driver.context(), window.shared());
    }

    tracing::info!(frames = driver.frame_index(), "overlay shutting down");
    drop(driver);
    drop(window);
    drop(class);
    Ok(())
}
