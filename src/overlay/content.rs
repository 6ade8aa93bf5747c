use crate::overlay::frame::FrameInfo;

pub const DRAWER_PANEL_TITLE: &str = "Drawer panel";

/// Built-in panel: frame rate, window resolution and a greeting.
pub fn drawer_panel(ctx: &egui::Context, info: &FrameInfo) {
    egui::Window::new(DRAWER_PANEL_TITLE)
        .default_pos(egui::pos2(60.0, 60.0))
        .resizable(false)
        .show(ctx, |ui| {
            ui.label(format!("FPS: {:.1}", info.fps));
            ui.label(format!(
                "Window resolution: {} x {}",
                info.window_size.0, info.window_size.1
            ));
            ui.label("Hello, world!");
        });
}
