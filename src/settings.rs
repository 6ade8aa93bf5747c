use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Title of the overlay window.
    #[serde(default = "default_title")]
    pub title: String,
    /// Logical window size before DPI scaling. If `None`, the primary screen
    /// size is used.
    #[serde(default)]
    pub window_size: Option<(i32, i32)>,
    /// Clear color of the back buffer as RGBA in `[0, 1]`. The default is
    /// fully transparent so only the UI panels are visible.
    #[serde(default)]
    pub clear_color: [f32; 4],
    /// Optional TTF/OTF file installed as the primary UI font.
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    /// Size of body text in points.
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// When enabled the application initialises the logger at debug level.
    /// Defaults to `false` when the field is missing in the settings file.
    #[serde(default)]
    pub debug_logging: bool,
    /// Mirror log output into this file.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Show the built-in "Drawer panel".
    #[serde(default = "default_show_demo_panel")]
    pub show_demo_panel: bool,
}

fn default_title() -> String {
    "egui external overlay".to_string()
}

fn default_font_size() -> f32 {
    16.0
}

fn default_show_demo_panel() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title: default_title(),
            window_size: None,
            clear_color: [0.0; 4],
            font_path: None,
            font_size: default_font_size(),
            debug_logging: false,
            log_file: None,
            show_demo_panel: default_show_demo_panel(),
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut settings: Self = serde_json::from_str(&content)?;
        settings.normalize();
        Ok(settings)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Clamp values that would otherwise reach the graphics or UI layer
    /// out of range.
    pub fn normalize(&mut self) {
        for channel in &mut self.clear_color {
            *channel = if channel.is_finite() {
                channel.clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            tracing::warn!(font_size = self.font_size, "invalid font size; using default");
            self.font_size = default_font_size();
        }
        if let Some((w, h)) = self.window_size {
            if w <= 0 || h <= 0 {
                tracing::warn!(width = w, height = h, "invalid window size; using screen size");
                self.window_size = None;
            }
        }
    }
}

/// `settings.json` next to the executable, falling back to the working
/// directory when the executable path is unavailable.
pub fn default_settings_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(SETTINGS_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE_NAME))
}
