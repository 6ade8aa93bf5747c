use overlay_host::logging;
use overlay_host::settings::{default_settings_path, Settings};

fn main() -> anyhow::Result<()> {
    let settings_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| default_settings_path().to_string_lossy().into_owned());
    let settings = Settings::load(&settings_path)?;
    logging::init(settings.debug_logging, settings.log_file.clone());
    tracing::debug!(path = %settings_path, ?settings, "settings loaded");

    run(&settings)
}

#[cfg(windows)]
fn run(settings: &Settings) -> anyhow::Result<()> {
    overlay_host::run(settings)
}

#[cfg(not(windows))]
fn run(_settings: &Settings) -> anyhow::Result<()> {
    tracing::error!("the overlay requires Windows");
    anyhow::bail!("the overlay requires Windows (Win32 and Direct3D 11)")
}
