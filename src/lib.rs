pub mod logging;
pub mod overlay;
#[cfg(windows)]
pub mod platform;
pub mod settings;

#[cfg(windows)]
pub use overlay::run;
