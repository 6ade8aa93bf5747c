use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Build the filter used by [`init`]. In debug mode `RUST_LOG` may override
/// the level; otherwise the level is forced to `info` so a stray `RUST_LOG`
/// in the user's environment cannot turn on verbose output.
pub fn env_filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    }
}

/// Build the subscriber without installing it. The returned guard (if any)
/// must be kept alive for as long as file output is wanted; dropping it
/// flushes the background writer.
pub fn build_subscriber(
    debug: bool,
    log_file: Option<&Path>,
) -> (impl tracing::Subscriber + Send + Sync, Option<WorkerGuard>) {
    let (file_layer, guard) = match log_file.and_then(split_log_path) {
        Some((dir, name)) => {
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let subscriber = Registry::default()
        .with(env_filter(debug))
        .with(fmt::layer())
        .with(file_layer);
    (subscriber, guard)
}

/// Initialise logging for the process. `debug` selects the `debug` level
/// (overridable through `RUST_LOG`), otherwise `info` is used. When
/// `log_file` is set, output is mirrored to that file.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    let (subscriber, guard) = build_subscriber(debug, log_file.as_deref());
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return;
    }
    if let Some(guard) = guard {
        let _ = FILE_GUARD.set(guard);
    }
}

fn split_log_path(path: &Path) -> Option<(PathBuf, PathBuf)> {
    let name = path.file_name()?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((dir, PathBuf::from(name)))
}
