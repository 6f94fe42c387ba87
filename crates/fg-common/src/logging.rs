use std::panic;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const LOG_DIR_ENV: &str = "FG_LOG_DIR";
pub const LOG_BACKTRACE_ENV: &str = "FG_LOG_INCLUDE_BACKTRACE";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn flag_enabled(raw: &str) -> bool {
    raw == "1" || raw.eq_ignore_ascii_case("true") || raw.eq_ignore_ascii_case("yes")
}

/// Route panics through `tracing` so they land in the same sink as every other
/// log line. Installed once per process; later calls are no-ops.
pub fn install_tracing_panic_hook(service: &'static str) {
    static HOOKED: OnceLock<()> = OnceLock::new();

    HOOKED.get_or_init(|| {
        let previous = panic::take_hook();
        let with_backtrace = std::env::var(LOG_BACKTRACE_ENV)
            .map(|raw| flag_enabled(&raw))
            .unwrap_or(false);

        panic::set_hook(Box::new(move |info| {
            let current = std::thread::current();
            let thread = current.name().unwrap_or("unnamed");
            let location = info
                .location()
                .map(|loc| format!("{}:{}", loc.file(), loc.line()))
                .unwrap_or_else(|| "unknown".into());
            let payload = info.payload();
            let message = payload
                .downcast_ref::<&str>()
                .map(|msg| (*msg).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".into());

            tracing::error!(service, thread, %location, %message, "panicked");

            if with_backtrace {
                previous(info);
            }
        }));
    });
}

fn daily_file_writer(service: &'static str) -> Option<BoxMakeWriter> {
    let dir = PathBuf::from(std::env::var_os(LOG_DIR_ENV)?);
    if let Err(err) = std::fs::create_dir_all(&dir) {
        eprintln!("cannot create {LOG_DIR_ENV} {}: {err}; logging to stdout", dir.display());
        return None;
    }

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, format!("{service}.log")));
    let _ = FILE_GUARD.set(guard);
    Some(BoxMakeWriter::new(writer))
}

/// Install the global subscriber. `RUST_LOG` selects the filter (default
/// `info`); with `FG_LOG_DIR` set, output goes to `<dir>/<service>.log`
/// rotated daily instead of stdout.
pub fn init_tracing_subscriber(service: &'static str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match daily_file_writer(service) {
        Some(writer) => {
            let _ = builder.with_writer(writer).with_ansi(false).try_init();
        }
        None => {
            let _ = builder.try_init();
        }
    }
}
