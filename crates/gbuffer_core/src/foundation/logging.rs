//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace, LevelFilter};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system with a default filter
///
/// `RUST_LOG` still wins when it is set. Safe to call more than once; later
/// calls are ignored.
pub fn init_with_level(default_filter: &str) {
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}

/// Initialize logging at `info` before the configured level is known
///
/// The installed filter admits every level; [`apply_level`] later narrows the
/// global maximum. When `RUST_LOG` is set it decides instead.
pub fn init_deferred() {
    let env = env_logger::Env::default().default_filter_or("trace");
    let installed = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init()
        .is_ok();
    if installed && std::env::var_os("RUST_LOG").is_none() {
        log::set_max_level(LevelFilter::Info);
    }
}

/// Apply a configured level after [`init_deferred`]; ignored under `RUST_LOG`
pub fn apply_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    match parse_level(level) {
        Some(filter) => log::set_max_level(filter),
        None => log::warn!("[LOGGING] Unknown log level '{}', keeping {}", level, log::max_level()),
    }
}

/// Level filter for a configured name such as `"debug"`
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    level.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_names() {
        assert_eq!(parse_level("debug"), Some(LevelFilter::Debug));
        assert_eq!(parse_level(" WARN "), Some(LevelFilter::Warn));
        assert_eq!(parse_level("off"), Some(LevelFilter::Off));
        assert_eq!(parse_level("loud"), None);
    }
}

/// Per-thread log capture for tests
#[cfg(test)]
pub(crate) mod capture {
    use std::cell::RefCell;
    use std::sync::Once;

    thread_local! {
        static RECORDS: RefCell<Vec<(log::Level, String)>> = RefCell::new(Vec::new());
    }

    struct ThreadLogger;

    impl log::Log for ThreadLogger {
        fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &log::Record<'_>) {
            RECORDS.with(|records| records.borrow_mut().push((record.level(), record.args().to_string())));
        }

        fn flush(&self) {}
    }

    static LOGGER: ThreadLogger = ThreadLogger;
    static INSTALL: Once = Once::new();

    /// Run `f` and return what it logged on the current thread
    pub fn records<T>(f: impl FnOnce() -> T) -> (T, Vec<(log::Level, String)>) {
        INSTALL.call_once(|| {
            if log::set_logger(&LOGGER).is_ok() {
                log::set_max_level(log::LevelFilter::Trace);
            }
        });
        RECORDS.with(|records| records.borrow_mut().clear());
        let result = f();
        let captured = RECORDS.with(|records| records.borrow_mut().drain(..).collect());
        (result, captured)
    }
}
