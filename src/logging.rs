use std::sync::Mutex;

use slog::Drain;
use slog::FnValue;
use slog::IgnoreResult;
use slog::Logger;
use slog::OwnedKVList;
use slog::Record;

use slog_json::Json;
use slog_term::FullFormat;
use slog_term::TermDecorator;

/// Alternative implementation of slog's `LevelFilter` with `Ok == ()`.
///
/// The default `LevelFilter` wraps `D::Ok` into an `Option`, which makes it impossible to wrap a
/// filtering drain into a `Logger`. Lifted from the teacher's own `replictl::logging`.
#[derive(Debug, Clone)]
struct LevelFilter<D: Drain>(pub D, pub ::slog::Level);
impl<D: Drain> Drain for LevelFilter<D> {
    type Ok = ();
    type Err = D::Err;
    fn log(&self, record: &Record, logger_values: &OwnedKVList) -> Result<Self::Ok, Self::Err> {
        if record.level().is_at_least(self.1) {
            self.0.log(record, logger_values)?;
        }
        Ok(())
    }
}

arg_enum! {
    /// Enumerate valid log verbosity levels.
    #[derive(Clone, Eq, PartialEq, Hash, Debug)]
    pub enum LogLevel {
        Critical,
        Error,
        Warning,
        Info,
        Debug,
    }
}

impl Default for LogLevel {
    #[cfg(debug_assertions)]
    fn default() -> LogLevel {
        LogLevel::Debug
    }

    #[cfg(not(debug_assertions))]
    fn default() -> LogLevel {
        LogLevel::Info
    }
}

impl From<LogLevel> for ::slog::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Critical => ::slog::Level::Critical,
            LogLevel::Error => ::slog::Level::Error,
            LogLevel::Warning => ::slog::Level::Warning,
            LogLevel::Info => ::slog::Level::Info,
            LogLevel::Debug => ::slog::Level::Debug,
        }
    }
}

arg_enum! {
    /// Enumerate the supported log output encodings.
    #[derive(Clone, Eq, PartialEq, Hash, Debug)]
    pub enum LogFormat {
        Term,
        Json,
    }
}

impl Default for LogFormat {
    fn default() -> LogFormat {
        LogFormat::Term
    }
}

/// Configure the logger. Always writes to stderr: stdout is reserved for the BGP protocol (§6).
pub fn configure(level: LogLevel, format: LogFormat) -> Logger {
    let level: ::slog::Level = level.into();
    match format {
        LogFormat::Term => {
            let decorator = TermDecorator::new().stderr().build();
            let drain = FullFormat::new(decorator).build();
            let drain = Mutex::new(drain).map(IgnoreResult::new);
            let drain = LevelFilter(drain, level);
            Logger::root(drain, o!("module" => FnValue(|rinfo: &Record| rinfo.module())))
        }
        LogFormat::Json => {
            let drain = Json::new(::std::io::stderr()).add_default_keys().build();
            let drain = Mutex::new(drain).map(IgnoreResult::new);
            let drain = LevelFilter(drain, level);
            Logger::root(drain, o!("module" => FnValue(|rinfo: &Record| rinfo.module())))
        }
    }
}
