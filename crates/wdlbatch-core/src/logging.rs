use crate::config::LoggingConfig;
use crate::errors::ConfigError;
use chrono::Local;
use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tracing::Level;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const LOG_LEVEL_ENV: &str = "WDLBATCH_LOG_LEVEL";
const LOG_PREFIX: &str = "wdlbatch_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    /// `-v` count: none for errors only, one per extra level.
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "ERROR" => Some(LogLevel::Error),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "INFO" => Some(LogLevel::Info),
            "DEBUG" | "TRACE" => Some(LogLevel::Debug),
            _ => None,
        }
    }

    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
        }
    }
}

/// Console level: an explicit `-v` wins, then `WDLBATCH_LOG_LEVEL`, then errors only.
pub fn resolve_level(verbosity: u8) -> LogLevel {
    if verbosity > 0 {
        return LogLevel::from_verbosity(verbosity);
    }
    env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|v| LogLevel::parse(&v))
        .unwrap_or(LogLevel::Error)
}

fn console_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()))
}

struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S"))
    }
}

fn rotate_logs(log_dir: &Path, prefix: &str, config: &LoggingConfig) -> Result<(), ConfigError> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(log_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix) && n.ends_with(".log"))
        })
        .collect();

    entries.sort();

    if config.max_files > 0 && entries.len() > config.max_files {
        let to_delete = entries.len() - config.max_files;
        for path in entries.drain(0..to_delete) {
            let _ = fs::remove_file(path);
        }
    }

    if config.max_age_days > 0 {
        let now = SystemTime::now();
        let max_age = Duration::from_secs(config.max_age_days * 24 * 60 * 60);

        entries.retain(|path| {
            let Some(created) = log_file_date(path, prefix) else {
                return true;
            };
            match now.duration_since(created) {
                Ok(age) if age > max_age => {
                    let _ = fs::remove_file(path);
                    false
                }
                _ => true,
            }
        });
    }

    Ok(())
}

/// Start of the day encoded in `{prefix}{YYYY-MM-DD}_{time}_{pid}.log`.
fn log_file_date(path: &Path, prefix: &str) -> Option<SystemTime> {
    let name = path.file_name()?.to_str()?;
    let date = name.strip_prefix(prefix)?.split('_').next()?;
    let date = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let local = date.and_hms_opt(0, 0, 0)?.and_local_timezone(Local).single()?;
    Some(SystemTime::from(local))
}

struct FileFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for FileFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();

        write!(writer, "[")?;
        LocalTimeFormatter.format_time(&mut writer)?;
        write!(writer, "] [{:5}] ", metadata.level())?;

        if let Some(module) = metadata.module_path() {
            write!(writer, "{}:{} ", module, metadata.line().unwrap_or(0))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Console logging plus a per-session log file under the XDG cache home.
///
/// The file always records debug events; the console follows `level`.
pub fn init_session_logger(level: LogLevel, config: &LoggingConfig) -> Result<(), ConfigError> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("wdlbatch");
    let cache_home = xdg_dirs
        .get_cache_home()
        .ok_or(ConfigError::HomeDirectoryNotFound("cache"))?;
    let logs_dir = cache_home.join("logs");

    rotate_logs(&logs_dir, LOG_PREFIX, config)?;

    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let filename = format!("{}{}_{}.log", LOG_PREFIX, timestamp, std::process::id());
    let log_path = logs_dir.join(&filename);

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|source| ConfigError::PathIo {
            path: log_path.clone(),
            source,
        })?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(EnvFilter::new("debug"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTimeFormatter)
        .with_target(false)
        .with_filter(console_filter(level));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| ConfigError::General(format!("logger already initialised: {}", e)))?;

    let symlink_path = cache_home.join("wdlbatch.log");
    let _ = fs::remove_file(&symlink_path);
    #[cfg(unix)]
    {
        use std::os::unix::fs::symlink;
        let target = Path::new("logs").join(&filename);
        let _ = symlink(&target, &symlink_path);
    }

    tracing::debug!("--- Session log {} ---", log_path.display());
    Ok(())
}

pub fn init_stderr_logger(level: LogLevel) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(console_filter(level))
        .with_writer(std::io::stderr)
        .with_timer(LocalTimeFormatter)
        .with_target(false)
        .try_init();
}
