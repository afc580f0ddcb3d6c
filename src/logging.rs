use std::env;
use std::fmt;
use std::sync::OnceLock;

pub const LOG_LEVEL_ENV: &str = "CFISH_LOG_LEVEL";

/// Logging verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "error" | "err" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" | "verbose" => Some(Self::Trace),
            _ => None,
        }
    }

    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        f.write_str(text)
    }
}

/// Subscriber settings for binaries and tests embedding the bridge.
#[derive(Debug, Clone, Copy)]
pub struct LogOptions {
    pub level: LogLevel,
    pub ansi: bool,
}

impl LogOptions {
    pub const DEFAULT: Self = Self {
        level: LogLevel::Warn,
        ansi: false,
    };

    /// Defaults with `CFISH_LOG_LEVEL` applied. Unknown levels are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let level = env::var_os(LOG_LEVEL_ENV)
            .and_then(|value| LogLevel::parse(&value.to_string_lossy()))
            .unwrap_or(Self::DEFAULT.level);
        Self {
            level,
            ..Self::DEFAULT
        }
    }
}

impl Default for LogOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Install a global `fmt` subscriber writing to stderr. Only the first call
/// has any effect; `RUST_LOG` directives take precedence over `options.level`.
pub fn init_logging(options: LogOptions) {
    use tracing_subscriber::fmt;

    static INITIALISED: OnceLock<()> = OnceLock::new();

    let _ = INITIALISED.get_or_init(|| {
        let subscriber = fmt::fmt()
            .with_env_filter(env_filter(options.level))
            .with_ansi(options.ansi)
            .with_writer(std::io::stderr)
            .with_target(true)
            .compact()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// `RUST_LOG` when it parses, otherwise everything at `level` and above.
fn env_filter(level: LogLevel) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()))
}
