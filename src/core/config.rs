//! Startup configuration
//!
//! Read once per process from serialized defaults, an optional TOML file and
//! `LOG_`-prefixed environment variables (later sources win):
//!
//! | Variable | Example | Meaning |
//! |---|---|---|
//! | `LOG_LEVEL` | `info` | minimum level; defaults by environment |
//! | `LOG_DIR` | `logs` | directory for file sinks |
//! | `LOG_MAX_SIZE` | `20m` | size cap per segment (`k`, `m`, `g` suffixes) |
//! | `LOG_MAX_FILES` | `14d` or `10` | general sink retention (age or count) |
//! | `LOG_ERROR_MAX_FILES` | `30d` | error sink retention |
//! | `LOG_FAULT_MAX_FILES` | `30d` | exception/rejection sink retention |
//! | `LOG_COMPRESS` | `true` | gzip rotated segments |
//! | `LOG_SERVICE`, `LOG_ENVIRONMENT`, `LOG_VERSION` | | stamped on every record |
//! | `LOG_CONSOLE` | `true` | force the console sink on or off |
//! | `LOG_SAMPLING_ENABLED`, `LOG_SAMPLING_RATE` | `true`, `0.1` | debug/verbose sampling |
//! | `LOG_QUEUE_CAPACITY` | `10000` | router queue size |

use super::{
    error::{LoggerError, Result},
    log_level::LogLevel,
    record::{is_production_env, ServiceInfo},
    router::{SinkKind, Transport},
    sampling::SamplingConfig,
};
use crate::appenders::{
    ConsoleAppender, Retention, RotatingFileAppender, RotationPolicy, RotationStrategy,
};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Default TOML file consulted by [`LoggingConfig::load`]
pub const DEFAULT_CONFIG_FILE: &str = "logging.toml";

/// Prefix of the environment variables read by [`LoggingConfig::load`]
pub const ENV_PREFIX: &str = "LOG_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum level; `None` picks `info` in production and `debug` elsewhere
    #[serde(default)]
    pub level: Option<String>,
    pub dir: PathBuf,
    #[serde(deserialize_with = "string_or_number")]
    pub max_size: String,
    #[serde(deserialize_with = "string_or_number")]
    pub max_files: String,
    #[serde(deserialize_with = "string_or_number")]
    pub error_max_files: String,
    #[serde(deserialize_with = "string_or_number")]
    pub fault_max_files: String,
    pub compress: bool,
    pub service: String,
    pub environment: String,
    #[serde(deserialize_with = "string_or_number")]
    pub version: String,
    /// Force the console sink on or off regardless of environment
    #[serde(default)]
    pub console: Option<bool>,
    pub sampling_enabled: bool,
    pub sampling_rate: f64,
    pub queue_capacity: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            dir: PathBuf::from("logs"),
            max_size: "20m".to_string(),
            max_files: "14d".to_string(),
            error_max_files: "30d".to_string(),
            fault_max_files: "30d".to_string(),
            compress: true,
            service: "app".to_string(),
            environment: "development".to_string(),
            version: "1.0.0".to_string(),
            console: None,
            sampling_enabled: false,
            sampling_rate: 0.1,
            queue_capacity: 10_000,
        }
    }
}

/// Which file a sink writes and how it rotates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSinkSpec {
    pub path: PathBuf,
    pub policy: RotationPolicy,
}

/// One entry of the fixed sink set configured at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportDescriptor {
    pub kind: SinkKind,
    pub min_level: LogLevel,
    /// `None` for the console sink
    pub file: Option<FileSinkSpec>,
}

impl TransportDescriptor {
    /// Open the sink this descriptor describes
    pub fn build(&self) -> Result<Transport> {
        match &self.file {
            Some(spec) => Ok(Transport::new(
                self.kind,
                self.min_level,
                RotatingFileAppender::with_policy(&spec.path, spec.policy.clone())?,
            )),
            None => Ok(Transport::new(
                self.kind,
                self.min_level,
                ConsoleAppender::new(),
            )),
        }
    }
}

impl LoggingConfig {
    /// Load from `logging.toml` (if present) and `LOG_*` variables
    pub fn load() -> Result<Self> {
        Self::load_from(Some(Path::new(DEFAULT_CONFIG_FILE)))
    }

    /// Load with an explicit TOML file; a missing file is not an error
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(path))
    }

    /// Provider chain: defaults, then TOML, then environment
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(LoggingConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Extract and validate
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: LoggingConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on anything that would only surface later at runtime
    pub fn validate(&self) -> Result<()> {
        self.min_level()?;
        self.max_size_bytes()?;
        parse_retention(&self.max_files)?;
        parse_retention(&self.error_max_files)?;
        parse_retention(&self.fault_max_files)?;

        if !(0.0..=1.0).contains(&self.sampling_rate) {
            return Err(LoggerError::config(
                "sampling_rate",
                format!("must be between 0 and 1, got {}", self.sampling_rate),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(LoggerError::config("queue_capacity", "must be greater than 0"));
        }
        if self.service.trim().is_empty() {
            return Err(LoggerError::config("service", "must not be empty"));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        is_production_env(&self.environment)
    }

    pub fn min_level(&self) -> Result<LogLevel> {
        match &self.level {
            Some(level) => level
                .parse()
                .map_err(|_| LoggerError::invalid_level(level.as_str())),
            None if self.is_production() => Ok(LogLevel::Info),
            None => Ok(LogLevel::Debug),
        }
    }

    pub fn max_size_bytes(&self) -> Result<u64> {
        parse_size(&self.max_size)
    }

    /// Console sink is on outside production, or when forced
    pub fn console_enabled(&self) -> bool {
        self.console.unwrap_or(!self.is_production())
    }

    pub fn service_info(&self) -> ServiceInfo {
        ServiceInfo::new(&self.service, &self.environment, &self.version)
    }

    pub fn sampling(&self) -> SamplingConfig {
        if self.sampling_enabled {
            SamplingConfig::new(self.sampling_rate)
        } else {
            SamplingConfig::disabled()
        }
    }

    /// The fixed sink set: general, error, console (when enabled), exception, rejection
    pub fn transports(&self) -> Result<Vec<TransportDescriptor>> {
        let min_level = self.min_level()?;
        let max_bytes = self.max_size_bytes()?;
        let rotating = RotationStrategy::DailyOrSize { max_bytes };

        let file_sink = |name: &str, retention: Retention| FileSinkSpec {
            path: self.dir.join(format!("{}.log", name)),
            policy: RotationPolicy::new()
                .with_strategy(rotating)
                .with_retention(retention)
                .with_compression(self.compress),
        };

        let mut descriptors = vec![
            TransportDescriptor {
                kind: SinkKind::General,
                min_level,
                file: Some(file_sink("application", parse_retention(&self.max_files)?)),
            },
            TransportDescriptor {
                kind: SinkKind::Error,
                min_level: LogLevel::Error,
                file: Some(file_sink("error", parse_retention(&self.error_max_files)?)),
            },
        ];

        if self.console_enabled() {
            descriptors.push(TransportDescriptor {
                kind: SinkKind::Console,
                min_level,
                file: None,
            });
        }

        let fault_retention = parse_retention(&self.fault_max_files)?;
        descriptors.push(TransportDescriptor {
            kind: SinkKind::Exception,
            min_level: LogLevel::Silly,
            file: Some(file_sink("exceptions", fault_retention)),
        });
        descriptors.push(TransportDescriptor {
            kind: SinkKind::Rejection,
            min_level: LogLevel::Silly,
            file: Some(file_sink("rejections", fault_retention)),
        });

        Ok(descriptors)
    }
}

/// Parse a size such as `20m`, `512k`, `1g` or a plain byte count
pub fn parse_size(value: &str) -> Result<u64> {
    let trimmed = value.trim().to_ascii_lowercase();
    let (digits, multiplier) = match trimmed.chars().last() {
        Some('k') => (&trimmed[..trimmed.len() - 1], 1024),
        Some('m') => (&trimmed[..trimmed.len() - 1], 1024 * 1024),
        Some('g') => (&trimmed[..trimmed.len() - 1], 1024 * 1024 * 1024),
        _ => (trimmed.as_str(), 1),
    };

    match digits.trim().parse::<u64>() {
        Ok(n) if n > 0 => n.checked_mul(multiplier).ok_or_else(|| {
            LoggerError::config("max_size", format!("'{}' is too large", value))
        }),
        _ => Err(LoggerError::config(
            "max_size",
            format!("'{}' is not a size like 20m, 512k or 1048576", value),
        )),
    }
}

/// Parse retention: `14d` keeps 14 days, a plain `10` keeps 10 archives
pub fn parse_retention(value: &str) -> Result<Retention> {
    let trimmed = value.trim().to_ascii_lowercase();
    let invalid = || {
        LoggerError::config(
            "max_files",
            format!("'{}' is not a retention like 14d or 10", value),
        )
    };

    if let Some(days) = trimmed.strip_suffix('d') {
        let days: u64 = days.trim().parse().map_err(|_| invalid())?;
        if days == 0 {
            return Err(invalid());
        }
        return Ok(Retention::days(days));
    }

    let count: usize = trimmed.parse().map_err(|_| invalid())?;
    if count == 0 {
        return Err(invalid());
    }
    Ok(Retention::MaxCount(count))
}

/// Environment values like `LOG_MAX_FILES=10` arrive as numbers
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        String(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::String(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}
