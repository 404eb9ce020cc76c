//! Log level definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a log record, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Silly = 0,
    Debug = 1,
    Verbose = 2,
    Http = 3,
    #[default]
    Info = 4,
    Warn = 5,
    Error = 6,
}

impl LogLevel {
    pub const ALL: [LogLevel; 7] = [
        LogLevel::Silly,
        LogLevel::Debug,
        LogLevel::Verbose,
        LogLevel::Http,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            LogLevel::Silly => "silly",
            LogLevel::Debug => "debug",
            LogLevel::Verbose => "verbose",
            LogLevel::Http => "http",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Levels that are subject to probabilistic sampling.
    #[inline]
    pub fn is_sampled_tier(&self) -> bool {
        matches!(self, LogLevel::Debug | LogLevel::Verbose)
    }

    /// Error and warn records are never sampled away.
    #[inline]
    pub fn bypasses_sampling(&self) -> bool {
        matches!(self, LogLevel::Error | LogLevel::Warn)
    }

    /// Records that must survive queue overflow.
    #[inline]
    pub fn is_critical(&self) -> bool {
        *self == LogLevel::Error
    }

    #[cfg(feature = "console")]
    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            LogLevel::Silly => BrightBlack,
            LogLevel::Debug => Blue,
            LogLevel::Verbose => Cyan,
            LogLevel::Http => Magenta,
            LogLevel::Info => Green,
            LogLevel::Warn => Yellow,
            LogLevel::Error => Red,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "silly" => Ok(LogLevel::Silly),
            "debug" => Ok(LogLevel::Debug),
            "verbose" => Ok(LogLevel::Verbose),
            "http" => Ok(LogLevel::Http),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(LogLevel::Error > LogLevel::Warn);
        assert!(LogLevel::Warn > LogLevel::Info);
        assert!(LogLevel::Info > LogLevel::Http);
        assert!(LogLevel::Http > LogLevel::Verbose);
        assert!(LogLevel::Verbose > LogLevel::Debug);
        assert!(LogLevel::Debug > LogLevel::Silly);
    }

    #[test]
    fn test_parse_levels() {
        assert_eq!("ERROR".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!(" http ".parse::<LogLevel>(), Ok(LogLevel::Http));
        assert!("fatal".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_sampling_tiers() {
        assert!(LogLevel::Debug.is_sampled_tier());
        assert!(LogLevel::Verbose.is_sampled_tier());
        assert!(!LogLevel::Silly.is_sampled_tier());
        assert!(!LogLevel::Info.is_sampled_tier());
        assert!(LogLevel::Warn.bypasses_sampling());
        assert!(LogLevel::Error.bypasses_sampling());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&LogLevel::Verbose).unwrap();
        assert_eq!(json, "\"verbose\"");
    }
}
