//! Logging macros for ergonomic metadata and message formatting.
//!
//! `meta!` builds a [`Metadata`](crate::Metadata) inline; the leveled macros
//! format their message like `format!` and log it without metadata.
//!
//! # Examples
//!
//! ```
//! use structured_logger::prelude::*;
//! use structured_logger::info;
//!
//! let logger = Logger::builder().build().unwrap();
//!
//! // Basic logging
//! info!(logger, "Server started");
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//!
//! // Structured metadata
//! logger.info_with("User login", meta! { "userId" => 42, "method" => "sso" });
//! ```

/// Build a `Metadata` from `key => value` pairs.
///
/// Values may be anything convertible into a `FieldValue`, including a
/// nested `meta!`.
///
/// # Examples
///
/// ```
/// use structured_logger::{meta, FieldValue};
///
/// let metadata = meta! {
///     "path" => "/users",
///     "status" => 422,
///     "user" => meta! { "id" => "u1" },
/// };
/// assert_eq!(metadata.get("status"), Some(&FieldValue::Int(422)));
/// assert!(meta! {}.is_empty());
/// ```
#[macro_export]
macro_rules! meta {
    () => {
        $crate::Metadata::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut metadata = $crate::Metadata::new();
        $( metadata.add_field($key, $value); )+
        metadata
    }};
}

/// Log a message with automatic formatting.
///
/// # Examples
///
/// ```
/// # use structured_logger::prelude::*;
/// # let logger = Logger::builder().build().unwrap();
/// use structured_logger::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, format!($($arg)+), $crate::Metadata::new())
    };
}

/// Log a debug-level message.
///
/// # Examples
///
/// ```
/// # use structured_logger::prelude::*;
/// # let logger = Logger::builder().min_level(LogLevel::Debug).build().unwrap();
/// use structured_logger::debug;
/// debug!(logger, "Cache state: {} entries", 10);
/// ```
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log a verbose-level message.
#[macro_export]
macro_rules! verbose {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Verbose, $($arg)+)
    };
}

/// Log an info-level message.
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

/// Log a warn-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

/// Log an error-level message. Never sampled.
///
/// # Examples
///
/// ```
/// # use structured_logger::prelude::*;
/// # let logger = Logger::builder().build().unwrap();
/// use structured_logger::error;
/// error!(logger, "Failed to connect to {}:{}", "db.internal", 5432);
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $logger.error_with(format!($($arg)+), $crate::Metadata::new())
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{FieldValue, LogLevel, Logger};

    #[test]
    fn test_meta_macro() {
        let metadata = meta! { "a" => 1, "b" => "two", "c" => meta! { "d" => true } };
        assert_eq!(metadata.len(), 3);
        assert_eq!(metadata.get("b"), Some(&FieldValue::from("two")));
        assert!(metadata.get("c").unwrap().as_object().is_some());
    }

    #[test]
    fn test_leveled_macros() {
        let logger = Logger::builder().min_level(LogLevel::Silly).build().unwrap();

        debug!(logger, "Debug message");
        verbose!(logger, "Verbose message {}", 1);
        info!(logger, "Info message");
        warn!(logger, "Warn message: {}", "careful");
        error!(logger, "Error message: {}", 42);
        log!(logger, LogLevel::Http, "Http message");
    }
}
