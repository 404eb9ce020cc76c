//! # Structured Logger
//!
//! Structured logging core: builds enriched, redacted records and routes them
//! to rotating file sinks and the console.
//!
//! ## Features
//!
//! - **Context propagation**: per-instance context, copied into independent child loggers
//! - **Redaction**: sensitive keys are replaced with `[REDACTED]` at any depth
//! - **Sampling**: probabilistic suppression of debug/verbose, never of warn/error
//! - **Multi-sink routing**: general, error, console, exception and rejection sinks
//!   with per-sink minimum levels, dated rotation, compression and retention
//! - **Asynchronous**: a bounded queue and a single writer thread per logger
//!
//! ## Example
//!
//! ```no_run
//! use structured_logger::prelude::*;
//! use structured_logger::DEFAULT_SHUTDOWN_TIMEOUT;
//!
//! let logger = Logger::from_config(&LoggingConfig::load().unwrap()).unwrap();
//! logger.install_fault_handlers();
//!
//! let request = logger.child(meta! { "requestId" => "r-1" });
//! request.start_trace(None);
//! request.warn_with("Validation failed", meta! { "path" => "/users", "method" => "POST" });
//!
//! // Drain queued records before exit
//! logger.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
//! ```

#[macro_use]
pub mod macros;

pub mod appenders;
pub mod core;

pub mod prelude {
    pub use crate::appenders::{
        ConsoleAppender, Retention, RotatingFileAppender, RotationPolicy, RotationStrategy,
    };
    pub use crate::core::{
        Appender, FieldValue, LogLevel, LogRecord, Logger, LoggerBuilder, LoggerError,
        LoggerMetrics, LoggingConfig, Metadata, OutputFormat, OverflowPolicy, Result,
        SamplingConfig, ServiceInfo, SinkKind,
    };
    pub use crate::meta;
}

pub use appenders::{ConsoleAppender, RotatingFileAppender};
pub use core::{
    generate_span_id, generate_trace_id, Appender, ErrorDetails, FaultKind, FieldValue, Fields,
    LogLevel, LogRecord, LogSampler, Logger, LoggerBuilder, LoggerContext, LoggerError,
    LoggerMetrics, LoggingConfig, Metadata, OutputFormat, OverflowPolicy, RecordBuilder, Result,
    SamplerMetrics, SamplingConfig, Sanitizer, ServiceInfo, SinkKind, Transport,
    TransportDescriptor, TransportRouter, DEFAULT_SHUTDOWN_TIMEOUT, REDACTED, SENSITIVE_KEYS,
};
