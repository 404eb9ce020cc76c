//! Core logger types and traits

pub mod appender;
pub mod config;
pub mod context;
pub mod error;
pub mod log_level;
pub mod logger;
pub mod metadata;
pub mod metrics;
pub mod output_format;
pub mod overflow_policy;
pub mod record;
pub mod router;
pub mod sampling;
pub mod sanitizer;

pub use appender::Appender;
pub use config::{parse_retention, parse_size, FileSinkSpec, LoggingConfig, TransportDescriptor};
pub use context::{generate_span_id, generate_trace_id, LoggerContext, SPAN_ID_KEY, TRACE_ID_KEY};
pub use error::{LoggerError, Result};
pub use log_level::LogLevel;
pub use logger::{Logger, LoggerBuilder};
pub use metadata::{FieldValue, Fields, Metadata};
pub use metrics::LoggerMetrics;
pub use output_format::OutputFormat;
pub use overflow_policy::OverflowPolicy;
pub use record::{ErrorDetails, LogRecord, RecordBuilder, ServiceInfo};
pub use router::{
    FaultKind, SinkKind, Transport, TransportRouter, DEFAULT_FLUSH_TIMEOUT,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use sampling::{LogSampler, SamplerMetrics, SamplingConfig};
pub use sanitizer::{Sanitizer, REDACTED, SENSITIVE_KEYS};
