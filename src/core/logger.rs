//! Logger facade
//!
//! A `Logger` pairs a shared core (minimum level, record builder, sampler and
//! transport router) with a context that belongs to that instance alone.
//! Deriving a child copies the context, so per-request loggers never clobber
//! each other or the process-wide instance.

use super::{
    config::LoggingConfig,
    context::{generate_span_id, generate_trace_id, LoggerContext},
    error::{LoggerError, Result},
    log_level::LogLevel,
    metadata::Metadata,
    metrics::LoggerMetrics,
    overflow_policy::OverflowPolicy,
    record::{ErrorDetails, LogRecord, RecordBuilder, ServiceInfo},
    router::{
        delivering_on_current_thread, panic_message, FaultKind, SinkKind, Transport,
        TransportRouter, DEFAULT_FLUSH_TIMEOUT,
    },
    sampling::{LogSampler, SamplerMetrics, SamplingConfig},
    sanitizer::Sanitizer,
    appender::Appender,
};
use chrono::Local;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// How long a panicking thread waits for its record to reach the sinks
pub const PANIC_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

static GLOBAL: OnceLock<Arc<Logger>> = OnceLock::new();

struct LoggerCore {
    min_level: LogLevel,
    builder: RecordBuilder,
    sampler: LogSampler,
    router: TransportRouter,
}

impl LoggerCore {
    fn fault_record(&self, message: &str, error: Metadata) -> LogRecord {
        self.builder.build(
            LogLevel::Error,
            message,
            Metadata::new().with_field("error", error),
            &Default::default(),
        )
    }
}

/// Structured logger with per-instance context
///
/// # Example
///
/// ```
/// use structured_logger::prelude::*;
///
/// let logger = Logger::builder()
///     .min_level(LogLevel::Debug)
///     .build()
///     .unwrap();
///
/// let request_logger = logger.child(meta! { "requestId" => "r-42" });
/// request_logger.start_trace(None);
/// request_logger.info_with("Request received", meta! { "path" => "/users" });
/// ```
pub struct Logger {
    core: Arc<LoggerCore>,
    context: LoggerContext,
}

impl Logger {
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Build the standard sink set from startup configuration
    ///
    /// Routing is asynchronous with a queue of `queue_capacity` records.
    pub fn from_config(config: &LoggingConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = Logger::builder()
            .min_level(config.min_level()?)
            .service(config.service_info())
            .sampling(config.sampling())
            .async_mode(config.queue_capacity);

        for descriptor in config.transports()? {
            builder = builder.transport_boxed(descriptor.build()?);
        }

        builder.build()
    }

    /// Load configuration from `logging.toml` and `LOG_*` variables, then build
    pub fn from_env() -> Result<Self> {
        Self::from_config(&LoggingConfig::load()?)
    }

    /// Install `logger` as the process-wide instance
    ///
    /// The global is never dropped, so nothing drains its queue on exit.
    /// Call [`Logger::shutdown`] before `main` returns:
    ///
    /// ```no_run
    /// use structured_logger::prelude::*;
    /// use structured_logger::DEFAULT_SHUTDOWN_TIMEOUT;
    ///
    /// let logger = Logger::init_global(Logger::from_env().unwrap()).unwrap();
    /// logger.info("Service starting");
    /// logger.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if a global logger was already installed.
    pub fn init_global(logger: Logger) -> Result<Arc<Logger>> {
        let logger = Arc::new(logger);
        GLOBAL
            .set(Arc::clone(&logger))
            .map_err(|_| LoggerError::other("Global logger already initialized"))?;
        Ok(logger)
    }

    pub fn global() -> Option<&'static Arc<Logger>> {
        GLOBAL.get()
    }

    pub fn min_level(&self) -> LogLevel {
        self.core.min_level
    }

    pub fn service(&self) -> &ServiceInfo {
        self.core.builder.service()
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.core.min_level
    }

    /// Build and route a record; sampling applies to debug and verbose
    pub fn log(&self, level: LogLevel, message: impl AsRef<str>, meta: impl Into<Metadata>) {
        if !self.is_enabled(level) || !self.core.sampler.should_log(level) {
            return;
        }
        self.emit(level, message.as_ref(), meta.into());
    }

    fn emit(&self, level: LogLevel, message: &str, meta: Metadata) {
        let record = self
            .core
            .builder
            .build(level, message, meta, &self.context.snapshot());
        self.core.router.route(record);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.error_with(message, Metadata::new());
    }

    /// Errors are never sampled
    pub fn error_with(&self, message: impl AsRef<str>, meta: impl Into<Metadata>) {
        if self.is_enabled(LogLevel::Error) {
            self.emit(LogLevel::Error, message.as_ref(), meta.into());
        }
    }

    /// Log an error value as `error: {name, message, stack, code?}` merged with `meta`
    pub fn error_from<E>(&self, message: impl AsRef<str>, err: &E, meta: impl Into<Metadata>)
    where
        E: std::error::Error + 'static,
    {
        if !self.is_enabled(LogLevel::Error) {
            return;
        }
        let mut meta = meta.into();
        meta.add_field("error", ErrorDetails::from_error(err).to_metadata());
        self.emit(LogLevel::Error, message.as_ref(), meta);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message, Metadata::new());
    }

    pub fn warn_with(&self, message: impl AsRef<str>, meta: impl Into<Metadata>) {
        self.log(LogLevel::Warn, message, meta);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message, Metadata::new());
    }

    pub fn info_with(&self, message: impl AsRef<str>, meta: impl Into<Metadata>) {
        self.log(LogLevel::Info, message, meta);
    }

    pub fn verbose(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Verbose, message, Metadata::new());
    }

    pub fn verbose_with(&self, message: impl AsRef<str>, meta: impl Into<Metadata>) {
        self.log(LogLevel::Verbose, message, meta);
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message, Metadata::new());
    }

    pub fn debug_with(&self, message: impl AsRef<str>, meta: impl Into<Metadata>) {
        self.log(LogLevel::Debug, message, meta);
    }

    /// HTTP access record: info level, `type=http`
    pub fn http(&self, message: impl AsRef<str>, meta: impl Into<Metadata>) {
        self.tagged(LogLevel::Info, "http", message.as_ref(), meta.into());
    }

    /// Database record: debug level, `type=database`
    pub fn db(&self, message: impl AsRef<str>, meta: impl Into<Metadata>) {
        self.tagged(LogLevel::Debug, "database", message.as_ref(), meta.into());
    }

    /// Timing record: info level, `type=performance`
    pub fn performance(&self, operation: &str, duration: Duration, meta: impl Into<Metadata>) {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        let mut meta = meta.into();
        meta.add_field("operation", operation);
        meta.add_field("duration", format!("{}ms", millis));
        meta.add_field("durationMs", millis);
        self.tagged(
            LogLevel::Info,
            "performance",
            &format!("Performance: {}", operation),
            meta,
        );
    }

    /// Audit trail record: info level, `type=audit` and its own `auditTimestamp`
    pub fn audit(&self, message: impl AsRef<str>, meta: impl Into<Metadata>) {
        let mut meta = meta.into();
        meta.add_field("auditTimestamp", Local::now());
        self.tagged(LogLevel::Info, "audit", message.as_ref(), meta);
    }

    fn tagged(&self, level: LogLevel, kind: &str, message: &str, mut meta: Metadata) {
        meta.add_field("type", kind);
        self.log(level, message, meta);
    }

    /// Shallow-merge fields into this instance's context
    pub fn set_context(&self, partial: impl Into<Metadata>) {
        self.context.set(partial.into());
    }

    pub fn clear_context(&self) {
        self.context.clear();
    }

    /// A copy of the current context
    pub fn get_context(&self) -> Metadata {
        Metadata::from(self.context.snapshot())
    }

    /// An independent logger whose context is `self ∪ additional`
    #[must_use]
    pub fn child(&self, additional: impl Into<Metadata>) -> Logger {
        Logger {
            core: Arc::clone(&self.core),
            context: self.context.derive(additional.into()),
        }
    }

    /// Store a trace id (given or fresh) and a fresh span id in the context
    pub fn start_trace(&self, existing_id: Option<&str>) -> String {
        self.context.start_trace(existing_id)
    }

    pub fn generate_trace_id() -> String {
        generate_trace_id()
    }

    pub fn generate_span_id() -> String {
        generate_span_id()
    }

    /// Wait until queued records have reached their sinks
    pub fn flush(&self) -> Result<()> {
        self.core.router.flush(DEFAULT_FLUSH_TIMEOUT)
    }

    /// Drain the queue and stop the router worker
    ///
    /// Returns `true` if everything was written within `timeout`. Later calls
    /// still log, synchronously.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.core.router.shutdown(timeout)
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        self.core.router.metrics()
    }

    pub fn sampler_metrics(&self) -> &SamplerMetrics {
        self.core.sampler.metrics()
    }

    pub fn sink_kinds(&self) -> Vec<SinkKind> {
        self.core.router.transport_kinds()
    }

    /// Record the failure of detached background work nobody awaited
    ///
    /// Goes to the rejection sink and the console.
    pub fn unhandled_rejection<E>(&self, err: &E)
    where
        E: std::error::Error + 'static,
    {
        let details = ErrorDetails::from_error(err);
        let record = self.core.fault_record(
            &format!("Unhandled rejection: {}", details.message),
            details.to_metadata(),
        );
        self.core
            .router
            .route_fault(FaultKind::UnhandledRejection, record);
    }

    /// Capture panics into the exception sink
    ///
    /// The previous hook still runs afterwards. Panics raised while a sink is
    /// being written are left to the previous hook only. The hook does not
    /// keep the logger alive: once the last `Logger` sharing this core is
    /// dropped, the queue drains and later panics skip the exception sink.
    pub fn install_fault_handlers(&self) {
        let core = Arc::downgrade(&self.core);
        let previous = std::panic::take_hook();

        std::panic::set_hook(Box::new(move |info| {
            let core = if delivering_on_current_thread() {
                None
            } else {
                core.upgrade()
            };
            if let Some(core) = core {
                let message = panic_message(info.payload());
                let mut error = Metadata::new()
                    .with_field("name", "panic")
                    .with_field("message", message.as_str())
                    .with_field(
                        "stack",
                        std::backtrace::Backtrace::force_capture().to_string(),
                    );
                if let Some(location) = info.location() {
                    error.add_field(
                        "location",
                        format!("{}:{}:{}", location.file(), location.line(), location.column()),
                    );
                }
                if let Some(thread) = std::thread::current().name() {
                    error.add_field("thread", thread);
                }

                let record = core.fault_record(&format!("Uncaught panic: {}", message), error);
                core.router.route_fault(FaultKind::UncaughtException, record);
                let _ = core.router.flush(PANIC_FLUSH_TIMEOUT);
            }
            previous(info);
        }));
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("min_level", &self.core.min_level)
            .field("service", self.core.builder.service())
            .field("context", &self.context)
            .finish()
    }
}

/// Builder for creating a Logger
///
/// # Example
/// ```
/// use structured_logger::prelude::*;
///
/// let logger = Logger::builder()
///     .min_level(LogLevel::Debug)
///     .service(ServiceInfo::new("api", "staging", "2.1.0"))
///     .transport(SinkKind::Console, LogLevel::Debug, ConsoleAppender::new())
///     .async_mode(1000)
///     .overflow_policy(OverflowPolicy::AlertAndDrop)
///     .build()
///     .unwrap();
/// ```
pub struct LoggerBuilder {
    min_level: LogLevel,
    service: ServiceInfo,
    transports: Vec<Transport>,
    async_buffer: Option<usize>,
    overflow_policy: OverflowPolicy,
    sampling: SamplingConfig,
    sanitizer: Sanitizer,
    context: Metadata,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            min_level: LogLevel::Info,
            service: ServiceInfo::default(),
            transports: Vec::new(),
            async_buffer: None,
            overflow_policy: OverflowPolicy::AlertAndDrop,
            sampling: SamplingConfig::disabled(),
            sanitizer: Sanitizer::new(),
            context: Metadata::new(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn service(mut self, service: ServiceInfo) -> Self {
        self.service = service;
        self
    }

    /// Add a sink with its role and minimum level
    #[must_use = "builder methods return a new value"]
    pub fn transport<A: Appender + 'static>(
        mut self,
        kind: SinkKind,
        min_level: LogLevel,
        appender: A,
    ) -> Self {
        self.transports.push(Transport::new(kind, min_level, appender));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn transport_boxed(mut self, transport: Transport) -> Self {
        self.transports.push(transport);
        self
    }

    /// Route through a bounded queue and a worker thread
    ///
    /// If not called, records are written on the calling thread.
    #[must_use = "builder methods return a new value"]
    pub fn async_mode(mut self, buffer_size: usize) -> Self {
        self.async_buffer = Some(buffer_size);
        self
    }

    /// Set the overflow policy for async routing (default `AlertAndDrop`)
    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Initial context of the root logger
    #[must_use = "builder methods return a new value"]
    pub fn context(mut self, context: impl Into<Metadata>) -> Self {
        self.context = context.into();
        self
    }

    pub fn build(self) -> Result<Logger> {
        let router = match self.async_buffer {
            Some(size) => TransportRouter::with_async(self.transports, size, self.overflow_policy)?,
            None => TransportRouter::new(self.transports),
        };

        let context = LoggerContext::new();
        context.set(self.context);

        Ok(Logger {
            core: Arc::new(LoggerCore {
                min_level: self.min_level,
                builder: RecordBuilder::new(self.service).with_sanitizer(self.sanitizer),
                sampler: LogSampler::new(self.sampling),
                router,
            }),
            context,
        })
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
