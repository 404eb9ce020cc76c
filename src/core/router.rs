//! Transport router: fans records out to sinks
//!
//! Regular records go to the general, error and console transports whose
//! minimum level they satisfy. Fault records (uncaught panics, unhandled
//! background failures) go to the matching fault transport and the console.
//!
//! In async mode a single named worker thread owns every transport, so each
//! file has exactly one writer and rotation never races a write. Callers only
//! enqueue and return. In sync mode delivery happens inline under a mutex.

use super::{
    appender::Appender,
    error::{LoggerError, Result},
    log_level::LogLevel,
    metrics::LoggerMetrics,
    output_format::OutputFormat,
    overflow_policy::OverflowPolicy,
    record::LogRecord,
};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use std::cell::Cell;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default timeout for draining the queue when the router is dropped
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for `flush`
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Name of the router worker thread
pub const WORKER_THREAD_NAME: &str = "log-router";

const BATCH_SIZE: usize = 50;

thread_local! {
    static IN_DELIVERY: Cell<bool> = const { Cell::new(false) };
}

/// True while the current thread is writing to sinks.
///
/// Used by the panic hook to avoid re-entering the router from inside a sink.
pub(crate) fn delivering_on_current_thread() -> bool {
    IN_DELIVERY.with(Cell::get) || thread::current().name() == Some(WORKER_THREAD_NAME)
}

/// The closed set of sink roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    /// All levels, rotated and compressed
    General,
    /// Error level only, longer retention
    Error,
    /// Human-readable terminal output
    Console,
    /// Uncaught panics
    Exception,
    /// Failures of detached background work nobody awaited
    Rejection,
}

impl SinkKind {
    fn accepts(&self, route: Route) -> bool {
        match (self, route) {
            (SinkKind::Console, _) => true,
            (SinkKind::General | SinkKind::Error, Route::Regular) => true,
            (SinkKind::Exception, Route::Fault(FaultKind::UncaughtException)) => true,
            (SinkKind::Rejection, Route::Fault(FaultKind::UnhandledRejection)) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::General => "general",
            SinkKind::Error => "error",
            SinkKind::Console => "console",
            SinkKind::Exception => "exception",
            SinkKind::Rejection => "rejection",
        }
    }
}

/// Process-level faults captured outside explicit log calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    UncaughtException,
    UnhandledRejection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    Regular,
    Fault(FaultKind),
}

/// A sink together with its role and minimum level
pub struct Transport {
    kind: SinkKind,
    min_level: LogLevel,
    appender: Box<dyn Appender>,
}

impl Transport {
    pub fn new<A: Appender + 'static>(kind: SinkKind, min_level: LogLevel, appender: A) -> Self {
        Self::boxed(kind, min_level, Box::new(appender))
    }

    pub fn boxed(kind: SinkKind, min_level: LogLevel, appender: Box<dyn Appender>) -> Self {
        Self {
            kind,
            min_level,
            appender,
        }
    }

    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    fn selects(&self, record: &LogRecord, route: Route) -> bool {
        self.kind.accepts(route) && record.level() >= self.min_level
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("kind", &self.kind)
            .field("min_level", &self.min_level)
            .field("appender", &self.appender.name())
            .finish()
    }
}

enum Command {
    Deliver(Arc<LogRecord>, Route),
    Flush(Sender<()>),
    Shutdown,
}

type SharedTransports = Arc<Mutex<Vec<Transport>>>;

pub struct TransportRouter {
    transports: SharedTransports,
    sender: Option<Sender<Command>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    metrics: Arc<LoggerMetrics>,
    overflow_policy: OverflowPolicy,
}

impl TransportRouter {
    /// Create a router that delivers synchronously on the calling thread
    pub fn new(transports: Vec<Transport>) -> Self {
        Self {
            transports: Arc::new(Mutex::new(transports)),
            sender: None,
            worker: Mutex::new(None),
            metrics: Arc::new(LoggerMetrics::new()),
            overflow_policy: OverflowPolicy::default(),
        }
    }

    /// Create a router backed by a bounded queue and a worker thread
    pub fn with_async(
        transports: Vec<Transport>,
        buffer_size: usize,
        overflow_policy: OverflowPolicy,
    ) -> Result<Self> {
        let (sender, receiver) = bounded(buffer_size.max(1));
        let transports: SharedTransports = Arc::new(Mutex::new(transports));
        let metrics = Arc::new(LoggerMetrics::new());

        let worker_transports = Arc::clone(&transports);
        let worker_metrics = Arc::clone(&metrics);
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || Self::run_worker(receiver, worker_transports, worker_metrics))
            .map_err(|e| {
                LoggerError::io_operation("spawning router worker", "thread spawn failed", e)
            })?;

        Ok(Self {
            transports,
            sender: Some(sender),
            worker: Mutex::new(Some(handle)),
            metrics,
            overflow_policy,
        })
    }

    fn run_worker(
        receiver: Receiver<Command>,
        transports: SharedTransports,
        metrics: Arc<LoggerMetrics>,
    ) {
        let mut batch: Vec<(Arc<LogRecord>, Route)> = Vec::with_capacity(BATCH_SIZE);

        loop {
            let command = match receiver.recv() {
                Ok(command) => command,
                Err(_) => {
                    Self::process_batch(&transports, &mut batch, &metrics);
                    break;
                }
            };

            match command {
                Command::Deliver(record, route) => batch.push((record, route)),
                Command::Flush(ack) => {
                    Self::process_batch(&transports, &mut batch, &metrics);
                    let _ = ack.send(());
                    continue;
                }
                Command::Shutdown => {
                    Self::process_batch(&transports, &mut batch, &metrics);
                    break;
                }
            }

            // Collect whatever else is immediately available
            let mut stop = false;
            while batch.len() < BATCH_SIZE {
                match receiver.try_recv() {
                    Ok(Command::Deliver(record, route)) => batch.push((record, route)),
                    Ok(Command::Flush(ack)) => {
                        Self::process_batch(&transports, &mut batch, &metrics);
                        let _ = ack.send(());
                    }
                    Ok(Command::Shutdown) => {
                        stop = true;
                        break;
                    }
                    Err(_) => break,
                }
            }

            Self::process_batch(&transports, &mut batch, &metrics);
            if stop {
                break;
            }
        }
    }

    /// Deliver a batch and flush every transport afterwards
    fn process_batch(
        transports: &SharedTransports,
        batch: &mut Vec<(Arc<LogRecord>, Route)>,
        metrics: &LoggerMetrics,
    ) {
        let mut guard = transports.lock();
        for (record, route) in batch.drain(..) {
            Self::deliver(&mut guard, &record, route, metrics);
        }
        Self::flush_all(&mut guard, metrics);
    }

    /// Write one record to every selected transport
    ///
    /// Each append is isolated: an error or panic in one sink is counted and
    /// reported, and the remaining sinks still receive the record.
    fn deliver(
        transports: &mut [Transport],
        record: &LogRecord,
        route: Route,
        metrics: &LoggerMetrics,
    ) {
        IN_DELIVERY.with(|flag| flag.set(true));

        let mut selected = 0usize;
        let mut failed = 0usize;
        for transport in transports.iter_mut().filter(|t| t.selects(record, route)) {
            selected += 1;
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                transport.appender.append(record)
            }));

            let failure = match result {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(panic_info) => Some(format!("panicked: {}", panic_message(&panic_info))),
            };

            if let Some(reason) = failure {
                failed += 1;
                Self::report_sink_failure(transport, &reason, Some(record), metrics);
            }
        }

        IN_DELIVERY.with(|flag| flag.set(false));

        if selected > 0 && failed == selected {
            metrics.record_dropped();
        } else {
            metrics.record_logged();
        }
    }

    fn flush_all(transports: &mut [Transport], metrics: &LoggerMetrics) {
        for transport in transports.iter_mut() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                transport.appender.flush()
            }));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    Self::report_sink_failure(transport, &format!("flush: {}", e), None, metrics)
                }
                Err(panic_info) => Self::report_sink_failure(
                    transport,
                    &format!("flush panicked: {}", panic_message(&panic_info)),
                    None,
                    metrics,
                ),
            }
        }
    }

    /// Count a failure and fall back to stderr on the first and every 1000th
    fn report_sink_failure(
        transport: &Transport,
        reason: &str,
        record: Option<&LogRecord>,
        metrics: &LoggerMetrics,
    ) {
        let previous = metrics.record_sink_failure();
        if previous == 0 || (previous + 1) % 1000 == 0 {
            eprintln!(
                "[LOGGER ERROR] {} sink '{}' failed ({} failures so far): {}",
                transport.kind.as_str(),
                transport.appender.name(),
                previous + 1,
                reason
            );
            if let Some(record) = record {
                eprintln!("{}", OutputFormat::Json.format(record, false));
            }
        }
    }

    pub fn add_transport(&self, transport: Transport) {
        self.transports.lock().push(transport);
    }

    pub fn transport_kinds(&self) -> Vec<SinkKind> {
        self.transports.lock().iter().map(Transport::kind).collect()
    }

    pub fn is_async(&self) -> bool {
        self.sender.is_some()
    }

    /// Route a regular record
    pub fn route(&self, record: LogRecord) {
        self.dispatch(Arc::new(record), Route::Regular);
    }

    /// Route a record captured by a process-level fault handler
    pub fn route_fault(&self, kind: FaultKind, record: LogRecord) {
        self.dispatch(Arc::new(record), Route::Fault(kind));
    }

    fn dispatch(&self, record: Arc<LogRecord>, route: Route) {
        let Some(sender) = &self.sender else {
            self.deliver_now(&record, route);
            return;
        };

        match sender.try_send(Command::Deliver(record, route)) {
            Ok(()) => {}
            Err(TrySendError::Full(Command::Deliver(record, route))) => {
                self.handle_overflow(sender, record, route)
            }
            // Worker has stopped: write inline so nothing is lost after shutdown
            Err(TrySendError::Disconnected(Command::Deliver(record, route))) => {
                self.deliver_now(&record, route)
            }
            Err(_) => {}
        }
    }

    fn deliver_now(&self, record: &LogRecord, route: Route) {
        let mut transports = self.transports.lock();
        Self::deliver(&mut transports, record, route, &self.metrics);
    }

    fn handle_overflow(&self, sender: &Sender<Command>, record: Arc<LogRecord>, route: Route) {
        self.metrics.record_queue_full();

        if record.level().is_critical() {
            self.metrics.record_critical_preserved();
            self.deliver_now(&record, route);
            return;
        }

        match self.overflow_policy {
            OverflowPolicy::AlertAndDrop => self.alert_and_drop(),
            OverflowPolicy::Block => {
                self.metrics.record_block();
                if let Err(e) = sender.send(Command::Deliver(record, route)) {
                    if let Command::Deliver(record, route) = e.into_inner() {
                        self.deliver_now(&record, route);
                    }
                }
            }
            OverflowPolicy::BlockWithTimeout(timeout) => {
                self.metrics.record_block();
                match sender.send_timeout(Command::Deliver(record, route), timeout) {
                    Ok(()) => {}
                    Err(SendTimeoutError::Timeout(_)) => self.alert_and_drop(),
                    Err(SendTimeoutError::Disconnected(Command::Deliver(record, route))) => {
                        self.deliver_now(&record, route)
                    }
                    Err(SendTimeoutError::Disconnected(_)) => {}
                }
            }
        }
    }

    fn alert_and_drop(&self) {
        let dropped_count = self.metrics.record_dropped();

        if dropped_count == 0 || (dropped_count + 1) % 1000 == 0 {
            eprintln!(
                "[LOGGER WARNING] Queue full, {} records dropped. \
                 Consider increasing the queue capacity or using a blocking overflow policy.",
                dropped_count + 1
            );
        }
    }

    /// Wait until every record queued so far has been written and flushed
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        if let Some(sender) = &self.sender {
            if self.worker.lock().is_some() {
                let (ack_tx, ack_rx) = bounded(1);
                let deadline = Instant::now() + timeout;
                sender
                    .send_timeout(Command::Flush(ack_tx), timeout)
                    .map_err(|_| LoggerError::RouterStopped)?;
                let remaining = deadline.saturating_duration_since(Instant::now());
                return ack_rx
                    .recv_timeout(remaining)
                    .map_err(|_| LoggerError::other("Timed out waiting for log flush"));
            }
        }

        let mut transports = self.transports.lock();
        let mut first_error = None;
        for transport in transports.iter_mut() {
            if let Err(e) = transport.appender.flush() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Drain the queue, stop the worker and flush every sink
    ///
    /// Returns `true` if everything completed within `timeout`. Records routed
    /// after shutdown are written synchronously.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let Some(handle) = self.worker.lock().take() else {
            return self.flush(timeout).is_ok();
        };

        let start = Instant::now();
        if let Some(sender) = &self.sender {
            if sender.send_timeout(Command::Shutdown, timeout).is_err() {
                eprintln!("[LOGGER WARNING] Router queue did not accept shutdown request in time.");
                return false;
            }
        }

        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    eprintln!("[LOGGER ERROR] Router worker panicked during shutdown: {:?}", e);
                    return false;
                }
                break;
            }

            if start.elapsed() >= timeout {
                eprintln!(
                    "[LOGGER WARNING] Router worker did not finish within {:?}. \
                     Some records may be lost.",
                    timeout
                );
                return false;
            }

            thread::sleep(Duration::from_millis(10));
        }

        let mut transports = self.transports.lock();
        Self::flush_all(&mut transports, &self.metrics);
        true
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }
}

impl Drop for TransportRouter {
    fn drop(&mut self) {
        if self.worker.lock().is_some() {
            self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
        } else {
            let mut transports = self.transports.lock();
            Self::flush_all(&mut transports, &self.metrics);
        }

        let dropped = self.metrics.dropped_count();
        if dropped > 0 {
            eprintln!(
                "[LOGGER WARNING] Router shutting down with {} dropped records (drop rate: {:.2}%)",
                dropped,
                self.metrics.drop_rate()
            );
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
