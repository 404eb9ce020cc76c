//! Appender trait for log output destinations

use super::{error::Result, record::LogRecord};

/// A durable destination for records. Each appender is owned by exactly one
/// transport and is only ever driven by one writer at a time.
pub trait Appender: Send {
    fn append(&mut self, record: &LogRecord) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn name(&self) -> &str;
}
