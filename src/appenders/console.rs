//! Console appender implementation

use crate::core::{Appender, LogLevel, LogRecord, OutputFormat, Result};
use std::io::{IsTerminal, Write};

/// Human-readable terminal sink
///
/// Error records go to stderr, everything else to stdout. Colors are enabled
/// only when stdout is a terminal unless set explicitly.
pub struct ConsoleAppender {
    use_colors: bool,
    output_format: OutputFormat,
}

impl ConsoleAppender {
    pub fn new() -> Self {
        Self {
            use_colors: std::io::stdout().is_terminal(),
            output_format: OutputFormat::Text,
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self {
            use_colors,
            output_format: OutputFormat::Text,
        }
    }

    /// Set the output format for this appender
    ///
    /// # Example
    ///
    /// ```
    /// use structured_logger::appenders::ConsoleAppender;
    /// use structured_logger::OutputFormat;
    ///
    /// let appender = ConsoleAppender::new()
    ///     .with_output_format(OutputFormat::Json);
    /// ```
    #[must_use]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn uses_colors(&self) -> bool {
        self.use_colors
    }
}

impl Default for ConsoleAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for ConsoleAppender {
    fn append(&mut self, record: &LogRecord) -> Result<()> {
        let output = self.output_format.format(record, self.use_colors);

        match record.level() {
            LogLevel::Error => writeln!(std::io::stderr().lock(), "{}", output)?,
            _ => writeln!(std::io::stdout().lock(), "{}", output)?,
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Fields, Metadata, RecordBuilder, ServiceInfo};

    #[test]
    fn test_console_append_both_streams() {
        let builder = RecordBuilder::new(ServiceInfo::default());
        let mut appender = ConsoleAppender::with_colors(false);
        assert!(!appender.uses_colors());

        for level in [LogLevel::Info, LogLevel::Error] {
            let record = builder.build(level, "console test", Metadata::new(), &Fields::new());
            appender.append(&record).unwrap();
        }
        appender.flush().unwrap();
    }
}
