//! Rotating file appender with dated segments, compression and retention
//!
//! Output is split into segments named after the base path:
//! `application-2025-01-08.log`, then `application-2025-01-08.1.log` when the
//! size cap is hit within a day. Strategies without a date basis use
//! `application.log`, `application.1.log`, ... A stable alias
//! (`application-current.log`) always points at the active segment.

use crate::core::appender::Appender;
use crate::core::error::{LoggerError, Result};
use crate::core::output_format::OutputFormat;
use crate::core::record::LogRecord;
use chrono::{Local, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_LEN: usize = 10;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Rotation strategy defining when to start a new segment
///
/// # Examples
///
/// ```
/// use structured_logger::appenders::RotationStrategy;
///
/// // New segment when the active one exceeds 20 MiB
/// let size_strategy = RotationStrategy::Size { max_bytes: 20 * 1024 * 1024 };
///
/// // New segment at each date boundary or at 20 MiB, whichever comes first
/// let hybrid_strategy = RotationStrategy::DailyOrSize { max_bytes: 20 * 1024 * 1024 };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStrategy {
    /// Rotate when the active segment reaches `max_bytes`
    Size { max_bytes: u64 },

    /// Rotate at each local date boundary
    Daily,

    /// Rotate on a date boundary or the size cap, whichever comes first
    DailyOrSize { max_bytes: u64 },

    /// No rotation (useful for testing or when external rotation is used)
    Never,
}

impl Default for RotationStrategy {
    fn default() -> Self {
        RotationStrategy::DailyOrSize {
            max_bytes: 20 * 1024 * 1024,
        }
    }
}

impl RotationStrategy {
    fn uses_date(&self) -> bool {
        matches!(
            self,
            RotationStrategy::Daily | RotationStrategy::DailyOrSize { .. }
        )
    }

    fn max_bytes(&self) -> Option<u64> {
        match self {
            RotationStrategy::Size { max_bytes } | RotationStrategy::DailyOrSize { max_bytes } => {
                Some(*max_bytes)
            }
            _ => None,
        }
    }
}

/// How long archived segments are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Delete archives older than the given age
    MaxAge(Duration),

    /// Keep only the newest `n` archives (the active segment is not counted)
    MaxCount(usize),

    Unlimited,
}

impl Retention {
    pub fn days(days: u64) -> Self {
        Retention::MaxAge(Duration::from_secs(days * SECONDS_PER_DAY))
    }
}

impl Default for Retention {
    fn default() -> Self {
        Retention::days(14)
    }
}

/// Configuration for rotating file appender
///
/// # Examples
///
/// ```
/// use structured_logger::appenders::{Retention, RotationPolicy, RotationStrategy};
///
/// let policy = RotationPolicy::new()
///     .with_strategy(RotationStrategy::DailyOrSize { max_bytes: 20 * 1024 * 1024 })
///     .with_retention(Retention::days(14))
///     .with_compression(true);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    pub strategy: RotationStrategy,
    pub retention: Retention,
    /// Gzip closed segments
    pub compress: bool,
    /// Maintain the `<stem>-current.<ext>` alias
    pub alias: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            strategy: RotationStrategy::default(),
            retention: Retention::default(),
            compress: false,
            alias: true,
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_strategy(mut self, strategy: RotationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_alias(mut self, enabled: bool) -> Self {
        self.alias = enabled;
        self
    }
}

/// A file in the log directory that belongs to this appender
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    path: PathBuf,
    date: Option<NaiveDate>,
    index: u32,
    compressed: bool,
}

/// Rotating file appender writing one machine-form record per line
///
/// # Examples
///
/// ```no_run
/// use structured_logger::appenders::{Retention, RotatingFileAppender, RotationPolicy};
///
/// let policy = RotationPolicy::new()
///     .with_retention(Retention::days(30))
///     .with_compression(true);
/// let appender = RotatingFileAppender::with_policy("logs/error.log", policy).unwrap();
/// ```
pub struct RotatingFileAppender {
    name: String,
    dir: PathBuf,
    stem: String,
    ext: String,
    policy: RotationPolicy,
    format: OutputFormat,
    writer: Option<BufWriter<File>>,
    active_path: PathBuf,
    active_date: Option<NaiveDate>,
    active_index: u32,
    current_size: u64,
}

impl RotatingFileAppender {
    /// Create a rotating file appender with the default policy
    ///
    /// # Errors
    ///
    /// Returns error if the directory or segment cannot be created
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_policy(path, RotationPolicy::default())
    }

    /// Create a rotating file appender with a custom policy
    ///
    /// Resumes the newest existing segment for today, refreshes the alias and
    /// runs retention housekeeping once.
    ///
    /// # Errors
    ///
    /// Returns error if the directory or segment cannot be created
    pub fn with_policy<P: AsRef<Path>>(path: P, policy: RotationPolicy) -> Result<Self> {
        let base_path = path.as_ref();
        let dir = match base_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stem = base_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                LoggerError::file_appender(
                    base_path.display().to_string(),
                    "Base path has no usable file name",
                )
            })?
            .to_string();
        let ext = base_path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("log")
            .to_string();

        fs::create_dir_all(&dir).map_err(|e| {
            LoggerError::io_operation(
                "create log directory",
                format!("Failed to create directory '{}'", dir.display()),
                e,
            )
        })?;

        let mut appender = Self {
            name: format!("RotatingFileAppender({})", stem),
            dir,
            stem,
            ext,
            policy,
            format: OutputFormat::Json,
            writer: None,
            active_path: PathBuf::new(),
            active_date: None,
            active_index: 0,
            current_size: 0,
        };

        let date = appender.policy.strategy.uses_date().then(today);
        let index = appender
            .scan_segments()
            .into_iter()
            .filter(|s| !s.compressed && s.date == date)
            .map(|s| s.index)
            .max()
            .unwrap_or(0);

        appender.open_segment(date, index)?;
        appender.refresh_alias();
        appender.run_housekeeping();
        Ok(appender)
    }

    /// Set the output format (machine form by default)
    #[must_use]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Path of the segment currently being written
    #[must_use]
    pub fn active_path(&self) -> &Path {
        &self.active_path
    }

    /// Path of the stable alias, when enabled
    #[must_use]
    pub fn alias_path(&self) -> Option<PathBuf> {
        self.policy
            .alias
            .then(|| self.dir.join(format!("{}-current.{}", self.stem, self.ext)))
    }

    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    fn segment_file_name(&self, date: Option<NaiveDate>, index: u32) -> String {
        let mut name = self.stem.clone();
        if let Some(date) = date {
            name.push('-');
            name.push_str(&date.format(DATE_FORMAT).to_string());
        }
        if index > 0 {
            name.push_str(&format!(".{}", index));
        }
        name.push('.');
        name.push_str(&self.ext);
        name
    }

    /// Parse a directory entry name back into a segment of this appender
    fn parse_segment(&self, file_name: &str) -> Option<(Option<NaiveDate>, u32, bool)> {
        let (name, compressed) = match file_name.strip_suffix(".gz") {
            Some(name) => (name, true),
            None => (file_name, false),
        };
        let rest = name
            .strip_suffix(&format!(".{}", self.ext))?
            .strip_prefix(&self.stem)?;

        let (date, rest) = if self.policy.strategy.uses_date() {
            let rest = rest.strip_prefix('-')?;
            let date_part = rest.get(..DATE_LEN)?;
            let date = NaiveDate::parse_from_str(date_part, DATE_FORMAT).ok()?;
            (Some(date), &rest[DATE_LEN..])
        } else {
            (None, rest)
        };

        let index = if rest.is_empty() {
            0
        } else {
            let digits = rest.strip_prefix('.')?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse().ok()?
        };

        Some((date, index, compressed))
    }

    fn scan_segments(&self) -> Vec<Segment> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let file_name = entry.file_name();
                let file_name = file_name.to_str()?;
                let (date, index, compressed) = self.parse_segment(file_name)?;
                Some(Segment {
                    path: entry.path(),
                    date,
                    index,
                    compressed,
                })
            })
            .collect()
    }

    fn open_segment(&mut self, date: Option<NaiveDate>, index: u32) -> Result<()> {
        let path = self.dir.join(self.segment_file_name(date, index));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                LoggerError::file_appender(
                    path.display().to_string(),
                    format!("Failed to open: {}", e),
                )
            })?;

        let current_size = file
            .metadata()
            .map_err(|e| {
                LoggerError::file_appender(
                    path.display().to_string(),
                    format!("Cannot access file metadata: {}", e),
                )
            })?
            .len();

        self.writer = Some(BufWriter::new(file));
        self.active_path = path;
        self.active_date = date;
        self.active_index = index;
        self.current_size = current_size;
        Ok(())
    }

    fn should_rotate(&self, today: NaiveDate) -> bool {
        let size_exceeded = self
            .policy
            .strategy
            .max_bytes()
            .is_some_and(|max| self.current_size > 0 && self.current_size >= max);
        let date_changed =
            self.policy.strategy.uses_date() && self.active_date != Some(today);
        size_exceeded || date_changed
    }

    /// Close the active segment and switch to the next one
    fn rotate(&mut self, today: NaiveDate) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.active_path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        let closed = self.active_path.clone();
        let (date, mut index) = if self.policy.strategy.uses_date() && self.active_date != Some(today)
        {
            (Some(today), 0)
        } else {
            (self.active_date, self.active_index + 1)
        };

        // Never reopen a name that is already taken by an archive
        loop {
            let candidate = self.dir.join(self.segment_file_name(date, index));
            let archived = gz_path(&candidate);
            if !candidate.exists() && !archived.exists() {
                break;
            }
            index += 1;
        }

        self.open_segment(date, index)?;

        if self.policy.compress {
            if let Err(e) = compress_file(&closed) {
                eprintln!(
                    "[LOGGER WARNING] Failed to compress rotated segment {}: {}",
                    closed.display(),
                    e
                );
            }
        }

        self.refresh_alias();
        self.run_housekeeping();
        Ok(())
    }

    fn maybe_rotate(&mut self, today: NaiveDate) -> Result<()> {
        if !self.should_rotate(today) {
            return Ok(());
        }

        if let Err(e) = self.rotate(today) {
            // Keep writing to the current segment rather than losing records
            eprintln!(
                "[LOGGER WARNING] Log rotation failed: {}. Continuing with current file.",
                e
            );

            if self.writer.is_none() {
                let (date, index) = (self.active_date, self.active_index);
                self.open_segment(date, index)?;
            }

            // Prevent a rotation attempt on every write; date stays as-is
            self.current_size = 0;
            if self.policy.strategy.uses_date() {
                self.active_date = Some(today);
            }
        }
        Ok(())
    }

    /// Point the alias at the active segment
    ///
    /// The link is created under a temporary name and renamed over the alias so
    /// readers never observe a missing alias.
    fn refresh_alias(&self) {
        let Some(alias) = self.alias_path() else {
            return;
        };
        let Some(alias_name) = alias.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        let temp = self.dir.join(format!(".{}.tmp", alias_name));
        let _ = fs::remove_file(&temp);

        if let Err(e) = link_alias(&self.active_path, &temp).and_then(|_| fs::rename(&temp, &alias))
        {
            let _ = fs::remove_file(&temp);
            eprintln!(
                "[LOGGER WARNING] Failed to refresh log alias {}: {}",
                alias.display(),
                e
            );
        }
    }

    /// Delete archived segments outside the retention window
    ///
    /// The active segment and the alias are never touched. Returns the number
    /// of files removed.
    pub fn purge(&self) -> Result<usize> {
        let mut archives: Vec<Segment> = self
            .scan_segments()
            .into_iter()
            .filter(|s| s.path != self.active_path)
            .collect();

        let expired: Vec<Segment> = match self.policy.retention {
            Retention::Unlimited => Vec::new(),
            Retention::MaxAge(max_age) => {
                let today = today();
                archives
                    .into_iter()
                    .filter(|s| segment_age(s, today).is_some_and(|age| age > max_age))
                    .collect()
            }
            Retention::MaxCount(keep) => {
                archives.sort_by(|a, b| (b.date, b.index).cmp(&(a.date, a.index)));
                archives.into_iter().skip(keep).collect()
            }
        };

        let mut removed = 0;
        let mut first_error = None;
        for segment in expired {
            match fs::remove_file(&segment.path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    first_error.get_or_insert_with(|| {
                        LoggerError::io_operation(
                            "purge log segments",
                            format!("Failed to remove {}", segment.path.display()),
                            e,
                        )
                    });
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    fn run_housekeeping(&self) {
        if let Err(e) = self.purge() {
            eprintln!("[LOGGER WARNING] Log retention housekeeping failed: {}", e);
        }
    }
}

impl Appender for RotatingFileAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&mut self, record: &LogRecord) -> Result<()> {
        self.maybe_rotate(today())?;

        let mut line = self.format.format(record, false);
        line.push('\n');

        match self.writer.as_mut() {
            Some(writer) => {
                writer.write_all(line.as_bytes()).map_err(|e| {
                    LoggerError::file_appender(
                        self.active_path.display().to_string(),
                        format!("Failed to write log record: {}", e),
                    )
                })?;
                self.current_size += line.len() as u64;
                Ok(())
            }
            None => Err(LoggerError::writer("Writer not initialized")),
        }
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().map_err(|e| {
                LoggerError::file_appender(
                    self.active_path.display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
        }
        Ok(())
    }
}

impl Drop for RotatingFileAppender {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn gz_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".gz");
    PathBuf::from(os)
}

/// Age of a segment: from its date when named with one, else from mtime
fn segment_age(segment: &Segment, today: NaiveDate) -> Option<Duration> {
    match segment.date {
        Some(date) => {
            let days = (today - date).num_days().max(0) as u64;
            Some(Duration::from_secs(days * SECONDS_PER_DAY))
        }
        None => fs::metadata(&segment.path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok()),
    }
}

#[cfg(unix)]
fn link_alias(target: &Path, link: &Path) -> std::io::Result<()> {
    // Relative target so the directory can be moved as a whole
    let target = target.file_name().map(Path::new).unwrap_or(target);
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn link_alias(target: &Path, link: &Path) -> std::io::Result<()> {
    fs::hard_link(target, link)
}

/// Gzip a closed segment
///
/// The archive is written to a temporary file and renamed into place; the
/// original is only removed once compression fully succeeded.
fn compress_file(path: &Path) -> Result<()> {
    use std::io::{BufReader, Read};

    let gz = gz_path(path);
    let mut temp_os = gz.as_os_str().to_owned();
    temp_os.push(".tmp");
    let temp_gz = PathBuf::from(temp_os);

    let input = File::open(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to open file for compression: {}", path.display()),
            e,
        )
    })?;
    let mut reader = BufReader::with_capacity(64 * 1024, input);

    let output = File::create(&temp_gz).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to create temporary compressed file: {}", temp_gz.display()),
            e,
        )
    })?;
    let mut encoder = flate2::write::GzEncoder::new(
        BufWriter::with_capacity(64 * 1024, output),
        flate2::Compression::default(),
    );

    let mut buffer = vec![0u8; 64 * 1024];
    let streamed: std::io::Result<()> = (|| {
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            encoder.write_all(&buffer[..bytes_read])?;
        }
        encoder.finish()?.flush()
    })();

    if let Err(e) = streamed {
        let _ = fs::remove_file(&temp_gz);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress {}", path.display()),
            e,
        ));
    }

    fs::rename(&temp_gz, &gz).map_err(|e| {
        let _ = fs::remove_file(&temp_gz);
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to rename compressed file to: {}", gz.display()),
            e,
        )
    })?;

    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compression succeeded but failed to remove original file {}: {}",
            path.display(),
            e
        );
    }

    Ok(())
}
