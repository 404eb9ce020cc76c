//! Overflow policies for the async routing queue
//!
//! When the queue between log callers and the router worker is full, these
//! policies decide what happens to non-error records. Error records are never
//! dropped: they are written synchronously instead.

use std::fmt;
use std::time::Duration;

/// Policy for handling queue overflow in async routing
///
/// # Example
///
/// ```
/// use structured_logger::OverflowPolicy;
/// use std::time::Duration;
///
/// let policy = OverflowPolicy::default();
/// assert_eq!(policy, OverflowPolicy::AlertAndDrop);
///
/// let policy = OverflowPolicy::BlockWithTimeout(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the record, count it, and alert on stderr periodically
    #[default]
    AlertAndDrop,

    /// Block the caller until space is available
    Block,

    /// Block for at most the given duration, then drop
    BlockWithTimeout(Duration),
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::AlertAndDrop => write!(f, "AlertAndDrop"),
            OverflowPolicy::Block => write!(f, "Block"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
        }
    }
}
