//! User-facing reporting
//!
//! Fetch and session code never print directly; they talk to a [`Reporter`]
//! so the same logic runs behind a progress bar, in tests, or silently.

/// Sink for notices and fetch progress
pub trait Reporter: Send + Sync {
    /// Informational message for the operator
    fn notice(&self, message: &str);

    /// Something went wrong but the run continues
    fn warning(&self, message: &str);

    /// Fetching begins over a pool of `pool_size` messages
    fn fetch_started(&self, _pool_size: usize, _target: usize) {}

    /// A new batch of `batch_size` messages is about to be retrieved
    fn batch_started(&self, _batch_size: usize) {}

    /// One message was retrieved and filtered (whatever the verdict)
    fn message_processed(&self, _accepted_so_far: usize) {}

    fn fetch_finished(&self, _accepted: usize) {}
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn notice(&self, _message: &str) {}

    fn warning(&self, _message: &str) {}
}
