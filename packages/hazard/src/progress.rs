//! Progress hooks for [`crate::aggregate_historical_means`].
//!
//! Global historical runs read dozens of files. The aggregation loop reports
//! one unit per file through [`ProgressCallback`]; the binary draws a bar,
//! library callers and tests pass [`NullProgress`].

/// Receiver of per-file progress from a batch job.
pub trait ProgressCallback: Send + Sync {
    /// Number of files the job will process.
    fn set_total(&self, total: u64);

    /// `delta` more files are done.
    fn inc(&self, delta: u64);

    /// Name of the file now being read.
    fn set_message(&self, msg: String);

    /// The job ended; `msg` summarizes the outcome.
    fn finish(&self, msg: String);
}

/// Discards every report.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}
