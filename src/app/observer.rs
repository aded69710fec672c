//! Run progress reporting.
//!
//! The pipeline never logs directly; it reports through a [`RunObserver`] so
//! callers (and tests) decide where messages go.

/// Sink for pipeline progress and warnings.
pub trait RunObserver {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
}

/// Forwards to the `log` facade, tagging every line with a run id.
#[derive(Debug, Clone)]
pub struct LogObserver {
    run_id: String,
}

impl LogObserver {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self { run_id: run_id.into() }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

impl RunObserver for LogObserver {
    fn info(&self, message: &str) {
        log::info!("[{}] {message}", self.run_id);
    }

    fn warn(&self, message: &str) {
        log::warn!("[{}] {message}", self.run_id);
    }
}
