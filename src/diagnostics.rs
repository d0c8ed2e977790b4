//! Diagnostic sinks
//!
//! The cache reports human-readable progress (load, persist) to an optional
//! sink. Delivery is best effort: a sink must not fail the operation that
//! reported to it.

use std::sync::{Arc, Mutex};

/// Receiver for informational cache messages
pub trait DiagnosticSink: Send + Sync {
    fn info(&self, message: &str);
}

/// Forwards messages to `tracing` at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn info(&self, message: &str) {
        tracing::info!(target: "buildcache", "{}", message);
    }
}

/// Records messages in memory
///
/// Cloning shares the underlying buffer, so a clone handed to the cache can be
/// inspected through the original.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    messages: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the messages received so far
    pub fn messages(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(messages) => messages.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DiagnosticSink for MemorySink {
    fn info(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}
