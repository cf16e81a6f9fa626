//! Per-destination buffering and the flush policy.

use std::time::{Duration, Instant};

use anyhow::Result;

use crate::config::HandlerSettings;
use crate::transform::template::MeasurementRule;

use super::transport::Transport;

/// One named destination: a line buffer, its flush policy, and the transport
/// it flushes through.
///
/// Created once at startup and kept for the process lifetime; the dispatcher
/// is its only writer.
pub struct Handler {
    name: String,
    buffer: Vec<String>,
    last_flush: Instant,
    buffer_size: usize,
    buffer_max_age: Duration,
    proxy_mode: bool,
    rules: Vec<MeasurementRule>,
    transport: Box<dyn Transport>,
}

impl Handler {
    pub fn new(
        name: impl Into<String>,
        settings: &HandlerSettings,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            name: name.into(),
            buffer: Vec::new(),
            last_flush: Instant::now(),
            buffer_size: settings.buffer_size,
            buffer_max_age: settings.buffer_max_age,
            proxy_mode: settings.proxy_mode,
            rules: settings.measurement_rules.clone(),
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn proxy_mode(&self) -> bool {
        self.proxy_mode
    }

    pub fn rules(&self) -> &[MeasurementRule] {
        &self.rules
    }

    /// Lines currently awaiting flush.
    pub fn buffered(&self) -> &[String] {
        &self.buffer
    }

    /// Append one serialized line.
    pub fn push(&mut self, line: String) {
        self.buffer.push(line);
        tracing::debug!(
            handler = %self.name,
            buffered = self.buffer.len(),
            limit = self.buffer_size,
            "stored line in buffer",
        );
    }

    /// Whether the buffer must be flushed before accepting this event's
    /// lines: size limit reached, or the buffer is older than its max age.
    pub fn should_flush(&self) -> bool {
        self.buffer.len() >= self.buffer_size || self.last_flush.elapsed() >= self.buffer_max_age
    }

    /// Flush the buffer through the transport.
    ///
    /// The buffer is cleared and the age clock reset regardless of the
    /// transport outcome: delivery is at-most-once, a failed flush loses the
    /// batch. An empty buffer resets the clock without a transport call.
    pub fn flush(&mut self) -> Result<()> {
        let result = if self.buffer.is_empty() {
            Ok(())
        } else {
            tracing::debug!(
                handler = %self.name,
                lines = self.buffer.len(),
                "flushing buffer",
            );
            self.transport.send(&self.buffer.join("\n"))
        };

        self.buffer.clear();
        self.last_flush = Instant::now();

        result
    }
}
