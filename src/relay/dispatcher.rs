//! Per-event entry point: handler selection, flush triggering, and routing
//! through either the transformation pipeline or proxy pass-through.

use std::collections::HashMap;

use anyhow::Result;

use crate::config::Config;
use crate::event::Event;
use crate::transform;

use super::handler::Handler;
use super::transport::HttpTransport;

/// Per-event result reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Ok,
    Error,
}

impl EventOutcome {
    pub fn code(&self) -> u8 {
        match self {
            EventOutcome::Ok => 0,
            EventOutcome::Error => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Ok => "ok",
            EventOutcome::Error => "error",
        }
    }
}

/// Owns every handler and processes events one at a time.
///
/// The registry is created once at startup; events are handled
/// run-to-completion, so no handler is ever mutated concurrently. A host
/// dispatching from multiple threads must serialize access per handler.
pub struct Dispatcher {
    primary: String,
    handlers: HashMap<String, Handler>,
}

impl Dispatcher {
    /// Empty dispatcher with the given primary handler name.
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            handlers: HashMap::new(),
        }
    }

    /// Build the full registry from configuration, one HTTP transport per
    /// handler.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let mut dispatcher = Self::new(crate::config::PRIMARY_HANDLER);

        for (name, settings) in cfg.handler_settings() {
            let transport = HttpTransport::new(&settings)?;
            tracing::info!(
                handler = %name,
                url = %transport.url(),
                buffer_size = settings.buffer_size,
                buffer_max_age = ?settings.buffer_max_age,
                proxy_mode = settings.proxy_mode,
                "initialized handler",
            );
            dispatcher.insert(Handler::new(name, &settings, Box::new(transport)));
        }

        Ok(dispatcher)
    }

    pub fn insert(&mut self, handler: Handler) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    pub fn handler(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    /// First declared handler name known to the registry, else the primary.
    fn select(&self, event: &Event) -> String {
        event
            .check
            .handlers
            .iter()
            .find(|name| self.handlers.contains_key(name.as_str()))
            .cloned()
            .unwrap_or_else(|| self.primary.clone())
    }

    /// Process one event.
    ///
    /// The flush trigger is evaluated once, before the event's lines are
    /// produced; a transport failure during that flush is the only per-event
    /// error. Line-level problems are logged and swallowed.
    pub fn run(&mut self, event: &Event) -> EventOutcome {
        let name = self.select(event);
        let Some(handler) = self.handlers.get_mut(&name) else {
            tracing::error!(handler = %name, "no handler registered");
            return EventOutcome::Error;
        };

        let mut flush_failed = false;
        if handler.should_flush() {
            if let Err(err) = handler.flush() {
                tracing::warn!(handler = %name, error = %err, "flush failed, batch dropped");
                flush_failed = true;
            }
        }

        if handler.proxy_mode() {
            // Every raw line passes through verbatim, interior blank lines
            // included.
            for line in event.check.output.lines() {
                handler.push(line.to_string());
            }
        } else {
            for line in transform::transform_output(event, handler.rules()) {
                handler.push(line);
            }
        }

        if flush_failed {
            EventOutcome::Error
        } else {
            EventOutcome::Ok
        }
    }

    /// Flush every handler, e.g. on shutdown. Failures are logged, not
    /// returned; by then there is nothing left to retry with.
    pub fn flush_all(&mut self) {
        for handler in self.handlers.values_mut() {
            if let Err(err) = handler.flush() {
                tracing::warn!(handler = %handler.name(), error = %err, "final flush failed");
            }
        }
    }
}
