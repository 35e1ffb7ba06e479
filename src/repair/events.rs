//! Event sinks
//!
//! The repair core emits one [`RepairEvent`] per issue, replacement,
//! rewritten commit and reference change. Formatting and persistence
//! belong to whoever implements the sink.

use tracing::{debug, info, warn};

use crate::model::{EventCategory, RepairEvent};

pub trait EventSink {
    fn record(&mut self, event: RepairEvent);
}

/// Collects events in order
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<RepairEvent>,
    echo: bool,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect and also forward every event to `tracing`
    pub fn traced() -> Self {
        Self {
            events: Vec::new(),
            echo: true,
        }
    }

    pub fn events(&self) -> &[RepairEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<RepairEvent> {
        self.events
    }

    pub fn count(&self, category: EventCategory) -> usize {
        self.events.iter().filter(|e| e.category == category).count()
    }
}

impl EventSink for EventLog {
    fn record(&mut self, event: RepairEvent) {
        if self.echo {
            TracingSink.record(event.clone());
        }
        self.events.push(event);
    }
}

pub struct NoopSink;

impl EventSink for NoopSink {
    fn record(&mut self, _event: RepairEvent) {}
}

/// Forwards events to `tracing`; failures at warn level
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&mut self, event: RepairEvent) {
        let before = event.before.as_deref().unwrap_or("-");
        let after = event.after.as_deref().unwrap_or("-");
        if !event.success {
            warn!(category = %event.category, subject = %event.subject, before, after, "{}", event.detail);
        } else if event.category == EventCategory::Reference {
            info!(category = %event.category, subject = %event.subject, before, after, "{}", event.detail);
        } else {
            debug!(category = %event.category, subject = %event.subject, before, after, "{}", event.detail);
        }
    }
}
