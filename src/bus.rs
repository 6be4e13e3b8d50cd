//! Event bus seam and the event queue behind it

use std::collections::VecDeque;

use crate::config::EngineConfig;
use crate::events::{Event, EventNames};
use crate::{Result, TriggerError};

/// Accepts events for later delivery
///
/// Actions publish through this trait; the caller decides when queued events
/// reach the listeners.
pub trait EventBus {
    /// Queue an event and return the sequence id it was given
    fn publish(&mut self, event: Event) -> Result<u64>;
}

/// FIFO of events waiting for delivery
#[derive(Debug, Clone)]
pub struct EventQueue {
    names: EventNames,
    strict_names: bool,
    next_id: u64,
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new(config: &EngineConfig) -> Self {
        let mut names = EventNames::builtin();
        for name in &config.extra_event_names {
            names.declare(name.clone());
        }
        Self {
            names,
            strict_names: config.strict_event_names,
            // 0 is never a valid sequence id
            next_id: 1,
            events: VecDeque::new(),
        }
    }

    pub fn declare_event(&mut self, name: impl Into<String>) {
        self.names.declare(name);
    }

    pub fn knows_event_name(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Sequence id the next queued event will get
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub(crate) fn set_next_id(&mut self, id: u64) {
        self.next_id = id.max(1);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub(crate) fn pop_front(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Put events back in front of anything queued since they were taken
    pub(crate) fn restore(&mut self, mut events: VecDeque<Event>) {
        events.append(&mut self.events);
        self.events = events;
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventBus for EventQueue {
    fn publish(&mut self, mut event: Event) -> Result<u64> {
        if self.strict_names && !self.names.contains(event.name()) {
            log::error!(
                "The event {} has not been declared. Cannot use this event.",
                event.name()
            );
            return Err(TriggerError::UnknownEvent(event.name().to_string()));
        }
        let id = self.next_id;
        self.next_id += 1;
        event.set_sequence_id(id);
        log::debug!("Queue event {} (#{})", event.name(), id);
        self.events.push_back(event);
        Ok(id)
    }
}
