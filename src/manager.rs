//! Event manager: queue, delivery and the listener registry

use std::collections::{BTreeMap, VecDeque};

use crate::bus::{EventBus, EventQueue};
use crate::config::EngineConfig;
use crate::events::Event;
use crate::listener::Listener;
use crate::xml::{XmlContext, XmlElement};
use crate::{Result, TriggerError};

/// Handle for a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u32);

impl ListenerId {
    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Queues events and delivers them to every registered listener once per
/// simulation advance
#[derive(Debug)]
pub struct EventManager {
    config: EngineConfig,
    queue: EventQueue,
    listeners: BTreeMap<ListenerId, Listener>,
    next_listener_id: u32,
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl EventManager {
    pub fn new(config: EngineConfig) -> Self {
        let queue = EventQueue::new(&config);
        Self {
            config,
            queue,
            listeners: BTreeMap::new(),
            next_listener_id: 1,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Allow events named `name` to be queued
    pub fn declare_event(&mut self, name: impl Into<String>) {
        self.queue.declare_event(name);
    }

    pub fn knows_event_name(&self, name: &str) -> bool {
        self.queue.knows_event_name(name)
    }

    /// Queue an event for the next advance and return its sequence id
    pub fn queue_event(&mut self, event: Event) -> Result<u64> {
        self.queue.publish(event)
    }

    /// Events waiting for delivery, in delivery order
    pub fn pending_events(&self) -> impl Iterator<Item = &Event> {
        self.queue.iter()
    }

    pub fn next_event_id(&self) -> u64 {
        self.queue.next_id()
    }

    pub fn register_listener(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        log::debug!("Registered listener {} ({})", id.0, listener.script_file_name());
        self.listeners.insert(id, listener);
        id
    }

    pub fn unregister_listener(&mut self, id: ListenerId) -> Option<Listener> {
        let listener = self.listeners.remove(&id);
        if listener.is_none() {
            log::warn!("Listener {} is not registered", id.0);
        }
        listener
    }

    pub fn listener(&self, id: ListenerId) -> Option<&Listener> {
        self.listeners.get(&id)
    }

    pub fn listener_mut(&mut self, id: ListenerId) -> Option<&mut Listener> {
        self.listeners.get_mut(&id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver every due event, including the ones queued while delivering
    ///
    /// Delayed events lose one tick and stay queued. At most
    /// `max_events_per_advance` events are delivered; the rest wait for the
    /// next call. Returns the number of delivered events.
    ///
    /// When a listener fails, the failing event still reaches the remaining
    /// listeners but is not queued again, so listeners that already received
    /// it do not see it twice. The events not yet delivered stay queued and
    /// the error is returned.
    pub fn advance(&mut self) -> Result<usize> {
        let max = self.config.max_events_per_advance;
        let mut remaining = VecDeque::new();
        let mut delivered = 0;
        let mut deferred = 0;

        while let Some(mut event) = self.queue.pop_front() {
            if event.delayed_delivery() > 0 {
                event.set_delayed_delivery(event.delayed_delivery() - 1);
                remaining.push_back(event);
                continue;
            }
            if delivered >= max {
                deferred += 1;
                remaining.push_back(event);
                continue;
            }
            delivered += 1;
            if let Err(e) = self.deliver(&event) {
                self.queue.restore(remaining);
                return Err(e);
            }
        }

        if deferred > 0 {
            log::warn!(
                "Delivered {} events in one advance, deferring {} to the next",
                delivered,
                deferred
            );
        }
        self.queue.restore(remaining);
        Ok(delivered)
    }

    fn deliver(&mut self, event: &Event) -> Result<()> {
        log::debug!("Deliver event {} (#{})", event.name(), event.sequence_id());
        let mut first_error = None;
        for (id, listener) in self.listeners.iter_mut() {
            if event.has_location() && !listener.can_see(event) {
                continue;
            }
            if let Err(e) = listener.receive(event, &mut self.queue) {
                log::error!("Listener {} failed on {}: {}", id.0, event.name(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Save the pending queue as an `<EventManager>` element
    pub fn to_xml(&self, ctx: &XmlContext<'_>) -> XmlElement {
        let mut queue = XmlElement::new("EventQueue");
        for event in self.queue.iter() {
            queue.push_child(event.to_xml(ctx));
        }
        XmlElement::new("EventManager")
            .with_attr("NextEventId", self.queue.next_id())
            .with_child(queue)
    }

    /// Replace the pending queue with the one saved in `e`
    pub fn load_from_xml(&mut self, e: &XmlElement, ctx: &XmlContext<'_>) -> Result<()> {
        let next_id: u64 = e.parse_attr("NextEventId")?;
        let saved = e.require_child("EventQueue").map_err(|err| {
            log::error!("No EventQueue found");
            err
        })?;

        let mut events = VecDeque::new();
        for event in saved.children_named("Event") {
            let event = Event::from_xml(event, ctx)?;
            if self.config.strict_event_names && !self.queue.knows_event_name(event.name()) {
                log::error!("Saved event {} has not been declared", event.name());
                return Err(TriggerError::UnknownEvent(event.name().to_string()));
            }
            events.push_back(event);
        }

        self.queue.clear();
        self.queue.restore(events);
        self.queue.set_next_id(next_id);
        Ok(())
    }
}
