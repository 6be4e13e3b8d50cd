//! Event listeners
//!
//! A [`Listener`] owns top-level condition nodes and, lazily, the script engine
//! their status predicates and the script event handlers run in. Every event
//! the manager delivers goes through [`Listener::receive`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::bus::EventBus;
use crate::conditions::ConditionNode;
use crate::events::{Event, Position3D};
use crate::scripting::{ScriptCache, ScriptEngine, ScriptFactory};
use crate::xml::{XmlContext, XmlElement};
use crate::{Result, TriggerError};

/// A script function called whenever an event with a given name arrives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHandlerInfo {
    pub event_name: String,
    pub function: String,
    /// Stored and saved, but not passed to the function
    pub args: String,
}

type Visibility = Box<dyn Fn(&Position3D) -> bool>;

/// Owner of a set of condition trees and their script
pub struct Listener {
    script_file_name: String,
    conditions: Vec<ConditionNode>,
    scripts: ScriptCache,
    event_handlers: BTreeMap<u32, EventHandlerInfo>,
    next_handler_id: u32,
    visibility: Option<Visibility>,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("script_file_name", &self.script_file_name)
            .field("conditions", &self.conditions)
            .field("event_handlers", &self.event_handlers)
            .field("next_handler_id", &self.next_handler_id)
            .field("script_loaded", &self.has_script())
            .finish_non_exhaustive()
    }
}

impl Listener {
    /// Create a listener whose predicates and handlers run in `script_file_name`
    pub fn new(script_file_name: impl Into<String>) -> Self {
        Self {
            script_file_name: script_file_name.into(),
            conditions: Vec::new(),
            scripts: ScriptCache::default(),
            event_handlers: BTreeMap::new(),
            next_handler_id: 1,
            visibility: None,
        }
    }

    /// Create script engines through `factory` when they are first needed
    pub fn with_script_factory(mut self, factory: Arc<dyn ScriptFactory>) -> Self {
        self.scripts.set_factory(factory);
        self
    }

    /// Only receive located events at positions `visible` accepts
    ///
    /// Events without a location are always received.
    pub fn with_visibility(mut self, visible: impl Fn(&Position3D) -> bool + 'static) -> Self {
        self.visibility = Some(Box::new(visible));
        self
    }

    pub fn script_file_name(&self) -> &str {
        &self.script_file_name
    }

    /// Whether `event` should be delivered to this listener
    pub fn can_see(&self, event: &Event) -> bool {
        match (&self.visibility, event.location()) {
            (Some(visible), Some(location)) => visible(&location),
            _ => true,
        }
    }

    pub fn add_condition(&mut self, condition: ConditionNode) {
        self.conditions.push(condition);
    }

    pub fn conditions(&self) -> &[ConditionNode] {
        &self.conditions
    }

    /// The listener's own script engine, if it was created
    pub fn script(&self) -> Option<&dyn ScriptEngine> {
        self.scripts.get(&self.script_file_name)
    }

    pub fn has_script(&self) -> bool {
        self.scripts.is_loaded(&self.script_file_name)
    }

    /// Create the listener's script engine if it does not exist yet
    ///
    /// Returns false when there is no factory to create it with.
    pub fn init_script(&mut self) -> Result<bool> {
        if self.has_script() {
            return Ok(true);
        }
        if !self.scripts.has_factory() {
            log::warn!("No script factory for {}", self.script_file_name);
            return Ok(false);
        }
        self.scripts.load(&self.script_file_name)?;
        log::debug!("Initialized listener script {}", self.script_file_name);
        Ok(true)
    }

    /// Feed an event to every condition, fire what is satisfied, then run
    /// the script event handlers for it
    ///
    /// Actions publish into `bus`. Conditions that fire and are not reusable
    /// are dropped. A failing condition is re-armed or retired like any other
    /// fired condition and does not keep the rest from running; the first
    /// error is returned once all conditions and handlers had their turn.
    pub fn receive(&mut self, event: &Event, bus: &mut dyn EventBus) -> Result<()> {
        let mut first_error = None;

        for node in &mut self.conditions {
            node.process_event(event);
        }

        if self.conditions.iter().any(|c| c.awaiting_predicates()) {
            if let Err(e) = self.init_script() {
                log::error!("Cannot create script {}: {}", self.script_file_name, e);
                first_error.get_or_insert(e);
            }
        }

        let mut i = 0;
        while i < self.conditions.len() {
            let which = {
                let script = self.scripts.get(&self.script_file_name);
                self.conditions[i].satisfied_conjunctions(script)
            };
            let which = match which {
                Ok(which) => which,
                Err(e) => {
                    log::error!("Condition {} of {} failed: {}", i, self.script_file_name, e);
                    first_error.get_or_insert(e);
                    i += 1;
                    continue;
                }
            };
            if which.is_empty() {
                i += 1;
                continue;
            }

            if let Err(e) = self.conditions[i].fire(&which, bus, &mut self.scripts) {
                first_error.get_or_insert(e);
            }
            if self.conditions[i].rearm(&which) {
                i += 1;
            } else {
                self.conditions.remove(i);
                log::debug!(
                    "Removed condition from listener {}, {} left",
                    self.script_file_name,
                    self.conditions.len()
                );
            }
        }

        if let Err(e) = self.deliver_to_script(event) {
            first_error.get_or_insert(e);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn deliver_to_script(&mut self, event: &Event) -> Result<()> {
        let functions: Vec<String> = self
            .event_handlers
            .values()
            .filter(|h| h.event_name == event.name())
            .map(|h| h.function.clone())
            .collect();
        if functions.is_empty() {
            return Ok(());
        }
        if !self.init_script()? {
            log::error!(
                "Event handlers for {} but no script for {}",
                event.name(),
                self.script_file_name
            );
            return Ok(());
        }
        let script = self.scripts.load(&self.script_file_name)?;
        let mut first_error = None;
        for function in functions {
            if let Err(e) = script.call_routine(&function) {
                log::error!("Event handler {} for {} failed: {}", function, event.name(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Call `function` whenever an event named `event_name` is received
    pub fn add_event_handler(
        &mut self,
        event_name: impl Into<String>,
        function: impl Into<String>,
        args: impl Into<String>,
    ) -> u32 {
        let id = self.next_handler_id;
        self.next_handler_id += 1;
        self.event_handlers.insert(
            id,
            EventHandlerInfo {
                event_name: event_name.into(),
                function: function.into(),
                args: args.into(),
            },
        );
        id
    }

    pub fn remove_event_handler(&mut self, id: u32) -> bool {
        self.event_handlers.remove(&id).is_some()
    }

    pub fn event_handlers(&self) -> impl Iterator<Item = (u32, &EventHandlerInfo)> {
        self.event_handlers.iter().map(|(id, info)| (*id, info))
    }

    /// Save conditions and event handlers as an `<EventListener>` element
    pub fn to_xml(&self, ctx: &XmlContext<'_>) -> XmlElement {
        let mut conditions = XmlElement::new("Conditions");
        for condition in &self.conditions {
            conditions.push_child(condition.to_xml(ctx));
        }

        let mut handlers = XmlElement::new("EventHandlers").with_attr("NextId", self.next_handler_id);
        for (id, info) in &self.event_handlers {
            handlers.push_child(
                XmlElement::new("EventHandler")
                    .with_attr("id", id)
                    .with_attr("EventName", &info.event_name)
                    .with_attr("FunctionName", &info.function)
                    .with_attr("FunctionArgs", &info.args),
            );
        }

        XmlElement::new("EventListener")
            .with_child(conditions)
            .with_child(handlers)
    }

    /// Replace the conditions with those in `e` and restore saved handlers
    ///
    /// Saved handlers are only accepted while the table is empty: they come
    /// from a save game, where the script did not register its own.
    pub fn load_from_xml(&mut self, e: &XmlElement, ctx: &XmlContext<'_>) -> Result<()> {
        let conditions = e.require_child("Conditions").map_err(|err| {
            log::error!("No Conditions tag");
            err
        })?;
        let mut loaded = Vec::new();
        for c in conditions.children_named("Condition") {
            loaded.push(ConditionNode::from_xml(c, ctx)?);
        }
        self.conditions = loaded;

        if let Some(handlers) = e.child("EventHandlers") {
            self.load_event_handlers(handlers)?;
        } else {
            log::debug!("No EventHandlers tag");
        }

        if self.conditions.iter().any(|c| c.requires_script()) && self.scripts.has_factory() {
            self.init_script()?;
        }
        Ok(())
    }

    fn load_event_handlers(&mut self, e: &XmlElement) -> Result<()> {
        let saved: Vec<_> = e.children_named("EventHandler").collect();
        if !saved.is_empty() && !self.event_handlers.is_empty() {
            log::error!("Event handlers already registered, refusing to load saved ones");
            return Err(TriggerError::invalid_attribute(
                e.name(),
                "EventHandler",
                "already loaded",
            ));
        }

        for h in saved {
            let id: u32 = h.parse_attr("id")?;
            self.event_handlers.insert(
                id,
                EventHandlerInfo {
                    event_name: h.attr("EventName").unwrap_or_default().to_string(),
                    function: h.attr("FunctionName").unwrap_or_default().to_string(),
                    args: h.attr("FunctionArgs").unwrap_or_default().to_string(),
                },
            );
        }
        self.next_handler_id = e.parse_attr("NextId")?;
        Ok(())
    }

    /// Variable snapshot of the listener's script, empty without a script
    pub fn save_script_data(&self) -> Result<Vec<u8>> {
        match self.script() {
            Some(script) => script.save_data(),
            None => Ok(Vec::new()),
        }
    }

    /// Create the script and restore a snapshot into it
    pub fn load_script_data(&mut self, data: &[u8]) -> Result<()> {
        if self.has_script() {
            return Err(TriggerError::Script(format!(
                "{}: script already loaded",
                self.script_file_name
            )));
        }
        let script = self.scripts.load(&self.script_file_name)?;
        script.load_data(data)
    }
}
