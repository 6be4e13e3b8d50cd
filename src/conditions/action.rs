//! Actions fired by satisfied conditions

use crate::bus::EventBus;
use crate::events::Event;
use crate::scripting::ScriptCache;
use crate::xml::{XmlContext, XmlElement};
use crate::{Result, TriggerError};

/// What happens once a conjunction is satisfied
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Publish a fresh copy of this event
    Event(Event),
    /// Call a routine in a script file. Routines take no parameters.
    Script { file: String, routine: String },
}

impl Action {
    /// Fire the action
    ///
    /// A caused event that the bus refuses is logged and dropped. A script
    /// routine that cannot be called is an error: it means the scenario data
    /// is broken.
    pub fn fire(&self, bus: &mut dyn EventBus, scripts: &mut ScriptCache) -> Result<()> {
        match self {
            Action::Event(prototype) => {
                log::debug!("Condition fires event {}", prototype.name());
                if let Err(e) = bus.publish(prototype.instantiate()) {
                    log::error!("Could not queue event caused by condition: {}", e);
                }
                Ok(())
            }
            Action::Script { file, routine } => {
                log::debug!("Condition calls {} in {}", routine, file);
                let engine = scripts.load(file)?;
                if !engine.has_function(routine) {
                    return Err(TriggerError::MissingRoutine {
                        file: file.clone(),
                        routine: routine.clone(),
                    });
                }
                engine.call_routine(routine)
            }
        }
    }

    /// Save as an `<Action>` element
    pub fn to_xml(&self, ctx: &XmlContext<'_>) -> XmlElement {
        match self {
            Action::Event(event) => XmlElement::new("Action")
                .with_attr("Type", "Event")
                .with_child(event.to_xml(ctx)),
            Action::Script { file, routine } => XmlElement::new("Action")
                .with_attr("Type", "Script")
                .with_child(XmlElement::new("ScriptFile").with_text(file.as_str()))
                .with_child(XmlElement::new("ScriptCall").with_text(routine.as_str())),
        }
    }

    /// Load from an `<Action>` element
    pub fn from_xml(e: &XmlElement, ctx: &XmlContext<'_>) -> Result<Self> {
        let action_type = e.require_attr("Type")?;
        match action_type {
            "Event" => {
                let event = Event::from_xml(e.require_child("Event")?, ctx)?;
                Ok(Action::Event(event))
            }
            "Script" => {
                let file = e.require_child("ScriptFile")?.text().trim();
                if file.is_empty() || !ctx.config.is_allowed_script_file(file) {
                    log::error!(
                        "ScriptFile must start with one of {:?} - filename: {}",
                        ctx.config.script_prefixes,
                        file
                    );
                    return Err(TriggerError::InvalidScriptFile(file.to_string()));
                }
                let routine = e.require_child("ScriptCall")?.text().trim();
                if routine.is_empty() {
                    return Err(TriggerError::missing_element("ScriptCall", "text"));
                }
                Ok(Action::Script {
                    file: file.to_string(),
                    routine: routine.to_string(),
                })
            }
            other => Err(TriggerError::UnknownActionType(other.to_string())),
        }
    }
}
