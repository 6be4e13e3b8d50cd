//! Mission Triggers
//!
//! Event-driven trigger engine for RTS scenarios. Game logic publishes
//! [`Event`]s; [`Listener`]s match them against [`ConditionNode`]s and fire
//! [`Action`]s once every event pattern matched and every script status
//! predicate holds. Actions publish new events or call script routines.
//!
//! The [`EventManager`] owns the event queue and the registered listeners and
//! delivers due events once per simulation advance. Conditions, listeners and
//! the queue are saved to and loaded from the scenario XML format.
//!
//! Scripts are pluggable through [`ScriptEngine`]; with the default
//! `rhai-scripting` feature, mission scripts are written in Rhai.

pub mod bus;
pub mod conditions;
pub mod config;
pub mod error;
pub mod events;
pub mod listener;
pub mod manager;
pub mod scripting;
pub mod xml;

// Re-export commonly used types
pub use bus::{EventBus, EventQueue};
pub use conditions::{Action, ConditionNode, Conjunction, StatusPredicate};
pub use config::EngineConfig;
pub use error::{Result, TriggerError};
pub use events::{Event, EventKind, EventNames, EventPattern, EventPayload, Position3D};
pub use listener::{EventHandlerInfo, Listener};
pub use manager::{EventManager, ListenerId};
pub use scripting::{BoxedScriptEngine, ScriptCache, ScriptEngine, ScriptFactory, ScriptValue};
pub use xml::{PlayerMap, XmlContext, XmlElement};

#[cfg(feature = "rhai-scripting")]
pub use scripting::rhai_engine::{RhaiScript, RhaiScriptFactory};
