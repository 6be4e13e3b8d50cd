//! Events and event patterns
//!
//! An [`Event`] is an immutable record of something that happened in the
//! simulation. An [`EventPattern`] decides whether an event is the one a
//! condition is waiting for.

mod event;
mod matching;
mod names;

pub use event::{Event, EventKind, EventPayload, Position3D};
pub use matching::EventPattern;
pub use names::{EventNames, BUILTIN_EVENT_NAMES};
