//! Event type definitions

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::xml::{XmlContext, XmlElement};
use crate::{Result, TriggerError};

/// A 3D position in game space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position3D {
    /// Create a new position
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// The closed set of event shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// No generic payload
    Base,
    /// Two unsigned integer payload fields
    Int,
    /// Two string payload fields
    String,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Base => "Base",
            EventKind::Int => "Int",
            EventKind::String => "String",
        }
    }
}

impl FromStr for EventKind {
    type Err = TriggerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Base" => Ok(EventKind::Base),
            "Int" | "ULong" => Ok(EventKind::Int),
            "String" => Ok(EventKind::String),
            _ => Err(TriggerError::invalid_attribute("Event", "Kind", s)),
        }
    }
}

/// Generic payload carried by an event; its variant determines the event kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    None,
    Int { data1: u64, data2: u64 },
    Str { data1: String, data2: String },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::None => EventKind::Base,
            EventPayload::Int { .. } => EventKind::Int,
            EventPayload::Str { .. } => EventKind::String,
        }
    }

    /// Compare the first payload field; always equal for base events
    pub(crate) fn data1_eq(&self, other: &EventPayload) -> bool {
        match (self, other) {
            (EventPayload::Int { data1: a, .. }, EventPayload::Int { data1: b, .. }) => a == b,
            (EventPayload::Str { data1: a, .. }, EventPayload::Str { data1: b, .. }) => a == b,
            (EventPayload::None, EventPayload::None) => true,
            _ => false,
        }
    }

    /// Compare the second payload field; always equal for base events
    pub(crate) fn data2_eq(&self, other: &EventPayload) -> bool {
        match (self, other) {
            (EventPayload::Int { data2: a, .. }, EventPayload::Int { data2: b, .. }) => a == b,
            (EventPayload::Str { data2: a, .. }, EventPayload::Str { data2: b, .. }) => a == b,
            (EventPayload::None, EventPayload::None) => true,
            _ => false,
        }
    }
}

/// Something that happened in the simulation
///
/// The kind (payload shape) is fixed at construction. Presence of a player id
/// or a location is carried by the `Option`, so "player 0" and "no player"
/// stay distinct.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    name: String,
    sequence_id: u64,
    unit_id: u32,
    player_id: Option<u32>,
    location: Option<Position3D>,
    delayed_delivery: u32,
    payload: EventPayload,
}

impl Event {
    /// Create a base event without payload
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_payload(name, EventPayload::None)
    }

    /// Create an event carrying two integers
    pub fn with_ints(name: impl Into<String>, data1: u64, data2: u64) -> Self {
        Self::with_payload(name, EventPayload::Int { data1, data2 })
    }

    /// Create an event carrying two strings
    pub fn with_strings(
        name: impl Into<String>,
        data1: impl Into<String>,
        data2: impl Into<String>,
    ) -> Self {
        Self::with_payload(
            name,
            EventPayload::Str {
                data1: data1.into(),
                data2: data2.into(),
            },
        )
    }

    pub fn with_payload(name: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            name: name.into(),
            sequence_id: 0,
            unit_id: 0,
            player_id: None,
            location: None,
            delayed_delivery: 0,
            payload,
        }
    }

    /// Set the unit id (0 means no unit)
    pub fn with_unit_id(mut self, unit_id: u32) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn with_player_id(mut self, player_id: u32) -> Self {
        self.player_id = Some(player_id);
        self
    }

    pub fn with_location(mut self, location: Position3D) -> Self {
        self.location = Some(location);
        self
    }

    /// Defer delivery by the given number of advance calls
    pub fn with_delayed_delivery(mut self, ticks: u32) -> Self {
        self.delayed_delivery = ticks;
        self
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id assigned by the event manager; 0 until queued
    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    pub fn unit_id(&self) -> u32 {
        self.unit_id
    }

    pub fn player_id(&self) -> Option<u32> {
        self.player_id
    }

    pub fn has_player_id(&self) -> bool {
        self.player_id.is_some()
    }

    pub fn location(&self) -> Option<Position3D> {
        self.location
    }

    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    pub fn delayed_delivery(&self) -> u32 {
        self.delayed_delivery
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// A fresh copy suitable for queueing: same contents, no sequence id yet
    pub fn instantiate(&self) -> Self {
        Self {
            sequence_id: 0,
            ..self.clone()
        }
    }

    pub(crate) fn set_sequence_id(&mut self, id: u64) {
        self.sequence_id = id;
    }

    pub(crate) fn set_delayed_delivery(&mut self, ticks: u32) {
        self.delayed_delivery = ticks;
    }

    /// Save as an `<Event>` element
    ///
    /// The player id is written as a player-list index. A player missing from
    /// the table is logged and its attribute skipped.
    pub fn to_xml(&self, ctx: &XmlContext<'_>) -> XmlElement {
        let location = self.location.unwrap_or_default();
        let mut e = XmlElement::new("Event")
            .with_attr("Name", &self.name)
            .with_attr("Kind", self.kind().as_str())
            .with_attr("Id", self.sequence_id)
            .with_attr("UnitId", self.unit_id)
            .with_attr("DelayedDelivery", self.delayed_delivery)
            .with_attr("HasLocation", u8::from(self.location.is_some()))
            .with_attr("Location.x", location.x)
            .with_attr("Location.y", location.y)
            .with_attr("Location.z", location.z);

        if let Some(player_id) = self.player_id {
            match ctx.players.index_of(player_id) {
                Some(index) => e.set_attr("PlayerId", index),
                None => log::warn!(
                    "Event '{}': player {} not found in player list, PlayerId not saved",
                    self.name,
                    player_id
                ),
            }
        }

        match &self.payload {
            EventPayload::None => {}
            EventPayload::Int { data1, data2 } => {
                e.set_attr("Data1", data1);
                e.set_attr("Data2", data2);
            }
            EventPayload::Str { data1, data2 } => {
                e.set_attr("Data1", data1);
                e.set_attr("Data2", data2);
            }
        }
        e
    }

    /// Load from an `<Event>` element
    pub fn from_xml(e: &XmlElement, ctx: &XmlContext<'_>) -> Result<Self> {
        let name = e.require_attr("Name")?.to_string();
        if name.is_empty() {
            return Err(TriggerError::invalid_attribute(e.name(), "Name", ""));
        }

        let kind = match e.attr("Kind") {
            Some(raw) => raw.parse::<EventKind>()?,
            None if e.has_attr("Data1") || e.has_attr("Data2") => EventKind::String,
            None => EventKind::Base,
        };
        let payload = match kind {
            EventKind::Base => EventPayload::None,
            EventKind::Int => EventPayload::Int {
                data1: e.parse_attr_or("Data1", 0)?,
                data2: e.parse_attr_or("Data2", 0)?,
            },
            EventKind::String => EventPayload::Str {
                data1: e.attr("Data1").unwrap_or_default().to_string(),
                data2: e.attr("Data2").unwrap_or_default().to_string(),
            },
        };

        let mut event = Event::with_payload(name, payload)
            .with_unit_id(e.parse_attr("UnitId")?)
            .with_delayed_delivery(e.parse_attr("DelayedDelivery")?);
        event.sequence_id = e.parse_attr("Id")?;

        if e.bool_attr("HasLocation")? {
            event.location = Some(Position3D::new(
                e.parse_attr("Location.x")?,
                e.parse_attr("Location.y")?,
                e.parse_attr("Location.z")?,
            ));
        }

        if e.has_attr("PlayerId") {
            let index: usize = e.parse_attr("PlayerId")?;
            let player_id = ctx.players.id_at(index).ok_or_else(|| {
                TriggerError::invalid_attribute(e.name(), "PlayerId", &index.to_string())
            })?;
            event.player_id = Some(player_id);
        }

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::xml::PlayerMap;

    #[test]
    fn test_kind_follows_payload() {
        assert_eq!(Event::new("GameOver").kind(), EventKind::Base);
        assert_eq!(Event::with_ints("UnitsWithTypeLostCount", 3, 7).kind(), EventKind::Int);
        assert_eq!(Event::with_strings("CustomStringEvent", "a", "").kind(), EventKind::String);
    }

    #[test]
    fn test_player_zero_is_not_absent() {
        let none = Event::new("PlayerLost");
        let zero = Event::new("PlayerLost").with_player_id(0);

        assert!(!none.has_player_id());
        assert!(zero.has_player_id());
        assert_eq!(zero.player_id(), Some(0));
    }

    #[test]
    fn test_instantiate_clears_sequence_id() {
        let mut event = Event::new("GameOver").with_delayed_delivery(100);
        event.set_sequence_id(17);

        let copy = event.instantiate();
        assert_eq!(copy.sequence_id(), 0);
        assert_eq!(copy.delayed_delivery(), 100);
        assert_eq!(copy.name(), "GameOver");
    }

    #[test]
    fn test_xml_maps_player_index() {
        let players = PlayerMap::new(vec![128, 129]);
        let config = EngineConfig::default();
        let ctx = XmlContext::new(&players, &config);

        let event = Event::with_strings("CustomStringEvent", "Foobar", "")
            .with_unit_id(42)
            .with_player_id(129)
            .with_location(Position3D::new(1.5, 2.0, 0.0));

        let xml = event.to_xml(&ctx);
        assert_eq!(xml.attr("PlayerId"), Some("1"));
        assert_eq!(xml.attr("HasLocation"), Some("1"));

        let loaded = Event::from_xml(&xml, &ctx).unwrap();
        assert_eq!(loaded, event);
    }

    #[test]
    fn test_xml_unknown_player_skips_attribute() {
        let players = PlayerMap::new(vec![128]);
        let config = EngineConfig::default();
        let ctx = XmlContext::new(&players, &config);

        let xml = Event::new("PlayerWon").with_player_id(300).to_xml(&ctx);
        assert!(!xml.has_attr("PlayerId"));
    }

    #[test]
    fn test_xml_legacy_event_without_kind() {
        let players = PlayerMap::default();
        let config = EngineConfig::default();
        let ctx = XmlContext::new(&players, &config);

        let xml = XmlElement::new("Event")
            .with_attr("Name", "UnitWithTypeDestroyed")
            .with_attr("Id", 0)
            .with_attr("UnitId", 0)
            .with_attr("DelayedDelivery", 0)
            .with_attr("HasLocation", 0)
            .with_attr("Data1", "")
            .with_attr("Data2", "");

        let event = Event::from_xml(&xml, &ctx).unwrap();
        assert_eq!(event.kind(), EventKind::String);
        assert!(!event.has_location());
        assert!(!event.has_player_id());
    }

    #[test]
    fn test_kind_parses_like_saved_games() {
        assert_eq!("Base".parse::<EventKind>().unwrap(), EventKind::Base);
        assert_eq!("ULong".parse::<EventKind>().unwrap(), EventKind::Int);
        assert_eq!(EventKind::String.as_str().parse::<EventKind>().unwrap(), EventKind::String);
        assert!(matches!(
            "Float".parse::<EventKind>(),
            Err(TriggerError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_xml_rejects_bad_values() {
        let players = PlayerMap::new(vec![128]);
        let config = EngineConfig::default();
        let ctx = XmlContext::new(&players, &config);

        let base = XmlElement::new("Event")
            .with_attr("Name", "UnitsWithTypeLostCount")
            .with_attr("Kind", "Int")
            .with_attr("Id", 0)
            .with_attr("UnitId", 0)
            .with_attr("DelayedDelivery", 0)
            .with_attr("HasLocation", 0);

        let bad_data = base.clone().with_attr("Data1", "many");
        assert!(Event::from_xml(&bad_data, &ctx).is_err());

        let bad_player = base.clone().with_attr("PlayerId", 4);
        assert!(Event::from_xml(&bad_player, &ctx).is_err());

        let mut no_unit = base;
        no_unit.remove_attr("UnitId");
        assert!(matches!(
            Event::from_xml(&no_unit, &ctx),
            Err(TriggerError::MissingAttribute { .. })
        ));
    }
}
