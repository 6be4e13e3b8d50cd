//! Event patterns: exact field matching with per-field wildcards

use super::Event;
use crate::xml::{XmlContext, XmlElement};
use crate::Result;

/// A template matched against incoming events
///
/// Kind and name always have to match. Unit id, player id and the two payload
/// fields can be wildcarded individually. Location, sequence id and delayed
/// delivery are never compared.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPattern {
    prototype: Event,
    ignore_unit_id: bool,
    ignore_player_id: bool,
    ignore_data1: bool,
    ignore_data2: bool,
}

impl EventPattern {
    /// Create a pattern that compares every matchable field of `prototype`
    pub fn new(prototype: Event) -> Self {
        Self {
            prototype,
            ignore_unit_id: false,
            ignore_player_id: false,
            ignore_data1: false,
            ignore_data2: false,
        }
    }

    pub fn ignore_unit_id(mut self) -> Self {
        self.ignore_unit_id = true;
        self
    }

    pub fn ignore_player_id(mut self) -> Self {
        self.ignore_player_id = true;
        self
    }

    pub fn ignore_data1(mut self) -> Self {
        self.ignore_data1 = true;
        self
    }

    pub fn ignore_data2(mut self) -> Self {
        self.ignore_data2 = true;
        self
    }

    pub fn prototype(&self) -> &Event {
        &self.prototype
    }

    pub fn ignores_unit_id(&self) -> bool {
        self.ignore_unit_id
    }

    pub fn ignores_player_id(&self) -> bool {
        self.ignore_player_id
    }

    pub fn ignores_data1(&self) -> bool {
        self.ignore_data1
    }

    pub fn ignores_data2(&self) -> bool {
        self.ignore_data2
    }

    /// Check whether `event` satisfies this pattern
    pub fn matches(&self, event: &Event) -> bool {
        let proto = &self.prototype;
        if event.kind() != proto.kind() {
            return false;
        }
        if event.name() != proto.name() {
            return false;
        }
        if !self.ignore_unit_id && event.unit_id() != proto.unit_id() {
            return false;
        }
        if !self.ignore_player_id && event.player_id() != proto.player_id() {
            return false;
        }
        if !self.ignore_data1 && !event.payload().data1_eq(proto.payload()) {
            return false;
        }
        if !self.ignore_data2 && !event.payload().data2_eq(proto.payload()) {
            return false;
        }
        true
    }

    /// Save as an `<EventMatching>` element (without the `IsLeft` flag,
    /// which belongs to the owning condition)
    pub fn to_xml(&self, ctx: &XmlContext<'_>) -> XmlElement {
        XmlElement::new("EventMatching")
            .with_attr("IgnoreUnitId", u8::from(self.ignore_unit_id))
            .with_attr("IgnorePlayerId", u8::from(self.ignore_player_id))
            .with_attr("IgnoreData1", u8::from(self.ignore_data1))
            .with_attr("IgnoreData2", u8::from(self.ignore_data2))
            .with_child(self.prototype.to_xml(ctx))
    }

    /// Load from an `<EventMatching>` element
    pub fn from_xml(e: &XmlElement, ctx: &XmlContext<'_>) -> Result<Self> {
        let prototype = Event::from_xml(e.require_child("Event")?, ctx)?;
        Ok(Self {
            prototype,
            ignore_unit_id: e.bool_attr_or("IgnoreUnitId", false)?,
            ignore_player_id: e.bool_attr_or("IgnorePlayerId", false)?,
            ignore_data1: e.bool_attr_or("IgnoreData1", false)?,
            ignore_data2: e.bool_attr_or("IgnoreData2", false)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::events::Position3D;
    use crate::xml::PlayerMap;

    #[test]
    fn test_name_and_kind_must_match() {
        let pattern = EventPattern::new(Event::new("AllUnitsDestroyed"))
            .ignore_unit_id()
            .ignore_player_id()
            .ignore_data1()
            .ignore_data2();

        assert!(pattern.matches(&Event::new("AllUnitsDestroyed")));
        assert!(!pattern.matches(&Event::new("GameOver")));
        assert!(!pattern.matches(&Event::with_strings("AllUnitsDestroyed", "", "")));
    }

    #[test]
    fn test_unit_id_wildcard() {
        let exact = EventPattern::new(Event::new("UnitWithTypeDestroyed").with_unit_id(5));
        let wildcard = exact.clone().ignore_unit_id();
        let event = Event::new("UnitWithTypeDestroyed").with_unit_id(6);

        assert!(!exact.matches(&event));
        assert!(wildcard.matches(&event));
    }

    #[test]
    fn test_player_presence_is_compared() {
        let pattern = EventPattern::new(Event::new("PlayerLost").with_player_id(0));

        assert!(pattern.matches(&Event::new("PlayerLost").with_player_id(0)));
        assert!(!pattern.matches(&Event::new("PlayerLost")));
        assert!(!pattern.matches(&Event::new("PlayerLost").with_player_id(1)));
        assert!(pattern.clone().ignore_player_id().matches(&Event::new("PlayerLost")));
    }

    #[test]
    fn test_payload_fields() {
        let pattern = EventPattern::new(Event::with_ints("UnitsWithTypeLostCount", 10, 3));

        assert!(pattern.matches(&Event::with_ints("UnitsWithTypeLostCount", 10, 3)));
        assert!(!pattern.matches(&Event::with_ints("UnitsWithTypeLostCount", 10, 4)));
        assert!(pattern.clone().ignore_data2().matches(&Event::with_ints("UnitsWithTypeLostCount", 10, 4)));
        assert!(!pattern.clone().ignore_data2().matches(&Event::with_ints("UnitsWithTypeLostCount", 11, 4)));
    }

    #[test]
    fn test_unread_fields_never_matter() {
        let pattern = EventPattern::new(Event::with_strings("CustomStringEvent", "a", "b"));
        let mut event = Event::with_strings("CustomStringEvent", "a", "b")
            .with_location(Position3D::new(9.0, 9.0, 9.0))
            .with_delayed_delivery(12);
        event.set_sequence_id(99);

        assert!(pattern.matches(&event));
    }

    #[test]
    fn test_xml_keeps_wildcards() {
        let players = PlayerMap::new(vec![128]);
        let config = EngineConfig::default();
        let ctx = XmlContext::new(&players, &config);

        let pattern = EventPattern::new(Event::new("UnitWithTypeDestroyed").with_player_id(128))
            .ignore_unit_id()
            .ignore_data2();
        let xml = pattern.to_xml(&ctx);
        assert_eq!(xml.attr("IgnoreUnitId"), Some("1"));
        assert_eq!(xml.attr("IgnorePlayerId"), Some("0"));

        assert_eq!(EventPattern::from_xml(&xml, &ctx).unwrap(), pattern);
    }

    #[test]
    fn test_xml_requires_event() {
        let players = PlayerMap::default();
        let config = EngineConfig::default();
        let ctx = XmlContext::new(&players, &config);

        assert!(EventPattern::from_xml(&XmlElement::new("EventMatching"), &ctx).is_err());
    }
}
