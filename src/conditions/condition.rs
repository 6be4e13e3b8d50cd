//! Condition nodes: conjunctions of event patterns and status predicates,
//! optionally joined by alternatives

use super::Action;
use crate::bus::EventBus;
use crate::events::{Event, EventPattern};
use crate::scripting::{ScriptCache, ScriptEngine};
use crate::xml::{XmlContext, XmlElement};
use crate::{Result, TriggerError};

/// A named boolean script function consulted once all patterns matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPredicate {
    function: String,
}

impl StatusPredicate {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn is_fulfilled(&self, script: &dyn ScriptEngine) -> Result<bool> {
        script.evaluate_predicate(&self.function)
    }

    fn to_xml(&self) -> XmlElement {
        XmlElement::new("StatusCondition").with_attr("Function", &self.function)
    }

    fn from_xml(e: &XmlElement) -> Result<Self> {
        Ok(Self::new(e.require_attr("Function")?))
    }
}

/// Which conjunction of a condition group is satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    /// The node itself
    Main,
    /// One of its alternatives, by position
    Alternative(usize),
}

/// A conjunction ("AND") of event patterns and status predicates
///
/// A top-level node may carry alternatives ("OR"). Alternatives are plain
/// nodes themselves but cannot have alternatives of their own.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionNode {
    patterns: Vec<EventPattern>,
    /// Positions in `patterns` still waiting for an event, in pattern order
    pending: Vec<usize>,
    status_predicates: Vec<StatusPredicate>,
    alternatives: Vec<ConditionNode>,
    action: Action,
    reusable: bool,
}

impl ConditionNode {
    /// Create a reusable node with no requirements yet
    pub fn new(action: Action) -> Self {
        Self {
            patterns: Vec::new(),
            pending: Vec::new(),
            status_predicates: Vec::new(),
            alternatives: Vec::new(),
            action,
            reusable: true,
        }
    }

    /// Require an event matching `pattern`
    pub fn with_pattern(mut self, pattern: EventPattern) -> Self {
        self.pending.push(self.patterns.len());
        self.patterns.push(pattern);
        self
    }

    /// Require a script predicate to return true
    pub fn with_status_predicate(mut self, function: impl Into<String>) -> Self {
        self.status_predicates.push(StatusPredicate::new(function));
        self
    }

    /// Retire the node after it fired once instead of re-arming it
    pub fn one_shot(mut self) -> Self {
        self.reusable = false;
        self
    }

    /// Attach an alternative conjunction
    pub fn add_alternative(&mut self, alternative: ConditionNode) -> Result<()> {
        if !alternative.alternatives.is_empty() {
            return Err(TriggerError::NestedAlternatives);
        }
        self.alternatives.push(alternative);
        Ok(())
    }

    /// Builder form of [`ConditionNode::add_alternative`]
    pub fn with_alternative(mut self, alternative: ConditionNode) -> Result<Self> {
        self.add_alternative(alternative)?;
        Ok(self)
    }

    pub fn patterns(&self) -> &[EventPattern] {
        &self.patterns
    }

    /// Patterns not matched since the last reset, in pattern order
    pub fn pending(&self) -> impl Iterator<Item = &EventPattern> {
        self.pending.iter().map(move |&i| &self.patterns[i])
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether the pattern at `index` still waits for an event
    pub fn is_pending(&self, index: usize) -> bool {
        self.pending.contains(&index)
    }

    pub fn status_predicates(&self) -> &[StatusPredicate] {
        &self.status_predicates
    }

    pub fn alternatives(&self) -> &[ConditionNode] {
        &self.alternatives
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn is_reusable(&self) -> bool {
        self.reusable
    }

    /// Whether this node or an alternative has status predicates
    pub fn requires_script(&self) -> bool {
        !self.status_predicates.is_empty() || self.alternatives.iter().any(|a| a.requires_script())
    }

    /// Whether a conjunction has all its events and now only waits for
    /// predicates
    pub fn awaiting_predicates(&self) -> bool {
        let this = self.pending.is_empty() && !self.status_predicates.is_empty();
        this || self.alternatives.iter().any(|a| a.awaiting_predicates())
    }

    /// Feed an event into this node and its alternatives
    ///
    /// Each pass consumes the first pending pattern the event matches; passes
    /// repeat until nothing else matches, so one event can satisfy several
    /// patterns of the same conjunction.
    pub fn process_event(&mut self, event: &Event) {
        for alternative in &mut self.alternatives {
            alternative.process_event(event);
        }

        while let Some(pos) = self
            .pending
            .iter()
            .position(|&i| self.patterns[i].matches(event))
        {
            self.pending.remove(pos);
        }
    }

    /// Whether this node's own conjunction holds
    ///
    /// Predicates are only evaluated once every pattern matched; a node
    /// without predicates never touches the script.
    pub fn this_satisfied(&self, script: Option<&dyn ScriptEngine>) -> Result<bool> {
        if !self.pending.is_empty() {
            return Ok(false);
        }
        if self.status_predicates.is_empty() {
            return Ok(true);
        }
        let script = script.ok_or_else(|| {
            TriggerError::ScriptUnavailable(format!(
                "status predicate {}",
                self.status_predicates[0].function()
            ))
        })?;
        for predicate in &self.status_predicates {
            if !predicate.is_fulfilled(script)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether this node or any alternative is this-satisfied
    pub fn satisfied(&self, script: Option<&dyn ScriptEngine>) -> Result<bool> {
        Ok(!self.satisfied_conjunctions(script)?.is_empty())
    }

    /// All conjunctions of this group that currently hold
    pub fn satisfied_conjunctions(&self, script: Option<&dyn ScriptEngine>) -> Result<Vec<Conjunction>> {
        let mut satisfied = Vec::new();
        if self.this_satisfied(script)? {
            satisfied.push(Conjunction::Main);
        }
        for (i, alternative) in self.alternatives.iter().enumerate() {
            if alternative.this_satisfied(script)? {
                satisfied.push(Conjunction::Alternative(i));
            }
        }
        Ok(satisfied)
    }

    /// Re-arm the node if it is reusable
    ///
    /// Returns false for a one-shot node, which the owner must then drop.
    pub fn reset(&mut self) -> bool {
        if !self.reusable {
            return false;
        }
        self.pending = (0..self.patterns.len()).collect();
        true
    }

    /// Fire the actions of the given conjunctions, main node first
    ///
    /// Every action runs even when an earlier one fails; the first failure
    /// is returned. Re-arming is left to [`ConditionNode::rearm`].
    pub fn fire(
        &self,
        conjunctions: &[Conjunction],
        bus: &mut dyn EventBus,
        scripts: &mut ScriptCache,
    ) -> Result<()> {
        let mut first_error = None;
        for conjunction in conjunctions {
            let action = match *conjunction {
                Conjunction::Main => &self.action,
                Conjunction::Alternative(i) => match self.alternatives.get(i) {
                    Some(alternative) => &alternative.action,
                    None => continue,
                },
            };
            if let Err(e) = action.fire(bus, scripts) {
                log::error!("Condition action failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Re-arm or retire the conjunctions that fired
    ///
    /// Returns false when the node itself retired and must be removed from
    /// its owner. A retired alternative is removed from this node.
    pub fn rearm(&mut self, conjunctions: &[Conjunction]) -> bool {
        let mut retired = Vec::new();
        for conjunction in conjunctions {
            match *conjunction {
                Conjunction::Main => {
                    if !self.reset() {
                        log::debug!("One-shot condition retired");
                        return false;
                    }
                }
                Conjunction::Alternative(i) => {
                    if let Some(alternative) = self.alternatives.get_mut(i) {
                        if !alternative.reset() {
                            retired.push(i);
                        }
                    }
                }
            }
        }
        retired.sort_unstable();
        retired.dedup();
        for i in retired.into_iter().rev() {
            log::debug!("One-shot alternative {} retired", i);
            self.alternatives.remove(i);
        }
        true
    }

    /// Save as a `<Condition>` element
    pub fn to_xml(&self, ctx: &XmlContext<'_>) -> XmlElement {
        let mut events = XmlElement::new("Events");
        for (i, pattern) in self.patterns.iter().enumerate() {
            events.push_child(
                pattern
                    .to_xml(ctx)
                    .with_attr("IsLeft", u8::from(self.is_pending(i))),
            );
        }

        let mut statuses = XmlElement::new("StatusConditions");
        for predicate in &self.status_predicates {
            statuses.push_child(predicate.to_xml());
        }

        let mut root = XmlElement::new("Condition")
            .with_attr("Reusable", u8::from(self.reusable))
            .with_child(events)
            .with_child(statuses)
            .with_child(self.action.to_xml(ctx));

        if !self.alternatives.is_empty() {
            let mut alternatives = XmlElement::new("Alternatives");
            for alternative in &self.alternatives {
                alternatives.push_child(alternative.to_xml(ctx));
            }
            root.push_child(alternatives);
        }
        root
    }

    /// Load from a `<Condition>` element
    pub fn from_xml(e: &XmlElement, ctx: &XmlContext<'_>) -> Result<Self> {
        let action = Action::from_xml(e.require_child("Action")?, ctx)?;
        let mut node = ConditionNode::new(action);
        node.reusable = e.bool_attr_or("Reusable", true)?;

        for (i, m) in e.require_child("Events")?.children_named("EventMatching").enumerate() {
            let pattern = EventPattern::from_xml(m, ctx).map_err(|err| {
                log::error!("Cannot load EventMatching {}: {}", i, err);
                err
            })?;
            node.patterns.push(pattern);
            if m.bool_attr("IsLeft")? {
                node.pending.push(i);
            }
        }

        for s in e.require_child("StatusConditions")?.children_named("StatusCondition") {
            node.status_predicates.push(StatusPredicate::from_xml(s)?);
        }

        if let Some(alternatives) = e.child("Alternatives") {
            for a in alternatives.children_named("Condition") {
                if a.child("Alternatives").is_some() {
                    return Err(TriggerError::NestedAlternatives);
                }
                node.alternatives.push(ConditionNode::from_xml(a, ctx)?);
            }
        }

        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::RecordingBus;
    use crate::config::EngineConfig;
    use crate::scripting::testing::MockScripts;
    use crate::xml::PlayerMap;

    fn emit(name: &str) -> Action {
        Action::Event(Event::new(name))
    }

    fn pattern(name: &str) -> EventPattern {
        EventPattern::new(Event::new(name)).ignore_unit_id().ignore_player_id()
    }

    #[test]
    fn test_delivery_order_does_not_matter() {
        let node = ConditionNode::new(emit("GameOver"))
            .with_pattern(pattern("AllUnitsDestroyed"))
            .with_pattern(pattern("LostMinimap"));

        let e1 = Event::new("AllUnitsDestroyed");
        let e2 = Event::new("LostMinimap");

        let mut forward = node.clone();
        forward.process_event(&e1);
        assert_eq!(forward.pending_count(), 1);
        forward.process_event(&e2);
        assert_eq!(forward.pending_count(), 0);

        let mut backward = node;
        backward.process_event(&e2);
        backward.process_event(&e1);
        assert_eq!(backward.pending_count(), 0);
    }

    #[test]
    fn test_unmatched_event_changes_nothing() {
        let mut node = ConditionNode::new(emit("GameOver")).with_pattern(pattern("LostMinimap"));
        node.process_event(&Event::new("GainedMinimap"));
        assert_eq!(node.pending_count(), 1);
        assert!(!node.this_satisfied(None).unwrap());
    }

    #[test]
    fn test_one_event_can_cover_duplicate_patterns() {
        let mut node = ConditionNode::new(emit("GameOver"))
            .with_pattern(pattern("UnitWithTypeDestroyed"))
            .with_pattern(pattern("LostMinimap"))
            .with_pattern(pattern("UnitWithTypeDestroyed"));

        node.process_event(&Event::new("UnitWithTypeDestroyed").with_unit_id(3));
        assert_eq!(node.pending_count(), 1);
        assert!(node.is_pending(1));
    }

    #[test]
    fn test_event_only_node_never_needs_script() {
        let mut node = ConditionNode::new(emit("GameOver")).with_pattern(pattern("LostMinimap"));
        assert!(!node.requires_script());
        node.process_event(&Event::new("LostMinimap"));
        assert!(node.this_satisfied(None).unwrap());
        assert!(node.this_satisfied(None).unwrap());
    }

    #[test]
    fn test_predicates_checked_after_patterns() {
        let mocks = MockScripts::new();
        mocks.set_predicate("has_no_factories", false);
        let engine = mocks.engine("scripts/m.rhai");
        let script: &dyn ScriptEngine = &engine;

        let mut node = ConditionNode::new(emit("PlayerLost"))
            .with_pattern(pattern("AllMobileUnitsDestroyed"))
            .with_status_predicate("has_no_factories");
        assert!(node.requires_script());

        assert!(!node.this_satisfied(Some(script)).unwrap());
        assert_eq!(mocks.state.lock().predicate_calls, 0);

        node.process_event(&Event::new("AllMobileUnitsDestroyed"));
        assert!(node.awaiting_predicates());
        assert!(!node.this_satisfied(Some(script)).unwrap());

        mocks.set_predicate("has_no_factories", true);
        assert!(node.this_satisfied(Some(script)).unwrap());
        assert!(node.this_satisfied(Some(script)).unwrap());
    }

    #[test]
    fn test_predicates_without_script_fail() {
        let mut node = ConditionNode::new(emit("PlayerLost")).with_status_predicate("ready");
        node.process_event(&Event::new("Advance"));
        assert!(matches!(
            node.this_satisfied(None),
            Err(TriggerError::ScriptUnavailable(_))
        ));
    }

    #[test]
    fn test_alternative_satisfies_group() {
        let alternative = ConditionNode::new(emit("PlayerWon")).with_pattern(pattern("GainedMinimap"));
        let mut node = ConditionNode::new(emit("PlayerLost"))
            .with_pattern(pattern("LostMinimap"))
            .with_alternative(alternative)
            .unwrap();

        node.process_event(&Event::new("GainedMinimap"));
        assert!(!node.this_satisfied(None).unwrap());
        assert!(node.satisfied(None).unwrap());
        assert_eq!(
            node.satisfied_conjunctions(None).unwrap(),
            vec![Conjunction::Alternative(0)]
        );
    }

    #[test]
    fn test_nested_alternatives_rejected() {
        let inner = ConditionNode::new(emit("GameOver"));
        let middle = ConditionNode::new(emit("GameOver")).with_alternative(inner).unwrap();
        let result = ConditionNode::new(emit("GameOver")).with_alternative(middle);
        assert!(matches!(result, Err(TriggerError::NestedAlternatives)));
    }

    #[test]
    fn test_fire_resets_reusable_node() {
        let mut node = ConditionNode::new(emit("GameOver"))
            .with_pattern(pattern("LostMinimap"))
            .with_pattern(pattern("AllUnitsDestroyed"));
        node.process_event(&Event::new("LostMinimap"));
        node.process_event(&Event::new("AllUnitsDestroyed"));

        let mut bus = RecordingBus::default();
        let mut scripts = ScriptCache::default();
        let which = node.satisfied_conjunctions(None).unwrap();
        node.fire(&which, &mut bus, &mut scripts).unwrap();
        assert!(node.rearm(&which));

        assert_eq!(bus.events.len(), 1);
        assert_eq!(node.pending_count(), 2);
        assert!(node.pending().next().unwrap().matches(&Event::new("LostMinimap")));
    }

    #[test]
    fn test_one_shot_node_retires() {
        let mut node = ConditionNode::new(emit("GameOver")).one_shot();
        assert!(!node.reset());

        let mut bus = RecordingBus::default();
        node.fire(&[Conjunction::Main], &mut bus, &mut ScriptCache::default())
            .unwrap();
        assert!(!node.rearm(&[Conjunction::Main]));
        assert_eq!(bus.events.len(), 1);
    }

    #[test]
    fn test_one_shot_main_still_fires_alternatives() {
        let won = ConditionNode::new(emit("PlayerWon")).with_pattern(pattern("LostMinimap"));
        let mut node = ConditionNode::new(emit("PlayerLost"))
            .with_pattern(pattern("LostMinimap"))
            .one_shot()
            .with_alternative(won)
            .unwrap();

        node.process_event(&Event::new("LostMinimap"));
        let which = node.satisfied_conjunctions(None).unwrap();
        assert_eq!(which, vec![Conjunction::Main, Conjunction::Alternative(0)]);

        let mut bus = RecordingBus::default();
        node.fire(&which, &mut bus, &mut ScriptCache::default()).unwrap();
        let fired: Vec<_> = bus.events.iter().map(|e| e.name()).collect();
        assert_eq!(fired, vec!["PlayerLost", "PlayerWon"]);
        assert!(!node.rearm(&which));
    }

    #[test]
    fn test_failing_action_does_not_stop_the_others() {
        let broken = ConditionNode::new(Action::Script {
            file: "scripts/m.rhai".to_string(),
            routine: "missing".to_string(),
        })
        .with_pattern(pattern("LostMinimap"));
        let node = ConditionNode::new(Action::Script {
            file: "scripts/m.rhai".to_string(),
            routine: "missing".to_string(),
        })
        .with_pattern(pattern("LostMinimap"))
        .with_alternative(broken)
        .unwrap()
        .with_alternative(ConditionNode::new(emit("PlayerLost")))
        .unwrap();

        let mocks = MockScripts::new();
        let mut scripts = ScriptCache::new(Some(std::sync::Arc::new(mocks)));
        let mut bus = RecordingBus::default();
        let which = [Conjunction::Main, Conjunction::Alternative(0), Conjunction::Alternative(1)];
        let err = node.fire(&which, &mut bus, &mut scripts).unwrap_err();

        assert!(matches!(err, TriggerError::MissingRoutine { .. }));
        assert_eq!(bus.events.len(), 1);
        assert_eq!(bus.events[0].name(), "PlayerLost");
    }

    #[test]
    fn test_alternative_policy_is_its_own() {
        let first = ConditionNode::new(emit("PlayerWon"))
            .with_pattern(pattern("GainedMinimap"))
            .one_shot();
        let second = ConditionNode::new(emit("PlayerLost")).with_pattern(pattern("LostMinimap"));
        let mut node = ConditionNode::new(emit("GameOver"))
            .with_pattern(pattern("AllUnitsDestroyed"))
            .one_shot()
            .with_alternative(first)
            .unwrap()
            .with_alternative(second)
            .unwrap();

        node.process_event(&Event::new("GainedMinimap"));
        let which = node.satisfied_conjunctions(None).unwrap();
        let mut bus = RecordingBus::default();
        node.fire(&which, &mut bus, &mut ScriptCache::default()).unwrap();

        assert!(node.rearm(&which));
        assert_eq!(bus.events[0].name(), "PlayerWon");
        assert_eq!(node.alternatives().len(), 1);
        assert_eq!(node.alternatives()[0].action(), &emit("PlayerLost"));
        assert_eq!(node.pending_count(), 1);
    }

    #[test]
    fn test_xml_keeps_partial_progress() {
        let players = PlayerMap::new(vec![128, 129]);
        let config = EngineConfig::default();
        let ctx = XmlContext::new(&players, &config);

        let alternative = ConditionNode::new(Action::Script {
            file: "scripts/m.rhai".to_string(),
            routine: "fallback".to_string(),
        })
        .with_pattern(pattern("GainedMinimap"))
        .one_shot();
        let mut node = ConditionNode::new(Action::Event(Event::new("PlayerLost").with_player_id(129)))
            .with_pattern(pattern("LostMinimap"))
            .with_pattern(EventPattern::new(Event::new("AllUnitsDestroyed").with_player_id(128)))
            .with_status_predicate("no_reinforcements")
            .with_alternative(alternative)
            .unwrap();
        node.process_event(&Event::new("LostMinimap"));

        let xml = node.to_xml(&ctx);
        let matchings: Vec<_> = xml
            .require_child("Events")
            .unwrap()
            .children_named("EventMatching")
            .map(|m| m.attr("IsLeft").unwrap().to_string())
            .collect();
        assert_eq!(matchings, vec!["0", "1"]);

        let text = xml.to_xml_string().unwrap();
        let loaded = ConditionNode::from_xml(&XmlElement::parse(&text).unwrap(), &ctx).unwrap();
        assert_eq!(loaded, node);
    }

    #[test]
    fn test_xml_missing_parts_fail() {
        let players = PlayerMap::default();
        let config = EngineConfig::default();
        let ctx = XmlContext::new(&players, &config);

        let full = ConditionNode::new(emit("GameOver"))
            .with_pattern(pattern("LostMinimap"))
            .to_xml(&ctx);

        for missing in ["Events", "StatusConditions", "Action"] {
            let mut broken = XmlElement::new("Condition");
            for child in full.children().iter().filter(|c| c.name() != missing) {
                broken.push_child(child.clone());
            }
            assert!(ConditionNode::from_xml(&broken, &ctx).is_err(), "{}", missing);
        }

        let mut no_is_left = XmlElement::new("Condition");
        for child in full.children() {
            if child.name() == "Events" {
                no_is_left.push_child(
                    XmlElement::new("Events").with_child(pattern("LostMinimap").to_xml(&ctx)),
                );
            } else {
                no_is_left.push_child(child.clone());
            }
        }
        assert!(matches!(
            ConditionNode::from_xml(&no_is_left, &ctx),
            Err(TriggerError::MissingAttribute { .. })
        ));
    }
}
