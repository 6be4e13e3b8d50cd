//! Script engine seam
//!
//! Conditions consult scripts for status predicates, script actions call
//! script routines, and listeners forward events to script event handlers.
//! The engine only needs the narrow [`ScriptEngine`] contract; how a script
//! is compiled and run is up to the implementation.
//!
//! - **Rhai Engine** (`rhai-scripting` feature): scripts written in Rhai

#[cfg(feature = "rhai-scripting")]
pub mod rhai_engine;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::{Result, TriggerError};

/// Values scripts can store between calls and persist in save games
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScriptValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

/// Trait that all script engines must implement
pub trait ScriptEngine {
    /// Name of the script file this engine was created for
    fn file_name(&self) -> &str;

    /// Check if the script defines a function
    fn has_function(&self, name: &str) -> bool;

    /// Call a boolean status predicate
    fn evaluate_predicate(&self, function: &str) -> Result<bool>;

    /// Call a routine for its side effects. Parameters are not supported.
    fn call_routine(&mut self, function: &str) -> Result<()>;

    /// Snapshot the script's variables for a save game
    fn save_data(&self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    /// Restore variables from [`ScriptEngine::save_data`] output
    fn load_data(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Boxed script engine type
pub type BoxedScriptEngine = Box<dyn ScriptEngine>;

/// Creates script engines on demand, keyed by script file name
pub trait ScriptFactory {
    fn create(&self, file_name: &str) -> Result<BoxedScriptEngine>;
}

/// Script engines created so far, one per script file
///
/// Engines are created the first time a file is needed and reused afterwards.
#[derive(Default)]
pub struct ScriptCache {
    factory: Option<Arc<dyn ScriptFactory>>,
    engines: HashMap<String, BoxedScriptEngine>,
}

impl ScriptCache {
    pub fn new(factory: Option<Arc<dyn ScriptFactory>>) -> Self {
        Self {
            factory,
            engines: HashMap::new(),
        }
    }

    pub fn set_factory(&mut self, factory: Arc<dyn ScriptFactory>) {
        self.factory = Some(factory);
    }

    pub fn has_factory(&self) -> bool {
        self.factory.is_some()
    }

    pub fn is_loaded(&self, file_name: &str) -> bool {
        self.engines.contains_key(file_name)
    }

    /// Engine for `file_name` if it was already created
    pub fn get(&self, file_name: &str) -> Option<&dyn ScriptEngine> {
        self.engines.get(file_name).map(|e| &**e)
    }

    /// Engine for `file_name`, creating it through the factory if needed
    pub fn load(&mut self, file_name: &str) -> Result<&mut BoxedScriptEngine> {
        if !self.engines.contains_key(file_name) {
            let factory = self
                .factory
                .as_ref()
                .ok_or_else(|| TriggerError::ScriptUnavailable(file_name.to_string()))?;
            let engine = factory.create(file_name)?;
            log::debug!("Created script engine for {}", file_name);
            self.engines.insert(file_name.to_string(), engine);
        }
        self.engines
            .get_mut(file_name)
            .ok_or_else(|| TriggerError::ScriptUnavailable(file_name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockScripts;
    use super::*;

    #[test]
    fn test_cache_creates_once() {
        let scripts = MockScripts::new();
        scripts.add_routine("init");
        let mut cache = ScriptCache::new(Some(Arc::new(scripts.clone())));

        assert!(cache.get("scripts/a.rhai").is_none());
        cache.load("scripts/a.rhai").unwrap().call_routine("init").unwrap();
        cache.load("scripts/a.rhai").unwrap();

        assert_eq!(scripts.state.lock().created, vec!["scripts/a.rhai"]);
        assert!(cache.is_loaded("scripts/a.rhai"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_without_factory() {
        let mut cache = ScriptCache::default();
        assert!(!cache.has_factory());
        assert!(matches!(
            cache.load("scripts/a.rhai"),
            Err(TriggerError::ScriptUnavailable(_))
        ));
    }
}
