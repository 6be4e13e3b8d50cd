//! Rhai Scripting Engine
//!
//! Mission scripts are written in Rhai, a simple, safe scripting language
//! embedded in Rust.
//!
//! # Script API
//!
//! ## Variables
//! - `get_var(name)` - Get a stored variable (unit if unset)
//! - `set_var(name, value)` - Store an int, float, bool or string
//! - `has_var(name)` - Check if a variable is stored
//!
//! ## Logging
//! - `log(message)` - Log at info level
//! - `log_debug(message)` - Log at debug level
//!
//! Variables outlive a single call and are written into save games; plain
//! script globals are not.

use super::{BoxedScriptEngine, ScriptEngine, ScriptFactory, ScriptValue};
use crate::{Result, TriggerError};
use parking_lot::RwLock;
use rhai::{Dynamic, Engine as RhaiVM, FuncArgs, Scope, AST};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Shared state between Rhai script and Rust
#[derive(Default)]
struct SharedState {
    variables: BTreeMap<String, ScriptValue>,
}

fn to_script_value(value: &Dynamic) -> Option<ScriptValue> {
    if let Ok(v) = value.as_int() {
        return Some(ScriptValue::Int(v));
    }
    if let Ok(v) = value.as_float() {
        return Some(ScriptValue::Float(v));
    }
    if let Ok(v) = value.as_bool() {
        return Some(ScriptValue::Bool(v));
    }
    if value.is_string() {
        return value.clone().into_string().ok().map(ScriptValue::String);
    }
    None
}

fn to_dynamic(value: &ScriptValue) -> Dynamic {
    match value {
        ScriptValue::Int(v) => Dynamic::from(*v),
        ScriptValue::Float(v) => Dynamic::from(*v),
        ScriptValue::Bool(v) => Dynamic::from(*v),
        ScriptValue::String(v) => Dynamic::from(v.clone()),
    }
}

/// Rhai scripting engine
pub struct RhaiScript {
    file_name: String,
    /// The Rhai VM
    vm: RhaiVM,
    /// Compiled script AST
    ast: AST,
    /// Shared state
    state: Arc<RwLock<SharedState>>,
}

impl RhaiScript {
    /// Create a new Rhai engine from script source
    pub fn new(file_name: impl Into<String>, source: &str) -> Result<Self> {
        let file_name = file_name.into();
        let mut vm = RhaiVM::new();

        // Limit script capabilities for safety
        vm.set_max_expr_depths(64, 64);
        vm.set_max_call_levels(32);
        vm.set_max_operations(1_000_000);
        vm.set_max_string_size(10_000);
        vm.set_max_array_size(10_000);
        vm.set_max_map_size(1_000);

        let state = Arc::new(RwLock::new(SharedState::default()));
        Self::register_state_functions(&mut vm, state.clone());

        let ast = vm
            .compile(source)
            .map_err(|e| TriggerError::Script(format!("{}: compilation error: {}", file_name, e)))?;

        log::debug!("Compiled script {}", file_name);
        Ok(Self {
            file_name,
            vm,
            ast,
            state,
        })
    }

    fn register_state_functions(vm: &mut RhaiVM, state: Arc<RwLock<SharedState>>) {
        // get_var(name) -> Dynamic
        let s = state.clone();
        vm.register_fn("get_var", move |name: &str| -> Dynamic {
            s.read()
                .variables
                .get(name)
                .map(to_dynamic)
                .unwrap_or(Dynamic::UNIT)
        });

        // has_var(name) -> bool
        let s = state.clone();
        vm.register_fn("has_var", move |name: &str| -> bool {
            s.read().variables.contains_key(name)
        });

        // set_var(name, value)
        let s = state;
        vm.register_fn("set_var", move |name: &str, value: Dynamic| {
            match to_script_value(&value) {
                Some(v) => {
                    s.write().variables.insert(name.to_string(), v);
                }
                None => log::warn!(
                    "[Rhai] set_var('{}'): unsupported type {}",
                    name,
                    value.type_name()
                ),
            }
        });

        // log(message)
        vm.register_fn("log", |message: &str| {
            log::info!("[Rhai] {}", message);
        });

        vm.register_fn("log_debug", |message: &str| {
            log::debug!("[Rhai] {}", message);
        });
    }

    /// Call a script function
    fn call_fn(&self, fn_name: &str, args: impl FuncArgs) -> Result<Dynamic> {
        if !self.has_function(fn_name) {
            return Err(TriggerError::MissingRoutine {
                file: self.file_name.clone(),
                routine: fn_name.to_string(),
            });
        }
        self.vm
            .call_fn::<Dynamic>(&mut Scope::new(), &self.ast, fn_name, args)
            .map_err(|e| TriggerError::Script(format!("{}: {}: {}", self.file_name, fn_name, e)))
    }

    /// Read a stored variable
    pub fn variable(&self, name: &str) -> Option<ScriptValue> {
        self.state.read().variables.get(name).cloned()
    }

    /// Store a variable, as `set_var` would from inside the script
    pub fn set_variable(&self, name: &str, value: ScriptValue) {
        self.state.write().variables.insert(name.to_string(), value);
    }
}

impl ScriptEngine for RhaiScript {
    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn has_function(&self, fn_name: &str) -> bool {
        self.ast.iter_functions().any(|f| f.name == fn_name)
    }

    fn evaluate_predicate(&self, function: &str) -> Result<bool> {
        let result = self.call_fn(function, ())?;
        if let Ok(b) = result.as_bool() {
            return Ok(b);
        }
        if let Ok(i) = result.as_int() {
            return Ok(i == 1);
        }
        Err(TriggerError::Script(format!(
            "{}: {} returned {} instead of a bool",
            self.file_name,
            function,
            result.type_name()
        )))
    }

    fn call_routine(&mut self, function: &str) -> Result<()> {
        self.call_fn(function, ())?;
        Ok(())
    }

    fn save_data(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.state.read().variables)
            .map_err(|e| TriggerError::Script(format!("{}: saving variables: {}", self.file_name, e)))
    }

    fn load_data(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let variables: BTreeMap<String, ScriptValue> = serde_json::from_slice(data)
            .map_err(|e| TriggerError::Script(format!("{}: loading variables: {}", self.file_name, e)))?;
        self.state.write().variables = variables;
        Ok(())
    }
}

/// Creates [`RhaiScript`] engines from in-memory script sources
#[derive(Debug, Clone, Default)]
pub struct RhaiScriptFactory {
    sources: HashMap<String, String>,
}

impl RhaiScriptFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a script source available under `file_name`
    pub fn add_script(&mut self, file_name: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(file_name.into(), source.into());
    }

    /// Builder form of [`RhaiScriptFactory::add_script`]
    pub fn with_script(mut self, file_name: impl Into<String>, source: impl Into<String>) -> Self {
        self.add_script(file_name, source);
        self
    }

    pub fn has_script(&self, file_name: &str) -> bool {
        self.sources.contains_key(file_name)
    }
}

impl ScriptFactory for RhaiScriptFactory {
    fn create(&self, file_name: &str) -> Result<BoxedScriptEngine> {
        let source = self
            .sources
            .get(file_name)
            .ok_or_else(|| TriggerError::ScriptUnavailable(file_name.to_string()))?;
        Ok(Box::new(RhaiScript::new(file_name, source)?))
    }
}
