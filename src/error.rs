//! Error types for the trigger engine

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, TriggerError>;

/// Errors raised while loading, saving or dispatching triggers
#[derive(Debug, Error)]
pub enum TriggerError {
    /// The XML document could not be read or written
    #[error("XML error: {0}")]
    Xml(String),

    /// A required child element is absent
    #[error("<{parent}> has no <{child}> element")]
    MissingElement { parent: String, child: String },

    /// A required attribute is absent
    #[error("<{element}> is missing attribute {attribute}")]
    MissingAttribute { element: String, attribute: String },

    /// An attribute is present but cannot be parsed
    #[error("<{element}> attribute {attribute} has invalid value '{value}'")]
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
    },

    /// The Action element names a type the engine does not know
    #[error("Action type '{0}' is not supported")]
    UnknownActionType(String),

    /// Alternatives may only be attached to a top-level condition
    #[error("alternatives of alternatives are not supported")]
    NestedAlternatives,

    /// The event name was never declared with the event manager
    #[error("event '{0}' has not been declared")]
    UnknownEvent(String),

    /// A script engine was required but none could be provided
    #[error("no script engine available for '{0}'")]
    ScriptUnavailable(String),

    /// The script does not define the requested function
    #[error("script '{file}' has no function '{routine}'")]
    MissingRoutine { file: String, routine: String },

    /// The script file name is not acceptable
    #[error("invalid script file '{0}'")]
    InvalidScriptFile(String),

    /// The script failed to compile or run
    #[error("script error: {0}")]
    Script(String),

    /// Configuration could not be parsed
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TriggerError {
    pub(crate) fn missing_element(parent: &str, child: &str) -> Self {
        Self::MissingElement {
            parent: parent.to_string(),
            child: child.to_string(),
        }
    }

    pub(crate) fn missing_attribute(element: &str, attribute: &str) -> Self {
        Self::MissingAttribute {
            element: element.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub(crate) fn invalid_attribute(element: &str, attribute: &str, value: &str) -> Self {
        Self::InvalidAttribute {
            element: element.to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_missing_attribute() {
        let err = TriggerError::missing_attribute("EventMatching", "IsLeft");
        let s = err.to_string();
        assert!(s.contains("EventMatching"));
        assert!(s.contains("IsLeft"));
    }

    #[test]
    fn test_display_missing_routine() {
        let err = TriggerError::MissingRoutine {
            file: "scripts/mission.rhai".to_string(),
            routine: "on_win".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "script 'scripts/mission.rhai' has no function 'on_win'"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TriggerError = io.into();
        assert!(matches!(err, TriggerError::Io(_)));
    }
}
