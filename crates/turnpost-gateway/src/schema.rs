//! Closed JSON-schema subset for tool parameters.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use turnpost_core::error::DomainError;

/// Parameter names that identify internal state. Compared after lower-casing
/// and dropping everything but ASCII letters and digits, so `session_id`,
/// `sessionId` and `Session-ID` all match.
const INTERNAL_IDENTIFIERS: [&str; 5] = [
    "sessionid",
    "version",
    "expectedversion",
    "turnid",
    "correlationid",
];

/// Whether a parameter or result key names an internal identifier.
#[must_use]
pub fn is_internal_identifier(name: &str) -> bool {
    let normalized: String = name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    INTERNAL_IDENTIFIERS.contains(&normalized.as_str())
}

/// Generic JSON-Schema subset needed for tool definitions.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonSchema {
    Boolean {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    String {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Integer {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        minimum: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
    },
    Object {
        properties: BTreeMap<String, JsonSchema>,
        required: Vec<String>,
        #[serde(rename = "additionalProperties")]
        additional_properties: bool,
    },
}

impl JsonSchema {
    /// A described string.
    #[must_use]
    pub fn string(description: &str) -> Self {
        Self::String {
            description: Some(description.to_owned()),
        }
    }

    /// A described integer within `[minimum, maximum]`.
    #[must_use]
    pub fn integer(description: &str, minimum: i64, maximum: i64) -> Self {
        Self::Integer {
            description: Some(description.to_owned()),
            minimum: Some(minimum),
            maximum: Some(maximum),
        }
    }

    fn check(&self, tool: &str, name: &str, value: &Value) -> Result<(), DomainError> {
        let mismatch = |expected: &str| {
            DomainError::Validation(format!("{tool}: parameter {name} must be {expected}"))
        };
        match self {
            Self::Boolean { .. } => value.as_bool().map(|_| ()).ok_or_else(|| mismatch("a boolean")),
            Self::String { .. } => value.as_str().map(|_| ()).ok_or_else(|| mismatch("a string")),
            Self::Integer {
                minimum, maximum, ..
            } => {
                let n = value.as_i64().ok_or_else(|| mismatch("an integer"))?;
                if minimum.is_some_and(|min| n < min) || maximum.is_some_and(|max| n > max) {
                    return Err(DomainError::Validation(format!(
                        "{tool}: parameter {name} must be between {} and {}",
                        minimum.unwrap_or(i64::MIN),
                        maximum.unwrap_or(i64::MAX)
                    )));
                }
                Ok(())
            }
            Self::Object { .. } => value.as_object().map(|_| ()).ok_or_else(|| mismatch("an object")),
        }
    }
}

/// A tool definition as shown to the model: `{name, description, parameters}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: JsonSchema,
}

impl ToolSchema {
    /// A tool that takes no parameters.
    #[must_use]
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_owned(),
            description: description.to_owned(),
            parameters: JsonSchema::Object {
                properties: BTreeMap::new(),
                required: Vec::new(),
                additional_properties: false,
            },
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: &str, schema: JsonSchema, required: bool) -> Self {
        if let JsonSchema::Object {
            properties,
            required: required_names,
            ..
        } = &mut self.parameters
        {
            properties.insert(name.to_owned(), schema);
            if required {
                required_names.push(name.to_owned());
            }
        }
        self
    }

    /// Declared parameter names.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        let properties = match &self.parameters {
            JsonSchema::Object { properties, .. } => Some(properties),
            _ => None,
        };
        properties.into_iter().flat_map(|p| p.keys().map(String::as_str))
    }

    /// Checks that the schema is closed and declares no internal identifier.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` describing the first problem.
    pub fn ensure_closed(&self) -> Result<(), DomainError> {
        match &self.parameters {
            JsonSchema::Object {
                additional_properties: false,
                ..
            } => {}
            _ => {
                return Err(DomainError::Validation(format!(
                    "tool {} must take a closed object of parameters",
                    self.name
                )));
            }
        }
        if let Some(name) = self.parameter_names().find(|n| is_internal_identifier(n)) {
            return Err(DomainError::Validation(format!(
                "tool {} must not declare internal identifier {name}",
                self.name
            )));
        }
        Ok(())
    }

    /// Validates model-supplied arguments against the closed schema.
    ///
    /// Undeclared and internal parameters are rejected before any type
    /// checks run. `null` counts as an empty argument object.
    ///
    /// # Errors
    ///
    /// - `DomainError::ForbiddenParameter` for an internal or undeclared name
    /// - `DomainError::Validation` for non-object arguments, a missing
    ///   required parameter, or a mistyped value
    pub fn validate(&self, arguments: &Value) -> Result<Map<String, Value>, DomainError> {
        let arguments = match arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            _ => {
                return Err(DomainError::Validation(format!(
                    "{}: arguments must be an object",
                    self.name
                )));
            }
        };
        let JsonSchema::Object {
            properties,
            required,
            ..
        } = &self.parameters
        else {
            return Err(DomainError::Validation(format!(
                "{}: tool has no parameter schema",
                self.name
            )));
        };

        if let Some(parameter) = arguments
            .keys()
            .find(|key| is_internal_identifier(key) || !properties.contains_key(*key))
        {
            return Err(DomainError::ForbiddenParameter {
                tool: self.name.clone(),
                parameter: parameter.clone(),
            });
        }
        if let Some(missing) = required.iter().find(|name| !arguments.contains_key(*name)) {
            return Err(DomainError::Validation(format!(
                "{}: missing required parameter {missing}",
                self.name
            )));
        }
        for (name, value) in &arguments {
            if let Some(schema) = properties.get(name) {
                schema.check(&self.name, name, value)?;
            }
        }
        Ok(arguments)
    }
}
