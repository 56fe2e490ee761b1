//! Type descriptors for member values
//!
//! A [`TypeDescriptor`] is the declared value type of a member. Together with
//! the display name it forms the equivalence key used to treat members on
//! unrelated step types as the same swept property.

use crate::registry::TypeRegistry;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Declared type of a member value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeDescriptor {
    /// Boolean flag
    Bool,
    /// Signed integer
    Int,
    /// Floating point number
    Float,
    /// Free text
    Text,
    /// Named enumeration with its variant names
    Enum {
        /// Enumeration type name
        name: String,
        /// Allowed variant names
        variants: Vec<String>,
    },
    /// Homogeneous list
    List(Box<TypeDescriptor>),
    /// Sweep row table (used by nested sweeps)
    Rows,
    /// Reference-typed object, identified by its registered type name
    Object(String),
}

impl TypeDescriptor {
    /// Create an enum descriptor
    #[must_use]
    pub fn enumeration(name: impl Into<String>, variants: &[&str]) -> Self {
        Self::Enum {
            name: name.into(),
            variants: variants.iter().map(|v| (*v).to_string()).collect(),
        }
    }

    /// Create a list descriptor
    #[inline]
    #[must_use]
    pub fn list(element: TypeDescriptor) -> Self {
        Self::List(Box::new(element))
    }

    /// Numeric types accept range sweeps
    #[inline]
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Values of this type are copied rather than shared
    #[must_use]
    pub fn is_by_value(&self) -> bool {
        match self {
            Self::Bool | Self::Int | Self::Float | Self::Text | Self::Enum { .. } => true,
            Self::List(inner) => inner.is_by_value(),
            Self::Rows | Self::Object(_) => false,
        }
    }

    /// Parse a text cell into a value of this type
    ///
    /// Object types are parsed through the codec registered in `registry`.
    ///
    /// # Errors
    /// Returns [`ParseValueError`] if the text is not a valid literal or
    /// matches more than one enum variant.
    pub fn parse_text(&self, text: &str, registry: &TypeRegistry) -> Result<Value, ParseValueError> {
        let trimmed = text.trim();
        match self {
            Self::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Value::Bool(true)),
                "false" | "0" | "no" => Ok(Value::Bool(false)),
                _ => Err(ParseValueError::invalid(self, text, "expected a boolean")),
            },
            Self::Int => trimmed
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| ParseValueError::invalid(self, text, e.to_string())),
            Self::Float => trimmed
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| ParseValueError::invalid(self, text, e.to_string())),
            Self::Text => Ok(Value::Text(text.to_string())),
            Self::Enum { variants, .. } => parse_variant(self, variants, trimmed),
            Self::List(inner) => {
                if trimmed.is_empty() {
                    return Ok(Value::List(Vec::new()));
                }
                trimmed
                    .split(',')
                    .map(|part| inner.parse_text(part, registry))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List)
            }
            Self::Rows => Err(ParseValueError::invalid(
                self,
                text,
                "row tables cannot be parsed from text",
            )),
            Self::Object(name) => registry
                .parse_object(name, trimmed)
                .map(Value::Object)
                .map_err(|reason| ParseValueError::invalid(self, text, reason)),
        }
    }
}

fn parse_variant(ty: &TypeDescriptor, variants: &[String], text: &str) -> Result<Value, ParseValueError> {
    if let Some(exact) = variants.iter().find(|v| v.as_str() == text) {
        return Ok(Value::Enum(exact.clone()));
    }
    let loose: Vec<&String> = variants
        .iter()
        .filter(|v| v.eq_ignore_ascii_case(text))
        .collect();
    match loose.as_slice() {
        [single] => Ok(Value::Enum((*single).clone())),
        [] => Err(ParseValueError::invalid(ty, text, "unknown variant")),
        _ => Err(ParseValueError::Ambiguous {
            type_name: ty.to_string(),
            text: text.to_string(),
            candidates: loose.into_iter().cloned().collect(),
        }),
    }
}

impl Display for TypeDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "Bool"),
            Self::Int => write!(f, "Int"),
            Self::Float => write!(f, "Float"),
            Self::Text => write!(f, "Text"),
            Self::Enum { name, .. } => write!(f, "{name}"),
            Self::List(inner) => write!(f, "List<{inner}>"),
            Self::Rows => write!(f, "Rows"),
            Self::Object(name) => write!(f, "{name}"),
        }
    }
}

/// Errors converting text into typed values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseValueError {
    /// Text is not a valid literal for the type
    #[error("cannot convert '{text}' to {type_name}: {reason}")]
    Invalid {
        /// Target type
        type_name: String,
        /// Offending text
        text: String,
        /// Conversion failure detail
        reason: String,
    },

    /// Text matches more than one candidate
    #[error("'{text}' is ambiguous for {type_name}: matches {candidates:?}")]
    Ambiguous {
        /// Target type
        type_name: String,
        /// Offending text
        text: String,
        /// Matching candidates
        candidates: Vec<String>,
    },
}

impl ParseValueError {
    fn invalid(ty: &TypeDescriptor, text: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            type_name: ty.to_string(),
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}
