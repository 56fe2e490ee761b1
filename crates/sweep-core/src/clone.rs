//! Value clone policy
//!
//! Scalars are copied. Objects are copied by a text round trip through their
//! registered parser, else by a JSON round trip through their registered
//! decoder, else the reference is shared. Sharing is reported as
//! [`CloneOutcome::Shared`] and logged; a strict cloner refuses it with
//! [`CloneError::NotClonable`].

use crate::error::CloneError;
use crate::registry::TypeRegistry;
use crate::value::{DetachedObject, ObjectRef, Value};
use std::sync::Arc;

/// How a value was copied
///
/// Ordered from cheapest to least isolated, so the outcome of a composite
/// copy is the maximum over its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum CloneOutcome {
    /// By-value copy
    #[default]
    Copied,
    /// Text form parsed back through the registered codec
    TextRoundTrip,
    /// JSON form decoded back through the registered codec
    JsonRoundTrip,
    /// No round trip available; the copy aliases the original
    Shared,
}

impl CloneOutcome {
    /// Whether the copy aliases the original
    #[inline]
    #[must_use]
    pub fn is_shared(self) -> bool {
        self == Self::Shared
    }
}

/// A copied value and how it was produced
#[derive(Debug, Clone, PartialEq)]
pub struct Cloned<T> {
    /// The copy
    pub value: T,
    /// Least isolated path taken
    pub outcome: CloneOutcome,
}

impl<T> Cloned<T> {
    /// Wrap a copy
    #[inline]
    #[must_use]
    pub fn new(value: T, outcome: CloneOutcome) -> Self {
        Self { value, outcome }
    }

    /// Transform the copy, keeping the outcome
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Cloned<U> {
        Cloned {
            value: f(self.value),
            outcome: self.outcome,
        }
    }
}

/// Applies the clone policy using the codecs of a [`TypeRegistry`]
#[derive(Debug, Clone)]
pub struct ValueCloner {
    registry: Arc<TypeRegistry>,
    strict: bool,
}

impl ValueCloner {
    /// Lenient cloner: unclonable objects are shared
    #[inline]
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            strict: false,
        }
    }

    /// Refuse to share unclonable objects
    #[inline]
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Whether sharing is refused
    #[inline]
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Registry the codecs come from
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Deep-copy a value
    ///
    /// # Errors
    /// Returns [`CloneError::NotClonable`] in strict mode when an object has
    /// neither round trip available.
    pub fn clone_value(&self, value: &Value) -> Result<Cloned<Value>, CloneError> {
        match value {
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Text(_) | Value::Enum(_) => {
                Ok(Cloned::new(value.clone(), CloneOutcome::Copied))
            }
            Value::List(items) => {
                let mut outcome = CloneOutcome::Copied;
                let mut copied = Vec::with_capacity(items.len());
                for item in items {
                    let item = self.clone_value(item)?;
                    outcome = outcome.max(item.outcome);
                    copied.push(item.value);
                }
                Ok(Cloned::new(Value::List(copied), outcome))
            }
            Value::Rows(rows) => Ok(rows.deep_clone(self)?.map(Value::Rows)),
            Value::Object(obj) => self.clone_object(obj).map(|c| c.map(Value::Object)),
        }
    }

    /// Deep-copy a value, discarding the outcome
    ///
    /// # Errors
    /// See [`Self::clone_value`].
    pub fn copy(&self, value: &Value) -> Result<Value, CloneError> {
        self.clone_value(value).map(|c| c.value)
    }

    fn clone_object(&self, obj: &ObjectRef) -> Result<Cloned<ObjectRef>, CloneError> {
        if let Some(detached) = obj.downcast_ref::<DetachedObject>() {
            return Ok(Cloned::new(
                ObjectRef::new(detached.clone()),
                CloneOutcome::Copied,
            ));
        }

        let type_name = obj.type_name();
        if let Some(text) = obj.object().to_text() {
            match self.registry.parse_object(type_name, &text) {
                Ok(copy) => return Ok(Cloned::new(copy, CloneOutcome::TextRoundTrip)),
                Err(reason) => {
                    tracing::debug!(object_type = %type_name, %reason, "text round trip unavailable");
                }
            }
        }
        if let Some(json) = obj.object().to_json() {
            match self.registry.object_from_json(type_name, json) {
                Ok(copy) => return Ok(Cloned::new(copy, CloneOutcome::JsonRoundTrip)),
                Err(reason) => {
                    tracing::debug!(object_type = %type_name, %reason, "json round trip unavailable");
                }
            }
        }

        if self.strict {
            tracing::error!(object_type = %type_name, "object cannot be copied and sharing is refused");
            return Err(CloneError::NotClonable {
                type_name: type_name.to_string(),
            });
        }
        tracing::warn!(object_type = %type_name, "object cannot be copied; sharing the reference");
        Ok(Cloned::new(obj.clone(), CloneOutcome::Shared))
    }
}
