//! Type registry
//!
//! Explicit registration table standing in for runtime reflection: step
//! types by name, and codecs that know how to rebuild reference-typed
//! objects from their text or JSON form.

use crate::member::{Member, MemberRef};
use crate::row::SweepRowCollection;
use crate::step::StepType;
use crate::value::{DetachedObject, ObjectRef, Value};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Rebuild an object from its canonical text
pub type ParseFn = Arc<dyn Fn(&str) -> Result<ObjectRef, String> + Send + Sync>;

/// Rebuild an object from its JSON form
pub type FromJsonFn = Arc<dyn Fn(serde_json::Value) -> Result<ObjectRef, String> + Send + Sync>;

/// Construction primitives for one object type
#[derive(Clone, Default)]
pub struct ObjectCodec {
    parse: Option<ParseFn>,
    from_json: Option<FromJsonFn>,
}

impl ObjectCodec {
    /// Codec with no primitives; objects of this type can only be shared
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a text parser
    #[must_use]
    pub fn with_parse<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<ObjectRef, String> + Send + Sync + 'static,
    {
        self.parse = Some(Arc::new(f));
        self
    }

    /// Register a JSON deserializer
    #[must_use]
    pub fn with_from_json<F>(mut self, f: F) -> Self
    where
        F: Fn(serde_json::Value) -> Result<ObjectRef, String> + Send + Sync + 'static,
    {
        self.from_json = Some(Arc::new(f));
        self
    }

    /// Text parser, if registered
    #[inline]
    #[must_use]
    pub fn parser(&self) -> Option<&ParseFn> {
        self.parse.as_ref()
    }

    /// JSON deserializer, if registered
    #[inline]
    #[must_use]
    pub fn json_decoder(&self) -> Option<&FromJsonFn> {
        self.from_json.as_ref()
    }
}

impl Debug for ObjectCodec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCodec")
            .field("parse", &self.parse.is_some())
            .field("from_json", &self.from_json.is_some())
            .finish()
    }
}

/// Registry of step types and object codecs
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    step_types: IndexMap<String, Arc<StepType>>,
    codecs: HashMap<String, ObjectCodec>,
}

impl TypeRegistry {
    /// Empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step type, replacing one with the same name
    pub fn register_step_type(&mut self, step_type: Arc<StepType>) {
        self.step_types
            .insert(step_type.name().to_string(), step_type);
    }

    /// Builder-style [`Self::register_step_type`]
    #[must_use]
    pub fn with_step_type(mut self, step_type: Arc<StepType>) -> Self {
        self.register_step_type(step_type);
        self
    }

    /// Register an object codec
    pub fn register_codec(&mut self, type_name: impl Into<String>, codec: ObjectCodec) {
        self.codecs.insert(type_name.into(), codec);
    }

    /// Builder-style [`Self::register_codec`]
    #[must_use]
    pub fn with_codec(mut self, type_name: impl Into<String>, codec: ObjectCodec) -> Self {
        self.register_codec(type_name, codec);
        self
    }

    /// Look up a step type
    #[must_use]
    pub fn step_type(&self, name: &str) -> Option<&Arc<StepType>> {
        self.step_types.get(name)
    }

    /// Registered step types in registration order
    pub fn step_types(&self) -> impl Iterator<Item = &Arc<StepType>> {
        self.step_types.values()
    }

    /// Look up a codec
    #[must_use]
    pub fn codec(&self, type_name: &str) -> Option<&ObjectCodec> {
        self.codecs.get(type_name)
    }

    /// Resolve a persisted member reference against registered types
    #[must_use]
    pub fn member(&self, member: &MemberRef) -> Option<Member> {
        self.step_type(&member.declaring_type)?
            .get_member(&member.member)
    }

    /// Parse an object from text using its registered codec
    ///
    /// # Errors
    /// Returns a description of the failure if no parser is registered or
    /// parsing fails.
    pub fn parse_object(&self, type_name: &str, text: &str) -> Result<ObjectRef, String> {
        let parser = self
            .codec(type_name)
            .and_then(ObjectCodec::parser)
            .ok_or_else(|| format!("no text codec registered for {type_name}"))?;
        parser(text)
    }

    /// Rebuild an object from JSON using its registered codec
    ///
    /// # Errors
    /// Returns a description of the failure if no decoder is registered or
    /// decoding fails.
    pub fn object_from_json(&self, type_name: &str, json: serde_json::Value) -> Result<ObjectRef, String> {
        let decoder = self
            .codec(type_name)
            .and_then(ObjectCodec::json_decoder)
            .ok_or_else(|| format!("no json codec registered for {type_name}"))?;
        decoder(json)
    }

    /// Replace detached objects (as produced by deserialization) with live
    /// objects built by their codecs
    ///
    /// Objects whose codec is missing or fails stay detached; the failure is
    /// logged.
    #[must_use]
    pub fn rehydrate(&self, value: Value) -> Value {
        match value {
            Value::Object(obj) => {
                let rebuilt = obj
                    .downcast_ref::<DetachedObject>()
                    .and_then(|detached| self.rehydrate_object(detached));
                rebuilt.unwrap_or(Value::Object(obj))
            }
            Value::List(items) => Value::List(items.into_iter().map(|v| self.rehydrate(v)).collect()),
            Value::Rows(rows) => Value::Rows(self.rehydrate_rows(rows)),
            other => other,
        }
    }

    fn rehydrate_rows(&self, mut rows: SweepRowCollection) -> SweepRowCollection {
        for row in rows.iter_mut() {
            row.map_values(|v| self.rehydrate(v));
        }
        rows
    }

    fn rehydrate_object(&self, detached: &DetachedObject) -> Option<Value> {
        let from_json = self.object_from_json(&detached.type_name, detached.data.clone());
        let rebuilt = match (from_json, &detached.data) {
            (Ok(obj), _) => Ok(obj),
            (Err(_), serde_json::Value::String(text)) => self.parse_object(&detached.type_name, text),
            (Err(e), _) => Err(e),
        };
        match rebuilt {
            Ok(obj) => Some(Value::Object(obj)),
            Err(reason) => {
                tracing::warn!(
                    object_type = %detached.type_name,
                    %reason,
                    "object left detached after load"
                );
                None
            }
        }
    }
}
