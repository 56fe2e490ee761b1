//! Member values
//!
//! [`Value`] is the dynamic value carried by members, sweep series and rows.
//! Scalar variants have by-value semantics. [`ObjectRef`] is a shared
//! reference to an externally defined object; copying one requires the
//! clone policy in [`crate::clone`].

use crate::row::SweepRowCollection;
use crate::types::TypeDescriptor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::any::Any;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

// 2^63, the first magnitude outside i64
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Dynamic member value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Text
    Text(String),
    /// Enum variant name
    Enum(String),
    /// List of values
    List(Vec<Value>),
    /// Nested sweep table
    Rows(SweepRowCollection),
    /// Shared reference-typed object
    Object(ObjectRef),
}

impl Value {
    /// Check whether this value is an instance of `ty`
    #[must_use]
    pub fn type_matches(&self, ty: &TypeDescriptor) -> bool {
        match (self, ty) {
            (Self::Bool(_), TypeDescriptor::Bool)
            | (Self::Int(_), TypeDescriptor::Int)
            | (Self::Float(_), TypeDescriptor::Float)
            | (Self::Text(_), TypeDescriptor::Text)
            | (Self::Rows(_), TypeDescriptor::Rows) => true,
            (Self::Enum(v), TypeDescriptor::Enum { variants, .. }) => variants.contains(v),
            (Self::List(items), TypeDescriptor::List(inner)) => {
                items.iter().all(|item| item.type_matches(inner))
            }
            (Self::Object(obj), TypeDescriptor::Object(name)) => obj.type_name() == name,
            _ => false,
        }
    }

    /// Numeric view of the value
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Convert a number into a value of a numeric type
    ///
    /// Integers are rounded to the nearest value. Non-finite numbers and
    /// integers outside `i64` give `None`.
    #[must_use]
    pub fn from_f64(ty: &TypeDescriptor, number: f64) -> Option<Self> {
        match ty {
            TypeDescriptor::Float if number.is_finite() => Some(Self::Float(number)),
            TypeDescriptor::Int if number.is_finite() && number.round().abs() < I64_LIMIT => {
                Some(Self::Int(number.round() as i64))
            }
            _ => None,
        }
    }

    /// Whether the value is a shared object reference
    #[inline]
    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Text(a), Self::Text(b)) | (Self::Enum(a), Self::Enum(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Rows(a), Self::Rows(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.content_eq(b),
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) | Self::Enum(s) => write!(f, "{s}"),
            Self::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::Rows(rows) => write!(f, "<{} rows>", rows.len()),
            Self::Object(obj) => match obj.0.to_text() {
                Some(text) => write!(f, "{text}"),
                None => write!(f, "<{}>", obj.type_name()),
            },
        }
    }
}

/// Behaviour of reference-typed objects stored in [`Value::Object`]
///
/// Objects advertise how they can be copied: a canonical text form, a JSON
/// form, or neither (in which case copies share the reference).
pub trait ObjectValue: Any + Send + Sync + Debug {
    /// Registered type name
    fn type_name(&self) -> &str;

    /// Canonical text form, if the type round-trips through text
    fn to_text(&self) -> Option<String> {
        None
    }

    /// JSON form, if the type round-trips through JSON
    fn to_json(&self) -> Option<serde_json::Value> {
        None
    }

    /// Downcast support
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to an [`ObjectValue`]
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn ObjectValue>);

impl ObjectRef {
    /// Wrap an object
    #[inline]
    #[must_use]
    pub fn new<T: ObjectValue>(object: T) -> Self {
        Self(Arc::new(object))
    }

    /// Registered type name
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.0.type_name()
    }

    /// Borrow the object
    #[inline]
    #[must_use]
    pub fn object(&self) -> &dyn ObjectValue {
        self.0.as_ref()
    }

    /// Downcast to a concrete type
    #[inline]
    #[must_use]
    pub fn downcast_ref<T: ObjectValue>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Whether both handles point at the same object
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Compare by identity, then JSON form, then text form
    #[must_use]
    pub fn content_eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.type_name() != other.type_name() {
            return false;
        }
        match (self.0.to_json(), other.0.to_json()) {
            (Some(a), Some(b)) => a == b,
            _ => match (self.0.to_text(), other.0.to_text()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    fn snapshot(&self) -> ObjectSnapshot {
        let data = self
            .0
            .to_json()
            .or_else(|| self.0.to_text().map(serde_json::Value::String))
            .unwrap_or(serde_json::Value::Null);
        ObjectSnapshot {
            type_name: self.type_name().to_string(),
            data,
        }
    }
}

impl Debug for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectRef").field(&self.0).finish()
    }
}

#[derive(Serialize, Deserialize)]
struct ObjectSnapshot {
    #[serde(rename = "type")]
    type_name: String,
    data: serde_json::Value,
}

impl Serialize for ObjectRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ObjectRef {
    /// Deserialized objects come back detached; [`crate::registry::TypeRegistry::rehydrate`]
    /// turns them into live objects.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let snapshot = ObjectSnapshot::deserialize(deserializer)?;
        Ok(ObjectRef::new(DetachedObject {
            type_name: snapshot.type_name,
            data: snapshot.data,
        }))
    }
}

/// Object loaded from storage whose type codec has not been applied yet
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedObject {
    /// Registered type name
    pub type_name: String,
    /// Stored JSON (or text, as a JSON string)
    pub data: serde_json::Value,
}

impl ObjectValue for DetachedObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn to_json(&self) -> Option<serde_json::Value> {
        Some(self.data.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Label(String);

    impl ObjectValue for Label {
        fn type_name(&self) -> &str {
            "Label"
        }
        fn to_text(&self) -> Option<String> {
            Some(self.0.clone())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn type_matching() {
        assert!(Value::Int(1).type_matches(&TypeDescriptor::Int));
        assert!(!Value::Int(1).type_matches(&TypeDescriptor::Float));
        let mode = TypeDescriptor::enumeration("Mode", &["A", "B"]);
        assert!(Value::Enum("A".into()).type_matches(&mode));
        assert!(!Value::Enum("C".into()).type_matches(&mode));
        let obj = Value::Object(ObjectRef::new(Label("x".into())));
        assert!(obj.type_matches(&TypeDescriptor::Object("Label".into())));
    }

    #[test]
    fn numeric_conversion_rounds_ints() {
        assert_eq!(Value::from_f64(&TypeDescriptor::Int, 2.6), Some(Value::Int(3)));
        assert_eq!(Value::from_f64(&TypeDescriptor::Float, 2.5), Some(Value::Float(2.5)));
        assert_eq!(Value::from_f64(&TypeDescriptor::Text, 1.0), None);
        assert_eq!(Value::from_f64(&TypeDescriptor::Int, 1e300), None);
        assert_eq!(Value::from_f64(&TypeDescriptor::Float, f64::INFINITY), None);
    }

    #[test]
    fn object_equality_uses_text() {
        let a = ObjectRef::new(Label("same".into()));
        let b = ObjectRef::new(Label("same".into()));
        assert!(!a.ptr_eq(&b));
        assert_eq!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn object_serializes_detached() {
        let value = Value::Object(ObjectRef::new(Label("hello".into())));
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        let Value::Object(obj) = back else {
            panic!("expected object");
        };
        let detached = obj.downcast_ref::<DetachedObject>().unwrap();
        assert_eq!(detached.type_name, "Label");
        assert_eq!(detached.data, serde_json::json!("hello"));
    }

    #[test]
    fn display_list() {
        let list = Value::List(vec![Value::Int(1), Value::Float(2.5)]);
        assert_eq!(list.to_string(), "[1, 2.5]");
    }
}
