//! Members: named, typed properties declared by step types
//!
//! Step types register their members explicitly through
//! [`MemberDescriptor`]s. A [`Member`] is a cheap handle to one descriptor
//! together with its declaring type; it is the only way the sweep subsystem
//! reads or writes step properties.

use crate::error::MemberError;
use crate::step::Step;
use crate::types::TypeDescriptor;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Separator used when joining display groups with a display name
pub const GROUP_SEPARATOR: &str = " \\ ";

/// Validation hook run before a value is written
pub type MemberValidator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Conditional editability: the member is only editable while another
/// member on the same step holds a given value
#[derive(Debug, Clone, PartialEq)]
pub struct EnabledIf {
    /// Name of the controlling member
    pub member: String,
    /// Value the controlling member must hold
    pub equals: Value,
}

/// Registration record for one member of a step type
#[derive(Clone)]
pub struct MemberDescriptor {
    name: String,
    display_name: String,
    group: Vec<String>,
    value_type: TypeDescriptor,
    default: Value,
    readable: bool,
    writable: bool,
    browsable: bool,
    sweepable: bool,
    enabled_if: Option<EnabledIf>,
    validator: Option<MemberValidator>,
}

impl MemberDescriptor {
    /// Readable, writable, visible and sweepable member
    #[must_use]
    pub fn new(name: impl Into<String>, value_type: TypeDescriptor, default: Value) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            group: Vec::new(),
            value_type,
            default,
            readable: true,
            writable: true,
            browsable: true,
            sweepable: true,
            enabled_if: None,
            validator: None,
        }
    }

    /// Set display name (defaults to the member name)
    #[must_use]
    pub fn display(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Set display group path
    #[must_use]
    pub fn group(mut self, group: &[&str]) -> Self {
        self.group = group.iter().map(|g| (*g).to_string()).collect();
        self
    }

    /// Mark the member read-only
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Mark the member write-only
    #[must_use]
    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }

    /// Hide the member from user interfaces
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.browsable = false;
        self
    }

    /// Exclude the member from sweeps
    #[must_use]
    pub fn not_sweepable(mut self) -> Self {
        self.sweepable = false;
        self
    }

    /// Editable only while `member` equals `value`
    #[must_use]
    pub fn enabled_if(mut self, member: impl Into<String>, value: Value) -> Self {
        self.enabled_if = Some(EnabledIf {
            member: member.into(),
            equals: value,
        });
        self
    }

    /// Install a validator
    #[must_use]
    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(f));
        self
    }

    /// Member name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default value for new step instances
    #[inline]
    #[must_use]
    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// Declared value type
    #[inline]
    #[must_use]
    pub fn value_type(&self) -> &TypeDescriptor {
        &self.value_type
    }
}

impl Debug for MemberDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("group", &self.group)
            .field("value_type", &self.value_type)
            .field("readable", &self.readable)
            .field("writable", &self.writable)
            .field("browsable", &self.browsable)
            .field("sweepable", &self.sweepable)
            .field("enabled_if", &self.enabled_if)
            .field("validated", &self.validator.is_some())
            .finish_non_exhaustive()
    }
}

/// Handle to a member declared by a step type
///
/// Identity is `(declaring type, name)`.
#[derive(Clone)]
pub struct Member {
    declaring_type: Arc<str>,
    descriptor: Arc<MemberDescriptor>,
}

impl Member {
    /// Create a handle
    #[inline]
    #[must_use]
    pub fn new(declaring_type: Arc<str>, descriptor: Arc<MemberDescriptor>) -> Self {
        Self {
            declaring_type,
            descriptor,
        }
    }

    /// Member name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Name of the declaring step type
    #[inline]
    #[must_use]
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    /// Declared value type
    #[inline]
    #[must_use]
    pub fn value_type(&self) -> &TypeDescriptor {
        &self.descriptor.value_type
    }

    /// Display name without group
    #[inline]
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.descriptor.display_name
    }

    /// Display group path
    #[inline]
    #[must_use]
    pub fn group(&self) -> &[String] {
        &self.descriptor.group
    }

    /// Display name prefixed by its group path
    #[must_use]
    pub fn full_display_name(&self) -> String {
        if self.descriptor.group.is_empty() {
            self.descriptor.display_name.clone()
        } else {
            format!(
                "{}{}{}",
                self.descriptor.group.join(GROUP_SEPARATOR),
                GROUP_SEPARATOR,
                self.descriptor.display_name
            )
        }
    }

    /// Default value declared by the step type
    #[inline]
    #[must_use]
    pub fn default_value(&self) -> &Value {
        &self.descriptor.default
    }

    /// Member can be read
    #[inline]
    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.descriptor.readable
    }

    /// Member can be written
    #[inline]
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.descriptor.writable
    }

    /// Member is visible in user interfaces
    #[inline]
    #[must_use]
    pub fn is_browsable(&self) -> bool {
        self.descriptor.browsable
    }

    /// Member is not tagged as excluded from sweeps
    #[inline]
    #[must_use]
    pub fn is_sweepable(&self) -> bool {
        self.descriptor.sweepable
    }

    /// Conditional editability rule
    #[inline]
    #[must_use]
    pub fn enabled_if(&self) -> Option<&EnabledIf> {
        self.descriptor.enabled_if.as_ref()
    }

    /// Grouping key used to match members across step types
    #[must_use]
    pub fn equivalence_key(&self) -> EquivalenceKey {
        EquivalenceKey::new(self.full_display_name(), self.value_type().clone())
    }

    /// Stable reference for persistence
    #[must_use]
    pub fn member_ref(&self) -> MemberRef {
        MemberRef::new(self.declaring_type.as_ref(), self.name())
    }

    /// Read the member from `owner`
    ///
    /// # Errors
    /// Returns [`MemberError`] if the member is write-only or not declared by
    /// the owner's type.
    pub fn get(&self, owner: &dyn Step) -> Result<Value, MemberError> {
        if !self.is_readable() {
            return Err(MemberError::NotReadable {
                member: self.member_ref(),
            });
        }
        self.check_owner(owner)?;
        owner
            .read_raw(self.name())
            .ok_or_else(|| MemberError::Missing {
                member: self.member_ref(),
            })
    }

    /// Write `value` into the member on `owner`
    ///
    /// # Errors
    /// Returns [`MemberError`] if the member is read-only, the value has the
    /// wrong type, the validator rejects it or the owner refuses the write.
    pub fn set(&self, owner: &mut dyn Step, value: Value) -> Result<(), MemberError> {
        if !self.is_writable() {
            return Err(MemberError::NotWritable {
                member: self.member_ref(),
            });
        }
        self.check_owner(owner)?;
        if !value.type_matches(self.value_type()) {
            return Err(MemberError::TypeMismatch {
                member: self.member_ref(),
                expected: self.value_type().clone(),
                actual: value.to_string(),
            });
        }
        if let Some(validator) = &self.descriptor.validator {
            validator(&value).map_err(|reason| MemberError::Rejected {
                member: self.member_ref(),
                reason,
            })?;
        }
        owner.write_raw(self.name(), value)
    }

    fn check_owner(&self, owner: &dyn Step) -> Result<(), MemberError> {
        if owner.step_type().name() == self.declaring_type() {
            Ok(())
        } else {
            Err(MemberError::WrongOwner {
                member: self.member_ref(),
                owner: owner.step_type().name().to_string(),
            })
        }
    }

    fn identity(&self) -> (&str, &str) {
        (self.declaring_type(), self.name())
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Member {}

impl Hash for Member {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for Member {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Member {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl Debug for Member {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Member({}.{}: {})", self.declaring_type, self.name(), self.value_type())
    }
}

impl Display for Member {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.name())
    }
}

/// Persisted reference to a member: `(declaring type, member name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberRef {
    /// Declaring step type name
    pub declaring_type: String,
    /// Member name
    pub member: String,
}

impl MemberRef {
    /// Create a reference
    #[must_use]
    pub fn new(declaring_type: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            member: member.into(),
        }
    }
}

impl Display for MemberRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.member)
    }
}

/// Equivalence class key: members sharing it are the same swept property
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EquivalenceKey {
    /// Full display name (group path included)
    pub display_name: String,
    /// Declared value type
    pub value_type: TypeDescriptor,
}

impl EquivalenceKey {
    /// Create a key
    #[must_use]
    pub fn new(display_name: impl Into<String>, value_type: TypeDescriptor) -> Self {
        Self {
            display_name: display_name.into(),
            value_type,
        }
    }
}

impl Display for EquivalenceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.value_type)
    }
}
