//! Field descriptors.
//!
//! Every entity declares a static list of [`Field`]s. A descriptor names the
//! field, its type, and whether it must be supplied at construction. Optional
//! fields carry a default *function* rather than a default value, so each
//! document receives its own freshly built container.

use orchstate_core::{EnumValue, Value};

use crate::error::{DataError, Result};

/// Produces the default value of an optional field.
pub type DefaultFn = fn() -> Value;

/// An explicit name table for an enumeration.
///
/// The table is the single source for the stored form of each variant; reads
/// resolve names through it and never renumber.
#[derive(Debug)]
pub struct EnumTable {
    /// Name of the enumeration.
    pub name: &'static str,
    /// Stored names of the variants.
    pub variants: &'static [&'static str],
}

impl EnumTable {
    /// Resolve a stored name to its typed member.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<EnumValue> {
        self.variants
            .iter()
            .find(|v| **v == name)
            .map(|variant| EnumValue {
                enumeration: self.name,
                variant: *variant,
            })
    }
}

/// A Rust enum with a bidirectional mapping to its stored names.
pub trait StoredEnum: Copy + Sized + 'static {
    /// The name table of the enumeration.
    const TABLE: &'static EnumTable;

    /// The stored name of this member.
    fn variant(self) -> &'static str;

    /// Resolve a stored name.
    fn from_variant(name: &str) -> Option<Self>;

    /// Wrap this member as a document value.
    fn to_value(self) -> Value {
        Value::Enum(EnumValue {
            enumeration: Self::TABLE.name,
            variant: self.variant(),
        })
    }

    /// Extract a member of this enumeration from a document value.
    fn from_value(value: &Value) -> Option<Self> {
        value
            .as_enum()
            .filter(|e| e.enumeration == Self::TABLE.name)
            .and_then(|e| Self::from_variant(e.variant))
    }
}

/// Declared type of a field.
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    /// UTF-8 string.
    String,
    /// Boolean.
    Bool,
    /// Signed integer.
    Int,
    /// Floating point number; integers are accepted.
    Float,
    /// UUID.
    Uuid,
    /// UTC timestamp.
    DateTime,
    /// Sequence of arbitrary values.
    List,
    /// Mapping of string keys to arbitrary values.
    Map,
    /// Member of the given enumeration.
    Enum(&'static EnumTable),
}

impl FieldType {
    /// Human-readable type name for error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Uuid => "uuid",
            Self::DateTime => "datetime",
            Self::List => "list",
            Self::Map => "map",
            Self::Enum(table) => table.name,
        }
    }

    /// Returns true if `value` is a non-null value of this type.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::String, Value::String(_))
            | (Self::Bool, Value::Bool(_))
            | (Self::Int, Value::Int(_))
            | (Self::Float, Value::Float(_) | Value::Int(_))
            | (Self::Uuid, Value::Uuid(_))
            | (Self::DateTime, Value::DateTime(_))
            | (Self::List, Value::List(_))
            | (Self::Map, Value::Map(_)) => true,
            (Self::Enum(table), Value::Enum(e)) => {
                e.enumeration == table.name && table.variants.contains(&e.variant)
            }
            _ => false,
        }
    }
}

/// A declared attribute of an entity.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    /// Field name as used in documents and filters.
    pub name: &'static str,
    /// Declared type.
    pub field_type: FieldType,
    /// Whether the field must be supplied, non-null, at construction.
    pub required: bool,
    default: Option<DefaultFn>,
}

impl Field {
    /// A field that must be supplied at construction and may never be null.
    #[must_use]
    pub const fn required(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: true,
            default: None,
        }
    }

    /// An optional field initialised from `default` when omitted.
    #[must_use]
    pub const fn optional(name: &'static str, field_type: FieldType, default: DefaultFn) -> Self {
        Self {
            name,
            field_type,
            required: false,
            default: Some(default),
        }
    }

    /// An optional field that defaults to null.
    #[must_use]
    pub const fn nullable(name: &'static str, field_type: FieldType) -> Self {
        Self::optional(name, field_type, defaults::null)
    }

    /// A fresh default value for this field.
    #[must_use]
    pub fn default_value(&self) -> Value {
        self.default.map_or(Value::Null, |f| f())
    }

    /// Check `value` against this descriptor.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Validation` if the value is null for a required field
    /// or is not of the declared type.
    pub fn validate(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            if self.required {
                return Err(DataError::validation(self.name, "required field cannot be null"));
            }
            return Ok(());
        }
        if !self.field_type.accepts(value) {
            return Err(DataError::validation(
                self.name,
                format!("expected {}, got {}", self.field_type.name(), value.kind()),
            ));
        }
        Ok(())
    }
}

/// Default value constructors for optional fields.
pub mod defaults {
    use orchstate_core::Value;

    /// `null`.
    #[must_use]
    pub const fn null() -> Value {
        Value::Null
    }

    /// `false`.
    #[must_use]
    pub const fn falsy() -> Value {
        Value::Bool(false)
    }

    /// `0`.
    #[must_use]
    pub const fn zero() -> Value {
        Value::Int(0)
    }

    /// The empty string.
    #[must_use]
    pub fn empty_string() -> Value {
        Value::String(String::new())
    }

    /// A new empty list.
    #[must_use]
    pub fn empty_list() -> Value {
        Value::empty_list()
    }

    /// A new empty map.
    #[must_use]
    pub fn empty_map() -> Value {
        Value::empty_map()
    }
}
