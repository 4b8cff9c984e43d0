//! Field declarations: the typed column metadata an entity is built from.

use crate::core::db::Value;
use std::fmt;
use std::sync::Arc;

/// A zero-argument function producing a fresh default value.
pub type DefaultSupplier = Arc<dyn Fn() -> Value + Send + Sync>;

/// Default for a field without an explicit value: a literal or a supplier.
#[derive(Clone)]
pub enum DefaultValue {
    Literal(Value),
    Supplier(DefaultSupplier),
}

impl DefaultValue {
    /// Produces the default, invoking the supplier if there is one.
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Literal(value) => value.clone(),
            DefaultValue::Supplier(supplier) => supplier(),
        }
    }

    pub fn is_supplier(&self) -> bool {
        matches!(self, DefaultValue::Supplier(_))
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            DefaultValue::Supplier(_) => f.write_str("Supplier(..)"),
        }
    }
}

/// The family a field was declared from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Boolean,
    Float,
    Text,
    Custom,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::String => "StringField",
            FieldKind::Integer => "IntegerField",
            FieldKind::Boolean => "BooleanField",
            FieldKind::Float => "FloatField",
            FieldKind::Text => "TextField",
            FieldKind::Custom => "Field",
        };
        f.write_str(name)
    }
}

/// Metadata for one column of an entity.
///
/// Built with the constructor for its kind and refined with the consuming
/// builder methods, e.g. `FieldDescriptor::integer().primary_key()`.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    kind: FieldKind,
    name: Option<String>,
    storage_type: String,
    primary_key: bool,
    default: Option<DefaultValue>,
}

impl FieldDescriptor {
    /// A field of arbitrary storage type with no default.
    pub fn new(storage_type: impl Into<String>) -> Self {
        FieldDescriptor {
            kind: FieldKind::Custom,
            name: None,
            storage_type: storage_type.into(),
            primary_key: false,
            default: None,
        }
    }

    fn of_kind(kind: FieldKind, storage_type: &str, default: Option<Value>) -> Self {
        FieldDescriptor {
            kind,
            default: default.map(DefaultValue::Literal),
            ..FieldDescriptor::new(storage_type)
        }
    }

    /// `varchar(100)`, no default.
    pub fn string() -> Self {
        Self::of_kind(FieldKind::String, "varchar(100)", None)
    }

    /// `bigint`, defaults to `0`.
    pub fn integer() -> Self {
        Self::of_kind(FieldKind::Integer, "bigint", Some(Value::Integer(0)))
    }

    /// `boolean`, defaults to `false`.
    pub fn boolean() -> Self {
        Self::of_kind(FieldKind::Boolean, "boolean", Some(Value::from(false)))
    }

    /// `real`, defaults to `0.0`.
    pub fn float() -> Self {
        Self::of_kind(FieldKind::Float, "real", Some(Value::Real(0.0)))
    }

    /// `text`, no default.
    pub fn text() -> Self {
        Self::of_kind(FieldKind::Text, "text", None)
    }

    /// Overrides the column name; otherwise the attribute name is used.
    pub fn name(mut self, column: impl Into<String>) -> Self {
        self.name = Some(column.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Overrides the storage type.
    pub fn ddl(mut self, storage_type: impl Into<String>) -> Self {
        self.storage_type = storage_type.into();
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    /// Uses `supplier` to compute the default each time one is needed.
    pub fn default_with<F>(mut self, supplier: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Supplier(Arc::new(supplier)));
        self
    }

    pub fn no_default(mut self) -> Self {
        self.default = None;
        self
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// The explicit column name, if one was given.
    pub fn column_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn storage_type(&self) -> &str {
        &self.storage_type
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}, {}", self.kind, self.storage_type)?;
        if let Some(name) = &self.name {
            write!(f, ":{}", name)?;
        }
        if self.primary_key {
            f.write_str(", primary key")?;
        }
        f.write_str(">")
    }
}
