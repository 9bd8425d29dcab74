//! CG-003: Emitted resource definitions.
//!
//! A resource is a named, typed infrastructure object. Resources refer to one
//! another only through symbolic addresses (`kind.name[.attr]`), the way the
//! target language links objects.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of a resource field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Number(i64),
    Bool(bool),
    /// Symbolic reference to another resource attribute
    Ref(String),
    /// Expression evaluated by the provisioning tool (e.g. `timestamp()`)
    Expr(String),
    Map(IndexMap<String, FieldValue>),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Reference value.
    pub fn reference(address: impl Into<String>) -> Self {
        Self::Ref(address.into())
    }

    /// Expression value.
    pub fn expr(expression: impl Into<String>) -> Self {
        Self::Expr(expression.into())
    }

    /// Map from `(key, value)` pairs, order preserved.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<u32> for FieldValue {
    fn from(n: u32) -> Self {
        Self::Number(i64::from(n))
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

/// One emitted infrastructure object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    /// Resource type in the target language (e.g. `aws_api_gateway_method`)
    pub kind: String,

    /// Identifier, unique per kind
    pub name: String,

    /// Ordered field/value pairs
    #[serde(default)]
    pub fields: IndexMap<String, FieldValue>,

    /// Addresses this resource must be created after
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl ResourceDef {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            fields: IndexMap::new(),
            depends_on: Vec::new(),
        }
    }

    /// Set a field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Add an explicit ordering dependency.
    pub fn depends_on(mut self, address: impl Into<String>) -> Self {
        self.depends_on.push(address.into());
        self
    }

    /// Globally unique address `kind.name`.
    pub fn address(&self) -> String {
        format!("{}.{}", self.kind, self.name)
    }

    /// Reference to one attribute of this resource.
    pub fn attr(&self, attribute: &str) -> String {
        format!("{}.{}.{}", self.kind, self.name, attribute)
    }
}

impl fmt::Display for ResourceDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address())
    }
}
