//! Schema-less store items.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{SwitchboardError, SwitchboardResult};

/// Field name to value mapping, kept in insertion order.
pub type Fields = serde_json::Map<String, Value>;

/// Name of the identity field when an item is rendered as a mapping.
pub const ID_FIELD: &str = "id";

/// Store-assigned identity of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Int(i64),
    Str(String),
}

impl ItemId {
    /// Interpret a JSON value as an id. Only integers and strings qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(ItemId::Int),
            Value::String(s) => Some(ItemId::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ItemId::Int(n) => Value::from(*n),
            ItemId::Str(s) => Value::from(s.as_str()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ItemId::Int(n) => Some(*n),
            ItemId::Str(_) => None,
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Int(n) => write!(f, "{}", n),
            ItemId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ItemId {
    fn from(n: i64) -> Self {
        ItemId::Int(n)
    }
}

impl From<i32> for ItemId {
    fn from(n: i32) -> Self {
        ItemId::Int(n.into())
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::Str(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId::Str(s)
    }
}

/// A stored record: arbitrary fields plus an optional identity.
///
/// An item without an id has not been persisted yet. The id lives outside
/// `fields` so that field data written to a backend never carries it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub id: Option<ItemId>,
    pub fields: Fields,
}

impl Item {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an item from a field map, lifting any `id` entry out of it.
    pub fn from_fields(mut fields: Fields) -> Self {
        let id = fields.shift_remove(ID_FIELD).and_then(|v| ItemId::from_value(&v));
        Self { id, fields }
    }

    /// Build an item from a JSON object.
    pub fn from_json(value: Value) -> SwitchboardResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self::from_fields(fields)),
            other => Err(SwitchboardError::parse(format!(
                "expected a JSON object for an item, got {}",
                other
            ))),
        }
    }

    /// Render the item as a JSON object, with `id` included when assigned.
    pub fn to_json(&self) -> Value {
        let mut fields = self.fields.clone();
        if let Some(id) = &self.id {
            fields.insert(ID_FIELD.to_string(), id.to_value());
        }
        Value::Object(fields)
    }

    /// Builder: set the id.
    pub fn with_id(mut self, id: impl Into<ItemId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder: set a field.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Set a field. Setting `id` assigns the identity instead.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        if field == ID_FIELD {
            self.id = ItemId::from_value(&value);
        } else {
            self.fields.insert(field, value);
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.shift_remove(field)
    }

    /// Strip the identity before the field data is persisted.
    ///
    /// A stray `id` entry inside `fields` is dropped as well; it is only used
    /// when the item carries no explicit id.
    pub fn take_id(&mut self) -> Option<ItemId> {
        let stray = self
            .fields
            .shift_remove(ID_FIELD)
            .and_then(|v| ItemId::from_value(&v));
        self.id.take().or(stray)
    }
}
