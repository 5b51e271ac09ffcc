//! Exact-match lookups used by every store query.

use serde_json::Value;

use super::item::{Fields, ItemId, ID_FIELD};

/// A conjunction of exact-equality field filters.
///
/// When an id is present it takes precedence over every other filter: backends
/// resolve the id directly and ignore the remaining field filters. An `id`
/// filter whose value cannot be an [`ItemId`] matches no item at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lookup {
    id: Option<ItemId>,
    unmatched_id: Option<Value>,
    filters: Vec<(String, Value)>,
}

impl Lookup {
    /// A lookup with no filters, matching every item.
    pub fn all() -> Self {
        Self::default()
    }

    /// A lookup by identity.
    pub fn by_id(id: impl Into<ItemId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Add an exact-equality filter. Filtering on `id` sets the identity.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        if field == ID_FIELD {
            self.id = ItemId::from_value(&value);
            self.unmatched_id = self.id.is_none().then_some(value);
            return self;
        }
        match self.filters.iter_mut().find(|(name, _)| *name == field) {
            Some(existing) => existing.1 = value,
            None => self.filters.push((field, value)),
        }
        self
    }

    pub fn id(&self) -> Option<&ItemId> {
        self.id.as_ref()
    }

    pub fn filters(&self) -> &[(String, Value)] {
        &self.filters
    }

    /// The `id` filter value that could not be read as an identity.
    pub fn unmatched_id(&self) -> Option<&Value> {
        self.unmatched_id.as_ref()
    }

    /// True when the lookup selects every item.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.unmatched_id.is_none() && self.filters.is_empty()
    }

    /// Check the field filters against an item's fields.
    ///
    /// The id is not consulted here; callers resolve it first. A filter on a
    /// field the item lacks never matches, even when the filter value is null.
    pub fn matches(&self, fields: &Fields) -> bool {
        self.unmatched_id.is_none()
            && self
                .filters
                .iter()
                .all(|(name, value)| fields.get(name) == Some(value))
    }

    /// The lookup rendered as field data, for seeding a newly created item.
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        for (name, value) in &self.filters {
            fields.insert(name.clone(), value.clone());
        }
        if let Some(id) = &self.id {
            fields.insert(ID_FIELD.to_string(), id.to_value());
        }
        fields
    }
}
