//! The switch entity.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::SwitchDefault;
use crate::entity::{Entity, Repository};
use crate::error::{SwitchboardError, SwitchboardResult};
use crate::switch::conditions::{ActiveConditions, ConditionProvider};
use crate::switch::status::{Condition, ConditionFlag, SwitchStatus};
use crate::types::{Fields, Item, ItemId};

/// Conditions by namespace, then by field name.
pub type ConditionMap = IndexMap<String, IndexMap<String, Vec<Condition>>>;

/// Read stored conditions, skipping entries that are not a valid
/// `[flag, payload]` pair instead of failing the whole switch.
fn lenient_conditions<'de, D>(deserializer: D) -> Result<ConditionMap, D::Error>
where
    D: Deserializer<'de>,
{
    let namespaces = match Value::deserialize(deserializer)? {
        Value::Object(namespaces) => namespaces,
        Value::Null => return Ok(ConditionMap::new()),
        other => {
            tracing::warn!(found = %other, "stored conditions are not a mapping; ignoring them");
            return Ok(ConditionMap::new());
        }
    };

    let mut value = ConditionMap::new();
    for (namespace, by_field) in namespaces {
        let Value::Object(by_field) = by_field else {
            tracing::warn!(namespace = %namespace, "skipping malformed condition namespace");
            continue;
        };
        let fields = value.entry(namespace.clone()).or_default();
        for (field, conditions) in by_field {
            let Value::Array(conditions) = conditions else {
                tracing::warn!(namespace = %namespace, field = %field, "skipping malformed condition list");
                continue;
            };
            let parsed = fields.entry(field.clone()).or_default();
            for raw in conditions {
                match serde_json::from_value::<Condition>(raw.clone()) {
                    Ok(condition) => parsed.push(condition),
                    Err(e) => tracing::warn!(
                        namespace = %namespace,
                        field = %field,
                        condition = %raw,
                        error = %e,
                        "skipping malformed condition"
                    ),
                }
            }
        }
    }
    Ok(value)
}

/// A named feature toggle.
///
/// Known fields are typed; anything else found on a stored switch lands in
/// `extra` and is written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Switch {
    #[serde(skip)]
    pub id: Option<ItemId>,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub status: SwitchStatus,
    #[serde(default, deserialize_with = "lenient_conditions")]
    pub value: ConditionMap,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub date_created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub date_modified: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Fields,
}

impl Default for Switch {
    fn default() -> Self {
        Self::new("")
    }
}

impl Switch {
    /// A disabled switch without conditions.
    pub fn new(key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            key: key.into(),
            status: SwitchStatus::Disabled,
            value: ConditionMap::new(),
            label: String::new(),
            description: String::new(),
            date_created: now,
            date_modified: now,
            extra: Fields::new(),
        }
    }

    /// A new switch seeded from configured defaults.
    ///
    /// `is_active` maps to `Global` or `Disabled`; when unset the status
    /// stays `Disabled`.
    pub fn from_defaults(key: impl Into<String>, defaults: &SwitchDefault) -> Self {
        let mut switch = Self::new(key);
        match defaults.is_active {
            Some(true) => switch.status = SwitchStatus::Global,
            Some(false) => switch.status = SwitchStatus::Disabled,
            None => {}
        }
        if let Some(label) = &defaults.label {
            switch.label = label.clone();
        }
        if let Some(description) = &defaults.description {
            switch.description = description.clone();
        }
        switch
    }

    pub fn with_status(mut self, status: SwitchStatus) -> Self {
        self.status = status;
        self
    }

    /// Short status name, e.g. `Selective`.
    pub fn status_display(&self) -> String {
        self.status.to_string()
    }

    /// Label for the effective status.
    ///
    /// A selective switch without conditions is on for everyone, so it
    /// shows the global label.
    pub fn status_label(&self) -> &'static str {
        if self.status == SwitchStatus::Selective && self.value.is_empty() {
            SwitchStatus::Global.label()
        } else {
            self.status.label()
        }
    }

    /// Display label, falling back to the title-cased key.
    pub fn display_label(&self) -> String {
        if self.label.is_empty() {
            title_case(&self.key)
        } else {
            self.label.clone()
        }
    }

    /// Append a condition under a condition set's namespace.
    ///
    /// A payload already present in the field (under either flag) is left
    /// alone. Only string payloads are accepted. With `commit`, the switch
    /// is saved through that repository afterwards.
    pub fn add_condition(
        &mut self,
        provider: &dyn ConditionProvider,
        set_id: &str,
        field: &str,
        condition: impl Into<Value>,
        exclude: bool,
        commit: Option<&Repository<Switch>>,
    ) -> SwitchboardResult<()> {
        let condition = condition.into();
        if !condition.is_string() {
            return Err(SwitchboardError::malformed_condition(&condition));
        }
        let namespace = resolve_namespace(provider, set_id)?;

        let conditions = self
            .value
            .entry(namespace)
            .or_default()
            .entry(field.to_string())
            .or_default();
        if !conditions.iter().any(|c| c.payload() == &condition) {
            conditions.push(Condition::new(ConditionFlag::from_exclude(exclude), condition));
        }

        self.commit(commit)
    }

    /// Drop a condition payload, pruning emptied fields and namespaces.
    pub fn remove_condition(
        &mut self,
        provider: &dyn ConditionProvider,
        set_id: &str,
        field: &str,
        condition: impl Into<Value>,
        commit: Option<&Repository<Switch>>,
    ) -> SwitchboardResult<()> {
        let condition = condition.into();
        let namespace = resolve_namespace(provider, set_id)?;

        let Some(by_field) = self.value.get_mut(&namespace) else {
            return Ok(());
        };
        let Some(conditions) = by_field.get_mut(field) else {
            return Ok(());
        };
        conditions.retain(|c| c.payload() != &condition);

        if conditions.is_empty() {
            by_field.shift_remove(field);
            if by_field.is_empty() {
                self.value.shift_remove(&namespace);
            }
        }

        self.commit(commit)
    }

    /// Drop one field's conditions, or the whole namespace when `field`
    /// is `None`. Missing namespaces and fields are ignored.
    pub fn clear_conditions(
        &mut self,
        provider: &dyn ConditionProvider,
        set_id: &str,
        field: Option<&str>,
        commit: Option<&Repository<Switch>>,
    ) -> SwitchboardResult<()> {
        let namespace = resolve_namespace(provider, set_id)?;

        let Some(by_field) = self.value.get_mut(&namespace) else {
            return Ok(());
        };
        match field {
            None => {
                self.value.shift_remove(&namespace);
            }
            Some(field) => {
                if by_field.shift_remove(field).is_none() {
                    return Ok(());
                }
            }
        }

        self.commit(commit)
    }

    /// Conditions resolved against the provider's condition sets.
    pub fn active_conditions<'a>(&'a self, provider: &dyn ConditionProvider) -> ActiveConditions<'a> {
        ActiveConditions::new(self, provider)
    }

    /// Display-ready view with conditions grouped by condition set.
    pub fn to_dict(&self, provider: &dyn ConditionProvider) -> SwitchSummary {
        let mut groups: Vec<ConditionGroup> = Vec::new();
        for active in self.active_conditions(provider).iter() {
            let entry = GroupedCondition {
                field: active.field,
                value: active.value,
                display: active.display,
                exclude: active.exclude,
            };
            match groups.last_mut() {
                Some(group) if group.id == active.set_id => group.conditions.push(entry),
                _ => groups.push(ConditionGroup {
                    id: active.set_id,
                    label: active.group,
                    conditions: vec![entry],
                }),
            }
        }

        SwitchSummary {
            key: self.key.clone(),
            status: self.status,
            status_label: self.status_label().to_string(),
            label: self.display_label(),
            description: self.description.clone(),
            date_created: self.date_created,
            date_modified: self.date_modified,
            conditions: groups,
        }
    }

    fn commit(&mut self, repository: Option<&Repository<Switch>>) -> SwitchboardResult<()> {
        if let Some(repository) = repository {
            repository.save(self)?;
        }
        Ok(())
    }
}

fn resolve_namespace(provider: &dyn ConditionProvider, set_id: &str) -> SwitchboardResult<String> {
    provider
        .condition_set(set_id)
        .map(|set| set.namespace())
        .ok_or_else(|| SwitchboardError::unknown_condition_set(set_id))
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}

impl Entity for Switch {
    const KIND: &'static str = "switch";

    fn id(&self) -> Option<&ItemId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: Option<ItemId>) {
        self.id = id;
    }

    fn to_item(&self) -> SwitchboardResult<Item> {
        let mut item = Item::from_json(serde_json::to_value(self)?)?;
        item.id = self.id.clone();
        Ok(item)
    }

    fn from_item(item: Item) -> SwitchboardResult<Self> {
        let mut switch: Switch = serde_json::from_value(Value::Object(item.fields))?;
        switch.id = item.id;
        Ok(switch)
    }
}

/// Display form of a switch, as produced by [`Switch::to_dict`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchSummary {
    pub key: String,
    pub status: SwitchStatus,
    pub status_label: String,
    pub label: String,
    pub description: String,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    pub conditions: Vec<ConditionGroup>,
}

/// Conditions contributed by one condition set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionGroup {
    pub id: String,
    pub label: String,
    pub conditions: Vec<GroupedCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedCondition {
    pub field: String,
    pub value: Value,
    pub display: String,
    pub exclude: bool,
}
