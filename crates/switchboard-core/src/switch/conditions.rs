//! Read-only view of the condition-set plugins a switch refers to.
//!
//! Condition sets decide what a condition means (percentage rollout, user
//! list, ...). The switch only stores payloads under each set's namespace
//! and asks the sets how to group and render them.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::switch::Switch;

/// A field of a condition set, e.g. `percent` or `username`.
#[cfg_attr(test, mockall::automock)]
pub trait ConditionField: Send + Sync {
    fn name(&self) -> String;

    /// Render a stored condition payload for display.
    fn display(&self, value: &Value) -> String;
}

/// A family of conditions sharing one namespace in a switch's value map.
#[cfg_attr(test, mockall::automock)]
pub trait ConditionSet: Send + Sync {
    fn namespace(&self) -> String;

    fn id(&self) -> String;

    fn group_label(&self) -> String;

    /// Fields in display order.
    fn fields(&self) -> Vec<Arc<dyn ConditionField>>;
}

/// Registry of the condition sets known to the application.
#[cfg_attr(test, mockall::automock)]
pub trait ConditionProvider: Send + Sync {
    fn condition_set(&self, id: &str) -> Option<Arc<dyn ConditionSet>>;

    fn condition_sets(&self) -> Vec<Arc<dyn ConditionSet>>;
}

/// One stored condition, resolved against its condition set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveCondition {
    pub set_id: String,
    pub group: String,
    pub field: String,
    pub value: Value,
    pub display: String,
    pub exclude: bool,
}

/// Conditions of one switch, grouped by condition set.
///
/// Sets are sorted by group label; within a set, fields follow the set's
/// field order and conditions follow insertion order. Call [`iter`] as many
/// times as needed: each call starts over.
///
/// [`iter`]: ActiveConditions::iter
pub struct ActiveConditions<'a> {
    switch: &'a Switch,
    sets: Vec<Arc<dyn ConditionSet>>,
}

impl<'a> ActiveConditions<'a> {
    pub(crate) fn new(switch: &'a Switch, provider: &dyn ConditionProvider) -> Self {
        let mut sets = provider.condition_sets();
        sets.sort_by_key(|set| set.group_label());
        Self { switch, sets }
    }

    pub fn iter(&'a self) -> impl Iterator<Item = ActiveCondition> + 'a {
        let switch = self.switch;
        self.sets.iter().flat_map(move |set| {
            let conditions = switch.value.get(&set.namespace());
            let set_id = set.id();
            let group = set.group_label();
            let fields = if conditions.is_some() {
                set.fields()
            } else {
                Vec::new()
            };

            fields.into_iter().flat_map(move |field| {
                let (set_id, group) = (set_id.clone(), group.clone());
                conditions
                    .and_then(|by_field| by_field.get(&field.name()))
                    .into_iter()
                    .flatten()
                    .map(move |condition| ActiveCondition {
                        set_id: set_id.clone(),
                        group: group.clone(),
                        field: field.name(),
                        value: condition.payload().clone(),
                        display: field.display(condition.payload()),
                        exclude: condition.is_exclude(),
                    })
            })
        })
    }
}
