//! Feature switches and their conditions.

mod conditions;
mod model;
mod status;

pub use conditions::{ActiveCondition, ActiveConditions, ConditionField, ConditionProvider, ConditionSet};
pub use model::{ConditionGroup, ConditionMap, GroupedCondition, Switch, SwitchSummary};
pub use status::{Condition, ConditionFlag, SwitchStatus};
