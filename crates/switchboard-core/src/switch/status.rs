//! Switch status and condition entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::SwitchboardError;

/// Activation status of a switch.
///
/// Stored as the integers 1 to 4. There are no automatic transitions; a
/// status changes only by assignment followed by a save.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(try_from = "u8", into = "u8")]
#[strum(ascii_case_insensitive)]
pub enum SwitchStatus {
    /// Off for everyone.
    #[default]
    Disabled = 1,
    /// On only where a condition matches.
    Selective = 2,
    /// On for everyone.
    Global = 3,
    /// Evaluation is deferred to a parent scope.
    Inherit = 4,
}

impl SwitchStatus {
    /// Human-readable description shown next to a switch.
    pub fn label(self) -> &'static str {
        match self {
            SwitchStatus::Disabled => "Disabled for everyone",
            SwitchStatus::Selective => "Active for conditions",
            SwitchStatus::Global => "Active for everyone",
            SwitchStatus::Inherit => "Inherit from parent",
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn all() -> Vec<SwitchStatus> {
        Self::iter().collect()
    }
}

impl From<SwitchStatus> for u8 {
    fn from(status: SwitchStatus) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for SwitchStatus {
    type Error = SwitchboardError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::iter().find(|s| s.code() == code).ok_or_else(|| {
            SwitchboardError::validation(format!("unknown switch status {}", code))
        })
    }
}

/// Whether a condition includes or excludes the matching subjects.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum ConditionFlag {
    #[default]
    #[serde(rename = "i")]
    #[strum(serialize = "i")]
    Include,
    #[serde(rename = "e")]
    #[strum(serialize = "e")]
    Exclude,
}

impl ConditionFlag {
    pub fn from_exclude(exclude: bool) -> Self {
        if exclude {
            ConditionFlag::Exclude
        } else {
            ConditionFlag::Include
        }
    }
}

/// One `(flag, payload)` entry of a switch's condition list.
///
/// Serialized as a two-element array, e.g. `["i", "0-50"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition(pub ConditionFlag, pub Value);

impl Condition {
    pub fn new(flag: ConditionFlag, payload: impl Into<Value>) -> Self {
        Self(flag, payload.into())
    }

    pub fn flag(&self) -> ConditionFlag {
        self.0
    }

    pub fn payload(&self) -> &Value {
        &self.1
    }

    pub fn is_exclude(&self) -> bool {
        self.0 == ConditionFlag::Exclude
    }
}
