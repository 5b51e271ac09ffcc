//! Change tracking for stored items.
//!
//! Every save of a versioned entity appends the field-level [`Delta`]
//! between its previous and current state to a log held in the primary
//! store's paired shadow store. Replaying that log reconstructs any earlier
//! state, e.g. "what did this switch look like last week?"

mod delta;
mod log;

pub use delta::{replay, Delta, VersionDelta, RESERVED_FIELDS};
pub use log::VersionLog;
