//! Lifecycle notifications for entities
//!
//! This module provides:
//! - `Signals`: observers registered per lifecycle signal, run synchronously
//! - `EventBus`: a broadcast channel carrying the same events to decoupled
//!   subscribers

mod bus;
mod event;
mod signal;

pub use bus::{EventBus, EventSubscriber, DEFAULT_CAPACITY};
pub use event::StoreEvent;
pub use signal::{Signal, Signals};
