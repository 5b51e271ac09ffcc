//! Synchronous lifecycle observers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use strum::{Display, EnumString};

use crate::error::{SwitchboardError, SwitchboardResult};

/// Lifecycle points at which observers are notified.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Before a save; payload is the prior persisted instance, or the new
    /// instance (without an id) when nothing was persisted yet.
    PreSave,
    /// After a save; payload is the saved instance.
    PostSave,
    /// Before a removal; payload is the instance about to be removed.
    PreDelete,
    /// After a removal; payload is the removed instance.
    PostDelete,
}

type Observer<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Registered observers per signal, invoked in registration order.
pub struct Signals<E> {
    observers: RwLock<Vec<(Signal, Observer<E>)>>,
}

impl<E> Signals<E> {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Register an observer for one signal.
    pub fn connect<F>(&self, signal: Signal, observer: F) -> SwitchboardResult<()>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.observers
            .write()
            .map_err(|_| SwitchboardError::poisoned("signal registry"))?
            .push((signal, Arc::new(observer)));
        Ok(())
    }

    /// Deliver `payload` to every observer of `signal`.
    ///
    /// Observers run after the registry lock is released, so an observer may
    /// itself register further observers.
    pub fn send(&self, signal: Signal, payload: &E) -> SwitchboardResult<()> {
        let targets: Vec<Observer<E>> = self
            .observers
            .read()
            .map_err(|_| SwitchboardError::poisoned("signal registry"))?
            .iter()
            .filter(|(s, _)| *s == signal)
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in targets {
            observer(payload);
        }
        Ok(())
    }

    /// Number of observers registered for `signal`.
    pub fn receiver_count(&self, signal: Signal) -> usize {
        self.observers
            .read()
            .map(|observers| observers.iter().filter(|(s, _)| *s == signal).count())
            .unwrap_or(0)
    }
}

impl<E> Default for Signals<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Signals<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.observers.read().map(|o| o.len()).unwrap_or(0);
        f.debug_struct("Signals").field("observers", &count).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Mutex;

    #[test]
    fn test_observers_run_in_registration_order() {
        let signals: Signals<String> = Signals::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = seen.clone();
            signals
                .connect(Signal::PostSave, move |payload: &String| {
                    seen.lock().unwrap().push(format!("{tag}:{payload}"));
                })
                .unwrap();
        }
        let other = seen.clone();
        signals
            .connect(Signal::PreDelete, move |_: &String| {
                other.lock().unwrap().push("delete".to_string());
            })
            .unwrap();

        signals.send(Signal::PostSave, &"foo".to_string()).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["first:foo", "second:foo"]);
        assert_eq!(signals.receiver_count(Signal::PostSave), 2);
        assert_eq!(signals.receiver_count(Signal::PostDelete), 0);
    }

    #[test]
    fn test_send_without_observers() {
        let signals: Signals<u8> = Signals::default();
        signals.send(Signal::PreSave, &1).unwrap();
    }

    #[test]
    fn test_signal_names() {
        assert_eq!(Signal::PreSave.to_string(), "pre_save");
        assert_eq!(Signal::from_str("post_delete").unwrap(), Signal::PostDelete);
        assert_eq!(
            serde_json::to_value(Signal::PostSave).unwrap(),
            serde_json::json!("post_save")
        );
    }
}
