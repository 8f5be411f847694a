//! Debug logging of actions and state changes.
//!
//! [`DebugOptions`] turns on `tracing` output for a store: each processed
//! action is logged with `{:?}`, and each state change is logged as a
//! structural diff of the old and new state.

use std::fmt::Debug;

use pretty_assertions::Comparison;
use tracing::Level;

/// Which debug output a store emits, and at what level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugOptions {
    pub actions: Option<Level>,
    pub state_changes: Option<Level>,
}

impl DebugOptions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn actions(level: Level) -> Self {
        Self {
            actions: Some(level),
            state_changes: None,
        }
    }

    pub fn state_changes(level: Level) -> Self {
        Self {
            actions: None,
            state_changes: Some(level),
        }
    }

    pub fn actions_and_state_changes(actions: Level, state_changes: Level) -> Self {
        Self {
            actions: Some(actions),
            state_changes: Some(state_changes),
        }
    }

    pub fn is_none(&self) -> bool {
        self.actions.is_none() && self.state_changes.is_none()
    }
}

/// Render a line diff of the pretty-printed `old` and `new` values.
pub fn diff<T: Debug + ?Sized>(old: &T, new: &T) -> String {
    Comparison::new(old, new).to_string()
}

/// Emit `message` at a level chosen at runtime.
pub fn log(level: Level, store: &str, message: &str) {
    if level == Level::ERROR {
        tracing::error!(store, "{message}");
    } else if level == Level::WARN {
        tracing::warn!(store, "{message}");
    } else if level == Level::INFO {
        tracing::info!(store, "{message}");
    } else if level == Level::DEBUG {
        tracing::debug!(store, "{message}");
    } else {
        tracing::trace!(store, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Counter {
        number: i32,
        name: &'static str,
    }

    #[test]
    fn diff_mentions_changed_field() {
        let old = Counter {
            number: 0,
            name: "a",
        };
        let new = Counter {
            number: 1,
            name: "a",
        };
        let rendered = diff(&old, &new);
        assert!(rendered.contains("number"));
    }

    #[test]
    fn options_constructors() {
        assert!(DebugOptions::none().is_none());
        assert_eq!(DebugOptions::actions(Level::INFO).actions, Some(Level::INFO));
        assert_eq!(
            DebugOptions::actions_and_state_changes(Level::DEBUG, Level::TRACE).state_changes,
            Some(Level::TRACE)
        );
    }
}
