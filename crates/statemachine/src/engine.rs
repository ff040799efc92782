//! Generic transition engine.

use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display};
use std::hash::Hash;

use thiserror::Error;

/// A guard inspects the invocation context and may veto an otherwise legal
/// transition with a human-readable reason.
pub type Guard<C> = Box<dyn Fn(&C) -> Result<(), String> + Send + Sync>;

/// Errors raised when a transition cannot be executed.
#[derive(Debug, Error)]
pub enum TransitionError<S, E>
where
    S: Debug + Display,
    E: Debug + Display,
{
    /// No table entry matches (state, event).
    #[error("{machine}: illegal transition: event {event} in state {state}")]
    Illegal {
        machine: &'static str,
        state: S,
        event: E,
    },

    /// A guard vetoed a structurally legal transition.
    #[error("{machine}: transition rejected: event {event} in state {state}: {reason}")]
    Rejected {
        machine: &'static str,
        state: S,
        event: E,
        reason: String,
    },
}

struct Entry<S, C> {
    to: S,
    guard: Option<Guard<C>>,
}

/// A finite transition table executed one hop at a time.
///
/// `S` is the state enum, `E` the event enum, and `C` the context type
/// guards inspect.
pub struct StateMachine<S, E, C> {
    name: &'static str,
    table: HashMap<(S, E), Entry<S, C>>,
}

impl<S, E, C> StateMachine<S, E, C>
where
    S: Copy + Eq + Hash + Debug + Display,
    E: Copy + Eq + Hash + Debug + Display,
{
    /// Starts building a machine with the given name (used in errors).
    pub fn builder(name: &'static str) -> StateMachineBuilder<S, E, C> {
        StateMachineBuilder {
            name,
            table: HashMap::new(),
        }
    }

    /// Returns the machine name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Executes a single transition.
    ///
    /// Returns the next state, or an error when no table entry matches or a
    /// guard vetoes. The engine never mutates anything; callers persist the
    /// returned state themselves.
    pub fn fire(&self, current: S, event: E, ctx: &C) -> Result<S, TransitionError<S, E>> {
        let entry = self
            .table
            .get(&(current, event))
            .ok_or(TransitionError::Illegal {
                machine: self.name,
                state: current,
                event,
            })?;

        if let Some(guard) = &entry.guard {
            guard(ctx).map_err(|reason| TransitionError::Rejected {
                machine: self.name,
                state: current,
                event,
                reason,
            })?;
        }

        Ok(entry.to)
    }

    /// Returns true if some event leads from `current` to `target`.
    ///
    /// A state can always "transition" to itself, matching the original
    /// relaxed contract callers rely on for idempotent updates.
    pub fn can_transition(&self, current: S, target: S) -> bool {
        if current == target {
            return true;
        }
        self.table
            .iter()
            .any(|((from, _), entry)| *from == current && entry.to == target)
    }

    /// Returns the states reachable from `current` in one hop.
    pub fn next_states(&self, current: S) -> Vec<S> {
        let mut seen = HashSet::new();
        self.table
            .iter()
            .filter(|((from, _), _)| *from == current)
            .map(|(_, entry)| entry.to)
            .filter(|to| seen.insert(*to))
            .collect()
    }
}

/// Builder collecting table entries for a [`StateMachine`].
pub struct StateMachineBuilder<S, E, C> {
    name: &'static str,
    table: HashMap<(S, E), Entry<S, C>>,
}

impl<S, E, C> StateMachineBuilder<S, E, C>
where
    S: Copy + Eq + Hash + Debug + Display,
    E: Copy + Eq + Hash + Debug + Display,
{
    /// Adds an unguarded transition.
    pub fn transition(mut self, from: S, event: E, to: S) -> Self {
        self.table.insert((from, event), Entry { to, guard: None });
        self
    }

    /// Adds a guarded transition.
    pub fn guarded(
        mut self,
        from: S,
        event: E,
        to: S,
        guard: impl Fn(&C) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.table.insert(
            (from, event),
            Entry {
                to,
                guard: Some(Box::new(guard)),
            },
        );
        self
    }

    /// Finishes the machine.
    pub fn build(self) -> StateMachine<S, E, C> {
        StateMachine {
            name: self.name,
            table: self.table,
        }
    }
}
