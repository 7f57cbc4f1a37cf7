//! Binding tables handed to the expression evaluator.
//!
//! A table is a snapshot of every live loop and variable at one instant.  It
//! is rebuilt before each evaluation because loop sweeps and assignments change
//! values between evaluations of the same command.

use crate::store::Store;

/// One name→value pair visible to an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub value: f64,
}

/// Snapshot of the store, loops first, then live variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingTable {
    entries: Vec<Binding>,
}

impl BindingTable {
    /// Capture the current values of all live names in `store`.
    pub fn snapshot(store: &Store) -> Self {
        let loops = store.loops().map(|l| Binding {
            name: l.name.clone(),
            value: l.current,
        });
        let vars = store.variables().map(|v| Binding {
            name: v.name.clone(),
            value: v.value,
        });
        BindingTable {
            entries: loops.chain(vars).collect(),
        }
    }

    /// Position of `name` in the table.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|b| b.name == name)
    }

    pub fn as_slice(&self) -> &[Binding] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, f64)> for BindingTable {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        BindingTable {
            entries: iter
                .into_iter()
                .map(|(name, value)| Binding { name, value })
                .collect(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
