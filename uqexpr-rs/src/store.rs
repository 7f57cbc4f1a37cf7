//! Variable and loop storage.
//!
//! Variables live in a vector of [`Slot`]s.  Promoting a variable to a loop
//! tombstones its slot instead of removing it, so the store can still tell
//! "no live variables" apart from "no variables ever defined".  Loops are kept
//! in declaration order.  A name is unique across both collections.

use crate::error::StoreError;

/// Longest accepted variable or loop name.
pub const MAX_NAME_LEN: usize = 22;

/// Returns `true` if `name` is 1–22 ASCII letters.
pub fn is_valid_name(name: &str) -> bool {
    (1..=MAX_NAME_LEN).contains(&name.len()) && name.bytes().all(|b| b.is_ascii_alphabetic())
}

fn check_name(name: &str) -> Result<(), StoreError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_owned()))
    }
}

// ── Public types ──────────────────────────────────────────────────────────────

/// A plain named scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub value: f64,
}

/// A variable slot: live, or dead after promotion to a loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Live(Variable),
    Tombstoned,
}

impl Slot {
    fn live(&self) -> Option<&Variable> {
        match self {
            Slot::Live(v) => Some(v),
            Slot::Tombstoned => None,
        }
    }
}

/// A loop variable sweeping `start..=end` by `increment`.
#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    pub name: String,
    pub current: f64,
    pub start: f64,
    pub increment: f64,
    pub end: f64,
}

impl Loop {
    /// Check the sign-consistency rule for a range.
    ///
    /// `increment` must be non-zero and point from `start` towards `end`;
    /// `start == end` accepts either sign.  Non-finite values are rejected
    /// because the iteration count would be undefined.
    pub fn is_valid_range(start: f64, increment: f64, end: f64) -> bool {
        if !(start.is_finite() && increment.is_finite() && end.is_finite()) {
            return false;
        }
        !(increment == 0.0 || (start < end && increment < 0.0) || (start > end && increment > 0.0))
    }

    /// Number of iterations a `@loop` over this range performs.
    ///
    /// `1 + floor((end - start) / increment)`, evaluated in floating point.
    /// Quotients that land just below an integer lose an iteration; that is
    /// the documented behaviour.
    pub fn repetitions(&self) -> u64 {
        let span = ((self.end - self.start) / self.increment).floor();
        // A validated range never yields a negative span.  The cast saturates
        // for huge quotients, so the count is capped at `u64::MAX`.
        (span.max(0.0) as u64).saturating_add(1)
    }

    /// Value of the swept variable on iteration `i`, computed from `start`
    /// each time so that rounding does not accumulate.
    pub fn value_at(&self, i: u64) -> f64 {
        self.start + i as f64 * self.increment
    }
}

/// Result of a name lookup across both collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Variable(usize),
    Loop(usize),
    None,
}

/// Where an assignment writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Variable(usize),
    Loop(usize),
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// The interpreter's variable and loop tables.
#[derive(Debug, Default)]
pub struct Store {
    slots: Vec<Slot>,
    loops: Vec<Loop>,
    tombstoned: usize,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locate `name` among live variables and loops.
    pub fn find(&self, name: &str) -> Lookup {
        if let Some(i) = self
            .slots
            .iter()
            .position(|s| s.live().is_some_and(|v| v.name == name))
        {
            return Lookup::Variable(i);
        }
        match self.loops.iter().position(|l| l.name == name) {
            Some(i) => Lookup::Loop(i),
            None => Lookup::None,
        }
    }

    /// Add a new variable.  Fails if the name is malformed or already used.
    pub fn define_variable(&mut self, name: &str, value: f64) -> Result<(), StoreError> {
        check_name(name)?;
        if self.find(name) != Lookup::None {
            return Err(StoreError::Duplicate(name.to_owned()));
        }
        self.push_variable(name, value);
        Ok(())
    }

    /// Add a new loop.  Fails on a malformed name, an inconsistent range, or a
    /// name already used by a variable or loop.
    pub fn define_loop(
        &mut self,
        name: &str,
        start: f64,
        increment: f64,
        end: f64,
    ) -> Result<(), StoreError> {
        check_name(name)?;
        if !Loop::is_valid_range(start, increment, end) {
            return Err(StoreError::InvalidRange(name.to_owned()));
        }
        if self.find(name) != Lookup::None {
            return Err(StoreError::Duplicate(name.to_owned()));
        }
        self.push_loop(name, start, increment, end);
        Ok(())
    }

    /// Declare `name` as a loop, as `@range` does.
    ///
    /// An existing loop is redefined in place.  A live variable of the same
    /// name is tombstoned and replaced by a new loop.  Name and range are
    /// validated before anything changes; duplicates are never an error.
    pub fn promote_or_redefine_loop(
        &mut self,
        name: &str,
        start: f64,
        increment: f64,
        end: f64,
    ) -> Result<&Loop, StoreError> {
        check_name(name)?;
        if !Loop::is_valid_range(start, increment, end) {
            return Err(StoreError::InvalidRange(name.to_owned()));
        }
        let idx = match self.find(name) {
            Lookup::Loop(i) => {
                let l = &mut self.loops[i];
                l.current = start;
                l.start = start;
                l.increment = increment;
                l.end = end;
                i
            }
            Lookup::Variable(i) => {
                tracing::debug!(name, "promoting variable to loop");
                self.slots[i] = Slot::Tombstoned;
                self.tombstoned += 1;
                self.push_loop(name, start, increment, end)
            }
            Lookup::None => self.push_loop(name, start, increment, end),
        };
        Ok(&self.loops[idx])
    }

    /// Assign `value` to `name`: an existing variable, else an existing loop's
    /// current value, else a freshly created variable.
    pub fn assign(&mut self, name: &str, value: f64) -> Target {
        let target = self.ensure_target(name);
        self.write(target, value);
        target
    }

    /// Resolve `name` to an assignment target, creating a variable holding 0
    /// if the name is unknown.  The caller validates the name.
    pub fn ensure_target(&mut self, name: &str) -> Target {
        match self.find(name) {
            Lookup::Variable(i) => Target::Variable(i),
            Lookup::Loop(i) => Target::Loop(i),
            Lookup::None => Target::Variable(self.push_variable(name, 0.0)),
        }
    }

    /// Store `value` into a resolved target.
    pub fn write(&mut self, target: Target, value: f64) {
        match target {
            Target::Variable(i) => {
                if let Slot::Live(v) = &mut self.slots[i] {
                    v.value = value;
                }
            }
            Target::Loop(i) => self.loops[i].current = value,
        }
    }

    pub fn get_loop(&self, idx: usize) -> &Loop {
        &self.loops[idx]
    }

    pub fn get_loop_mut(&mut self, idx: usize) -> &mut Loop {
        &mut self.loops[idx]
    }

    /// Live variables in definition order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.slots.iter().filter_map(Slot::live)
    }

    /// All loops in declaration order.
    pub fn loops(&self) -> impl Iterator<Item = &Loop> {
        self.loops.iter()
    }

    pub fn live_variable_count(&self) -> usize {
        self.slots.len() - self.tombstoned
    }

    /// Number of variable slots given up to promotion.
    pub fn tombstoned_count(&self) -> usize {
        self.tombstoned
    }

    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }

    fn push_variable(&mut self, name: &str, value: f64) -> usize {
        self.slots.push(Slot::Live(Variable {
            name: name.to_owned(),
            value,
        }));
        self.slots.len() - 1
    }

    fn push_loop(&mut self, name: &str, start: f64, increment: f64, end: f64) -> usize {
        self.loops.push(Loop {
            name: name.to_owned(),
            current: start,
            start,
            increment,
            end,
        });
        self.loops.len() - 1
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
