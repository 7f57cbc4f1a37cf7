//! Error types shared by the store, the command pipeline, and startup.

use thiserror::Error;

use crate::expr::SyntaxError;

// ── Store errors ──────────────────────────────────────────────────────────────

/// Rejection from the variable/loop store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Name is empty, longer than 22 characters, or not purely alphabetic.
    #[error("invalid name {0:?}")]
    InvalidName(String),
    /// Loop bounds and increment are inconsistent (or not finite).
    #[error("invalid range for {0:?}")]
    InvalidRange(String),
    /// A `name=value` definition is malformed or its value is not a number.
    #[error("invalid definition {0:?}")]
    InvalidValue(String),
    /// Name is already in use by a live variable or loop.
    #[error("{0:?} is already defined")]
    Duplicate(String),
}

// ── Per-line errors ───────────────────────────────────────────────────────────

/// Failure of a single input line.  Every variant is reported to the user with
/// the same generic diagnostic; the detail only reaches the debug log.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("syntax error: {0}")]
    Syntax(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Eval(#[from] SyntaxError),
}

impl CommandError {
    /// The single diagnostic line printed for any failing command.
    pub const DIAGNOSTIC: &'static str = "Error in command, expression or assignment operation";
}

/// Outcome of executing one line: either the command failed, which is
/// reported and then forgotten, or writing output failed, which ends the run.
#[derive(Debug, Error)]
pub enum LineError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for LineError {
    fn from(e: StoreError) -> Self {
        LineError::Command(e.into())
    }
}

impl From<SyntaxError> for LineError {
    fn from(e: SyntaxError) -> Self {
        LineError::Command(e.into())
    }
}

// ── Startup errors ────────────────────────────────────────────────────────────

/// Fatal error raised before the first input line is read.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(
        "Usage: uqexpr [--loopable string] [--define string] \
         [--significantfigures 2..8] [inputfilename]"
    )]
    Usage(String),
    #[error("uqexpr: can't open file \"{0}\" for reading")]
    Unreadable(String),
    #[error("uqexpr: invalid variable(s) were found")]
    Invalid(StoreError),
    #[error("uqexpr: one or more variables are duplicated")]
    Duplicate(String),
}

impl StartupError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::Usage(_) => 4,
            StartupError::Unreadable(_) => 7,
            StartupError::Invalid(_) => 12,
            StartupError::Duplicate(_) => 6,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
