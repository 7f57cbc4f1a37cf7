//! uqexpr: a line-oriented calculator with named variables and loop variables.
//!
//! Input lines are assignments (`x = 2 * pi`), bare expressions, or one of
//! three directives:
//!
//! - `@print` lists every variable and loop variable.
//! - `@range name,start,increment,end` declares (or redeclares) a loop.
//! - `@loop name body` evaluates `body` once per value of the loop.
//!
//! Every printed number is rendered with a fixed number of significant
//! figures (see [`format`]).

pub mod bindings;
pub mod cli;
pub mod command;
pub mod driver;
pub mod error;
pub mod expr;
pub mod format;
pub mod session;
pub mod startup;
pub mod store;
