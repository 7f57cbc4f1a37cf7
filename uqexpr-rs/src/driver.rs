//! Expression evaluation and `@loop` execution.
//!
//! Every evaluation takes a fresh [`BindingTable`] snapshot, so a loop sees
//! its own sweep value and the results of earlier iterations.

use std::io::Write;

use crate::bindings::BindingTable;
use crate::command::LoopBody;
use crate::error::{CommandError, LineError, StoreError};
use crate::expr::{self, SyntaxError};
use crate::format::{format_sig, SigFigs};
use crate::store::{is_valid_name, Lookup, Store};

/// Evaluate `src` against the current contents of `store`.
pub fn evaluate(store: &Store, src: &str) -> Result<f64, SyntaxError> {
    let bindings = BindingTable::snapshot(store);
    let compiled = expr::compile(src, &bindings)?;
    Ok(compiled.eval())
}

/// Run a `@loop` command over the loop called `name`.
///
/// The loop restarts from its first value.  For an assignment body the target
/// is resolved once, creating a zero-valued variable if it names nothing.  An
/// evaluation failure stops the loop; lines already written stay written.
pub fn run_loop<W: Write>(
    store: &mut Store,
    name: &str,
    body: LoopBody<'_>,
    sig: SigFigs,
    out: &mut W,
) -> Result<(), LineError> {
    let Lookup::Loop(idx) = store.find(name) else {
        return Err(CommandError::Syntax("@loop over an undefined loop").into());
    };
    let l = store.get_loop_mut(idx);
    l.current = l.start;

    let (expr_src, target) = match body {
        LoopBody::Expression(src) => (src, None),
        LoopBody::Assign { target, expr } => {
            if !is_valid_name(target) {
                return Err(StoreError::InvalidName(target.to_owned()).into());
            }
            (expr, Some((target, store.ensure_target(target))))
        }
    };

    let repetitions = store.get_loop(idx).repetitions();
    tracing::debug!(loop_name = name, repetitions, "running loop");

    for i in 0..repetitions {
        let current = store.get_loop(idx).value_at(i);
        store.get_loop_mut(idx).current = current;

        let value = evaluate(store, expr_src)?;
        tracing::trace!(iteration = i, current, value, "loop step");

        let shown = format_sig(current, sig);
        match target {
            None => writeln!(out, "Result = {} when {name} = {shown}", format_sig(value, sig))?,
            Some((target_name, t)) => {
                store.write(t, value);
                writeln!(out, "{target_name} = {} when {name} = {shown}", format_sig(value, sig))?;
            }
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
