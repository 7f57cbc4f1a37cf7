//! Startup: turning [`CliArgs`] into a ready-to-run initial state.
//!
//! Failures are checked in a fixed order: the input file must open, then
//! every `--define`/`--loopable` string must be well-formed, and only then
//! are names checked for duplicates.

use std::fs::File;

use crate::cli::CliArgs;
use crate::command::{parse_number, RangeArgs};
use crate::error::{StartupError, StoreError};
use crate::format::SigFigs;
use crate::store::{is_valid_name, Loop, Store};

/// Everything a session needs before reading its first line.
#[derive(Debug)]
pub struct Prepared {
    pub store: Store,
    pub sig_figs: SigFigs,
    /// Opened script file, or `None` to read standard input.
    pub input: Option<File>,
}

/// Open the input and build the initial store from parsed arguments.
pub fn prepare(args: CliArgs) -> Result<Prepared, StartupError> {
    let input = match &args.input {
        Some(path) => Some(
            File::open(path).map_err(|_| StartupError::Unreadable(path.display().to_string()))?,
        ),
        None => None,
    };
    let store = initial_store(&args.defines, &args.loopables)?;
    tracing::debug!(
        variables = store.live_variable_count(),
        loops = store.loop_count(),
        "initial state ready"
    );
    Ok(Prepared {
        store,
        sig_figs: args.sig_figs,
        input,
    })
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decode a `--define` string: `name=value` with exactly one `=`.
pub fn decode_define(text: &str) -> Result<(&str, f64), StoreError> {
    let invalid = || StoreError::InvalidValue(text.to_owned());
    if text.matches('=').count() != 1 {
        return Err(invalid());
    }
    let (name, value) = text.split_once('=').ok_or_else(invalid)?;
    if !is_valid_name(name) {
        return Err(StoreError::InvalidName(name.to_owned()));
    }
    let value = parse_number(value).ok_or_else(invalid)?;
    Ok((name, value))
}

/// Decode a `--loopable` string: `name,start,increment,end`, with the same
/// name and range rules as `@range`.
pub fn decode_loopable(text: &str) -> Result<RangeArgs<'_>, StoreError> {
    let r = RangeArgs::parse(text)?;
    if !is_valid_name(r.name) {
        return Err(StoreError::InvalidName(r.name.to_owned()));
    }
    if !Loop::is_valid_range(r.start, r.increment, r.end) {
        return Err(StoreError::InvalidRange(text.to_owned()));
    }
    Ok(r)
}

/// Build the initial store.  Every string is decoded before any name is
/// checked for duplicates, so a malformed string always wins.
pub fn initial_store(defines: &[String], loopables: &[String]) -> Result<Store, StartupError> {
    let variables = defines
        .iter()
        .map(|d| decode_define(d))
        .collect::<Result<Vec<_>, _>>()
        .map_err(StartupError::Invalid)?;
    let loops = loopables
        .iter()
        .map(|l| decode_loopable(l))
        .collect::<Result<Vec<_>, _>>()
        .map_err(StartupError::Invalid)?;

    let mut store = Store::new();
    for (name, value) in variables {
        store.define_variable(name, value).map_err(into_startup)?;
    }
    for r in loops {
        store
            .define_loop(r.name, r.start, r.increment, r.end)
            .map_err(into_startup)?;
    }
    Ok(store)
}

fn into_startup(e: StoreError) -> StartupError {
    match e {
        StoreError::Duplicate(name) => StartupError::Duplicate(name),
        other => StartupError::Invalid(other),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Lookup;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|&s| s.to_owned()).collect()
    }

    fn build(defines: &[&str], loopables: &[&str]) -> Result<Store, StartupError> {
        initial_store(&strings(defines), &strings(loopables))
    }

    #[test]
    fn define_decoding() {
        assert_eq!(decode_define("x=2.5"), Ok(("x", 2.5)));
        assert_eq!(decode_define("rate=-1e-3"), Ok(("rate", -0.001)));
    }

    #[test]
    fn define_rejections() {
        for bad in ["x", "x=", "=1", "x=1=2", "x=1.5abc", "x1=2", "x= 1"] {
            assert!(decode_define(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn loopable_decoding() {
        let r = decode_loopable("i,10,-2,0").unwrap();
        assert_eq!((r.name, r.start, r.increment, r.end), ("i", 10.0, -2.0, 0.0));
    }

    #[test]
    fn loopable_rejections() {
        for bad in ["i,0,1", "i,0,1,5,6", "i,0,0,5", "i,0,-1,5", "i2,0,1,5", ",0,1,5", "i,a,1,5"] {
            assert!(decode_loopable(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn builds_store_in_order() {
        let s = build(&["b=2", "a=1"], &["i,0,1,3", "j,5,-1,0"]).unwrap();
        let names: Vec<_> = s.variables().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(s.find("j"), Lookup::Loop(1));
        assert_eq!(s.get_loop(0).current, 0.0);
    }

    #[test]
    fn duplicate_variable() {
        assert!(matches!(build(&["x=1", "x=2"], &[]), Err(StartupError::Duplicate(_))));
    }

    #[test]
    fn duplicate_across_kinds() {
        assert!(matches!(
            build(&["x=1"], &["x,0,1,2"]),
            Err(StartupError::Duplicate(_))
        ));
        assert!(matches!(
            build(&[], &["i,0,1,2", "i,0,1,3"]),
            Err(StartupError::Duplicate(_))
        ));
    }

    #[test]
    fn invalid_wins_over_duplicate() {
        let e = build(&["x=1", "x=2"], &["i,0,-1,5"]).unwrap_err();
        assert_eq!(e.exit_code(), 12);
    }

    #[test]
    fn unreadable_file_checked_first() {
        let args = CliArgs {
            defines: strings(&["bad"]),
            input: Some("/nonexistent/uqexpr/script".into()),
            ..CliArgs::default()
        };
        let e = prepare(args).unwrap_err();
        assert!(matches!(e, StartupError::Unreadable(_)));
    }

    #[test]
    fn prepare_without_input_reads_stdin() {
        let args = CliArgs {
            defines: strings(&["x=1"]),
            ..CliArgs::default()
        };
        let p = prepare(args).unwrap();
        assert!(p.input.is_none());
        assert_eq!(p.store.live_variable_count(), 1);
        assert_eq!(p.sig_figs, SigFigs::DEFAULT);
    }
}
