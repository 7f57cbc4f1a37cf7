//! Command-line argument parsing.
//!
//! Usage:
//!   uqexpr [--loopable string] [--define string] [--significantfigures 2..8] [inputfilename]
//!
//! `--define` and `--loopable` may repeat.  Their strings are only checked
//! for presence here; decoding them into variables and loops is the job of
//! [`crate::startup`].

use std::path::PathBuf;

use crate::format::SigFigs;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Raw `name=value` strings, in command-line order.
    pub defines: Vec<String>,
    /// Raw `name,start,increment,end` strings, in command-line order.
    pub loopables: Vec<String>,
    /// Output precision (`--significantfigures`, default 3).
    pub sig_figs: SigFigs,
    /// Script file; standard input when absent.
    pub input: Option<PathBuf>,
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut sig_seen = false;
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();
        match arg {
            "--define" => args.defines.push(option_value(argv, i)?.to_owned()),
            "--loopable" => args.loopables.push(option_value(argv, i)?.to_owned()),
            "--significantfigures" => {
                if sig_seen {
                    return Err("--significantfigures given more than once".to_owned());
                }
                let value = option_value(argv, i)?;
                args.sig_figs = parse_sig_figs(value)
                    .ok_or_else(|| format!("invalid significant figures: {value:?}"))?;
                sig_seen = true;
            }
            // The input file must be the final argument.
            _ if i + 1 == argv.len() && is_input_name(arg) => {
                args.input = Some(PathBuf::from(arg));
                i += 1;
                continue;
            }
            _ => return Err(format!("unexpected argument: {arg:?}")),
        }
        // Every option consumes its value.
        i += 2;
    }

    Ok(args)
}

/// The non-empty value following the option at `argv[i]`.
fn option_value(argv: &[String], i: usize) -> Result<&str, String> {
    match argv.get(i + 1) {
        Some(v) if !v.is_empty() => Ok(v.as_str()),
        Some(_) => Err(format!("{} requires a non-empty argument", argv[i])),
        None => Err(format!("{} requires an argument", argv[i])),
    }
}

/// Non-empty, and neither of the first two characters is `-` unless the
/// name is a single character.
fn is_input_name(arg: &str) -> bool {
    match arg.as_bytes() {
        [] => false,
        [_] => true,
        [a, b, ..] => *a != b'-' && *b != b'-',
    }
}

/// A single digit `2`–`8`.
fn parse_sig_figs(s: &str) -> Option<SigFigs> {
    match s.as_bytes() {
        [d @ b'0'..=b'9'] => SigFigs::new(d - b'0'),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
