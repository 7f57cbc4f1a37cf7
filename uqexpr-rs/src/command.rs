//! Input line classification.
//!
//! [`classify`] decides which of the five command kinds a line is and slices
//! out its operands.  It never touches interpreter state.
//!
//! | Line | Command |
//! |------|---------|
//! | contains `#`, or blank | [`Command::Skip`] |
//! | `@print` | [`Command::PrintAll`] |
//! | `@range name,start,increment,end` | [`Command::Range`] |
//! | `@loop name expr` / `@loop name target = expr` | [`Command::Loop`] |
//! | `name = expr` | [`Command::Assign`] |
//! | `expr` | [`Command::Expression`] |

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CommandError, StoreError};
use crate::expr::scan_hex;

// ── Public types ──────────────────────────────────────────────────────────────

/// A classified input line, borrowing from the line text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Comment or blank line: no output, no state change.
    Skip,
    PrintAll,
    /// The raw `name,start,increment,end` argument of `@range`.
    Range(&'a str),
    Loop { name: &'a str, body: LoopBody<'a> },
    Assign { target: &'a str, expr: &'a str },
    Expression(&'a str),
}

/// What a `@loop` line does on each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopBody<'a> {
    Expression(&'a str),
    Assign { target: &'a str, expr: &'a str },
}

/// Parsed `name,start,increment,end` tuple, as used by `@range` and
/// `--loopable`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeArgs<'a> {
    pub name: &'a str,
    pub start: f64,
    pub increment: f64,
    pub end: f64,
}

impl<'a> RangeArgs<'a> {
    /// Split and parse a range tuple.
    ///
    /// Exactly four comma-separated fields are required; every numeric field
    /// must be non-empty and fully consumed by the number parser.  The name
    /// and the range consistency are checked later by the store.
    pub fn parse(text: &'a str) -> Result<Self, StoreError> {
        let fields: Vec<&str> = text.split(',').collect();
        let [name, start, increment, end] = fields[..] else {
            return Err(StoreError::InvalidRange(text.to_owned()));
        };
        let num = |field: &str| {
            parse_number(field).ok_or_else(|| StoreError::InvalidRange(text.to_owned()))
        };
        Ok(RangeArgs {
            name,
            start: num(start)?,
            increment: num(increment)?,
            end: num(end)?,
        })
    }
}

/// Parse a number that must occupy the whole of `field`.  Decimal and
/// hexadecimal (`0x1.8p3`) forms are accepted, with an optional sign.
pub fn parse_number(field: &str) -> Option<f64> {
    if field.is_empty() {
        return None;
    }
    let (negative, digits) = match field.as_bytes() {
        [b'-', rest @ ..] => (true, rest),
        [b'+', rest @ ..] => (false, rest),
        rest => (false, rest),
    };
    match scan_hex(digits) {
        Some((value, len)) if len == digits.len() => Some(if negative { -value } else { value }),
        Some(_) => None,
        None => field.parse().ok(),
    }
}

// ── Classification ────────────────────────────────────────────────────────────

/// `@loop <name>[ <body>]`, where the name starts with a letter and runs to
/// the next space.
fn loop_head() -> Option<&'static Regex> {
    static LOOP_HEAD: OnceLock<Option<Regex>> = OnceLock::new();
    LOOP_HEAD
        .get_or_init(|| Regex::new(r"^@loop ([A-Za-z][^ ]*)(?: (.*))?$").ok())
        .as_ref()
}

/// Split `target = expr` at its single `=`; the target is trimmed.
fn split_assignment(text: &str) -> Option<(&str, &str)> {
    text.split_once('=').map(|(lhs, rhs)| (lhs.trim(), rhs))
}

/// Classify one input line (without its line terminator).
pub fn classify(line: &str) -> Result<Command<'_>, CommandError> {
    if line.contains('#') || line.trim().is_empty() {
        return Ok(Command::Skip);
    }

    let trimmed = line.trim();
    if trimmed == "@print" {
        return Ok(Command::PrintAll);
    }

    if trimmed.split(' ').next() == Some("@range") {
        return match trimmed.split_once(' ') {
            Some((_, arg)) if !arg.contains(' ') => Ok(Command::Range(arg)),
            _ => Err(CommandError::Syntax("malformed @range directive")),
        };
    }

    if let Some(caps) = loop_head().and_then(|re| re.captures(line)) {
        let name = caps.get(1).map_or("", |m| m.as_str());
        let rest = caps
            .get(2)
            .ok_or(CommandError::Syntax("@loop without a body"))?
            .as_str();
        let body = match rest.matches('=').count() {
            0 => LoopBody::Expression(rest),
            1 => {
                let (target, expr) =
                    split_assignment(rest).ok_or(CommandError::Syntax("bad loop assignment"))?;
                LoopBody::Assign { target, expr }
            }
            _ => return Err(CommandError::Syntax("too many '=' in @loop body")),
        };
        return Ok(Command::Loop { name, body });
    }

    match line.matches('=').count() {
        0 => Ok(Command::Expression(line)),
        1 => {
            let (target, expr) =
                split_assignment(line).ok_or(CommandError::Syntax("bad assignment"))?;
            Ok(Command::Assign { target, expr })
        }
        _ => Err(CommandError::Syntax("too many '=' in line")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn syntax_error(line: &str) -> bool {
        matches!(classify(line), Err(CommandError::Syntax(_)))
    }

    #[test]
    fn comments_and_blanks_are_skipped() {
        assert_eq!(classify("# note"), Ok(Command::Skip));
        assert_eq!(classify("x = 1 # trailing"), Ok(Command::Skip));
        assert_eq!(classify("@range a,0,1,5#"), Ok(Command::Skip));
        assert_eq!(classify(""), Ok(Command::Skip));
        assert_eq!(classify("   \t"), Ok(Command::Skip));
    }

    #[test]
    fn print_all() {
        assert_eq!(classify("@print"), Ok(Command::PrintAll));
        assert_eq!(classify("  @print  "), Ok(Command::PrintAll));
        // Arguments make it an ordinary (and invalid) expression.
        assert_eq!(classify("@print x"), Ok(Command::Expression("@print x")));
    }

    #[test]
    fn range_directive() {
        assert_eq!(classify("@range a,0,1,5"), Ok(Command::Range("a,0,1,5")));
        assert_eq!(classify("  @range a,0,1,5 "), Ok(Command::Range("a,0,1,5")));
    }

    #[test]
    fn range_spacing_errors() {
        assert!(syntax_error("@range"));
        assert!(syntax_error("@range  a,0,1,5"));
        assert!(syntax_error("@range a, 0,1,5"));
        assert!(syntax_error("@range a,0,1,5 b"));
    }

    #[test]
    fn loop_expression_form() {
        assert_eq!(
            classify("@loop a a * 2"),
            Ok(Command::Loop {
                name: "a",
                body: LoopBody::Expression("a * 2")
            })
        );
    }

    #[test]
    fn loop_assignment_form() {
        assert_eq!(
            classify("@loop a x = x + 1"),
            Ok(Command::Loop {
                name: "a",
                body: LoopBody::Assign {
                    target: "x",
                    expr: " x + 1"
                }
            })
        );
    }

    #[test]
    fn loop_errors() {
        assert!(syntax_error("@loop a"));
        assert!(syntax_error("@loop a x = y = 1"));
    }

    #[test]
    fn loop_head_must_be_exact() {
        // Leading whitespace or a non-alphabetic name means no loop.
        assert_eq!(classify(" @loop a a"), Ok(Command::Expression(" @loop a a")));
        assert_eq!(classify("@loop 1 a"), Ok(Command::Expression("@loop 1 a")));
        assert_eq!(classify("@loop  a a"), Ok(Command::Expression("@loop  a a")));
    }

    #[test]
    fn assignment_and_expression() {
        assert_eq!(
            classify("  total = 2 + 2"),
            Ok(Command::Assign {
                target: "total",
                expr: " 2 + 2"
            })
        );
        assert_eq!(classify("1 + 2"), Ok(Command::Expression("1 + 2")));
        assert!(syntax_error("a = b = 3"));
    }

    #[test]
    fn range_args_parse() {
        let r = RangeArgs::parse("a,0,0.5,2").unwrap();
        assert_eq!(r.name, "a");
        assert_eq!((r.start, r.increment, r.end), (0.0, 0.5, 2.0));
    }

    #[test]
    fn range_args_reject_bad_fields() {
        assert!(RangeArgs::parse("a,0,1").is_err());
        assert!(RangeArgs::parse("a,0,1,5,6").is_err());
        assert!(RangeArgs::parse("a,,1,5").is_err());
        assert!(RangeArgs::parse("a,0,1x,5").is_err());
        assert!(RangeArgs::parse("a,0,1,5 ").is_err());
    }

    #[test]
    fn number_fields() {
        assert_eq!(parse_number("2.5"), Some(2.5));
        assert_eq!(parse_number("-1e2"), Some(-100.0));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("3abc"), None);
        assert_eq!(parse_number("0x10"), Some(16.0));
        assert_eq!(parse_number("-0x1p-1"), Some(-0.5));
        assert_eq!(parse_number("0x10g"), None);
    }
}
