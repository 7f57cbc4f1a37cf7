//! Interpreter session.
//!
//! A [`Session`] owns the variable/loop store, the significant-figure setting,
//! and the two output sinks.  It executes input one line at a time: the line
//! is classified, run to completion (every iteration of a loop included), and
//! both sinks are flushed before the next line is read.
//!
//! # Quick start
//!
//! ```rust
//! use uqexpr::format::SigFigs;
//! use uqexpr::session::Session;
//! use uqexpr::store::Store;
//!
//! let mut s = Session::new(Store::new(), SigFigs::DEFAULT, Vec::new(), Vec::new());
//! s.execute_line("x = 2 + 2").unwrap();
//! s.execute_line("x * 2").unwrap();
//! assert_eq!(String::from_utf8_lossy(s.stdout()), "x = 4\nResult = 8\n");
//! ```

use std::io::{self, BufRead, Write};

use crate::command::{classify, Command, RangeArgs};
use crate::driver::{evaluate, run_loop};
use crate::error::{CommandError, LineError, StoreError};
use crate::format::{format_sig, SigFigs};
use crate::store::{is_valid_name, Loop, Store};

pub struct Session<W: Write, E: Write> {
    store: Store,
    sig: SigFigs,
    out: W,
    err: E,
}

impl<W: Write, E: Write> Session<W, E> {
    pub fn new(store: Store, sig: SigFigs, out: W, err: E) -> Self {
        Session {
            store,
            sig,
            out,
            err,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn stdout(&self) -> &W {
        &self.out
    }

    pub fn stderr(&self) -> &E {
        &self.err
    }

    // ── Run framing ───────────────────────────────────────────────────────────

    /// Greeting, the initial variable listing, and a prompt when `interactive`
    /// (input is standard input rather than a script file).
    pub fn welcome(&mut self, interactive: bool) -> io::Result<()> {
        writeln!(self.out, "Welcome to uqexpr!")?;
        self.print_all()?;
        if interactive {
            writeln!(self.out, "Please enter your expressions and assignment operations.")?;
        }
        self.out.flush()
    }

    pub fn farewell(&mut self) -> io::Result<()> {
        writeln!(self.out, "Thank you for using uqexpr.")?;
        self.out.flush()
    }

    /// Execute every line of `input` until end of input.
    ///
    /// Lines are split on `\n` (a trailing `\r` is dropped too) and decoded
    /// lossily, so bytes that are not UTF-8 only fail their own line.
    pub fn run<R: BufRead>(&mut self, mut input: R) -> io::Result<()> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                return Ok(());
            }
            let raw = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            self.execute_line(&String::from_utf8_lossy(raw))?;
        }
    }

    // ── Line execution ────────────────────────────────────────────────────────

    /// Execute one line.  A failing command produces a single diagnostic on
    /// the error sink; only output errors are returned.
    pub fn execute_line(&mut self, line: &str) -> io::Result<()> {
        match self.dispatch(line) {
            Ok(()) => {}
            Err(LineError::Command(e)) => {
                tracing::debug!(line, error = %e, "command failed");
                writeln!(self.err, "{}", CommandError::DIAGNOSTIC)?;
            }
            Err(LineError::Io(e)) => return Err(e),
        }
        self.out.flush()?;
        self.err.flush()
    }

    fn dispatch(&mut self, line: &str) -> Result<(), LineError> {
        let command = classify(line)?;
        tracing::debug!(line, ?command, "classified");
        match command {
            Command::Skip => Ok(()),
            Command::PrintAll => Ok(self.print_all()?),
            Command::Range(arg) => self.declare_range(arg),
            Command::Loop { name, body } => {
                run_loop(&mut self.store, name, body, self.sig, &mut self.out)
            }
            Command::Assign { target, expr } => self.assign(target, expr),
            Command::Expression(src) => {
                let value = evaluate(&self.store, src)?;
                writeln!(self.out, "Result = {}", format_sig(value, self.sig))?;
                Ok(())
            }
        }
    }

    fn declare_range(&mut self, arg: &str) -> Result<(), LineError> {
        let r = RangeArgs::parse(arg)?;
        let sig = self.sig;
        let l = self
            .store
            .promote_or_redefine_loop(r.name, r.start, r.increment, r.end)?;
        writeln!(self.out, "{}", range_line(l, sig))?;
        Ok(())
    }

    fn assign(&mut self, target: &str, src: &str) -> Result<(), LineError> {
        if !is_valid_name(target) {
            return Err(StoreError::InvalidName(target.to_owned()).into());
        }
        let value = evaluate(&self.store, src)?;
        self.store.assign(target, value);
        writeln!(self.out, "{target} = {}", format_sig(value, self.sig))?;
        Ok(())
    }

    /// `@print`: list live variables, then loops.
    pub fn print_all(&mut self) -> io::Result<()> {
        let sig = self.sig;
        if self.store.live_variable_count() == 0 {
            writeln!(self.out, "No variables were defined.")?;
        } else {
            writeln!(self.out, "Variables:")?;
            for v in self.store.variables() {
                writeln!(self.out, "{} = {}", v.name, format_sig(v.value, sig))?;
            }
        }
        if self.store.loop_count() == 0 {
            writeln!(self.out, "No loop variables were defined.")?;
        } else {
            writeln!(self.out, "Loop variables:")?;
            for l in self.store.loops() {
                writeln!(self.out, "{}", range_line(l, sig))?;
            }
        }
        Ok(())
    }
}

/// `name = current (start, increment, end)`
fn range_line(l: &Loop, sig: SigFigs) -> String {
    format!(
        "{} = {} ({}, {}, {})",
        l.name,
        format_sig(l.current, sig),
        format_sig(l.start, sig),
        format_sig(l.increment, sig),
        format_sig(l.end, sig),
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    type TestSession = Session<Vec<u8>, Vec<u8>>;

    fn session() -> TestSession {
        Session::new(Store::new(), SigFigs::DEFAULT, Vec::new(), Vec::new())
    }

    fn with_sig(n: u8) -> TestSession {
        Session::new(Store::new(), SigFigs::new(n).unwrap(), Vec::new(), Vec::new())
    }

    /// Run `script` and return (stdout, stderr).
    fn exec(s: &mut TestSession, script: &str) -> (String, String) {
        s.run(script.as_bytes()).unwrap();
        (
            String::from_utf8_lossy(s.stdout()).into_owned(),
            String::from_utf8_lossy(s.stderr()).into_owned(),
        )
    }

    fn error_count(stderr: &str) -> usize {
        stderr.lines().filter(|l| *l == CommandError::DIAGNOSTIC).count()
    }

    #[test]
    fn assignment_then_reference() {
        let mut s = session();
        let (out, err) = exec(&mut s, "name = 2+2\nname*2\n");
        assert_eq!(out, "name = 4\nResult = 8\n");
        assert!(err.is_empty());
    }

    #[test]
    fn reassignment_updates_in_place() {
        let mut s = session();
        exec(&mut s, "x = 1\nx = x + 1\n");
        assert_eq!(s.store().live_variable_count(), 1);
        assert_eq!(crate::driver::evaluate(s.store(), "x"), Ok(2.0));
    }

    #[test]
    fn assignment_to_loop_sets_current() {
        let mut s = session();
        let (out, _) = exec(&mut s, "@range a,0,1,5\na = 3\n@print\n");
        assert!(out.contains("a = 3 (0, 1, 5)\n"));
        assert_eq!(s.store().live_variable_count(), 0);
    }

    #[test]
    fn invalid_assignment_target() {
        let mut s = session();
        let (out, err) = exec(&mut s, "x1 = 3\n = 3\nmy var = 3\n");
        assert!(out.is_empty());
        assert_eq!(error_count(&err), 3);
    }

    #[test]
    fn failed_assignment_creates_nothing() {
        let mut s = session();
        let (_, err) = exec(&mut s, "x = y + 1\n");
        assert_eq!(error_count(&err), 1);
        assert_eq!(s.store().live_variable_count(), 0);
    }

    #[test]
    fn comment_lines_do_nothing() {
        let mut s = session();
        let (out, err) = exec(&mut s, "x = 1 # set x\n# @print\n@range a,0,1,3 #\n\n");
        assert!(out.is_empty());
        assert!(err.is_empty());
        assert_eq!(s.store().live_variable_count(), 0);
        assert_eq!(s.store().loop_count(), 0);
    }

    #[test]
    fn print_empty() {
        let mut s = session();
        let (out, _) = exec(&mut s, "@print\n");
        assert_eq!(out, "No variables were defined.\nNo loop variables were defined.\n");
    }

    #[test]
    fn range_declares_and_echoes() {
        let mut s = session();
        let (out, err) = exec(&mut s, "@range i,1,0.5,3\n");
        assert_eq!(out, "i = 1 (1, 0.5, 3)\n");
        assert!(err.is_empty());
    }

    #[test]
    fn range_errors() {
        let mut s = session();
        let (out, err) = exec(
            &mut s,
            "@range i,0,-1,3\n@range 9,0,1,3\n@range i,0,1\n@range  i,0,1,3\n",
        );
        assert!(out.is_empty());
        assert_eq!(error_count(&err), 4);
    }

    #[test]
    fn promotion_moves_name_between_listings() {
        let mut s = session();
        let (out, _) = exec(&mut s, "a = 1\nb = 2\n@range a,0,1,5\n@print\n");
        assert_eq!(
            out,
            "a = 1\n\
             b = 2\n\
             a = 0 (0, 1, 5)\n\
             Variables:\n\
             b = 2\n\
             Loop variables:\n\
             a = 0 (0, 1, 5)\n"
        );
    }

    #[test]
    fn promoting_only_variable_reports_none_left() {
        let mut s = session();
        let (out, _) = exec(&mut s, "a = 1\n@range a,0,1,5\n@print\n");
        assert!(out.contains("No variables were defined.\n"));
        assert_eq!(s.store().tombstoned_count(), 1);
    }

    #[test]
    fn redeclaring_loop_in_place() {
        let mut s = session();
        let (out, err) = exec(&mut s, "@range a,0,1,5\n@range a,10,-2,0\n@range a,0,-1,5\n@print\n");
        assert_eq!(error_count(&err), 1);
        assert!(out.ends_with("Loop variables:\na = 10 (10, -2, 0)\n"));
        assert_eq!(s.store().loop_count(), 1);
    }

    #[test]
    fn loop_assignment_counts_up() {
        let mut s = session();
        let (out, err) = exec(&mut s, "@range a,0,1,3\n@loop a x = x + 1\nx\n");
        assert_eq!(
            out,
            "a = 0 (0, 1, 3)\n\
             x = 1 when a = 0\n\
             x = 2 when a = 1\n\
             x = 3 when a = 2\n\
             x = 4 when a = 3\n\
             Result = 4\n"
        );
        assert!(err.is_empty());
    }

    #[test]
    fn loop_over_unknown_name() {
        let mut s = session();
        let (out, err) = exec(&mut s, "x = 1\n@loop x x\n@loop q 1\n");
        assert_eq!(out, "x = 1\n");
        assert_eq!(error_count(&err), 2);
    }

    #[test]
    fn one_error_per_failed_loop() {
        let mut s = session();
        let (_, err) = exec(&mut s, "@range a,0,1,9\n@loop a a + nope\n");
        assert_eq!(error_count(&err), 1);
    }

    #[test]
    fn too_many_equals() {
        let mut s = session();
        let (out, err) = exec(&mut s, "a = b = 1\n");
        assert!(out.is_empty());
        assert_eq!(error_count(&err), 1);
    }

    #[test]
    fn bare_expression_errors_continue() {
        let mut s = session();
        let (out, err) = exec(&mut s, "1 +\n2 * 3\n");
        assert_eq!(out, "Result = 6\n");
        assert_eq!(error_count(&err), 1);
    }

    #[test]
    fn sig_figs_apply_to_every_path() {
        let mut s = with_sig(5);
        let (out, _) = exec(
            &mut s,
            "t = 1/3\n1/3\n@range a,0,1,0\n@loop a 1/3\n@loop a u = 1/3\n@print\n",
        );
        let expected = "0.33333";
        assert!(out.contains(&format!("t = {expected}\n")));
        assert!(out.contains(&format!("Result = {expected}\n")));
        assert!(out.contains(&format!("Result = {expected} when a = 0\n")));
        assert!(out.contains(&format!("u = {expected} when a = 0\n")));
        assert!(out.ends_with(&format!(
            "Variables:\nt = {expected}\nu = {expected}\nLoop variables:\na = 0 (0, 1, 0)\n"
        )));
    }

    #[test]
    fn oversized_expressions_fail_alone() {
        let mut s = session();
        let long = vec!["1"; 300_000].join("+");
        let deep = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        let (out, err) = exec(&mut s, &format!("{long}\nx = {deep}\n2+2\n"));
        assert_eq!(out, "Result = 4\n");
        assert_eq!(error_count(&err), 2);
        assert_eq!(s.store().live_variable_count(), 0);
    }

    #[test]
    fn undecodable_line_fails_alone() {
        let mut s = session();
        s.run(&b"1+1\n\xff\xfe\n2+2\r\n3+3"[..]).unwrap();
        assert_eq!(
            String::from_utf8_lossy(s.stdout()),
            "Result = 2\nResult = 4\nResult = 6\n"
        );
        assert_eq!(error_count(&String::from_utf8_lossy(s.stderr())), 1);
    }

    #[test]
    fn welcome_and_farewell() {
        let mut store = Store::new();
        store.define_variable("x", 1.5).unwrap();
        let mut s = Session::new(store, SigFigs::DEFAULT, Vec::new(), Vec::new());
        s.welcome(true).unwrap();
        s.farewell().unwrap();
        assert_eq!(
            String::from_utf8_lossy(s.stdout()),
            "Welcome to uqexpr!\n\
             Variables:\n\
             x = 1.5\n\
             No loop variables were defined.\n\
             Please enter your expressions and assignment operations.\n\
             Thank you for using uqexpr.\n"
        );
    }

    #[test]
    fn welcome_for_file_input_has_no_prompt() {
        let mut s = session();
        s.welcome(false).unwrap();
        assert!(!String::from_utf8_lossy(s.stdout()).contains("Please enter"));
    }
}
