//! Significant-figure number formatting.
//!
//! Every printed scalar goes through [`format_sig`], which renders the same
//! text as C's `printf("%.<N>g", value)`.

// ── SigFigs ───────────────────────────────────────────────────────────────────

/// Number of significant figures used for output, always within `2..=8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigFigs(u8);

impl SigFigs {
    pub const MIN: u8 = 2;
    pub const MAX: u8 = 8;
    pub const DEFAULT: SigFigs = SigFigs(3);

    /// Returns `None` if `n` is outside `2..=8`.
    pub fn new(n: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&n).then_some(SigFigs(n))
    }

    pub fn get(self) -> usize {
        usize::from(self.0)
    }
}

impl Default for SigFigs {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ── Formatting ────────────────────────────────────────────────────────────────

/// Format `value` with `sig` significant figures, `%g` style.
///
/// Fixed notation is used when the decimal exponent of the rounded value lies
/// in `-4..sig`, scientific otherwise.  Trailing zeros and a bare trailing
/// point are removed.  Exponents carry a sign and at least two digits.
pub fn format_sig(value: f64, sig: SigFigs) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_owned();
    }

    let precision = sig.get();
    // Rounding to `precision` digits first settles the exponent, so that
    // e.g. 9.9996 at 3 digits is treated as 10.0 rather than 9.99.
    let sci = format!("{:.*e}", precision - 1, value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= precision as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", strip_zeros(mantissa), exp.unsigned_abs())
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        strip_zeros(&format!("{value:.decimals$}")).to_owned()
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
