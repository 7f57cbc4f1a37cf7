//! Arithmetic expression lexer, parser, and evaluator.
//!
//! The language is the small floating-point grammar of the classic `tinyexpr`
//! library: numbers, names resolved through a [`BindingTable`], the built-in
//! constants and functions listed below, and these operators.
//!
//! Operator precedence (lowest → highest):
//!   comma  →  additive  →  multiplicative (`* / %`)  →  power (`^`, left
//!   associative)  →  unary sign  →  primary
//!
//! Unary sign binds tighter than `^`, so `-2^2` is `4`.
//!
//! Compilation resolves every name up front.  An unknown name, an empty
//! input, anything left over after a complete expression, or an expression
//! deeper than [`MAX_NESTING`] or larger than [`MAX_NODES`] is a
//! [`SyntaxError`].  Evaluation itself cannot fail; IEEE rules apply, so
//! `1/0` is `inf`.

use std::fmt;

use crate::bindings::BindingTable;

/// Deepest allowed nesting of parentheses and function arguments.
pub const MAX_NESTING: usize = 64;

/// Most operator and call nodes one expression may contain.  Parsing,
/// evaluation and drop all recurse on the tree, so its size is bounded.
pub const MAX_NODES: usize = 1024;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Compilation failure, carrying the byte offset where parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub position: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expression error at offset {}", self.position)
    }
}

impl std::error::Error for SyntaxError {}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Comma,
    LParen,
    RParen,
    /// Unrecognised input byte.
    Unknown,
    End,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn skip_digits(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        self.pos - start
    }

    /// `digits [. digits] [e [+-] digits]`, where at least one mantissa digit
    /// is required on either side of the point, or a hexadecimal literal.
    fn read_number(&mut self, start: usize) -> Token {
        if let Some((value, len)) = scan_hex(&self.src[start..]) {
            self.pos += len;
            return Token::Number(value);
        }
        let mut digits = self.skip_digits();
        if self.peek() == Some(b'.') {
            self.pos += 1;
            digits += self.skip_digits();
        }
        if digits == 0 {
            return Token::Unknown;
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some(b'+' | b'-')));
            if matches!(self.peek_at(1 + sign), Some(b'0'..=b'9')) {
                self.pos += 1 + sign;
                self.skip_digits();
            }
        }
        // The scanned text is always a well-formed float literal.
        std::str::from_utf8(&self.src[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(Token::Unknown, Token::Number)
    }

    fn read_ident(&mut self, start: usize) -> Token {
        while matches!(
            self.peek(),
            Some(b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_')
        ) {
            self.pos += 1;
        }
        Token::Ident(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    fn next_token(&mut self) -> (usize, Token) {
        self.skip_ws();
        let start = self.pos;
        let Some(ch) = self.peek() else {
            return (start, Token::End);
        };
        let tok = match ch {
            b'0'..=b'9' | b'.' => return (start, self.read_number(start)),
            b'a'..=b'z' | b'A'..=b'Z' => return (start, self.read_ident(start)),
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'%' => Token::Percent,
            b'^' => Token::Caret,
            b',' => Token::Comma,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            _ => Token::Unknown,
        };
        self.pos += 1;
        (start, tok)
    }

    fn tokenize(mut self) -> Vec<(usize, Token)> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token();
            let done = matches!(t.1, Token::End | Token::Unknown);
            tokens.push(t);
            if done {
                break;
            }
        }
        tokens
    }
}

/// Scan a C hexadecimal floating literal, `0x` hexdigits `[. hexdigits]`
/// `[p [+-] digits]`, from the start of `src`.  Returns the value and the
/// number of bytes consumed, or `None` if `src` does not start with one.
pub fn scan_hex(src: &[u8]) -> Option<(f64, usize)> {
    let hex = |b: u8| char::from(b).to_digit(16);
    if !matches!(src, [b'0', b'x' | b'X', ..]) {
        return None;
    }
    let mut pos = 2;
    let mut value = 0.0f64;
    let mut digits = 0;
    while let Some(d) = src.get(pos).and_then(|&b| hex(b)) {
        value = value * 16.0 + f64::from(d);
        pos += 1;
        digits += 1;
    }
    if src.get(pos) == Some(&b'.') {
        let mut scale = 1.0 / 16.0;
        let mut frac = pos + 1;
        while let Some(d) = src.get(frac).and_then(|&b| hex(b)) {
            value += f64::from(d) * scale;
            scale /= 16.0;
            frac += 1;
            digits += 1;
        }
        if digits > 0 {
            pos = frac;
        }
    }
    if digits == 0 {
        return None;
    }
    if matches!(src.get(pos), Some(b'p' | b'P')) {
        let sign = usize::from(matches!(src.get(pos + 1), Some(b'+' | b'-')));
        let exp_start = pos + 1 + sign;
        let exp_len = src[exp_start.min(src.len())..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if exp_len > 0 {
            let exp: i32 = std::str::from_utf8(&src[exp_start..exp_start + exp_len])
                .ok()?
                .parse()
                .unwrap_or(i32::MAX);
            let exp = if src[pos + 1] == b'-' { -exp } else { exp };
            value *= 2f64.powi(exp);
            pos = exp_start + exp_len;
        }
    }
    Some((value, pos))
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

#[derive(Debug, Clone)]
enum Node {
    Number(f64),
    /// Index into the compiled value slots.
    Var(usize),
    Neg(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Call1(fn(f64) -> f64, Box<Node>),
    Call2(fn(f64, f64) -> f64, Box<Node>, Box<Node>),
    Sequence(Vec<Node>),
}

// ── Built-ins ─────────────────────────────────────────────────────────────────

enum Builtin {
    Constant(f64),
    Unary(fn(f64) -> f64),
    Binary(fn(f64, f64) -> f64),
}

fn builtin(name: &str) -> Option<Builtin> {
    use Builtin::{Binary, Constant, Unary};
    Some(match name {
        "pi" => Constant(std::f64::consts::PI),
        "e" => Constant(std::f64::consts::E),
        "abs" => Unary(f64::abs),
        "acos" => Unary(f64::acos),
        "asin" => Unary(f64::asin),
        "atan" => Unary(f64::atan),
        "ceil" => Unary(f64::ceil),
        "cos" => Unary(f64::cos),
        "cosh" => Unary(f64::cosh),
        "exp" => Unary(f64::exp),
        "fac" => Unary(factorial),
        "floor" => Unary(f64::floor),
        "ln" => Unary(f64::ln),
        "log" | "log10" => Unary(f64::log10),
        "sin" => Unary(f64::sin),
        "sinh" => Unary(f64::sinh),
        "sqrt" => Unary(f64::sqrt),
        "tan" => Unary(f64::tan),
        "tanh" => Unary(f64::tanh),
        "atan2" => Binary(f64::atan2),
        "ncr" => Binary(combinations),
        "npr" => Binary(permutations),
        "pow" => Binary(f64::powf),
        _ => return None,
    })
}

fn factorial(a: f64) -> f64 {
    if a < 0.0 {
        return f64::NAN;
    }
    if a > f64::from(u32::MAX) {
        return f64::INFINITY;
    }
    let n = a as u64;
    let mut result: u64 = 1;
    for i in 2..=n {
        match result.checked_mul(i) {
            Some(r) => result = r,
            None => return f64::INFINITY,
        }
    }
    result as f64
}

fn combinations(n: f64, r: f64) -> f64 {
    if n < 0.0 || r < 0.0 || n < r {
        return f64::NAN;
    }
    if n > f64::from(u32::MAX) || r > f64::from(u32::MAX) {
        return f64::INFINITY;
    }
    let (n, mut r) = (n as u64, r as u64);
    if r > n / 2 {
        r = n - r;
    }
    let mut result: u64 = 1;
    for i in 1..=r {
        match result.checked_mul(n - r + i) {
            Some(v) => result = v / i,
            None => return f64::INFINITY,
        }
    }
    result as f64
}

fn permutations(n: f64, r: f64) -> f64 {
    combinations(n, r) * factorial(r)
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser<'b> {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    bindings: &'b BindingTable,
    depth: usize,
    nodes: usize,
}

impl<'b> Parser<'b> {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::End, |(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |(p, _)| *p)
    }

    fn error(&self) -> SyntaxError {
        SyntaxError {
            position: self.offset(),
        }
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        self.pos += 1;
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), SyntaxError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    /// Count one interior node against [`MAX_NODES`].
    fn grow(&mut self) -> Result<(), SyntaxError> {
        self.nodes += 1;
        if self.nodes > MAX_NODES {
            return Err(self.error());
        }
        Ok(())
    }

    /// Run `f` one nesting level deeper, failing past [`MAX_NESTING`].
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error());
        }
        self.depth += 1;
        let r = f(self);
        self.depth -= 1;
        r
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    fn parse_list(&mut self) -> Result<Node, SyntaxError> {
        let first = self.parse_additive()?;
        if self.peek() != &Token::Comma {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            self.grow()?;
            items.push(self.parse_additive()?);
        }
        Ok(Node::Sequence(items))
    }

    fn parse_additive(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.grow()?;
            let rhs = self.parse_multiplicative()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_power()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            self.grow()?;
            let rhs = self.parse_power()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_power(&mut self) -> Result<Node, SyntaxError> {
        let mut lhs = self.parse_signed()?;
        while self.eat(&Token::Caret) {
            self.grow()?;
            let rhs = self.parse_signed()?;
            lhs = Node::Binary(BinOp::Pow, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_signed(&mut self) -> Result<Node, SyntaxError> {
        let mut negate = false;
        loop {
            match self.peek() {
                Token::Minus => negate = !negate,
                Token::Plus => {}
                _ => break,
            }
            self.pos += 1;
        }
        if negate {
            self.grow()?;
        }
        let base = self.parse_primary()?;
        Ok(if negate { Node::Neg(Box::new(base)) } else { base })
    }

    fn parse_primary(&mut self) -> Result<Node, SyntaxError> {
        let at = self.pos;
        match self.advance() {
            Token::Number(x) => Ok(Node::Number(x)),
            Token::LParen => {
                let inner = self.nested(Self::parse_list)?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => self.parse_name(&name, at),
            _ => {
                self.pos = at;
                Err(self.error())
            }
        }
    }

    fn parse_name(&mut self, name: &str, at: usize) -> Result<Node, SyntaxError> {
        // Bound names shadow built-ins.
        if let Some(slot) = self.bindings.index_of(name) {
            return Ok(Node::Var(slot));
        }
        match builtin(name) {
            Some(Builtin::Constant(x)) => {
                if self.eat(&Token::LParen) {
                    self.expect(&Token::RParen)?;
                }
                Ok(Node::Number(x))
            }
            Some(Builtin::Unary(f)) => {
                self.grow()?;
                let arg = self.nested(Self::parse_signed)?;
                Ok(Node::Call1(f, Box::new(arg)))
            }
            Some(Builtin::Binary(f)) => {
                self.grow()?;
                self.expect(&Token::LParen)?;
                let (a, b) = self.nested(|p| {
                    let a = p.parse_additive()?;
                    p.expect(&Token::Comma)?;
                    Ok((a, p.parse_additive()?))
                })?;
                self.expect(&Token::RParen)?;
                Ok(Node::Call2(f, Box::new(a), Box::new(b)))
            }
            None => {
                self.pos = at;
                Err(self.error())
            }
        }
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// An expression compiled against one binding snapshot.
#[derive(Debug, Clone)]
pub struct Compiled {
    root: Node,
    slots: Vec<f64>,
}

impl Compiled {
    /// Evaluate the expression with the values captured at compile time.
    pub fn eval(&self) -> f64 {
        eval_node(&self.root, &self.slots)
    }
}

fn eval_node(node: &Node, slots: &[f64]) -> f64 {
    match node {
        Node::Number(x) => *x,
        Node::Var(i) => slots[*i],
        Node::Neg(inner) => -eval_node(inner, slots),
        Node::Binary(op, lhs, rhs) => {
            let l = eval_node(lhs, slots);
            let r = eval_node(rhs, slots);
            match op {
                BinOp::Add => l + r,
                BinOp::Sub => l - r,
                BinOp::Mul => l * r,
                BinOp::Div => l / r,
                BinOp::Rem => l % r,
                BinOp::Pow => l.powf(r),
            }
        }
        Node::Call1(f, arg) => f(eval_node(arg, slots)),
        Node::Call2(f, a, b) => f(eval_node(a, slots), eval_node(b, slots)),
        Node::Sequence(items) => items
            .iter()
            .map(|n| eval_node(n, slots))
            .last()
            .unwrap_or(f64::NAN),
    }
}

/// Compile `src` against `bindings`.
pub fn compile(src: &str, bindings: &BindingTable) -> Result<Compiled, SyntaxError> {
    let mut parser = Parser {
        tokens: Lexer::new(src).tokenize(),
        pos: 0,
        bindings,
        depth: 0,
        nodes: 0,
    };
    let root = parser.parse_list()?;
    if parser.peek() != &Token::End {
        return Err(parser.error());
    }
    Ok(Compiled {
        root,
        slots: bindings.as_slice().iter().map(|b| b.value).collect(),
    })
}

/// Convenience: compile and evaluate in one step.
pub fn eval_str(src: &str, bindings: &BindingTable) -> Result<f64, SyntaxError> {
    compile(src, bindings).map(|c| c.eval())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
