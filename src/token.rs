use std::{fmt, ops::Range};

use crate::lexer;

#[derive(Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Token {
    pub kind: TokenKind,
    lo: usize,
    len: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Token {
        Token {
            kind,
            len: span.len,
            lo: span.lo,
        }
    }

    pub fn span(&self) -> Span {
        Span {
            len: self.len,
            lo: self.lo,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    pub fn is_number(&self) -> bool {
        matches!(self.kind, TokenKind::Number(_))
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {})", self.kind, self.span())
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub len: u32,
    pub lo: usize,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>) -> Span {
        debug_assert!(hi >= lo);
        // Expressions are a single line; anything past `u32::MAX` is clamped.
        let len = u32::try_from(hi - lo).unwrap_or(u32::MAX);
        Self::new_of_length(lo, len)
    }

    pub fn new_of_length(lo: usize, len: u32) -> Span {
        Span { len, lo }
    }

    pub fn hi(&self) -> usize {
        self.lo + self.len as usize
    }

    /// Returns the slice of `src` covered by this span.
    pub fn substr<'src>(&self, src: &'src str) -> &'src str {
        &src[self.lo..self.hi()]
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { span: self, inner }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, len: {})", self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.lo;
        let hi = self.hi();
        write!(f, "{lo}..{hi}")
    }
}

/// A value tagged with the source range it was produced from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub inner: T,
}

/// The alternate form (`{:#}`) prefixes the message with its span.
impl<T: fmt::Display> fmt::Display for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Spanned { span, inner } = self;
        if f.alternate() {
            write!(f, "{span}: ")?;
        }
        write!(f, "{inner}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// A decimal literal, kept as the exact source text (sign included).
    Number(Box<str>),

    Plus,
    Minus,
    Star,
    Slash,
    /// `%`
    Percent,
    /// `^`
    Caret,

    Abs,
    Cos,
    Sin,
    Sqrt,
    Tan,
    Dup,
    Swap,
    /// `!`
    Factorial,

    /// Euler's number. Rewritten into a [`TokenKind::Number`] before lowering.
    E,
    /// Rewritten into a [`TokenKind::Number`] before lowering.
    Pi,

    Eof,
    Error(lexer::Error),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;
        let s: &str = match self {
            Number(literal) => literal,
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            Caret => "^",
            Abs => "abs",
            Cos => "cos",
            Sin => "sin",
            Sqrt => "sqrt",
            Tan => "tan",
            Dup => "dup",
            Swap => "swap",
            Factorial => "!",
            E => "e",
            Pi => "pi",
            Eof => "end of input",
            Error(error) => return write!(f, "{error}"),
        };
        f.write_str(s)
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "abs" => TokenKind::Abs,
    "cos" => TokenKind::Cos,
    "dup" => TokenKind::Dup,
    "e" => TokenKind::E,
    "pi" => TokenKind::Pi,
    "sin" => TokenKind::Sin,
    "sqrt" => TokenKind::Sqrt,
    "swap" => TokenKind::Swap,
    "tan" => TokenKind::Tan,
    "!" => TokenKind::Factorial,
};

/// Maps an identifier to its reserved token kind.
///
/// Anything outside of [`KEYWORDS`] is a classification failure, reported as
/// an error token carrying the offending text.
pub fn classify(identifier: &str) -> TokenKind {
    match KEYWORDS.get(identifier) {
        Some(kind) => kind.clone(),
        None => TokenKind::Error(lexer::Error::UnknownToken(identifier.into())),
    }
}
