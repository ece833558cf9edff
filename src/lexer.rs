use std::{fmt, iter::Peekable};

use crate::token::{self, Span, Token, TokenKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// An identifier-like run of characters which isn't a known keyword.
    UnknownToken(Box<str>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownToken(text) => write!(f, "unknown token `{text}`"),
        }
    }
}

/// The RPN lexer.
///
/// Tokens are produced on demand by [`Lexer::next_token`]. Once the input is
/// exhausted, every subsequent call returns an [`TokenKind::Eof`] token, which
/// also makes the lexer an infinite [`Iterator`].
pub struct Lexer<'src> {
    src: &'src str,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    current_lo: usize,
}

impl<'src> Lexer<'src> {
    /// Constructs a new lexer with the default state.
    pub fn new(src: &'src str) -> Lexer<'src> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
        }
    }

    /// Scans the next token, skipping any leading whitespace.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let kind = self.scan_token_kind();
        Token::new(kind, self.span())
    }

    /// Tries to scan the current character.
    fn scan_token_kind(&mut self) -> TokenKind {
        use TokenKind::*;
        if self.is_exhausted() {
            self.current_lo = self.cursor;
            return Eof;
        }
        match self.mark_advance() {
            '+' => Plus,
            '*' => Star,
            '/' => Slash,
            '%' => Percent,
            '^' => Caret,
            // `-3` is a single literal, while `3 - 4` has a binary minus.
            '-' if self.peek().is_ascii_digit() => self.number(),
            '-' => Minus,
            c if c.is_ascii_digit() => self.number(),
            _ => self.identifier_or_keyword(),
        }
    }

    /// Scans the integer part and, if a period followed by at least one digit
    /// comes next, the fractional part. The token keeps the exact source text.
    fn number(&mut self) -> TokenKind {
        self.digits();
        if self.peek() == '.' && self.peek_second().is_ascii_digit() {
            self.advance();
            self.digits();
        }
        TokenKind::Number(self.substr().into())
    }

    fn digits(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        // A NUL character is ordinary text here, never an end of input.
        while self
            .iter
            .peek()
            .is_some_and(|&c| !c.is_ascii_digit() && !is_whitespace(c))
        {
            self.advance();
        }
        token::classify(self.substr())
    }

    fn skip_whitespace(&mut self) {
        while is_whitespace(self.peek()) {
            self.advance();
        }
    }
}

impl Lexer<'_> {
    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> char {
        self.current_lo = self.cursor;
        self.advance()
    }

    /// Returns the next character and advances the iterator.
    fn advance(&mut self) -> char {
        self.iter
            .next()
            .inspect(|c| self.cursor += c.len_utf8())
            .unwrap_or('\0')
    }

    /// Whether every character of the source has been consumed.
    fn is_exhausted(&mut self) -> bool {
        self.iter.peek().is_none()
    }

    /// Returns the next character without advancing the iterator.
    fn peek(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    /// Returns the character after the next one without advancing.
    fn peek_second(&self) -> char {
        self.src[self.cursor..].chars().nth(1).unwrap_or('\0')
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &'_ str {
        self.span().substr(self.src)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        Some(self.next_token())
    }
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lex(src: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(src);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break tokens;
            }
        }
    }

    fn num(literal: &str) -> TokenKind {
        TokenKind::Number(literal.into())
    }

    fn unknown(text: &str) -> TokenKind {
        TokenKind::Error(Error::UnknownToken(text.into()))
    }

    #[test]
    fn tests_with_span() {
        use TokenKind::*;
        let cases = cases!(match .. {
            "+-*/%^" => [
                (Plus, 0..1),
                (Minus, 1..2),
                (Star, 2..3),
                (Slash, 3..4),
                (Percent, 4..5),
                (Caret, 5..6),
                (Eof, 6..6),
            ],
            "3 43 -17 -3" => [
                (num("3"), 0..1),
                (num("43"), 2..4),
                (num("-17"), 5..8),
                (num("-3"), 9..11),
                (Eof, 11..11),
            ],
            "3.14 -0.5 007 10.25" => [
                (num("3.14"), 0..4),
                (num("-0.5"), 5..9),
                (num("007"), 10..13),
                (num("10.25"), 14..19),
                (Eof, 19..19),
            ],
            "3 - 4 -" => [
                (num("3"), 0..1),
                (Minus, 2..3),
                (num("4"), 4..5),
                (Minus, 6..7),
                (Eof, 7..7),
            ],
            "3 4-" => [
                (num("3"), 0..1),
                (num("4"), 2..3),
                (Minus, 3..4),
                (Eof, 4..4),
            ],
            "abs cos sin sqrt tan dup swap e pi !" => [
                (Abs, 0..3),
                (Cos, 4..7),
                (Sin, 8..11),
                (Sqrt, 12..16),
                (Tan, 17..20),
                (Dup, 21..24),
                (Swap, 25..29),
                (E, 30..31),
                (Pi, 32..34),
                (Factorial, 35..36),
                (Eof, 36..36),
            ],
            "\t 2\r\n sqrt \n" => [
                (num("2"), 2..3),
                (Sqrt, 6..10),
                (Eof, 12..12),
            ],
            "3 5 $" => [
                (num("3"), 0..1),
                (num("5"), 2..3),
                (unknown("$"), 4..5),
                (Eof, 5..5),
            ],
            "5!" => [
                (num("5"), 0..1),
                (Factorial, 1..2),
                (Eof, 2..2),
            ],
            "sin+ SIN" => [
                (unknown("sin+"), 0..4),
                (unknown("SIN"), 5..8),
                (Eof, 8..8),
            ],
            "3. 1.x" => [
                (num("3"), 0..1),
                (unknown("."), 1..2),
                (num("1"), 3..4),
                (unknown(".x"), 4..6),
                (Eof, 6..6),
            ],
            "3 5 +\0$" => [
                (num("3"), 0..1),
                (num("5"), 2..3),
                (Plus, 4..5),
                (unknown("\0$"), 5..7),
                (Eof, 7..7),
            ],
            "3\0sqrt 4" => [
                (num("3"), 0..1),
                (unknown("\0sqrt"), 1..6),
                (num("4"), 7..8),
                (Eof, 8..8),
            ],
            "" => [(Eof, 0..0)],
            "   " => [(Eof, 3..3)],
        });

        for (input, tokens) in cases {
            let lexed = lex(input);
            assert_eq!(lexed, tokens.as_slice(), "lexing {input:?}");
        }
    }

    #[test]
    fn test_eof_is_sticky() {
        let mut lexer = Lexer::new("1");
        assert_eq!(lexer.next_token().kind, num("1"));
        for _ in 0..3 {
            assert!(lexer.next_token().is_eof());
        }
    }

    #[test]
    fn test_iterator_walks_input_once() {
        let kinds: Vec<_> = Lexer::new("2 8 ^")
            .take_while(|token| !token.is_eof())
            .map(|token| token.kind)
            .collect();
        assert_eq!(kinds, [num("2"), num("8"), TokenKind::Caret]);
    }

    macro_rules! cases {
        (match .. {
            $($str:expr => [$(($kind:expr, $range:expr)),* $(,)?]),* $(,)?
        }) => {{
            &[$((
                $str,
                vec![
                    $(Token::new($kind, Span::new_of_bounds($range.start..$range.end))),*
                ],
            )),*]
        }};
    }
    use cases;
}
