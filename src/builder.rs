use std::{
    f64::consts::{E, PI},
    fmt,
};

use tracing::debug;

use crate::{
    ir::{ConstantPool, Instruction, Program},
    lexer::{self, Lexer},
    token::{Span, Spanned, Token, TokenKind},
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    EmptyProgram,
    Lexer(lexer::Error),
    ExpectedNumber(TokenKind),
    TrailingNumber,
    /// A literal that doesn't fit in a double.
    NumberOutOfRange(Box<str>),
    UnexpectedToken(TokenKind),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyProgram => write!(f, "the input expression was empty"),
            Error::Lexer(error) => write!(f, "{error}"),
            Error::ExpectedNumber(actual) => {
                write!(f, "expected the program to begin with a number, but got `{actual}`")
            }
            Error::TrailingNumber => write!(f, "program ends with a number, which is invalid"),
            Error::NumberOutOfRange(literal) => {
                write!(f, "number `{literal}` is out of range")
            }
            Error::UnexpectedToken(actual) => write!(f, "unexpected token `{actual}`"),
        }
    }
}

impl std::error::Error for Spanned<Error> {}

/// Lexes, validates and lowers the expression in one go.
pub fn build(src: &str) -> Result<Program> {
    let tokens = tokenize(src)?;
    lower(tokens)
}

/// Drains the lexer into an owned token list and checks the program shape.
///
/// `e` and `pi` are rewritten into number tokens here, before any other check,
/// so they behave as if the user had typed the literal.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::with_capacity(src.len() / 2 + 1);
    for token in Lexer::new(src).take_while(|token| !token.is_eof()) {
        let span = token.span();
        let kind = match token.kind {
            TokenKind::Error(error) => return Err(span.wrap(Error::Lexer(error))),
            TokenKind::E => number(E),
            TokenKind::Pi => number(PI),
            kind => kind,
        };
        tokens.push(Token::new(kind, span));
    }
    debug!(tokens = tokens.len(), "lexed expression");

    let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
        let whole = Span::new_of_bounds(0..src.len());
        return Err(whole.wrap(Error::EmptyProgram));
    };
    if !first.is_number() {
        return Err(first.span().wrap(Error::ExpectedNumber(first.kind.clone())));
    }
    // A single number is a complete program; anywhere else, a trailing push
    // is never consumed.
    if tokens.len() > 1 && last.is_number() {
        return Err(last.span().wrap(Error::TrailingNumber));
    }

    Ok(tokens)
}

/// Maps each token onto its instruction, pooling the pushed literals.
pub fn lower(tokens: Vec<Token>) -> Result<Program> {
    let mut constants = ConstantPool::with_capacity(tokens.len());
    let mut instructions = Vec::with_capacity(tokens.len());

    for token in tokens {
        let span = token.span();
        let instruction = match token.kind {
            TokenKind::Number(literal) => {
                // The assembler rejects `.double` values that overflow.
                if !literal.parse::<f64>().is_ok_and(f64::is_finite) {
                    return Err(span.wrap(Error::NumberOutOfRange(literal)));
                }
                Instruction::Push(constants.intern(&literal))
            }
            TokenKind::Plus => Instruction::Plus,
            TokenKind::Minus => Instruction::Minus,
            TokenKind::Star => Instruction::Multiply,
            TokenKind::Slash => Instruction::Divide,
            TokenKind::Percent => Instruction::Modulus,
            TokenKind::Caret => Instruction::Power,
            TokenKind::Abs => Instruction::Abs,
            TokenKind::Cos => Instruction::Cos,
            TokenKind::Sin => Instruction::Sin,
            TokenKind::Sqrt => Instruction::Sqrt,
            TokenKind::Tan => Instruction::Tan,
            TokenKind::Dup => Instruction::Dup,
            TokenKind::Swap => Instruction::Swap,
            TokenKind::Factorial => Instruction::Factorial,
            // Already rewritten or rejected by `tokenize`.
            kind @ (TokenKind::E | TokenKind::Pi | TokenKind::Eof | TokenKind::Error(_)) => {
                return Err(span.wrap(Error::UnexpectedToken(kind)));
            }
        };
        instructions.push(instruction);
    }
    debug!(
        instructions = instructions.len(),
        constants = constants.len(),
        "built instructions"
    );

    Ok(Program {
        instructions,
        constants,
    })
}

fn number(value: f64) -> TokenKind {
    TokenKind::Number(value.to_string().into_boxed_str())
}
