/// The lexer takes the expression, mapping it into a sequence of tokens.
pub mod lexer;

/// The builder validates the token sequence and lowers it into instructions.
pub mod builder;

/// The code generator turns instructions into an x86-64 assembly program.
pub mod codegen;

pub mod compiler;
pub mod ir;
pub mod token;

pub use compiler::{CompileError, Compiler};

pub mod util {
    #[cfg(test)]
    pub(crate) mod test_utils;
}
