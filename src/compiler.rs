use tracing::debug;

use crate::{
    builder,
    codegen::{self, Target},
    token::Spanned,
};

/// A compile-time failure, spanned over the offending part of the expression.
pub type CompileError = Spanned<builder::Error>;

/// Compiles a single RPN expression into an assembly program.
///
/// ```
/// use rpnc::compiler::Compiler;
///
/// let asm = Compiler::new("3 4 +").compile().unwrap();
/// assert!(asm.contains("main:"));
///
/// assert!(Compiler::new("3 5 $").compile().is_err());
/// ```
#[derive(Clone, Debug)]
pub struct Compiler {
    expression: String,
    debug: bool,
    target: Target,
}

impl Compiler {
    pub fn new(expression: impl Into<String>) -> Compiler {
        Compiler {
            expression: expression.into(),
            debug: false,
            target: Target::HOST,
        }
    }

    /// Inserts a breakpoint after the entry sequence of the generated program.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn set_target(&mut self, target: Target) {
        self.target = target;
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Runs the whole pipeline. Nothing is kept between calls, so compiling
    /// the same expression twice yields the same text.
    pub fn compile(&self) -> Result<String, CompileError> {
        debug!(
            expression = %self.expression,
            target = %self.target,
            debug = self.debug,
            "compiling"
        );
        let program = builder::build(&self.expression)?;
        Ok(codegen::generate(self.target, &program, self.debug))
    }
}
