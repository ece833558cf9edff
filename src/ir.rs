//! The intermediate representation standing between tokens and assembly.

mod pool;

pub use pool::{Constant, ConstantPool};

/// A single operation on the run-time evaluation stack.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Pushes the pooled literal onto the stack.
    Push(Constant),
    Plus,
    Minus,
    Multiply,
    Divide,
    /// Integer remainder of the truncated operands.
    Modulus,
    /// Integer power of the truncated operands, by repeated multiplication.
    Power,
    Abs,
    Sin,
    Cos,
    Tan,
    Sqrt,
    /// Duplicates the topmost value.
    Dup,
    /// Swaps the two topmost values.
    Swap,
    Factorial,
}

impl Instruction {
    /// The minimum stack depth required to execute this instruction.
    pub const fn arity(self) -> u8 {
        use Instruction::*;
        match self {
            Push(_) => 0,
            Abs | Sin | Cos | Tan | Sqrt | Dup | Factorial => 1,
            Plus | Minus | Multiply | Divide | Modulus | Power | Swap => 2,
        }
    }

    /// The net change of the stack depth after this instruction completes.
    pub const fn depth_delta(self) -> i8 {
        use Instruction::*;
        match self {
            Push(_) | Dup => 1,
            Abs | Sin | Cos | Tan | Sqrt | Swap | Factorial => 0,
            Plus | Minus | Multiply | Divide | Modulus | Power => -1,
        }
    }

    pub const fn name(self) -> &'static str {
        use Instruction::*;
        match self {
            Push(_) => "PUSH",
            Plus => "PLUS",
            Minus => "MINUS",
            Multiply => "MULTIPLY",
            Divide => "DIVIDE",
            Modulus => "MODULUS",
            Power => "POWER",
            Abs => "ABS",
            Sin => "SIN",
            Cos => "COS",
            Tan => "TAN",
            Sqrt => "SQRT",
            Dup => "DUP",
            Swap => "SWAP",
            Factorial => "FACTORIAL",
        }
    }
}

/// A lowered program: the instructions in source order, plus the literals
/// they push.
///
/// The position of an instruction in `instructions` is stable and is used by
/// the code generator to derive unique labels.
#[derive(Debug, Default)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub constants: ConstantPool,
}

impl Program {
    pub fn literal(&self, constant: Constant) -> &str {
        self.constants.get(constant)
    }
}
