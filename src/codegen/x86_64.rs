use std::{
    fmt::{self, Write},
    format_args as f,
    marker::PhantomData,
};

use tracing::{debug, trace};

use crate::{
    codegen::x86_64_env,
    ir::{Instruction, Program},
};

const DEFAULT_CODE_CAPACITY: usize = 4 * 1024; // 4 KiB

/// The most values the evaluation stack may hold (2 MiB of machine stack).
/// Growing past it jumps to the too-many-entries handler instead of faulting.
pub const MAX_DEPTH: u32 = 1 << 18;

/// Emits x86-64 assembly (GNU assembler, Intel syntax without prefixes).
///
/// The evaluation stack is the machine stack. A `depth` cell tracks how many
/// values are on it, and every block checks it before popping, so that
/// malformed programs end in a diagnostic rather than a fault.
///
/// Blocks only clobber caller-saved registers (`rax`, `rcx`, `rdx`, `rsi`,
/// `xmm0`) and leave the x87 register stack empty.
pub struct Generator<'p, E> {
    program: &'p Program,
    code: String,
    debug: bool,
    indent: bool,
    _env: PhantomData<E>,
}

impl<'p, E> Generator<'p, E>
where
    E: x86_64_env::Env,
{
    pub fn new(program: &'p Program, debug: bool) -> Generator<'p, E> {
        Generator {
            program,
            code: String::with_capacity(DEFAULT_CODE_CAPACITY),
            debug,
            indent: false,
            _env: PhantomData,
        }
    }

    pub fn generate(mut self) -> String {
        let program = self.program;

        self.g_program_prologue();
        self.g_data();
        self.g_entry();
        for (id, instruction) in program.instructions.iter().enumerate() {
            self.g_instruction(id, *instruction);
        }
        self.g_result();
        self.g_handlers();

        debug!(bytes = self.code.len(), "generated assembly");
        self.code
    }
}

/// Program skeleton.
impl<E> Generator<'_, E>
where
    E: x86_64_env::Env,
{
    fn g_program_prologue(&mut self) {
        self.code.push_str(E::GLOBAL_PROLOGUE);
        self.out_line();
    }

    fn g_data(&mut self) {
        self.out(f!(".section {}", E::SECTION_DATA));
        self.out(".p2align 3");
        for cell in Cell::ALL {
            self.out(f!("{}: {}", cell.symbol(), cell.initializer()));
        }
        for message in Message::ALL {
            self.out(f!("{message}: .asciz \"{}\"", message.text()));
        }
        let program = self.program;
        for literal in program.constants.iter() {
            self.out(f!("{}: .double {literal}", constant_symbol(literal)));
        }
        self.out_line();
    }

    fn g_entry(&mut self) {
        self.out(f!(".section {}", E::SECTION_TEXT));
        self.out(f!(".global {}", E::ENTRY_POINT));
        self.label(E::ENTRY_POINT);
        self.indented(|this| {
            this.out("push rbp");
            this.out("mov rbp, rsp");
            this.out(f!("mov {}, 0", Cell::Depth));
            if this.debug {
                this.out("int3");
            }
        });
    }

    /// Prints the single remaining value and returns from the entry point.
    fn g_result(&mut self) {
        self.indented(|this| {
            this.out("# [RESULT]");
            this.out(f!("mov rax, {}", Cell::Depth));
            this.out("cmp rax, 1");
            this.out(f!("ja {}", Handler::StackTooFull));
            this.out(f!("jb {}", Handler::StackError));
            this.out("pop rax");
            this.out("movq xmm0, rax");
            this.out(f!("lea rdi, [rip + {}]", Message::Result));
            this.out("mov eax, 1");
            this.out(f!("call {}", E::PRINTF));
            this.out("xor eax, eax");
            this.out("mov rsp, rbp");
            this.out("pop rbp");
            this.out("ret");
        });
    }

    /// Each handler loads its message and ends up in [`EXIT_ROUTINE`]. None of
    /// them returns to the program.
    fn g_handlers(&mut self) {
        let last = Handler::ALL.len() - 1;
        for (i, handler) in Handler::ALL.iter().enumerate() {
            self.label(handler);
            self.indented(|this| {
                this.out(f!("lea rdi, [rip + {}]", handler.message()));
                if i != last {
                    this.out(f!("jmp {EXIT_ROUTINE}"));
                }
            });
        }

        // The machine stack holds an arbitrary number of values here, so it
        // is realigned before calling into libc.
        self.label(EXIT_ROUTINE);
        self.indented(|this| {
            this.out("and rsp, -16");
            this.out("xor eax, eax");
            this.out(f!("call {}", E::PRINTF));
            this.out("mov edi, 1");
            this.out(f!("call {}", E::EXIT));
        });
    }
}

/// Instruction blocks.
impl<E> Generator<'_, E>
where
    E: x86_64_env::Env,
{
    /// Emits one block: depth guard, computation, then depth bookkeeping.
    ///
    /// `id` is the position of the instruction in the program and suffixes
    /// every label the block defines.
    fn g_instruction(&mut self, id: usize, instruction: Instruction) {
        trace!(id, instruction = instruction.name(), "emitting block");
        let program = self.program;
        self.indented(|this| {
            if let Instruction::Push(constant) = instruction {
                let literal = program.literal(constant);
                this.out(f!("# [PUSH {literal}]"));
            } else {
                this.out(f!("# [{}]", instruction.name()));
            }

            let arity = instruction.arity();
            if arity > 0 {
                this.g_require_depth(arity);
            }
            if instruction.depth_delta() > 0 {
                this.g_limit_depth();
            }

            match instruction {
                Instruction::Push(constant) => {
                    let literal = program.literal(constant);
                    this.out(f!("mov rax, qword ptr [rip + {}]", constant_symbol(literal)));
                    this.out("push rax");
                }
                Instruction::Plus => this.g_float_binary("fadd"),
                Instruction::Minus => this.g_float_binary("fsub"),
                Instruction::Multiply => this.g_float_binary("fmul"),
                Instruction::Divide => this.g_divide(),
                Instruction::Modulus => this.g_modulus(id),
                Instruction::Power => this.g_power(id),
                Instruction::Abs => this.g_float_unary(&["fabs"]),
                Instruction::Sin => this.g_float_unary(&["fsin"]),
                Instruction::Cos => this.g_float_unary(&["fcos"]),
                Instruction::Sqrt => this.g_float_unary(&["fsqrt"]),
                // No native tangent: st(0) = cos, st(1) = sin after `fsincos`.
                Instruction::Tan => this.g_float_unary(&[
                    "fsincos",
                    &format!("fstp {}", Cell::B),
                    &format!("fdiv {}", Cell::B),
                ]),
                Instruction::Dup => {
                    this.out("pop rax");
                    this.out("push rax");
                    this.out("push rax");
                }
                Instruction::Swap => {
                    this.out("pop rax");
                    this.out("pop rcx");
                    this.out("push rax");
                    this.out("push rcx");
                }
                Instruction::Factorial => this.g_factorial(id),
            }

            this.g_track_depth(instruction.depth_delta());
        });
    }

    /// Jumps to the stack error handler unless at least `n` values are on
    /// the stack. Clobbers `rax`.
    fn g_require_depth(&mut self, n: u8) {
        self.out(f!("mov rax, {}", Cell::Depth));
        self.out(f!("cmp rax, {n}"));
        self.out(f!("jb {}", Handler::StackError));
    }

    /// Jumps to the too-many-entries handler if the stack is already full.
    /// Clobbers `rax`.
    fn g_limit_depth(&mut self) {
        self.out(f!("mov rax, {}", Cell::Depth));
        self.out(f!("cmp rax, {MAX_DEPTH}"));
        self.out(f!("jae {}", Handler::StackTooFull));
    }

    fn g_track_depth(&mut self, delta: i8) {
        match delta {
            0 => {}
            1 => self.out(f!("inc {}", Cell::Depth)),
            -1 => self.out(f!("dec {}", Cell::Depth)),
            n => self.out(f!("add {}, {n}", Cell::Depth)),
        }
    }

    /// `b <op> a`, where `a` is the topmost value.
    fn g_float_binary(&mut self, op: &str) {
        self.g_pop(Cell::A);
        self.g_pop(Cell::B);
        self.out(f!("fld {}", Cell::B));
        self.out(f!("{op} {}", Cell::A));
        self.out(f!("fstp {}", Cell::A));
        self.g_push(Cell::A);
    }

    fn g_divide(&mut self) {
        self.out("pop rax");
        // Shifting the sign bit out catches both +0.0 and -0.0.
        self.out("mov rcx, rax");
        self.out("shl rcx, 1");
        self.out(f!("jz {}", Handler::DivisionByZero));
        self.out(f!("mov {}, rax", Cell::A));
        self.g_pop(Cell::B);
        self.out(f!("fld {}", Cell::B));
        self.out(f!("fdiv {}", Cell::A));
        self.out(f!("fstp {}", Cell::A));
        self.g_push(Cell::A);
    }

    /// Applies `ops` to the topmost value, held in `st(0)`.
    fn g_float_unary(&mut self, ops: &[&str]) {
        self.g_pop(Cell::A);
        self.out(f!("fld {}", Cell::A));
        for op in ops {
            self.out(op);
        }
        self.out(f!("fstp {}", Cell::A));
        self.g_push(Cell::A);
    }

    /// Signed remainder of the truncated operands. A zero divisor is a
    /// division by zero; a divisor of -1 yields 0 without dividing, since
    /// `idiv` faults on `i64::MIN / -1`.
    fn g_modulus(&mut self, id: usize) {
        let done = LocalLabel::new(LocalKind::ModulusDone, id);

        self.g_pop(Cell::A);
        self.g_pop(Cell::B);
        self.out(f!("cvttsd2si rcx, {}", Cell::A));
        self.out(f!("cvttsd2si rax, {}", Cell::B));
        self.out("test rcx, rcx");
        self.out(f!("jz {}", Handler::DivisionByZero));
        self.out("xor edx, edx");
        self.out("cmp rcx, -1");
        self.out(f!("je {done}"));
        // `cqo` sign-extends `rax` into `rdx`, replacing any stale high bits.
        self.out("cqo");
        self.out("idiv rcx");
        self.label(done);
        self.g_push_integer("rdx");
    }

    /// `b ^ a` over the truncated operands, by repeated multiplication.
    ///
    /// An exponent of zero (or less) yields 0, and an exponent of one yields
    /// the base unchanged.
    fn g_power(&mut self, id: usize) {
        let zero = LocalLabel::new(LocalKind::PowerZero, id);
        let again = LocalLabel::new(LocalKind::PowerLoop, id);
        let done = LocalLabel::new(LocalKind::PowerDone, id);

        self.g_pop(Cell::A);
        self.g_pop(Cell::B);
        self.out(f!("cvttsd2si rcx, {}", Cell::A));
        self.out(f!("cvttsd2si rax, {}", Cell::B));
        self.out("cmp rcx, 0");
        self.out(f!("jle {zero}"));
        self.out("mov rsi, rax");
        self.out("dec rcx");
        self.out(f!("jz {done}"));
        self.label(again);
        self.out("imul rax, rsi");
        self.out(f!("jo {}", Handler::RegisterOverflow));
        self.out("dec rcx");
        self.out(f!("jnz {again}"));
        self.out(f!("jmp {done}"));
        self.label(zero);
        self.out("xor eax, eax");
        self.label(done);
        self.g_push_integer("rax");
    }

    /// `a!` over the truncated operand; zero or negative values yield 0.
    fn g_factorial(&mut self, id: usize) {
        let again = LocalLabel::new(LocalKind::FactorialLoop, id);
        let done = LocalLabel::new(LocalKind::FactorialDone, id);

        self.g_pop(Cell::A);
        self.out(f!("cvttsd2si rcx, {}", Cell::A));
        self.out("xor eax, eax");
        self.out("cmp rcx, 0");
        self.out(f!("jle {done}"));
        self.out("mov eax, 1");
        self.label(again);
        self.out("imul rax, rcx");
        self.out(f!("jo {}", Handler::RegisterOverflow));
        self.out("dec rcx");
        self.out(f!("jnz {again}"));
        self.label(done);
        self.g_push_integer("rax");
    }

    /// Pops the topmost value into `cell`. Clobbers `rax`.
    fn g_pop(&mut self, cell: Cell) {
        self.out("pop rax");
        self.out(f!("mov {cell}, rax"));
    }

    /// Pushes the value of `cell`. Clobbers `rax`.
    fn g_push(&mut self, cell: Cell) {
        self.out(f!("mov rax, {cell}"));
        self.out("push rax");
    }

    /// Converts the integer in `reg` to a double and pushes it.
    fn g_push_integer(&mut self, reg: &str) {
        self.out(f!("mov {}, {reg}", Cell::Int));
        self.out(f!("fild {}", Cell::Int));
        self.out(f!("fstp {}", Cell::A));
        self.g_push(Cell::A);
    }
}

/// Utility functions.
impl<E> Generator<'_, E> {
    /// Prints a line.
    fn out(&mut self, f: impl fmt::Display) {
        let indent = if self.indent { "    " } else { "" };
        writeln!(self.code, "{indent}{f}").expect("code emit should be infallible");
    }

    /// Prints an empty line.
    fn out_line(&mut self) {
        self.code.push('\n');
    }

    /// Defines a label, always at the first column.
    fn label(&mut self, label: impl fmt::Display) {
        writeln!(self.code, "{label}:").expect("code emit should be infallible");
    }

    /// Writes in an indented block that is finished with an empty line.
    fn indented<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.indent = true;
        let res = f(self);
        self.indent = false;
        self.out_line();
        res
    }
}

/// Returns the data-section symbol of a pooled literal.
///
/// The mapping is a pure function of the literal text: negative literals get
/// a `neg` marker and periods become underscores, so `-3`, `3`, `3.0` and `30`
/// all land on distinct, assembler-safe names.
pub fn constant_symbol(literal: &str) -> ConstantSymbol<'_> {
    ConstantSymbol(literal)
}

#[derive(Copy, Clone)]
pub struct ConstantSymbol<'l>(&'l str);

impl fmt::Display for ConstantSymbol<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (prefix, digits) = match self.0.strip_prefix('-') {
            Some(digits) => ("const_neg_", digits),
            None => ("const_", self.0),
        };
        f.write_str(prefix)?;
        for c in digits.chars() {
            match c {
                '.' => f.write_char('_')?,
                '-' => {}
                c => f.write_char(c)?,
            }
        }
        Ok(())
    }
}

/// Fixed scratch memory, addressed relative to `rip`.
#[derive(Copy, Clone)]
enum Cell {
    /// First operand temporary (the topmost value of binary operations).
    A,
    /// Second operand temporary.
    B,
    /// Integer results on their way back to floating point.
    Int,
    /// Number of values on the evaluation stack.
    Depth,
}

impl Cell {
    const ALL: [Cell; 4] = [Cell::A, Cell::B, Cell::Int, Cell::Depth];

    const fn symbol(self) -> &'static str {
        match self {
            Cell::A => "scratch_a",
            Cell::B => "scratch_b",
            Cell::Int => "scratch_int",
            Cell::Depth => "depth",
        }
    }

    const fn initializer(self) -> &'static str {
        match self {
            Cell::A | Cell::B => ".double 0.0",
            Cell::Int | Cell::Depth => ".quad 0",
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "qword ptr [rip + {}]", self.symbol())
    }
}

#[derive(Copy, Clone)]
enum Message {
    Result,
    DivisionByZero,
    Overflow,
    StackError,
    StackFull,
}

impl Message {
    const ALL: [Message; 5] = [
        Message::Result,
        Message::DivisionByZero,
        Message::Overflow,
        Message::StackError,
        Message::StackFull,
    ];

    /// The string as written in the assembly source, escapes included.
    const fn text(self) -> &'static str {
        match self {
            Message::Result => r"Result %g\n",
            Message::DivisionByZero => r"Attempted division by zero.  Aborting\n",
            Message::Overflow => r"Overflow - value out of range.  Aborting\n",
            Message::StackError => r"Insufficient entries on the stack.  Aborting\n",
            Message::StackFull => r"Too many entries remaining on the stack.  Aborting\n",
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Message::Result => "fmt_result",
            Message::DivisionByZero => "msg_div_zero",
            Message::Overflow => "msg_overflow",
            Message::StackError => "msg_stack_err",
            Message::StackFull => "msg_stack_full",
        })
    }
}

/// Prints the message in `rdi`, then terminates the process.
const EXIT_ROUTINE: &str = "print_msg_and_exit";

/// Shared error paths, emitted once after the result sequence.
#[derive(Copy, Clone)]
enum Handler {
    DivisionByZero,
    RegisterOverflow,
    StackTooFull,
    StackError,
}

impl Handler {
    /// Emission order. The last one falls through into [`EXIT_ROUTINE`].
    const ALL: [Handler; 4] = [
        Handler::DivisionByZero,
        Handler::RegisterOverflow,
        Handler::StackTooFull,
        Handler::StackError,
    ];

    const fn message(self) -> Message {
        match self {
            Handler::DivisionByZero => Message::DivisionByZero,
            Handler::RegisterOverflow => Message::Overflow,
            Handler::StackTooFull => Message::StackFull,
            Handler::StackError => Message::StackError,
        }
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Handler::DivisionByZero => "division_by_zero",
            Handler::RegisterOverflow => "register_overflow",
            Handler::StackTooFull => "stack_too_full",
            Handler::StackError => "stack_error",
        })
    }
}

/// A label private to one instruction block.
#[derive(Copy, Clone)]
struct LocalLabel {
    kind: LocalKind,
    id: usize,
}

impl LocalLabel {
    const fn new(kind: LocalKind, id: usize) -> LocalLabel {
        LocalLabel { kind, id }
    }
}

#[derive(Copy, Clone)]
enum LocalKind {
    ModulusDone,
    PowerZero,
    PowerLoop,
    PowerDone,
    FactorialLoop,
    FactorialDone,
}

impl fmt::Display for LocalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            LocalKind::ModulusDone => "modulus_done",
            LocalKind::PowerZero => "power_zero",
            LocalKind::PowerLoop => "power_loop",
            LocalKind::PowerDone => "power_done",
            LocalKind::FactorialLoop => "factorial_loop",
            LocalKind::FactorialDone => "factorial_done",
        };
        write!(f, "{kind}_{}", self.id)
    }
}
