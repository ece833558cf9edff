use crate::{
    builder,
    codegen::{self, Target},
    ir::{Instruction, Program},
};

#[track_caller]
pub fn build_ok(src: &str) -> Program {
    match builder::build(src) {
        Ok(program) => program,
        Err(error) => panic!("failed to build {src:?}: {error:#}"),
    }
}

/// Asserts that building fails with the given (spanned) message.
#[track_caller]
pub fn assert_error(src: &str, expected: &str) {
    match builder::build(src) {
        Ok(program) => panic!("expected {src:?} to fail, got {program:?}"),
        Err(error) => ::pretty_assertions::assert_eq!(format!("{error:#}"), expected),
    }
}

/// Renders each instruction as its name, followed by the literal for pushes.
#[track_caller]
pub fn instructions_of(src: &str) -> Vec<String> {
    let program = build_ok(src);
    program
        .instructions
        .iter()
        .map(|instruction| match *instruction {
            Instruction::Push(constant) => format!("PUSH {}", program.literal(constant)),
            other => other.name().to_string(),
        })
        .collect()
}

#[track_caller]
pub fn asm_of(src: &str, target: Target, debug: bool) -> String {
    codegen::generate(target, &build_ok(src), debug)
}
