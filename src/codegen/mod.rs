use crate::{
    codegen::x86_64::Generator,
    ir::Program,
};

pub mod x86_64;
pub mod x86_64_env;

#[cfg(test)]
mod tests;

/// Emits the complete assembly program for `program`.
///
/// When `debug` is set, a breakpoint is placed right after the entry sequence.
pub fn generate(target: Target, program: &Program, debug: bool) -> String {
    type DarwinGenerator<'p> = Generator<'p, x86_64_env::Darwin>;
    type LinuxGenerator<'p> = Generator<'p, x86_64_env::Linux>;

    match target {
        Target::x86_64_darwin => DarwinGenerator::new(program, debug).generate(),
        Target::x86_64_linux => LinuxGenerator::new(program, debug).generate(),
    }
}

#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target {
    x86_64_darwin,
    x86_64_linux,
}

impl Target {
    pub const ALL: &[Target] = &[Target::x86_64_darwin, Target::x86_64_linux];

    /// The target matching the machine this crate was built on.
    pub const HOST: Target = HOST_TARGET;

    pub const fn triple(&self) -> &'static str {
        match self {
            Target::x86_64_darwin => "x86_64-apple-darwin",
            Target::x86_64_linux => "x86_64-unknown-linux-gnu",
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "macos")] {
        const HOST_TARGET: Target = Target::x86_64_darwin;
    } else {
        const HOST_TARGET: Target = Target::x86_64_linux;
    }
}

impl Default for Target {
    fn default() -> Self {
        Target::HOST
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::x86_64_darwin => f.write_str("x86_64_darwin"),
            Target::x86_64_linux => f.write_str("x86_64_linux"),
        }
    }
}
