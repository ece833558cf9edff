use rpnc::codegen;

#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "snake_case")]
pub enum Target {
    x86_64_darwin,
    x86_64_linux,
}

impl Target {
    pub const fn host() -> Target {
        match codegen::Target::HOST {
            codegen::Target::x86_64_darwin => Target::x86_64_darwin,
            codegen::Target::x86_64_linux => Target::x86_64_linux,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", codegen::Target::from(*self))
    }
}

impl From<Target> for codegen::Target {
    fn from(value: Target) -> Self {
        match value {
            Target::x86_64_darwin => codegen::Target::x86_64_darwin,
            Target::x86_64_linux => codegen::Target::x86_64_linux,
        }
    }
}
