use std::{
    error::Error,
    io::{self, Write},
    path::{Path, PathBuf},
    process::{self, Command, Stdio},
};

use clap::Parser;
use rpnc::{codegen, Compiler};
use tracing::{error, info};

use crate::target::Target;

mod target;

/// Compiles a reverse-Polish-notation expression into an x86-64 program.
///
/// By default the assembly is written to stdout.
#[derive(Parser)]
#[command(name = "rpnc", version)]
struct Args {
    /// The expression to compile, such as `3 4 + 2 ^`.
    expression: String,

    /// Insert a breakpoint after the entry sequence of the generated program.
    #[arg(long)]
    debug: bool,

    /// Assemble and link the program with the C compiler driver.
    #[arg(long)]
    compile: bool,

    /// Run the program after compiling it. Implies `--compile`.
    #[arg(long)]
    run: bool,

    /// The executable to write.
    #[arg(long, default_value = "a.out")]
    filename: PathBuf,

    /// The C compiler driver used to assemble and link.
    #[arg(long, default_value = "cc")]
    cc: String,

    #[arg(long, value_enum, default_value_t = Target::host())]
    target: Target,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    if let Err(error) = run(Args::parse()) {
        error!("{error}");
        eprintln!("failed to run: {error}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut compiler = Compiler::new(args.expression);
    compiler.set_debug(args.debug);
    compiler.set_target(args.target.into());

    let asm = compiler
        .compile()
        .map_err(|error| format!("error compiling: {error:#}"))?;

    if !args.compile && !args.run {
        io::stdout().write_all(asm.as_bytes())?;
        return Ok(());
    }

    assemble(&args.cc, &asm, &args.filename, args.target.into())?;
    if args.run {
        execute(&args.filename)?;
    }
    Ok(())
}

/// Pipes the assembly into the C compiler driver, which assembles it and links
/// it against libc.
fn assemble(
    cc: &str,
    asm: &str,
    output: &Path,
    target: codegen::Target,
) -> Result<(), Box<dyn Error>> {
    info!(cc, output = %output.display(), triple = target.triple(), "assembling");
    let mut child = Command::new(cc)
        .arg("-o")
        .arg(output)
        .args(["-x", "assembler", "-"])
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|error| format!("failed to launch {cc}: {error}"))?;

    // Dropping the handle closes the pipe, letting the assembler finish.
    child
        .stdin
        .take()
        .ok_or("assembler stdin is not piped")?
        .write_all(asm.as_bytes())?;

    let status = child.wait()?;
    if !status.success() {
        return Err(format!("{cc} exited with {status}").into());
    }
    Ok(())
}

fn execute(program: &Path) -> Result<(), Box<dyn Error>> {
    // A bare file name would otherwise be looked up in `PATH`.
    let program = if program.components().count() == 1 && program.is_relative() {
        Path::new(".").join(program)
    } else {
        program.to_path_buf()
    };
    info!(program = %program.display(), "running");

    let status = Command::new(&program)
        .status()
        .map_err(|error| format!("failed to launch {}: {error}", program.display()))?;
    if !status.success() {
        return Err(format!("{} exited with {status}", program.display()).into());
    }
    Ok(())
}
