//! Compiles, links and runs every fixture case, comparing the program's output
//! against the expected one.
//!
//! Usage: `cargo run -p tester [-- <cc>]`. The C compiler driver defaults to
//! `cc` and must be able to link for the host.

use std::{
    env, fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::{exit, Command, Stdio},
};

use pretty_assertions::StrComparison;
use rpnc::Compiler;

const FIXTURE_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");
const CASE_SEPARATOR: &str =
    "%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%";
const CASE_PREFIX: &str = "%% CASE ";
const OK_WITH: &str = "%% OK WITH:";
const ERROR_WITH: &str = "%% ERROR WITH:";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Outcome {
    /// The program printed its result and exited with status 0.
    Ok,
    /// The program printed a diagnostic and exited with status 1.
    Error,
}

impl Outcome {
    const fn status(self) -> i32 {
        match self {
            Outcome::Ok => 0,
            Outcome::Error => 1,
        }
    }
}

#[derive(Debug)]
struct Case<'a> {
    name: &'a str,
    input: &'a str,
    outcome: Outcome,
    output: &'a str,
}

fn main() {
    let cc = env::args().nth(1).unwrap_or_else(|| "cc".into());
    let work_dir = env::temp_dir().join(format!("rpnc-tester-{}", std::process::id()));
    if let Err(error) = fs::create_dir_all(&work_dir) {
        eprintln!("failed to create {}: {error}", work_dir.display());
        exit(1);
    }

    let fixtures = match find_fixtures(Path::new(FIXTURE_DIR)) {
        Ok(fixtures) => fixtures,
        Err(error) => {
            eprintln!("failed to read fixtures from {FIXTURE_DIR}: {error}");
            exit(1);
        }
    };

    let mut passed = 0;
    let mut failed = 0;
    for path in &fixtures {
        println!("---> {}", path.display());
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) => {
                eprintln!("     failed to read: {error}");
                failed += 1;
                continue;
            }
        };
        let cases = match parse_fixture(&content) {
            Ok(cases) => cases,
            Err(error) => {
                eprintln!("     malformed fixture: {error}");
                failed += 1;
                continue;
            }
        };
        for (i, case) in cases.iter().enumerate() {
            print!("     {}... ", case.name);
            _ = io::stdout().flush();
            let exe = work_dir.join(format!("case-{i}"));
            match run_case(case, &cc, &exe) {
                Ok(()) => {
                    println!("PASS");
                    passed += 1;
                }
                Err(report) => {
                    println!("FAIL");
                    println!("{report}");
                    failed += 1;
                }
            }
        }
    }

    _ = fs::remove_dir_all(&work_dir);

    println!("\npassed: {passed}, failed: {failed}");
    if failed > 0 {
        exit(1);
    }
}

fn find_fixtures(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut fixtures = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "txt") {
            fixtures.push(path);
        }
    }
    fixtures.sort();
    Ok(fixtures)
}

fn parse_fixture(content: &str) -> Result<Vec<Case<'_>>, String> {
    content
        .split(CASE_SEPARATOR)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(parse_case)
        .collect()
}

fn parse_case(block: &str) -> Result<Case<'_>, String> {
    let (header, rest) = block.split_once('\n').unwrap_or((block, ""));
    let name = header
        .strip_prefix(CASE_PREFIX)
        .ok_or_else(|| format!("expected `{CASE_PREFIX}`, got `{header}`"))?
        .trim();

    let (input, outcome, output) = if let Some((input, output)) = rest.split_once(OK_WITH) {
        (input, Outcome::Ok, output)
    } else if let Some((input, output)) = rest.split_once(ERROR_WITH) {
        (input, Outcome::Error, output)
    } else {
        return Err(format!("case `{name}` has no `{OK_WITH}` or `{ERROR_WITH}` line"));
    };

    Ok(Case {
        name,
        input: input.trim(),
        outcome,
        output: output.trim(),
    })
}

fn run_case(case: &Case, cc: &str, exe: &Path) -> Result<(), String> {
    let asm = Compiler::new(case.input)
        .compile()
        .map_err(|error| format!("     does not compile: {error:#}"))?;

    let mut child = Command::new(cc)
        .arg("-o")
        .arg(exe)
        .args(["-x", "assembler", "-"])
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|error| format!("     failed to launch {cc}: {error}"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(asm.as_bytes())
            .map_err(|error| format!("     failed to write to {cc}: {error}"))?;
    }
    let status = child.wait().map_err(|error| error.to_string())?;
    if !status.success() {
        return Err(format!("     {cc} exited with {status}\n{asm}"));
    }

    let run = Command::new(exe)
        .output()
        .map_err(|error| format!("     failed to run {}: {error}", exe.display()))?;
    let Some(code) = run.status.code() else {
        return Err(format!("     terminated by a signal ({})", run.status));
    };

    let stdout = String::from_utf8_lossy(&run.stdout);
    let actual = stdout.trim();
    if code != case.outcome.status() || actual != case.output {
        return Err(format!(
            "     expected status {}, got {code}\n{}",
            case.outcome.status(),
            StrComparison::new(case.output, actual),
        ));
    }
    Ok(())
}
