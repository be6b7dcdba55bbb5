use std::{env, error::Error, fs, process::ExitCode};

use ronin::{compile, token::FileId};

const USAGE: &str = "\
Ronin compiler
usage: ronin [compile|run|test] <file>

positional arguments:
    compile    compile the file to a binary
    run        interpret the file
    test       run tests
optional arguments:
    --help     print this message and exit";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|arg| arg == "--help") {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }
    let [mode, file] = &args[..] else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };
    if !matches!(mode.as_str(), "compile" | "run" | "test") {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    }
    match run(mode, file) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn run(mode: &str, file: &str) -> Result<(), Box<dyn Error>> {
    let src = fs::read_to_string(file)?;
    let unit = match compile::compile(&src, FileId(0)) {
        Ok(unit) => unit,
        Err(diagnostics) => {
            for diagnostic in &diagnostics {
                eprintln!("{file}:{diagnostic}");
            }
            return Err(format!("emitted {} error(s)", diagnostics.len()).into());
        }
    };

    match mode {
        // There is no binary emitter yet, so dump the unit instead.
        "compile" => print!("{unit}"),
        "run" => println!("running is not implemented yet"),
        "test" => println!("testing is not implemented yet"),
        _ => unreachable!("checked by the caller"),
    }
    Ok(())
}
