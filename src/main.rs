use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use tailisp::Error;
use tailisp::ast::Value;
use tailisp::evaluator::{self, Environment};
use tailisp::parser::parse_program;
use tailisp::transform::Forms;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let source = match args.as_slice() {
        [_] => read_stdin(),
        [_, arg] if arg == "-h" || arg == "--help" => {
            print_usage();
            process::exit(0);
        }
        [_, arg] if arg == "-" => read_stdin(),
        [_, path] => fs::read_to_string(path).map_err(|e| format!("cannot read {path}: {e}")),
        _ => {
            eprintln!("expected at most one input file");
            eprintln!("Try 'tailisp --help' for usage information.");
            process::exit(2);
        }
    };

    let source = match source {
        Ok(source) => source,
        Err(message) => {
            eprintln!("{message}");
            process::exit(2);
        }
    };

    let env = evaluator::create_global_env();
    if let Err(error) = run(&source, &env) {
        eprintln!("{error}");
        process::exit(1);
    }
}

fn read_stdin() -> Result<String, String> {
    let mut source = String::new();
    io::stdin()
        .read_to_string(&mut source)
        .map_err(|e| format!("cannot read standard input: {e}"))?;
    Ok(source)
}

/// Parse, transform and evaluate every top-level form in source order,
/// printing each non-absent result on its own line. The first failure
/// aborts the remaining forms.
fn run(source: &str, env: &Environment) -> Result<(), Error> {
    let forms = parse_program(source)?;
    log::debug!("parsed {} top-level forms", forms.len());

    for form in Forms::new(&forms) {
        let atom = form?;
        let result = evaluator::eval(&atom, env)?;
        if !matches!(result, Value::Unspecified) {
            println!("{result}");
        }
    }
    Ok(())
}

fn print_usage() {
    println!("Usage: tailisp [FILE]");
    println!();
    println!("Evaluates every top-level form of FILE in order and prints each");
    println!("non-empty result on its own line. With no FILE, or when FILE is");
    println!("'-', the program is read from standard input.");
    println!();
    println!("Environment variables:");
    println!("  RUST_LOG=debug    Enable phase logging");
}
