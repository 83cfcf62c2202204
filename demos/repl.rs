use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;
use tailisp::Error;
use tailisp::ast::Value;
use tailisp::evaluator::{self, Environment};
use tailisp::parser::parse_program;
use tailisp::transform::Forms;

fn main() {
    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run_repl() {
    println!("tailisp interactive interpreter");
    println!("Enter top-level forms like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");
    let env = evaluator::create_global_env();

    // Also callable from user code as (help)
    env.register_native_operation::<(), _>("help", print_help);

    loop {
        match rl.readline("tailisp> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Handle special commands
                match line {
                    ":help" => {
                        let _ = print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(&env);
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                if let Err(e) = eval_line(line, &env) {
                    println!("Error: {e}");
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

/// Evaluate one line of input, which may hold several top-level forms,
/// printing every non-absent result.
fn eval_line(line: &str, env: &Environment) -> Result<(), Error> {
    let forms = parse_program(line)?;
    for form in Forms::new(&forms) {
        let result = evaluator::eval(&form?, env)?;
        // Don't print Unspecified values (e.g. from define)
        if !matches!(result, Value::Unspecified) {
            println!("{result}");
        }
    }
    Ok(())
}

fn print_help() -> Result<Value, Error> {
    println!("tailisp REPL commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("The language:");
    println!("  Numbers: 42, -5, 4.45");
    println!("  Arithmetic: +, -, *, /");
    println!("  Comparison: = (numbers and symbols)");
    println!("  Lists: list, car, cdr, quote");
    println!("  Special forms: quote, if, set, define, lambda, begin");
    println!();
    println!("Examples:");
    println!("  (+ 1 2 3)");
    println!("  (define square (lambda (x) (* x x)))");
    println!("  (square 7)");
    println!("  (if (= 1 1) (quote yes) (quote no))");
    println!();

    Ok(Value::Unspecified)
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate native functions from user-defined values
    let mut natives = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::NativeFunction { .. } => natives.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !natives.is_empty() {
        println!("Native functions ({}):", natives.len());
        // Print in columns for readability
        let mut col = 0;
        for name in natives {
            print!("  {name:<15}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
