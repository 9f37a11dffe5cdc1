use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use risp_core::{Env, RispError, Value};
use risp_eval::{eval_program, Interpreter};

#[derive(Parser)]
#[command(name = "risp", about = "RumLisp: an S-expression language", version)]
struct Cli {
    /// File to execute
    file: Option<String>,

    /// Evaluate an expression and print non-unit results
    #[arg(short, long)]
    eval: Option<String>,

    /// Suppress the REPL banner
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    let interpreter = Interpreter::new();
    let env = interpreter.user_env();
    load_prelude(&env);

    if let Some(expr) = &cli.eval {
        match eval_program(expr, &env) {
            Ok(values) => print_values(&values),
            Err(e) => {
                print_error(&e);
                std::process::exit(1);
            }
        }
        return;
    }

    if let Some(file) = &cli.file {
        let source = match std::fs::read_to_string(file) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("error reading {file}: {e}");
                std::process::exit(1);
            }
        };
        if let Err(e) = eval_program(&source, &env) {
            print_error(&e);
            std::process::exit(1);
        }
        return;
    }

    repl(&env, cli.quiet);
}

/// `RISP_LIB` names a directory whose `prelude.risp` is evaluated into
/// every fresh environment. Every failure here is a non-fatal warning.
fn load_prelude(env: &Env) {
    let Ok(dir) = std::env::var("RISP_LIB") else {
        eprintln!("warning: RISP_LIB is not set; no prelude loaded");
        return;
    };
    let path = std::path::Path::new(&dir).join("prelude.risp");
    match std::fs::read_to_string(&path) {
        Ok(source) => {
            if let Err(e) = eval_program(&source, env) {
                eprintln!("warning: error in prelude {}: {}", path.display(), e.render());
            }
        }
        Err(e) => eprintln!("warning: cannot read prelude {}: {e}", path.display()),
    }
}

fn repl(env: &Env, quiet: bool) {
    let mut rl = DefaultEditor::new().expect("failed to create line editor");

    if !quiet {
        println!("RumLisp v{}", env!("CARGO_PKG_VERSION"));
        println!("Type :help for help, :exit to leave\n");
    }

    let mut buffer = String::new();
    let mut in_multiline = false;

    loop {
        let prompt = if in_multiline { "  ... " } else { "risp> " };
        match rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();

                if !in_multiline && trimmed.starts_with(':') {
                    if trimmed.starts_with(":exit") {
                        break;
                    }
                    print_help();
                    continue;
                }

                if in_multiline {
                    buffer.push('\n');
                    buffer.push_str(&line);
                } else {
                    buffer = line.clone();
                }

                if !is_balanced(&buffer) {
                    in_multiline = true;
                    continue;
                }

                in_multiline = false;
                let input = buffer.trim().to_string();
                buffer.clear();

                if input.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(&input);

                match eval_program(&input, env) {
                    Ok(values) => print_values(&values),
                    Err(e) => print_error(&e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                if in_multiline {
                    buffer.clear();
                    in_multiline = false;
                    println!("^C");
                    continue;
                }
                break;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        }
    }
}

/// Each non-unit top-level value prints on its own line, strings quoted.
fn print_values(values: &[Value]) {
    for value in values {
        if !value.is_unit() {
            println!("{value}");
        }
    }
}

fn print_error(e: &RispError) {
    eprintln!("Error: {}", e.inner());
    if let Some(trace) = e.stack_trace() {
        eprintln!("{trace}");
    }
}

fn print_help() {
    println!("Commands:");
    println!("  :exit   leave the REPL");
    println!("  :help   show this message");
    println!("Anything else is evaluated as RumLisp.");
}

/// True once every bracket opened in `src` is closed again, ignoring
/// brackets inside strings and comments. Used only to decide whether the
/// REPL should keep buffering; the reader does the real checking.
fn is_balanced(src: &str) -> bool {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut in_comment = false;
    for ch in src.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
            }
            continue;
        }
        if in_string {
            if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            ';' => in_comment = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    depth <= 0 && !in_string
}
