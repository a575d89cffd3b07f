use bussin::{Config, Interpreter, logger};
use std::io::Read;
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = Config::from_env();
    if let Err(err) = logger::init(config.log_level) {
        eprintln!("Could not install logger: {}", err);
    }

    // Script path as the first argument, otherwise the whole of stdin
    let (name, source) = match std::env::args().nth(1) {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(source) => (path, source),
            Err(err) => {
                eprintln!("Could not read {}: {}", path, err);
                return ExitCode::FAILURE;
            }
        },
        None => {
            let mut source = String::new();
            if let Err(err) = std::io::stdin().read_to_string(&mut source) {
                eprintln!("Could not read stdin: {}", err);
                return ExitCode::FAILURE;
            }
            ("<stdin>".to_string(), source)
        }
    };

    let interpreter = Interpreter::new(config);
    match interpreter.run(&source) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            // Spans point into the canonical text the lexer saw
            let canonical = interpreter.prepare(&source);
            err.pretty_print(&name, &canonical);
            ExitCode::FAILURE
        }
    }
}
