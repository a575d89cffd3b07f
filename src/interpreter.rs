use crate::config::Config;
use crate::environment::{Env, Environment};
use crate::evaluator::{EvalError, evaluate};
use crate::lexer::{LexerError, tokenize};
use crate::parser::{ParseError, Parser};
use crate::slang::canonicalize;
use crate::tasks::TaskQueue;
use crate::types::{NativeFunction, Value};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Any failure from reading, translating or running a program.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Lexer Error: {0}")]
    Lex(#[from] LexerError),
    #[error("Parse Error: {0}")]
    Parse(#[from] ParseError),
    #[error("{}: {}", .0.category(), .0)]
    Eval(#[from] EvalError),
    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Translates canonical source and evaluates it in `env`, returning the value of the
/// last statement. No preprocessing and no task draining happen here.
pub fn run(source: &str, env: &Env) -> Result<Value, Error> {
    let tokens = tokenize(source)?;
    let program = Parser::new(tokens).parse()?;
    Ok(evaluate(&program, env)?)
}

/// Owns a top-level environment and its task queue, running whole programs.
pub struct Interpreter {
    config: Config,
    env: Env,
    tasks: TaskQueue,
}

impl Interpreter {
    pub fn new(config: Config) -> Self {
        let tasks = TaskQueue::new();
        let env = global_env(&tasks, config.slang);
        Interpreter { config, env, tasks }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The top-level environment; definitions persist across `run` calls.
    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Applies slang preprocessing when enabled.
    pub fn prepare<'a>(&self, source: &'a str) -> Cow<'a, str> {
        if self.config.slang {
            Cow::Owned(canonicalize(source))
        } else {
            Cow::Borrowed(source)
        }
    }

    /// Runs a program, then drains any tasks it scheduled.
    pub fn run(&self, source: &str) -> Result<Value, Error> {
        let source = self.prepare(source);
        let value = run(&source, &self.env)?;
        if !self.tasks.is_empty() {
            log::debug!(target: "interpreter", "draining {} pending tasks", self.tasks.len());
            self.tasks.run(&self.env)?;
        }
        Ok(value)
    }

    pub fn run_file(&self, path: impl AsRef<Path>) -> Result<Value, Error> {
        let path = path.as_ref();
        log::info!(target: "interpreter", "running {}", path.display());
        let source = read_source(path)?;
        self.run(&source)
    }
}

fn read_source(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

// Constants, the core natives, timers bound to `tasks`, and `import`.
fn global_env(tasks: &TaskQueue, slang: bool) -> Env {
    let env = Environment::new_global_populated();
    {
        let mut scope = env.borrow_mut();
        tasks.install(&mut scope);
        let tasks = tasks.clone();
        scope.define_constant(
            "import",
            Value::NativeFunction(NativeFunction::new("import", move |args, _env| {
                match args.as_slice() {
                    [Value::String(path)] => import(Path::new(path), &tasks, slang),
                    _ => Err(EvalError::invalid_arguments("'import' expects a path string")),
                }
            })),
        );
    }
    env
}

// Runs another file in its own top-level scope; its last value is the export.
fn import(path: &Path, tasks: &TaskQueue, slang: bool) -> Result<Value, EvalError> {
    log::debug!(target: "interpreter", "importing {}", path.display());
    let module_env = global_env(tasks, slang);
    let result = read_source(path).and_then(|source| {
        let source = if slang { canonicalize(&source) } else { source };
        run(&source, &module_env)
    });
    match result {
        Ok(value) => Ok(value),
        Err(Error::Eval(err)) => Err(err),
        Err(other) => Err(EvalError::Raised(Value::String(other.to_string()))),
    }
}
