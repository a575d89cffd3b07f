// Declare modules publicly so they are part of the library interface
pub mod ast;
pub mod config;
pub mod environment;
pub mod evaluator;
pub mod interpreter;
pub mod lexer;
pub mod logger;
pub mod parser;
pub mod pretty_print;
pub mod primitives;
pub mod slang;
pub mod source;
pub mod tasks;
pub mod types;

pub use config::Config;
pub use environment::{Env, Environment};
pub use evaluator::{EvalError, EvalResult, evaluate};
pub use interpreter::{Error, Interpreter, run};
pub use lexer::{LexerError, Token, TokenKind, tokenize};
pub use parser::{ParseError, Parser, parse_str};
pub use types::Value;
