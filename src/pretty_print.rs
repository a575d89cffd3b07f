use crate::environment::EnvError;
use crate::evaluator::EvalError;
use crate::interpreter::Error;
use crate::parser::ParseError;
use ariadne::{Label, Report, ReportKind, Source};
use std::ops::Range;

type Diagnostic<'a> = Report<'a, (&'a str, Range<usize>)>;

impl Error {
    /// Builds an ariadne report for this error against the source it came from.
    /// `name` labels the source (a file path, or `REPL`).
    pub fn report<'a>(&self, name: &'a str, input: &str) -> Diagnostic<'a> {
        match self {
            Error::Lex(lex_err) => Report::build(ReportKind::Error, (name, lex_err.span.to_range()))
                .with_message("Lexer Error")
                .with_label(
                    Label::new((name, lex_err.span.to_range())).with_message(lex_err.error.to_string()),
                )
                .finish(),
            Error::Parse(parse_err) => parse_err.report(name, input),
            Error::Eval(eval_err) => eval_err.report(name),
            Error::Io { .. } => Report::build(ReportKind::Error, (name, 0..0))
                .with_message(self.to_string())
                .finish(),
        }
    }

    pub fn pretty_print(&self, name: &str, input: &str) {
        if let Err(io_err) = self.report(name, input).eprint((name, Source::from(input))) {
            // Fall back to the plain message when stderr can't take the report
            eprintln!("{} ({})", self, io_err);
        }
    }
}

impl ParseError {
    fn report<'a>(&self, name: &'a str, input: &str) -> Diagnostic<'a> {
        let (range, label) = match self {
            ParseError::UnexpectedToken { found, expected } => {
                (found.span.to_range(), format!("Expected {expected}"))
            }
            ParseError::UnexpectedEof { expected, .. } => {
                let idx = input.len();
                (idx..idx, format!("Expected {expected}"))
            }
            ParseError::InvalidTernary { span, .. } => (
                span.to_range(),
                "A ternary needs `condition -> a | b`".to_string(),
            ),
            ParseError::InvalidAssignmentTarget { span, .. } => (
                span.to_range(),
                "Only variables and member paths can be assigned".to_string(),
            ),
            ParseError::MissingInitializer { span, .. } => {
                (span.to_range(), "Add `= value` here".to_string())
            }
            ParseError::InvalidForLoop { span, message, .. } => (span.to_range(), message.clone()),
            ParseError::LexerError(lex_err) => {
                (lex_err.span.to_range(), lex_err.error.to_string())
            }
        };
        Report::build(ReportKind::Error, (name, range.clone()))
            .with_message(self.to_string())
            .with_label(Label::new((name, range)).with_message(label))
            .finish()
    }
}

impl EvalError {
    fn report<'a>(&self, name: &'a str) -> Diagnostic<'a> {
        let Some(span) = self.span() else {
            // Raised values carry no source location
            return Report::build(ReportKind::Error, (name, 0..0))
                .with_message(format!("Uncaught {}", self.category()))
                .with_note(self.to_string())
                .finish();
        };
        let label = match self {
            EvalError::Env(EnvError::Undeclared(..)) => {
                "This name is not defined in any enclosing scope".to_string()
            }
            EvalError::Env(EnvError::AlreadyDeclared(..)) => {
                "Already declared in this scope".to_string()
            }
            EvalError::Env(EnvError::ConstantReassignment(..)) => {
                "This binding is constant".to_string()
            }
            EvalError::NotCallable { found, .. } => {
                format!("This {} cannot be called as a function", found)
            }
            EvalError::NotIndexable { found, .. } => {
                format!("A {} has no fields or elements", found)
            }
            other => other.to_string(),
        };
        Report::build(ReportKind::Error, (name, span.to_range()))
            .with_message(format!("{}: {}", self.category(), self))
            .with_label(Label::new((name, span.to_range())).with_message(label))
            .finish()
    }
}
