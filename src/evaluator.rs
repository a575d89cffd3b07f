use crate::ast::{BinaryOperator, FunctionDeclaration, Node, NodeKind, Property};
use crate::environment::{Env, EnvError, Environment};
use crate::source::Span;
use crate::types::{Closure, ObjectMap, Value};
use std::cell::Cell;
use std::rc::Rc;
use thiserror::Error;

// --- Evaluation Error ---
#[derive(Error, Debug, Clone)]
pub enum EvalError {
    // Errors from environment lookup, declaration and assignment
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error("value of type {found} is not callable")]
    NotCallable { found: &'static str, span: Span },
    #[error("{message}")]
    InvalidIndex { message: String, span: Span },
    #[error("value of type {found} cannot be indexed")]
    NotIndexable { found: &'static str, span: Span },
    #[error("invalid assignment target")]
    InvalidAssignmentTarget(Span),
    #[error("{message}")]
    InvalidArguments { message: String, span: Span },
    #[error("maximum call depth of {limit} exceeded")]
    CallDepthExceeded { limit: usize, span: Span },
    // A value raised by script code (`throw`) or a host collaborator
    #[error("uncaught {0}")]
    Raised(Value),
}

impl EvalError {
    /// Natives don't know where they were called from; the call site fills the span in.
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        EvalError::InvalidArguments {
            message: message.into(),
            span: Span::default(),
        }
    }

    /// The error kind a script sees after catching this failure.
    pub fn category(&self) -> &'static str {
        match self {
            EvalError::Env(_) => "NameError",
            EvalError::NotCallable { .. } => "CallError",
            EvalError::InvalidIndex { .. } | EvalError::NotIndexable { .. } => "IndexError",
            EvalError::InvalidArguments { .. } => "TypeError",
            EvalError::CallDepthExceeded { .. } => "RangeError",
            EvalError::InvalidAssignmentTarget(_) | EvalError::Raised(_) => "Error",
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            EvalError::Env(env_error) => Some(env_error.span()),
            EvalError::NotCallable { span, .. }
            | EvalError::InvalidIndex { span, .. }
            | EvalError::NotIndexable { span, .. }
            | EvalError::InvalidArguments { span, .. }
            | EvalError::CallDepthExceeded { span, .. }
            | EvalError::InvalidAssignmentTarget(span) => Some(*span),
            EvalError::Raised(_) => None,
        }
    }

    /// Converts a failure into the value bound to `error` by try/catch. Raised values
    /// pass through untouched; built-in failures become `{ kind, message }`.
    pub fn into_value(self) -> Value {
        match self {
            EvalError::Raised(value) => value,
            other => {
                let map: ObjectMap = [
                    ("kind".to_string(), Value::String(other.category().to_string())),
                    ("message".to_string(), Value::String(other.to_string())),
                ]
                .into_iter()
                .collect();
                Value::new_object(map)
            }
        }
    }

    fn at_call_site(self, call_span: Span) -> Self {
        match self {
            EvalError::InvalidArguments { message, span } if span == Span::default() => {
                EvalError::InvalidArguments {
                    message,
                    span: call_span,
                }
            }
            other => other,
        }
    }
}

// Result type alias for convenience
pub type EvalResult<T = Value> = Result<T, EvalError>;

/// Deepest chain of nested script function calls before a RangeError is raised.
pub const MAX_CALL_DEPTH: usize = 4096;

// Stack kept free before entering a function body, and the size of each new segment
const RED_ZONE: usize = 256 * 1024;
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

// Holds one level of call depth while a closure body runs.
struct CallDepthGuard;

impl CallDepthGuard {
    fn enter(span: Span) -> EvalResult<Self> {
        CALL_DEPTH.with(|depth| {
            if depth.get() >= MAX_CALL_DEPTH {
                return Err(EvalError::CallDepthExceeded {
                    limit: MAX_CALL_DEPTH,
                    span,
                });
            }
            depth.set(depth.get() + 1);
            Ok(CallDepthGuard)
        })
    }
}

impl Drop for CallDepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

// --- Evaluate Function ---

/// Evaluates a given AST Node within the specified environment.
pub fn evaluate(node: &Node, env: &Env) -> EvalResult {
    match &node.kind {
        NodeKind::Program(statements) => evaluate_statements(statements, env),

        NodeKind::VariableDeclaration {
            constant,
            name,
            value,
        } => {
            let value = match value {
                Some(initializer) => evaluate(initializer, env)?,
                None => Value::Null,
            };
            Ok(env.borrow_mut().declare(name, value, *constant, node.span)?)
        }

        NodeKind::FunctionDeclaration(declaration) => {
            evaluate_function_declaration(declaration, env, node.span)
        }

        NodeKind::IfStatement {
            test,
            body,
            alternate,
        } => {
            // No truthiness: anything but boolean `true` takes the alternate
            if evaluate(test, env)?.is_true() {
                evaluate_block(body, env)
            } else if let Some(alternate) = alternate {
                evaluate_block(alternate, env)
            } else {
                Ok(Value::Null)
            }
        }

        NodeKind::ForStatement {
            init,
            test,
            update,
            body,
        } => evaluate_for(init, test, update, body, env),

        NodeKind::TryCatchStatement { body, alternate } => match evaluate_block(body, env) {
            Ok(value) => Ok(value),
            Err(err) => {
                log::debug!(target: "eval", "caught {}: {}", err.category(), err);
                // Bound in the scope around the try, so it outlives both blocks
                env.borrow_mut().define("error", err.into_value());
                evaluate_block(alternate, env)
            }
        },

        NodeKind::AssignmentExpression { assignee, value } => {
            let value = evaluate(value, env)?;
            assign(assignee, value, env)
        }

        NodeKind::BinaryExpression {
            left,
            right,
            operator,
        } => {
            let left = evaluate(left, env)?;
            let right = evaluate(right, env)?;
            Ok(apply_binary(*operator, &left, &right))
        }

        NodeKind::CallExpression { callee, arguments } => {
            let callee_value = evaluate(callee, env)?;
            let mut evaluated_args = Vec::with_capacity(arguments.len());
            for argument in arguments {
                evaluated_args.push(evaluate(argument, env)?);
            }
            call_value(&callee_value, evaluated_args, env, callee.span)
        }

        NodeKind::MemberExpression { .. } => Ok(Environment::resolve_path(env, node)?.get()),

        NodeKind::Identifier(name) => Ok(env.borrow().lookup(name, node.span)?),
        NodeKind::NumericLiteral(n) => Ok(Value::Number(*n)),
        NodeKind::StringLiteral(s) => Ok(Value::String(s.clone())),

        NodeKind::ArrayLiteral(elements) => {
            let mut values = Vec::with_capacity(elements.len());
            for element in elements {
                values.push(evaluate(element, env)?);
            }
            Ok(Value::new_array(values))
        }

        NodeKind::ObjectLiteral(properties) => evaluate_object(properties, env),
    }
}

/// Runs statements in order in `env`; the last value is the result (null when empty).
pub fn evaluate_statements(statements: &[Node], env: &Env) -> EvalResult {
    let mut result = Value::Null;
    for statement in statements {
        result = evaluate(statement, env)?;
    }
    Ok(result)
}

/// Runs a block body in a fresh child scope of `env`.
pub fn evaluate_block(statements: &[Node], env: &Env) -> EvalResult {
    let block_env = Environment::new_enclosed(env.clone());
    evaluate_statements(statements, &block_env)
}

fn evaluate_function_declaration(
    declaration: &Rc<FunctionDeclaration>,
    env: &Env,
    span: Span,
) -> EvalResult {
    let function = Value::Function(Rc::new(Closure {
        declaration: declaration.clone(),
        env: env.clone(),
    }));
    match &declaration.name {
        Some(name) => Ok(env.borrow_mut().declare(name, function, true, span)?),
        None => Ok(function),
    }
}

fn evaluate_for(init: &Node, test: &Node, update: &Node, body: &[Node], env: &Env) -> EvalResult {
    // One scope holds the loop variable for the whole loop
    let loop_env = Environment::new_enclosed(env.clone());
    evaluate(init, &loop_env)?;

    let mut result = Value::Null;
    let mut iterations = 0usize;
    while evaluate(test, &loop_env)?.is_true() {
        result = evaluate_block(body, &loop_env)?;
        evaluate(update, &loop_env)?;
        iterations += 1;
    }
    log::trace!(target: "eval", "for loop finished after {} iterations", iterations);
    Ok(result)
}

fn evaluate_object(properties: &[Property], env: &Env) -> EvalResult {
    let mut map = ObjectMap::new();
    for property in properties {
        let value = match &property.value {
            Some(value) => evaluate(value, env)?,
            // Shorthand `{ name }` reads the variable of the same name
            None => env.borrow().lookup(&property.key, property.span)?,
        };
        map.insert(property.key.clone(), value);
    }
    Ok(Value::new_object(map))
}

fn assign(assignee: &Node, value: Value, env: &Env) -> EvalResult {
    match &assignee.kind {
        NodeKind::Identifier(name) => Ok(env.borrow_mut().assign(name, value, assignee.span)?),
        NodeKind::MemberExpression { .. } => {
            let slot = Environment::resolve_path(env, assignee)?;
            slot.set(value.clone(), assignee.span)?;
            Ok(value)
        }
        _ => Err(EvalError::InvalidAssignmentTarget(assignee.span)),
    }
}

/// Applies a binary operator to evaluated operands. Operand type mismatches produce
/// `false` rather than an error.
pub fn apply_binary(operator: BinaryOperator, left: &Value, right: &Value) -> Value {
    match operator {
        BinaryOperator::Equal => Value::Boolean(left == right),
        BinaryOperator::NotEqual => Value::Boolean(left != right),
        BinaryOperator::And | BinaryOperator::Or => match (left, right) {
            (Value::Boolean(a), Value::Boolean(b)) => Value::Boolean(match operator {
                BinaryOperator::And => *a && *b,
                _ => *a || *b,
            }),
            _ => Value::Boolean(false),
        },
        _ => match (left, right) {
            (Value::Number(a), Value::Number(b)) => apply_numeric(operator, *a, *b),
            _ => Value::Boolean(false),
        },
    }
}

fn apply_numeric(operator: BinaryOperator, a: f64, b: f64) -> Value {
    match operator {
        BinaryOperator::Add => Value::Number(a + b),
        BinaryOperator::Subtract => Value::Number(a - b),
        BinaryOperator::Multiply => Value::Number(a * b),
        BinaryOperator::Divide => Value::Number(a / b),
        BinaryOperator::Modulo => Value::Number(a % b),
        BinaryOperator::LessThan => Value::Boolean(a < b),
        BinaryOperator::GreaterThan => Value::Boolean(a > b),
        // Equality and logical operators never reach here
        _ => Value::Boolean(false),
    }
}

/// Invokes a callable value with already-evaluated arguments. Host collaborators use
/// this to fire callbacks.
pub fn call_value(callee: &Value, args: Vec<Value>, env: &Env, span: Span) -> EvalResult {
    match callee {
        Value::Function(closure) => call_closure(closure, args, span),
        Value::NativeFunction(native) => {
            log::trace!(target: "eval", "calling native {}", native.name);
            (native.func)(args, env).map_err(|err| err.at_call_site(span))
        }
        other => Err(EvalError::NotCallable {
            found: other.type_name(),
            span,
        }),
    }
}

fn call_closure(closure: &Closure, args: Vec<Value>, span: Span) -> EvalResult {
    let declaration = &closure.declaration;
    log::trace!(target: "eval", "calling {}", declaration.display_name());
    let _depth = CallDepthGuard::enter(span)?;

    // The call scope hangs off the defining scope, not the caller's
    let call_env = Environment::new_enclosed(closure.env.clone());
    {
        let mut scope = call_env.borrow_mut();
        let mut args = args.into_iter();
        for parameter in &declaration.parameters {
            // Missing arguments are null; extras are dropped
            let value = args.next().unwrap_or(Value::Null);
            scope.declare(parameter, value, false, span)?;
        }
    }
    // Deep script recursion runs on heap-allocated stack segments
    stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, || {
        evaluate_statements(&declaration.body, &call_env)
    })
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str; // Use parser to create AST nodes easily
    use crate::types::NativeFunction;

    fn eval_in(input: &str, env: &Env) -> EvalResult {
        match parse_str(input) {
            Ok(node) => evaluate(&node, env),
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        }
    }

    // Helper to evaluate input string and compare the result by display form
    fn assert_eval(input: &str, expected: &str) {
        let env = Environment::new_global_populated();
        match eval_in(input, &env) {
            Ok(result) => assert_eq!(result.to_string(), expected, "Input: '{}'", input),
            Err(e) => panic!("Evaluation failed for input '{}': {}", input, e),
        }
    }

    fn assert_eval_value(input: &str, expected: Value) {
        let env = Environment::new_global_populated();
        match eval_in(input, &env) {
            Ok(result) => assert_eq!(result, expected, "Input: '{}'", input),
            Err(e) => panic!("Evaluation failed for input '{}': {}", input, e),
        }
    }

    // Helper to assert evaluation errors
    fn assert_eval_error(input: &str, expected_error_variant: &EvalError) {
        let env = Environment::new_global_populated();
        match eval_in(input, &env) {
            Ok(result) => panic!(
                "Expected evaluation to fail for input '{}', but got: {:?}",
                input, result
            ),
            Err(e) => {
                assert_eq!(
                    std::mem::discriminant(&e),
                    std::mem::discriminant(expected_error_variant),
                    "Input: '{}', Expected error variant like {:?}, got: {:?}",
                    input,
                    expected_error_variant,
                    e
                );
            }
        }
    }

    fn undeclared() -> EvalError {
        EvalError::Env(EnvError::Undeclared(String::new(), Span::default()))
    }

    fn invalid_index() -> EvalError {
        EvalError::InvalidIndex {
            message: String::new(),
            span: Span::default(),
        }
    }

    #[test]
    fn test_eval_literals() {
        assert_eval_value("123", Value::Number(123.0));
        assert_eval_value("-4.5", Value::Number(-4.5));
        assert_eval_value("true", Value::Boolean(true));
        assert_eval_value("null", Value::Null);
        assert_eval_value(r#""hello""#, Value::String("hello".to_string()));
        assert_eval("[1, \"a\", [true]]", r#"[1, "a", [true]]"#);
        assert_eval("{ a: 1, \"b c\": 2 }", "{ a: 1, b c: 2 }");
        assert_eval("", "null");
    }

    #[test]
    fn test_eval_arithmetic_matches_ieee() {
        let cases = [(7.5, 2.0), (-3.0, 0.25), (1e300, 1e10), (0.1, 0.2)];
        for (a, b) in cases {
            let env = Environment::new_global_populated();
            env.borrow_mut().define("a", Value::Number(a));
            env.borrow_mut().define("b", Value::Number(b));
            for (source, expected) in [
                ("a + b", a + b),
                ("a - b", a - b),
                ("a * b", a * b),
                ("a / b", a / b),
                ("a % b", a % b),
            ] {
                assert_eq!(eval_in(source, &env).ok(), Some(Value::Number(expected)));
            }
        }
        assert_eval("1 / 0", "Infinity");
        assert_eval("-1 / 0", "-Infinity");
        assert_eval("0 / 0", "NaN");
        assert_eval("2 + 3 * 4", "14");
        assert_eval("(2 + 3) * 4", "20");
        assert_eval("10 % 4", "2");
    }

    #[test]
    fn test_eval_prefix_minus() {
        assert_eval("let x = 3; 2 * -x", "-6");
        assert_eval("let y = 3; 5 - -y", "8");
        assert_eval("let z = 4; -z * 2 + 1", "-7");
        assert_eval("let f = fn () { 2 }; -f() % 3", "-2");
        // A literal after another literal starts a new statement
        assert_eval("5 -3", "-3");
    }

    #[test]
    fn test_eval_silent_false_on_type_mismatch() {
        assert_eval_value(r#""a" + 1"#, Value::Boolean(false));
        assert_eval_value("null * 2", Value::Boolean(false));
        assert_eval_value(r#"1 < "2""#, Value::Boolean(false));
        assert_eval_value("1 && true", Value::Boolean(false));
        assert_eval_value("true | 0", Value::Boolean(false));
        assert_eval_value("false | true", Value::Boolean(true));
        assert_eval_value("true && false", Value::Boolean(false));
    }

    #[test]
    fn test_eval_equality() {
        assert_eval_value("1 == 1", Value::Boolean(true));
        assert_eval_value(r#""a" != "a""#, Value::Boolean(false));
        assert_eval_value("null == null", Value::Boolean(true));
        assert_eval_value(r#"1 == "1""#, Value::Boolean(false));
        assert_eval_value("[1] == [1]", Value::Boolean(false));
        assert_eval_value("let a = [1]; let b = a; a == b", Value::Boolean(true));
        assert_eval_value("fn f() {} f == f", Value::Boolean(true));
        assert_eval_value("print == print", Value::Boolean(true));
    }

    #[test]
    fn test_eval_declarations() {
        assert_eval("let x = 5; x", "5");
        assert_eval("let x; x", "null");
        assert_eval("let x = 1; x = x + 1", "2");
        assert_eval_error("const c = 1; c = 2", &EvalError::Env(EnvError::ConstantReassignment(String::new(), Span::default())));
        assert_eval_error("let x = 1; let x = 2", &EvalError::Env(EnvError::AlreadyDeclared(String::new(), Span::default())));
        assert_eval_error("y = 1", &undeclared());
        assert_eval_error("missing", &undeclared());
        assert_eval_error("true = false", &EvalError::Env(EnvError::ConstantReassignment(String::new(), Span::default())));
    }

    #[test]
    fn test_eval_if_strict_boolean() {
        assert_eval(r#"if (true) { "a" } else { "b" }"#, "a");
        assert_eval(r#"if (1) { "a" } else { "b" }"#, "b");
        assert_eval(r#"if ("yes") { "a" }"#, "null");
        assert_eval(r#"let x = 3; if (x > 5) { "big" } else if (x > 1) { "mid" } else { "small" }"#, "mid");
    }

    #[test]
    fn test_eval_if_scopes_are_fresh() {
        assert_eval("let x = 1; if (true) { let x = 2; x = 3 } x", "1");
        assert_eval_error("if (true) { let inner = 1 } inner", &undeclared());
    }

    #[test]
    fn test_eval_for_loop() {
        assert_eval("let sum = 0; for (let i = 0; i < 5; i++) { sum += i } sum", "10");
        assert_eval("for (let i = 0; i < 3; i++) { i * 10 }", "20");
        assert_eval("let ran = false; for (let i = 0; i > 1; i++) { ran = true } ran", "false");
        assert_eval("for (let i = 0; i > 1; i++) { 1 }", "null");
        // The body scope is discarded between iterations
        assert_eval("let n = 0; for (let i = 0; i < 3; i++) { let fresh = i; n += fresh } n", "3");
        assert_eval_error("for (let i = 0; i < 1; i++) {} i", &undeclared());
    }

    #[test]
    fn test_eval_ternary() {
        assert_eval(r#"let x = 10; x > 5 -> "big" | "small""#, "big");
        assert_eval(r#"let x = 1; x > 5 -> "big" | "small""#, "small");
    }

    #[test]
    fn test_eval_functions_and_calls() {
        assert_eval("fn add(a, b) { a + b } add(2, 3)", "5");
        assert_eval("fn first(a, b) { b } first(1)", "null");
        assert_eval("fn one(a) { a } one(1, 2, 3)", "1");
        assert_eval("fn nothing() {} nothing()", "null");
        assert_eval("fn (x) { x * 2 }(21)", "42");
        assert_eval("let f = fn (x) { x }; f", "<fn <anonymous>>");
        assert_eval("fn named() {} named", "<fn named>");
        assert_eval_error("fn f() {} f = 1", &EvalError::Env(EnvError::ConstantReassignment(String::new(), Span::default())));
        assert_eval_error("fn dup(a, a) { a } dup(1, 2)", &EvalError::Env(EnvError::AlreadyDeclared(String::new(), Span::default())));
    }

    #[test]
    fn test_eval_not_callable() {
        assert_eval_error("let x = 1; x()", &EvalError::NotCallable { found: "number", span: Span::default() });
        assert_eval_error(r#""s"()"#, &EvalError::NotCallable { found: "string", span: Span::default() });
    }

    #[test]
    fn test_eval_closures_capture_scope_by_reference() {
        let program = r#"
            let count = 1
            fn read() { count }
            let before = read()
            count = 7
            [before, read()]
        "#;
        assert_eval(program, "[1, 7]");

        let counter = r#"
            fn make() {
                let n = 0
                fn () { n = n + 1 }
            }
            let next = make()
            next(); next(); next()
        "#;
        assert_eval(counter, "3");
    }

    #[test]
    fn test_eval_calls_use_defining_scope() {
        let program = r#"
            let x = "outer"
            fn show() { x }
            fn caller() { let x = "inner"; show() }
            caller()
        "#;
        assert_eval(program, "outer");
    }

    #[test]
    fn test_eval_recursion() {
        assert_eval(
            "fn fib(n) { if (n < 2) { n } else { fib(n - 1) + fib(n - 2) } } fib(15)",
            "610",
        );
    }

    #[test]
    fn test_eval_runaway_recursion_is_catchable() {
        let env = Environment::new_global_populated();
        let source = r#"
            fn down(n) { if (n > 0) { down(n - 1) } else { 0 } }
            try { down(100000) } catch { error.kind }
        "#;
        assert_eq!(
            eval_in(source, &env).ok(),
            Some(Value::String("RangeError".to_string()))
        );
        // The depth is released once the failed calls unwind
        assert_eq!(eval_in("down(100)", &env).ok(), Some(Value::Number(0.0)));
        assert_eval_error(
            "fn forever() { forever() } forever()",
            &EvalError::CallDepthExceeded { limit: 0, span: Span::default() },
        );
    }

    #[test]
    fn test_eval_aliasing_and_paths() {
        assert_eval(r#"const a = {"x": 1}; let b = a; b.x = 2; a.x"#, "2");
        assert_eval(r#"const a = {"b": {"c": 1}}; a.b.c = 5; a.b.c"#, "5");
        assert_eval("let xs = [1, 2]; xs[0] = 9; xs[2] = 3; xs", "[9, 2, 3]");
        assert_eval("let o = {}; o[\"k\"] = 1; o[2] = 3; o", "{ k: 1, 2: 3 }");
        assert_eval("let o = { n: 1 }; o.n += 4; o.n++; o.n", "6");
        assert_eval("let m = [[1], [2]]; m[1][0] = 7; m", "[[1], [7]]");
        assert_eval("let o = {}; o.missing", "null");
        assert_eval("let xs = []; xs[4]", "null");
        assert_eval("let o = { f: fn (x) { x + 1 } }; o.f(1)", "2");
        assert_eval_error("let xs = []; xs[\"a\"]", &invalid_index());
        assert_eval_error("let xs = []; xs[-1] = 0", &invalid_index());
        assert_eval_error("let xs = []; xs[3] = 0", &invalid_index());
        assert_eval_error(
            "let n = 1; n.x",
            &EvalError::NotIndexable { found: "number", span: Span::default() },
        );
    }

    #[test]
    fn test_eval_object_shorthand() {
        assert_eval("let a = 1; let b = \"two\"; { a, b }", r#"{ a: 1, b: "two" }"#);
        assert_eval_error("{ nope }", &undeclared());
    }

    #[test]
    fn test_eval_try_catch() {
        let env = Environment::new_global_populated();
        let result = eval_in(
            r#"
            let log = []
            try {
                log[0] = "before"
                undefinedThing
                log[1] = "after"
            } catch {
                error.kind
            }
            "#,
            &env,
        );
        assert_eq!(result.ok(), Some(Value::String("NameError".to_string())));
        assert_eq!(eval_in("log", &env).map(|v| v.to_string()).ok(), Some(r#"["before"]"#.to_string()));
        // `error` lives in the enclosing scope
        assert_eq!(
            eval_in("error.message", &env).map(|v| v.to_string()).ok(),
            Some("'undefinedThing' is not declared".to_string())
        );
        assert_eval("try { 1 } catch { 2 }", "1");
        assert_eval("try { throw(\"boom\") } catch { error }", "boom");
        assert_eval("try { 1() } catch { error.kind }", "CallError");
        assert_eval("let error = 0; try { [][\"x\"] } catch { error.kind }", "IndexError");
    }

    #[test]
    fn test_eval_uncaught_raise() {
        assert_eval_error("throw(1)", &EvalError::Raised(Value::Null));
    }

    #[test]
    fn test_native_functions_receive_args_and_env() {
        let env = Environment::new_global();
        env.borrow_mut().define_constant(
            "count_args",
            Value::NativeFunction(NativeFunction::new("count_args", |args, _env| {
                Ok(Value::Number(args.len() as f64))
            })),
        );
        env.borrow_mut().define_constant(
            "caller_has",
            Value::NativeFunction(NativeFunction::new("caller_has", |args, env| match args.as_slice() {
                [Value::String(name)] => Ok(Value::Boolean(env.borrow().lookup(name, Span::default()).is_ok())),
                _ => Err(EvalError::invalid_arguments("expected a name")),
            })),
        );
        assert_eq!(eval_in("count_args(1, [], null)", &env).ok(), Some(Value::Number(3.0)));
        assert_eq!(
            eval_in("fn f() { let local = 1; caller_has(\"local\") } f()", &env).ok(),
            Some(Value::Boolean(true))
        );

        match eval_in("caller_has(1)", &env) {
            Err(EvalError::InvalidArguments { span, .. }) => assert_eq!(span, Span::new(0, 10)),
            other => panic!("Expected InvalidArguments, got {:?}", other),
        }
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(undeclared().category(), "NameError");
        assert_eq!(invalid_index().category(), "IndexError");
        assert_eq!(EvalError::invalid_arguments("x").category(), "TypeError");
        let too_deep = EvalError::CallDepthExceeded {
            limit: MAX_CALL_DEPTH,
            span: Span::new(3, 9),
        };
        assert_eq!(too_deep.category(), "RangeError");
        assert_eq!(too_deep.span(), Some(Span::new(3, 9)));
        assert_eq!(EvalError::Raised(Value::Null).into_value(), Value::Null);
        assert_eq!(EvalError::Raised(Value::Null).span(), None);
    }
}
