use crate::environment::{Env, Environment};
use crate::evaluator::{EvalError, EvalResult};
use crate::types::{NativeFunction, Value};

fn arity_error(name: &str, expected: usize, actual: usize) -> EvalError {
    EvalError::invalid_arguments(format!(
        "'{}' expects exactly {} arguments, got {}",
        name, expected, actual
    ))
}

// Checks the number of arguments
macro_rules! check_arity {
    ($args:expr, $expected:expr, $name:expr) => {
        if $args.len() != $expected {
            return Err(arity_error($name, $expected, $args.len()));
        }
    };
    // Variant for minimum number of args
    ($args:expr, min $expected:expr, $name:expr) => {
        if $args.len() < $expected {
            return Err(EvalError::invalid_arguments(format!(
                "'{}' expects at least {} arguments, got {}",
                $name,
                $expected,
                $args.len()
            )));
        }
    };
}

fn wrong_type(name: &str, expected: &str, found: &Value) -> EvalError {
    EvalError::invalid_arguments(format!(
        "'{}' expects {}, got {}",
        name,
        expected,
        found.type_name()
    ))
}

/// Declares the core native library as constants in `env`.
pub fn install(env: &mut Environment) {
    let natives: [(&str, fn(Vec<Value>, &Env) -> EvalResult); 7] = [
        ("print", prim_print),
        ("len", prim_len),
        ("push", prim_push),
        ("keys", prim_keys),
        ("str", prim_str),
        ("typeof", prim_typeof),
        ("throw", prim_throw),
    ];
    for (name, func) in natives {
        env.define_constant(name, Value::NativeFunction(NativeFunction::new(name, func)));
    }
}

/// Renders arguments the way `print` does: display forms joined by spaces.
pub fn format_args(args: &[Value]) -> String {
    args.iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn prim_print(args: Vec<Value>, _env: &Env) -> EvalResult {
    println!("{}", format_args(&args));
    Ok(Value::Null)
}

pub fn prim_len(args: Vec<Value>, _env: &Env) -> EvalResult {
    check_arity!(args, 1, "len");
    let length = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.borrow().len(),
        Value::Object(map) => map.borrow().len(),
        other => return Err(wrong_type("len", "a string, array or object", other)),
    };
    Ok(Value::Number(length as f64))
}

pub fn prim_push(args: Vec<Value>, _env: &Env) -> EvalResult {
    // push(array, ...values) -> new length
    check_arity!(args, min 1, "push");
    let mut args = args.into_iter();
    match args.next() {
        Some(Value::Array(items)) => {
            let mut items = items.borrow_mut();
            items.extend(args);
            Ok(Value::Number(items.len() as f64))
        }
        Some(other) => Err(wrong_type("push", "an array", &other)),
        None => Err(arity_error("push", 1, 0)),
    }
}

pub fn prim_keys(args: Vec<Value>, _env: &Env) -> EvalResult {
    check_arity!(args, 1, "keys");
    match &args[0] {
        Value::Object(map) => Ok(Value::new_array(
            map.borrow()
                .keys()
                .map(|key| Value::String(key.clone()))
                .collect(),
        )),
        other => Err(wrong_type("keys", "an object", other)),
    }
}

pub fn prim_str(args: Vec<Value>, _env: &Env) -> EvalResult {
    check_arity!(args, 1, "str");
    Ok(Value::String(args[0].to_string()))
}

pub fn prim_typeof(args: Vec<Value>, _env: &Env) -> EvalResult {
    check_arity!(args, 1, "typeof");
    Ok(Value::String(args[0].type_name().to_string()))
}

pub fn prim_throw(args: Vec<Value>, _env: &Env) -> EvalResult {
    // throw() raises null
    Err(EvalError::Raised(args.into_iter().next().unwrap_or(Value::Null)))
}
