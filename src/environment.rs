use crate::ast::{Node, NodeKind};
use crate::evaluator::{EvalError, EvalResult, evaluate};
use crate::source::Span;
use crate::types::{ObjectMap, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

// --- Environment Error ---
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvError {
    #[error("'{0}' is not declared")]
    Undeclared(String, Span), // Name, span where lookup happened
    #[error("'{0}' is already declared in this scope")]
    AlreadyDeclared(String, Span),
    #[error("cannot reassign constant '{0}'")]
    ConstantReassignment(String, Span),
}

impl EnvError {
    pub fn span(&self) -> Span {
        match self {
            EnvError::Undeclared(_, span)
            | EnvError::AlreadyDeclared(_, span)
            | EnvError::ConstantReassignment(_, span) => *span,
        }
    }
}

// --- Environment Definition ---

/// Shared handle to a scope. Closures keep their defining scope alive through it.
pub type Env = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    // Only the child -> parent link exists, so scopes never form cycles on their own.
    outer: Option<Env>,
    bindings: HashMap<String, Value>,
    constants: HashSet<String>,
}

impl Environment {
    /// Creates a new, empty top-level environment.
    pub fn new() -> Env {
        Rc::new(RefCell::new(Environment::default()))
    }

    /// A top-level environment holding the `true`, `false` and `null` constants.
    pub fn new_global() -> Env {
        let env_ptr = Environment::new();
        {
            let mut env = env_ptr.borrow_mut();
            env.define_constant("true", Value::Boolean(true));
            env.define_constant("false", Value::Boolean(false));
            env.define_constant("null", Value::Null);
        }
        env_ptr
    }

    /// A top-level environment with the constants and the core native library.
    pub fn new_global_populated() -> Env {
        let env_ptr = Environment::new_global();
        crate::primitives::install(&mut env_ptr.borrow_mut());
        env_ptr
    }

    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer_env: Env) -> Env {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer_env),
            ..Environment::default()
        }))
    }

    /// Declares a name in the *current* scope. Fails if this scope already has it;
    /// shadowing an outer scope is fine.
    pub fn declare(
        &mut self,
        name: &str,
        value: Value,
        constant: bool,
        span: Span,
    ) -> Result<Value, EnvError> {
        if self.bindings.contains_key(name) {
            return Err(EnvError::AlreadyDeclared(name.to_string(), span));
        }
        if constant {
            self.constants.insert(name.to_string());
        }
        self.bindings.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Binds a name in the current scope, replacing any existing local binding.
    pub fn define(&mut self, name: &str, value: Value) {
        self.constants.remove(name);
        self.bindings.insert(name.to_string(), value);
    }

    /// Helper for host collaborators seeding the top-level scope.
    pub fn define_constant(&mut self, name: &str, value: Value) {
        self.bindings.insert(name.to_string(), value);
        self.constants.insert(name.to_string());
    }

    /// Looks up a variable's value, walking outward to the nearest scope defining it.
    pub fn lookup(&self, name: &str, span: Span) -> Result<Value, EnvError> {
        if let Some(value) = self.bindings.get(name) {
            return Ok(value.clone());
        }
        match &self.outer {
            Some(outer_env_ptr) => outer_env_ptr.borrow().lookup(name, span),
            None => Err(EnvError::Undeclared(name.to_string(), span)),
        }
    }

    /// Updates the nearest scope defining `name`. Constants are rejected no matter
    /// which scope the assignment started from.
    pub fn assign(&mut self, name: &str, value: Value, span: Span) -> Result<Value, EnvError> {
        if let Some(slot) = self.bindings.get_mut(name) {
            if self.constants.contains(name) {
                return Err(EnvError::ConstantReassignment(name.to_string(), span));
            }
            *slot = value.clone();
            return Ok(value);
        }
        match &self.outer {
            Some(outer_env_ptr) => outer_env_ptr.borrow_mut().assign(name, value, span),
            None => Err(EnvError::Undeclared(name.to_string(), span)),
        }
    }

    /// Gets all identifiers visible from this scope (used for REPL completion).
    pub fn get_identifiers(&self) -> HashSet<String> {
        let mut identifiers: HashSet<String> = self.bindings.keys().cloned().collect();
        if let Some(outer_env_ptr) = &self.outer {
            identifiers.extend(outer_env_ptr.borrow().get_identifiers());
        }
        identifiers
    }

    /// Resolves a member expression to the container slot it names. Reads and writes
    /// share this traversal; the returned slot aliases the container's storage.
    pub fn resolve_path(env: &Env, member: &Node) -> EvalResult<Slot> {
        let NodeKind::MemberExpression {
            object,
            property,
            computed,
        } = &member.kind
        else {
            return Err(EvalError::InvalidAssignmentTarget(member.span));
        };

        // Nested paths materialize each intermediate container by evaluating it
        let container = evaluate(object, env)?;
        let key = if *computed {
            evaluate(property, env)?
        } else {
            match &property.kind {
                NodeKind::Identifier(name) => Value::String(name.clone()),
                _ => return Err(EvalError::InvalidAssignmentTarget(property.span)),
            }
        };

        match container {
            Value::Array(items) => {
                let index = array_index(&key, property.span)?;
                Ok(Slot::Element(items, index))
            }
            Value::Object(map) => {
                let key = match key {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                Ok(Slot::Field(map, key))
            }
            other => Err(EvalError::NotIndexable {
                found: other.type_name(),
                span: object.span,
            }),
        }
    }
}

fn array_index(key: &Value, span: Span) -> EvalResult<usize> {
    match key {
        Value::Number(n) if n.is_finite() && *n >= 0.0 => Ok(n.trunc() as usize),
        Value::Number(n) => Err(EvalError::InvalidIndex {
            message: format!("array index must be a non-negative number, got {}", n),
            span,
        }),
        other => Err(EvalError::InvalidIndex {
            message: format!("array index must be a number, got {}", other.type_name()),
            span,
        }),
    }
}

/// An addressable location inside a shared array or object.
#[derive(Debug, Clone)]
pub enum Slot {
    Element(Rc<RefCell<Vec<Value>>>, usize),
    Field(Rc<RefCell<ObjectMap>>, String),
}

impl Slot {
    /// Missing fields and out-of-range elements read as null.
    pub fn get(&self) -> Value {
        match self {
            Slot::Element(items, index) => items.borrow().get(*index).cloned().unwrap_or(Value::Null),
            Slot::Field(map, key) => map.borrow().get(key).cloned().unwrap_or(Value::Null),
        }
    }

    /// Writes through to the shared storage; every alias observes the change.
    pub fn set(&self, value: Value, span: Span) -> EvalResult<()> {
        match self {
            Slot::Element(items, index) => {
                let mut items = items.borrow_mut();
                match (*index).cmp(&items.len()) {
                    std::cmp::Ordering::Less => items[*index] = value,
                    std::cmp::Ordering::Equal => items.push(value),
                    std::cmp::Ordering::Greater => {
                        return Err(EvalError::InvalidIndex {
                            message: format!(
                                "array index {} is past the end of an array of length {}",
                                index,
                                items.len()
                            ),
                            span,
                        });
                    }
                }
            }
            Slot::Field(map, key) => map.borrow_mut().insert(key.clone(), value),
        }
        Ok(())
    }
}
