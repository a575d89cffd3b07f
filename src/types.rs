use crate::ast::FunctionDeclaration;
use crate::environment::Env;
use crate::evaluator::EvalResult;
use std::cell::RefCell;
use std::fmt; // For custom display formatting
use std::rc::Rc;

// Aggregates nested deeper than this print as `...`, as does an aggregate inside itself.
const MAX_DISPLAY_DEPTH: usize = 16;
// Elements and fields rendered in one display before the rest collapse to `...`.
const MAX_DISPLAY_ITEMS: usize = 10_000;

/// A runtime value. Arrays and objects are heap-allocated and shared by reference.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<ObjectMap>>),
    Function(Rc<Closure>),
    NativeFunction(NativeFunction),
}

impl Value {
    pub fn new_array(values: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(values)))
    }

    pub fn new_object(map: ObjectMap) -> Value {
        Value::Object(Rc::new(RefCell::new(map)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::NativeFunction(_) => "native-function",
        }
    }

    // Only the boolean `true` counts; there is no truthiness coercion.
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Boolean(true))
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>, state: &mut DisplayState) -> fmt::Result {
        match self {
            Value::String(s) if state.is_nested() => write!(f, "\"{}\"", s),
            Value::Array(items) => {
                if !state.enter(Rc::as_ptr(items).cast()) {
                    return write!(f, "...");
                }
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if !state.take_item() {
                        write!(f, "...")?;
                        break;
                    }
                    item.fmt_nested(f, state)?;
                }
                state.leave();
                write!(f, "]")
            }
            Value::Object(map) => {
                if !state.enter(Rc::as_ptr(map).cast()) {
                    return write!(f, "...");
                }
                let map = map.borrow();
                if map.is_empty() {
                    state.leave();
                    return write!(f, "{{}}");
                }
                write!(f, "{{ ")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if !state.take_item() {
                        write!(f, "...")?;
                        break;
                    }
                    write!(f, "{}: ", key)?;
                    value.fmt_nested(f, state)?;
                }
                state.leave();
                write!(f, " }}")
            }
            other => write!(f, "{}", other),
        }
    }
}

/// Tracks the aggregates currently being rendered and how many items remain.
struct DisplayState {
    ancestors: Vec<*const ()>,
    remaining: usize,
}

impl DisplayState {
    fn new() -> Self {
        DisplayState {
            ancestors: Vec::new(),
            remaining: MAX_DISPLAY_ITEMS,
        }
    }

    fn is_nested(&self) -> bool {
        !self.ancestors.is_empty()
    }

    // False when the aggregate is too deep or already on the path being rendered
    fn enter(&mut self, handle: *const ()) -> bool {
        if self.ancestors.len() >= MAX_DISPLAY_DEPTH || self.ancestors.contains(&handle) {
            return false;
        }
        self.ancestors.push(handle);
        true
    }

    fn leave(&mut self) {
        self.ancestors.pop();
    }

    fn take_item(&mut self) -> bool {
        let available = self.remaining > 0;
        self.remaining = self.remaining.saturating_sub(1);
        available
    }
}

// Implement Display trait for console output
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) if n.is_nan() => write!(f, "NaN"),
            Value::Number(n) if n.is_infinite() => {
                write!(f, "{}", if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(_) | Value::Object(_) => self.fmt_nested(f, &mut DisplayState::new()),
            Value::Function(closure) => write!(f, "<fn {}>", closure.declaration.display_name()),
            Value::NativeFunction(native) => write!(f, "<native fn {}>", native.name),
        }
    }
}

/// Scalars compare by value; arrays, objects and functions compare by storage handle.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::NativeFunction(a), Value::NativeFunction(b)) => Rc::ptr_eq(&a.func, &b.func),
            _ => false,
        }
    }
}

/// A user function paired with the environment it was declared in.
pub struct Closure {
    pub declaration: Rc<FunctionDeclaration>,
    pub env: Env,
}

// The captured environment is omitted: it usually contains the closure itself.
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Closure({})", self.declaration.display_name())
    }
}

/// Host callback contract: evaluated arguments plus the calling environment.
pub type NativeFunc = dyn Fn(Vec<Value>, &Env) -> EvalResult;

#[derive(Clone)] // Need Clone for Value::NativeFunction
pub struct NativeFunction {
    pub name: String,
    pub func: Rc<NativeFunc>,
}

impl NativeFunction {
    pub fn new(name: &str, func: impl Fn(Vec<Value>, &Env) -> EvalResult + 'static) -> Self {
        NativeFunction {
            name: name.to_string(),
            func: Rc::new(func),
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// Insertion-ordered string-keyed map backing object values.
#[derive(Debug, Clone, Default)]
pub struct ObjectMap {
    entries: Vec<(String, Value)>,
}

impl ObjectMap {
    pub fn new() -> Self {
        ObjectMap::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Replaces an existing entry in place, keeping its original position.
    pub fn insert(&mut self, key: String, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl FromIterator<(String, Value)> for ObjectMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut map = ObjectMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(s: &str) -> Value {
        Value::String(s.to_string())
    }

    #[test]
    fn test_display_scalars() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Boolean(false).to_string(), "false");
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(-2.5).to_string(), "-2.5");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Value::Number(f64::NEG_INFINITY).to_string(), "-Infinity");
        assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(string("plain").to_string(), "plain");
    }

    #[test]
    fn test_display_aggregates() {
        let object: ObjectMap = [
            ("name".to_string(), string("ada")),
            ("tags".to_string(), Value::new_array(vec![Value::Number(1.0), string("x")])),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            Value::new_object(object).to_string(),
            r#"{ name: "ada", tags: [1, "x"] }"#
        );
        assert_eq!(Value::new_object(ObjectMap::new()).to_string(), "{}");
    }

    #[test]
    fn test_display_self_referencing_array() {
        let array = Value::new_array(vec![]);
        if let Value::Array(items) = &array {
            items.borrow_mut().push(array.clone());
        }
        assert!(array.to_string().contains("..."));
    }

    #[test]
    fn test_display_many_self_references() {
        let array = Value::new_array(vec![]);
        if let Value::Array(items) = &array {
            for _ in 0..10 {
                items.borrow_mut().push(array.clone());
            }
        }
        assert_eq!(array.to_string(), format!("[{}]", vec!["..."; 10].join(", ")));

        let object = Value::new_object(ObjectMap::new());
        if let Value::Object(map) = &object {
            map.borrow_mut().insert("me".to_string(), object.clone());
            map.borrow_mut().insert("n".to_string(), Value::Number(1.0));
        }
        assert_eq!(object.to_string(), "{ me: ..., n: 1 }");
    }

    #[test]
    fn test_display_shared_children_stay_bounded() {
        // The same child ten times per level, twelve levels deep
        let mut nested = Value::new_array(vec![Value::Number(1.0)]);
        for _ in 0..12 {
            nested = Value::new_array(vec![nested.clone(); 10]);
        }
        let text = nested.to_string();
        assert!(text.starts_with("[[[["));
        assert!(text.contains("..."));
        assert!(text.len() < 200_000);

        // Siblings that share a child are not cycles
        let child = Value::new_array(vec![Value::Number(2.0)]);
        let pair = Value::new_array(vec![child.clone(), child]);
        assert_eq!(pair.to_string(), "[[2], [2]]");
    }

    #[test]
    fn test_equality_is_by_handle_for_aggregates() {
        let a = Value::new_array(vec![Value::Number(1.0)]);
        let alias = a.clone();
        let copy = Value::new_array(vec![Value::Number(1.0)]);
        assert_eq!(a, alias);
        assert_ne!(a, copy);
        assert_eq!(string("x"), string("x"));
        assert_ne!(Value::Number(1.0), string("1"));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn test_object_map_keeps_insertion_order() {
        let mut map = ObjectMap::new();
        map.insert("b".to_string(), Value::Number(1.0));
        map.insert("a".to_string(), Value::Number(2.0));
        map.insert("b".to_string(), Value::Number(3.0));
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(map.get("b"), Some(&Value::Number(3.0)));
        assert_eq!(map.len(), 2);
    }
}
