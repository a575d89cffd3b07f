use crate::environment::{Env, Environment};
use crate::evaluator::{EvalError, EvalResult, call_value};
use crate::source::Span;
use crate::types::{NativeFunction, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// A callback waiting for its due time.
#[derive(Debug)]
struct Task {
    callback: Value,
    args: Vec<Value>,
}

#[derive(Debug, Default)]
struct QueueState {
    next_handle: u64,
    // Ordered by due time, then by handle so equal due times fire in scheduling order
    pending: BTreeMap<(Instant, u64), Task>,
}

/// Run-to-completion queue behind `setTimeout` / `clearTimeout`. Clones share the
/// same queue.
#[derive(Debug, Clone, Default)]
pub struct TaskQueue {
    state: Rc<RefCell<QueueState>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        TaskQueue::default()
    }

    /// Schedules `callback(args)` to run after `delay` and returns its handle, or
    /// `None` when the due time is past what the clock can represent.
    pub fn schedule(&self, callback: Value, args: Vec<Value>, delay: Duration) -> Option<u64> {
        let due = Instant::now().checked_add(delay)?;
        let mut state = self.state.borrow_mut();
        state.next_handle += 1;
        let handle = state.next_handle;
        state.pending.insert((due, handle), Task { callback, args });
        log::debug!(target: "tasks", "scheduled task {} in {:?}", handle, delay);
        Some(handle)
    }

    /// Removes a pending task. Fired and unknown handles report `false`.
    pub fn cancel(&self, handle: u64) -> bool {
        let mut state = self.state.borrow_mut();
        let key = state.pending.keys().find(|(_, id)| *id == handle).copied();
        match key {
            Some(key) => {
                state.pending.remove(&key);
                log::debug!(target: "tasks", "cancelled task {}", handle);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.state.borrow().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().pending.is_empty()
    }

    /// Fires tasks in due order until none remain, sleeping until each is due.
    /// Callbacks may schedule more tasks. The first unhandled failure stops the drain.
    pub fn run(&self, env: &Env) -> EvalResult<()> {
        loop {
            // Release the borrow before firing so the callback can schedule
            let next = self.state.borrow_mut().pending.pop_first();
            let Some(((due, handle), task)) = next else {
                return Ok(());
            };
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
            log::debug!(target: "tasks", "firing task {}", handle);
            call_value(&task.callback, task.args, env, Span::default())?;
        }
    }

    /// Declares `setTimeout` and `clearTimeout` bound to this queue.
    pub fn install(&self, env: &mut Environment) {
        let queue = self.clone();
        env.define_constant(
            "setTimeout",
            Value::NativeFunction(NativeFunction::new("setTimeout", move |args, _env| {
                queue.set_timeout(args)
            })),
        );
        let queue = self.clone();
        env.define_constant(
            "clearTimeout",
            Value::NativeFunction(NativeFunction::new("clearTimeout", move |args, _env| {
                queue.clear_timeout(args)
            })),
        );
    }

    // setTimeout(callback, delayMs, ...args) -> handle
    fn set_timeout(&self, args: Vec<Value>) -> EvalResult {
        let mut args = args.into_iter();
        let callback = match args.next() {
            Some(callback @ (Value::Function(_) | Value::NativeFunction(_))) => callback,
            Some(other) => {
                return Err(EvalError::invalid_arguments(format!(
                    "'setTimeout' expects a function, got {}",
                    other.type_name()
                )));
            }
            None => {
                return Err(EvalError::invalid_arguments(
                    "'setTimeout' expects a callback",
                ));
            }
        };
        let delay = match args.next() {
            Some(Value::Number(ms)) if ms.is_finite() && ms > 0.0 => {
                Duration::try_from_secs_f64(ms / 1000.0).map_err(|_| too_long(ms))?
            }
            Some(Value::Number(_)) | None => Duration::ZERO,
            Some(other) => {
                return Err(EvalError::invalid_arguments(format!(
                    "'setTimeout' expects a delay in milliseconds, got {}",
                    other.type_name()
                )));
            }
        };
        let handle = self
            .schedule(callback, args.collect(), delay)
            .ok_or_else(|| too_long(delay.as_secs_f64() * 1000.0))?;
        Ok(Value::Number(handle as f64))
    }

    // clearTimeout(handle) -> whether a pending task was removed
    fn clear_timeout(&self, args: Vec<Value>) -> EvalResult {
        let removed = match args.first() {
            Some(Value::Number(n)) if n.is_finite() && *n >= 1.0 && n.fract() == 0.0 => {
                self.cancel(*n as u64)
            }
            _ => false,
        };
        Ok(Value::Boolean(removed))
    }
}

fn too_long(ms: f64) -> EvalError {
    EvalError::invalid_arguments(format!("'setTimeout' delay of {}ms is too long", ms))
}
