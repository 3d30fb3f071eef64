//! Error taxonomy and the overridable error hook.
//!
//! Failures in this runtime fall into three buckets:
//! - lookup failures (unknown tag name, unresolved `data-is`) yield zero
//!   instances, never an error
//! - expression evaluation errors are reported through the hook below and the
//!   rest of the update pass still runs
//! - lifecycle misuse (double unmount, update after unmount) is a no-op
//!
//! The hook is process-wide. By default errors go to `log::error!`.

use std::cell::RefCell;

use thiserror::Error;

/// An expression failed to evaluate.
///
/// Expressions that merely reference missing state resolve to `Null` and do
/// not produce this error; it is reserved for expressions that actively fail.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("expression error: {message}")]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

thread_local! {
    static ERROR_HOOK: RefCell<Option<Box<dyn Fn(&EvalError)>>> = RefCell::new(None);
}

/// Replace the error hook. Binding evaluation errors are routed here instead
/// of aborting the update pass.
pub fn set_error_hook(hook: impl Fn(&EvalError) + 'static) {
    ERROR_HOOK.with(|h| *h.borrow_mut() = Some(Box::new(hook)));
}

/// Restore the default hook (`log::error!`).
pub fn clear_error_hook() {
    ERROR_HOOK.with(|h| *h.borrow_mut() = None);
}

/// Report an evaluation error through the hook.
pub(crate) fn report(err: &EvalError) {
    let handled = ERROR_HOOK.with(|h| {
        if let Some(hook) = h.borrow().as_ref() {
            hook(err);
            true
        } else {
            false
        }
    });
    if !handled {
        log::error!("{err}");
    }
}
