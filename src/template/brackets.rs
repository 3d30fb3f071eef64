//! Global expression delimiter configuration.
//!
//! Template compilers read the current open/close marker pair when they
//! compile markup into an expression tree. The pair is process-wide and
//! mutable, but it is only consulted at compile time: templates that were
//! already compiled keep the delimiters they were compiled with.

use std::cell::RefCell;

const DEFAULT_OPEN: &str = "{";
const DEFAULT_CLOSE: &str = "}";

thread_local! {
    static BRACKETS: RefCell<(String, String)> =
        RefCell::new((DEFAULT_OPEN.to_string(), DEFAULT_CLOSE.to_string()));
}

/// Current (open, close) delimiter pair.
pub fn brackets() -> (String, String) {
    BRACKETS.with(|b| b.borrow().clone())
}

/// Replace the delimiter pair for subsequently compiled templates.
pub fn set_brackets(open: &str, close: &str) {
    BRACKETS.with(|b| *b.borrow_mut() = (open.to_string(), close.to_string()));
}

/// Restore the default `{` / `}` pair.
pub fn reset_brackets() {
    set_brackets(DEFAULT_OPEN, DEFAULT_CLOSE);
}
