//! CSS injector - one rule set per tag name, however many instances exist.

use std::cell::RefCell;

use indexmap::IndexMap;

thread_local! {
    static STYLES: RefCell<IndexMap<String, String>> = RefCell::new(IndexMap::new());
}

/// Record the rule set for a tag name. Later injections under the same name
/// are ignored; the first registration wins for the lifetime of the sheet.
pub fn inject(tag_name: &str, css: &str) {
    STYLES.with(|s| {
        s.borrow_mut()
            .entry(tag_name.to_lowercase())
            .or_insert_with(|| css.to_string());
    });
}

/// The accumulated style sheet, in injection order.
pub fn styles() -> String {
    STYLES.with(|s| {
        s.borrow()
            .values()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    })
}

/// Drop every injected rule. Intended for tests.
pub fn reset() {
    STYLES.with(|s| s.borrow_mut().clear());
}
