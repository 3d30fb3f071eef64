//! # tagtree
//!
//! Component-tree DOM runtime with incremental patching.
//!
//! Given a registered template (an expression tree produced by an external
//! template compiler) the runtime instantiates component trees bound to
//! real DOM nodes and keeps them synchronized with mutable state through
//! three primitives: `mount`, `update`, `unmount`. There is no intermediate
//! virtual tree: bindings patch the live DOM directly, each one comparing
//! its expression's value against the last applied value.
//!
//! ## Guarantees
//!
//! - every binding's expression is evaluated exactly once per `update()`
//! - children finish mounting before their parent's `mount` event fires;
//!   children unmount before their parent detaches
//! - loop children keep their identity across reorders when keyed
//! - form-control value writes are skipped when the text is unchanged, so
//!   the user's cursor survives re-renders
//!
//! Everything is synchronous and single-threaded: `update()` runs to
//! completion before returning, and nothing is batched or deferred except
//! an explicitly held unmount.
//!
//! ## Modules
//!
//! - [`dom`] - the in-memory host tree the engine patches
//! - [`template`] - expression-tree types and template factories
//! - [`engine`] - tag instances, registries, mounting
//! - [`error`] - error taxonomy and the overridable error hook
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use tagtree::{el, expr, Expr, Template};
//!
//! tagtree::register(Template::new(
//!     "greet",
//!     vec![el("p").child(expr(Expr::path("opts.val"))).into()],
//! ));
//!
//! let root = tagtree::dom::Node::element("greet");
//! tagtree::dom::document().append_child(&root);
//!
//! let tag = tagtree::mount(root, "greet", json!({ "val": 10 }))
//!     .into_iter()
//!     .next()
//!     .unwrap();
//! assert_eq!(tag.root().unwrap().text_content(), "10");
//!
//! tag.unmount(false);
//! assert!(!tag.is_mounted());
//! ```

pub mod dom;
pub mod engine;
pub mod error;
pub mod template;

// Re-export the everyday surface
pub use engine::mount::{live_instances, mount, register, registered, unregister, MountTarget};
pub use engine::refs::{RefTarget, Slot};
pub use engine::scope::Scope;
pub use engine::tag::{Tag, UnmountToken};
pub use error::{clear_error_hook, set_error_hook, EvalError};
pub use template::{
    brackets, each, el, expr, reset_brackets, set_brackets, text, when, AttrTemplate,
    ElementTemplate, EventExpr, Expr, KeyExpr, Template, TemplateNode,
};
