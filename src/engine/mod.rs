//! Component engine - lifecycle and reconciliation.
//!
//! The engine manages the core machinery:
//! - [`tag`] - the tag instance state machine (mount/update/unmount)
//! - [`mount`] - template registration and top-level mounting
//! - [`refs`] - multiplicity-aware named registries (refs and nested tags)
//! - [`scope`] - expression evaluation context and value semantics
//!
//! Binding, loop-reconciliation and dynamic-tag internals live in private
//! modules; their observable surface is the [`tag::Tag`] API.

pub(crate) mod binding;
pub(crate) mod each;
pub(crate) mod events;
pub(crate) mod is;
pub mod mount;
pub mod refs;
pub mod scope;
pub mod tag;

pub use mount::{live_instances, register, registered, reset, unregister, MountTarget};
pub use refs::{RefTarget, Registry, Slot};
pub use scope::{is_truthy, render_text, Scope};
pub use tag::{Tag, UnmountToken};
