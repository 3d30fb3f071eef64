//! Mount API - template registration and top-level mounting.
//!
//! Holds the two process-wide registries:
//! - template factories by tag name (re-registration replaces the factory
//!   for subsequent mounts; live instances are unaffected)
//! - live top-level instances, observable for diagnostics; an entry leaves
//!   the registry exactly when that instance fully unmounts
//!
//! [`mount`] resolves a target (selector, node, node list) plus a tag name
//! or the `*` wildcard into (root, name) pairs and instantiates one tag per
//! pair, in document order.
//!
//! # Example
//!
//! ```ignore
//! use tagtree::{el, expr, mount, register, Expr, Template};
//! use serde_json::json;
//!
//! register(Template::new(
//!     "greet",
//!     vec![el("p").child(expr(Expr::path("opts.val"))).into()],
//! ));
//!
//! let tags = mount("greet", "greet", json!({ "val": 10 }));
//! assert_eq!(tags[0].root().unwrap().text_content(), "10");
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use crate::dom::{document, Node};
use crate::template::Template;

use super::tag::Tag;

thread_local! {
    static TEMPLATES: RefCell<HashMap<String, Rc<Template>>> = RefCell::new(HashMap::new());
    static LIVE: RefCell<Vec<Rc<Tag>>> = RefCell::new(Vec::new());
}

// =============================================================================
// Template registry
// =============================================================================

/// Register a template factory under its (lowercased) name. Replaces any
/// previous registration for subsequent mounts only.
pub fn register(template: Template) {
    TEMPLATES.with(|t| {
        t.borrow_mut()
            .insert(template.name.clone(), Rc::new(template))
    });
}

/// Remove a factory. Live instances are unaffected.
pub fn unregister(name: &str) {
    TEMPLATES.with(|t| t.borrow_mut().remove(&name.to_lowercase()));
}

pub fn registered(name: &str) -> bool {
    lookup(name).is_some()
}

pub(crate) fn lookup(name: &str) -> Option<Rc<Template>> {
    TEMPLATES.with(|t| t.borrow().get(&name.to_lowercase()).cloned())
}

/// Drop every registered template and live-instance entry. Intended for
/// tests.
pub fn reset() {
    TEMPLATES.with(|t| t.borrow_mut().clear());
    LIVE.with(|l| l.borrow_mut().clear());
}

// =============================================================================
// Live instance registry
// =============================================================================

/// Currently mounted top-level instances, in mount order.
pub fn live_instances() -> Vec<Rc<Tag>> {
    LIVE.with(|l| l.borrow().clone())
}

pub(crate) fn remove_live(tag: &Rc<Tag>) {
    LIVE.with(|l| l.borrow_mut().retain(|t| !Rc::ptr_eq(t, tag)));
}

// =============================================================================
// Mounting
// =============================================================================

/// What to mount onto.
pub enum MountTarget {
    Selector(String),
    Node(Node),
    Nodes(Vec<Node>),
}

impl From<&str> for MountTarget {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_string())
    }
}

impl From<Node> for MountTarget {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<Vec<Node>> for MountTarget {
    fn from(nodes: Vec<Node>) -> Self {
        Self::Nodes(nodes)
    }
}

/// Mount a tag (or, with `"*"`, every resolvable tag) on the target(s).
///
/// Tag names match case-insensitively; the resolved type is written back to
/// the `data-is` attribute in lowercase whenever it differs from the
/// element's own tag name. Mounting a node that already hosts a live
/// instance replaces it in place, keeping the node. Unregistered names
/// yield zero instances.
pub fn mount(target: impl Into<MountTarget>, name: &str, opts: Value) -> Vec<Rc<Tag>> {
    let roots = resolve_roots(target.into(), name);
    let mut mounted = Vec::new();

    for (el, resolved) in roots {
        let Some(template) = lookup(&resolved) else {
            continue;
        };

        // replace any instance already living on this node, keeping the
        // node itself
        if let Some(existing) = LIVE.with(|l| {
            l.borrow()
                .iter()
                .find(|t| t.root().as_ref() == Some(&el))
                .cloned()
        }) {
            existing.unmount(true);
        }

        if el.tag_name().as_deref() != Some(resolved.as_str()) {
            el.set_attribute("data-is", &resolved);
        }
        el.clear_children();

        let tag = Tag::new_top_level(template, el, opts.clone());
        LIVE.with(|l| l.borrow_mut().push(tag.clone()));
        tag.mount();
        mounted.push(tag);
    }
    mounted
}

fn resolve_roots(target: MountTarget, name: &str) -> Vec<(Node, String)> {
    let name = name.to_lowercase();
    let elements: Vec<Node> = match target {
        MountTarget::Selector(sel) => document().select(&expand_selector(&sel)),
        MountTarget::Node(node) => vec![node],
        MountTarget::Nodes(nodes) => nodes,
    };

    if name == "*" {
        // every element under (and including) the targets whose tag name or
        // data-is attribute names a registered factory
        let mut out = Vec::new();
        for el in &elements {
            for cand in el.descendant_elements(true) {
                let resolved = cand
                    .attribute("data-is")
                    .map(|v| v.to_lowercase())
                    .or_else(|| cand.tag_name())
                    .unwrap_or_default();
                if lookup(&resolved).is_some() {
                    out.push((cand, resolved));
                }
            }
        }
        return out;
    }

    elements.into_iter().map(|el| (el, name.clone())).collect()
}

/// A bare tag name in a selector also matches nodes typed through
/// `data-is`.
fn expand_selector(selector: &str) -> String {
    selector
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            if p.starts_with('#') || p.starts_with('[') {
                p.to_string()
            } else {
                format!("{p}, [data-is={}]", p.to_lowercase())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
