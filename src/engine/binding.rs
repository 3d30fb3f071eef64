//! Expression bindings - one reactive link between an expression and one
//! DOM location.
//!
//! Every binding follows the same contract: on update, evaluate the
//! expression exactly once, compare against the last applied value, and
//! touch the DOM only when the value changed. Evaluation errors are routed
//! to the error hook and the rest of the pass continues.
//!
//! Two bindings carry extra rules:
//! - value-property bindings skip the DOM write when the rendered text
//!   already equals the control's current value, so the user's cursor and
//!   selection survive re-renders
//! - event bindings own at most one registered listener per (node, event);
//!   rebinding releases the previous listener before attaching the new one

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::dom::{Event, ListenerHandle, Node};
use crate::error;
use crate::template::{EventExpr, EventHandler, Expr};

use super::each::EachBinding;
use super::is::IsBinding;
use super::scope::{is_truthy, render_text, Scope};
use super::tag::Tag;

pub(crate) enum Binding {
    Text(TextBinding),
    Attr(AttrBinding),
    Value(ValueBinding),
    Event(EventBinding),
    TagOpt(TagOptBinding),
    If(IfBinding),
    Each(EachBinding),
    Is(IsBinding),
}

impl Binding {
    /// Re-evaluate and patch. `owner` is the instance the binding belongs to.
    pub fn update(&self, owner: &Rc<Tag>) {
        let scope = Scope::new(owner.clone());
        match self {
            Self::Text(b) => b.update(&scope),
            Self::Attr(b) => b.update(&scope),
            Self::Value(b) => b.update(&scope),
            Self::Event(b) => b.update(owner, &scope),
            Self::TagOpt(b) => b.update(&scope),
            Self::If(b) => b.update(&scope),
            Self::Each(b) => b.update(owner, &scope),
            Self::Is(b) => b.update(owner, &scope),
        }
    }

    /// Release resources that do not go away with the DOM subtree itself.
    pub fn teardown(&self) {
        if let Self::Event(b) = self {
            b.release();
        }
    }

    /// Child instances this binding manages (loop items, data-is mounts).
    pub fn child_tags(&self) -> Vec<Rc<Tag>> {
        match self {
            Self::Each(b) => b.children(),
            Self::Is(b) => b.current_child().into_iter().collect(),
            _ => Vec::new(),
        }
    }
}

fn eval(expr: &Expr, scope: &Scope) -> Option<Value> {
    match expr.eval(scope) {
        Ok(v) => Some(v),
        Err(e) => {
            error::report(&e);
            None
        }
    }
}

// =============================================================================
// Text
// =============================================================================

pub(crate) struct TextBinding {
    node: Node,
    expr: Expr,
    last: RefCell<Option<String>>,
}

impl TextBinding {
    pub fn new(node: Node, expr: Expr) -> Self {
        Self {
            node,
            expr,
            last: RefCell::new(None),
        }
    }

    fn update(&self, scope: &Scope) {
        let Some(value) = eval(&self.expr, scope) else {
            return;
        };
        let rendered = render_text(&value);
        if self.last.borrow().as_deref() == Some(&rendered) {
            return;
        }
        self.node.set_data(&rendered);
        *self.last.borrow_mut() = Some(rendered);
    }
}

// =============================================================================
// Attribute
// =============================================================================

pub(crate) struct AttrBinding {
    el: Node,
    name: String,
    expr: Expr,
    last: RefCell<Option<Value>>,
}

impl AttrBinding {
    pub fn new(el: Node, name: &str, expr: Expr) -> Self {
        Self {
            el,
            name: name.to_string(),
            expr,
            last: RefCell::new(None),
        }
    }

    fn update(&self, scope: &Scope) {
        let Some(value) = eval(&self.expr, scope) else {
            return;
        };
        if self.last.borrow().as_ref() == Some(&value) {
            return;
        }
        match &value {
            Value::Null | Value::Bool(false) => self.el.remove_attribute(&self.name),
            other => self.el.set_attribute(&self.name, &render_text(other)),
        }
        *self.last.borrow_mut() = Some(value);
    }
}

// =============================================================================
// Form-control value property
// =============================================================================

pub(crate) struct ValueBinding {
    el: Node,
    expr: Expr,
}

impl ValueBinding {
    pub fn new(el: Node, expr: Expr) -> Self {
        Self { el, expr }
    }

    fn update(&self, scope: &Scope) {
        let Some(value) = eval(&self.expr, scope) else {
            return;
        };
        let rendered = render_text(&value);
        // the control's live value is the comparison baseline, not a cached
        // one: user input since the last pass must count as a difference
        if self.el.value() != rendered {
            self.el.set_value(&rendered);
        }
    }
}

// =============================================================================
// Event handler
// =============================================================================

pub(crate) struct EventBinding {
    el: Node,
    event: String,
    expr: EventExpr,
    bound: RefCell<Option<(EventHandler, ListenerHandle)>>,
}

impl EventBinding {
    pub fn new(el: Node, event: &str, expr: EventExpr) -> Self {
        Self {
            el,
            event: event.to_string(),
            expr,
            bound: RefCell::new(None),
        }
    }

    fn update(&self, owner: &Rc<Tag>, scope: &Scope) {
        let next = self.expr.eval(scope);

        let unchanged = match (&next, self.bound.borrow().as_ref()) {
            (Some(new), Some((old, _))) => Rc::ptr_eq(new, old),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }

        self.release();

        if let Some(handler) = next {
            let weak = Rc::downgrade(owner);
            let user = handler.clone();
            let listener: Rc<dyn Fn(&Event)> = Rc::new(move |ev| {
                if let Some(tag) = weak.upgrade() {
                    user(&tag, ev);
                    // handlers opt out of the automatic refresh by setting
                    // prevent_update before returning
                    tag.update(None);
                }
            });
            if let Some(handle) = self.el.add_listener(&self.event, listener) {
                *self.bound.borrow_mut() = Some((handler, handle));
            }
        }
    }

    pub fn release(&self) {
        if let Some((_, handle)) = self.bound.borrow_mut().take() {
            handle.release();
        }
    }
}

// =============================================================================
// Nested-tag option
// =============================================================================

pub(crate) struct TagOptBinding {
    child: Rc<Tag>,
    name: String,
    expr: Expr,
    last: RefCell<Option<Value>>,
}

impl TagOptBinding {
    pub fn new(child: Rc<Tag>, name: &str, expr: Expr) -> Self {
        Self {
            child,
            name: name.to_string(),
            expr,
            last: RefCell::new(None),
        }
    }

    fn update(&self, scope: &Scope) {
        let Some(value) = eval(&self.expr, scope) else {
            return;
        };
        if self.last.borrow().as_ref() == Some(&value) {
            return;
        }
        self.child.set_opt(&self.name, value.clone());
        *self.last.borrow_mut() = Some(value);
    }
}

// =============================================================================
// Conditional
// =============================================================================

/// Toggles a pre-built subtree in and out of the tree at a marker position.
pub(crate) struct IfBinding {
    anchor: Node,
    /// Off-tree holder for the body while the condition is false.
    holder: Node,
    nodes: Vec<Node>,
    cond: Expr,
    shown: RefCell<Option<bool>>,
}

impl IfBinding {
    pub fn new(anchor: Node, holder: Node, nodes: Vec<Node>, cond: Expr) -> Self {
        Self {
            anchor,
            holder,
            nodes,
            cond,
            shown: RefCell::new(None),
        }
    }

    fn update(&self, scope: &Scope) {
        let Some(value) = eval(&self.cond, scope) else {
            return;
        };
        let show = is_truthy(&value);
        if *self.shown.borrow() == Some(show) {
            return;
        }
        if show {
            if let Some(parent) = self.anchor.parent() {
                for node in &self.nodes {
                    parent.insert_before(node, Some(&self.anchor));
                }
            }
        } else {
            for node in &self.nodes {
                self.holder.append_child(node);
            }
        }
        *self.shown.borrow_mut() = Some(show);
    }
}
