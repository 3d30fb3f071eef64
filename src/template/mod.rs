//! Template model - the expression tree handed over by the template compiler.
//!
//! Markup parsing is not this crate's job: a compiler turns markup plus the
//! current [`brackets`] delimiters into the typed tree below, and the engine
//! consumes the tree. The types here are therefore the contract between the
//! two sides:
//!
//! - [`TemplateNode`] / [`ElementTemplate`] - static structure
//! - [`Expr`] / [`EventExpr`] - compiled expressions, evaluated against a
//!   tag instance's [`Scope`](crate::engine::Scope)
//! - [`Template`] - a registered factory: body, css, initializer
//!
//! Expressions are plain evaluation functions. The common dot-path case has
//! a shorthand:
//!
//! ```ignore
//! use tagtree::template::{el, expr, Expr, Template};
//!
//! let greet = Template::new(
//!     "greet",
//!     vec![el("p").child(expr(Expr::path("opts.val"))).into()],
//! );
//! ```

pub mod brackets;
pub mod style;

use std::rc::Rc;

use serde_json::Value;

use crate::dom::Event;
use crate::engine::{Scope, Tag};
use crate::error::EvalError;

pub use brackets::{brackets, reset_brackets, set_brackets};

/// Initializer callback run when an instance of the template mounts.
pub type InitFn = Rc<dyn Fn(&Rc<Tag>)>;

/// A user event handler. Receives the owning tag instance and the event.
pub type EventHandler = Rc<dyn Fn(&Rc<Tag>, &Event)>;

// =============================================================================
// Expressions
// =============================================================================

/// One compiled expression. Evaluated against the owning instance's scope;
/// cloning shares the underlying function.
#[derive(Clone)]
pub struct Expr(Rc<dyn Fn(&Scope) -> Result<Value, EvalError>>);

impl Expr {
    pub fn new(f: impl Fn(&Scope) -> Result<Value, EvalError> + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Dot-path lookup (`opts.val`, `item.title`). Missing paths resolve to
    /// `Null`, never to an error.
    pub fn path(path: &str) -> Self {
        let path = path.to_string();
        Self::new(move |scope| Ok(scope.get(&path)))
    }

    /// A constant value.
    pub fn value(value: Value) -> Self {
        Self::new(move |_| Ok(value.clone()))
    }

    pub fn eval(&self, scope: &Scope) -> Result<Value, EvalError> {
        (self.0)(scope)
    }
}

impl std::fmt::Debug for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Expr")
    }
}

/// An event-handler expression. Re-evaluated on every update so templates
/// can swap handlers at runtime; handlers compare by pointer identity.
#[derive(Clone)]
pub struct EventExpr(Rc<dyn Fn(&Scope) -> Option<EventHandler>>);

impl EventExpr {
    pub fn new(f: impl Fn(&Scope) -> Option<EventHandler> + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// A fixed handler.
    pub fn handler(f: impl Fn(&Rc<Tag>, &Event) + 'static) -> Self {
        let handler: EventHandler = Rc::new(f);
        Self::new(move |_| Some(handler.clone()))
    }

    pub fn eval(&self, scope: &Scope) -> Option<EventHandler> {
        (self.0)(scope)
    }
}

impl std::fmt::Debug for EventExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EventExpr")
    }
}

/// Identity key for one loop item, computed from the raw item value.
#[derive(Clone)]
pub struct KeyExpr(Rc<dyn Fn(&Value) -> Value>);

impl KeyExpr {
    pub fn new(f: impl Fn(&Value) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Key by a field of the item (`id`, `user.id`).
    pub fn path(path: &str) -> Self {
        let path = path.to_string();
        Self::new(move |item| {
            crate::engine::scope::walk_path(item, &path).unwrap_or(Value::Null)
        })
    }

    pub fn eval(&self, item: &Value) -> Value {
        (self.0)(item)
    }
}

impl std::fmt::Debug for KeyExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyExpr")
    }
}

// =============================================================================
// Tree nodes
// =============================================================================

/// One attribute slot on a template element.
#[derive(Clone, Debug)]
pub enum AttrTemplate {
    /// Plain attribute copied to the DOM as-is.
    Static { name: String, value: String },
    /// Attribute whose value is re-evaluated on every update.
    Dynamic { name: String, expr: Expr },
    /// Form-control value property binding (cursor-preserving).
    Value(Expr),
    /// Event listener binding.
    Event { event: String, expr: EventExpr },
    /// Named reference to this element (or to the tag mounted on it).
    Ref(String),
    /// Dynamic tag type (`data-is`).
    Is(Expr),
}

#[derive(Clone, Debug)]
pub struct ElementTemplate {
    pub tag: String,
    pub attrs: Vec<AttrTemplate>,
    pub children: Vec<TemplateNode>,
}

impl ElementTemplate {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push(AttrTemplate::Static {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn attr_expr(mut self, name: &str, expr: Expr) -> Self {
        self.attrs.push(AttrTemplate::Dynamic {
            name: name.to_string(),
            expr,
        });
        self
    }

    pub fn value_expr(mut self, expr: Expr) -> Self {
        self.attrs.push(AttrTemplate::Value(expr));
        self
    }

    pub fn on(mut self, event: &str, expr: EventExpr) -> Self {
        self.attrs.push(AttrTemplate::Event {
            event: event.to_string(),
            expr,
        });
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.attrs.push(AttrTemplate::Ref(name.to_string()));
        self
    }

    pub fn is_expr(mut self, expr: Expr) -> Self {
        self.attrs.push(AttrTemplate::Is(expr));
        self
    }

    pub fn child(mut self, node: TemplateNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn children(mut self, nodes: Vec<TemplateNode>) -> Self {
        self.children.extend(nodes);
        self
    }
}

impl From<ElementTemplate> for TemplateNode {
    fn from(el: ElementTemplate) -> Self {
        TemplateNode::Element(el)
    }
}

/// Loop directive: one child instance per collection item.
#[derive(Clone, Debug)]
pub struct EachTemplate {
    /// Collection expression; `Null` renders as empty.
    pub expr: Expr,
    /// Loop variable name for the item value.
    pub item: String,
    /// Optional loop variable name for the positional index.
    pub index: Option<String>,
    /// Optional identity key, computed from the item value. Absent means
    /// positional keying.
    pub key: Option<KeyExpr>,
    /// Element stamped out per item.
    pub body: Rc<ElementTemplate>,
}

/// Conditional directive: body is present in the tree only while the
/// condition holds.
#[derive(Clone, Debug)]
pub struct IfTemplate {
    pub cond: Expr,
    pub body: Rc<ElementTemplate>,
}

#[derive(Clone, Debug)]
pub enum TemplateNode {
    Element(ElementTemplate),
    Text(String),
    /// A text slot whose content is an expression.
    Expr(Expr),
    Each(EachTemplate),
    If(IfTemplate),
}

/// Shorthand constructors used by compilers and tests.
pub fn el(tag: &str) -> ElementTemplate {
    ElementTemplate::new(tag)
}

pub fn text(content: &str) -> TemplateNode {
    TemplateNode::Text(content.to_string())
}

pub fn expr(e: Expr) -> TemplateNode {
    TemplateNode::Expr(e)
}

pub fn each(
    expr: Expr,
    item: &str,
    key: Option<KeyExpr>,
    body: ElementTemplate,
) -> TemplateNode {
    TemplateNode::Each(EachTemplate {
        expr,
        item: item.to_string(),
        index: Some("i".to_string()),
        key,
        body: Rc::new(body),
    })
}

pub fn when(cond: Expr, body: ElementTemplate) -> TemplateNode {
    TemplateNode::If(IfTemplate {
        cond,
        body: Rc::new(body),
    })
}

// =============================================================================
// Template factory
// =============================================================================

/// A registered template: the markup's expression tree plus an optional css
/// rule set and initializer. Immutable after registration.
#[derive(Clone)]
pub struct Template {
    pub name: String,
    pub body: Vec<TemplateNode>,
    pub css: Option<String>,
    pub init: Option<InitFn>,
    /// Virtual templates produce root-less instances anchored by markers.
    pub is_virtual: bool,
}

impl Template {
    pub fn new(name: &str, body: Vec<TemplateNode>) -> Self {
        Self {
            name: name.to_lowercase(),
            body,
            css: None,
            init: None,
            is_virtual: false,
        }
    }

    pub fn css(mut self, css: &str) -> Self {
        self.css = Some(css.to_string());
        self
    }

    pub fn init(mut self, f: impl Fn(&Rc<Tag>) + 'static) -> Self {
        self.init = Some(Rc::new(f));
        self
    }

    pub fn virtual_root(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    /// Derive a new factory from this one: same body, css and initializer
    /// under a new name, each overridable through the usual builder calls.
    /// "Subclassing" a tag is composing factories this way.
    pub fn extend(&self, name: &str) -> Self {
        let mut derived = self.clone();
        derived.name = name.to_lowercase();
        derived
    }
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("css", &self.css)
            .field("is_virtual", &self.is_virtual)
            .finish_non_exhaustive()
    }
}
