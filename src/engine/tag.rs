//! Tag instance - one live component bound to a DOM position.
//!
//! Owns the instance's user-state, opts snapshot, binding list, nested-tag
//! and ref registries, and drives the lifecycle state machine:
//!
//! ```text
//! created -> mounting -> mounted -> unmounting -> unmounted
//! ```
//!
//! Transitions are monotonic; an unmounted instance is terminal. Lifecycle
//! ordering guarantees:
//! - on mount, every descendant finishes mounting (and is attached) before
//!   this instance's `mount` event fires
//! - on unmount, every descendant unmounts before this instance's root
//!   detaches
//!
//! Virtual instances have no root node of their own; they live between two
//! marker nodes borrowed from the surrounding DOM and always have a parent.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use serde_json::{Map, Value};

use crate::dom::{camel_case, Node};
use crate::template::style;
use crate::template::{AttrTemplate, ElementTemplate, Template, TemplateNode};

use super::binding::{
    AttrBinding, Binding, EventBinding, IfBinding, TagOptBinding, TextBinding, ValueBinding,
};
use super::each::EachBinding;
use super::events::Observable;
use super::is::IsBinding;
use super::mount;
use super::refs::{RefTarget, Registry};
use super::scope::walk_path;

#[derive(Clone, Copy, PartialEq, Debug)]
enum Phase {
    Created,
    Mounting,
    Mounted,
    Unmounting,
    Unmounted,
}

type ShouldUpdateFn = Rc<dyn Fn(&Rc<Tag>, &Option<Value>) -> bool>;

pub struct Tag {
    template: Rc<Template>,
    name: String,
    root: Option<Node>,
    /// Position anchors for virtual instances.
    anchors: Option<(Node, Node)>,
    opts: RefCell<Value>,
    state: RefCell<Value>,
    parent: RefCell<Weak<Tag>>,
    tags: RefCell<Registry<Rc<Tag>>>,
    refs: RefCell<Registry<RefTarget>>,
    bindings: RefCell<Vec<Rc<Binding>>>,
    observable: Observable<Rc<Tag>>,

    phase: Cell<Phase>,
    mounted_flag: Cell<bool>,
    prevent: Cell<bool>,
    should_update: RefCell<Option<ShouldUpdateFn>>,

    /// Children created while this instance was not yet attached; they mount
    /// after the instance's own DOM is in place.
    pending_children: RefCell<Vec<Rc<Tag>>>,

    /// Deferred-unmount bookkeeping.
    hold: Cell<bool>,
    pending_unmount: Cell<Option<bool>>,

    /// Loop items see the surrounding scope; regular nested tags do not.
    inherits: bool,
    /// Anonymous instances (plain-element loop items) route refs to the
    /// nearest named ancestor.
    anonymous: bool,
    loop_managed: Cell<bool>,

    /// Key under which this instance lives in its parent's registries.
    registry_key: RefCell<Option<String>>,
    has_ref_entry: Cell<bool>,
    /// Plain-element refs this instance registered on its ref owner.
    element_refs: RefCell<Vec<(String, Node)>>,

    /// Attribute templates to apply to the root element during build
    /// (anonymous loop items only).
    root_attrs: Vec<AttrTemplate>,
}

/// One-shot continuation for a deferred unmount. Created by
/// [`Tag::hold_unmount`] inside a `before-unmount` listener; unmounting
/// resumes when [`UnmountToken::release`] is called. A token that is never
/// released leaves the instance mounted permanently.
pub struct UnmountToken {
    tag: Weak<Tag>,
}

impl UnmountToken {
    pub fn release(&self) {
        if let Some(tag) = self.tag.upgrade() {
            tag.hold.set(false);
            if let Some(keep_root) = tag.pending_unmount.take() {
                tag.finish_unmount(keep_root);
            }
        }
    }
}

// =============================================================================
// Construction
// =============================================================================

impl Tag {
    #[allow(clippy::too_many_arguments)]
    fn new_internal(
        template: Rc<Template>,
        root: Option<Node>,
        anchors: Option<(Node, Node)>,
        opts: Value,
        parent: Option<&Rc<Tag>>,
        inherits: bool,
        anonymous: bool,
        root_attrs: Vec<AttrTemplate>,
    ) -> Rc<Self> {
        let name = template.name.clone();
        let tag = Rc::new(Self {
            template,
            name,
            root,
            anchors,
            opts: RefCell::new(ensure_object(opts)),
            state: RefCell::new(Value::Object(Map::new())),
            parent: RefCell::new(match parent {
                Some(p) => Rc::downgrade(p),
                None => Weak::new(),
            }),
            tags: RefCell::new(Registry::new()),
            refs: RefCell::new(Registry::new()),
            bindings: RefCell::new(Vec::new()),
            observable: Observable::new(),
            phase: Cell::new(Phase::Created),
            mounted_flag: Cell::new(false),
            prevent: Cell::new(false),
            should_update: RefCell::new(None),
            pending_children: RefCell::new(Vec::new()),
            hold: Cell::new(false),
            pending_unmount: Cell::new(None),
            inherits,
            anonymous,
            loop_managed: Cell::new(false),
            registry_key: RefCell::new(None),
            has_ref_entry: Cell::new(false),
            element_refs: RefCell::new(Vec::new()),
            root_attrs,
        });
        debug_assert!(
            tag.root.is_some() || tag.parent.borrow().upgrade().is_some(),
            "virtual instances always have a parent"
        );
        tag
    }

    /// Instance for a top-level mount: the root node already exists in the
    /// document. Its DOM attributes become opts defaults (camel-cased);
    /// literal opts win on conflict.
    pub(crate) fn new_top_level(template: Rc<Template>, root: Node, opts: Value) -> Rc<Self> {
        let mut merged = Map::new();
        for (name, value) in root.attributes() {
            merged.insert(camel_case(&name), Value::String(value));
        }
        if let Value::Object(literal) = ensure_object(opts) {
            for (k, v) in literal {
                merged.insert(k, v);
            }
        }
        Self::new_internal(
            template,
            Some(root),
            None,
            Value::Object(merged),
            None,
            false,
            false,
            Vec::new(),
        )
    }

    /// Nested instance mounted on an existing element (data-is swaps).
    pub(crate) fn new_child_on_root(
        template: Rc<Template>,
        root: Node,
        owner: &Rc<Tag>,
        key: &str,
        with_ref: bool,
    ) -> Rc<Self> {
        let child = Self::new_internal(
            template,
            Some(root),
            None,
            Value::Object(Map::new()),
            Some(owner),
            false,
            false,
            Vec::new(),
        );
        owner.adopt_child(key, &child, with_ref);
        child
    }

    /// Loop item for one collection entry: a nested custom tag when the body
    /// element names a registered template, else an anonymous instance whose
    /// root is the body element itself.
    pub(crate) fn new_loop_item(
        owner: &Rc<Tag>,
        body: &Rc<ElementTemplate>,
        parent_dom: &Node,
        before: &Node,
    ) -> Rc<Self> {
        let ref_name = ref_attr(&body.attrs);
        match mount::lookup(&body.tag) {
            Some(template) if template.is_virtual => {
                let start = Node::marker();
                let end = Node::marker();
                parent_dom.insert_before(&start, Some(before));
                parent_dom.insert_before(&end, Some(before));
                let child = Self::new_internal(
                    template,
                    None,
                    Some((start, end)),
                    Value::Object(Map::new()),
                    Some(owner),
                    true,
                    false,
                    Vec::new(),
                );
                let key = ref_name.clone().unwrap_or_else(|| body.tag.clone());
                owner.adopt_child(&key, &child, ref_name.is_some());
                child
            }
            Some(template) => {
                let root = Node::element(&body.tag);
                parent_dom.insert_before(&root, Some(before));
                let child = Self::new_internal(
                    template,
                    Some(root),
                    None,
                    Value::Object(Map::new()),
                    Some(owner),
                    true,
                    false,
                    Vec::new(),
                );
                let key = ref_name.clone().unwrap_or_else(|| body.tag.clone());
                owner.adopt_child(&key, &child, ref_name.is_some());
                child
            }
            None => {
                let root = Node::element(&body.tag);
                parent_dom.insert_before(&root, Some(before));
                let template =
                    Rc::new(Template::new(&body.tag, body.children.clone()));
                Self::new_internal(
                    template,
                    Some(root),
                    None,
                    Value::Object(Map::new()),
                    Some(owner),
                    true,
                    true,
                    body.attrs.clone(),
                )
            }
        }
    }
}

fn ensure_object(value: Value) -> Value {
    match value {
        Value::Object(_) => value,
        Value::Null => Value::Object(Map::new()),
        other => {
            log::warn!("opts must be an object, got {other}");
            Value::Object(Map::new())
        }
    }
}

fn ref_attr(attrs: &[AttrTemplate]) -> Option<String> {
    attrs.iter().find_map(|a| match a {
        AttrTemplate::Ref(name) => Some(name.clone()),
        _ => None,
    })
}

// =============================================================================
// Accessors
// =============================================================================

impl Tag {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> Option<Node> {
        self.root.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted_flag.get()
    }

    pub fn parent(&self) -> Option<Rc<Tag>> {
        self.parent.borrow().upgrade()
    }

    /// Opts snapshot (immutable by convention).
    pub fn opts(&self) -> Value {
        self.opts.borrow().clone()
    }

    /// One opts field by dot path, `Null` when absent.
    pub fn opt(&self, path: &str) -> Value {
        self.try_opt(path).unwrap_or(Value::Null)
    }

    /// One user-state field by dot path, `Null` when absent.
    pub fn get(&self, path: &str) -> Value {
        self.try_get(path).unwrap_or(Value::Null)
    }

    /// Set one user-state field. Takes effect on the next update pass.
    pub fn set(&self, key: &str, value: Value) {
        if let Value::Object(map) = &mut *self.state.borrow_mut() {
            map.insert(key.to_string(), value);
        }
    }

    pub(crate) fn try_get(&self, path: &str) -> Option<Value> {
        walk_path(&self.state.borrow(), path)
    }

    pub(crate) fn try_opt(&self, path: &str) -> Option<Value> {
        walk_path(&self.opts.borrow(), path)
    }

    pub(crate) fn set_opt(&self, key: &str, value: Value) {
        if let Value::Object(map) = &mut *self.opts.borrow_mut() {
            map.insert(key.to_string(), value);
        }
    }

    pub(crate) fn inherits_scope(&self) -> bool {
        self.inherits
    }

    pub(crate) fn is_custom(&self) -> bool {
        !self.anonymous
    }

    pub(crate) fn mark_loop_managed(&self) {
        self.loop_managed.set(true);
    }

    pub(crate) fn is_loop_managed(&self) -> bool {
        self.loop_managed.get()
    }

    pub(crate) fn registry_key(&self) -> Option<String> {
        self.registry_key.borrow().clone()
    }

    /// Nested tag instances registered under a name, in document order.
    pub fn tags_all(&self, name: &str) -> Vec<Rc<Tag>> {
        self.tags.borrow().get_all(name)
    }

    /// The single instance under a name; `None` when absent or plural.
    pub fn tags_one(&self, name: &str) -> Option<Rc<Tag>> {
        self.tags.borrow().get_one(name)
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.borrow().contains(name)
    }

    pub fn ref_all(&self, name: &str) -> Vec<RefTarget> {
        self.refs.borrow().get_all(name)
    }

    pub fn ref_one(&self, name: &str) -> Option<RefTarget> {
        self.refs.borrow().get_one(name)
    }

    pub fn has_ref(&self, name: &str) -> bool {
        self.refs.borrow().contains(name)
    }

    /// The nodes this instance occupies: its root, or for virtual instances
    /// everything from the start anchor to the end anchor inclusive.
    pub(crate) fn anchored_nodes(&self) -> Vec<Node> {
        if let Some(root) = &self.root {
            return vec![root.clone()];
        }
        let Some((start, end)) = &self.anchors else {
            return Vec::new();
        };
        let mut nodes = vec![start.clone()];
        let mut cur = start.clone();
        while cur != *end {
            match cur.next_sibling() {
                Some(next) => {
                    nodes.push(next.clone());
                    cur = next;
                }
                None => break,
            }
        }
        nodes
    }

    fn ref_owner(self: &Rc<Self>) -> Rc<Tag> {
        if self.anonymous {
            if let Some(parent) = self.parent() {
                return parent.ref_owner();
            }
        }
        self.clone()
    }

    pub(crate) fn adopt_child(self: &Rc<Self>, key: &str, child: &Rc<Tag>, with_ref: bool) {
        self.tags.borrow_mut().register(key, child.clone());
        *child.registry_key.borrow_mut() = Some(key.to_string());
        if with_ref {
            self.refs
                .borrow_mut()
                .register(key, RefTarget::Tag(child.clone()));
            child.has_ref_entry.set(true);
        }
    }

    pub(crate) fn defer_child_mount(&self, child: Rc<Tag>) {
        self.pending_children.borrow_mut().push(child);
    }

    pub(crate) fn sync_child_order(&self, name: &str, ordered: &[Rc<Tag>]) {
        self.tags.borrow_mut().sync_order(name, ordered);
    }
}

// =============================================================================
// Lifecycle events
// =============================================================================

impl Tag {
    /// Subscribe to a lifecycle event. Chainable.
    pub fn on(self: &Rc<Self>, event: &str, f: impl Fn(&Rc<Tag>) + 'static) -> &Rc<Self> {
        self.observable.on(event, Rc::new(f));
        self
    }

    /// Subscribe for one delivery. Chainable.
    pub fn one(self: &Rc<Self>, event: &str, f: impl Fn(&Rc<Tag>) + 'static) -> &Rc<Self> {
        self.observable.one(event, Rc::new(f));
        self
    }

    /// Drop every handler for an event. Chainable.
    pub fn off(self: &Rc<Self>, event: &str) -> &Rc<Self> {
        self.observable.off(event);
        self
    }

    /// Veto the next update pass on this instance. Consumed by that pass.
    pub fn prevent_update(&self) {
        self.prevent.set(true);
    }

    /// Install the predicate consulted at the start of every update pass.
    pub fn set_should_update(&self, f: impl Fn(&Rc<Tag>, &Option<Value>) -> bool + 'static) {
        *self.should_update.borrow_mut() = Some(Rc::new(f));
    }

    /// Pause the in-progress unmount. Only meaningful from a
    /// `before-unmount` listener.
    pub fn hold_unmount(self: &Rc<Self>) -> UnmountToken {
        self.hold.set(true);
        UnmountToken {
            tag: Rc::downgrade(self),
        }
    }
}

// =============================================================================
// Mount
// =============================================================================

impl Tag {
    /// Run the initializer, build bindings and children, apply every binding
    /// once, mount descendants, then fire `mount`. By the time `mount`
    /// listeners run, this instance and every descendant are attached.
    pub fn mount(self: &Rc<Self>) {
        if self.phase.get() != Phase::Created {
            return;
        }
        self.phase.set(Phase::Mounting);

        if let Some(css) = &self.template.css {
            style::inject(&self.name, css);
        }
        if let Some(init) = self.template.init.clone() {
            init(self);
        }
        self.observable.trigger(self, "before-mount");

        self.build();

        // initial apply pass; creates loop items and data-is children
        let bindings = self.bindings.borrow().clone();
        for binding in bindings {
            binding.update(self);
        }

        // descendants attach and mount before our own mount event
        loop {
            let pending = std::mem::take(&mut *self.pending_children.borrow_mut());
            if pending.is_empty() {
                break;
            }
            for child in pending {
                child.mount();
            }
        }

        self.phase.set(Phase::Mounted);
        self.mounted_flag.set(true);
        self.observable.trigger(self, "mount");
    }

    fn build(self: &Rc<Self>) {
        let body = self.template.body.clone();
        match (&self.root, &self.anchors) {
            (Some(root), _) => {
                if self.anonymous {
                    self.apply_root_attrs(root);
                }
                for node in &body {
                    self.build_node(node, root, None);
                }
            }
            (None, Some((start, end))) => {
                let parent_dom = start
                    .parent()
                    .expect("virtual anchors are inserted before build");
                for node in &body {
                    self.build_node(node, &parent_dom, Some(end));
                }
            }
            (None, None) => {}
        }
    }

    /// Anonymous loop items carry their body element's attributes; they bind
    /// on the root element in the loop scope.
    fn apply_root_attrs(self: &Rc<Self>, root: &Node) {
        for attr in &self.root_attrs.clone() {
            match attr {
                AttrTemplate::Static { name, value } => root.set_attribute(name, value),
                AttrTemplate::Dynamic { name, expr } => {
                    self.push_binding(Binding::Attr(AttrBinding::new(
                        root.clone(),
                        name,
                        expr.clone(),
                    )));
                }
                AttrTemplate::Value(expr) => {
                    self.push_binding(Binding::Value(ValueBinding::new(
                        root.clone(),
                        expr.clone(),
                    )));
                }
                AttrTemplate::Event { event, expr } => {
                    self.push_binding(Binding::Event(EventBinding::new(
                        root.clone(),
                        event,
                        expr.clone(),
                    )));
                }
                AttrTemplate::Ref(name) => self.register_element_ref(name, root),
                AttrTemplate::Is(_) => {}
            }
        }
    }

    fn push_binding(&self, binding: Binding) {
        self.bindings.borrow_mut().push(Rc::new(binding));
    }

    fn register_element_ref(self: &Rc<Self>, name: &str, el: &Node) {
        let owner = self.ref_owner();
        owner
            .refs
            .borrow_mut()
            .register(name, RefTarget::Element(el.clone()));
        self.element_refs
            .borrow_mut()
            .push((name.to_string(), el.clone()));
    }

    fn build_node(self: &Rc<Self>, tpl: &TemplateNode, parent_dom: &Node, before: Option<&Node>) {
        match tpl {
            TemplateNode::Text(content) => {
                parent_dom.insert_before(&Node::text(content), before);
            }
            TemplateNode::Expr(expr) => {
                let node = Node::text("");
                parent_dom.insert_before(&node, before);
                self.push_binding(Binding::Text(TextBinding::new(node, expr.clone())));
            }
            TemplateNode::If(tpl) => {
                let anchor = Node::marker();
                parent_dom.insert_before(&anchor, before);
                // the body lives in an off-tree holder while hidden
                let holder = Node::element("template");
                self.build_node(
                    &TemplateNode::Element((*tpl.body).clone()),
                    &holder,
                    None,
                );
                let nodes = holder.children();
                self.push_binding(Binding::If(IfBinding::new(
                    anchor,
                    holder,
                    nodes,
                    tpl.cond.clone(),
                )));
            }
            TemplateNode::Each(tpl) => {
                let start = Node::marker();
                let end = Node::marker();
                parent_dom.insert_before(&start, before);
                parent_dom.insert_before(&end, before);
                self.push_binding(Binding::Each(EachBinding::new(tpl.clone(), start, end)));
            }
            TemplateNode::Element(el_tpl) => self.build_element(el_tpl, parent_dom, before),
        }
    }

    fn build_element(
        self: &Rc<Self>,
        el_tpl: &ElementTemplate,
        parent_dom: &Node,
        before: Option<&Node>,
    ) {
        let ref_name = ref_attr(&el_tpl.attrs);
        let is_expr = el_tpl.attrs.iter().find_map(|a| match a {
            AttrTemplate::Is(expr) => Some(expr.clone()),
            _ => None,
        });

        // dynamic tag position
        if let Some(expr) = is_expr {
            let el = Node::element(&el_tpl.tag);
            parent_dom.insert_before(&el, before);
            for attr in &el_tpl.attrs {
                if let AttrTemplate::Static { name, value } = attr {
                    el.set_attribute(name, value);
                }
            }
            let rest: Vec<AttrTemplate> = el_tpl
                .attrs
                .iter()
                .filter(|a| !matches!(a, AttrTemplate::Is(_)))
                .cloned()
                .collect();
            self.push_binding(Binding::Is(IsBinding::new(el, expr, rest, ref_name)));
            return;
        }

        // nested custom tag
        if let Some(template) = mount::lookup(&el_tpl.tag) {
            let child = if template.is_virtual {
                let start = Node::marker();
                let end = Node::marker();
                parent_dom.insert_before(&start, before);
                parent_dom.insert_before(&end, before);
                Tag::new_internal(
                    template,
                    None,
                    Some((start, end)),
                    Value::Object(Map::new()),
                    Some(self),
                    false,
                    false,
                    Vec::new(),
                )
            } else {
                let root = Node::element(&el_tpl.tag);
                parent_dom.insert_before(&root, before);
                Tag::new_internal(
                    template,
                    Some(root),
                    None,
                    Value::Object(Map::new()),
                    Some(self),
                    false,
                    false,
                    Vec::new(),
                )
            };
            let key = ref_name.clone().unwrap_or_else(|| el_tpl.tag.clone());
            self.adopt_child(&key, &child, ref_name.is_some());
            for attr in &el_tpl.attrs {
                match attr {
                    AttrTemplate::Static { name, value } => {
                        if let Some(root) = &child.root {
                            root.set_attribute(name, value);
                        }
                        child.set_opt(&camel_case(name), Value::String(value.clone()));
                    }
                    AttrTemplate::Dynamic { name, expr } => {
                        self.push_binding(Binding::TagOpt(TagOptBinding::new(
                            child.clone(),
                            &camel_case(name),
                            expr.clone(),
                        )));
                    }
                    _ => {}
                }
            }
            self.defer_child_mount(child);
            return;
        }

        // plain element
        let el = Node::element(&el_tpl.tag);
        parent_dom.insert_before(&el, before);
        for attr in &el_tpl.attrs {
            match attr {
                AttrTemplate::Static { name, value } => el.set_attribute(name, value),
                AttrTemplate::Dynamic { name, expr } => {
                    self.push_binding(Binding::Attr(AttrBinding::new(
                        el.clone(),
                        name,
                        expr.clone(),
                    )));
                }
                AttrTemplate::Value(expr) => {
                    self.push_binding(Binding::Value(ValueBinding::new(el.clone(), expr.clone())));
                }
                AttrTemplate::Event { event, expr } => {
                    self.push_binding(Binding::Event(EventBinding::new(
                        el.clone(),
                        event,
                        expr.clone(),
                    )));
                }
                AttrTemplate::Ref(name) => self.register_element_ref(name, &el),
                AttrTemplate::Is(_) => {}
            }
        }
        for child in &el_tpl.children {
            self.build_node(child, &el, None);
        }
    }
}

// =============================================================================
// Update
// =============================================================================

impl Tag {
    /// Re-evaluate every binding and recurse into nested instances. A no-op
    /// when unmounted, vetoed by `should_update`, or flagged by
    /// `prevent_update` (checked at entry and again after `update` listeners
    /// run, so a listener can veto the pass).
    pub fn update(self: &Rc<Self>, data: Option<Value>) {
        if !self.is_mounted() {
            return;
        }
        if self.prevent.take() {
            return;
        }

        // incoming data lands in the state even when the pass is vetoed;
        // the veto only skips the patch and its events
        if let Some(Value::Object(incoming)) = &data {
            if let Value::Object(state) = &mut *self.state.borrow_mut() {
                for (k, v) in incoming {
                    state.insert(k.clone(), v.clone());
                }
            }
        }

        let predicate = self.should_update.borrow().clone();
        if let Some(pred) = predicate {
            if !pred(self, &data) {
                return;
            }
        }

        self.observable.trigger(self, "update");
        if self.prevent.take() {
            return;
        }

        let bindings = self.bindings.borrow().clone();
        for binding in bindings {
            binding.update(self);
        }

        // nested instances decide independently; loop items were already
        // updated by their reconciler during the binding pass
        let children = self.tags.borrow().values();
        for child in children {
            if !child.is_loop_managed() {
                child.update(None);
            }
        }

        self.observable.trigger(self, "updated");
    }
}

// =============================================================================
// Unmount
// =============================================================================

impl Tag {
    /// Tear the instance down: `before-unmount`, children depth-first, DOM
    /// detach (unless `keep_root`), registry cleanup, `unmount`. Calling
    /// this on an already-unmounted instance, or again while a held unmount
    /// is pending, is a no-op.
    pub fn unmount(self: &Rc<Self>, keep_root: bool) {
        if self.phase.get() != Phase::Mounted {
            return;
        }
        // an unmount is already in flight, held by a token
        if self.pending_unmount.get().is_some() {
            return;
        }
        self.observable.trigger(self, "before-unmount");
        if self.hold.get() {
            self.pending_unmount.set(Some(keep_root));
            return;
        }
        self.finish_unmount(keep_root);
    }

    fn finish_unmount(self: &Rc<Self>, keep_root: bool) {
        if self.phase.get() != Phase::Mounted {
            return;
        }
        self.phase.set(Phase::Unmounting);

        // children fully unmount before this instance detaches
        let mut children = self.tags.borrow().values();
        let bindings = self.bindings.borrow().clone();
        for binding in &bindings {
            for child in binding.child_tags() {
                if !children.iter().any(|c| Rc::ptr_eq(c, &child)) {
                    children.push(child);
                }
            }
        }
        for child in children {
            child.unmount(false);
        }

        for binding in &bindings {
            binding.teardown();
        }
        self.bindings.borrow_mut().clear();

        match (&self.root, &self.anchors) {
            (Some(root), _) => {
                if keep_root {
                    root.clear_children();
                } else {
                    root.remove();
                }
            }
            (None, Some(_)) => {
                for node in self.anchored_nodes() {
                    node.remove();
                }
            }
            (None, None) => {}
        }

        if let Some(parent) = self.parent() {
            if let Some(key) = self.registry_key.borrow().clone() {
                parent.tags.borrow_mut().unregister(&key, self);
                if self.has_ref_entry.get() {
                    parent
                        .refs
                        .borrow_mut()
                        .unregister(&key, &RefTarget::Tag(self.clone()));
                }
            }
            let owner = self.ref_owner();
            for (name, el) in self.element_refs.borrow_mut().drain(..) {
                owner
                    .refs
                    .borrow_mut()
                    .unregister(&name, &RefTarget::Element(el));
            }
        }
        self.tags.borrow_mut().clear();
        self.refs.borrow_mut().clear();

        mount::remove_live(self);

        self.observable.trigger(self, "unmount");
        self.mounted_flag.set(false);
        self.phase.set(Phase::Unmounted);
    }
}

impl std::fmt::Debug for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tag")
            .field("name", &self.name)
            .field("phase", &self.phase.get())
            .field("is_mounted", &self.is_mounted())
            .finish_non_exhaustive()
    }
}
