//! Dynamic tag resolver - the `data-is` mechanism.
//!
//! An `IsBinding` re-evaluates a tag-name expression on every update. While
//! the name is stable the mounted instance stays; when it changes, the old
//! instance unmounts keeping the root node in place, the `data-is` attribute
//! is rewritten in lowercase, and a fresh instance of the newly named
//! factory mounts on the same node under the same registry key. A name that
//! matches no registered factory leaves the position empty.

use std::cell::RefCell;
use std::rc::Rc;

use crate::dom::{camel_case, Node};
use crate::error;
use crate::template::AttrTemplate;

use super::mount;
use super::scope::{render_text, Scope};
use super::tag::Tag;

pub(crate) struct IsBinding {
    el: Node,
    expr: crate::template::Expr,
    /// Remaining attribute templates on the host element; static and
    /// dynamic ones feed the mounted instance's opts.
    attrs: Vec<AttrTemplate>,
    /// Explicit ref name, when the host element is named. Keeps the
    /// registry key stable across type swaps.
    ref_name: Option<String>,
    current: RefCell<Option<Rc<Tag>>>,
}

impl IsBinding {
    pub fn new(
        el: Node,
        expr: crate::template::Expr,
        attrs: Vec<AttrTemplate>,
        ref_name: Option<String>,
    ) -> Self {
        Self {
            el,
            expr,
            attrs,
            ref_name,
            current: RefCell::new(None),
        }
    }

    pub fn current_child(&self) -> Option<Rc<Tag>> {
        self.current.borrow().clone()
    }

    pub fn update(&self, owner: &Rc<Tag>, scope: &Scope) {
        let name = match self.expr.eval(scope) {
            Ok(v) => render_text(&v).to_lowercase(),
            Err(e) => {
                error::report(&e);
                return;
            }
        };

        let current_name = self
            .current
            .borrow()
            .as_ref()
            .map(|t| t.name().to_string());

        if current_name.as_deref() == Some(&name) {
            // same type: keep the instance, just refresh dynamic opts; the
            // owner's nested walk updates the child itself
            if let Some(child) = self.current.borrow().as_ref() {
                self.apply_opts(child, scope);
            }
            return;
        }

        if let Some(old) = self.current.borrow_mut().take() {
            old.unmount(true);
        }

        if name.is_empty() {
            self.el.remove_attribute("data-is");
            return;
        }
        self.el.set_attribute("data-is", &name);

        let Some(template) = mount::lookup(&name) else {
            // unresolved target: zero instances, not an error
            return;
        };

        let key = self.ref_name.clone().unwrap_or_else(|| name.clone());
        let child = Tag::new_child_on_root(
            template,
            self.el.clone(),
            owner,
            &key,
            self.ref_name.is_some(),
        );
        self.apply_opts(&child, scope);
        if owner.is_mounted() {
            child.mount();
        } else {
            owner.defer_child_mount(child.clone());
        }
        *self.current.borrow_mut() = Some(child);
    }

    fn apply_opts(&self, child: &Rc<Tag>, scope: &Scope) {
        for attr in &self.attrs {
            match attr {
                AttrTemplate::Static { name, value } => {
                    child.set_opt(&camel_case(name), value.clone().into());
                }
                AttrTemplate::Dynamic { name, expr } => match expr.eval(scope) {
                    Ok(v) => child.set_opt(&camel_case(name), v),
                    Err(e) => error::report(&e),
                },
                _ => {}
            }
        }
    }
}
