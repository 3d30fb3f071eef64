//! Loop reconciler - keyed child-instance management for collections.
//!
//! One `EachBinding` owns the region between a start and end marker and
//! keeps an ordered set of child tag instances mirroring the collection
//! expression. On every update:
//!
//! - items are matched to previous instances by key (explicit key
//!   expression, else positional index)
//! - matched instances are reused: loop variables are rewritten, the DOM is
//!   moved into position when needed, then the instance updates itself
//! - unmatched new items create fresh instances
//! - previous instances whose key disappeared unmount
//!
//! Index keying means a reorder rebinds data positionally: instances stay
//! where they are and every one of them sees new data. Stable identity
//! across reorders requires an explicit key.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::dom::Node;
use crate::error;
use crate::template::EachTemplate;

use super::mount;
use super::scope::Scope;
use super::tag::Tag;

#[derive(Clone, Debug, PartialEq)]
enum ItemKey {
    Index(usize),
    Value(Value),
}

struct EachItem {
    key: ItemKey,
    tag: Rc<Tag>,
}

pub(crate) struct EachBinding {
    tpl: EachTemplate,
    start: Node,
    end: Node,
    items: RefCell<Vec<EachItem>>,
}

impl EachBinding {
    pub fn new(tpl: EachTemplate, start: Node, end: Node) -> Self {
        Self {
            tpl,
            start,
            end,
            items: RefCell::new(Vec::new()),
        }
    }

    pub fn children(&self) -> Vec<Rc<Tag>> {
        self.items.borrow().iter().map(|i| i.tag.clone()).collect()
    }

    pub fn update(&self, owner: &Rc<Tag>, scope: &Scope) {
        let collection = match self.tpl.expr.eval(scope) {
            Ok(v) => v,
            Err(e) => {
                error::report(&e);
                return;
            }
        };
        let data: Vec<Value> = match collection {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                log::warn!("each expression evaluated to a non-collection: {other}");
                Vec::new()
            }
        };

        let old = std::mem::take(&mut *self.items.borrow_mut());
        let mut used = vec![false; old.len()];
        let mut next: Vec<EachItem> = Vec::with_capacity(data.len());
        let mut duplicate_keys = false;

        for (i, item) in data.iter().enumerate() {
            let key = match &self.tpl.key {
                Some(k) => ItemKey::Value(k.eval(item)),
                None => ItemKey::Index(i),
            };
            if next.iter().any(|n| n.key == key) {
                duplicate_keys = true;
            }

            let matched = old
                .iter()
                .enumerate()
                .find(|(j, it)| !used[*j] && it.key == key)
                .map(|(j, _)| j);

            let tag = match matched {
                Some(j) => {
                    used[j] = true;
                    old[j].tag.clone()
                }
                None => self.create_item(owner),
            };

            // loop variables are rewritten before the instance updates
            tag.set(&self.tpl.item, item.clone());
            if let Some(index_name) = &self.tpl.index {
                tag.set(index_name, Value::from(i));
            }
            self.apply_item_opts(&tag, item, matched.is_none());

            if matched.is_some() {
                tag.update(None);
            } else if owner.is_mounted() {
                tag.mount();
            } else {
                owner.defer_child_mount(tag.clone());
            }

            next.push(EachItem { key, tag });
        }

        if duplicate_keys {
            log::warn!(
                "duplicate loop keys under <{}>; identity may not be preserved",
                owner.name()
            );
        }

        // leftovers unmount before the order pass so their nodes are gone
        for (j, it) in old.iter().enumerate() {
            if !used[j] {
                it.tag.unmount(false);
            }
        }

        self.restore_order(&next);
        self.sync_registry(owner, &next);

        *self.items.borrow_mut() = next;
    }

    /// Evaluate the body element's dynamic attributes into the child's opts.
    /// Created items also receive the static attributes once.
    fn apply_item_opts(&self, child: &Rc<Tag>, _item: &Value, created: bool) {
        use crate::template::AttrTemplate;
        let scope = Scope::new(child.clone());
        for attr in &self.tpl.body.attrs {
            match attr {
                AttrTemplate::Static { name, value } if created && child.is_custom() => {
                    child.set_opt(&crate::dom::camel_case(name), Value::from(value.clone()));
                }
                AttrTemplate::Dynamic { name, expr } if child.is_custom() => {
                    match expr.eval(&scope) {
                        Ok(v) => child.set_opt(&crate::dom::camel_case(name), v),
                        Err(e) => error::report(&e),
                    }
                }
                _ => {}
            }
        }
    }

    fn create_item(&self, owner: &Rc<Tag>) -> Rc<Tag> {
        let parent_dom = self
            .end
            .parent()
            .expect("loop markers are always attached");
        let child = Tag::new_loop_item(owner, &self.tpl.body, &parent_dom, &self.end);
        child.mark_loop_managed();
        child
    }

    /// Move each child's nodes into collection order, minimally: a node is
    /// only re-inserted when it is not already in position.
    fn restore_order(&self, items: &[EachItem]) {
        let Some(parent) = self.end.parent() else {
            return;
        };
        let mut cursor = self.start.clone();
        for item in items {
            for node in item.tag.anchored_nodes() {
                if cursor.next_sibling().as_ref() != Some(&node) {
                    let reference = cursor.next_sibling();
                    parent.insert_before(&node, reference.as_ref());
                }
                cursor = node;
            }
        }
    }

    /// Keep the owner's nested-tag registry slot in collection order for
    /// custom-tag loops; reorders happen without re-registering.
    fn sync_registry(&self, owner: &Rc<Tag>, items: &[EachItem]) {
        if mount::lookup(&self.tpl.body.tag).is_none() {
            return;
        }
        let ordered: Vec<Rc<Tag>> = items.iter().map(|i| i.tag.clone()).collect();
        if let Some(first) = ordered.first() {
            if let Some(name) = first.registry_key() {
                owner.sync_child_order(&name, &ordered);
            }
        }
    }
}
