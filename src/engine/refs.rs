//! Multiplicity-aware named registries.
//!
//! Both the ref registry (`refs`) and the nested-tag registry (`tags`) map a
//! name to either a single target or an ordered sequence of targets. The
//! representation promotes and demotes explicitly as membership crosses 1:
//!
//! - first registration under a name stores `One(target)`
//! - the second promotes to `Many([first, second])`
//! - unregistering back down to one member demotes to `One`
//! - unregistering the last member removes the name entirely
//!
//! Sequence order is document order. Loop reconciliation reorders children
//! without re-registering them, so it re-syncs slot order through
//! [`Registry::sync_order`].

use std::rc::Rc;

use indexmap::IndexMap;

use crate::dom::Node;

use super::tag::Tag;

/// Identity comparison for registry members (pointer identity, not value
/// equality).
pub trait Identity: Clone {
    fn same(&self, other: &Self) -> bool;
}

impl Identity for Node {
    fn same(&self, other: &Self) -> bool {
        self == other
    }
}

impl Identity for Rc<Tag> {
    fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

/// A ref resolves to either a plain element or a nested tag instance.
#[derive(Clone)]
pub enum RefTarget {
    Element(Node),
    Tag(Rc<Tag>),
}

impl RefTarget {
    pub fn as_element(&self) -> Option<&Node> {
        match self {
            Self::Element(n) => Some(n),
            Self::Tag(_) => None,
        }
    }

    pub fn as_tag(&self) -> Option<&Rc<Tag>> {
        match self {
            Self::Tag(t) => Some(t),
            Self::Element(_) => None,
        }
    }
}

impl Identity for RefTarget {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Element(a), Self::Element(b)) => a == b,
            (Self::Tag(a), Self::Tag(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Single target or ordered sequence, per name.
#[derive(Clone)]
pub enum Slot<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> Slot<T> {
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<T> {
        match self {
            Self::One(t) => vec![t.clone()],
            Self::Many(v) => v.clone(),
        }
    }
}

#[derive(Default)]
pub struct Registry<T: Identity> {
    map: IndexMap<String, Slot<T>>,
}

impl<T: Identity> Registry<T> {
    pub fn new() -> Self {
        Self {
            map: IndexMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, target: T) {
        match self.map.get_mut(name) {
            None => {
                self.map.insert(name.to_string(), Slot::One(target));
            }
            Some(slot) => match slot {
                Slot::One(existing) => {
                    *slot = Slot::Many(vec![existing.clone(), target]);
                }
                Slot::Many(v) => v.push(target),
            },
        }
    }

    pub fn unregister(&mut self, name: &str, target: &T) {
        let Some(slot) = self.map.get_mut(name) else {
            return;
        };
        match slot {
            Slot::One(existing) => {
                if existing.same(target) {
                    self.map.shift_remove(name);
                }
            }
            Slot::Many(v) => {
                v.retain(|t| !t.same(target));
                match v.len() {
                    0 => {
                        self.map.shift_remove(name);
                    }
                    1 => *slot = Slot::One(v[0].clone()),
                    _ => {}
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Slot<T>> {
        self.map.get(name)
    }

    /// Single target under a name, when exactly one is registered.
    pub fn get_one(&self, name: &str) -> Option<T> {
        match self.map.get(name)? {
            Slot::One(t) => Some(t.clone()),
            Slot::Many(_) => None,
        }
    }

    /// All targets under a name, in document order.
    pub fn get_all(&self, name: &str) -> Vec<T> {
        self.map.get(name).map(Slot::to_vec).unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Every registered target, flattened, in registration order.
    pub fn values(&self) -> Vec<T> {
        self.map.values().flat_map(Slot::to_vec).collect()
    }

    /// Re-sync the order of a slot's members that appear in `ordered` to the
    /// order given, leaving non-members where they are. Loop reconciliation
    /// calls this after moving children in the DOM.
    pub fn sync_order(&mut self, name: &str, ordered: &[T]) {
        let Some(Slot::Many(v)) = self.map.get_mut(name) else {
            return;
        };
        let mut replacement: Vec<T> = Vec::with_capacity(v.len());
        let mut queue: Vec<&T> = ordered
            .iter()
            .filter(|o| v.iter().any(|t| t.same(o)))
            .collect();
        queue.reverse();
        for t in v.iter() {
            if ordered.iter().any(|o| o.same(t)) {
                if let Some(next) = queue.pop() {
                    replacement.push(next.clone());
                }
            } else {
                replacement.push(t.clone());
            }
        }
        *v = replacement;
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Identity for u32 {
        fn same(&self, other: &Self) -> bool {
            self == other
        }
    }

    #[test]
    fn test_promote_demote() {
        let mut reg: Registry<u32> = Registry::new();
        reg.register("x", 1);
        assert!(matches!(reg.get("x"), Some(Slot::One(1))));

        reg.register("x", 2);
        assert!(matches!(reg.get("x"), Some(Slot::Many(_))));
        assert_eq!(reg.get_all("x"), vec![1, 2]);

        reg.unregister("x", &1);
        assert!(matches!(reg.get("x"), Some(Slot::One(2))));

        reg.unregister("x", &2);
        assert!(!reg.contains("x"));
    }

    #[test]
    fn test_unregister_missing_is_noop() {
        let mut reg: Registry<u32> = Registry::new();
        reg.register("x", 1);
        reg.unregister("x", &9);
        reg.unregister("y", &1);
        assert_eq!(reg.get_all("x"), vec![1]);
    }

    #[test]
    fn test_sync_order() {
        let mut reg: Registry<u32> = Registry::new();
        for n in [1, 2, 3] {
            reg.register("x", n);
        }
        reg.sync_order("x", &[3, 1, 2]);
        assert_eq!(reg.get_all("x"), vec![3, 1, 2]);

        // members not named keep their position
        reg.sync_order("x", &[2, 3]);
        assert_eq!(reg.get_all("x"), vec![2, 1, 3]);
    }
}
