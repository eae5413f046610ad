//! External state containers.
//!
//! The synchronization layer talks to application state only through
//! [`ExternalGraphStore`]: read a snapshot, subscribe to changes, and
//! replace the state through an updater.

mod crdt;
mod memory;

pub use crdt::{CrdtStore, decode_update, encode_update};
pub use memory::MemoryStore;

use crate::error::SyncResult;
use crate::model::{GraphElement, GraphLink};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// The records held by application state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub elements: Vec<GraphElement>,
    #[serde(default)]
    pub links: Vec<GraphLink>,
}

impl GraphSnapshot {
    pub fn element(&self, id: &str) -> Option<&GraphElement> {
        self.elements.iter().find(|element| element.id == id)
    }

    pub fn link(&self, id: &str) -> Option<&GraphLink> {
        self.links.iter().find(|link| link.id == id)
    }

    /// Replace the element with the same id, or append it.
    pub fn upsert_element(&mut self, element: GraphElement) {
        match self.elements.iter_mut().find(|e| e.id == element.id) {
            Some(existing) => *existing = element,
            None => self.elements.push(element),
        }
    }

    /// Replace the link with the same id, or append it.
    pub fn upsert_link(&mut self, link: GraphLink) {
        match self.links.iter_mut().find(|l| l.id == link.id) {
            Some(existing) => *existing = link,
            None => self.links.push(link),
        }
    }

    /// Remove the record with this id. Returns whether one was found.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.elements.len() + self.links.len();
        self.elements.retain(|element| element.id != id);
        self.links.retain(|link| link.id != id);
        self.elements.len() + self.links.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.links.is_empty()
    }
}

/// Called after the store's state changed.
pub type StoreListener = Rc<dyn Fn()>;

/// Removes the listener it was returned for.
pub type Unsubscribe = Box<dyn FnOnce()>;

/// Computes the next state from the current one.
pub type StateUpdater = Box<dyn FnOnce(&GraphSnapshot) -> GraphSnapshot>;

/// Contract of any state container that drives a graph.
pub trait ExternalGraphStore {
    /// The current state. Cheap to call repeatedly.
    fn get_snapshot(&self) -> Rc<GraphSnapshot>;

    /// Register a change listener.
    fn subscribe(&self, listener: StoreListener) -> Unsubscribe;

    /// Replace the state with `updater(current)`.
    ///
    /// Listeners are notified only when the state actually changed.
    fn set_state(&self, updater: StateUpdater) -> SyncResult<()>;
}

/// Listener registry shared by the store implementations.
#[derive(Default)]
pub(crate) struct ListenerSet {
    next: Cell<u64>,
    entries: RefCell<Vec<(u64, StoreListener)>>,
}

impl ListenerSet {
    pub(crate) fn add(self: &Rc<Self>, listener: StoreListener) -> Unsubscribe {
        let id = self.next.get();
        self.next.set(id + 1);
        self.entries.borrow_mut().push((id, listener));

        let set = Rc::downgrade(self);
        Box::new(move || {
            if let Some(set) = set.upgrade() {
                set.entries.borrow_mut().retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Call every listener registered at the time of the call.
    pub(crate) fn notify(&self) {
        let current: Vec<StoreListener> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in current {
            listener();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}
