//! In-memory store.

use super::{
    ExternalGraphStore, GraphSnapshot, ListenerSet, StateUpdater, StoreListener, Unsubscribe,
};
use crate::error::SyncResult;
use std::cell::RefCell;
use std::rc::Rc;

/// Plain in-memory state container, for tests and ephemeral use.
#[derive(Default)]
pub struct MemoryStore {
    state: RefCell<Rc<GraphSnapshot>>,
    listeners: Rc<ListenerSet>,
}

impl MemoryStore {
    pub fn new(initial: GraphSnapshot) -> Self {
        Self {
            state: RefCell::new(Rc::new(initial)),
            listeners: Rc::new(ListenerSet::default()),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl ExternalGraphStore for MemoryStore {
    fn get_snapshot(&self) -> Rc<GraphSnapshot> {
        Rc::clone(&self.state.borrow())
    }

    fn subscribe(&self, listener: StoreListener) -> Unsubscribe {
        self.listeners.add(listener)
    }

    fn set_state(&self, updater: StateUpdater) -> SyncResult<()> {
        let current = self.get_snapshot();
        let next = updater(&current);
        if next == *current {
            return Ok(());
        }
        *self.state.borrow_mut() = Rc::new(next);
        self.listeners.notify();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GraphElement;
    use std::cell::Cell;

    fn counting(store: &MemoryStore) -> (Rc<Cell<usize>>, Unsubscribe) {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let unsubscribe = store.subscribe(Rc::new(move || counter.set(counter.get() + 1)));
        (calls, unsubscribe)
    }

    #[test]
    fn test_set_state_notifies() {
        let store = MemoryStore::default();
        let (calls, _unsubscribe) = counting(&store);

        store
            .set_state(Box::new(|state| {
                let mut next = state.clone();
                next.upsert_element(GraphElement::new("a"));
                next
            }))
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert!(store.get_snapshot().element("a").is_some());
    }

    #[test]
    fn test_unchanged_state_is_silent() {
        let store = MemoryStore::new(GraphSnapshot {
            elements: vec![GraphElement::new("a")],
            links: Vec::new(),
        });
        let (calls, _unsubscribe) = counting(&store);
        let before = store.get_snapshot();

        store.set_state(Box::new(|state| state.clone())).unwrap();

        assert_eq!(calls.get(), 0);
        assert!(Rc::ptr_eq(&before, &store.get_snapshot()));
    }

    #[test]
    fn test_unsubscribe() {
        let store = MemoryStore::default();
        let (calls, unsubscribe) = counting(&store);
        unsubscribe();
        assert_eq!(store.listener_count(), 0);

        store
            .set_state(Box::new(|_| GraphSnapshot {
                elements: vec![GraphElement::new("a")],
                links: Vec::new(),
            }))
            .unwrap();
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_listener_may_read_state() {
        let store = Rc::new(MemoryStore::default());
        let seen = Rc::new(Cell::new(0));

        let reader = Rc::downgrade(&store);
        let sink = Rc::clone(&seen);
        let _unsubscribe = store.subscribe(Rc::new(move || {
            if let Some(store) = reader.upgrade() {
                sink.set(store.get_snapshot().elements.len());
            }
        }));

        store
            .set_state(Box::new(|_| GraphSnapshot {
                elements: vec![GraphElement::new("a"), GraphElement::new("b")],
                links: Vec::new(),
            }))
            .unwrap();
        assert_eq!(seen.get(), 2);
    }
}
