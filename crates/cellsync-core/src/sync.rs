//! Two-way binding between a [`GraphStore`] and an external state container.
//!
//! Store changes are mapped forward into cells; graph changes are mapped in
//! reverse into records and written back with a single `set_state` per
//! change event. Two flags break the feedback loop: while the graph is being
//! updated from the store, graph events are not written back, and while the
//! store is being updated from the graph, store events are not forwarded.

use crate::error::{SyncError, SyncResult};
use crate::graph::{GraphChange, GraphStore, ListenerId};
use crate::mapper::Mappers;
use crate::store::{ExternalGraphStore, Unsubscribe};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// State shared by both listeners of a binding.
struct SyncState {
    mappers: Mappers,
    syncing_from_state: Cell<bool>,
    updating_state_from_graph: Cell<bool>,
    last_error: RefCell<Option<SyncError>>,
}

impl SyncState {
    /// Map the store's snapshot into the graph.
    fn forward(
        &self,
        graph: &RefCell<GraphStore>,
        store: &dyn ExternalGraphStore,
    ) -> SyncResult<()> {
        if self.updating_state_from_graph.get() {
            return Ok(());
        }
        let snapshot = store.get_snapshot();
        let cells = self.mappers.forward_snapshot(&snapshot)?;

        let Ok(mut graph) = graph.try_borrow_mut() else {
            log::warn!("Graph is busy, skipping forward sync");
            return Ok(());
        };
        if graph.cells().eq(cells.iter()) {
            return Ok(());
        }

        log::debug!(
            "Forward sync: {} elements, {} links",
            snapshot.elements.len(),
            snapshot.links.len()
        );
        self.syncing_from_state.set(true);
        let result = graph.sync_cells(cells);
        self.syncing_from_state.set(false);
        result
    }

    /// Map one graph change back into the store.
    ///
    /// Only the records named by the change are rewritten. Records the graph
    /// does not hold (written to the store by someone else) are left alone.
    fn write_back(
        &self,
        change: &GraphChange,
        graph: &GraphStore,
        store: &dyn ExternalGraphStore,
    ) -> SyncResult<()> {
        if self.syncing_from_state.get() {
            return Ok(());
        }
        let mut removed = change.removed.clone();
        let mut changed = Vec::with_capacity(change.changed.len());
        for id in &change.changed {
            match graph.get(id) {
                Some(cell) => changed.push(cell),
                None => removed.push(id.clone()),
            }
        }

        self.updating_state_from_graph.set(true);
        let result = self
            .mappers
            .apply_change(changed, &removed, graph.defaults(), &store.get_snapshot())
            .and_then(|next| store.set_state(Box::new(move |_| next)));
        self.updating_state_from_graph.set(false);
        result
    }

    /// Write every cell of the graph into an empty store.
    fn seed(&self, graph: &GraphStore, store: &dyn ExternalGraphStore) -> SyncResult<()> {
        log::debug!("Seeding empty store from {} cells", graph.len());
        self.updating_state_from_graph.set(true);
        let result = self
            .mappers
            .reverse_snapshot(graph.cells(), graph.defaults(), &store.get_snapshot())
            .and_then(|next| store.set_state(Box::new(move |_| next)));
        self.updating_state_from_graph.set(false);
        result
    }

    fn record(&self, error: SyncError) {
        log::warn!("Sync failed: {}", error);
        *self.last_error.borrow_mut() = Some(error);
    }
}

/// A live binding. Dropping it detaches both listeners.
pub struct GraphSync<S: ExternalGraphStore + 'static> {
    graph: Rc<RefCell<GraphStore>>,
    store: Rc<S>,
    state: Rc<SyncState>,
    graph_listener: ListenerId,
    unsubscribe_store: Option<Unsubscribe>,
}

impl<S: ExternalGraphStore + 'static> GraphSync<S> {
    /// Populate the graph from the store, then keep both in sync.
    ///
    /// When the store is empty and the graph is not, the graph's cells are
    /// written into the store first, so binding never clears the graph.
    pub fn bind(
        graph: Rc<RefCell<GraphStore>>,
        store: Rc<S>,
        mappers: Mappers,
    ) -> SyncResult<Self> {
        let state = Rc::new(SyncState {
            mappers,
            syncing_from_state: Cell::new(false),
            updating_state_from_graph: Cell::new(false),
            last_error: RefCell::new(None),
        });
        {
            let graph = graph.try_borrow().map_err(|_| SyncError::GraphBusy)?;
            if store.get_snapshot().is_empty() && !graph.is_empty() {
                state.seed(&graph, &*store)?;
            }
        }
        state.forward(&graph, &*store)?;

        let graph_listener = {
            let store: Weak<S> = Rc::downgrade(&store);
            let state = Rc::downgrade(&state);
            graph.borrow_mut().subscribe(move |change, graph| {
                let (Some(store), Some(state)) = (store.upgrade(), state.upgrade()) else {
                    return;
                };
                if let Err(error) = state.write_back(change, graph, &*store) {
                    state.record(error);
                }
            })
        };

        let unsubscribe_store = {
            let graph = Rc::downgrade(&graph);
            let store_ref: Weak<S> = Rc::downgrade(&store);
            let state = Rc::downgrade(&state);
            store.subscribe(Rc::new(move || {
                let (Some(graph), Some(store), Some(state)) =
                    (graph.upgrade(), store_ref.upgrade(), state.upgrade())
                else {
                    return;
                };
                if let Err(error) = state.forward(&graph, &*store) {
                    state.record(error);
                }
            }))
        };

        log::info!("Graph bound to external store");
        Ok(Self {
            graph,
            store,
            state,
            graph_listener,
            unsubscribe_store: Some(unsubscribe_store),
        })
    }

    pub fn graph(&self) -> &Rc<RefCell<GraphStore>> {
        &self.graph
    }

    pub fn store(&self) -> &Rc<S> {
        &self.store
    }

    pub fn mappers(&self) -> &Mappers {
        &self.state.mappers
    }

    /// Map the store's current snapshot into the graph again.
    pub fn resync(&self) -> SyncResult<()> {
        self.state.forward(&self.graph, &*self.store)
    }

    /// The last error raised inside a listener, if any.
    ///
    /// Listeners cannot return errors to the code that triggered them, so
    /// failures are logged and kept here.
    pub fn take_error(&self) -> Option<SyncError> {
        self.state.last_error.borrow_mut().take()
    }
}

impl<S: ExternalGraphStore + 'static> Drop for GraphSync<S> {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe_store.take() {
            unsubscribe();
        }
        match self.graph.try_borrow_mut() {
            Ok(mut graph) => {
                graph.unsubscribe(self.graph_listener);
            }
            Err(_) => log::warn!("Graph is busy, graph listener left attached"),
        }
    }
}
