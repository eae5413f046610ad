//! The scene graph.
//!
//! [`GraphStore`] owns every cell, keeps their order, and tells listeners
//! what changed. Listeners get one [`GraphChange`] per mutation, per
//! [`GraphStore::batch`] or per [`GraphStore::flush_pending_updates`].
//!
//! Port mutations are staged: `set_port_group`, `remove_port_group`,
//! `add_port` and `remove_port` queue an operation that is applied, together
//! with every other queued operation, at the next flush.

use crate::config::SyncConfig;
use crate::defaults::{CellNamespace, DefaultsResolver};
use crate::error::{SyncError, SyncResult};
use crate::model::{AttributeKey, Cell, CellAttributes, CellId};
use crate::ports::{Port, PortGroup, PortLayout, PortTransform, PortsDescriptor, layout_ports};
use kurbo::Size;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Cells touched by one notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphChange {
    /// Added or modified cells.
    pub changed: Vec<CellId>,
    /// Removed cells.
    pub removed: Vec<CellId>,
}

impl GraphChange {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }

    fn touch(&mut self, id: &str) {
        self.removed.retain(|removed| removed != id);
        if !self.changed.iter().any(|changed| changed == id) {
            self.changed.push(id.to_string());
        }
    }

    fn remove(&mut self, id: &str) {
        self.changed.retain(|changed| changed != id);
        if !self.removed.iter().any(|removed| removed == id) {
            self.removed.push(id.to_string());
        }
    }
}

/// Handle returned by [`GraphStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type GraphListener = Box<dyn FnMut(&GraphChange, &GraphStore)>;

#[derive(Debug, Clone)]
enum PendingOp {
    SetPortGroup {
        cell: CellId,
        name: String,
        group: PortGroup,
    },
    RemovePortGroup {
        cell: CellId,
        name: String,
    },
    AddPort {
        cell: CellId,
        port: Port,
    },
    RemovePort {
        cell: CellId,
        port: String,
    },
}

impl PendingOp {
    fn cell(&self) -> &str {
        match self {
            PendingOp::SetPortGroup { cell, .. }
            | PendingOp::RemovePortGroup { cell, .. }
            | PendingOp::AddPort { cell, .. }
            | PendingOp::RemovePort { cell, .. } => cell,
        }
    }
}

/// The authoritative scene graph.
pub struct GraphStore {
    cells: HashMap<CellId, Cell>,
    /// Insertion order of cells.
    order: Vec<CellId>,
    defaults: DefaultsResolver,
    pending: Vec<PendingOp>,
    batch_depth: usize,
    change: GraphChange,
    listeners: Vec<(ListenerId, GraphListener)>,
    next_listener: u64,
    batch_updates_disabled: bool,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("cells", &self.order.len())
            .field("pending", &self.pending.len())
            .field("batch_depth", &self.batch_depth)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl GraphStore {
    /// An empty graph over the built-in cell types.
    pub fn new() -> Self {
        Self::with_namespace(Rc::new(CellNamespace::builtin()))
    }

    pub fn with_namespace(namespace: Rc<CellNamespace>) -> Self {
        Self {
            cells: HashMap::new(),
            order: Vec::new(),
            defaults: DefaultsResolver::new(namespace),
            pending: Vec::new(),
            batch_depth: 0,
            change: GraphChange::default(),
            listeners: Vec::new(),
            next_listener: 0,
            batch_updates_disabled: false,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        let mut graph = Self::new();
        graph.batch_updates_disabled = config.batch_updates_disabled;
        graph
    }

    /// Apply staged port mutations as soon as they are made.
    pub fn set_batch_updates_disabled(&mut self, disabled: bool) {
        self.batch_updates_disabled = disabled;
    }

    pub fn defaults(&self) -> &DefaultsResolver {
        &self.defaults
    }

    // --- Queries ---

    pub fn get(&self, id: &str) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cells.contains_key(id)
    }

    /// Cells in insertion order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.order.iter().filter_map(|id| self.cells.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of staged port operations.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn cell_mut(&mut self, id: &str) -> SyncResult<&mut Cell> {
        self.cells
            .get_mut(id)
            .ok_or_else(|| SyncError::MissingCell(id.to_string()))
    }

    fn require(&self, id: &str) -> SyncResult<&Cell> {
        self.cells
            .get(id)
            .ok_or_else(|| SyncError::MissingCell(id.to_string()))
    }

    // --- Notifications ---

    /// Register a change listener.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&GraphChange, &GraphStore) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }

    /// Group mutations into a single notification.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.batch_depth += 1;
        let result = f(self);
        self.batch_depth -= 1;
        self.emit();
        result
    }

    fn emit(&mut self) {
        if self.batch_depth > 0 || self.change.is_empty() {
            return;
        }
        let change = std::mem::take(&mut self.change);
        let mut listeners = std::mem::take(&mut self.listeners);
        log::debug!(
            "Graph change: {} changed, {} removed",
            change.changed.len(),
            change.removed.len()
        );
        for (_, listener) in listeners.iter_mut() {
            listener(&change, self);
        }
        self.listeners = listeners;
    }

    // --- Cells ---

    /// Add a cell. Its id must not be in use.
    pub fn add_cell(&mut self, cell: Cell) -> SyncResult<()> {
        if self.cells.contains_key(&cell.id) {
            return Err(SyncError::DuplicateCellId(cell.id));
        }
        self.change.touch(&cell.id);
        self.order.push(cell.id.clone());
        self.cells.insert(cell.id.clone(), cell);
        self.emit();
        Ok(())
    }

    /// Remove a cell together with the links attached to it.
    ///
    /// Cells embedded in it lose their parent. Staged port operations on the
    /// removed cells are dropped.
    pub fn remove_cell(&mut self, id: &str) -> SyncResult<Cell> {
        if !self.cells.contains_key(id) {
            return Err(SyncError::MissingCell(id.to_string()));
        }

        let attached: Vec<CellId> = self
            .cells()
            .filter(|cell| {
                let ends = [&cell.attributes.source, &cell.attributes.target];
                ends.iter()
                    .any(|end| end.as_ref().and_then(|e| e.id.as_deref()) == Some(id))
            })
            .map(|cell| cell.id.clone())
            .collect();

        let removed = self.detach(id)?;
        for link in attached {
            if link != id {
                self.detach(&link)?;
            }
        }

        self.emit();
        Ok(removed)
    }

    fn detach(&mut self, id: &str) -> SyncResult<Cell> {
        let cell = self
            .cells
            .remove(id)
            .ok_or_else(|| SyncError::MissingCell(id.to_string()))?;
        self.order.retain(|other| other != id);
        self.change.remove(id);

        let before = self.pending.len();
        self.pending.retain(|op| op.cell() != id);
        if self.pending.len() != before {
            log::debug!(
                "Dropped {} staged port operations of `{}`",
                before - self.pending.len(),
                id
            );
        }

        for child in self.cells.values_mut() {
            if child.attributes.parent.as_deref() == Some(id) {
                child.attributes.parent = None;
                self.change.touch(&child.id);
            }
        }
        Ok(cell)
    }

    /// Merge attributes into a cell.
    pub fn set(&mut self, id: &str, patch: CellAttributes) -> SyncResult<()> {
        let cell = self.cell_mut(id)?;
        let before = cell.attributes.clone();
        cell.attributes.merge(patch);
        if cell.attributes != before {
            self.change.touch(id);
        }
        self.emit();
        Ok(())
    }

    /// Clear one attribute of a cell. Returns whether it was set.
    pub fn unset(&mut self, id: &str, key: AttributeKey) -> SyncResult<bool> {
        let cleared = self.cell_mut(id)?.attributes.unset(key);
        if cleared {
            self.change.touch(id);
            self.emit();
        }
        Ok(cleared)
    }

    /// Make the graph hold exactly these cells.
    ///
    /// Cells with a known id are replaced in place, new ones are appended,
    /// and cells missing from `cells` are removed. One notification.
    pub fn sync_cells(&mut self, cells: Vec<Cell>) -> SyncResult<()> {
        let mut ids = HashSet::new();
        for cell in &cells {
            if !ids.insert(cell.id.as_str()) {
                return Err(SyncError::DuplicateCellId(cell.id.clone()));
            }
        }
        let stale: Vec<CellId> = self
            .order
            .iter()
            .filter(|id| !ids.contains(id.as_str()))
            .cloned()
            .collect();

        self.batch(|graph| {
            for id in &stale {
                graph.detach(id)?;
            }
            for cell in cells {
                match graph.cells.get_mut(&cell.id) {
                    Some(existing) if *existing == cell => {}
                    Some(existing) => {
                        graph.change.touch(&cell.id);
                        *existing = cell;
                    }
                    None => {
                        graph.change.touch(&cell.id);
                        graph.order.push(cell.id.clone());
                        graph.cells.insert(cell.id.clone(), cell);
                    }
                }
            }
            Ok(())
        })
    }

    /// Raise a cell above every other cell.
    pub fn to_front(&mut self, id: &str) -> SyncResult<()> {
        let top = self
            .cells
            .values()
            .filter(|cell| cell.id != id)
            .filter_map(|cell| cell.attributes.z)
            .fold(0.0_f64, f64::max);
        self.require(id)?;
        self.set(id, CellAttributes { z: Some(top + 1.0), ..Default::default() })
    }

    /// Lower a cell below every other cell.
    pub fn to_back(&mut self, id: &str) -> SyncResult<()> {
        let bottom = self
            .cells
            .values()
            .filter(|cell| cell.id != id)
            .filter_map(|cell| cell.attributes.z)
            .fold(0.0_f64, f64::min);
        self.require(id)?;
        self.set(id, CellAttributes { z: Some(bottom - 1.0), ..Default::default() })
    }

    // --- Ports ---

    /// Define (or replace) a port group. Staged until flush.
    pub fn set_port_group(&mut self, cell: &str, name: &str, group: PortGroup) -> SyncResult<()> {
        self.require(cell)?;
        self.stage(PendingOp::SetPortGroup {
            cell: cell.to_string(),
            name: name.to_string(),
            group,
        })
    }

    /// Remove a port group and the ports in it. Staged until flush.
    pub fn remove_port_group(&mut self, cell: &str, name: &str) -> SyncResult<()> {
        self.require(cell)?;
        self.stage(PendingOp::RemovePortGroup {
            cell: cell.to_string(),
            name: name.to_string(),
        })
    }

    /// Add a port. Staged until flush.
    ///
    /// Fails right away on a duplicate id, or when the port names a group
    /// that is neither defined nor staged. A port without a group must carry
    /// absolute `x` and `y`.
    pub fn add_port(&mut self, cell: &str, port: Port) -> SyncResult<()> {
        let committed = self.require(cell)?.attributes.ports.clone().unwrap_or_default();
        let mut preview = committed;
        for op in self.pending.iter().filter(|op| op.cell() == cell) {
            apply_op(cell, &mut preview, op.clone())?;
        }
        check_port(cell, &preview, &port)?;
        self.stage(PendingOp::AddPort {
            cell: cell.to_string(),
            port,
        })
    }

    /// Remove a port. Staged until flush; removing an absent port does nothing.
    pub fn remove_port(&mut self, cell: &str, port: &str) -> SyncResult<()> {
        self.require(cell)?;
        self.stage(PendingOp::RemovePort {
            cell: cell.to_string(),
            port: port.to_string(),
        })
    }

    fn stage(&mut self, op: PendingOp) -> SyncResult<()> {
        self.pending.push(op);
        if self.batch_updates_disabled {
            return self.flush_pending_updates();
        }
        Ok(())
    }

    /// Apply every staged port operation, in call order.
    ///
    /// All or nothing: on error no cell is modified and the queue is
    /// cleared. On success listeners see a single change.
    pub fn flush_pending_updates(&mut self) -> SyncResult<()> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(());
        }

        let mut working: HashMap<CellId, PortsDescriptor> = HashMap::new();
        let mut touched: Vec<CellId> = Vec::new();
        for op in pending {
            let cell_id = op.cell().to_string();
            if !working.contains_key(&cell_id) {
                let ports = self.require(&cell_id)?.attributes.ports.clone().unwrap_or_default();
                working.insert(cell_id.clone(), ports);
                touched.push(cell_id.clone());
            }
            if let Some(ports) = working.get_mut(&cell_id) {
                apply_op(&cell_id, ports, op)?;
            }
        }

        for id in touched {
            let Some(ports) = working.remove(&id) else {
                continue;
            };
            let cell = self.cell_mut(&id)?;
            if cell.attributes.ports.as_ref() != Some(&ports) {
                cell.attributes.ports = Some(ports);
                self.change.touch(&id);
            }
        }
        self.emit();
        Ok(())
    }

    /// Positions of a group's ports on a cell, in the cell's local frame.
    ///
    /// An undefined group lays its ports out absolutely.
    pub fn port_positions(
        &self,
        cell: &str,
        group: &str,
    ) -> SyncResult<Vec<(Option<String>, PortTransform)>> {
        let cell = self.require(cell)?;
        let Some(ports) = &cell.attributes.ports else {
            return Ok(Vec::new());
        };
        let layout = ports
            .group(group)
            .map(|g| g.position.clone())
            .unwrap_or_else(PortLayout::default);
        let items: Vec<&Port> = ports.group_items(group).collect();
        let args: Vec<_> = items.iter().map(|port| &port.args).collect();
        let size = cell.attributes.size.unwrap_or(Size::ZERO);

        Ok(items
            .iter()
            .map(|port| port.id.clone())
            .zip(layout_ports(&layout, &args, size))
            .collect())
    }
}

fn check_port(cell: &str, ports: &PortsDescriptor, port: &Port) -> SyncResult<()> {
    if let Some(id) = &port.id {
        if ports.item(id).is_some() {
            return Err(SyncError::DuplicatePortId {
                cell: cell.to_string(),
                port: id.clone(),
            });
        }
    }
    let port_name = port.id.clone().unwrap_or_default();
    match &port.group {
        Some(group) if !ports.groups.contains_key(group) => Err(SyncError::MissingPortGroupContext {
            cell: cell.to_string(),
            port: port_name,
            group: group.clone(),
        }),
        None if port.args.x.is_none() || port.args.y.is_none() => {
            Err(SyncError::MissingPortGroupContext {
                cell: cell.to_string(),
                port: port_name,
                group: String::new(),
            })
        }
        _ => Ok(()),
    }
}

fn apply_op(cell: &str, ports: &mut PortsDescriptor, op: PendingOp) -> SyncResult<()> {
    match op {
        PendingOp::SetPortGroup { name, group, .. } => {
            ports.groups.insert(name, group);
        }
        PendingOp::RemovePortGroup { name, .. } => {
            ports.groups.remove(&name);
            ports
                .items
                .retain(|port| port.group.as_deref() != Some(name.as_str()));
        }
        PendingOp::AddPort { port, .. } => {
            check_port(cell, ports, &port)?;
            ports.items.push(port);
        }
        PendingOp::RemovePort { port, .. } => {
            let before = ports.items.len();
            ports.items.retain(|item| item.id.as_deref() != Some(port.as_str()));
            if ports.items.len() == before {
                log::debug!("Port `{}` not found on `{}`", port, cell);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ELEMENT_TYPE, EndDescriptor, LINK_TYPE};
    use crate::ports::{PortArgs, PortLayoutKind};
    use kurbo::Point;
    use std::cell::RefCell;

    fn element(id: &str) -> Cell {
        let mut cell = Cell::new(id, ELEMENT_TYPE);
        cell.attributes.position = Some(Point::new(0.0, 0.0));
        cell.attributes.size = Some(Size::new(100.0, 100.0));
        cell
    }

    fn link(id: &str, source: &str, target: &str) -> Cell {
        let mut cell = Cell::new(id, LINK_TYPE);
        cell.attributes.source = Some(EndDescriptor::cell(source));
        cell.attributes.target = Some(EndDescriptor::cell(target));
        cell
    }

    fn recorded(graph: &mut GraphStore) -> Rc<RefCell<Vec<GraphChange>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        graph.subscribe(move |change, _| sink.borrow_mut().push(change.clone()));
        log
    }

    fn left_group() -> PortGroup {
        PortGroup::new(PortLayout::new(PortLayoutKind::Left))
    }

    #[test]
    fn test_add_and_duplicate_cell() {
        let mut graph = GraphStore::new();
        graph.add_cell(element("a")).unwrap();
        assert!(graph.contains("a"));
        assert!(matches!(
            graph.add_cell(element("a")),
            Err(SyncError::DuplicateCellId(id)) if id == "a"
        ));
    }

    #[test]
    fn test_set_emits_once_per_call() {
        let mut graph = GraphStore::new();
        graph.add_cell(element("a")).unwrap();
        let log = recorded(&mut graph);

        graph
            .set("a", CellAttributes { z: Some(2.0), ..Default::default() })
            .unwrap();
        // Same value again: nothing changed.
        graph
            .set("a", CellAttributes { z: Some(2.0), ..Default::default() })
            .unwrap();

        assert_eq!(log.borrow().len(), 1);
        assert_eq!(log.borrow()[0].changed, vec!["a".to_string()]);
        assert!(matches!(
            graph.set("missing", CellAttributes::default()),
            Err(SyncError::MissingCell(_))
        ));
    }

    #[test]
    fn test_batch_emits_once() {
        let mut graph = GraphStore::new();
        let log = recorded(&mut graph);

        graph
            .batch(|g| -> SyncResult<()> {
                g.add_cell(element("a"))?;
                g.add_cell(element("b"))?;
                g.set("a", CellAttributes { angle: Some(90.0), ..Default::default() })
            })
            .unwrap();

        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].changed, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_listener_sees_updated_graph() {
        let mut graph = GraphStore::new();
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        graph.subscribe(move |_, graph| {
            *sink.borrow_mut() = graph.get("a").and_then(|cell| cell.attributes.z);
        });

        graph.add_cell(element("a")).unwrap();
        graph
            .set("a", CellAttributes { z: Some(4.0), ..Default::default() })
            .unwrap();
        assert_eq!(*seen.borrow(), Some(4.0));
    }

    #[test]
    fn test_unsubscribe() {
        let mut graph = GraphStore::new();
        let log = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&log);
        let id = graph.subscribe(move |_, _| *sink.borrow_mut() += 1);

        graph.add_cell(element("a")).unwrap();
        assert!(graph.unsubscribe(id));
        assert!(!graph.unsubscribe(id));
        graph.add_cell(element("b")).unwrap();
        assert_eq!(*log.borrow(), 1);
    }

    #[test]
    fn test_remove_cell_cleans_up() {
        let mut graph = GraphStore::new();
        graph.add_cell(element("a")).unwrap();
        graph.add_cell(element("b")).unwrap();
        let mut child = element("c");
        child.attributes.parent = Some("a".to_string());
        graph.add_cell(child).unwrap();
        graph.add_cell(link("l", "a", "b")).unwrap();
        let log = recorded(&mut graph);

        graph.remove_cell("a").unwrap();

        assert!(!graph.contains("l"));
        assert!(graph.get("c").unwrap().attributes.parent.is_none());
        let ids: Vec<_> = graph.cells().map(|cell| cell.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].removed, vec!["a".to_string(), "l".to_string()]);
        assert_eq!(log[0].changed, vec!["c".to_string()]);
    }

    #[test]
    fn test_unset() {
        let mut graph = GraphStore::new();
        let mut cell = element("a");
        cell.attributes.layer = Some("front".to_string());
        graph.add_cell(cell).unwrap();

        assert!(graph.unset("a", AttributeKey::Layer).unwrap());
        assert!(!graph.unset("a", AttributeKey::Layer).unwrap());
        assert!(graph.get("a").unwrap().attributes.layer.is_none());
    }

    #[test]
    fn test_sync_cells() {
        let mut graph = GraphStore::new();
        graph.add_cell(element("a")).unwrap();
        graph.add_cell(element("b")).unwrap();
        let log = recorded(&mut graph);

        let mut a = element("a");
        a.attributes.z = Some(1.0);
        graph.sync_cells(vec![a, element("c")]).unwrap();

        let ids: Vec<_> = graph.cells().map(|cell| cell.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        {
            let log = log.borrow();
            assert_eq!(log.len(), 1);
            assert_eq!(log[0].changed, vec!["a".to_string(), "c".to_string()]);
            assert_eq!(log[0].removed, vec!["b".to_string()]);
        }

        // Identical input: no notification.
        let mut a = element("a");
        a.attributes.z = Some(1.0);
        graph.sync_cells(vec![a, element("c")]).unwrap();
        assert_eq!(log.borrow().len(), 1);

        assert!(matches!(
            graph.sync_cells(vec![element("x"), element("x")]),
            Err(SyncError::DuplicateCellId(_))
        ));
    }

    #[test]
    fn test_z_ordering() {
        let mut graph = GraphStore::new();
        for id in ["a", "b", "c"] {
            graph.add_cell(element(id)).unwrap();
        }
        graph.set("b", CellAttributes { z: Some(5.0), ..Default::default() }).unwrap();

        graph.to_front("a").unwrap();
        assert_eq!(graph.get("a").unwrap().attributes.z, Some(6.0));
        graph.to_back("c").unwrap();
        assert_eq!(graph.get("c").unwrap().attributes.z, Some(-1.0));
        assert!(graph.to_front("missing").is_err());
    }

    #[test]
    fn test_port_mutations_are_staged_until_flush() {
        let mut graph = GraphStore::new();
        graph.add_cell(element("a")).unwrap();
        let log = recorded(&mut graph);

        graph.set_port_group("a", "in", left_group()).unwrap();
        graph.add_port("a", Port::new("p1", "in")).unwrap();
        graph.add_port("a", Port::new("p2", "in")).unwrap();
        assert_eq!(graph.pending_len(), 3);
        assert!(!graph.get("a").unwrap().has_port("p1"));
        assert!(log.borrow().is_empty());

        graph.flush_pending_updates().unwrap();
        assert_eq!(graph.pending_len(), 0);
        assert_eq!(log.borrow().len(), 1);

        let cell = graph.get("a").unwrap();
        assert!(cell.has_port("p1"));
        assert!(cell.has_port("p2"));
    }

    #[test]
    fn test_duplicate_port_is_rejected() {
        let mut graph = GraphStore::new();
        graph.add_cell(element("a")).unwrap();
        graph.set_port_group("a", "in", left_group()).unwrap();
        graph.add_port("a", Port::new("p1", "in")).unwrap();

        // Against the staged port.
        assert!(matches!(
            graph.add_port("a", Port::new("p1", "in")),
            Err(SyncError::DuplicatePortId { .. })
        ));

        graph.flush_pending_updates().unwrap();
        // Against the committed port.
        assert!(matches!(
            graph.add_port("a", Port::new("p1", "in")),
            Err(SyncError::DuplicatePortId { .. })
        ));
    }

    #[test]
    fn test_port_needs_group_context() {
        let mut graph = GraphStore::new();
        graph.add_cell(element("a")).unwrap();

        assert!(matches!(
            graph.add_port("a", Port::new("p1", "nowhere")),
            Err(SyncError::MissingPortGroupContext { group, .. }) if group == "nowhere"
        ));

        let mut relative = Port::default();
        relative.args.dx = Some(5.0);
        assert!(matches!(
            graph.add_port("a", relative),
            Err(SyncError::MissingPortGroupContext { .. })
        ));

        let absolute = Port {
            id: Some("fixed".to_string()),
            args: PortArgs::at(10.0, 10.0),
            ..Default::default()
        };
        graph.add_port("a", absolute).unwrap();
        graph.flush_pending_updates().unwrap();
        assert!(graph.get("a").unwrap().has_port("fixed"));
    }

    #[test]
    fn test_failed_flush_commits_nothing() {
        let mut graph = GraphStore::new();
        graph.add_cell(element("a")).unwrap();
        graph.set_port_group("a", "in", left_group()).unwrap();
        graph.add_port("a", Port::new("p1", "in")).unwrap();
        graph.remove_cell("a").unwrap();
        assert_eq!(graph.pending_len(), 0);

        graph.add_cell(element("b")).unwrap();
        graph.set_port_group("b", "in", left_group()).unwrap();
        graph.add_port("b", Port::new("p1", "in")).unwrap();
        // Removing the group strands nothing: its ports go with it.
        graph.remove_port_group("b", "in").unwrap();
        graph.flush_pending_updates().unwrap();
        let ports = graph.get("b").unwrap().attributes.ports.clone().unwrap();
        assert!(ports.items.is_empty());
        assert!(ports.groups.is_empty());

        // A staged op that fails at flush leaves the cell untouched.
        graph.add_cell(element("c")).unwrap();
        graph.pending.push(PendingOp::SetPortGroup {
            cell: "c".to_string(),
            name: "in".to_string(),
            group: left_group(),
        });
        graph.pending.push(PendingOp::AddPort {
            cell: "c".to_string(),
            port: Port::new("q", "out"),
        });
        assert!(graph.flush_pending_updates().is_err());
        assert!(graph.get("c").unwrap().attributes.ports.is_none());
        assert_eq!(graph.pending_len(), 0);
    }

    #[test]
    fn test_remove_missing_port_is_noop() {
        let mut graph = GraphStore::new();
        graph.add_cell(element("a")).unwrap();
        let log = recorded(&mut graph);
        graph.remove_port("a", "ghost").unwrap();
        graph.flush_pending_updates().unwrap();
        // The cell gains an empty port descriptor; that is a change.
        assert_eq!(log.borrow().len(), 1);
        assert!(graph.remove_port("missing", "ghost").is_err());
    }

    #[test]
    fn test_batch_updates_disabled_flushes_immediately() {
        let mut graph = GraphStore::from_config(&SyncConfig {
            batch_updates_disabled: true,
            ..Default::default()
        });
        graph.add_cell(element("a")).unwrap();
        let log = recorded(&mut graph);

        graph.set_port_group("a", "in", left_group()).unwrap();
        graph.add_port("a", Port::new("p1", "in")).unwrap();
        assert_eq!(graph.pending_len(), 0);
        assert!(graph.get("a").unwrap().has_port("p1"));
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_port_positions() {
        let mut graph = GraphStore::new();
        graph.add_cell(element("a")).unwrap();
        graph.set_port_group("a", "in", left_group()).unwrap();
        graph.add_port("a", Port::new("p1", "in")).unwrap();
        graph.add_port("a", Port::new("p2", "in")).unwrap();
        graph.flush_pending_updates().unwrap();

        let positions = graph.port_positions("a", "in").unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].0.as_deref(), Some("p1"));
        assert_eq!(positions[0].1.position, Point::new(0.0, 25.0));
        assert_eq!(positions[1].1.position, Point::new(0.0, 75.0));
    }
}
