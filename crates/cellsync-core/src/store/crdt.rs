//! Loro-backed store for peer-to-peer replication.
//!
//! Records live in two Loro maps (`elements`, `links`) keyed by id, holding
//! each record as JSON text. Two Loro lists keep the record order. Peers
//! exchange snapshots or incremental updates; importing remote bytes
//! refreshes the state and notifies subscribers.

use super::{
    ExternalGraphStore, GraphSnapshot, ListenerSet, StateUpdater, StoreListener, Unsubscribe,
};
use crate::error::{SyncError, SyncResult};
use base64::{Engine, engine::general_purpose::STANDARD};
use loro::{ExportMode, LoroDoc, LoroList, LoroMap, LoroValue, ValueOrContainer, VersionVector};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Key of the element records map.
pub const ELEMENTS_KEY: &str = "elements";
/// Key of the link records map.
pub const LINKS_KEY: &str = "links";
/// Key of the element order list.
pub const ELEMENT_ORDER_KEY: &str = "element_order";
/// Key of the link order list.
pub const LINK_ORDER_KEY: &str = "link_order";

/// Encode update bytes for a text channel.
pub fn encode_update(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode update bytes received over a text channel.
pub fn decode_update(text: &str) -> SyncResult<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| SyncError::Crdt(format!("Invalid update encoding: {}", e)))
}

/// A record stored in the document.
trait Record: Serialize + DeserializeOwned + PartialEq {
    fn id(&self) -> &str;
}

impl Record for crate::model::GraphElement {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for crate::model::GraphLink {
    fn id(&self) -> &str {
        &self.id
    }
}

/// State container backed by a Loro document.
pub struct CrdtStore {
    doc: LoroDoc,
    state: RefCell<Rc<GraphSnapshot>>,
    listeners: Rc<ListenerSet>,
}

impl Default for CrdtStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CrdtStore {
    /// An empty document.
    pub fn new() -> Self {
        Self {
            doc: LoroDoc::new(),
            state: RefCell::new(Rc::new(GraphSnapshot::default())),
            listeners: Rc::new(ListenerSet::default()),
        }
    }

    /// A document loaded from a snapshot exported by a peer.
    pub fn from_snapshot(bytes: &[u8]) -> SyncResult<Self> {
        let store = Self::new();
        store.doc.import(bytes)?;
        *store.state.borrow_mut() = Rc::new(read_snapshot(&store.doc)?);
        Ok(store)
    }

    /// The underlying Loro document.
    pub fn loro_doc(&self) -> &LoroDoc {
        &self.doc
    }

    /// Full document state.
    pub fn export_snapshot(&self) -> SyncResult<Vec<u8>> {
        self.doc
            .export(ExportMode::Snapshot)
            .map_err(|e| SyncError::Crdt(e.to_string()))
    }

    /// Operations made after `since`.
    pub fn export_updates(&self, since: &VersionVector) -> SyncResult<Vec<u8>> {
        self.doc
            .export(ExportMode::updates(since))
            .map_err(|e| SyncError::Crdt(e.to_string()))
    }

    /// Current version vector.
    pub fn version(&self) -> VersionVector {
        self.doc.oplog_vv()
    }

    /// Merge a snapshot or updates from a peer.
    pub fn import(&self, bytes: &[u8]) -> SyncResult<()> {
        self.doc.import(bytes)?;
        let next = read_snapshot(&self.doc)?;
        if next == **self.state.borrow() {
            return Ok(());
        }
        log::debug!(
            "Imported remote state: {} elements, {} links",
            next.elements.len(),
            next.links.len()
        );
        *self.state.borrow_mut() = Rc::new(next);
        self.listeners.notify();
        Ok(())
    }

    fn write(&self, current: &GraphSnapshot, next: &GraphSnapshot) -> SyncResult<()> {
        write_records(
            &self.doc.get_map(ELEMENTS_KEY),
            &self.doc.get_list(ELEMENT_ORDER_KEY),
            &current.elements,
            &next.elements,
        )?;
        write_records(
            &self.doc.get_map(LINKS_KEY),
            &self.doc.get_list(LINK_ORDER_KEY),
            &current.links,
            &next.links,
        )?;
        self.doc.commit();
        Ok(())
    }
}

impl ExternalGraphStore for CrdtStore {
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
        self.write(&current, &next)?;
        *self.state.borrow_mut() = Rc::new(next);
        self.listeners.notify();
        Ok(())
    }
}

/// Write the difference between two record lists.
fn write_records<T: Record>(
    map: &LoroMap,
    order: &LoroList,
    current: &[T],
    next: &[T],
) -> SyncResult<()> {
    let kept: HashSet<&str> = next.iter().map(Record::id).collect();
    let previous: HashMap<&str, &T> = current.iter().map(|record| (record.id(), record)).collect();

    for record in current {
        if !kept.contains(record.id()) {
            map.delete(record.id())?;
        }
    }
    for record in next {
        if previous.get(record.id()).is_some_and(|old| *old == record) {
            continue;
        }
        map.insert(record.id(), serde_json::to_string(record)?)?;
    }

    let current_order: Vec<&str> = current.iter().map(Record::id).collect();
    let next_order: Vec<&str> = next.iter().map(Record::id).collect();
    if current_order != next_order {
        let len = order.len();
        if len > 0 {
            order.delete(0, len)?;
        }
        for id in next_order {
            order.push(LoroValue::String(id.to_string().into()))?;
        }
    }
    Ok(())
}

fn read_snapshot(doc: &LoroDoc) -> SyncResult<GraphSnapshot> {
    Ok(GraphSnapshot {
        elements: read_records(&doc.get_map(ELEMENTS_KEY), &doc.get_list(ELEMENT_ORDER_KEY))?,
        links: read_records(&doc.get_map(LINKS_KEY), &doc.get_list(LINK_ORDER_KEY))?,
    })
}

/// Records in list order. Ids missing from the list (concurrent inserts
/// whose order entry lost) are appended sorted by id.
fn read_records<T: Record>(map: &LoroMap, order: &LoroList) -> SyncResult<Vec<T>> {
    let mut records: HashMap<String, T> = HashMap::new();
    if let LoroValue::Map(entries) = map.get_deep_value() {
        for (id, value) in entries.iter() {
            if let LoroValue::String(text) = value {
                records.insert(id.clone(), serde_json::from_str(&text.to_string())?);
            }
        }
    }

    let mut result = Vec::with_capacity(records.len());
    for i in 0..order.len() {
        if let Some(ValueOrContainer::Value(LoroValue::String(id))) = order.get(i) {
            if let Some(record) = records.remove(&id.to_string()) {
                result.push(record);
            }
        }
    }

    let mut rest: Vec<T> = records.into_values().collect();
    rest.sort_by(|a, b| a.id().cmp(b.id()));
    result.extend(rest);
    Ok(result)
}
