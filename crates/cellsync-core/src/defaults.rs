//! Cell type defaults.
//!
//! Each cell type registered in a [`CellNamespace`] declares its built-in
//! attribute values. The reverse mappers consult them to avoid writing a
//! value back into a record when it only restates the type's default.

use crate::model::{Attributes, Cell, ELEMENT_TYPE, LINK_TYPE};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Frozen default attributes of a cell type.
pub type CellDefaults = Rc<Attributes>;

/// How a cell type provides its defaults.
#[derive(Clone)]
pub enum DefaultsSource {
    /// A fixed attribute record.
    Attributes(Attributes),
    /// A function evaluated once per graph on first lookup.
    Factory(fn() -> Attributes),
}

impl DefaultsSource {
    fn produce(&self) -> Attributes {
        match self {
            DefaultsSource::Attributes(attributes) => attributes.clone(),
            DefaultsSource::Factory(factory) => factory(),
        }
    }
}

impl std::fmt::Debug for DefaultsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefaultsSource::Attributes(attributes) => {
                f.debug_tuple("Attributes").field(attributes).finish()
            }
            DefaultsSource::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Statically registered table of cell types and their defaults.
#[derive(Debug, Clone, Default)]
pub struct CellNamespace {
    types: HashMap<String, DefaultsSource>,
}

impl CellNamespace {
    /// An empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace with the element and link types used by the mappers.
    pub fn builtin() -> Self {
        let mut namespace = Self::new();
        namespace.register(ELEMENT_TYPE, DefaultsSource::Factory(element_defaults));
        namespace.register(LINK_TYPE, DefaultsSource::Factory(link_defaults));
        namespace
    }

    /// Register (or replace) a cell type.
    pub fn register(&mut self, cell_type: &str, source: DefaultsSource) {
        self.types.insert(cell_type.to_string(), source);
    }

    pub fn with_type(mut self, cell_type: &str, source: DefaultsSource) -> Self {
        self.register(cell_type, source);
        self
    }

    pub fn contains(&self, cell_type: &str) -> bool {
        self.types.contains_key(cell_type)
    }

    fn source(&self, cell_type: &str) -> Option<&DefaultsSource> {
        self.types.get(cell_type)
    }
}

fn element_defaults() -> Attributes {
    match json!({
        "position": { "x": 0.0, "y": 0.0 },
        "size": { "width": 1.0, "height": 1.0 },
        "angle": 0.0,
        "z": 0.0,
    }) {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}

fn link_defaults() -> Attributes {
    match json!({
        "z": 0.0,
        "vertices": [],
    }) {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}

/// Memoized defaults lookup scoped to one graph.
///
/// The cache is owned by the graph store, so entries are dropped with the
/// graph. Unknown types resolve to an empty record.
#[derive(Debug)]
pub struct DefaultsResolver {
    namespace: Rc<CellNamespace>,
    cache: RefCell<HashMap<String, CellDefaults>>,
    empty: CellDefaults,
}

impl DefaultsResolver {
    pub fn new(namespace: Rc<CellNamespace>) -> Self {
        Self {
            namespace,
            cache: RefCell::new(HashMap::new()),
            empty: Rc::new(Attributes::new()),
        }
    }

    /// Defaults of the cell's declared type.
    pub fn resolve(&self, cell: &Cell) -> CellDefaults {
        self.resolve_type(&cell.cell_type)
    }

    /// Defaults of a cell type by name.
    pub fn resolve_type(&self, cell_type: &str) -> CellDefaults {
        if let Some(cached) = self.cache.borrow().get(cell_type) {
            return Rc::clone(cached);
        }

        let Some(source) = self.namespace.source(cell_type) else {
            log::debug!("No defaults registered for cell type `{}`", cell_type);
            return Rc::clone(&self.empty);
        };

        let defaults = Rc::new(source.produce());
        self.cache
            .borrow_mut()
            .insert(cell_type.to_string(), Rc::clone(&defaults));
        defaults
    }

    /// Numeric default of one attribute, if declared.
    pub fn number(&self, cell_type: &str, key: &str) -> Option<f64> {
        self.resolve_type(cell_type).get(key).and_then(Value::as_f64)
    }

    /// String default of one attribute, if declared.
    pub fn string(&self, cell_type: &str, key: &str) -> Option<String> {
        self.resolve_type(cell_type)
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn namespace(&self) -> &CellNamespace {
        &self.namespace
    }

    /// Number of cached types.
    pub fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }
}
