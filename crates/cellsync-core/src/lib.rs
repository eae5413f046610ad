//! CellSync Core Library
//!
//! Keeps flat graph records held by an application in sync with a mutable
//! scene graph of cells, in both directions.

pub mod config;
pub mod defaults;
pub mod error;
pub mod fields;
pub mod graph;
pub mod labels;
pub mod mapper;
pub mod model;
pub mod ports;
pub mod presentation;
pub mod store;
pub mod sync;

pub use config::SyncConfig;
pub use defaults::{CellNamespace, DefaultsResolver};
pub use error::{SyncError, SyncResult};
pub use fields::{EntityKind, FieldClass, FieldTable};
pub use graph::{GraphChange, GraphStore, ListenerId};
pub use mapper::{ElementMapper, LinkMapper, Mappers};
pub use model::{Cell, CellAttributes, GraphElement, GraphLink, LinkEnd};
pub use ports::{Port, PortGroup, PortLayout, PortLayoutKind, PortsDescriptor};
pub use presentation::{LinkTheme, PatternDefs, PatternHandle};
pub use store::{CrdtStore, ExternalGraphStore, GraphSnapshot, MemoryStore};
pub use sync::GraphSync;
