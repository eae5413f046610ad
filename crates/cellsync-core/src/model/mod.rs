//! Record and cell definitions.
//!
//! Two shapes of the same diagram live side by side:
//!
//! - **Records** ([`GraphElement`], [`GraphLink`]) are the flat, declarative
//!   representation owned by application state.
//! - **Cells** ([`Cell`]) are the nested scene-graph nodes the rendering layer
//!   reads and mutates.
//!
//! The mappers in [`crate::mapper`] translate between the two.

mod element;
mod link;

pub use element::{ElementPort, GraphElement, PortShape};
pub use link::{EndDescriptor, GraphLink, LabelPadding, LinkEnd, LinkLabel, Marker};

use crate::labels::Label;
use crate::ports::PortsDescriptor;
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for cells.
pub type CellId = String;

/// Loosely-typed attribute bag (rendering attributes, user data, defaults).
pub type Attributes = serde_json::Map<String, Value>;

/// Cell type used for elements created from records.
pub const ELEMENT_TYPE: &str = "ReactElement";

/// Cell type used for links created from records.
pub const LINK_TYPE: &str = "standard.Link";

/// Generate a fresh cell identifier.
pub fn new_cell_id() -> CellId {
    Uuid::new_v4().to_string()
}

/// Whether a cell is a node or an edge of the diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellKind {
    Element,
    Link,
}

/// A node of a markup template (`{ tagName, selector }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkupNode {
    pub tag_name: String,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl MarkupNode {
    pub fn new(tag_name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            selector: selector.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// Nested scene-graph attributes of a cell.
///
/// Every field is optional; an absent field means "not set on this cell".
/// Element cells use the geometry and port fields, link cells the end,
/// vertex and label fields. `attrs` holds derived rendering styles and is
/// never parsed back into records; `data` round-trips everything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<CellId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<PortsDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<EndDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<EndDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertices: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<Label>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Attributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Attributes>,
}

/// Names a single attribute of a cell, for [`CellAttributes::unset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKey {
    Position,
    Size,
    Angle,
    Z,
    Layer,
    Parent,
    Ports,
    Source,
    Target,
    Vertices,
    Labels,
    Router,
    Connector,
    Attrs,
    Data,
}

impl CellAttributes {
    /// Apply a patch: every field set on `patch` overwrites the current value.
    ///
    /// Nested structures (ports, labels, attrs, data) are replaced as a whole.
    pub fn merge(&mut self, patch: CellAttributes) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        take(&mut self.position, patch.position);
        take(&mut self.size, patch.size);
        take(&mut self.angle, patch.angle);
        take(&mut self.z, patch.z);
        take(&mut self.layer, patch.layer);
        take(&mut self.parent, patch.parent);
        take(&mut self.ports, patch.ports);
        take(&mut self.source, patch.source);
        take(&mut self.target, patch.target);
        take(&mut self.vertices, patch.vertices);
        take(&mut self.labels, patch.labels);
        take(&mut self.router, patch.router);
        take(&mut self.connector, patch.connector);
        take(&mut self.attrs, patch.attrs);
        take(&mut self.data, patch.data);
    }

    /// Clear one attribute. Returns true if it was set.
    pub fn unset(&mut self, key: AttributeKey) -> bool {
        match key {
            AttributeKey::Position => self.position.take().is_some(),
            AttributeKey::Size => self.size.take().is_some(),
            AttributeKey::Angle => self.angle.take().is_some(),
            AttributeKey::Z => self.z.take().is_some(),
            AttributeKey::Layer => self.layer.take().is_some(),
            AttributeKey::Parent => self.parent.take().is_some(),
            AttributeKey::Ports => self.ports.take().is_some(),
            AttributeKey::Source => self.source.take().is_some(),
            AttributeKey::Target => self.target.take().is_some(),
            AttributeKey::Vertices => self.vertices.take().is_some(),
            AttributeKey::Labels => self.labels.take().is_some(),
            AttributeKey::Router => self.router.take().is_some(),
            AttributeKey::Connector => self.connector.take().is_some(),
            AttributeKey::Attrs => self.attrs.take().is_some(),
            AttributeKey::Data => self.data.take().is_some(),
        }
    }
}

/// A node of the scene graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    #[serde(rename = "type")]
    pub cell_type: String,
    #[serde(flatten)]
    pub attributes: CellAttributes,
}

impl Cell {
    /// Create a cell with no attributes set.
    pub fn new(id: impl Into<CellId>, cell_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cell_type: cell_type.into(),
            attributes: CellAttributes::default(),
        }
    }

    /// Cells of the link type are links, whether or not their ends are
    /// currently set. Untyped cells with an end are links too.
    pub fn kind(&self) -> CellKind {
        if self.cell_type == LINK_TYPE
            || self.attributes.source.is_some()
            || self.attributes.target.is_some()
        {
            CellKind::Link
        } else {
            CellKind::Element
        }
    }

    pub fn is_link(&self) -> bool {
        self.kind() == CellKind::Link
    }

    /// Read one attribute by its serialized name (`"position"`, `"z"`, ...).
    pub fn get(&self, key: &str) -> Option<Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => map.remove(key),
            _ => None,
        }
    }

    /// Bounding box of an element, if both position and size are known.
    pub fn bbox(&self) -> Option<Rect> {
        let position = self.attributes.position?;
        let size = self.attributes.size?;
        Some(Rect::from_origin_size(position, size))
    }

    /// Whether the cell declares a port with this id.
    pub fn has_port(&self, port_id: &str) -> bool {
        self.attributes
            .ports
            .as_ref()
            .is_some_and(|ports| ports.item(port_id).is_some())
    }
}
