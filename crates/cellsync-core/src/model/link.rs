//! Flat link records.

use super::{Attributes, CellId};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One end of a link: a bare cell id or a full end descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkEnd {
    Id(CellId),
    Descriptor(EndDescriptor),
}

impl LinkEnd {
    /// Wrap a bare id into a descriptor; descriptors pass through.
    pub fn normalize(&self) -> EndDescriptor {
        match self {
            LinkEnd::Id(id) => EndDescriptor::cell(id.clone()),
            LinkEnd::Descriptor(descriptor) => descriptor.clone(),
        }
    }

    /// The connected cell, if this end is attached to one.
    pub fn cell_id(&self) -> Option<&str> {
        match self {
            LinkEnd::Id(id) => Some(id),
            LinkEnd::Descriptor(descriptor) => descriptor.id.as_deref(),
        }
    }
}

impl Default for LinkEnd {
    fn default() -> Self {
        LinkEnd::Descriptor(EndDescriptor::point(0.0, 0.0))
    }
}

impl From<&str> for LinkEnd {
    fn from(id: &str) -> Self {
        LinkEnd::Id(id.to_string())
    }
}

/// Link end as stored on cells: either attached to a cell (and optionally a
/// port) or pinned to a fixed point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CellId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// Anchor, connection point, magnet and any other end options.
    #[serde(flatten)]
    pub extra: Attributes,
}

impl EndDescriptor {
    pub fn cell(id: impl Into<CellId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn point(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// True when the descriptor carries nothing but a cell id.
    pub fn is_bare(&self) -> bool {
        self.id.is_some()
            && self.port.is_none()
            && self.x.is_none()
            && self.y.is_none()
            && self.extra.is_empty()
    }
}

/// Marker at either end of a link line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Marker {
    /// One of the built-in presets (`none`, `arrow`, `circle`, ...).
    Preset(String),
    /// A marker definition passed to the renderer verbatim.
    Custom(Attributes),
}

impl Marker {
    pub fn none() -> Self {
        Marker::Preset("none".to_string())
    }

    pub fn preset(name: &str) -> Self {
        Marker::Preset(name.to_string())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Marker::Preset(name) if name == "none")
    }
}

/// Padding around a label's text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelPadding {
    Uniform(f64),
    Axis { x: f64, y: f64 },
}

impl LabelPadding {
    pub fn xy(&self) -> (f64, f64) {
        match *self {
            LabelPadding::Uniform(p) => (p, p),
            LabelPadding::Axis { x, y } => (x, y),
        }
    }
}

/// Simplified label description carried on link records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkLabel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    /// Ratio along the link when within `[0, 1]`, absolute distance otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_padding: Option<LabelPadding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_border_radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_class_name: Option<String>,
}

impl LinkLabel {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Link record as held by application state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphLink {
    pub id: CellId,
    pub source: LinkEnd,
    pub target: LinkEnd,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<CellId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertices: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<LinkLabel>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_marker: Option<Marker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_marker: Option<Marker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_cap: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_join: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapper_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapper_buffer: Option<f64>,
    #[serde(flatten)]
    pub data: Attributes,
}

impl GraphLink {
    /// Serialized names of the built-in fields.
    pub const FIELD_NAMES: &'static [&'static str] = &[
        "id",
        "source",
        "target",
        "z",
        "layer",
        "parent",
        "vertices",
        "labels",
        "router",
        "connector",
        "color",
        "width",
        "sourceMarker",
        "targetMarker",
        "className",
        "pattern",
        "lineCap",
        "lineJoin",
        "wrapperColor",
        "wrapperBuffer",
    ];

    /// Serialized names of the presentation fields.
    pub const PRESENTATION_FIELDS: &'static [&'static str] = &[
        "color",
        "width",
        "sourceMarker",
        "targetMarker",
        "className",
        "pattern",
        "lineCap",
        "lineJoin",
        "wrapperColor",
        "wrapperBuffer",
    ];

    pub fn new(
        id: impl Into<CellId>,
        source: impl Into<LinkEnd>,
        target: impl Into<LinkEnd>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_link_end_forms() {
        let link: GraphLink = serde_json::from_value(json!({
            "id": "l1",
            "source": "a",
            "target": { "id": "b", "port": "in", "anchor": { "name": "center" } }
        }))
        .unwrap();

        assert_eq!(link.source, LinkEnd::Id("a".to_string()));
        let target = link.target.normalize();
        assert_eq!(target.id.as_deref(), Some("b"));
        assert_eq!(target.port.as_deref(), Some("in"));
        assert_eq!(target.extra.get("anchor"), Some(&json!({ "name": "center" })));
        assert!(!target.is_bare());
        assert!(link.source.normalize().is_bare());
    }

    #[test]
    fn test_point_end() {
        let end: LinkEnd = serde_json::from_value(json!({ "x": 5, "y": 6 })).unwrap();
        assert!(end.cell_id().is_none());
        assert_eq!(end.normalize().x, Some(5.0));
    }

    #[test]
    fn test_presentation_and_user_fields() {
        let link: GraphLink = serde_json::from_value(json!({
            "id": "l1",
            "source": "a",
            "target": "b",
            "color": "#ff0000",
            "sourceMarker": "arrow",
            "targetMarker": { "type": "path", "d": "M 0 0 L 10 0" },
            "weight": 4
        }))
        .unwrap();

        assert_eq!(link.color.as_deref(), Some("#ff0000"));
        assert_eq!(link.source_marker, Some(Marker::preset("arrow")));
        assert!(matches!(link.target_marker, Some(Marker::Custom(_))));
        assert_eq!(link.data.get("weight"), Some(&json!(4)));
        assert!(!link.data.contains_key("color"));
    }

    #[test]
    fn test_label_padding() {
        assert_eq!(LabelPadding::Uniform(3.0).xy(), (3.0, 3.0));
        let padding: LabelPadding = serde_json::from_value(json!({ "x": 4, "y": 2 })).unwrap();
        assert_eq!(padding.xy(), (4.0, 2.0));
    }
}
