//! Port descriptors and the port converter.
//!
//! Element records carry simplified [`ElementPort`]s. The converter expands
//! each into a full [`Port`] (markup, body attributes, group and position
//! arguments) and wraps them in a [`PortsDescriptor`] with the default group.

mod layout;

pub use layout::{PortTransform, layout_ports};

use crate::error::{SyncError, SyncResult};
use crate::model::{Attributes, ElementPort, MarkupNode, PortShape};
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashSet};

/// Group that converted ports are placed in.
pub const DEFAULT_PORT_GROUP: &str = "main";

/// Selector of the port body node.
pub const PORT_BODY_SELECTOR: &str = "portBody";

/// Selector of the port label text node.
pub const PORT_LABEL_SELECTOR: &str = "text";

const DEFAULT_PORT_COLOR: &str = "#333333";
const DEFAULT_LABEL_POSITION: &str = "outside";

/// Position strategy of a port group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PortLayoutKind {
    /// Ports placed at explicit `x`, `y`.
    #[default]
    Absolute,
    Left,
    Right,
    Top,
    Bottom,
    /// Ports spread evenly between `start` and `end`.
    Line,
    /// Ports placed around the ellipse, `step` degrees apart, centered on `startAngle`.
    Ellipse,
    /// Ports spread around the whole ellipse starting at `startAngle`.
    EllipseSpread,
}

/// Group-level layout parameters.
///
/// Each kind reads its own subset; parameters that do not apply to the
/// active kind are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupLayoutArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dx: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensate_rotation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

impl GroupLayoutArgs {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Layout of a port group: a kind plus its parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortLayout {
    pub name: PortLayoutKind,
    #[serde(default, skip_serializing_if = "GroupLayoutArgs::is_empty")]
    pub args: GroupLayoutArgs,
}

impl PortLayout {
    pub fn new(name: PortLayoutKind) -> Self {
        Self {
            name,
            args: GroupLayoutArgs::default(),
        }
    }

    pub fn with_args(mut self, args: GroupLayoutArgs) -> Self {
        self.args = args;
        self
    }
}

/// Per-port position arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dx: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensate_rotation: Option<bool>,
}

impl PortArgs {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Position of a port label relative to its port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortLabelPosition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub args: Attributes,
}

/// Label attached to a port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortLabel {
    pub position: PortLabelPosition,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markup: Vec<MarkupNode>,
}

/// Full port descriptor as stored on a cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Port {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default, skip_serializing_if = "PortArgs::is_empty")]
    pub args: PortArgs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markup: Vec<MarkupNode>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attrs: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<PortLabel>,
}

impl Port {
    pub fn new(id: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            group: Some(group.into()),
            ..Default::default()
        }
    }

    pub fn with_args(mut self, args: PortArgs) -> Self {
        self.args = args;
        self
    }
}

/// Port group: shared layout and styling for its ports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortGroup {
    #[serde(default)]
    pub position: PortLayout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markup: Vec<MarkupNode>,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attrs: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<PortLabel>,
}

impl PortGroup {
    pub fn new(layout: PortLayout) -> Self {
        Self {
            position: layout,
            ..Default::default()
        }
    }
}

/// All ports of a cell: named groups and port items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortsDescriptor {
    #[serde(default)]
    pub groups: BTreeMap<String, PortGroup>,
    #[serde(default)]
    pub items: Vec<Port>,
}

impl PortsDescriptor {
    pub fn item(&self, id: &str) -> Option<&Port> {
        self.items.iter().find(|port| port.id.as_deref() == Some(id))
    }

    pub fn group(&self, name: &str) -> Option<&PortGroup> {
        self.groups.get(name)
    }

    /// Ports that belong to a group, in declaration order.
    pub fn group_items<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Port> + 'a {
        self.items
            .iter()
            .filter(move |port| port.group.as_deref() == Some(name))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.items.is_empty()
    }
}

/// The group descriptor every converted port set carries.
pub fn port_defaults_group() -> PortGroup {
    PortGroup::new(PortLayout::new(PortLayoutKind::Absolute))
}

/// Expand one simplified port.
pub fn convert_port(port: &ElementPort) -> Port {
    let width = port.width.unwrap_or(1.0);
    let height = port.height.unwrap_or(1.0);
    let color = port.color.as_deref().unwrap_or(DEFAULT_PORT_COLOR);
    let shape = port.shape.unwrap_or_default();

    let mut body = Attributes::new();
    body.insert("fill".to_string(), json!(color));
    body.insert("magnet".to_string(), json!(port.magnet.unwrap_or(true)));
    match shape {
        PortShape::Ellipse => {
            body.insert("rx".to_string(), json!(width / 2.0));
            body.insert("ry".to_string(), json!(height / 2.0));
        }
        PortShape::Rect => {
            body.insert("width".to_string(), json!(width));
            body.insert("height".to_string(), json!(height));
            body.insert("x".to_string(), json!(-width / 2.0));
            body.insert("y".to_string(), json!(-height / 2.0));
        }
    }
    if let Some(class_name) = &port.class_name {
        body.insert("class".to_string(), json!(class_name));
    }

    let tag = match shape {
        PortShape::Ellipse => "ellipse",
        PortShape::Rect => "rect",
    };

    let mut attrs = Attributes::new();
    attrs.insert(PORT_BODY_SELECTOR.to_string(), Value::Object(body));

    let label = port.label.as_ref().map(|text| {
        let mut text_attributes = Attributes::new();
        text_attributes.insert("text".to_string(), json!(text));
        if let Some(class_name) = &port.label_class_name {
            text_attributes.insert("class".to_string(), json!(class_name));
        }
        attrs.insert(PORT_LABEL_SELECTOR.to_string(), Value::Object(text_attributes));

        PortLabel {
            position: PortLabelPosition {
                name: port
                    .label_position
                    .clone()
                    .unwrap_or_else(|| DEFAULT_LABEL_POSITION.to_string()),
                args: Attributes::new(),
            },
            markup: vec![MarkupNode::new("text", PORT_LABEL_SELECTOR).with_attribute(
                "fill",
                port.label_color.as_deref().unwrap_or(DEFAULT_PORT_COLOR),
            )],
        }
    });

    Port {
        id: port.id.clone(),
        group: Some(DEFAULT_PORT_GROUP.to_string()),
        size: Some(Size::new(width, height)),
        args: PortArgs::at(port.cx, port.cy),
        markup: vec![MarkupNode::new(tag, PORT_BODY_SELECTOR)],
        attrs,
        label,
    }
}

/// Expand a record's port list into a full descriptor.
///
/// The whole descriptor is rebuilt on every call. Two ports sharing an id
/// is an error.
pub fn convert_ports(cell_id: &str, ports: &[ElementPort]) -> SyncResult<PortsDescriptor> {
    let mut seen = HashSet::new();
    for id in ports.iter().filter_map(|port| port.id.as_deref()) {
        if !seen.insert(id) {
            return Err(SyncError::DuplicatePortId {
                cell: cell_id.to_string(),
                port: id.to_string(),
            });
        }
    }

    let mut groups = BTreeMap::new();
    groups.insert(DEFAULT_PORT_GROUP.to_string(), port_defaults_group());

    Ok(PortsDescriptor {
        groups,
        items: ports.iter().map(convert_port).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ellipse_port_uses_radii() {
        let mut simple = ElementPort::new("out", 10.0, 5.0);
        simple.width = Some(8.0);
        simple.height = Some(6.0);

        let port = convert_port(&simple);
        assert_eq!(port.group.as_deref(), Some(DEFAULT_PORT_GROUP));
        assert_eq!(port.args, PortArgs::at(10.0, 5.0));
        assert_eq!(port.markup[0].tag_name, "ellipse");

        let body = &port.attrs[PORT_BODY_SELECTOR];
        assert_eq!(body["rx"], json!(4.0));
        assert_eq!(body["ry"], json!(3.0));
        assert_eq!(body["fill"], json!(DEFAULT_PORT_COLOR));
        assert_eq!(body["magnet"], json!(true));
        assert!(body.get("width").is_none());
    }

    #[test]
    fn test_rect_port_uses_offset_box() {
        let mut simple = ElementPort::new("in", 0.0, 0.0);
        simple.shape = Some(PortShape::Rect);
        simple.width = Some(10.0);
        simple.height = Some(4.0);
        simple.color = Some("red".to_string());
        simple.magnet = Some(false);
        simple.class_name = Some("port".to_string());

        let port = convert_port(&simple);
        assert_eq!(port.markup[0].tag_name, "rect");
        let body = &port.attrs[PORT_BODY_SELECTOR];
        assert_eq!(body["width"], json!(10.0));
        assert_eq!(body["x"], json!(-5.0));
        assert_eq!(body["y"], json!(-2.0));
        assert_eq!(body["fill"], json!("red"));
        assert_eq!(body["magnet"], json!(false));
        assert_eq!(body["class"], json!("port"));
        assert!(body.get("rx").is_none());
    }

    #[test]
    fn test_port_label() {
        let mut simple = ElementPort::new("in", 0.0, 0.0);
        simple.label = Some("Input".to_string());
        simple.label_color = Some("blue".to_string());

        let port = convert_port(&simple);
        let label = port.label.expect("label");
        assert_eq!(label.position.name, DEFAULT_LABEL_POSITION);
        assert_eq!(label.markup[0].attributes["fill"], json!("blue"));
        assert_eq!(port.attrs[PORT_LABEL_SELECTOR]["text"], json!("Input"));
    }

    #[test]
    fn test_convert_ports_injects_default_group() {
        let ports = vec![ElementPort::new("a", 0.0, 0.0), ElementPort::new("b", 5.0, 0.0)];
        let descriptor = convert_ports("node", &ports).unwrap();
        assert_eq!(
            descriptor.group(DEFAULT_PORT_GROUP).map(|g| g.position.name),
            Some(PortLayoutKind::Absolute)
        );
        assert_eq!(descriptor.items.len(), 2);
        assert!(descriptor.item("b").is_some());
        assert_eq!(descriptor.group_items(DEFAULT_PORT_GROUP).count(), 2);
    }

    #[test]
    fn test_convert_ports_rejects_duplicates() {
        let ports = vec![ElementPort::new("a", 0.0, 0.0), ElementPort::new("a", 5.0, 0.0)];
        let err = convert_ports("node", &ports).unwrap_err();
        assert!(matches!(err, SyncError::DuplicatePortId { port, .. } if port == "a"));
    }

    #[test]
    fn test_layout_kind_names() {
        let layout: PortLayout = serde_json::from_value(json!({
            "name": "ellipseSpread",
            "args": { "startAngle": 45, "dr": 3 }
        }))
        .unwrap();
        assert_eq!(layout.name, PortLayoutKind::EllipseSpread);
        assert_eq!(layout.args.start_angle, Some(45.0));
    }
}
