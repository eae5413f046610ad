//! Element record <-> element cell.

use super::keep_or_elide;
use crate::defaults::DefaultsResolver;
use crate::error::{SyncError, SyncResult};
use crate::fields::{EntityKind, FieldClass, FieldTable};
use crate::model::{Attributes, Cell, CellAttributes, ELEMENT_TYPE, GraphElement};
use crate::ports::convert_ports;
use kurbo::{Point, Size};

/// Bidirectional translator for element records.
#[derive(Debug, Clone)]
pub struct ElementMapper {
    fields: FieldTable,
    cell_type: String,
}

impl Default for ElementMapper {
    fn default() -> Self {
        Self {
            fields: FieldTable::element(),
            cell_type: ELEMENT_TYPE.to_string(),
        }
    }
}

impl ElementMapper {
    /// Build a mapper over a field table. Fails if any built-in element
    /// field is unclassified.
    pub fn new(fields: FieldTable, cell_type: impl Into<String>) -> SyncResult<Self> {
        if fields.entity() != EntityKind::Element {
            return Err(SyncError::Config(
                "element mapper needs an element field table".to_string(),
            ));
        }
        fields.validate()?;
        Ok(Self {
            fields,
            cell_type: cell_type.into(),
        })
    }

    pub fn cell_type(&self) -> &str {
        &self.cell_type
    }

    /// Record -> cell.
    ///
    /// `position` and `size` are only set when both of their flat inputs are
    /// present. User fields are kept in the data bag, which is always set.
    pub fn forward(&self, id: &str, element: &GraphElement) -> SyncResult<Cell> {
        let mut attributes = CellAttributes {
            angle: element.angle,
            z: element.z,
            layer: element.layer.clone(),
            parent: element.parent.clone(),
            ..Default::default()
        };

        if let (Some(x), Some(y)) = (element.x, element.y) {
            attributes.position = Some(Point::new(x, y));
        }
        if let (Some(width), Some(height)) = (element.width, element.height) {
            attributes.size = Some(Size::new(width, height));
        }
        if let Some(ports) = &element.ports {
            attributes.ports = Some(convert_ports(id, ports)?);
        }

        let mut data = Attributes::new();
        for (key, value) in &element.data {
            if self.fields.is_builtin(key) {
                log::warn!("Element `{}`: user field `{}` shadows a built-in field", id, key);
                continue;
            }
            data.insert(key.clone(), value.clone());
        }
        attributes.data = Some(data);

        Ok(Cell {
            id: id.to_string(),
            cell_type: self.cell_type.clone(),
            attributes,
        })
    }

    /// Cell -> record.
    ///
    /// Values equal to the cell type's default are left out unless
    /// `previous` carried the field. Absent fields and one-way fields are
    /// taken from `previous`.
    pub fn reverse(
        &self,
        cell: &Cell,
        defaults: &DefaultsResolver,
        previous: Option<&GraphElement>,
    ) -> GraphElement {
        let attributes = &cell.attributes;
        let mut element = GraphElement::new(cell.id.clone());

        if let Some(position) = attributes.position {
            element.x = Some(position.x);
            element.y = Some(position.y);
        } else if let Some(previous) = previous {
            element.x = previous.x;
            element.y = previous.y;
        }
        if let Some(size) = attributes.size {
            element.width = Some(size.width);
            element.height = Some(size.height);
        } else if let Some(previous) = previous {
            element.width = previous.width;
            element.height = previous.height;
        }

        let kind = &cell.cell_type;
        element.angle = keep_or_elide(
            attributes.angle,
            defaults.number(kind, "angle"),
            previous.and_then(|p| p.angle),
        );
        element.z = keep_or_elide(
            attributes.z,
            defaults.number(kind, "z"),
            previous.and_then(|p| p.z),
        );
        element.layer = keep_or_elide(
            attributes.layer.clone(),
            defaults.string(kind, "layer"),
            previous.and_then(|p| p.layer.clone()),
        );
        // Embedding is owned by the graph.
        element.parent = attributes.parent.clone();

        if let Some(data) = &attributes.data {
            for (key, value) in data {
                if self.fields.is_builtin(key) || !self.fields.is_read_back(key) {
                    continue;
                }
                element.data.insert(key.clone(), value.clone());
            }
        }

        if let Some(previous) = previous {
            element.ports = previous.ports.clone();
            for (key, value) in &previous.data {
                if self.fields.class_of(key) == FieldClass::OneWay
                    || !element.data.contains_key(key)
                {
                    element.data.insert(key.clone(), value.clone());
                }
            }
        }

        element
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::CellNamespace;
    use crate::model::ElementPort;
    use crate::ports::DEFAULT_PORT_GROUP;
    use serde_json::json;
    use std::rc::Rc;

    fn resolver() -> DefaultsResolver {
        DefaultsResolver::new(Rc::new(CellNamespace::builtin()))
    }

    #[test]
    fn test_forward_position_only() {
        let mapper = ElementMapper::default();
        let element = GraphElement::new("a").with_position(10.0, 20.0);
        let cell = mapper.forward("a", &element).unwrap();

        assert_eq!(
            serde_json::to_value(&cell).unwrap(),
            json!({
                "id": "a",
                "type": ELEMENT_TYPE,
                "position": { "x": 10.0, "y": 20.0 },
                "data": {}
            })
        );
    }

    #[test]
    fn test_forward_partial_geometry_is_dropped() {
        let mapper = ElementMapper::default();
        let mut element = GraphElement::new("a");
        element.x = Some(5.0);
        element.width = Some(40.0);
        let cell = mapper.forward("a", &element).unwrap();
        assert!(cell.attributes.position.is_none());
        assert!(cell.attributes.size.is_none());
    }

    #[test]
    fn test_forward_ports_and_data() {
        let mapper = ElementMapper::default();
        let mut element = GraphElement::new("a")
            .with_size(100.0, 50.0)
            .with_data("label", "Start");
        element.ports = Some(vec![ElementPort::new("out", 100.0, 25.0)]);

        let cell = mapper.forward("a", &element).unwrap();
        let ports = cell.attributes.ports.as_ref().unwrap();
        assert!(ports.group(DEFAULT_PORT_GROUP).is_some());
        assert!(cell.has_port("out"));
        assert_eq!(
            cell.attributes.data.as_ref().and_then(|d| d.get("label")),
            Some(&json!("Start"))
        );
    }

    #[test]
    fn test_forward_duplicate_port_fails() {
        let mapper = ElementMapper::default();
        let mut element = GraphElement::new("a");
        element.ports = Some(vec![
            ElementPort::new("p", 0.0, 0.0),
            ElementPort::new("p", 1.0, 0.0),
        ]);
        assert!(matches!(
            mapper.forward("a", &element),
            Err(SyncError::DuplicatePortId { .. })
        ));
    }

    #[test]
    fn test_round_trip_two_way_fields() {
        let mapper = ElementMapper::default();
        let mut element = GraphElement::new("a")
            .with_position(10.0, 20.0)
            .with_size(30.0, 40.0)
            .with_data("label", "Node");
        element.angle = Some(45.0);
        element.z = Some(3.0);
        element.layer = Some("front".to_string());
        element.parent = Some("group".to_string());

        let cell = mapper.forward("a", &element).unwrap();
        let back = mapper.reverse(&cell, &resolver(), None);
        assert_eq!(back, element);
    }

    #[test]
    fn test_default_values_are_elided() {
        let mapper = ElementMapper::default();
        let mut element = GraphElement::new("a").with_position(0.0, 0.0);
        element.z = Some(0.0);
        element.angle = Some(0.0);

        let cell = mapper.forward("a", &element).unwrap();
        let back = mapper.reverse(&cell, &resolver(), None);
        assert!(back.z.is_none());
        assert!(back.angle.is_none());
        assert!(back.parent.is_none());
    }

    #[test]
    fn test_previous_keeps_shape() {
        let mapper = ElementMapper::default();
        let mut previous = GraphElement::new("a").with_position(0.0, 0.0);
        previous.z = Some(0.0);
        previous.ports = Some(vec![ElementPort::new("in", 0.0, 0.0)]);

        let mut cell = mapper.forward("a", &previous).unwrap();
        cell.attributes.position = Some(Point::new(15.0, 5.0));

        let back = mapper.reverse(&cell, &resolver(), Some(&previous));
        assert_eq!(back.x, Some(15.0));
        assert_eq!(back.z, Some(0.0));
        assert_eq!(back.ports, previous.ports);
    }

    #[test]
    fn test_previous_does_not_mask_new_default() {
        let mapper = ElementMapper::default();
        let mut previous = GraphElement::new("a");
        previous.z = Some(5.0);

        let mut cell = mapper.forward("a", &previous).unwrap();
        cell.attributes.z = Some(0.0);
        let back = mapper.reverse(&cell, &resolver(), Some(&previous));
        assert_eq!(back.z, Some(0.0));
    }

    #[test]
    fn test_unembed_drops_parent() {
        let mapper = ElementMapper::default();
        let mut previous = GraphElement::new("a");
        previous.parent = Some("group".to_string());

        let mut cell = mapper.forward("a", &previous).unwrap();
        cell.attributes.parent = None;
        let back = mapper.reverse(&cell, &resolver(), Some(&previous));
        assert!(back.parent.is_none());
    }

    #[test]
    fn test_one_way_user_fields_are_not_read_back() {
        let fields = FieldTable::element()
            .with_user_field("draft", FieldClass::OneWay)
            .unwrap();
        let mapper = ElementMapper::new(fields, ELEMENT_TYPE).unwrap();

        let element = GraphElement::new("a").with_data("draft", true);
        let mut cell = mapper.forward("a", &element).unwrap();
        if let Some(data) = cell.attributes.data.as_mut() {
            data.insert("draft".to_string(), json!(false));
        }

        assert!(mapper.reverse(&cell, &resolver(), None).data.is_empty());
        let back = mapper.reverse(&cell, &resolver(), Some(&element));
        assert_eq!(back.data.get("draft"), Some(&json!(true)));
    }

    #[test]
    fn test_rejects_link_table() {
        assert!(matches!(
            ElementMapper::new(FieldTable::link(), ELEMENT_TYPE),
            Err(SyncError::Config(_))
        ));
    }
}
