//! Link record <-> link cell.

use super::keep_or_elide;
use crate::defaults::DefaultsResolver;
use crate::error::{SyncError, SyncResult};
use crate::fields::{EntityKind, FieldClass, FieldTable};
use crate::labels::convert_labels;
use crate::model::{Attributes, Cell, CellAttributes, EndDescriptor, GraphLink, LINK_TYPE, LinkEnd};
use crate::presentation::{LinkStyle, LinkTheme};
use serde_json::Value;

/// Bidirectional translator for link records.
#[derive(Debug, Clone)]
pub struct LinkMapper {
    fields: FieldTable,
    cell_type: String,
}

impl Default for LinkMapper {
    fn default() -> Self {
        Self {
            fields: FieldTable::link(),
            cell_type: LINK_TYPE.to_string(),
        }
    }
}

impl LinkMapper {
    /// Build a mapper over a field table. Fails if any built-in link field
    /// is unclassified.
    pub fn new(fields: FieldTable, cell_type: impl Into<String>) -> SyncResult<Self> {
        if fields.entity() != EntityKind::Link {
            return Err(SyncError::Config(
                "link mapper needs a link field table".to_string(),
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
    /// Presentation fields are baked into `attrs` and also kept in the data
    /// bag, since `attrs` is never parsed back.
    pub fn forward(&self, id: &str, link: &GraphLink, theme: &LinkTheme) -> SyncResult<Cell> {
        let attributes = CellAttributes {
            source: Some(link.source.normalize()),
            target: Some(link.target.normalize()),
            z: link.z,
            layer: link.layer.clone(),
            parent: link.parent.clone(),
            vertices: link.vertices.clone(),
            labels: link.labels.as_deref().map(convert_labels),
            router: link.router.clone(),
            connector: link.connector.clone(),
            attrs: Some(LinkStyle::resolve(link, theme).build_attrs()),
            data: Some(self.data_bag(id, link)?),
            ..Default::default()
        };

        Ok(Cell {
            id: id.to_string(),
            cell_type: self.cell_type.clone(),
            attributes,
        })
    }

    fn data_bag(&self, id: &str, link: &GraphLink) -> SyncResult<Attributes> {
        let mut data = Attributes::new();
        for (key, value) in &link.data {
            if self.fields.is_builtin(key) {
                log::warn!("Link `{}`: user field `{}` shadows a built-in field", id, key);
                continue;
            }
            data.insert(key.clone(), value.clone());
        }

        // Only values the record supplies; theme fallbacks stay out.
        if let Value::Object(record) = serde_json::to_value(link)? {
            for (key, value) in record {
                if self.fields.class_of(&key) == FieldClass::Presentation
                    && self.fields.is_builtin(&key)
                {
                    data.insert(key, value);
                }
            }
        }
        Ok(data)
    }

    /// Cell -> record.
    ///
    /// Presentation fields are rebuilt from the data bag. One-way fields
    /// (`labels`, `router`, `connector`) and fields the cell lacks come from
    /// `previous`.
    pub fn reverse(
        &self,
        cell: &Cell,
        defaults: &DefaultsResolver,
        previous: Option<&GraphLink>,
    ) -> SyncResult<GraphLink> {
        let attributes = &cell.attributes;
        let mut record = Attributes::new();

        // Presentation fields first: the typed fields below must win.
        if let Some(data) = &attributes.data {
            for (key, value) in data {
                let readable = if self.fields.is_builtin(key) {
                    self.fields.class_of(key) == FieldClass::Presentation
                } else {
                    self.fields.is_read_back(key)
                };
                if readable {
                    record.insert(key.clone(), value.clone());
                }
            }
        }

        let source = read_end(attributes.source.as_ref(), previous.map(|p| &p.source));
        let target = read_end(attributes.target.as_ref(), previous.map(|p| &p.target));
        record.insert("id".to_string(), Value::String(cell.id.clone()));
        record.insert("source".to_string(), serde_json::to_value(source)?);
        record.insert("target".to_string(), serde_json::to_value(target)?);

        let mut link: GraphLink = serde_json::from_value(Value::Object(record))?;
        link.z = keep_or_elide(
            attributes.z,
            defaults.number(&cell.cell_type, "z"),
            previous.and_then(|p| p.z),
        );
        link.layer = keep_or_elide(
            attributes.layer.clone(),
            defaults.string(&cell.cell_type, "layer"),
            previous.and_then(|p| p.layer.clone()),
        );
        link.parent = attributes.parent.clone();
        link.vertices = match &attributes.vertices {
            Some(vertices) if !vertices.is_empty() => Some(vertices.clone()),
            _ if previous.is_some_and(|p| p.vertices.is_some()) => Some(Vec::new()),
            _ => None,
        };

        if let Some(previous) = previous {
            link.labels = previous.labels.clone();
            link.router = previous.router.clone();
            link.connector = previous.connector.clone();
            fill_presentation(&mut link, previous);
            for (key, value) in &previous.data {
                if self.fields.class_of(key) == FieldClass::OneWay
                    || !link.data.contains_key(key)
                {
                    link.data.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(link)
    }
}

/// A bare descriptor collapses to an id unless the previous record used the
/// descriptor form.
fn read_end(end: Option<&EndDescriptor>, previous: Option<&LinkEnd>) -> LinkEnd {
    let Some(end) = end else {
        return previous.cloned().unwrap_or_default();
    };
    let keep_descriptor = matches!(previous, Some(LinkEnd::Descriptor(_)));
    match &end.id {
        Some(id) if end.is_bare() && !keep_descriptor => LinkEnd::Id(id.clone()),
        _ => LinkEnd::Descriptor(end.clone()),
    }
}

fn fill_presentation(link: &mut GraphLink, previous: &GraphLink) {
    fn fill<T: Clone>(slot: &mut Option<T>, previous: &Option<T>) {
        if slot.is_none() {
            slot.clone_from(previous);
        }
    }
    fill(&mut link.color, &previous.color);
    fill(&mut link.width, &previous.width);
    fill(&mut link.source_marker, &previous.source_marker);
    fill(&mut link.target_marker, &previous.target_marker);
    fill(&mut link.class_name, &previous.class_name);
    fill(&mut link.pattern, &previous.pattern);
    fill(&mut link.line_cap, &previous.line_cap);
    fill(&mut link.line_join, &previous.line_join);
    fill(&mut link.wrapper_color, &previous.wrapper_color);
    fill(&mut link.wrapper_buffer, &previous.wrapper_buffer);
}
