//! Field classification for records.
//!
//! Every record field is exactly one of:
//!
//! - [`FieldClass::TwoWay`]: synced back from the graph on every observed mutation.
//! - [`FieldClass::OneWay`]: consumed when building the graph, never read back.
//! - [`FieldClass::Presentation`]: converted into rendering attributes and kept
//!   verbatim in the cell's data bag so the record can be rebuilt.

use crate::error::{SyncError, SyncResult};
use crate::model::{GraphElement, GraphLink};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sync direction of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldClass {
    TwoWay,
    OneWay,
    Presentation,
}

/// Which record type a table describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Element,
    Link,
}

impl EntityKind {
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Element => "element",
            EntityKind::Link => "link",
        }
    }

    /// Built-in fields of the record type.
    pub fn builtin_fields(self) -> &'static [&'static str] {
        match self {
            EntityKind::Element => GraphElement::FIELD_NAMES,
            EntityKind::Link => GraphLink::FIELD_NAMES,
        }
    }

    /// Fixed classification of a built-in field. The mappers handle each
    /// built-in field in exactly this way.
    pub fn builtin_class(self, field: &str) -> Option<FieldClass> {
        let entries = match self {
            EntityKind::Element => ELEMENT_CLASSES,
            EntityKind::Link => LINK_CLASSES,
        };
        entries
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, class)| *class)
    }
}

const ELEMENT_CLASSES: &[(&str, FieldClass)] = &[
    ("id", FieldClass::TwoWay),
    ("x", FieldClass::TwoWay),
    ("y", FieldClass::TwoWay),
    ("width", FieldClass::TwoWay),
    ("height", FieldClass::TwoWay),
    ("angle", FieldClass::TwoWay),
    ("z", FieldClass::TwoWay),
    ("layer", FieldClass::TwoWay),
    ("parent", FieldClass::TwoWay),
    ("ports", FieldClass::OneWay),
];

const LINK_CLASSES: &[(&str, FieldClass)] = &[
    ("id", FieldClass::TwoWay),
    ("source", FieldClass::TwoWay),
    ("target", FieldClass::TwoWay),
    ("z", FieldClass::TwoWay),
    ("layer", FieldClass::TwoWay),
    ("parent", FieldClass::TwoWay),
    ("vertices", FieldClass::TwoWay),
    ("labels", FieldClass::OneWay),
    ("router", FieldClass::OneWay),
    ("connector", FieldClass::OneWay),
    ("color", FieldClass::Presentation),
    ("width", FieldClass::Presentation),
    ("sourceMarker", FieldClass::Presentation),
    ("targetMarker", FieldClass::Presentation),
    ("className", FieldClass::Presentation),
    ("pattern", FieldClass::Presentation),
    ("lineCap", FieldClass::Presentation),
    ("lineJoin", FieldClass::Presentation),
    ("wrapperColor", FieldClass::Presentation),
    ("wrapperBuffer", FieldClass::Presentation),
];

/// Classification of every field of one record type.
///
/// Built-in fields come from a fixed table. User fields (anything that ends
/// up in a record's `data`) default to two-way and may be classified
/// explicitly with [`FieldTable::with_user_field`].
#[derive(Debug, Clone)]
pub struct FieldTable {
    entity: EntityKind,
    builtin: HashMap<&'static str, FieldClass>,
    user: HashMap<String, FieldClass>,
}

impl FieldTable {
    /// The built-in classification of element records.
    pub fn element() -> Self {
        Self::from_entries(EntityKind::Element, ELEMENT_CLASSES)
    }

    /// The built-in classification of link records.
    pub fn link() -> Self {
        Self::from_entries(EntityKind::Link, LINK_CLASSES)
    }

    /// An empty table. Only useful for building a custom classification,
    /// which [`FieldTable::validate`] then checks for completeness.
    pub fn empty(entity: EntityKind) -> Self {
        Self {
            entity,
            builtin: HashMap::new(),
            user: HashMap::new(),
        }
    }

    fn from_entries(entity: EntityKind, entries: &[(&'static str, FieldClass)]) -> Self {
        Self {
            entity,
            builtin: entries.iter().copied().collect(),
            user: HashMap::new(),
        }
    }

    /// Classify a built-in field.
    ///
    /// Only the field's fixed classification is accepted: a name that is
    /// not built in, or a different class, is `ReservedField`.
    pub fn with_builtin(mut self, field: &'static str, class: FieldClass) -> SyncResult<Self> {
        if self.entity.builtin_class(field) != Some(class) {
            return Err(SyncError::ReservedField {
                entity: self.entity.name(),
                field: field.to_string(),
            });
        }
        self.builtin.insert(field, class);
        Ok(self)
    }

    /// Classify a user field. Built-in field names are rejected.
    pub fn with_user_field(mut self, field: &str, class: FieldClass) -> SyncResult<Self> {
        if self.entity.builtin_fields().contains(&field) {
            return Err(SyncError::ReservedField {
                entity: self.entity.name(),
                field: field.to_string(),
            });
        }
        self.user.insert(field.to_string(), class);
        Ok(self)
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    /// Check that every built-in field of the entity is classified.
    pub fn validate(&self) -> SyncResult<()> {
        for field in self.entity.builtin_fields() {
            if !self.builtin.contains_key(field) {
                return Err(SyncError::UnclassifiedField {
                    entity: self.entity.name(),
                    field: (*field).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Classification of a field. Unlisted user fields are two-way.
    pub fn class_of(&self, field: &str) -> FieldClass {
        if let Some(class) = self.builtin.get(field) {
            return *class;
        }
        self.user.get(field).copied().unwrap_or(FieldClass::TwoWay)
    }

    /// Whether the reverse pass should emit this field.
    pub fn is_read_back(&self, field: &str) -> bool {
        self.class_of(field) != FieldClass::OneWay
    }

    pub fn is_builtin(&self, field: &str) -> bool {
        self.entity.builtin_fields().contains(&field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_are_complete() {
        FieldTable::element().validate().unwrap();
        FieldTable::link().validate().unwrap();
    }

    #[test]
    fn test_classes() {
        let element = FieldTable::element();
        assert_eq!(element.class_of("x"), FieldClass::TwoWay);
        assert_eq!(element.class_of("ports"), FieldClass::OneWay);
        assert_eq!(element.class_of("label"), FieldClass::TwoWay);

        let link = FieldTable::link();
        assert_eq!(link.class_of("color"), FieldClass::Presentation);
        assert_eq!(link.class_of("router"), FieldClass::OneWay);
        assert!(link.is_read_back("color"));
        assert!(!link.is_read_back("labels"));
    }

    #[test]
    fn test_incomplete_table_fails() {
        let table = FieldTable::empty(EntityKind::Element)
            .with_builtin("id", FieldClass::TwoWay)
            .and_then(|table| table.with_builtin("x", FieldClass::TwoWay))
            .unwrap();
        let err = table.validate().unwrap_err();
        assert!(matches!(err, SyncError::UnclassifiedField { field, .. } if field == "y"));
    }

    #[test]
    fn test_user_fields() {
        let table = FieldTable::element()
            .with_user_field("draft", FieldClass::OneWay)
            .unwrap();
        assert!(!table.is_read_back("draft"));

        let err = FieldTable::element()
            .with_user_field("x", FieldClass::OneWay)
            .unwrap_err();
        assert!(matches!(err, SyncError::ReservedField { .. }));
    }

    #[test]
    fn test_builtin_keeps_fixed_class() {
        let table = FieldTable::empty(EntityKind::Link)
            .with_builtin("color", FieldClass::Presentation)
            .unwrap();
        assert_eq!(table.class_of("color"), FieldClass::Presentation);

        let err = FieldTable::empty(EntityKind::Link)
            .with_builtin("color", FieldClass::TwoWay)
            .unwrap_err();
        assert!(matches!(err, SyncError::ReservedField { field, .. } if field == "color"));

        assert!(FieldTable::empty(EntityKind::Element)
            .with_builtin("status", FieldClass::TwoWay)
            .is_err());
    }
}
