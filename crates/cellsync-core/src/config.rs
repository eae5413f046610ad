//! Synchronization settings.

use crate::error::{SyncError, SyncResult};
use crate::fields::{EntityKind, FieldClass, FieldTable};
use crate::model::{ELEMENT_TYPE, LINK_TYPE};
use crate::presentation::LinkTheme;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Settings shared by the mappers and the graph store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Fallback link presentation.
    pub link_theme: LinkTheme,
    /// Cell type assigned to elements created from records.
    pub element_type: String,
    /// Cell type assigned to links created from records.
    pub link_type: String,
    /// Apply staged port mutations immediately instead of at flush.
    pub batch_updates_disabled: bool,
    /// Extra classifications of element user fields.
    pub element_fields: BTreeMap<String, FieldClass>,
    /// Extra classifications of link user fields.
    pub link_fields: BTreeMap<String, FieldClass>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            link_theme: LinkTheme::default(),
            element_type: ELEMENT_TYPE.to_string(),
            link_type: LINK_TYPE.to_string(),
            batch_updates_disabled: false,
            element_fields: BTreeMap::new(),
            link_fields: BTreeMap::new(),
        }
    }
}

impl SyncConfig {
    /// Parse settings from JSON. Missing keys take their defaults.
    pub fn from_json_str(text: &str) -> SyncResult<Self> {
        serde_json::from_str(text).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Field table of an entity with the configured user classifications.
    pub fn field_table(&self, entity: EntityKind) -> SyncResult<FieldTable> {
        let (mut table, extra) = match entity {
            EntityKind::Element => (FieldTable::element(), &self.element_fields),
            EntityKind::Link => (FieldTable::link(), &self.link_fields),
        };
        for (field, class) in extra {
            table = table.with_user_field(field, *class)?;
        }
        Ok(table)
    }
}
