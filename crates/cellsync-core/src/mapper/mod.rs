//! Record <-> cell mappers.
//!
//! The forward direction builds cell attributes from records, the reverse
//! direction reads records back from cells. For every two-way field F of a
//! record x, `reverse(forward(x))` carries F unchanged.

mod element;
mod link;

pub use element::ElementMapper;
pub use link::LinkMapper;

use crate::config::SyncConfig;
use crate::defaults::DefaultsResolver;
use crate::error::SyncResult;
use crate::fields::EntityKind;
use crate::model::{Cell, CellId, CellKind};
use crate::presentation::LinkTheme;
use crate::store::GraphSnapshot;
use std::collections::{HashMap, HashSet};

/// Value to write back for a field that has a type default.
///
/// A value equal to the default is dropped, unless the previous record
/// carried the field. A missing value falls back to the previous one.
pub(crate) fn keep_or_elide<T: PartialEq>(
    value: Option<T>,
    default: Option<T>,
    previous: Option<T>,
) -> Option<T> {
    match value {
        Some(value) if previous.is_some() || default.as_ref() != Some(&value) => Some(value),
        Some(_) => None,
        None => previous,
    }
}

/// Element and link mappers configured together.
#[derive(Debug, Clone, Default)]
pub struct Mappers {
    pub element: ElementMapper,
    pub link: LinkMapper,
    pub theme: LinkTheme,
}

impl Mappers {
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        Ok(Self {
            element: ElementMapper::new(
                config.field_table(EntityKind::Element)?,
                config.element_type.clone(),
            )?,
            link: LinkMapper::new(
                config.field_table(EntityKind::Link)?,
                config.link_type.clone(),
            )?,
            theme: config.link_theme.clone(),
        })
    }

    /// Cells for a whole snapshot: elements first, then links.
    pub fn forward_snapshot(&self, snapshot: &GraphSnapshot) -> SyncResult<Vec<Cell>> {
        let mut cells = Vec::with_capacity(snapshot.elements.len() + snapshot.links.len());
        for element in &snapshot.elements {
            cells.push(self.element.forward(&element.id, element)?);
        }
        for link in &snapshot.links {
            cells.push(self.link.forward(&link.id, link, &self.theme)?);
        }
        Ok(cells)
    }

    /// Kind of a cell: cells of the configured link type are links even
    /// while their ends are unset.
    pub fn kind_of(&self, cell: &Cell) -> CellKind {
        if cell.cell_type == self.link.cell_type() {
            CellKind::Link
        } else {
            cell.kind()
        }
    }

    fn reverse_cell(
        &self,
        cell: &Cell,
        defaults: &DefaultsResolver,
        previous: &GraphSnapshot,
        next: &mut GraphSnapshot,
    ) -> SyncResult<()> {
        match self.kind_of(cell) {
            CellKind::Element => {
                let element = self.element.reverse(cell, defaults, previous.element(&cell.id));
                next.links.retain(|link| link.id != cell.id);
                next.upsert_element(element);
            }
            CellKind::Link => {
                let link = self.link.reverse(cell, defaults, previous.link(&cell.id))?;
                next.elements.retain(|element| element.id != cell.id);
                next.upsert_link(link);
            }
        }
        Ok(())
    }

    /// Records for the given cells.
    ///
    /// Records of `previous` keep their order and are read back against
    /// their previous value; records with no cell are dropped. Cells with no
    /// previous record are appended in the given order.
    pub fn reverse_snapshot<'a>(
        &self,
        cells: impl IntoIterator<Item = &'a Cell>,
        defaults: &DefaultsResolver,
        previous: &GraphSnapshot,
    ) -> SyncResult<GraphSnapshot> {
        let cells: Vec<&Cell> = cells.into_iter().collect();
        let by_id: HashMap<&str, &Cell> =
            cells.iter().map(|cell| (cell.id.as_str(), *cell)).collect();
        let mut seen = HashSet::new();
        let mut next = GraphSnapshot::default();

        for element in &previous.elements {
            if let Some(cell) = by_id
                .get(element.id.as_str())
                .filter(|c| self.kind_of(c) == CellKind::Element)
            {
                next.elements
                    .push(self.element.reverse(cell, defaults, Some(element)));
                seen.insert(cell.id.as_str());
            }
        }
        for link in &previous.links {
            if let Some(cell) = by_id
                .get(link.id.as_str())
                .filter(|c| self.kind_of(c) == CellKind::Link)
            {
                next.links.push(self.link.reverse(cell, defaults, Some(link))?);
                seen.insert(cell.id.as_str());
            }
        }

        for cell in &cells {
            if seen.contains(cell.id.as_str()) {
                continue;
            }
            self.reverse_cell(cell, defaults, previous, &mut next)?;
        }

        Ok(next)
    }

    /// Apply one graph change to the records.
    ///
    /// Only the records of `changed` and `removed` are touched; every other
    /// record of `previous` is kept as is.
    pub fn apply_change<'a>(
        &self,
        changed: impl IntoIterator<Item = &'a Cell>,
        removed: &[CellId],
        defaults: &DefaultsResolver,
        previous: &GraphSnapshot,
    ) -> SyncResult<GraphSnapshot> {
        let mut next = previous.clone();
        for id in removed {
            next.remove(id);
        }
        for cell in changed {
            self.reverse_cell(cell, defaults, previous, &mut next)?;
        }
        Ok(next)
    }
}
