//! Relational tables held in memory.
//!
//! Enforces what a database schema would: column limits, unique keys and
//! foreign keys to the owning row. Aggregate plans are applied to a copy of
//! the tables which replaces the original only if every statement succeeds.

use std::collections::BTreeMap;

use idsrv_store::error::{StoreError, StoreResult};
use idsrv_store::mapping::{ColumnValue, EntityKind, MappingRegistry, Node, NodeChange, Row};

#[derive(Debug, Clone)]
struct StoredRow {
    parent: Option<i64>,
    row: Row,
}

/// Tables of one storage context.
#[derive(Debug, Clone, Default)]
pub(crate) struct Database {
    tables: BTreeMap<EntityKind, BTreeMap<i64, StoredRow>>,
    last_id: i64,
}

impl Database {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of rows in a table.
    pub(crate) fn row_count(&self, kind: EntityKind) -> usize {
        self.tables.get(&kind).map_or(0, BTreeMap::len)
    }

    /// Ids of every row of a root table, ascending.
    pub(crate) fn ids(&self, kind: EntityKind) -> Vec<i64> {
        self.tables
            .get(&kind)
            .map(|t| t.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Id of the first row whose `column` equals `value`.
    pub(crate) fn find_id(&self, kind: EntityKind, column: &str, value: &ColumnValue) -> Option<i64> {
        self.tables
            .get(&kind)?
            .iter()
            .find(|(_, stored)| stored.row.get(column) == Some(value))
            .map(|(id, _)| *id)
    }

    /// Loads a row and all of its descendants.
    pub(crate) fn load(
        &self,
        registry: &MappingRegistry,
        kind: EntityKind,
        id: i64,
    ) -> StoreResult<Option<Node>> {
        let Some(stored) = self.tables.get(&kind).and_then(|t| t.get(&id)) else {
            return Ok(None);
        };

        let mut node = Node {
            kind,
            id: Some(id),
            row: stored.row.clone(),
            children: Vec::new(),
        };

        for collection in &registry.get(kind)?.collections {
            let Some(table) = self.tables.get(&collection.child) else {
                continue;
            };
            for (child_id, child) in table {
                if child.parent == Some(id)
                    && let Some(child_node) = self.load(registry, collection.child, *child_id)?
                {
                    node.children.push(child_node);
                }
            }
        }

        Ok(Some(node))
    }

    // -------------------------------------------------------------------------
    // Statements
    // -------------------------------------------------------------------------

    pub(crate) fn insert(
        &mut self,
        registry: &MappingRegistry,
        kind: EntityKind,
        parent: Option<i64>,
        row: Row,
    ) -> StoreResult<i64> {
        let mapping = registry.get(kind)?;
        mapping.validate_row(&row)?;

        match (registry.owner_of(kind), parent) {
            (Some((owner, collection)), Some(parent_id)) => {
                let exists = self
                    .tables
                    .get(&owner.kind)
                    .is_some_and(|t| t.contains_key(&parent_id));
                if !exists {
                    return Err(StoreError::constraint_violation(
                        &collection.foreign_key_name,
                        format!("{} {parent_id} does not exist", owner.kind),
                    ));
                }
            }
            (Some((_, collection)), None) => {
                return Err(StoreError::constraint_violation(
                    &collection.foreign_key_name,
                    format!(
                        "{}.{} must not be null",
                        mapping.table, collection.foreign_key_column
                    ),
                ));
            }
            (None, Some(_)) => {
                return Err(StoreError::invalid_input(format!(
                    "{kind} is an aggregate root and has no owner"
                )));
            }
            (None, None) => {}
        }

        self.check_unique(registry, kind, None, &row)?;

        self.last_id += 1;
        let id = self.last_id;
        self.tables
            .entry(kind)
            .or_default()
            .insert(id, StoredRow { parent, row });
        Ok(id)
    }

    pub(crate) fn update(
        &mut self,
        registry: &MappingRegistry,
        kind: EntityKind,
        id: i64,
        changes: &Row,
    ) -> StoreResult<()> {
        let mapping = registry.get(kind)?;
        let mut row = self
            .tables
            .get(&kind)
            .and_then(|t| t.get(&id))
            .map(|stored| stored.row.clone())
            .ok_or_else(|| {
                StoreError::constraint_violation(
                    mapping.primary_key_name(),
                    format!("{kind} {id} does not exist"),
                )
            })?;

        row.apply(changes);
        mapping.validate_row(&row)?;
        self.check_unique(registry, kind, Some(id), &row)?;

        if let Some(stored) = self.tables.get_mut(&kind).and_then(|t| t.get_mut(&id)) {
            stored.row = row;
        }
        Ok(())
    }

    /// Deletes one row. Fails while owned rows still reference it.
    pub(crate) fn delete(
        &mut self,
        registry: &MappingRegistry,
        kind: EntityKind,
        id: i64,
    ) -> StoreResult<bool> {
        for collection in &registry.get(kind)?.collections {
            let referenced = self
                .tables
                .get(&collection.child)
                .is_some_and(|t| t.values().any(|c| c.parent == Some(id)));
            if referenced {
                return Err(StoreError::constraint_violation(
                    &collection.foreign_key_name,
                    format!("{kind} {id} is still referenced by {}", collection.child),
                ));
            }
        }

        Ok(self
            .tables
            .get_mut(&kind)
            .and_then(|t| t.remove(&id))
            .is_some())
    }

    fn check_unique(
        &self,
        registry: &MappingRegistry,
        kind: EntityKind,
        exclude: Option<i64>,
        row: &Row,
    ) -> StoreResult<()> {
        let Some(table) = self.tables.get(&kind) else {
            return Ok(());
        };

        for key in &registry.get(kind)?.unique_keys {
            let candidate = row.project(&key.columns);
            let collision = table.iter().any(|(id, stored)| {
                Some(*id) != exclude && stored.row.project(&key.columns) == candidate
            });
            if collision {
                return Err(StoreError::constraint_violation(
                    &key.name,
                    format!("duplicate value for {} in {kind}", key.columns.join(", ")),
                ));
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Plans
    // -------------------------------------------------------------------------

    /// Applies a planned change. Returns the id of the node written, if any.
    pub(crate) fn apply(
        &mut self,
        registry: &MappingRegistry,
        change: &NodeChange,
        parent: Option<i64>,
    ) -> StoreResult<Option<i64>> {
        match change {
            NodeChange::Insert {
                kind,
                row,
                children,
            } => {
                let id = self.insert(registry, *kind, parent, row.clone())?;
                for child in children {
                    self.apply(registry, child, Some(id))?;
                }
                Ok(Some(id))
            }
            NodeChange::Update {
                kind,
                id,
                changes,
                children,
            } => {
                if !changes.is_empty() {
                    self.update(registry, *kind, *id, changes)?;
                }
                for child in children {
                    self.apply(registry, child, Some(*id))?;
                }
                Ok(Some(*id))
            }
            NodeChange::Delete { rows } => {
                for (kind, id) in rows {
                    self.delete(registry, *kind, *id)?;
                }
                Ok(None)
            }
        }
    }
}
