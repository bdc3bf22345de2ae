use std::collections::{BTreeMap, BTreeSet};

use crate::error::{StoreError, StoreResult};
use crate::naming::{PhysicalTable, TableNaming, resolve_table};

use super::{ColumnDef, ColumnType, ColumnValue, EntityKind, Row};

/// Storage partition. Each context gets its own registry and may live in its
/// own database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    /// Clients, resources and their children.
    Configuration,
    /// Persisted grants.
    Operational,
}

/// Identity strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryKey {
    /// Database-generated `BIGINT` surrogate key.
    Generated { column: &'static str },
    /// Caller-supplied key stored in one of the mapped columns.
    Natural { column: &'static str },
}

impl PrimaryKey {
    #[must_use]
    pub fn column(&self) -> &'static str {
        match self {
            Self::Generated { column } | Self::Natural { column } => column,
        }
    }

    #[must_use]
    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Generated { .. })
    }
}

/// What happens to owned rows when the parent changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cascade {
    /// Deleting the parent deletes every child; removing a child from the
    /// parent's collection deletes its row.
    AllDeleteOrphan,
}

/// Named unique constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub name: String,
    pub columns: Vec<&'static str>,
}

/// One-to-many ownership from a parent mapping to a child kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedCollection {
    pub child: EntityKind,
    /// Column on the child table referencing the parent's key.
    pub foreign_key_column: &'static str,
    /// `FK_<ChildTable>_<ParentTable>`, filled in when the registry is built.
    pub foreign_key_name: String,
    pub foreign_key_nullable: bool,
    pub cascade: Cascade,
}

// =============================================================================
// Entity Mapping
// =============================================================================

/// Table mapping of one entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMapping {
    pub kind: EntityKind,
    pub table: PhysicalTable,
    pub primary_key: PrimaryKey,
    /// Mapped columns. Excludes a generated key and the foreign key to the
    /// owner; includes a natural key.
    pub columns: Vec<ColumnDef>,
    pub unique_keys: Vec<UniqueKey>,
    pub collections: Vec<OwnedCollection>,
    /// Send only changed columns on update.
    pub dynamic_update: bool,
}

impl EntityMapping {
    /// Starts a mapping for `kind`, resolving its table through `naming`.
    #[must_use]
    pub fn builder(kind: EntityKind, naming: &impl TableNaming) -> MappingBuilder {
        MappingBuilder {
            mapping: EntityMapping {
                kind,
                table: resolve_table(kind.logical_name(), kind.conventional_table(), naming),
                primary_key: PrimaryKey::Generated { column: "Id" },
                columns: Vec::new(),
                unique_keys: Vec::new(),
                collections: Vec::new(),
                dynamic_update: false,
            },
        }
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Name of the primary key constraint, derived from the physical table.
    #[must_use]
    pub fn primary_key_name(&self) -> String {
        format!("PK_{}", self.table.name)
    }

    /// Mapped column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    #[must_use]
    pub fn collection(&self, child: EntityKind) -> Option<&OwnedCollection> {
        self.collections.iter().find(|c| c.child == child)
    }

    /// Checks every declared column of `row` for presence, type, nullability
    /// and length. Over-long text is rejected, never truncated.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` naming the first offending column.
    pub fn validate_row(&self, row: &Row) -> StoreResult<()> {
        for (name, _) in row.iter() {
            if self.column(name).is_none() {
                return Err(self.invalid(name, "column is not mapped"));
            }
        }

        for column in &self.columns {
            let value = row.get(column.name).unwrap_or(&ColumnValue::Null);

            if value.is_null() {
                if column.nullable {
                    continue;
                }
                return Err(self.invalid(column.name, "value is required"));
            }

            if !value.fits(column.column_type) {
                return Err(self.invalid(
                    column.name,
                    format!("value does not fit column type {:?}", column.column_type),
                ));
            }

            if let (ColumnType::Text, Some(max), ColumnValue::Text(text)) =
                (column.column_type, column.max_length, value)
            {
                let length = text.chars().count();
                if length > max {
                    return Err(self.invalid(
                        column.name,
                        format!("value has {length} characters, maximum is {max}"),
                    ));
                }
            }
        }

        Ok(())
    }

    fn invalid(&self, column: &str, message: impl Into<String>) -> StoreError {
        StoreError::validation(self.table.to_string(), column, message)
    }
}

/// Fluent construction of an [`EntityMapping`].
#[derive(Debug)]
pub struct MappingBuilder {
    mapping: EntityMapping,
}

impl MappingBuilder {
    /// Uses a caller-supplied key held in `column`.
    #[must_use]
    pub fn natural_key(mut self, column: ColumnDef) -> Self {
        self.mapping.primary_key = PrimaryKey::Natural {
            column: column.name,
        };
        self.mapping.columns.insert(0, column);
        self
    }

    #[must_use]
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.mapping.columns.push(column);
        self
    }

    #[must_use]
    pub fn unique(mut self, name: impl Into<String>, columns: &[&'static str]) -> Self {
        self.mapping.unique_keys.push(UniqueKey {
            name: name.into(),
            columns: columns.to_vec(),
        });
        self
    }

    /// Declares an owned collection with cascade and orphan delete.
    #[must_use]
    pub fn owns(mut self, child: EntityKind, foreign_key_column: &'static str) -> Self {
        self.mapping.collections.push(OwnedCollection {
            child,
            foreign_key_column,
            foreign_key_name: String::new(),
            foreign_key_nullable: false,
            cascade: Cascade::AllDeleteOrphan,
        });
        self
    }

    #[must_use]
    pub fn dynamic_update(mut self, enabled: bool) -> Self {
        self.mapping.dynamic_update = enabled;
        self
    }

    #[must_use]
    pub fn build(self) -> EntityMapping {
        self.mapping
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Collects mappings for one context and checks them as a whole.
#[derive(Debug)]
pub struct MappingRegistryBuilder {
    context: ContextKind,
    mappings: BTreeMap<EntityKind, EntityMapping>,
}

impl MappingRegistryBuilder {
    #[must_use]
    pub fn new(context: ContextKind) -> Self {
        Self {
            context,
            mappings: BTreeMap::new(),
        }
    }

    /// Adds a mapping.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Configuration` if the kind is already registered
    /// or belongs to another context.
    pub fn register(&mut self, mapping: EntityMapping) -> StoreResult<&mut Self> {
        if mapping.kind.context() != self.context {
            return Err(StoreError::configuration(format!(
                "{} belongs to the {:?} context, not {:?}",
                mapping.kind,
                mapping.kind.context(),
                self.context
            )));
        }
        if self.mappings.contains_key(&mapping.kind) {
            return Err(StoreError::configuration(format!(
                "duplicate mapping registered for {}",
                mapping.kind
            )));
        }
        self.mappings.insert(mapping.kind, mapping);
        Ok(self)
    }

    /// Validates the ownership graph and naming, then freezes the registry.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Configuration` if a collection targets an
    /// unregistered kind, a kind is owned twice, a child kind has no owner,
    /// two kinds share a physical table, or a unique key names an unmapped
    /// column.
    pub fn build(mut self) -> StoreResult<MappingRegistry> {
        let mut owners: BTreeMap<EntityKind, EntityKind> = BTreeMap::new();
        let mut tables: BTreeSet<PhysicalTable> = BTreeSet::new();

        for mapping in self.mappings.values() {
            if !tables.insert(mapping.table.clone()) {
                return Err(StoreError::configuration(format!(
                    "{} maps to table {} which is already in use",
                    mapping.kind, mapping.table
                )));
            }

            for key in &mapping.unique_keys {
                if let Some(missing) = key.columns.iter().find(|c| mapping.column(c).is_none()) {
                    return Err(StoreError::configuration(format!(
                        "unique key {} on {} references unmapped column {missing}",
                        key.name, mapping.kind
                    )));
                }
            }

            for collection in &mapping.collections {
                if !self.mappings.contains_key(&collection.child) {
                    return Err(StoreError::configuration(format!(
                        "{} owns {} which has no mapping",
                        mapping.kind, collection.child
                    )));
                }
                if let Some(previous) = owners.insert(collection.child, mapping.kind) {
                    return Err(StoreError::configuration(format!(
                        "{} is owned by both {previous} and {}",
                        collection.child, mapping.kind
                    )));
                }
            }
        }

        for kind in self.mappings.keys() {
            if !kind.is_aggregate_root() && !owners.contains_key(kind) {
                return Err(StoreError::configuration(format!(
                    "{kind} is registered but not owned by any aggregate"
                )));
            }
        }

        let table_names: BTreeMap<EntityKind, String> = self
            .mappings
            .iter()
            .map(|(kind, m)| (*kind, m.table.name.clone()))
            .collect();
        for mapping in self.mappings.values_mut() {
            let parent_table = mapping.table.name.clone();
            for collection in &mut mapping.collections {
                let child_table = table_names
                    .get(&collection.child)
                    .map_or(collection.child.conventional_table(), String::as_str);
                collection.foreign_key_name = format!("FK_{child_table}_{parent_table}");
            }
        }

        tracing::debug!(
            context = ?self.context,
            mappings = self.mappings.len(),
            "Built mapping registry"
        );

        Ok(MappingRegistry {
            context: self.context,
            mappings: self.mappings,
            owners,
        })
    }
}

/// Immutable set of mappings for one context.
#[derive(Debug, Clone)]
pub struct MappingRegistry {
    context: ContextKind,
    mappings: BTreeMap<EntityKind, EntityMapping>,
    owners: BTreeMap<EntityKind, EntityKind>,
}

impl MappingRegistry {
    #[must_use]
    pub fn context(&self) -> ContextKind {
        self.context
    }

    /// Mapping for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Configuration` if the kind is not registered here.
    pub fn get(&self, kind: EntityKind) -> StoreResult<&EntityMapping> {
        self.mappings.get(&kind).ok_or_else(|| {
            StoreError::configuration(format!(
                "{kind} is not mapped in the {:?} context",
                self.context
            ))
        })
    }

    #[must_use]
    pub fn contains(&self, kind: EntityKind) -> bool {
        self.mappings.contains_key(&kind)
    }

    /// Mappings, parent before child.
    pub fn iter(&self) -> impl Iterator<Item = &EntityMapping> {
        self.mappings.values()
    }

    /// Parent mapping and collection declaration for an owned kind.
    #[must_use]
    pub fn owner_of(&self, kind: EntityKind) -> Option<(&EntityMapping, &OwnedCollection)> {
        let parent = self.mappings.get(self.owners.get(&kind)?)?;
        let collection = parent.collection(kind)?;
        Some((parent, collection))
    }

    /// Whether updates of `kind` send only changed columns.
    #[must_use]
    pub fn dynamic_update(&self, kind: EntityKind) -> bool {
        self.mappings.get(&kind).is_some_and(|m| m.dynamic_update)
    }
}
