//! Mapping registry.
//!
//! Declares, per storage context, how each entity kind maps to a physical
//! table: key strategy, columns with their length and nullability limits,
//! unique keys, and owned collections with cascade rules. Registries are
//! built once from the store options and are immutable afterwards.
//!
//! The [`plan`] module diffs a stored aggregate against its desired state so
//! backends can apply cascades explicitly inside one transaction.

mod column;
mod configuration;
mod kind;
mod operational;
pub mod plan;
mod record;
mod registry;

pub use column::{ColumnDef, ColumnType, ColumnValue, Row};
pub use configuration::configuration_registry;
pub use kind::EntityKind;
pub use operational::operational_registry;
pub use plan::{NodeChange, plan_changes, plan_delete};
pub use record::{Aggregate, Node, Record};
pub use registry::{
    Cascade, ContextKind, EntityMapping, MappingBuilder, MappingRegistry, MappingRegistryBuilder,
    OwnedCollection, PrimaryKey, UniqueKey,
};
