//! Diff of a stored aggregate against its desired state.
//!
//! Backends apply the resulting [`NodeChange`] tree inside one transaction:
//! deletes first (leaf before parent), then updates, then inserts (parent
//! before child, so generated ids are known when children are written).

use crate::error::{StoreError, StoreResult};

use super::{EntityKind, MappingRegistry, Node, Row};

/// Change to one node of an aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeChange {
    /// New row. Children are inserts too.
    Insert {
        kind: EntityKind,
        row: Row,
        children: Vec<NodeChange>,
    },
    /// Existing row. `changes` lists the columns to write and may be empty
    /// when only descendants changed.
    Update {
        kind: EntityKind,
        id: i64,
        changes: Row,
        children: Vec<NodeChange>,
    },
    /// Removes a subtree. Rows are listed leaf first, the subtree root last.
    Delete { rows: Vec<(EntityKind, i64)> },
}

impl NodeChange {
    /// Returns `true` if applying the change would not touch storage.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        match self {
            Self::Update {
                changes, children, ..
            } => changes.is_empty() && children.iter().all(NodeChange::is_noop),
            Self::Delete { rows } => rows.is_empty(),
            Self::Insert { .. } => false,
        }
    }

    /// Number of statements the change issues.
    #[must_use]
    pub fn statement_count(&self) -> usize {
        match self {
            Self::Insert { children, .. } => {
                1 + children.iter().map(NodeChange::statement_count).sum::<usize>()
            }
            Self::Update {
                changes, children, ..
            } => {
                usize::from(!changes.is_empty())
                    + children.iter().map(NodeChange::statement_count).sum::<usize>()
            }
            Self::Delete { rows } => rows.len(),
        }
    }
}

/// Plans the writes turning `stored` into `desired`.
///
/// Children are paired first by surrogate id, then id-less desired children
/// are paired with unclaimed stored children holding identical rows. Stored
/// children left unpaired are deleted with their descendants; desired
/// children left unpaired are inserted.
///
/// # Errors
///
/// * `StoreError::Validation` if any desired row violates its mapping
/// * `StoreError::ConstraintViolation` if a desired node carries an id that
///   the stored aggregate does not own
pub fn plan_changes(
    registry: &MappingRegistry,
    stored: Option<&Node>,
    desired: &Node,
) -> StoreResult<NodeChange> {
    validate_tree(registry, desired)?;

    match stored {
        None => plan_insert(registry, desired),
        Some(stored) => {
            if stored.kind != desired.kind {
                return Err(StoreError::invalid_input(format!(
                    "cannot replace {} with {}",
                    stored.kind, desired.kind
                )));
            }
            if desired.id.is_some() && desired.id != stored.id {
                return Err(not_owned(registry, desired, None));
            }
            plan_update(registry, stored, desired)
        }
    }
}

/// Leaf-first delete list for a whole stored tree.
///
/// # Errors
///
/// Returns `StoreError::Database` if a stored node has no id.
pub fn plan_delete(stored: &Node) -> StoreResult<Vec<(EntityKind, i64)>> {
    let mut rows = Vec::with_capacity(stored.count());
    collect_leaf_first(stored, &mut rows)?;
    Ok(rows)
}

fn collect_leaf_first(node: &Node, rows: &mut Vec<(EntityKind, i64)>) -> StoreResult<()> {
    for child in &node.children {
        collect_leaf_first(child, rows)?;
    }
    rows.push((node.kind, stored_id(node)?));
    Ok(())
}

fn stored_id(node: &Node) -> StoreResult<i64> {
    node.id
        .ok_or_else(|| StoreError::database(format!("stored {} has no id", node.kind)))
}

fn validate_tree(registry: &MappingRegistry, node: &Node) -> StoreResult<()> {
    registry.get(node.kind)?.validate_row(&node.row)?;
    node.children
        .iter()
        .try_for_each(|child| validate_tree(registry, child))
}

/// Rejects a node whose id is not a stored row of the expected owner. The
/// error names the primary key of the node's physical table.
fn not_owned(registry: &MappingRegistry, node: &Node, parent: Option<&Node>) -> StoreError {
    let constraint = match registry.get(node.kind) {
        Ok(mapping) => mapping.primary_key_name(),
        Err(err) => return err,
    };
    let id = node.id.unwrap_or_default();
    let message = match parent {
        Some(parent) => format!(
            "{} {id} is not owned by {} {}",
            node.kind,
            parent.kind,
            parent.id.unwrap_or_default()
        ),
        None => format!("{} {id} does not exist", node.kind),
    };
    StoreError::constraint_violation(constraint, message)
}

fn plan_insert(registry: &MappingRegistry, desired: &Node) -> StoreResult<NodeChange> {
    if desired.id.is_some() {
        return Err(not_owned(registry, desired, None));
    }
    Ok(NodeChange::Insert {
        kind: desired.kind,
        row: desired.row.clone(),
        children: desired
            .children
            .iter()
            .map(|child| plan_insert(registry, child))
            .collect::<StoreResult<_>>()?,
    })
}

fn plan_update(registry: &MappingRegistry, stored: &Node, desired: &Node) -> StoreResult<NodeChange> {
    let mapping = registry.get(desired.kind)?;
    let id = stored_id(stored)?;

    let changed = desired.row.changed_from(&stored.row);
    let changes = if mapping.dynamic_update || changed.is_empty() {
        changed
    } else {
        desired.row.clone()
    };

    let mut deletes = Vec::new();
    let mut updates = Vec::new();
    let mut inserts = Vec::new();

    for collection in &mapping.collections {
        let existing: Vec<&Node> = stored.children_of(collection.child).collect();
        let wanted: Vec<&Node> = desired.children_of(collection.child).collect();

        let mut claimed = vec![false; existing.len()];
        let mut pairs: Vec<Option<usize>> = vec![None; wanted.len()];

        for (w, node) in wanted.iter().enumerate() {
            let Some(child_id) = node.id else { continue };
            let position = existing
                .iter()
                .enumerate()
                .position(|(e, s)| !claimed[e] && s.id == Some(child_id))
                .ok_or_else(|| not_owned(registry, node, Some(stored)))?;
            claimed[position] = true;
            pairs[w] = Some(position);
        }

        for (w, node) in wanted.iter().enumerate() {
            if node.id.is_some() {
                continue;
            }
            if let Some(position) = existing
                .iter()
                .enumerate()
                .position(|(e, s)| !claimed[e] && s.row == node.row)
            {
                claimed[position] = true;
                pairs[w] = Some(position);
            }
        }

        for (e, node) in existing.iter().enumerate() {
            if !claimed[e] {
                deletes.push(NodeChange::Delete {
                    rows: plan_delete(node)?,
                });
            }
        }

        for (w, node) in wanted.iter().enumerate() {
            match pairs[w] {
                Some(e) => {
                    let change = plan_update(registry, existing[e], node)?;
                    if !change.is_noop() {
                        updates.push(change);
                    }
                }
                None => inserts.push(plan_insert(registry, node)?),
            }
        }
    }

    let mut children = deletes;
    children.extend(updates);
    children.extend(inserts);

    Ok(NodeChange::Update {
        kind: desired.kind,
        id,
        changes,
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationStoreOptions;
    use crate::entities::{ApiResource, ApiScope, ApiScopeClaim, Client, ClientRedirectUri, ClientSecret};
    use crate::mapping::{Aggregate, ColumnValue, configuration_registry};
    use crate::naming::TableConfiguration;

    fn registry(dynamic: bool) -> MappingRegistry {
        configuration_registry(&ConfigurationStoreOptions::default().with_dynamic_update(dynamic))
            .unwrap()
    }

    fn uri(id: i64, value: &str) -> ClientRedirectUri {
        ClientRedirectUri {
            id,
            redirect_uri: value.into(),
        }
    }

    fn stored_client() -> Client {
        Client {
            id: 1,
            client_id: "web".into(),
            redirect_uris: vec![uri(10, "https://a/cb"), uri(11, "https://b/cb")],
            client_secrets: vec![ClientSecret {
                id: 20,
                value: "hash".into(),
                ..ClientSecret::default()
            }],
            ..Client::default()
        }
    }

    #[test]
    fn test_new_aggregate_is_one_insert_tree() {
        let mut client = stored_client();
        client.id = 0;
        client.redirect_uris.iter_mut().for_each(|u| u.id = 0);
        client.client_secrets[0].id = 0;

        let change = plan_changes(&registry(false), None, &client.to_node()).unwrap();
        assert_eq!(change.statement_count(), 4);
        assert!(matches!(change, NodeChange::Insert { kind: EntityKind::Client, .. }));
    }

    #[test]
    fn test_identical_graph_is_noop() {
        let client = stored_client();
        let change =
            plan_changes(&registry(false), Some(&client.to_node()), &client.to_node()).unwrap();
        assert!(change.is_noop());
        assert_eq!(change.statement_count(), 0);
    }

    #[test]
    fn test_idless_children_match_by_content() {
        let stored = stored_client();
        let mut desired = stored.clone();
        desired.redirect_uris.iter_mut().for_each(|u| u.id = 0);
        desired.client_secrets[0].id = 0;

        let change = plan_changes(&registry(false), Some(&stored.to_node()), &desired.to_node())
            .unwrap();
        assert!(change.is_noop());
    }

    #[test]
    fn test_removed_child_is_the_only_delete() {
        let stored = stored_client();
        let mut desired = stored.clone();
        desired.redirect_uris.remove(0);

        let change = plan_changes(&registry(false), Some(&stored.to_node()), &desired.to_node())
            .unwrap();
        let NodeChange::Update { children, changes, .. } = change else {
            panic!("expected update");
        };
        assert!(changes.is_empty());
        assert_eq!(
            children,
            vec![NodeChange::Delete {
                rows: vec![(EntityKind::ClientRedirectUri, 10)]
            }]
        );
    }

    #[test]
    fn test_added_child_is_inserted_after_deletes() {
        let stored = stored_client();
        let mut desired = stored.clone();
        desired.redirect_uris.remove(1);
        desired.redirect_uris.push(uri(0, "https://c/cb"));

        let change = plan_changes(&registry(false), Some(&stored.to_node()), &desired.to_node())
            .unwrap();
        let NodeChange::Update { children, .. } = change else {
            panic!("expected update");
        };
        assert_eq!(children.len(), 2);
        assert!(matches!(children[0], NodeChange::Delete { .. }));
        assert!(matches!(children[1], NodeChange::Insert { kind: EntityKind::ClientRedirectUri, .. }));
    }

    #[test]
    fn test_dynamic_update_sends_changed_columns_only() {
        let stored = stored_client();
        let mut desired = stored.clone();
        desired.description = Some("Web app".into());
        desired.client_secrets[0].value = "rotated".into();

        let change = plan_changes(&registry(true), Some(&stored.to_node()), &desired.to_node())
            .unwrap();
        let NodeChange::Update { changes, children, .. } = change else {
            panic!("expected update");
        };
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes.get("Description"),
            Some(&ColumnValue::Text("Web app".into()))
        );
        let NodeChange::Update { id, changes, .. } = &children[0] else {
            panic!("expected secret update");
        };
        assert_eq!(*id, 20);
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn test_static_update_sends_full_row() {
        let stored = stored_client();
        let mut desired = stored.clone();
        desired.description = Some("Web app".into());

        let change = plan_changes(&registry(false), Some(&stored.to_node()), &desired.to_node())
            .unwrap();
        let NodeChange::Update { changes, .. } = change else {
            panic!("expected update");
        };
        assert_eq!(changes, desired.to_node().row);
    }

    #[test]
    fn test_foreign_child_id_rejected() {
        let stored = stored_client();
        let mut desired = stored.clone();
        desired.redirect_uris.push(uri(99, "https://evil/cb"));

        let err = plan_changes(&registry(false), Some(&stored.to_node()), &desired.to_node())
            .unwrap_err();
        assert_eq!(err.constraint(), Some("PK_ClientRedirectUris"));
    }

    #[test]
    fn test_foreign_id_names_overridden_table_key() {
        let registry = configuration_registry(
            &ConfigurationStoreOptions::default()
                .with_table("ClientRedirectUri", TableConfiguration::new("RedirectUris")),
        )
        .unwrap();
        let stored = stored_client();
        let mut desired = stored.clone();
        desired.redirect_uris.push(uri(99, "https://evil/cb"));

        let err = plan_changes(&registry, Some(&stored.to_node()), &desired.to_node()).unwrap_err();
        assert_eq!(err.constraint(), Some("PK_RedirectUris"));

        let err = plan_changes(&registry, None, &stored.to_node()).unwrap_err();
        assert_eq!(err.constraint(), Some("PK_Clients"));
    }

    #[test]
    fn test_invalid_desired_row_rejected_before_planning() {
        let stored = stored_client();
        let mut desired = stored.clone();
        desired.redirect_uris.push(uri(0, &"x".repeat(2001)));

        let err = plan_changes(&registry(false), Some(&stored.to_node()), &desired.to_node())
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_delete_is_leaf_first() {
        let api = ApiResource {
            id: 1,
            name: "orders".into(),
            scopes: vec![ApiScope {
                id: 2,
                name: "orders.read".into(),
                user_claims: vec![ApiScopeClaim {
                    id: 3,
                    claim_type: "tenant".into(),
                }],
                ..ApiScope::default()
            }],
            ..ApiResource::default()
        };

        let rows = plan_delete(&api.to_node()).unwrap();
        assert_eq!(
            rows,
            vec![
                (EntityKind::ApiScopeClaim, 3),
                (EntityKind::ApiScope, 2),
                (EntityKind::ApiResource, 1),
            ]
        );
    }

    #[test]
    fn test_removing_scope_cascades_to_its_claims() {
        let stored = ApiResource {
            id: 1,
            name: "orders".into(),
            scopes: vec![ApiScope {
                id: 2,
                name: "orders.read".into(),
                user_claims: vec![ApiScopeClaim {
                    id: 3,
                    claim_type: "tenant".into(),
                }],
                ..ApiScope::default()
            }],
            ..ApiResource::default()
        };
        let mut desired = stored.clone();
        desired.scopes.clear();

        let change = plan_changes(&registry(false), Some(&stored.to_node()), &desired.to_node())
            .unwrap();
        let NodeChange::Update { children, .. } = change else {
            panic!("expected update");
        };
        assert_eq!(
            children,
            vec![NodeChange::Delete {
                rows: vec![(EntityKind::ApiScopeClaim, 3), (EntityKind::ApiScope, 2)]
            }]
        );
    }
}
