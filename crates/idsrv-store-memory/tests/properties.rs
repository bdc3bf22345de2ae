//! Store behavior checked end to end against the in-memory backend.

use std::collections::BTreeSet;
use std::sync::Arc;

use idsrv_store::entities::now_utc;
use idsrv_store::model::{Client, IdentityResource, PersistedGrant, PersistedGrantFilter, Secret};
use idsrv_store::{
    ClientRepository, ClientStore, PersistedGrantStore, ResourceRepository, ResourceStore,
    StoreConfig, TokenCleanup,
};
use idsrv_store_memory::InMemoryStore;
use time::Duration;

fn store() -> InMemoryStore {
    InMemoryStore::new(&StoreConfig::default()).unwrap()
}

fn client(client_id: &str) -> Client {
    let mut client = Client::new(client_id);
    client.allowed_grant_types = vec!["client_credentials".into()];
    client.client_secrets = vec![Secret::new("hash-1"), Secret::new("hash-2")];
    client.redirect_uris = vec![
        "https://app/a".into(),
        "https://app/b".into(),
        "https://app/c".into(),
    ];
    client.allowed_scopes = vec!["orders".into()];
    client
}

// =============================================================================
// Client aggregates
// =============================================================================

#[tokio::test]
async fn deleting_client_leaves_no_child_rows() {
    let store = store();
    store.create_client(&client("web")).await.unwrap();
    store.create_client(&client("mobile")).await.unwrap();
    let rows_per_client = store.configuration_row_count().await / 2;

    assert!(store.delete_client("web").await.unwrap());
    assert_eq!(store.configuration_row_count().await, rows_per_client);
    assert!(store.load_client_entity("web").await.unwrap().is_none());
    assert!(store.find_client_by_id("mobile").await.unwrap().is_some());
}

#[tokio::test]
async fn removing_one_child_deletes_only_that_row() {
    let store = store();
    store.create_client(&client("web")).await.unwrap();
    let before = store.load_client_entity("web").await.unwrap().unwrap();

    let mut entity = before.clone();
    let removed = entity.redirect_uris.remove(1);
    store.save_client_entity(&entity).await.unwrap();

    let after = store.load_client_entity("web").await.unwrap().unwrap();
    let ids: Vec<i64> = after.redirect_uris.iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![before.redirect_uris[0].id, before.redirect_uris[2].id]);
    assert!(!ids.contains(&removed.id));
    assert_eq!(after.client_secrets, before.client_secrets);
    assert_eq!(after.allowed_grant_types, before.allowed_grant_types);
}

#[tokio::test]
async fn duplicate_client_identifier_is_rejected() {
    let store = store();
    store.create_client(&client("web")).await.unwrap();
    store.create_client(&client("mobile")).await.unwrap();

    let err = store.create_client(&client("web")).await.unwrap_err();
    assert!(err.is_constraint_violation());
    assert_eq!(err.constraint(), Some("UK_ClientId"));
}

#[tokio::test]
async fn over_long_redirect_uri_fails_without_partial_write() {
    let store = store();
    let mut bad = client("web");
    bad.redirect_uris.push(format!("https://app/{}", "x".repeat(2000)));

    let err = store.create_client(&bad).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(store.configuration_row_count().await, 0);
    assert!(store.find_client_by_id("web").await.unwrap().is_none());
}

#[tokio::test]
async fn failed_save_leaves_stored_aggregate_unchanged() {
    let store = store();
    store.create_client(&client("web")).await.unwrap();
    let before = store.load_client_entity("web").await.unwrap().unwrap();

    let mut entity = before.clone();
    entity.redirect_uris.clear();
    entity.client_secrets[0].id = 9_999;
    let err = store.save_client_entity(&entity).await.unwrap_err();
    assert!(err.is_constraint_violation());

    let after = store.load_client_entity("web").await.unwrap().unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn concurrent_saves_of_one_client_commit_whole_aggregates() {
    let store = Arc::new(store());
    store.create_client(&client("web")).await.unwrap();

    let mut tasks = Vec::new();
    for n in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let mut c = client("web");
            c.redirect_uris = (0..=n).map(|i| format!("https://app/{n}/{i}")).collect();
            store.save_client(&c).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stored = store.find_client_by_id("web").await.unwrap().unwrap();
    let prefix = stored.redirect_uris[0].rsplit_once('/').unwrap().0.to_string();
    assert!(stored.redirect_uris.iter().all(|u| u.starts_with(&prefix)));
    assert_eq!(
        stored.redirect_uris.len(),
        prefix.rsplit('/').next().unwrap().parse::<usize>().unwrap() + 1
    );
}

// =============================================================================
// Resources
// =============================================================================

#[tokio::test]
async fn scope_lookup_returns_both_resource_kinds() {
    let store = store();
    store
        .create_identity_resource(&IdentityResource::new("openid", &["sub"]))
        .await
        .unwrap();
    store
        .create_api_resource(&idsrv_store::model::ApiResource::new("orders"))
        .await
        .unwrap();

    let names: BTreeSet<String> = ["openid", "orders"].into_iter().map(String::from).collect();
    let resources = store.find_resources_by_scope_names(&names).await.unwrap();
    assert_eq!(resources.identity_resources.len(), 1);
    assert_eq!(resources.api_resources.len(), 1);
    assert_eq!(resources.scope_names(), names);
}

// =============================================================================
// Grants
// =============================================================================

fn grant(key: &str, expires_in: Duration) -> PersistedGrant {
    let now = now_utc();
    PersistedGrant {
        key: key.into(),
        grant_type: "authorization_code".into(),
        subject_id: Some("alice".into()),
        client_id: "web".into(),
        creation_time: now,
        expiration: Some(now + expires_in),
        data: "{}".into(),
        ..PersistedGrant::default()
    }
}

#[tokio::test]
async fn expired_grant_is_swept_and_gone() {
    let store = store();
    store.store(&grant("expired", Duration::minutes(-1))).await.unwrap();
    store.store(&grant("live", Duration::minutes(5))).await.unwrap();

    assert_eq!(store.remove_expired(now_utc()).await.unwrap(), 1);
    assert!(store.get("expired").await.unwrap().is_none());
    assert!(store.get("live").await.unwrap().is_some());
}

#[tokio::test]
async fn cleanup_pass_drains_expired_grants_in_batches() {
    let store = Arc::new(store());
    for n in 0..25 {
        store
            .store(&grant(&format!("g{n}"), Duration::minutes(-1)))
            .await
            .unwrap();
    }
    store.store(&grant("live", Duration::minutes(5))).await.unwrap();

    let cleanup = TokenCleanup::new(store.clone(), std::time::Duration::from_secs(60), 10);
    assert_eq!(cleanup.run_once().await.unwrap(), 25);
    assert_eq!(store.grant_count(), 1);
}

#[tokio::test]
async fn revocation_by_subject_and_client() {
    let store = store();
    store.store(&grant("a", Duration::minutes(5))).await.unwrap();
    let mut other = grant("b", Duration::minutes(5));
    other.client_id = "mobile".into();
    store.store(&other).await.unwrap();

    let filter = PersistedGrantFilter::for_subject("alice").with_client("mobile");
    assert_eq!(store.get_all(&filter).await.unwrap(), vec![other]);
    assert_eq!(store.remove_all(&filter).await.unwrap(), 1);
    assert_eq!(
        store
            .get_all(&PersistedGrantFilter::for_subject("alice"))
            .await
            .unwrap()
            .len(),
        1
    );
}
