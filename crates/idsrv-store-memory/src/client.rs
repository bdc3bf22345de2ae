use async_trait::async_trait;
use idsrv_store::entities;
use idsrv_store::error::StoreResult;
use idsrv_store::model::Client;
use idsrv_store::store::{ClientRepository, ClientStore};
use idsrv_store::translate::Translate;

use crate::store::InMemoryStore;

const CLIENT_ID: &str = "ClientId";

#[async_trait]
impl ClientStore for InMemoryStore {
    async fn find_client_by_id(&self, client_id: &str) -> StoreResult<Option<Client>> {
        let entity = self
            .find_aggregate::<entities::Client>(CLIENT_ID, client_id)
            .await?;
        Ok(entity.map(|e| self.context.translator.to_model(&e)))
    }
}

#[async_trait]
impl ClientRepository for InMemoryStore {
    async fn create_client(&self, client: &Client) -> StoreResult<()> {
        let entity: entities::Client = self.context.translator.to_entity(client);
        self.write_aggregate(&entity, None).await?;
        Ok(())
    }

    async fn save_client(&self, client: &Client) -> StoreResult<()> {
        let entity: entities::Client = self.context.translator.to_entity(client);
        self.write_aggregate(&entity, Some((CLIENT_ID, &client.client_id)))
            .await?;
        Ok(())
    }

    async fn load_client_entity(&self, client_id: &str) -> StoreResult<Option<entities::Client>> {
        self.find_aggregate(CLIENT_ID, client_id).await
    }

    async fn save_client_entity(&self, client: &entities::Client) -> StoreResult<i64> {
        self.write_aggregate(client, None).await
    }

    async fn delete_client(&self, client_id: &str) -> StoreResult<bool> {
        self.delete_aggregate::<entities::Client>(CLIENT_ID, client_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use idsrv_store::StoreConfig;
    use idsrv_store::model::{Claim, Secret};

    use super::*;

    fn store() -> InMemoryStore {
        InMemoryStore::new(&StoreConfig::default()).unwrap()
    }

    fn web_client() -> Client {
        let mut client = Client::new("web");
        client.allowed_grant_types = vec!["authorization_code".into()];
        client.redirect_uris = vec!["https://app/cb".into()];
        client.client_secrets = vec![Secret::new("hash")];
        client.claims = vec![Claim::new("role", "admin")];
        client
    }

    #[tokio::test]
    async fn test_create_then_find() {
        let store = store();
        store.create_client(&web_client()).await.unwrap();

        let found = store.find_client_by_id("web").await.unwrap().unwrap();
        assert_eq!(found, web_client());
        assert!(store.find_client_by_id("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_client_id_fails() {
        let store = store();
        store.create_client(&web_client()).await.unwrap();

        let err = store.create_client(&web_client()).await.unwrap_err();
        assert_eq!(err.constraint(), Some("UK_ClientId"));
        assert_eq!(store.configuration_row_count().await, 5);
    }

    #[tokio::test]
    async fn test_save_keeps_unchanged_child_rows() {
        let store = store();
        store.create_client(&web_client()).await.unwrap();
        let before = store.load_client_entity("web").await.unwrap().unwrap();

        let mut changed = web_client();
        changed.redirect_uris.push("https://app/cb2".into());
        store.save_client(&changed).await.unwrap();

        let after = store.load_client_entity("web").await.unwrap().unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.redirect_uris[0].id, before.redirect_uris[0].id);
        assert_eq!(after.redirect_uris.len(), 2);
        assert_eq!(after.client_secrets[0].id, before.client_secrets[0].id);
    }

    #[tokio::test]
    async fn test_delete_removes_every_row() {
        let store = store();
        store.create_client(&web_client()).await.unwrap();

        assert!(store.delete_client("web").await.unwrap());
        assert!(!store.delete_client("web").await.unwrap());
        assert_eq!(store.configuration_row_count().await, 0);
    }
}
