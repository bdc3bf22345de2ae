use async_trait::async_trait;
use idsrv_store::entities;
use idsrv_store::error::StoreResult;
use idsrv_store::model::Client;
use idsrv_store::store::{ClientRepository, ClientStore};
use idsrv_store::translate::Translate;
use tracing::instrument;

use crate::store::PostgresIdentityStore;

const CLIENT_ID: &str = "ClientId";

#[async_trait]
impl ClientStore for PostgresIdentityStore {
    async fn find_client_by_id(&self, client_id: &str) -> StoreResult<Option<Client>> {
        let entity = self
            .find_aggregate::<entities::Client>(CLIENT_ID, client_id)
            .await?;
        Ok(entity.map(|e| self.context.translator.to_model(&e)))
    }
}

#[async_trait]
impl ClientRepository for PostgresIdentityStore {
    #[instrument(skip(self, client), fields(client_id = %client.client_id))]
    async fn create_client(&self, client: &Client) -> StoreResult<()> {
        let entity: entities::Client = self.context.translator.to_entity(client);
        self.write_aggregate(&entity, None).await?;
        Ok(())
    }

    #[instrument(skip(self, client), fields(client_id = %client.client_id))]
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

    #[instrument(skip(self))]
    async fn delete_client(&self, client_id: &str) -> StoreResult<bool> {
        self.delete_aggregate::<entities::Client>(CLIENT_ID, client_id)
            .await
    }
}
