use std::collections::BTreeSet;

use async_trait::async_trait;
use idsrv_store::entities;
use idsrv_store::error::StoreResult;
use idsrv_store::model::{ApiResource, IdentityResource, Resources};
use idsrv_store::store::{ResourceRepository, ResourceStore};
use idsrv_store::translate::Translate;

use crate::store::{InMemoryStore, NAME};

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn find_identity_resources_by_scope(
        &self,
        scope_names: &BTreeSet<String>,
    ) -> StoreResult<Vec<IdentityResource>> {
        let translator = &self.context.translator;
        Ok(self
            .all_aggregates::<entities::IdentityResource>()
            .await?
            .iter()
            .filter(|r| scope_names.contains(&r.name))
            .map(|r| translator.to_model(r))
            .collect())
    }

    async fn find_api_resources_by_scope(
        &self,
        scope_names: &BTreeSet<String>,
    ) -> StoreResult<Vec<ApiResource>> {
        let translator = &self.context.translator;
        Ok(self
            .all_aggregates::<entities::ApiResource>()
            .await?
            .iter()
            .filter(|r| r.scopes.iter().any(|s| scope_names.contains(&s.name)))
            .map(|r| translator.to_model(r))
            .collect())
    }

    async fn find_api_resource_by_name(&self, name: &str) -> StoreResult<Option<ApiResource>> {
        let entity = self
            .find_aggregate::<entities::ApiResource>(NAME, name)
            .await?;
        Ok(entity.map(|e| self.context.translator.to_model(&e)))
    }

    async fn get_all_resources(&self) -> StoreResult<Resources> {
        let translator = &self.context.translator;
        Ok(Resources {
            identity_resources: self
                .all_aggregates::<entities::IdentityResource>()
                .await?
                .iter()
                .map(|r| translator.to_model(r))
                .collect(),
            api_resources: self
                .all_aggregates::<entities::ApiResource>()
                .await?
                .iter()
                .map(|r| translator.to_model(r))
                .collect(),
        })
    }
}

#[async_trait]
impl ResourceRepository for InMemoryStore {
    async fn create_api_resource(&self, resource: &ApiResource) -> StoreResult<()> {
        let entity: entities::ApiResource = self.context.translator.to_entity(resource);
        self.write_aggregate(&entity, None).await?;
        Ok(())
    }

    async fn save_api_resource(&self, resource: &ApiResource) -> StoreResult<()> {
        let entity: entities::ApiResource = self.context.translator.to_entity(resource);
        self.save_resource(entity, &resource.name, resource.created)
            .await?;
        Ok(())
    }

    async fn load_api_resource_entity(
        &self,
        name: &str,
    ) -> StoreResult<Option<entities::ApiResource>> {
        self.find_aggregate(NAME, name).await
    }

    async fn save_api_resource_entity(&self, resource: &entities::ApiResource) -> StoreResult<i64> {
        self.write_aggregate(resource, None).await
    }

    async fn delete_api_resource(&self, name: &str) -> StoreResult<bool> {
        self.delete_aggregate::<entities::ApiResource>(NAME, name)
            .await
    }

    async fn create_identity_resource(&self, resource: &IdentityResource) -> StoreResult<()> {
        let entity: entities::IdentityResource = self.context.translator.to_entity(resource);
        self.write_aggregate(&entity, None).await?;
        Ok(())
    }

    async fn save_identity_resource(&self, resource: &IdentityResource) -> StoreResult<()> {
        let entity: entities::IdentityResource = self.context.translator.to_entity(resource);
        self.save_resource(entity, &resource.name, resource.created)
            .await?;
        Ok(())
    }

    async fn load_identity_resource_entity(
        &self,
        name: &str,
    ) -> StoreResult<Option<entities::IdentityResource>> {
        self.find_aggregate(NAME, name).await
    }

    async fn save_identity_resource_entity(
        &self,
        resource: &entities::IdentityResource,
    ) -> StoreResult<i64> {
        self.write_aggregate(resource, None).await
    }

    async fn delete_identity_resource(&self, name: &str) -> StoreResult<bool> {
        self.delete_aggregate::<entities::IdentityResource>(NAME, name)
            .await
    }
}
