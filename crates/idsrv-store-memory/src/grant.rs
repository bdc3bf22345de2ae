use async_trait::async_trait;
use idsrv_store::entities::PersistedGrant;
use idsrv_store::error::StoreResult;
use idsrv_store::mapping::{EntityKind, Record};
use idsrv_store::model::PersistedGrantFilter;
use idsrv_store::store::{PersistedGrantStore, check_expiration_unchanged};
use papaya::{Compute, Operation};
use time::OffsetDateTime;
use tracing::debug;

use crate::store::InMemoryStore;

impl InMemoryStore {
    fn remove_keys(&self, keys: Vec<String>) -> u64 {
        let guard = self.grants.pin();
        keys.iter().filter(|key| guard.remove(*key).is_some()).count() as u64
    }
}

#[async_trait]
impl PersistedGrantStore for InMemoryStore {
    async fn store(&self, grant: &PersistedGrant) -> StoreResult<()> {
        self.context
            .operational
            .get(EntityKind::PersistedGrant)?
            .validate_row(&grant.to_row())?;

        let guard = self.grants.pin();
        let result = guard.compute(grant.key.clone(), |entry| {
            match check_expiration_unchanged(entry.map(|(_, current)| current), grant) {
                Ok(()) => Operation::Insert(grant.clone()),
                Err(e) => Operation::Abort(e),
            }
        });

        match result {
            Compute::Aborted(e) => Err(e),
            _ => {
                debug!(key = %grant.key, grant_type = %grant.grant_type, "Stored grant");
                Ok(())
            }
        }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<PersistedGrant>> {
        Ok(self.grants.pin().get(key).cloned())
    }

    async fn get_all(&self, filter: &PersistedGrantFilter) -> StoreResult<Vec<PersistedGrant>> {
        filter.validate()?;

        let guard = self.grants.pin();
        let mut grants: Vec<PersistedGrant> = guard
            .iter()
            .filter(|(_, grant)| filter.matches(grant))
            .map(|(_, grant)| grant.clone())
            .collect();
        grants.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(grants)
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        Ok(self.grants.pin().remove(key).is_some())
    }

    async fn remove_all(&self, filter: &PersistedGrantFilter) -> StoreResult<u64> {
        filter.validate()?;

        let keys: Vec<String> = self
            .grants
            .pin()
            .iter()
            .filter(|(_, grant)| filter.matches(grant))
            .map(|(key, _)| key.clone())
            .collect();
        Ok(self.remove_keys(keys))
    }

    async fn update_consumed_time(&self, key: &str, consumed: OffsetDateTime) -> StoreResult<bool> {
        let guard = self.grants.pin();
        let result = guard.compute(key.to_string(), |entry| match entry {
            Some((_, current)) => Operation::Insert(PersistedGrant {
                consumed_time: Some(consumed),
                ..current.clone()
            }),
            None => Operation::Abort(()),
        });
        Ok(matches!(result, Compute::Updated { .. }))
    }

    async fn remove_expired(&self, cutoff: OffsetDateTime) -> StoreResult<u64> {
        let keys: Vec<String> = self
            .grants
            .pin()
            .iter()
            .filter(|(_, grant)| grant.is_expired_at(cutoff))
            .map(|(key, _)| key.clone())
            .collect();
        Ok(self.remove_keys(keys))
    }

    async fn remove_expired_batch(&self, cutoff: OffsetDateTime, batch_size: usize) -> StoreResult<u64> {
        let mut expired: Vec<(OffsetDateTime, String)> = self
            .grants
            .pin()
            .iter()
            .filter(|(_, grant)| grant.is_expired_at(cutoff))
            .filter_map(|(key, grant)| grant.expiration.map(|at| (at, key.clone())))
            .collect();
        expired.sort();
        expired.truncate(batch_size);

        Ok(self.remove_keys(expired.into_iter().map(|(_, key)| key).collect()))
    }
}
