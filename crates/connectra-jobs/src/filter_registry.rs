//! `FilterRegistry`: caches filter catalogs and materialized values on top
//! of a `FilterRepository` (§4.8).

use std::sync::Arc;
use std::time::Duration;

use connectra_core::cache::TtlCache;
use connectra_core::defaults::{
    CACHE_SWEEP_INTERVAL_SECS, FILTER_METADATA_CACHE_MAX_ENTRIES, FILTER_METADATA_CACHE_TTL_SECS,
    FILTER_VALUE_CACHE_MAX_ENTRIES, FILTER_VALUE_CACHE_TTL_SECS,
    FILTER_VALUE_DIRECT_DERIVED_CACHE_TTL_SECS,
};
use connectra_core::{FilterDefinition, FilterRepository, FilterValueResponse, Result};

const METADATA_PREFIX: &str = "filters:";
const VALUE_PREFIX: &str = "filter_data:";

pub struct FilterRegistry {
    repository: Arc<dyn FilterRepository>,
    metadata_cache: TtlCache<Arc<[FilterDefinition]>>,
    value_cache: TtlCache<Arc<[FilterValueResponse]>>,
}

impl FilterRegistry {
    pub fn new(repository: Arc<dyn FilterRepository>) -> Self {
        Self {
            repository,
            metadata_cache: TtlCache::new(FILTER_METADATA_CACHE_MAX_ENTRIES),
            value_cache: TtlCache::new(FILTER_VALUE_CACHE_MAX_ENTRIES),
        }
    }

    /// Spawn the shared background sweeper for both caches.
    pub fn spawn_sweeper(&self) -> Vec<tokio::task::JoinHandle<()>> {
        let interval = Duration::from_secs(CACHE_SWEEP_INTERVAL_SECS);
        vec![
            self.metadata_cache.spawn_sweeper(interval),
            self.value_cache.spawn_sweeper(interval),
        ]
    }

    /// List filter definitions for `service`, cached for `FILTER_METADATA_CACHE_TTL_SECS`.
    pub async fn list_definitions(&self, service: &str) -> Result<Arc<[FilterDefinition]>> {
        let key = format!("{METADATA_PREFIX}{service}");
        if let Some(cached) = self.metadata_cache.get(&key).await {
            return Ok(cached);
        }
        let definitions: Arc<[FilterDefinition]> =
            self.repository.list_definitions(service).await?.into();
        self.metadata_cache
            .set(
                key,
                definitions.clone(),
                Duration::from_secs(FILTER_METADATA_CACHE_TTL_SECS),
            )
            .await;
        Ok(definitions)
    }

    /// Resolve filter values for `(service, filter_key)`, cached under an
    /// md5 of the call's distinguishing parameters. `direct_derived` filters
    /// get a shorter TTL since they read live entity columns.
    pub async fn list_values(
        &self,
        service: &str,
        filter_key: &str,
        direct_derived: bool,
    ) -> Result<Arc<[FilterValueResponse]>> {
        let cache_key = format!(
            "{VALUE_PREFIX}{service}:{:x}",
            md5::compute(format!("{service}:{filter_key}:{direct_derived}"))
        );
        if let Some(cached) = self.value_cache.get(&cache_key).await {
            return Ok(cached);
        }

        let responses: Arc<[FilterValueResponse]> = if direct_derived {
            self.repository
                .list_direct_derived_values(service, filter_key)
                .await?
                .into_iter()
                .map(|value| FilterValueResponse {
                    display_value: value.clone(),
                    value,
                })
                .collect::<Vec<_>>()
                .into()
        } else {
            self.repository
                .list_values(service, filter_key)
                .await?
                .into_iter()
                .map(|fv| FilterValueResponse {
                    value: fv.value,
                    display_value: fv.display_value,
                })
                .collect::<Vec<_>>()
                .into()
        };

        let ttl = if direct_derived {
            FILTER_VALUE_DIRECT_DERIVED_CACHE_TTL_SECS
        } else {
            FILTER_VALUE_CACHE_TTL_SECS
        };
        self.value_cache
            .set(cache_key, responses.clone(), Duration::from_secs(ttl))
            .await;
        Ok(responses)
    }

    /// Invalidate both caches for `service` after a write that touches
    /// filter values (§4.8).
    pub async fn invalidate(&self, service: &str) {
        self.metadata_cache
            .invalidate_by_prefix(&format!("{METADATA_PREFIX}{service}"))
            .await;
        self.value_cache
            .invalidate_by_prefix(&format!("{VALUE_PREFIX}{service}"))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use connectra_core::FilterValue;

    struct StubFilterRepository {
        definitions: Vec<FilterDefinition>,
    }

    #[async_trait]
    impl FilterRepository for StubFilterRepository {
        async fn list_definitions(&self, _service: &str) -> Result<Vec<FilterDefinition>> {
            Ok(self.definitions.clone())
        }

        async fn bulk_upsert_values(&self, _values: &[FilterValue]) -> Result<()> {
            Ok(())
        }

        async fn list_values(&self, _service: &str, _filter_key: &str) -> Result<Vec<FilterValue>> {
            Ok(vec![])
        }

        async fn list_direct_derived_values(
            &self,
            _service: &str,
            _filter_key: &str,
        ) -> Result<Vec<String>> {
            Ok(vec!["usa".to_string()])
        }
    }

    #[tokio::test]
    async fn test_list_definitions_is_cached_on_second_call() {
        let repo = Arc::new(StubFilterRepository {
            definitions: vec![FilterDefinition {
                service: connectra_core::Service::Companies,
                key: "industry".to_string(),
                display_name: "Industry".to_string(),
                filter_type: "keyword".to_string(),
                direct_derived: false,
                active: true,
            }],
        });
        let registry = FilterRegistry::new(repo);
        let first = registry.list_definitions("companies").await.unwrap();
        let second = registry.list_definitions("companies").await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_direct_derived_values_resolve() {
        let repo = Arc::new(StubFilterRepository { definitions: vec![] });
        let registry = FilterRegistry::new(repo);
        let values = registry.list_values("companies", "country", true).await.unwrap();
        assert_eq!(values[0].value, "usa");
    }
}
