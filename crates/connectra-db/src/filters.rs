//! PostgreSQL adapter for `filters` and `filter_values` (§4.8).

use async_trait::async_trait;
use connectra_core::{Error, FilterDefinition, FilterRepository, FilterValue, Result, Service};
use sqlx::PgPool;
use std::str::FromStr;

pub struct PgFilterRepository {
    pool: PgPool,
}

impl PgFilterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn dedup_by_uuid(values: &[FilterValue]) -> Vec<&FilterValue> {
        let mut seen = std::collections::HashMap::new();
        for value in values {
            seen.insert(value.uuid, value);
        }
        seen.into_values().collect()
    }
}

#[async_trait]
impl FilterRepository for PgFilterRepository {
    async fn list_definitions(&self, service: &str) -> Result<Vec<FilterDefinition>> {
        let rows = sqlx::query_as::<_, FilterDefinitionRow>(
            "SELECT service, key, display_name, filter_type, direct_derived, active
             FROM filters
             WHERE service = $1 AND active = true AND deleted_at IS NULL",
        )
        .bind(service)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn bulk_upsert_values(&self, values: &[FilterValue]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let deduped = Self::dedup_by_uuid(values);

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for value in deduped {
            sqlx::query(
                "INSERT INTO filter_values (uuid, service, filter_key, value, display_value, deleted_at)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (uuid) DO NOTHING",
            )
            .bind(value.uuid)
            .bind(value.service.to_string())
            .bind(&value.filter_key)
            .bind(&value.value)
            .bind(&value.display_value)
            .bind(value.deleted_at)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn list_values(&self, service: &str, filter_key: &str) -> Result<Vec<FilterValue>> {
        let rows = sqlx::query_as::<_, FilterValueRow>(
            "SELECT uuid, service, filter_key, value, display_value, deleted_at
             FROM filter_values
             WHERE service = $1 AND filter_key = $2 AND deleted_at IS NULL",
        )
        .bind(service)
        .bind(filter_key)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_direct_derived_values(
        &self,
        service: &str,
        filter_key: &str,
    ) -> Result<Vec<String>> {
        let table = match service {
            "companies" => "companies",
            "contacts" => "contacts",
            other => return Err(Error::InvalidInput(format!("unknown service: {other}"))),
        };
        if !filter_key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::InvalidInput(format!(
                "invalid filter_key: {filter_key}"
            )));
        }

        let query = format!(
            "SELECT DISTINCT {filter_key}::text AS value FROM {table}
             WHERE {filter_key} IS NOT NULL AND deleted_at IS NULL
             ORDER BY value"
        );
        let rows: Vec<(String,)> = sqlx::query_as(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.into_iter().map(|(v,)| v).collect())
    }
}

#[derive(sqlx::FromRow)]
struct FilterDefinitionRow {
    service: String,
    key: String,
    display_name: String,
    filter_type: String,
    direct_derived: bool,
    active: bool,
}

impl TryFrom<FilterDefinitionRow> for FilterDefinition {
    type Error = Error;

    fn try_from(r: FilterDefinitionRow) -> Result<Self> {
        Ok(FilterDefinition {
            service: Service::from_str(&r.service)?,
            key: r.key,
            display_name: r.display_name,
            filter_type: r.filter_type,
            direct_derived: r.direct_derived,
            active: r.active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct FilterValueRow {
    uuid: uuid::Uuid,
    service: String,
    filter_key: String,
    value: String,
    display_value: String,
    deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<FilterValueRow> for FilterValue {
    type Error = Error;

    fn try_from(r: FilterValueRow) -> Result<Self> {
        Ok(FilterValue {
            uuid: r.uuid,
            service: Service::from_str(&r.service)?,
            filter_key: r.filter_key,
            value: r.value,
            display_value: r.display_value,
            deleted_at: r.deleted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_by_uuid() {
        let a = FilterValue::new(Service::Companies, "industry", "fintech");
        let b = FilterValue::new(Service::Companies, "industry", "fintech");
        let values = vec![a, b];
        let deduped = PgFilterRepository::dedup_by_uuid(&values);
        assert_eq!(deduped.len(), 1);
    }
}
