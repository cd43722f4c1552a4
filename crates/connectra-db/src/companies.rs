//! PostgreSQL adapter for the `companies` table (§4.4, §4.5).

use async_trait::async_trait;
use connectra_core::{Company, CompanyRepository, Error, Result};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgCompanyRepository {
    pool: PgPool,
}

impl PgCompanyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn dedup_by_uuid(companies: &[Company]) -> Vec<&Company> {
        let mut seen = std::collections::HashMap::new();
        for company in companies {
            seen.insert(company.uuid, company);
        }
        seen.into_values().collect()
    }
}

#[async_trait]
impl CompanyRepository for PgCompanyRepository {
    async fn bulk_upsert(&self, companies: &[Company]) -> Result<()> {
        if companies.is_empty() {
            return Ok(());
        }
        let deduped = Self::dedup_by_uuid(companies);

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for company in deduped {
            sqlx::query(
                "INSERT INTO companies (
                    uuid, name, normalized_domain, employees_count, annual_revenue,
                    total_funding, latest_funding, latest_funding_amount, last_raised_at,
                    industries, keywords, technologies, departments,
                    city, state, country, website, linkedin_url, facebook_url, twitter_url,
                    phone, created_at, updated_at, deleted_at
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24
                )
                ON CONFLICT (uuid) DO UPDATE SET
                    name = EXCLUDED.name,
                    normalized_domain = EXCLUDED.normalized_domain,
                    employees_count = EXCLUDED.employees_count,
                    annual_revenue = EXCLUDED.annual_revenue,
                    total_funding = EXCLUDED.total_funding,
                    latest_funding = EXCLUDED.latest_funding,
                    latest_funding_amount = EXCLUDED.latest_funding_amount,
                    last_raised_at = EXCLUDED.last_raised_at,
                    industries = EXCLUDED.industries,
                    keywords = EXCLUDED.keywords,
                    technologies = EXCLUDED.technologies,
                    departments = EXCLUDED.departments,
                    city = EXCLUDED.city,
                    state = EXCLUDED.state,
                    country = EXCLUDED.country,
                    website = EXCLUDED.website,
                    linkedin_url = EXCLUDED.linkedin_url,
                    facebook_url = EXCLUDED.facebook_url,
                    twitter_url = EXCLUDED.twitter_url,
                    phone = EXCLUDED.phone,
                    updated_at = EXCLUDED.updated_at",
            )
            .bind(company.uuid)
            .bind(&company.name)
            .bind(&company.normalized_domain)
            .bind(company.employees_count)
            .bind(company.annual_revenue)
            .bind(company.total_funding)
            .bind(&company.latest_funding)
            .bind(company.latest_funding_amount)
            .bind(company.last_raised_at)
            .bind(&company.industries)
            .bind(&company.keywords)
            .bind(&company.technologies)
            .bind(&company.departments)
            .bind(&company.city)
            .bind(&company.state)
            .bind(&company.country)
            .bind(&company.website)
            .bind(&company.linkedin_url)
            .bind(&company.facebook_url)
            .bind(&company.twitter_url)
            .bind(&company.phone)
            .bind(company.created_at)
            .bind(company.updated_at)
            .bind(company.deleted_at)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, uuid: Uuid) -> Result<Option<Company>> {
        let row = sqlx::query_as::<_, CompanyRow>(
            "SELECT uuid, name, normalized_domain, employees_count, annual_revenue,
                    total_funding, latest_funding, latest_funding_amount, last_raised_at,
                    industries, keywords, technologies, departments,
                    city, state, country, website, linkedin_url, facebook_url, twitter_url,
                    phone, created_at, updated_at, deleted_at
             FROM companies WHERE uuid = $1",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.map(Into::into))
    }

    async fn get_many(&self, uuids: &[Uuid]) -> Result<Vec<Company>> {
        if uuids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, CompanyRow>(
            "SELECT uuid, name, normalized_domain, employees_count, annual_revenue,
                    total_funding, latest_funding, latest_funding_amount, last_raised_at,
                    industries, keywords, technologies, departments,
                    city, state, country, website, linkedin_url, facebook_url, twitter_url,
                    phone, created_at, updated_at, deleted_at
             FROM companies WHERE uuid = ANY($1)",
        )
        .bind(uuids)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn upsert_one(&self, company: &Company) -> Result<()> {
        self.bulk_upsert(std::slice::from_ref(company)).await
    }

    async fn soft_delete(&self, uuid: Uuid) -> Result<()> {
        sqlx::query("UPDATE companies SET deleted_at = now() WHERE uuid = $1")
            .bind(uuid)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct CompanyRow {
    uuid: Uuid,
    name: String,
    normalized_domain: String,
    employees_count: Option<i64>,
    annual_revenue: Option<f64>,
    total_funding: Option<f64>,
    latest_funding: Option<String>,
    latest_funding_amount: Option<f64>,
    last_raised_at: Option<chrono::DateTime<chrono::Utc>>,
    industries: Vec<String>,
    keywords: Vec<String>,
    technologies: Vec<String>,
    departments: Vec<String>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    website: Option<String>,
    linkedin_url: Option<String>,
    facebook_url: Option<String>,
    twitter_url: Option<String>,
    phone: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<CompanyRow> for Company {
    fn from(r: CompanyRow) -> Self {
        Company {
            uuid: r.uuid,
            name: r.name,
            normalized_domain: r.normalized_domain,
            employees_count: r.employees_count,
            annual_revenue: r.annual_revenue,
            total_funding: r.total_funding,
            latest_funding: r.latest_funding,
            latest_funding_amount: r.latest_funding_amount,
            last_raised_at: r.last_raised_at,
            industries: r.industries,
            keywords: r.keywords,
            technologies: r.technologies,
            departments: r.departments,
            city: r.city,
            state: r.state,
            country: r.country,
            website: r.website,
            linkedin_url: r.linkedin_url,
            facebook_url: r.facebook_url,
            twitter_url: r.twitter_url,
            phone: r.phone,
            created_at: r.created_at,
            updated_at: r.updated_at,
            deleted_at: r.deleted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_by_uuid_last_occurrence_wins() {
        let uuid = Uuid::new_v4();
        let mut a = sample_company(uuid);
        a.name = "first".into();
        let mut b = sample_company(uuid);
        b.name = "second".into();
        let companies = vec![a, b];
        let deduped = PgCompanyRepository::dedup_by_uuid(&companies);
        assert_eq!(deduped.len(), 1);
    }

    fn sample_company(uuid: Uuid) -> Company {
        Company {
            uuid,
            name: "Acme".into(),
            normalized_domain: "acme.com".into(),
            employees_count: None,
            annual_revenue: None,
            total_funding: None,
            latest_funding: None,
            latest_funding_amount: None,
            last_raised_at: None,
            industries: vec![],
            keywords: vec![],
            technologies: vec![],
            departments: vec![],
            city: None,
            state: None,
            country: None,
            website: None,
            linkedin_url: None,
            facebook_url: None,
            twitter_url: None,
            phone: String::new(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            deleted_at: None,
        }
    }
}
