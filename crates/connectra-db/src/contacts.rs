//! PostgreSQL adapter for the `contacts` table (§4.4, §4.5).

use async_trait::async_trait;
use connectra_core::{Contact, ContactRepository, Error, Result};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgContactRepository {
    pool: PgPool,
}

impl PgContactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn dedup_by_uuid(contacts: &[Contact]) -> Vec<&Contact> {
        let mut seen = std::collections::HashMap::new();
        for contact in contacts {
            seen.insert(contact.uuid, contact);
        }
        seen.into_values().collect()
    }
}

#[async_trait]
impl ContactRepository for PgContactRepository {
    async fn bulk_upsert(&self, contacts: &[Contact]) -> Result<()> {
        if contacts.is_empty() {
            return Ok(());
        }
        let deduped = Self::dedup_by_uuid(contacts);

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for contact in deduped {
            sqlx::query(
                "INSERT INTO contacts (
                    uuid, first_name, last_name, email, company_id, title, departments,
                    phone_mobile, phone_work_direct, phone_home, phone_other,
                    email_status, seniority, city, state, country,
                    linkedin_url, facebook_url, twitter_url, stage,
                    created_at, updated_at, deleted_at
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, $22, $23
                )
                ON CONFLICT (uuid) DO UPDATE SET
                    first_name = EXCLUDED.first_name,
                    last_name = EXCLUDED.last_name,
                    email = EXCLUDED.email,
                    company_id = EXCLUDED.company_id,
                    title = EXCLUDED.title,
                    departments = EXCLUDED.departments,
                    phone_mobile = EXCLUDED.phone_mobile,
                    phone_work_direct = EXCLUDED.phone_work_direct,
                    phone_home = EXCLUDED.phone_home,
                    phone_other = EXCLUDED.phone_other,
                    email_status = EXCLUDED.email_status,
                    seniority = EXCLUDED.seniority,
                    city = EXCLUDED.city,
                    state = EXCLUDED.state,
                    country = EXCLUDED.country,
                    linkedin_url = EXCLUDED.linkedin_url,
                    facebook_url = EXCLUDED.facebook_url,
                    twitter_url = EXCLUDED.twitter_url,
                    stage = EXCLUDED.stage,
                    updated_at = EXCLUDED.updated_at",
            )
            .bind(contact.uuid)
            .bind(&contact.first_name)
            .bind(&contact.last_name)
            .bind(&contact.email)
            .bind(contact.company_id)
            .bind(&contact.title)
            .bind(&contact.departments)
            .bind(&contact.phone_mobile)
            .bind(&contact.phone_work_direct)
            .bind(&contact.phone_home)
            .bind(&contact.phone_other)
            .bind(&contact.email_status)
            .bind(&contact.seniority)
            .bind(&contact.city)
            .bind(&contact.state)
            .bind(&contact.country)
            .bind(&contact.linkedin_url)
            .bind(&contact.facebook_url)
            .bind(&contact.twitter_url)
            .bind(&contact.stage)
            .bind(contact.created_at)
            .bind(contact.updated_at)
            .bind(contact.deleted_at)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, uuid: Uuid) -> Result<Option<Contact>> {
        let row = sqlx::query_as::<_, ContactRow>(
            "SELECT uuid, first_name, last_name, email, company_id, title, departments,
                    phone_mobile, phone_work_direct, phone_home, phone_other,
                    email_status, seniority, city, state, country,
                    linkedin_url, facebook_url, twitter_url, stage,
                    created_at, updated_at, deleted_at
             FROM contacts WHERE uuid = $1",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.map(Into::into))
    }

    async fn upsert_one(&self, contact: &Contact) -> Result<()> {
        self.bulk_upsert(std::slice::from_ref(contact)).await
    }

    async fn soft_delete(&self, uuid: Uuid) -> Result<()> {
        sqlx::query("UPDATE contacts SET deleted_at = now() WHERE uuid = $1")
            .bind(uuid)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ContactRow {
    uuid: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    company_id: Option<Uuid>,
    title: Option<String>,
    departments: Vec<String>,
    phone_mobile: String,
    phone_work_direct: String,
    phone_home: String,
    phone_other: String,
    email_status: Option<String>,
    seniority: Option<String>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    linkedin_url: Option<String>,
    facebook_url: Option<String>,
    twitter_url: Option<String>,
    stage: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<ContactRow> for Contact {
    fn from(r: ContactRow) -> Self {
        Contact {
            uuid: r.uuid,
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            company_id: r.company_id,
            title: r.title,
            departments: r.departments,
            phone_mobile: r.phone_mobile,
            phone_work_direct: r.phone_work_direct,
            phone_home: r.phone_home,
            phone_other: r.phone_other,
            email_status: r.email_status,
            seniority: r.seniority,
            city: r.city,
            state: r.state,
            country: r.country,
            linkedin_url: r.linkedin_url,
            facebook_url: r.facebook_url,
            twitter_url: r.twitter_url,
            stage: r.stage,
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
    fn test_dedup_by_uuid_keeps_one_per_uuid() {
        let uuid = Uuid::new_v4();
        let contacts = vec![sample_contact(uuid), sample_contact(uuid)];
        let deduped = PgContactRepository::dedup_by_uuid(&contacts);
        assert_eq!(deduped.len(), 1);
    }

    fn sample_contact(uuid: Uuid) -> Contact {
        Contact {
            uuid,
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            email: String::new(),
            company_id: None,
            title: None,
            departments: vec![],
            phone_mobile: String::new(),
            phone_work_direct: String::new(),
            phone_home: String::new(),
            phone_other: String::new(),
            email_status: None,
            seniority: None,
            city: None,
            state: None,
            country: None,
            linkedin_url: None,
            facebook_url: None,
            twitter_url: None,
            stage: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            deleted_at: None,
        }
    }
}
