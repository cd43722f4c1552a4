//! `InsertCsvFile` job handler: streams a CSV from object storage, batches
//! rows, and fans each batch to `EntityService::bulk_upsert` (§4.3).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use connectra_core::defaults::BATCH_SIZE_FOR_INSERTION;
use connectra_core::{
    CompanyRow, ContactRow, Error, InsertCsvFilePayload, Job, JobHandler, JobResponse, JobType,
    ObjectStore, Result,
};
use tokio::sync::mpsc;
use tokio_util::io::SyncIoBridge;
use tracing::{info, warn};

use crate::entity_service::EntityService;

pub struct InsertCsvFileHandler {
    object_store: Arc<dyn ObjectStore>,
    entity_service: Arc<EntityService>,
    default_bucket: String,
}

impl InsertCsvFileHandler {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        entity_service: Arc<EntityService>,
        default_bucket: impl Into<String>,
    ) -> Self {
        Self {
            object_store,
            entity_service,
            default_bucket: default_bucket.into(),
        }
    }
}

#[async_trait]
impl JobHandler for InsertCsvFileHandler {
    fn job_type(&self) -> JobType {
        JobType::InsertCsvFile
    }

    async fn run(&self, job: Job) -> Result<JobResponse> {
        let payload: InsertCsvFilePayload = serde_json::from_value(job.data.clone())?;
        let bucket = payload.s3_bucket.clone().unwrap_or_else(|| self.default_bucket.clone());

        let stream = self.object_store.read_stream(&bucket, &payload.s3_key).await?;
        let (tx, mut rx) = mpsc::channel::<std::result::Result<Vec<HashMap<String, String>>, String>>(2);

        let reader_task = tokio::task::spawn_blocking(move || stream_csv_batches(stream, tx));

        let mut response = JobResponse::default();
        let mut inserted = 0usize;

        while let Some(batch) = rx.recv().await {
            match batch {
                Ok(rows) => {
                    let (companies, contacts) = derive_rows(&rows);
                    match self.entity_service.bulk_upsert(companies, contacts).await {
                        Ok(outcome) => {
                            inserted += outcome.companies_upserted.max(outcome.contacts_upserted);
                            for err in &outcome.errors {
                                response.push_error(err.to_string());
                            }
                            if !outcome.is_success() {
                                reader_task.abort();
                                return Ok(finish_with_errors(response));
                            }
                        }
                        Err(err) => {
                            response.push_error(err.to_string());
                            reader_task.abort();
                            return Ok(finish_with_errors(response));
                        }
                    }
                }
                Err(err) => {
                    response.push_error(err.clone());
                    return Ok(finish_with_errors(response));
                }
            }
        }

        reader_task
            .await
            .map_err(|err| Error::Internal(format!("csv reader task panicked: {err}")))??;

        response.message = Some(format!("inserted {inserted} rows"));
        info!(job_uuid = %job.uuid, inserted, "insert_csv_file job completed");
        Ok(response)
    }
}

fn finish_with_errors(mut response: JobResponse) -> JobResponse {
    if response.message.is_none() {
        response.message = Some("insert_csv_file aborted with errors".to_string());
    }
    response
}

/// Runs on a blocking thread: bridges the async object-store stream to a
/// sync `csv::Reader`, canonicalizes headers/cells, and sends batches of
/// `BATCH_SIZE_FOR_INSERTION` rows back over `tx` (§4.3 steps 1-3).
fn stream_csv_batches(
    stream: Box<dyn tokio::io::AsyncRead + Send + Unpin>,
    tx: mpsc::Sender<std::result::Result<Vec<HashMap<String, String>>, String>>,
) -> Result<()> {
    let sync_reader = SyncIoBridge::new(stream);
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(sync_reader);
    let mut records = csv_reader.records();

    let headers = match records.next() {
        Some(Ok(record)) => record
            .iter()
            .map(connectra_core::uuid_utils::canonicalize_cell)
            .collect::<Vec<_>>(),
        Some(Err(err)) => {
            let _ = tx.blocking_send(Err(err.to_string()));
            return Err(Error::from(err));
        }
        None => return Ok(()),
    };

    let mut batch = Vec::with_capacity(BATCH_SIZE_FOR_INSERTION);
    for record in records {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                let _ = tx.blocking_send(Err(err.to_string()));
                return Err(Error::from(err));
            }
        };

        let row: HashMap<String, String> = headers
            .iter()
            .cloned()
            .zip(record.iter().map(connectra_core::uuid_utils::canonicalize_cell))
            .collect();
        batch.push(row);

        if batch.len() >= BATCH_SIZE_FOR_INSERTION {
            let sent = std::mem::replace(&mut batch, Vec::with_capacity(BATCH_SIZE_FOR_INSERTION));
            if tx.blocking_send(Ok(sent)).is_err() {
                warn!("insert_csv_file receiver dropped, stopping read early");
                return Ok(());
            }
        }
    }

    if !batch.is_empty() {
        let _ = tx.blocking_send(Ok(batch));
    }
    Ok(())
}

fn derive_rows(
    rows: &[HashMap<String, String>],
) -> (Vec<connectra_core::Company>, Vec<connectra_core::Contact>) {
    let mut companies = Vec::with_capacity(rows.len());
    let mut contacts = Vec::with_capacity(rows.len());

    for row in rows {
        let company_row = CompanyRow {
            name: row
                .get("company")
                .or_else(|| row.get("name"))
                .cloned()
                .unwrap_or_default(),
            email: row.get("email").cloned(),
            website: row.get("website").cloned(),
            linkedin_url: row.get("company_linkedin_url").cloned(),
            facebook_url: row.get("company_facebook_url").cloned(),
            twitter_url: row.get("company_twitter_url").cloned(),
            industries: row
                .get("industry")
                .or_else(|| row.get("industries"))
                .cloned(),
            keywords: row.get("keywords").cloned(),
            technologies: row.get("technologies").cloned(),
            departments: row.get("company_departments").cloned(),
            city: row.get("company_city").cloned(),
            state: row.get("company_state").cloned(),
            country: row.get("company_country").cloned(),
            phone: row.get("phone").cloned(),
            employees_count: row.get("employees_count").and_then(|v| v.parse().ok()),
            annual_revenue: row.get("annual_revenue").and_then(|v| v.parse().ok()),
            total_funding: row.get("total_funding").and_then(|v| v.parse().ok()),
            latest_funding: row.get("latest_funding").cloned(),
            latest_funding_amount: row.get("latest_funding_amount").and_then(|v| v.parse().ok()),
            last_raised_at: row
                .get("last_raised_at")
                .and_then(|v| chrono::DateTime::parse_from_rfc3339(v).ok())
                .map(|dt| dt.with_timezone(&chrono::Utc)),
        };
        let company = company_row.derive();

        let contact_row = ContactRow {
            first_name: row.get("first_name").cloned().unwrap_or_default(),
            last_name: row.get("last_name").cloned().unwrap_or_default(),
            email: row.get("email").cloned(),
            company_linkedin_url: row.get("company_linkedin_url").cloned(),
            person_linkedin_url: row.get("person_linkedin_url").cloned(),
            title: row.get("title").cloned(),
            departments: row.get("person_departments").or_else(|| row.get("company_departments")).cloned(),
            phone_mobile: row.get("phone_mobile").cloned(),
            phone_work_direct: row.get("phone_work_direct").cloned(),
            phone_home: row.get("phone_home").cloned(),
            phone_other: row.get("phone_other").cloned(),
            email_status: row.get("email_status").cloned(),
            seniority: row.get("seniority").cloned(),
            city: row.get("person_city").cloned(),
            state: row.get("person_state").cloned(),
            country: row.get("person_country").cloned(),
            facebook_url: row.get("person_facebook_url").cloned(),
            twitter_url: row.get("person_twitter_url").cloned(),
            stage: row.get("stage").cloned(),
        };
        let mut contact = contact_row.derive();
        contact.company_id = Some(company.uuid);

        companies.push(company);
        contacts.push(contact);
    }

    (companies, contacts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_rows_links_contact_to_company() {
        let mut row = HashMap::new();
        row.insert("name".to_string(), "Acme Inc".to_string());
        row.insert("first_name".to_string(), "Jane".to_string());
        row.insert("last_name".to_string(), "Doe".to_string());

        let (companies, contacts) = derive_rows(&[row]);
        assert_eq!(companies.len(), 1);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].company_id, Some(companies[0].uuid));
    }

    #[test]
    fn test_derive_rows_reads_company_and_industry_headers() {
        let mut row = HashMap::new();
        row.insert("first_name".to_string(), "Jane".to_string());
        row.insert("last_name".to_string(), "Doe".to_string());
        row.insert("email".to_string(), "jane@acme.test".to_string());
        row.insert("company".to_string(), "Acme Inc".to_string());
        row.insert("company_linkedin_url".to_string(), "linkedin.com/company/acme".to_string());
        row.insert("person_linkedin_url".to_string(), "linkedin.com/in/janedoe".to_string());
        row.insert("industry".to_string(), "Fintech".to_string());

        let (companies, contacts) = derive_rows(&[row]);
        assert_eq!(companies[0].name, "Acme Inc");
        assert_eq!(companies[0].industries, vec!["fintech"]);
        assert_eq!(contacts[0].company_id, Some(companies[0].uuid));
    }
}
