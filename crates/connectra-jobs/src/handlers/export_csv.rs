//! `ExportCsvFile` job handler: pages through a VQL query in `created_at`
//! descending order, writing matched rows to a CSV stream in object storage
//! (§4.9).

use std::sync::Arc;

use async_trait::async_trait;
use connectra_core::defaults::BATCH_SIZE_FOR_INSERTION;
use connectra_core::{
    Error, ExportCsvFilePayload, Job, JobHandler, JobResponse, JobType, ObjectStore,
    OrderBy, OrderDirection, Result, Service,
};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::info;

use crate::entity_service::EntityService;

pub struct ExportCsvFileHandler {
    object_store: Arc<dyn ObjectStore>,
    entity_service: Arc<EntityService>,
    default_bucket: String,
}

impl ExportCsvFileHandler {
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
impl JobHandler for ExportCsvFileHandler {
    fn job_type(&self) -> JobType {
        JobType::ExportCsvFile
    }

    async fn run(&self, job: Job) -> Result<JobResponse> {
        let payload: ExportCsvFilePayload = serde_json::from_value(job.data.clone())?;
        if payload.select_columns.is_empty() {
            return Err(Error::InvalidInput(
                "export_csv_file requires a non-empty select_columns".to_string(),
            ));
        }
        let service: Service = payload.service.parse()?;
        let bucket = payload.s3_bucket.clone().unwrap_or_else(|| self.default_bucket.clone());

        let mut vql = payload.vql.clone();
        vql.order_by = vec![OrderBy {
            order_by: "created_at".to_string(),
            order_direction: OrderDirection::Desc,
        }];
        vql.limit = Some(BATCH_SIZE_FOR_INSERTION as i64);

        let mut buffer = Vec::new();
        write_header(&mut buffer, &payload.select_columns).await?;

        let mut rows_written = 0usize;
        loop {
            let (rows, next_cursor) = self.entity_service.list_by_vql(service, &vql).await?;
            if rows.is_empty() {
                break;
            }
            for row in &rows {
                write_row(&mut buffer, &payload.select_columns, row).await?;
                rows_written += 1;
            }
            match next_cursor {
                Some(cursor) => vql.cursor = Some(cursor),
                None => break,
            }
        }

        let s3_key = format!("{}/{}.csv", payload.upload_path, job.uuid);
        let body: Box<dyn tokio::io::AsyncRead + Send + Unpin> =
            Box::new(std::io::Cursor::new(buffer));
        self.object_store.write_stream(&bucket, &s3_key, body).await?;

        let mut response = JobResponse::default();
        response.s3_key = Some(s3_key.clone());
        response.message = Some(format!("exported {rows_written} rows"));
        info!(job_uuid = %job.uuid, rows_written, s3_key, "export_csv_file job completed");
        Ok(response)
    }
}

async fn write_header(buffer: &mut (impl AsyncWrite + Unpin), columns: &[String]) -> Result<()> {
    let mut record = csv::StringRecord::new();
    for column in columns {
        record.push_field(column);
    }
    write_csv_record(buffer, &record).await
}

async fn write_row(
    buffer: &mut (impl AsyncWrite + Unpin),
    columns: &[String],
    row: &serde_json::Value,
) -> Result<()> {
    let mut record = csv::StringRecord::new();
    for column in columns {
        let value = row.get(column).map(json_cell_to_string).unwrap_or_default();
        record.push_field(&value);
    }
    write_csv_record(buffer, &record).await
}

fn json_cell_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(json_cell_to_string)
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

async fn write_csv_record(
    buffer: &mut (impl AsyncWrite + Unpin),
    record: &csv::StringRecord,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(record).map_err(Error::from)?;
    let bytes = writer.into_inner().map_err(|err| Error::Internal(err.to_string()))?;
    buffer.write_all(&bytes).await.map_err(Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_row_projects_selected_columns() {
        let mut buffer = Vec::new();
        let row = serde_json::json!({"name": "Acme", "country": ["US"]});
        write_row(&mut buffer, &["name".to_string(), "country".to_string()], &row)
            .await
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "Acme,US\n");
    }

    #[tokio::test]
    async fn test_write_row_defaults_missing_column_to_empty() {
        let mut buffer = Vec::new();
        let row = serde_json::json!({"name": "Acme"});
        write_row(&mut buffer, &["name".to_string(), "website".to_string()], &row)
            .await
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "Acme,\n");
    }
}
