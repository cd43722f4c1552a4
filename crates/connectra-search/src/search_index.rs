//! HTTP adapter implementing [`SearchIndex`] against an
//! Elasticsearch/OpenSearch-compatible engine (§6): newline-delimited
//! `_bulk`, `_search` with `query/sort/search_after/from/size/_source`,
//! `_count`, and single-document `index`/`delete`.

use async_trait::async_trait;
use connectra_core::{Error, Result, SearchIndex, SearchPage};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

/// Configuration for the HTTP search-engine client.
#[derive(Debug, Clone)]
pub struct EsClientConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

pub struct EsSearchIndex {
    client: Client,
    config: EsClientConfig,
}

impl EsSearchIndex {
    pub fn new(config: EsClientConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.request(method, self.url(path));
        match (&self.config.username, &self.config.password) {
            (Some(user), Some(pass)) => req.basic_auth(user, Some(pass)),
            _ => req,
        }
    }
}

#[async_trait]
impl SearchIndex for EsSearchIndex {
    async fn bulk_index(
        &self,
        index_name: &str,
        documents: &[(Uuid, Value)],
    ) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let mut body = String::new();
        for (doc_id, document) in documents {
            let action = serde_json::json!({ "index": { "_index": index_name, "_id": doc_id.to_string() } });
            body.push_str(&action.to_string());
            body.push('\n');
            body.push_str(&document.to_string());
            body.push('\n');
        }

        let response = self
            .request(reqwest::Method::POST, "_bulk")
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(Error::from)?;

        if !response.status().is_success() {
            return Err(Error::Search(format!(
                "bulk index failed with status {}",
                response.status()
            )));
        }

        let payload: Value = response.json().await.map_err(Error::from)?;
        if payload.get("errors").and_then(Value::as_bool).unwrap_or(false) {
            warn!(index_name, "bulk index reported partial failures");
        }
        Ok(())
    }

    async fn index_one(
        &self,
        index_name: &str,
        doc_id: Uuid,
        document: Value,
    ) -> Result<()> {
        let path = format!("{index_name}/_doc/{doc_id}");
        let response = self
            .request(reqwest::Method::PUT, &path)
            .json(&document)
            .send()
            .await
            .map_err(Error::from)?;

        if !response.status().is_success() {
            return Err(Error::Search(format!(
                "index_one failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn delete_one(&self, index_name: &str, doc_id: Uuid) -> Result<()> {
        let path = format!("{index_name}/_doc/{doc_id}");
        let response = self
            .request(reqwest::Method::DELETE, &path)
            .send()
            .await
            .map_err(Error::from)?;

        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(Error::Search(format!(
                "delete_one failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn search(&self, index_name: &str, query_body: Value) -> Result<SearchPage> {
        let path = format!("{index_name}/_search");
        let response = self
            .request(reqwest::Method::POST, &path)
            .json(&query_body)
            .send()
            .await
            .map_err(Error::from)?;

        if !response.status().is_success() {
            return Err(Error::Search(format!(
                "search failed with status {}",
                response.status()
            )));
        }

        let payload: Value = response.json().await.map_err(Error::from)?;
        let hits = payload["hits"]["hits"].as_array().cloned().unwrap_or_default();

        let ids = hits
            .iter()
            .filter_map(|hit| hit["_id"].as_str().and_then(|s| Uuid::parse_str(s).ok()))
            .collect::<Vec<_>>();

        let next_cursor = hits
            .last()
            .and_then(|hit| hit.get("sort"))
            .map(|sort| sort.to_string())
            .map(|raw| base64::Engine::encode(&base64::engine::general_purpose::STANDARD, raw));

        debug!(index_name, hit_count = ids.len(), "search executed");
        Ok(SearchPage { ids, next_cursor })
    }

    async fn count(&self, index_name: &str, query_body: Value) -> Result<i64> {
        let path = format!("{index_name}/_count");
        let response = self
            .request(reqwest::Method::POST, &path)
            .json(&query_body)
            .send()
            .await
            .map_err(Error::from)?;

        if !response.status().is_success() {
            return Err(Error::Search(format!(
                "count failed with status {}",
                response.status()
            )));
        }

        let payload: Value = response.json().await.map_err(Error::from)?;
        Ok(payload["count"].as_i64().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join_trims_trailing_slash() {
        let client = EsSearchIndex::new(EsClientConfig {
            base_url: "http://localhost:9200/".to_string(),
            username: None,
            password: None,
        });
        assert_eq!(client.url("companies/_search"), "http://localhost:9200/companies/_search");
    }
}
