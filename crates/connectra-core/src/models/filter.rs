//! FilterDefinition and FilterValue entities (§3.1, §4.8).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::uuid_utils;

/// Service a filter or query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Companies,
    Contacts,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Service::Companies => "companies",
            Service::Contacts => "contacts",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Service {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "companies" => Ok(Service::Companies),
            "contacts" => Ok(Service::Contacts),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown service: {other}"
            ))),
        }
    }
}

/// Catalog entry describing one filterable field (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterDefinition {
    pub service: Service,
    pub key: String,
    pub display_name: String,
    pub filter_type: String,
    /// When `true`, values come from live entity columns; when `false`,
    /// values are materialized into `FilterValue` at ingest time.
    pub direct_derived: bool,
    pub active: bool,
}

/// A materialized distinct value for a non-direct-derived filter (§3.1).
/// `uuid` is deterministic so re-materializing the same triple is idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterValue {
    pub uuid: Uuid,
    pub service: Service,
    pub filter_key: String,
    pub value: String,
    pub display_value: String,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl FilterValue {
    pub fn new(service: Service, filter_key: impl Into<String>, value: impl Into<String>) -> Self {
        let filter_key = filter_key.into();
        let value = value.into();
        let uuid = uuid_utils::filter_value_uuid(&filter_key, &service.to_string(), &value);
        FilterValue {
            uuid,
            service,
            display_value: value.clone(),
            filter_key,
            value,
            deleted_at: None,
        }
    }
}

/// A single resolved filter value as returned by `/:service/filters/data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterValueResponse {
    pub value: String,
    pub display_value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_roundtrip() {
        use std::str::FromStr;
        assert_eq!(Service::from_str("companies").unwrap(), Service::Companies);
        assert_eq!(Service::Contacts.to_string(), "contacts");
    }

    #[test]
    fn test_filter_value_uuid_deterministic() {
        let a = FilterValue::new(Service::Companies, "industry", "fintech");
        let b = FilterValue::new(Service::Companies, "industry", "fintech");
        assert_eq!(a.uuid, b.uuid);
    }

    #[test]
    fn test_filter_value_differs_by_service() {
        let a = FilterValue::new(Service::Companies, "industry", "fintech");
        let b = FilterValue::new(Service::Contacts, "industry", "fintech");
        assert_ne!(a.uuid, b.uuid);
    }
}
