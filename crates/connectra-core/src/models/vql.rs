//! VQL ("Vivek Query Language") query shape (§4.6).
//!
//! These are the wire/in-memory types the VQL translator in
//! `connectra-search` compiles into search-engine requests. Keeping the
//! shape here (rather than in `connectra-search`) lets job payloads
//! (`ExportCsvFilePayload`) and API request bodies share the same type.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Text search strategy for a `TextMatch` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    /// Phrase match with configurable `slop`.
    Exact,
    /// Token match, default operator `and`, optional fuzziness.
    Shuffle,
    /// Match against a `<field>.ngram` analyzer.
    Substring,
}

/// A single full-text condition (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextMatch {
    pub text_value: String,
    pub filter_key: String,
    pub search_type: SearchType,
    #[serde(default)]
    pub slop: Option<u32>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub fuzzy: bool,
}

/// Scalar or sequence keyword value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeywordValue {
    One(String),
    Many(Vec<String>),
}

/// Inclusive/exclusive numeric or date range bound.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeBound {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<serde_json::Value>,
}

/// The `where` clause's three disjoint sub-clauses (§4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhereClause {
    #[serde(default)]
    pub text_match: TextMatchClause,
    #[serde(default)]
    pub keyword_match: KeywordMatchClause,
    #[serde(default)]
    pub range_query: RangeQueryClause,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextMatchClause {
    #[serde(default)]
    pub must: Vec<TextMatch>,
    #[serde(default)]
    pub must_not: Vec<TextMatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordMatchClause {
    #[serde(default)]
    pub must: HashMap<String, KeywordValue>,
    #[serde(default)]
    pub must_not: HashMap<String, KeywordValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeQueryClause {
    #[serde(default)]
    pub must: HashMap<String, RangeBound>,
    #[serde(default)]
    pub must_not: HashMap<String, RangeBound>,
}

/// One sort key, direction pair (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBy {
    pub order_by: String,
    pub order_direction: OrderDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Company-specific query modifiers carried alongside a VQL query
/// (e.g. whether to also filter on a linked company's fields for contacts).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyConfig {
    #[serde(default)]
    pub include_company_fields: bool,
}

/// The full declarative VQL query object (§4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VqlQuery {
    #[serde(default)]
    pub where_clause: WhereClause,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub select_columns: Vec<String>,
    #[serde(default)]
    pub company_config: CompanyConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_clause_default_is_empty() {
        let where_clause = WhereClause::default();
        assert!(where_clause.text_match.must.is_empty());
        assert!(where_clause.keyword_match.must.is_empty());
        assert!(where_clause.range_query.must.is_empty());
    }

    #[test]
    fn test_keyword_value_serializes_scalar_and_sequence() {
        let scalar = serde_json::to_value(KeywordValue::One("USA".into())).unwrap();
        assert_eq!(scalar, serde_json::json!("USA"));

        let many =
            serde_json::to_value(KeywordValue::Many(vec!["USA".into(), "CAN".into()])).unwrap();
        assert_eq!(many, serde_json::json!(["USA", "CAN"]));
    }

    #[test]
    fn test_vql_query_deserializes_minimal_json() {
        let json = serde_json::json!({
            "where_clause": {
                "keyword_match": { "must": { "country": "USA" } }
            },
            "limit": 25
        });
        let query: VqlQuery = serde_json::from_value(json).unwrap();
        assert_eq!(query.limit, Some(25));
        assert!(query.where_clause.keyword_match.must.contains_key("country"));
    }
}
