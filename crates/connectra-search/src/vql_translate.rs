//! Compiles a [`VqlQuery`] into a search-engine request body (§4.6).
//!
//! Grounded on the original `utilities/query.go`'s `ToElasticsearchQuery`:
//! text conditions sharing a `filter_key` on the `must` side collapse into
//! one `bool.should` block; `must_not` text is flattened; keyword/range
//! `must` go to `bool.filter`; keyword `must_not` appends to `bool.must_not`.

use std::collections::HashMap;

use connectra_core::defaults::{DEFAULT_PAGE_SIZE, MAX_ELASTIC_PAGE_NUMBER, MAX_PAGE_SIZE};
use connectra_core::{Error, Result};
use connectra_core::{KeywordValue, OrderDirection, RangeBound, SearchType, TextMatch, VqlQuery};
use serde_json::{json, Value};

/// Validate `limit`/`page` against the pagination bounds (§4.6). Cursor mode
/// bypasses the page-number bound since it doesn't use `from`/`size`.
fn check_pagination_bounds(query: &VqlQuery) -> Result<()> {
    if let Some(limit) = query.limit {
        if limit > MAX_PAGE_SIZE {
            return Err(Error::InvalidInput(format!(
                "PageSizeExceededError: limit {limit} exceeds max {MAX_PAGE_SIZE}"
            )));
        }
    }
    if query.cursor.is_none() {
        if let Some(page) = query.page {
            if page > MAX_ELASTIC_PAGE_NUMBER {
                return Err(Error::InvalidInput(format!(
                    "PageNumberExceededError: page {page} exceeds max {MAX_ELASTIC_PAGE_NUMBER}"
                )));
            }
        }
    }
    Ok(())
}

fn text_query_clause(condition: &TextMatch) -> Value {
    match condition.search_type {
        SearchType::Exact => json!({
            "match_phrase": {
                condition.filter_key.clone(): {
                    "query": condition.text_value,
                    "slop": condition.slop.unwrap_or(0),
                }
            }
        }),
        SearchType::Shuffle => json!({
            "match": {
                condition.filter_key.clone(): {
                    "query": condition.text_value,
                    "operator": condition.operator.clone().unwrap_or_else(|| "and".to_string()),
                    "fuzziness": if condition.fuzzy { json!("AUTO") } else { json!(0) },
                }
            }
        }),
        SearchType::Substring => json!({
            "match": {
                format!("{}.ngram", condition.filter_key): {
                    "query": condition.text_value,
                    "operator": condition.operator.clone().unwrap_or_else(|| "and".to_string()),
                }
            }
        }),
    }
}

/// Group `conditions` by `filter_key`; on the `must` side, each group
/// collapses to one `bool.should` block (alternatives OR together, distinct
/// fields AND together via the outer `must` array).
fn build_text_queries(conditions: &[TextMatch], is_must: bool) -> Vec<Value> {
    if conditions.is_empty() {
        return Vec::new();
    }

    let mut grouped: HashMap<&str, Vec<Value>> = HashMap::new();
    for condition in conditions {
        grouped
            .entry(condition.filter_key.as_str())
            .or_default()
            .push(text_query_clause(condition));
    }

    let mut result = Vec::new();
    for queries in grouped.into_values() {
        if queries.is_empty() {
            continue;
        }
        if is_must {
            result.push(json!({
                "bool": {
                    "should": queries,
                    "minimum_should_match": 1,
                }
            }));
        } else {
            result.extend(queries);
        }
    }
    result
}

fn range_bound_json(bound: &RangeBound) -> Value {
    let mut obj = serde_json::Map::new();
    if let Some(v) = &bound.gte {
        obj.insert("gte".to_string(), v.clone());
    }
    if let Some(v) = &bound.lte {
        obj.insert("lte".to_string(), v.clone());
    }
    if let Some(v) = &bound.gt {
        obj.insert("gt".to_string(), v.clone());
    }
    if let Some(v) = &bound.lt {
        obj.insert("lt".to_string(), v.clone());
    }
    Value::Object(obj)
}

fn build_range_queries(conditions: &HashMap<String, RangeBound>) -> Vec<Value> {
    conditions
        .iter()
        .map(|(key, bound)| json!({ "range": { key.clone(): range_bound_json(bound) } }))
        .collect()
}

fn keyword_value_json(value: &KeywordValue) -> Value {
    match value {
        KeywordValue::One(v) => json!(v),
        KeywordValue::Many(vs) => json!(vs),
    }
}

fn build_keyword_queries(conditions: &HashMap<String, KeywordValue>) -> Vec<Value> {
    conditions
        .iter()
        .map(|(key, value)| match value {
            KeywordValue::Many(_) => json!({ "terms": { key.clone(): keyword_value_json(value) } }),
            KeywordValue::One(_) => json!({ "term": { key.clone(): keyword_value_json(value) } }),
        })
        .collect()
}

fn bool_query_is_empty(query: &VqlQuery) -> bool {
    query.where_clause.text_match.must.is_empty()
        && query.where_clause.text_match.must_not.is_empty()
        && query.where_clause.keyword_match.must.is_empty()
        && query.where_clause.keyword_match.must_not.is_empty()
        && query.where_clause.range_query.must.is_empty()
        && query.where_clause.range_query.must_not.is_empty()
}

fn build_bool_query(query: &VqlQuery) -> Value {
    let must = build_text_queries(&query.where_clause.text_match.must, true);

    let mut must_not = build_text_queries(&query.where_clause.text_match.must_not, false);
    must_not.extend(build_keyword_queries(&query.where_clause.keyword_match.must_not));

    let mut filter = build_range_queries(&query.where_clause.range_query.must);
    filter.extend(build_keyword_queries(&query.where_clause.keyword_match.must));

    let mut bool_query = serde_json::Map::new();
    if !must.is_empty() {
        bool_query.insert("must".to_string(), json!(must));
    }
    if !must_not.is_empty() {
        bool_query.insert("must_not".to_string(), json!(must_not));
    }
    if !filter.is_empty() {
        bool_query.insert("filter".to_string(), json!(filter));
    }
    Value::Object(bool_query)
}

fn add_pagination(body: &mut serde_json::Map<String, Value>, query: &VqlQuery) {
    if let Some(cursor) = &query.cursor {
        if let Ok(decoded) = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            cursor,
        ) {
            if let Ok(sort_values) = serde_json::from_slice::<Value>(&decoded) {
                body.insert("search_after".to_string(), sort_values);
            }
        }
    } else if let Some(page) = query.page {
        if page > 0 {
            let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
            body.insert("from".to_string(), json!((page - 1) * limit));
        }
    }
    body.insert("size".to_string(), json!(query.limit.unwrap_or(DEFAULT_PAGE_SIZE)));
}

fn add_sort(body: &mut serde_json::Map<String, Value>, query: &VqlQuery) {
    if query.order_by.is_empty() {
        return;
    }
    let sort: Vec<Value> = query
        .order_by
        .iter()
        .filter(|o| !o.order_by.is_empty())
        .map(|o| {
            let direction = match o.order_direction {
                OrderDirection::Desc => "desc",
                OrderDirection::Asc => "asc",
            };
            json!({ o.order_by.clone(): { "order": direction } })
        })
        .collect();
    if !sort.is_empty() {
        body.insert("sort".to_string(), json!(sort));
    }
}

/// Compile `query` into a search-engine request body. `for_count` emits only
/// the bool clause, bypassing pagination/ordering (§4.6).
pub fn translate(query: &VqlQuery, for_count: bool) -> Result<Value> {
    check_pagination_bounds(query)?;

    let mut body = serde_json::Map::new();
    body.insert("_source".to_string(), json!(["id"]));

    if !for_count {
        add_pagination(&mut body, query);
        add_sort(&mut body, query);
    }

    let bool_query = build_bool_query(query);
    if bool_query_is_empty(query) {
        body.insert("query".to_string(), json!({ "match_all": {} }));
    } else {
        body.insert("query".to_string(), json!({ "bool": bool_query }));
    }

    Ok(Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectra_core::{KeywordMatchClause, TextMatchClause, WhereClause};

    fn empty_query() -> VqlQuery {
        VqlQuery::default()
    }

    #[test]
    fn test_empty_query_is_match_all() {
        let body = translate(&empty_query(), false).unwrap();
        assert_eq!(body["query"], json!({ "match_all": {} }));
    }

    #[test]
    fn test_keyword_must_goes_to_filter() {
        let mut query = empty_query();
        query.where_clause = WhereClause {
            keyword_match: KeywordMatchClause {
                must: HashMap::from([(
                    "country".to_string(),
                    KeywordValue::Many(vec!["USA".into(), "CAN".into()]),
                )]),
                ..Default::default()
            },
            ..Default::default()
        };
        let body = translate(&query, false).unwrap();
        let filter = body["query"]["bool"]["filter"].as_array().unwrap();
        assert_eq!(filter.len(), 1);
        assert!(filter[0]["terms"]["country"].is_array());
    }

    #[test]
    fn test_text_must_same_key_groups_into_should() {
        let mut query = empty_query();
        query.where_clause.text_match = TextMatchClause {
            must: vec![
                TextMatch {
                    text_value: "alpha".into(),
                    filter_key: "name".into(),
                    search_type: SearchType::Shuffle,
                    slop: None,
                    operator: None,
                    fuzzy: false,
                },
                TextMatch {
                    text_value: "beta".into(),
                    filter_key: "name".into(),
                    search_type: SearchType::Shuffle,
                    slop: None,
                    operator: None,
                    fuzzy: false,
                },
            ],
            must_not: vec![],
        };
        let body = translate(&query, false).unwrap();
        let must = body["query"]["bool"]["must"].as_array().unwrap();
        assert_eq!(must.len(), 1);
        let should = must[0]["bool"]["should"].as_array().unwrap();
        assert_eq!(should.len(), 2);
        assert_eq!(must[0]["bool"]["minimum_should_match"], json!(1));
    }

    #[test]
    fn test_count_query_skips_pagination_and_sort() {
        let mut query = empty_query();
        query.limit = Some(10);
        query.page = Some(2);
        let body = translate(&query, true).unwrap();
        assert!(body.get("from").is_none());
        assert!(body.get("size").is_none());
        assert!(body.get("sort").is_none());
    }

    #[test]
    fn test_page_size_exceeded_errors() {
        let mut query = empty_query();
        query.limit = Some(MAX_PAGE_SIZE + 1);
        assert!(translate(&query, false).is_err());
    }

    #[test]
    fn test_page_number_exceeded_errors_without_cursor() {
        let mut query = empty_query();
        query.page = Some(MAX_ELASTIC_PAGE_NUMBER + 1);
        assert!(translate(&query, false).is_err());
    }

    #[test]
    fn test_page_number_bound_bypassed_with_cursor() {
        let mut query = empty_query();
        query.page = Some(MAX_ELASTIC_PAGE_NUMBER + 1);
        query.cursor = Some(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            serde_json::to_vec(&json!([1, "x"])).unwrap(),
        ));
        assert!(translate(&query, false).is_ok());
    }

    #[test]
    fn test_cursor_emits_search_after_over_from() {
        let mut query = empty_query();
        query.page = Some(3);
        query.cursor = Some(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            serde_json::to_vec(&json!([42, "acme"])).unwrap(),
        ));
        let body = translate(&query, false).unwrap();
        assert!(body.get("search_after").is_some());
        assert!(body.get("from").is_none());
    }
}
