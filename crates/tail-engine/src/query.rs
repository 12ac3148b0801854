//! 검색 쿼리 빌더
//!
//! 쿼리 정의로부터 기본 쿼리(검색어 + 날짜 범위)와 워터마크 이후만 조회하는
//! 추적 쿼리를 만듭니다. 상태가 없으므로 폴링마다 새로 생성합니다.

use serde_json::{Map, Value, json};

use logtail_core::types::QueryDefinition;

/// 필터 없는 기본 검색 조건
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseQuery {
    /// 전체 문서
    MatchAll,
    /// query-string 검색
    QueryString(String),
}

/// 타임스탬프 범위 필터
///
/// `gte`는 포함 하한, `gt`는 미포함 하한, `lt`는 미포함 상한입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeFilter {
    /// 대상 필드
    pub field: String,
    /// 포함 하한
    pub gte: Option<String>,
    /// 미포함 하한
    pub gt: Option<String>,
    /// 미포함 상한
    pub lt: Option<String>,
}

impl RangeFilter {
    fn to_json(&self) -> Value {
        let mut bounds = Map::new();
        if let Some(gte) = &self.gte {
            bounds.insert("gte".to_owned(), Value::String(gte.clone()));
        }
        if let Some(gt) = &self.gt {
            bounds.insert("gt".to_owned(), Value::String(gt.clone()));
        }
        if let Some(lt) = &self.lt {
            bounds.insert("lt".to_owned(), Value::String(lt.clone()));
        }
        let mut range = Map::new();
        range.insert(self.field.clone(), Value::Object(bounds));
        json!({ "range": range })
    }
}

/// 검색 쿼리
///
/// 모든 범위 필터는 AND로 결합됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// 기본 검색 조건
    pub base: BaseQuery,
    /// 범위 필터
    pub filters: Vec<RangeFilter>,
}

impl Query {
    /// 검색 엔진 쿼리 DSL로 변환합니다.
    pub fn to_json(&self) -> Value {
        let base = match &self.base {
            BaseQuery::MatchAll => json!({ "match_all": {} }),
            BaseQuery::QueryString(q) => json!({ "query_string": { "query": q } }),
        };

        if self.filters.is_empty() {
            return base;
        }

        let filters: Vec<Value> = self.filters.iter().map(RangeFilter::to_json).collect();
        json!({
            "bool": {
                "must": base,
                "filter": filters,
            }
        })
    }
}

/// 기본 쿼리를 생성합니다.
///
/// 검색어가 있으면 공백으로 이어 붙인 query-string, 없으면 match-all입니다.
/// 날짜 범위가 지정되면 `gte after`, `lt before` 범위 필터를 추가합니다.
pub fn build_search_query(def: &QueryDefinition) -> Query {
    let base = if def.terms.is_empty() {
        BaseQuery::MatchAll
    } else {
        BaseQuery::QueryString(def.terms.join(" "))
    };

    let mut filters = Vec::new();
    if def.is_date_filtered() {
        filters.push(RangeFilter {
            field: def.timestamp_field.clone(),
            gte: def.after().map(str::to_owned),
            lt: def.before().map(str::to_owned),
            ..Default::default()
        });
    }

    Query { base, filters }
}

/// 워터마크 이후(미포함) 문서만 조회하는 추적 쿼리를 생성합니다.
pub fn build_watermark_query(def: &QueryDefinition, watermark: &str) -> Query {
    let mut query = build_search_query(def);
    query.filters.push(RangeFilter {
        field: def.timestamp_field.clone(),
        gt: Some(watermark.to_owned()),
        ..Default::default()
    });
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(terms: &[&str], after: Option<&str>, before: Option<&str>) -> QueryDefinition {
        QueryDefinition {
            terms: terms.iter().map(|t| (*t).to_owned()).collect(),
            timestamp_field: "@timestamp".to_owned(),
            after: after.map(str::to_owned),
            before: before.map(str::to_owned),
            format: "%message".to_owned(),
        }
    }

    #[test]
    fn no_terms_is_match_all() {
        let q = build_search_query(&def(&[], None, None));
        assert_eq!(q.to_json(), json!({"match_all": {}}));
    }

    #[test]
    fn terms_are_joined_into_query_string() {
        let q = build_search_query(&def(&["level:ERROR", "service:api"], None, None));
        assert_eq!(
            q.to_json(),
            json!({"query_string": {"query": "level:ERROR service:api"}})
        );
    }

    #[test]
    fn date_bounds_are_inclusive_lower_exclusive_upper() {
        let q = build_search_query(&def(&[], Some("2024-01-02"), Some("2024-01-05")));
        assert_eq!(
            q.to_json(),
            json!({
                "bool": {
                    "must": {"match_all": {}},
                    "filter": [
                        {"range": {"@timestamp": {"gte": "2024-01-02", "lt": "2024-01-05"}}}
                    ]
                }
            })
        );
    }

    #[test]
    fn empty_bounds_are_ignored() {
        let q = build_search_query(&def(&["x"], Some(""), Some("")));
        assert!(q.filters.is_empty());
    }

    #[test]
    fn single_bound_emits_only_that_side() {
        let q = build_search_query(&def(&[], None, Some("2024-01-05")));
        let range = &q.to_json()["bool"]["filter"][0]["range"]["@timestamp"];
        assert_eq!(range["lt"], "2024-01-05");
        assert!(range.get("gte").is_none());
    }

    #[test]
    fn watermark_query_is_strictly_greater_and_unbounded_above() {
        let q = build_watermark_query(&def(&["error"], None, None), "2024-01-02T03:04:05Z");
        assert_eq!(
            q.to_json(),
            json!({
                "bool": {
                    "must": {"query_string": {"query": "error"}},
                    "filter": [
                        {"range": {"@timestamp": {"gt": "2024-01-02T03:04:05Z"}}}
                    ]
                }
            })
        );
    }

    #[test]
    fn watermark_query_keeps_date_filter() {
        let q = build_watermark_query(
            &def(&[], Some("2024-01-02"), Some("2024-01-05")),
            "2024-01-03T00:00:00Z",
        );
        let json = q.to_json();
        let filters = json["bool"]["filter"].as_array().unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0]["range"]["@timestamp"]["gte"], "2024-01-02");
        assert_eq!(filters[1]["range"]["@timestamp"]["gt"], "2024-01-03T00:00:00Z");
        assert!(filters[1]["range"]["@timestamp"].get("lt").is_none());
    }

    #[test]
    fn timestamp_field_is_used_verbatim() {
        let mut d = def(&[], None, None);
        d.timestamp_field = "event.created".to_owned();
        let q = build_watermark_query(&d, "100");
        assert_eq!(
            q.to_json()["bool"]["filter"][0]["range"]["event.created"]["gt"],
            "100"
        );
    }
}
