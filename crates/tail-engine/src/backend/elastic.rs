//! Elasticsearch HTTP 클라이언트
//!
//! - 인덱스 목록: `GET /_cat/indices?format=json&h=index`
//! - 검색: `POST /{indices}/_search`
//!
//! ES 6의 `hits.total`(숫자)과 ES 7+의 `hits.total.value`(객체)를 모두 지원합니다.

use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::{Value, json};
use tracing::debug;

use logtail_core::types::SearchTarget;

use crate::backend::{SearchBackend, SearchHit, SearchRequest, SearchResponse};
use crate::error::TailError;

/// 기본 포트
const DEFAULT_PORT: u16 = 9200;
/// 연결 타임아웃
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// 요청 전체 타임아웃
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// 에러 메시지에 포함할 응답 본문 최대 길이
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Elasticsearch 호환 검색 백엔드
#[derive(Debug, Clone)]
pub struct ElasticClient {
    http: reqwest::Client,
    base_url: String,
    user: Option<String>,
    password: Option<String>,
    trace_requests: bool,
}

impl ElasticClient {
    /// 검색 대상으로 클라이언트를 생성합니다.
    ///
    /// 터널 URL이 있으면 그 주소로 접속합니다.
    pub fn new(target: &SearchTarget) -> Result<Self, TailError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TailError::Backend(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            base_url: normalize_url(target.effective_url()),
            user: target.user.clone(),
            password: target.password.clone(),
            trace_requests: false,
        })
    }

    /// 요청 본문을 debug 레벨로 기록할지 설정합니다.
    pub fn with_trace_requests(mut self, enabled: bool) -> Self {
        self.trace_requests = enabled;
        self
    }

    /// 정규화된 접속 URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.user {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<Bytes, TailError> {
        let response = self.authorize(request).send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                TailError::Unreachable {
                    url: url.to_owned(),
                    reason: e.to_string(),
                }
            } else {
                TailError::Backend(format!("request to {url} failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TailError::Backend(format!("failed to read response from {url}: {e}")))?;

        if !status.is_success() {
            let text: String = String::from_utf8_lossy(&body)
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect();
            return Err(TailError::Backend(format!("{url} returned {status}: {text}")));
        }

        Ok(body)
    }
}

impl SearchBackend for ElasticClient {
    async fn index_names(&self) -> Result<Vec<String>, TailError> {
        let url = format!("{}/_cat/indices?format=json&h=index", self.base_url);
        if self.trace_requests {
            debug!(method = "GET", url = %url, "index listing request");
        }

        let body = self.send(self.http.get(&url), &url).await?;
        parse_index_names(&body)
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, TailError> {
        if request.indices.is_empty() {
            return Err(TailError::Backend("no indices to search".to_owned()));
        }

        let url = format!("{}/{}/_search", self.base_url, request.indices.join(","));
        let body = search_body(request);
        if self.trace_requests {
            debug!(method = "POST", url = %url, body = %body, "search request");
        }

        let raw = self.send(self.http.post(&url).json(&body), &url).await?;
        let response = parse_search_response(&raw)?;
        debug!(
            hits = response.hits.len(),
            total_hits = response.total_hits,
            "search completed"
        );
        Ok(response)
    }
}

/// 스킴이 없으면 `http://`, 포트가 없으면 `:9200`을 붙이고 끝의 `/`를 제거합니다.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let (scheme, rest) = trimmed.split_once("://").unwrap_or(("http", trimmed));
    let (authority, path) = match rest.split_once('/') {
        Some((authority, path)) => (authority, Some(path)),
        None => (rest, None),
    };

    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let has_port = if host_port.starts_with('[') {
        host_port.contains("]:")
    } else {
        host_port.contains(':')
    };

    let mut url = format!("{scheme}://{authority}");
    if !has_port {
        url.push_str(&format!(":{DEFAULT_PORT}"));
    }
    if let Some(path) = path {
        url.push('/');
        url.push_str(path);
    }
    url
}

/// 검색 요청 본문
fn search_body(request: &SearchRequest) -> Value {
    let mut sort = serde_json::Map::new();
    sort.insert(
        request.sort_field.clone(),
        json!({ "order": request.order.as_str() }),
    );
    json!({
        "query": request.query.to_json(),
        "sort": [sort],
        "from": request.from,
        "size": request.size,
    })
}

#[derive(Deserialize)]
struct CatIndex {
    index: String,
}

fn parse_index_names(body: &[u8]) -> Result<Vec<String>, TailError> {
    let entries: Vec<CatIndex> = serde_json::from_slice(body)
        .map_err(|e| TailError::Backend(format!("invalid index listing: {e}")))?;
    Ok(entries.into_iter().map(|e| e.index).collect())
}

#[derive(Deserialize)]
struct RawSearchResponse {
    hits: RawHits,
}

#[derive(Deserialize)]
struct RawHits {
    #[serde(default)]
    total: Option<RawTotal>,
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTotal {
    Count(u64),
    Object { value: u64 },
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_source")]
    source: Box<RawValue>,
}

fn parse_search_response(body: &[u8]) -> Result<SearchResponse, TailError> {
    let raw: RawSearchResponse = serde_json::from_slice(body)
        .map_err(|e| TailError::Backend(format!("invalid search response: {e}")))?;

    let hits: Vec<SearchHit> = raw
        .hits
        .hits
        .into_iter()
        .map(|h| SearchHit::new(Bytes::copy_from_slice(h.source.get().as_bytes())))
        .collect();

    let total_hits = match raw.hits.total {
        Some(RawTotal::Count(n)) | Some(RawTotal::Object { value: n }) => n,
        None => hits.len() as u64,
    };

    Ok(SearchResponse { hits, total_hits })
}
