//! 검색 백엔드 추상화
//!
//! [`SearchBackend`] 트레이트는 인덱스 목록 조회와 검색 두 가지 호출만 정의합니다.
//! 운영 환경에서는 [`ElasticClient`], 테스트에서는 `MockSearchBackend`를 사용합니다.
//!
//! ```text
//!   ┌──────────┐
//!   │ TailLoop │
//!   └────┬─────┘
//!        ▼
//!  ┌──────────────┐
//!  │SearchBackend │ (trait)
//!  └──────────────┘
//!     │        │
//!     ▼        ▼
//! ┌───────┐ ┌──────┐
//! │Elastic│ │ Mock │
//! └───┬───┘ └──────┘
//!     ▼
//!  search engine
//! ```

pub mod elastic;

use std::future::Future;

use bytes::Bytes;

use logtail_core::types::SortOrder;

use crate::error::TailError;
use crate::query::Query;

pub use elastic::ElasticClient;

/// 검색 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// 검색 대상 인덱스
    pub indices: Vec<String>,
    /// 정렬 필드 (타임스탬프 필드)
    pub sort_field: String,
    /// 정렬 방향
    pub order: SortOrder,
    /// 시작 오프셋
    pub from: usize,
    /// 최대 결과 수
    pub size: usize,
    /// 검색 쿼리
    pub query: Query,
}

/// 검색 결과 한 건
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// 문서 본문 원시 바이트 (`_source`)
    pub source: Bytes,
}

impl SearchHit {
    /// 원시 바이트로 결과를 생성합니다.
    pub fn new(source: impl Into<Bytes>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// 검색 응답
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResponse {
    /// 반환된 결과 (요청한 정렬 순서)
    pub hits: Vec<SearchHit>,
    /// 쿼리와 일치한 전체 문서 수 (반환된 수보다 클 수 있음)
    pub total_hits: u64,
}

/// 검색 백엔드 트레이트
///
/// `Send + Sync + 'static`이므로 tokio 태스크 간에 공유할 수 있습니다.
/// 구현체는 재시도하지 않으며, 모든 에러는 호출자에게 그대로 반환합니다.
pub trait SearchBackend: Send + Sync + 'static {
    /// 백엔드에 존재하는 모든 인덱스 이름을 조회합니다.
    fn index_names(&self) -> impl Future<Output = Result<Vec<String>, TailError>> + Send;

    /// 검색을 실행합니다.
    fn search(
        &self,
        request: &SearchRequest,
    ) -> impl Future<Output = Result<SearchResponse, TailError>> + Send;
}

/// 테스트용 Mock 검색 백엔드
///
/// 미리 넣어 둔 응답을 순서대로 반환하고, 받은 요청을 기록합니다.
/// 응답 큐가 비면 빈 결과를 반환합니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockSearchBackend {
    indices: Vec<String>,
    responses: std::sync::Mutex<std::collections::VecDeque<Result<SearchResponse, String>>>,
    requests: std::sync::Mutex<Vec<SearchRequest>>,
    fail_index_listing: bool,
}

#[cfg(test)]
impl MockSearchBackend {
    /// 빈 mock 백엔드를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// index_names 호출 시 반환할 인덱스 목록을 설정합니다.
    pub fn with_indices(mut self, indices: &[&str]) -> Self {
        self.indices = indices.iter().map(|s| (*s).to_owned()).collect();
        self
    }

    /// 다음 검색 응답으로 주어진 문서들을 반환하도록 추가합니다.
    pub fn with_hits(self, docs: &[serde_json::Value]) -> Self {
        let hits: Vec<SearchHit> = docs
            .iter()
            .map(|d| SearchHit::new(d.to_string()))
            .collect();
        let total_hits = hits.len() as u64;
        self.with_response(SearchResponse { hits, total_hits })
    }

    /// 다음 검색 응답을 추가합니다.
    pub fn with_response(self, response: SearchResponse) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Ok(response));
        }
        self
    }

    /// 다음 검색 호출이 실패하도록 추가합니다.
    pub fn with_search_error(self, reason: &str) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Err(reason.to_owned()));
        }
        self
    }

    /// index_names 호출이 실패하도록 설정합니다.
    pub fn with_failing_index_listing(mut self) -> Self {
        self.fail_index_listing = true;
        self
    }

    /// 지금까지 받은 검색 요청
    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl SearchBackend for MockSearchBackend {
    async fn index_names(&self) -> Result<Vec<String>, TailError> {
        if self.fail_index_listing {
            return Err(TailError::Unreachable {
                url: "mock://".to_owned(),
                reason: "mock failure".to_owned(),
            });
        }
        Ok(self.indices.clone())
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, TailError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let next = self.responses.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(TailError::Backend(reason)),
            None => Ok(SearchResponse::default()),
        }
    }
}
