#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`index`]: 인덱스 이름의 날짜로 검색 대상 인덱스 선택
//! - [`query`]: 검색어/날짜 범위/워터마크 쿼리 생성
//! - [`expr`]: dot notation 필드 표현식 평가
//! - [`format`]: `%field` 템플릿 기반 결과 포맷터
//! - [`delay`]: 결과량에 따른 적응형 폴링 간격
//! - [`backend`]: 검색 백엔드 트레이트와 Elasticsearch 구현
//! - [`tail`]: 워터마크 기반 tail 루프
//! - [`tunnel`]: SSH 포트 포워딩 터널
//! - [`error`]: 도메인 에러 타입

pub mod backend;
pub mod delay;
pub mod error;
pub mod expr;
pub mod format;
pub mod index;
pub mod query;
pub mod tail;
pub mod tunnel;

// --- 주요 타입 re-export ---

// tail 루프
pub use tail::{PollOutcome, TailLoop, TailPhase, TailSettings};

// 백엔드
pub use backend::{ElasticClient, SearchBackend, SearchHit, SearchRequest, SearchResponse};

// 에러
pub use error::{EvalError, TailError};

// 인덱스 선택
pub use index::{DateSeparator, IndexSelector, select_indices};

// 쿼리
pub use query::{Query, build_search_query, build_watermark_query};

// 포맷
pub use expr::Document;
pub use format::Formatter;

// 폴링 간격
pub use delay::PollDelay;

// 터널
pub use tunnel::{SshTunnel, TunnelHandle};
