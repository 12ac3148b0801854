//! tail 루프 -- 인덱스 선택, 폴링, 워터마크 관리
//!
//! [`TailLoop`]는 하나의 tokio 태스크에서 순차적으로 실행됩니다.
//!
//! ```text
//! Initializing ──▶ InitialSearchPending ──(결과 ≥ 1)──▶ Following
//!                        │  ▲                              │  ▲
//!                        └──┘ (결과 없음)                   └──┘
//! ```
//!
//! 초기 검색은 `initial_order` 방향으로 최근 N건을 가져오고, 이후에는
//! 워터마크보다 큰 타임스탬프만 오름차순으로 조회합니다.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, info};

use logtail_core::config::LogtailConfig;
use logtail_core::types::{QueryDefinition, SortOrder};

use crate::backend::{SearchBackend, SearchHit, SearchRequest};
use crate::delay::PollDelay;
use crate::error::TailError;
use crate::expr::Document;
use crate::format::Formatter;
use crate::index::IndexSelector;
use crate::query::{build_search_query, build_watermark_query};

/// tail 루프 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailPhase {
    /// 인덱스 선택 전
    Initializing,
    /// 초기 검색 결과 대기 (워터마크 없음)
    InitialSearchPending,
    /// 워터마크 이후 추적 중
    Following,
}

/// tail 루프 동작 설정
#[derive(Debug, Clone)]
pub struct TailSettings {
    /// 초기 검색 이후 계속 추적할지 여부
    pub follow: bool,
    /// 초기 검색 결과 수
    pub initial_entries: usize,
    /// 추적 검색 페이지 크기
    pub follow_page_size: usize,
    /// 폴링 간격
    pub delay: PollDelay,
    /// 결과 라인 색상 출력 여부
    pub color: bool,
}

impl TailSettings {
    /// 설정에서 tail 동작 설정을 만듭니다.
    pub fn from_config(config: &LogtailConfig) -> Self {
        Self {
            follow: config.tail.follow,
            initial_entries: config.tail.initial_entries,
            follow_page_size: config.tail.follow_page_size,
            delay: PollDelay::from_millis(
                config.tail.poll_floor_ms,
                config.tail.poll_ceiling_ms,
                config.tail.poll_step_ms,
            ),
            color: config.general.color,
        }
    }
}

impl Default for TailSettings {
    fn default() -> Self {
        Self {
            follow: true,
            initial_entries: 50,
            follow_page_size: 9000,
            delay: PollDelay::default(),
            color: false,
        }
    }
}

/// 한 번의 폴링 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// 출력한 문서 수
    pub processed: usize,
    /// 백엔드가 보고한 전체 일치 수
    pub total_hits: u64,
    /// 다음 폴링까지 대기 시간
    pub next_delay: Duration,
}

/// 워터마크 기반 tail 루프
pub struct TailLoop<B: SearchBackend, W: Write> {
    /// 검색 백엔드
    backend: Arc<B>,
    /// 인덱스 선택기
    selector: IndexSelector,
    /// 쿼리 정의
    definition: QueryDefinition,
    /// 결과 포맷터
    formatter: Formatter,
    /// 결과 출력 대상
    out: W,
    /// 동작 설정
    settings: TailSettings,
    /// 선택된 인덱스 (초기화 후 고정)
    indices: Vec<String>,
    /// 마지막으로 출력한 문서의 타임스탬프
    last_timestamp: Option<String>,
    /// 초기 검색 정렬 방향 (초기화 후 고정)
    order: SortOrder,
    /// 현재 폴링 간격
    delay: PollDelay,
    /// 현재 단계
    phase: TailPhase,
}

impl<B: SearchBackend, W: Write> TailLoop<B, W> {
    /// 새 tail 루프를 생성합니다.
    ///
    /// 인덱스 패턴이 정규식으로 컴파일되지 않으면 실패합니다.
    pub fn new(
        backend: Arc<B>,
        index_pattern: &str,
        definition: QueryDefinition,
        settings: TailSettings,
        out: W,
    ) -> Result<Self, TailError> {
        let selector = IndexSelector::new(index_pattern)?;
        let formatter = Formatter::new(definition.format.clone()).with_color(settings.color);
        let order = definition.initial_order();
        let delay = settings.delay;
        Ok(Self {
            backend,
            selector,
            definition,
            formatter,
            out,
            settings,
            indices: Vec::new(),
            last_timestamp: None,
            order,
            delay,
            phase: TailPhase::Initializing,
        })
    }

    /// 현재 단계
    pub fn phase(&self) -> TailPhase {
        self.phase
    }

    /// 현재 워터마크
    pub fn watermark(&self) -> Option<&str> {
        self.last_timestamp.as_deref()
    }

    /// 선택된 인덱스
    pub fn indices(&self) -> &[String] {
        &self.indices
    }

    /// 초기 검색 정렬 방향
    pub fn order(&self) -> SortOrder {
        self.order
    }

    /// 현재 폴링 간격
    pub fn delay(&self) -> Duration {
        self.delay.current()
    }

    /// 결과 출력 대상
    pub fn output(&self) -> &W {
        &self.out
    }

    /// 인덱스 목록을 조회하여 검색 대상 인덱스를 고정합니다.
    pub async fn initialize(&mut self, today: NaiveDate) -> Result<(), TailError> {
        let all = self.backend.index_names().await?;
        debug!(count = all.len(), "fetched index names");

        self.indices = self.selector.select_for(&all, &self.definition, today)?;
        self.order = self.definition.initial_order();
        self.phase = TailPhase::InitialSearchPending;
        info!(
            indices = self.indices.len(),
            order = %self.order,
            "tail initialized"
        );
        Ok(())
    }

    /// 현재 단계에 맞는 검색 요청을 만듭니다.
    pub fn next_request(&self) -> SearchRequest {
        match &self.last_timestamp {
            None => SearchRequest {
                indices: self.indices.clone(),
                sort_field: self.definition.timestamp_field.clone(),
                order: self.order,
                from: 0,
                size: self.settings.initial_entries,
                query: build_search_query(&self.definition),
            },
            Some(watermark) => SearchRequest {
                indices: self.indices.clone(),
                sort_field: self.definition.timestamp_field.clone(),
                order: SortOrder::Ascending,
                from: 0,
                size: self.settings.follow_page_size,
                query: build_watermark_query(&self.definition, watermark),
            },
        }
    }

    /// 검색을 한 번 실행하고 결과를 출력한 뒤 폴링 간격을 조정합니다.
    pub async fn poll_once(&mut self) -> Result<PollOutcome, TailError> {
        if self.phase == TailPhase::Initializing {
            return Err(TailError::Backend(
                "tail loop polled before index selection".to_owned(),
            ));
        }

        let request = self.next_request();
        let response = self.backend.search(&request).await?;

        let processed = self.process_batch(&response.hits, request.order)?;
        if processed > 0 && self.phase == TailPhase::InitialSearchPending {
            self.phase = TailPhase::Following;
            info!(watermark = ?self.last_timestamp, "initial search complete, following");
        }

        let next_delay = self.delay.adjust(response.total_hits);
        debug!(
            processed,
            total_hits = response.total_hits,
            delay_ms = next_delay.as_millis() as u64,
            "poll completed"
        );

        Ok(PollOutcome {
            processed,
            total_hits: response.total_hits,
            next_delay,
        })
    }

    /// 결과 묶음을 시간순으로 출력하고 워터마크를 갱신합니다.
    ///
    /// 내림차순 결과는 역순으로 처리하므로, 끝나면 워터마크는 항상 가장 최신
    /// 문서의 타임스탬프입니다.
    pub fn process_batch(
        &mut self,
        hits: &[SearchHit],
        order: SortOrder,
    ) -> Result<usize, TailError> {
        match order {
            SortOrder::Ascending => {
                for hit in hits {
                    self.process_hit(hit)?;
                }
            }
            SortOrder::Descending => {
                for hit in hits.iter().rev() {
                    self.process_hit(hit)?;
                }
            }
        }
        self.out.flush()?;
        Ok(hits.len())
    }

    fn process_hit(&mut self, hit: &SearchHit) -> Result<(), TailError> {
        let doc = Document::parse(&hit.source)?;
        let timestamp = doc.timestamp(&self.definition.timestamp_field).ok_or_else(|| {
            TailError::MissingTimestamp {
                field: self.definition.timestamp_field.clone(),
            }
        })?;

        self.formatter.write_line(&doc, &mut self.out)?;
        self.last_timestamp = Some(timestamp);
        Ok(())
    }

    /// 현재 로컬 날짜로 tail 루프를 실행합니다.
    pub async fn run(&mut self) -> Result<(), TailError> {
        let today = chrono::Local::now().date_naive();
        self.run_with_today(today).await
    }

    /// 주어진 날짜를 "오늘"로 사용하여 tail 루프를 실행합니다.
    ///
    /// `follow`가 꺼져 있으면 초기 검색 한 번만 수행하고 반환합니다.
    /// 켜져 있으면 에러가 발생할 때까지 반환하지 않습니다.
    pub async fn run_with_today(&mut self, today: NaiveDate) -> Result<(), TailError> {
        if self.phase == TailPhase::Initializing {
            self.initialize(today).await?;
        }

        if !self.settings.follow {
            let outcome = self.poll_once().await?;
            info!(processed = outcome.processed, "list-only search complete");
            return Ok(());
        }

        loop {
            let outcome = self.poll_once().await?;
            tokio::time::sleep(outcome.next_delay).await;
        }
    }
}
