//! 도메인 타입 — 쿼리 정의와 검색 대상
//!
//! 설정 파일과 CLI 인자가 병합된 뒤 tail 엔진에 전달되는 값 객체들입니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 쿼리 정의
///
/// 무엇을 검색하고 결과를 어떻게 출력할지를 담습니다.
/// 빈 문자열 날짜는 지정되지 않은 것으로 취급합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDefinition {
    /// 검색어 목록 (공백으로 이어 붙여 query-string 쿼리로 사용)
    pub terms: Vec<String>,
    /// 타임스탬프 필드명
    pub timestamp_field: String,
    /// 시작 시각 (포함)
    pub after: Option<String>,
    /// 종료 시각 (미포함)
    pub before: Option<String>,
    /// 출력 템플릿 (`%field.path` 토큰 포함)
    pub format: String,
}

impl QueryDefinition {
    /// 시작 시각 하한을 반환합니다. 빈 문자열은 `None`입니다.
    pub fn after(&self) -> Option<&str> {
        non_empty(self.after.as_deref())
    }

    /// 종료 시각 상한을 반환합니다. 빈 문자열은 `None`입니다.
    pub fn before(&self) -> Option<&str> {
        non_empty(self.before.as_deref())
    }

    /// 날짜 범위 필터가 적용되는지 여부
    pub fn is_date_filtered(&self) -> bool {
        self.after().is_some() || self.before().is_some()
    }

    /// 초기 검색의 정렬 방향
    ///
    /// 시작 시각이 지정되면 과거 시점부터 워터마크를 쌓아야 하므로 오름차순,
    /// 그렇지 않으면 최신 문서부터 가져오는 내림차순입니다.
    pub fn initial_order(&self) -> SortOrder {
        if self.after().is_some() {
            SortOrder::Ascending
        } else {
            SortOrder::Descending
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// 검색 대상
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTarget {
    /// 검색 엔진 기본 URL
    pub url: String,
    /// 인덱스 이름 패턴 (정규식)
    pub index_pattern: String,
    /// 터널이 열린 경우 실제 접속할 로컬 URL
    pub tunnel_url: Option<String>,
    /// Basic 인증 사용자
    pub user: Option<String>,
    /// Basic 인증 비밀번호
    pub password: Option<String>,
}

impl SearchTarget {
    /// 실제 접속에 사용할 URL (터널 URL 우선)
    pub fn effective_url(&self) -> &str {
        self.tunnel_url.as_deref().unwrap_or(&self.url)
    }
}

/// 정렬 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// 오래된 것부터
    Ascending,
    /// 최신 것부터
    Descending,
}

impl SortOrder {
    /// 검색 엔진 DSL 표기 (`asc` / `desc`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
