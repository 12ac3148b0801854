//! 인덱스 선택기
//!
//! 인덱스 이름 끝에 날짜(`logs-2024.01.02`)가 붙어 있어 사전순이 곧 시간순이라고
//! 가정합니다. 날짜 범위가 없으면 가장 최신 인덱스 하나를, 범위가 있으면 범위에
//! 걸치는 인덱스 전체를 선택합니다.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, info};

use logtail_core::types::QueryDefinition;

use crate::error::TailError;

static INDEX_DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}\.\d{2}\.\d{2}").expect("index date regex is valid"));

static USER_DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("user date regex is valid"));

/// 날짜 문자열의 구분자 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSeparator {
    /// 인덱스 이름 (`2024.01.02`)
    Index,
    /// 사용자 입력 (`2024-01-02`)
    User,
}

impl DateSeparator {
    /// 구분자 문자
    pub fn as_char(self) -> char {
        match self {
            Self::Index => '.',
            Self::User => '-',
        }
    }

    fn regex(self) -> &'static Regex {
        match self {
            Self::Index => &INDEX_DATE_REGEX,
            Self::User => &USER_DATE_REGEX,
        }
    }

    fn chrono_format(self) -> &'static str {
        match self {
            Self::Index => "%Y.%m.%d",
            Self::User => "%Y-%m-%d",
        }
    }
}

/// 인덱스 선택기
#[derive(Debug, Clone)]
pub struct IndexSelector {
    /// 인덱스 이름 패턴
    pattern: Regex,
}

impl IndexSelector {
    /// 인덱스 이름 패턴(정규식)으로 선택기를 생성합니다.
    pub fn new(pattern: &str) -> Result<Self, TailError> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    /// 패턴 원문
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// 쿼리 정의의 날짜 범위에 맞는 인덱스를 선택합니다.
    pub fn select_for(
        &self,
        all: &[String],
        def: &QueryDefinition,
        today: NaiveDate,
    ) -> Result<Vec<String>, TailError> {
        self.select(all, def.after(), def.before(), today)
    }

    /// 날짜 범위에 맞는 인덱스를 선택합니다.
    ///
    /// `today`는 종료 날짜가 없을 때 범위의 끝으로 사용됩니다.
    pub fn select(
        &self,
        all: &[String],
        after: Option<&str>,
        before: Option<&str>,
        today: NaiveDate,
    ) -> Result<Vec<String>, TailError> {
        let selected = if after.is_some() || before.is_some() {
            let (start, end) = self.date_range(all, after, before, today)?;
            debug!(%start, %end, "selecting indices for date range");
            self.indices_for_date_range(all, start, end)?
        } else {
            vec![self.last_index(all)?.to_owned()]
        };

        if selected.is_empty() {
            return Err(TailError::NoMatchingIndex {
                pattern: self.pattern().to_owned(),
            });
        }

        info!(indices = ?selected, "using indices");
        Ok(selected)
    }

    /// 유효 날짜 범위 `[start, end]`를 계산합니다.
    fn date_range(
        &self,
        all: &[String],
        after: Option<&str>,
        before: Option<&str>,
        today: NaiveDate,
    ) -> Result<(NaiveDate, NaiveDate), TailError> {
        let end = match before {
            Some(before) => extract_ymd_date(before, DateSeparator::User)?,
            None => today,
        };

        let start = match after {
            Some(after) => extract_ymd_date(after, DateSeparator::User)?,
            None => {
                // 종료 날짜만 있으면 최신 인덱스 날짜부터 시작 (종료일 이후면 하루짜리 범위)
                let last = extract_ymd_date(self.last_index(all)?, DateSeparator::Index)?;
                if last < end { last } else { end }
            }
        };

        Ok((start, end))
    }

    /// 패턴과 일치하는 인덱스 중 사전순으로 가장 큰 이름을 반환합니다.
    pub fn last_index<'a>(&self, all: &'a [String]) -> Result<&'a str, TailError> {
        all.iter()
            .filter(|idx| self.pattern.is_match(idx))
            .max()
            .map(String::as_str)
            .ok_or_else(|| TailError::NoMatchingIndex {
                pattern: self.pattern().to_owned(),
            })
    }

    /// 패턴과 일치하고 내장 날짜가 `[start, end]`에 포함되는 인덱스를 입력 순서대로 반환합니다.
    pub fn indices_for_date_range(
        &self,
        all: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<String>, TailError> {
        let mut result = Vec::with_capacity(all.len());
        for idx in all.iter().filter(|idx| self.pattern.is_match(idx)) {
            let date = extract_ymd_date(idx, DateSeparator::Index)?;
            if start <= date && date <= end {
                result.push(idx.clone());
            }
        }
        Ok(result)
    }
}

/// 인덱스 목록, 패턴, 날짜 범위로 검색할 인덱스를 선택합니다.
pub fn select_indices(
    all: &[String],
    pattern: &str,
    after: Option<&str>,
    before: Option<&str>,
    today: NaiveDate,
) -> Result<Vec<String>, TailError> {
    IndexSelector::new(pattern)?.select(all, after, before, today)
}

/// 문자열에서 처음 등장하는 `YYYY<sep>MM<sep>DD`를 찾아 날짜로 해석합니다.
pub fn extract_ymd_date(input: &str, separator: DateSeparator) -> Result<NaiveDate, TailError> {
    let found = separator
        .regex()
        .find(input)
        .ok_or_else(|| {
            let sep = separator.as_char();
            TailError::InvalidDate {
                input: input.to_owned(),
                reason: format!("no YYYY{sep}MM{sep}DD date found"),
            }
        })?;

    NaiveDate::parse_from_str(found.as_str(), separator.chrono_format()).map_err(|e| {
        TailError::InvalidDate {
            input: input.to_owned(),
            reason: e.to_string(),
        }
    })
}
