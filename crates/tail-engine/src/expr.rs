//! 필드 표현식 평가기
//!
//! 검색 결과 문서는 스키마가 없는 중첩 JSON이므로, 출력 템플릿의 필드는
//! dot notation 경로로만 접근합니다.
//!
//! - `"foo"` → `doc["foo"]`
//! - `"foo.bar"` → `doc["foo"]["bar"]`
//! - `""` → 현재 노드 전체
//!
//! # 사용 예시
//! ```
//! use logtail_engine::expr::Document;
//!
//! let doc = Document::parse(br#"{"http":{"status":404}}"#).unwrap();
//! assert_eq!(doc.evaluate("http.status").unwrap(), "404");
//! ```

use serde_json::{Map, Value};

use crate::error::EvalError;

/// 검색 결과 한 건의 문서 본문
///
/// 최상위는 항상 JSON 객체입니다. 히트마다 생성되어 출력 후 버려집니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Value,
}

impl Document {
    /// 원시 바이트를 문서로 파싱합니다. 최상위가 객체가 아니면 실패합니다.
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        let map: Map<String, Value> = serde_json::from_slice(raw)?;
        Ok(Self {
            root: Value::Object(map),
        })
    }

    /// 경로 표현식을 평가하여 문자열 값을 반환합니다.
    pub fn evaluate(&self, path: &str) -> Result<String, EvalError> {
        evaluate(&self.root, path)
    }

    /// 워터마크로 사용할 타임스탬프 값을 찾습니다.
    ///
    /// 필드명 그대로의 최상위 키를 먼저 찾고 (`@timestamp` 처럼 점이 없는 이름이
    /// 대부분), 없으면 dot notation 경로로 해석합니다. 문자열과 숫자만 허용합니다.
    pub fn timestamp(&self, field: &str) -> Option<String> {
        let value = self
            .root
            .get(field)
            .or_else(|| lookup(&self.root, field))?;
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// 문서 루트 값
    pub fn as_value(&self) -> &Value {
        &self.root
    }
}

/// 임의의 JSON 값에 대해 경로 표현식을 평가합니다.
///
/// 경로를 첫 번째 `.`에서 나누어 앞 세그먼트로 객체를 조회하고, 나머지 경로로
/// 계속 내려갑니다. 경로가 비면 현재 노드를 문자열로 변환합니다.
pub fn evaluate(value: &Value, path: &str) -> Result<String, EvalError> {
    let mut current = value;
    let mut rest = path;

    while !rest.is_empty() {
        let (segment, remainder) = rest.split_once('.').unwrap_or((rest, ""));

        let Value::Object(map) = current else {
            return Err(EvalError::NotAMapping {
                path: rest.to_owned(),
            });
        };

        match map.get(segment) {
            None | Some(Value::Null) => {
                return Err(EvalError::NotFound {
                    path: rest.to_owned(),
                });
            }
            Some(next) => current = next,
        }
        rest = remainder;
    }

    Ok(stringify(current))
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |node, segment| node.get(segment))
        .filter(|v| !v.is_null())
}

/// 스칼라는 표시 형식 그대로, 객체와 배열은 compact JSON으로 변환합니다.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_owned(),
        Value::Object(_) | Value::Array(_) => value.to_string(),
    }
}
