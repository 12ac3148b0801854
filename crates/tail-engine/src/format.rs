//! 결과 포맷터
//!
//! 출력 템플릿의 `%field.path` 토큰을 문서 값으로 치환합니다.
//! 평가에 실패한 토큰은 원문 그대로 남기며, 출력 전체를 중단시키지 않습니다.

use std::collections::HashMap;
use std::io::Write;
use std::sync::LazyLock;

use colored::Colorize;
use regex::{Captures, Regex};
use tracing::trace;

use crate::expr::Document;

/// `%` 뒤에 영문자/숫자/`@`/`_`/`.`/`-`가 하나 이상 이어지는 토큰
static TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%[A-Za-z0-9@_.\-]+").expect("token regex is valid"));

/// 템플릿 기반 결과 포맷터
#[derive(Debug, Clone)]
pub struct Formatter {
    /// 출력 템플릿
    template: String,
    /// 색상 출력 여부
    color: bool,
}

impl Formatter {
    /// 템플릿으로 포맷터를 생성합니다. 색상은 기본으로 꺼져 있습니다.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            color: false,
        }
    }

    /// 색상 출력 여부를 설정합니다.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// 템플릿 문자열
    pub fn template(&self) -> &str {
        &self.template
    }

    /// 템플릿에 등장하는 토큰 목록 (등장 순서, 중복 제거)
    pub fn tokens(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for m in TOKEN_REGEX.find_iter(&self.template) {
            if !seen.contains(&m.as_str()) {
                seen.push(m.as_str());
            }
        }
        seen
    }

    /// 문서를 템플릿에 적용한 한 줄을 반환합니다.
    ///
    /// 같은 토큰은 한 번만 평가하고 모든 등장 위치에 같은 값을 넣습니다.
    /// 치환은 템플릿 원문에 대해 한 번에 수행되므로, 치환된 값 안의 `%` 문자열은
    /// 다시 해석되지 않습니다.
    pub fn render(&self, doc: &Document) -> String {
        let mut resolved: HashMap<String, Option<String>> = HashMap::new();
        TOKEN_REGEX
            .replace_all(&self.template, |caps: &Captures<'_>| {
                let token = caps.get(0).map_or("", |m| m.as_str());
                let value = resolved.entry(token.to_owned()).or_insert_with(|| {
                    match doc.evaluate(&token[1..]) {
                        Ok(value) => Some(value),
                        Err(e) => {
                            trace!(token, error = %e, "format token left unresolved");
                            None
                        }
                    }
                });
                value.clone().unwrap_or_else(|| token.to_owned())
            })
            .into_owned()
    }

    /// 렌더링한 라인을 출력합니다.
    pub fn write_line<W: Write + ?Sized>(
        &self,
        doc: &Document,
        out: &mut W,
    ) -> std::io::Result<()> {
        let line = self.render(doc);
        if self.color {
            writeln!(out, "{}", line.green())
        } else {
            writeln!(out, "{line}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        Document::parse(value.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn renders_nested_field() {
        let f = Formatter::new("%a.b");
        assert_eq!(f.render(&doc(json!({"a": {"b": "X"}}))), "X");
    }

    #[test]
    fn missing_field_keeps_placeholder() {
        let f = Formatter::new("%a.b");
        assert_eq!(f.render(&doc(json!({"a": {}}))), "%a.b");
    }

    #[test]
    fn replaces_every_occurrence() {
        let f = Formatter::new("[%level] %message (%level)");
        let line = f.render(&doc(json!({"level": "WARN", "message": "disk"})));
        assert_eq!(line, "[WARN] disk (WARN)");
    }

    #[test]
    fn mixes_resolved_and_unresolved_tokens() {
        let f = Formatter::new("%@timestamp %host.name %missing");
        let line = f.render(&doc(json!({
            "@timestamp": "2024-01-02T03:04:05Z",
            "host": {"name": "web-01"}
        })));
        assert_eq!(line, "2024-01-02T03:04:05Z web-01 %missing");
    }

    #[test]
    fn longer_token_is_not_clobbered_by_prefix_token() {
        let f = Formatter::new("%a %ab");
        let line = f.render(&doc(json!({"a": "1", "ab": "2"})));
        assert_eq!(line, "1 2");
    }

    #[test]
    fn substituted_values_are_not_reinterpreted() {
        let f = Formatter::new("%message %level");
        let line = f.render(&doc(json!({"message": "100%level", "level": "INFO"})));
        assert_eq!(line, "100%level INFO");
    }

    #[test]
    fn template_without_tokens_is_unchanged() {
        let f = Formatter::new("static 100% text");
        assert_eq!(f.render(&doc(json!({}))), "static 100% text");
    }

    #[test]
    fn tokens_are_distinct_in_order() {
        let f = Formatter::new("%b %a %b %c-d");
        assert_eq!(f.tokens(), vec!["%b", "%a", "%c-d"]);
    }

    #[test]
    fn write_line_appends_newline_without_color() {
        let f = Formatter::new("%message");
        let mut out = Vec::new();
        f.write_line(&doc(json!({"message": "hi"})), &mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hi\n");
    }
}
