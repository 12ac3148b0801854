//! tail 엔진 에러 타입
//!
//! [`TailError`]는 인덱스 선택부터 결과 출력까지 tail 엔진 내부에서 발생하는
//! 모든 치명적 에러를 표현합니다. 엔진은 프로세스를 직접 종료하지 않고
//! 에러를 상위로 전파하며, CLI의 단일 경계에서 진단 메시지와 함께 종료합니다.
//!
//! [`EvalError`]는 포맷 토큰 하나의 평가 실패로, 출력 라인에 원래 토큰을
//! 그대로 남기는 복구 가능한 에러입니다.

/// tail 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    /// 검색 백엔드에 연결할 수 없음
    #[error("backend unreachable at {url}: {reason}")]
    Unreachable {
        /// 접속 대상 URL
        url: String,
        /// 실패 사유
        reason: String,
    },

    /// 검색 백엔드가 요청을 거부하거나 응답을 해석할 수 없음
    #[error("backend error: {0}")]
    Backend(String),

    /// 패턴과 일치하는 인덱스가 없음
    #[error("no index matches pattern '{pattern}'")]
    NoMatchingIndex {
        /// 인덱스 이름 패턴
        pattern: String,
    },

    /// 날짜를 추출하거나 해석할 수 없음
    #[error("invalid date in '{input}': {reason}")]
    InvalidDate {
        /// 원본 문자열 (인덱스 이름 또는 사용자 입력)
        input: String,
        /// 실패 사유
        reason: String,
    },

    /// 인덱스 패턴 정규식 컴파일 실패
    #[error("invalid index pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// 검색 결과 문서 본문을 파싱할 수 없음
    #[error("malformed document body: {0}")]
    MalformedDocument(#[from] serde_json::Error),

    /// 문서에 타임스탬프 필드가 없거나 문자열로 표현할 수 없음
    #[error("document has no usable timestamp field '{field}'")]
    MissingTimestamp {
        /// 타임스탬프 필드명
        field: String,
    },

    /// SSH 터널 에러
    #[error("tunnel error: {0}")]
    Tunnel(String),

    /// 결과 출력 실패
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}

/// 필드 표현식 평가 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// 키가 없거나 값이 null
    #[error("field '{path}' not found in document")]
    NotFound {
        /// 평가 중이던 표현식
        path: String,
    },

    /// 키로 접근하려는 값이 객체가 아님
    #[error("cannot evaluate '{path}': value is not a mapping")]
    NotAMapping {
        /// 평가 중이던 표현식
        path: String,
    },
}
