//! 적응형 폴링 간격

use std::time::Duration;

/// 폴링 간격
///
/// 결과가 있으면 하한으로 되돌리고, 없으면 `step`씩 늘려 상한에서 멈춥니다.
/// 현재 값은 항상 `[floor, ceiling]` 안에 있습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollDelay {
    floor: Duration,
    ceiling: Duration,
    step: Duration,
    current: Duration,
}

impl PollDelay {
    /// 하한에서 시작하는 폴링 간격을 생성합니다.
    ///
    /// `floor > ceiling`이면 상한을 하한으로 올립니다.
    pub fn new(floor: Duration, ceiling: Duration, step: Duration) -> Self {
        let ceiling = ceiling.max(floor);
        Self {
            floor,
            ceiling,
            step,
            current: floor,
        }
    }

    /// 밀리초 단위 설정값으로 생성합니다.
    pub fn from_millis(floor_ms: u64, ceiling_ms: u64, step_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(floor_ms),
            Duration::from_millis(ceiling_ms),
            Duration::from_millis(step_ms),
        )
    }

    /// 다음 폴링까지 기다릴 시간
    pub fn current(&self) -> Duration {
        self.current
    }

    /// 하한
    pub fn floor(&self) -> Duration {
        self.floor
    }

    /// 상한
    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// 직전 폴링의 결과 건수로 간격을 조정하고 새 간격을 반환합니다.
    pub fn adjust(&mut self, total_hits: u64) -> Duration {
        self.current = if total_hits > 0 {
            self.floor
        } else {
            (self.current + self.step).min(self.ceiling)
        };
        self.current
    }
}

impl Default for PollDelay {
    fn default() -> Self {
        Self::from_millis(500, 2000, 500)
    }
}
