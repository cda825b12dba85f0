//! 엔진 시계.
//!
//! 포트 시간 판정, 거래 시간 판정, 지정가 대기 시간 계산은 모두 거래소 현지 시각(IST)을 씁니다.

use chrono::{NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;

/// 현지 벽시계.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Clock {
    /// 시스템 시각을 해당 타임존으로 변환
    System(Tz),
    /// 고정 시각 (테스트, 재현)
    Fixed(NaiveDateTime),
}

impl Clock {
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Clock::System(tz) => Utc::now().with_timezone(tz).naive_local(),
            Clock::Fixed(at) => *at,
        }
    }

    pub fn time(&self) -> NaiveTime {
        self.now().time()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::System(chrono_tz::Asia::Kolkata)
    }
}
