//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 업데이트 사이클 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 선택된 ETF 수
    pub total: usize,
    /// 성공 횟수
    pub success: usize,
    /// 조회 실패로 건너뛴 횟수 (다음 사이클에서 재선택됨)
    pub fetch_failed: usize,
    /// 계산/저장 단계 에러 횟수
    pub errors: usize,
    /// 저장된 총 구성종목 수
    pub holdings_stored: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 실패 횟수 (조회 실패 + 처리 에러)
    pub fn failed(&self) -> usize {
        self.fetch_failed + self.errors
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            fetch_failed = self.fetch_failed,
            errors = self.errors,
            failed = self.failed(),
            holdings_stored = self.holdings_stored,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "사이클 완료"
        );
    }
}
