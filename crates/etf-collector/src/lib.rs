//! Scheduled ETF fundamentals collector.
//!
//! 이 crate는 주기적으로 실행되는 ETF 데이터 수집 바이너리를 제공합니다:
//! - 갱신이 오래된 ETF부터 소량 배치 선택 (rolling batch)
//! - Alpha Vantage 프로필 / 월간 수정종가 조회
//! - 총보수, 1/3/5년 CAGR, 구성종목 저장

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use stats::CollectionStats;
