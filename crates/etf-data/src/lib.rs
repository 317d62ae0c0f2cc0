//! ETF 참조 데이터 수집 및 저장.
//!
//! 이 crate는 다음을 제공합니다:
//! - Alpha Vantage ETF 프로필 / 월간 수정종가 클라이언트
//! - 월간 시계열 기반 1/3/5년 CAGR 계산
//! - SQLite 저장소 (ETF 레지스트리, 펀더멘털, 구성종목)

pub mod error;
pub mod metrics;
pub mod provider;
pub mod storage;

pub use error::{DataError, Result};

pub use metrics::{calculate_cagrs, cagr_for_horizon, CagrSet};
pub use provider::{
    AlphaVantageClient, AlphaVantageConfig, EtfDataSource, EtfProfile, Holding, PriceSeries,
};
pub use storage::{DatabaseConfig, EtfFundamentalsRecord, EtfRegistryRecord, EtfStore, HoldingRecord};
