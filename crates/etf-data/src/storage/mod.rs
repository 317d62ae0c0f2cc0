//! 저장소 모듈.
//!
//! - `etf`: SQLite 기반 ETF 레지스트리 / 펀더멘털 / 구성종목 저장소

pub mod etf;

pub use etf::{DatabaseConfig, EtfFundamentalsRecord, EtfRegistryRecord, EtfStore, HoldingRecord};
