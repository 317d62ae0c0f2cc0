//! 환경변수 기반 설정 모듈.

use std::time::Duration;

use etf_data::provider::alpha_vantage::DEFAULT_BASE_URL;
use etf_data::{AlphaVantageConfig, DatabaseConfig};
use secrecy::SecretString;

use crate::Result;

/// Collector 전체 설정
#[derive(Debug)]
pub struct CollectorConfig {
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 시작 시 마이그레이션 실행 여부
    pub run_migrations: bool,
    /// Alpha Vantage 설정
    pub alpha_vantage: AlphaVantageSettings,
    /// ETF 업데이트 설정
    pub etf_update: EtfUpdateConfig,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

/// Alpha Vantage 설정
#[derive(Debug)]
pub struct AlphaVantageSettings {
    /// API 키 (없으면 매 사이클이 작업 없이 종료)
    pub api_key: Option<SecretString>,
    /// 기본 URL
    pub base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

/// ETF 업데이트 설정
#[derive(Debug, Clone)]
pub struct EtfUpdateConfig {
    /// 사이클당 처리할 ETF 수 (오래된 순)
    pub batch_size: i64,
}

/// 데몬 모드 설정
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 사이클 실행 주기 (분 단위)
    pub interval_minutes: u64,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            crate::error::CollectorError::Config(
                "DATABASE_URL 환경변수가 설정되지 않았습니다".to_string(),
            )
        })?;

        Ok(Self {
            database: DatabaseConfig {
                max_connections: env_var_parse("DATABASE_MAX_CONNECTIONS", 5),
                ..DatabaseConfig::new(database_url)
            },
            run_migrations: env_var_bool("DATABASE_RUN_MIGRATIONS", true),
            alpha_vantage: AlphaVantageSettings {
                api_key: api_key_from(std::env::var("ALPHA_VANTAGE_API_KEY").ok()),
                base_url: std::env::var("ALPHA_VANTAGE_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
                timeout_secs: env_var_parse("ALPHA_VANTAGE_TIMEOUT_SECS", 30),
            },
            etf_update: EtfUpdateConfig {
                batch_size: env_var_parse("ETF_UPDATE_BATCH_SIZE", 5),
            },
            daemon: DaemonConfig {
                interval_minutes: env_var_parse("DAEMON_INTERVAL_MINUTES", 60),
            },
        })
    }
}

impl AlphaVantageSettings {
    /// API 키가 설정되어 있으면 클라이언트 설정 생성
    pub fn client_config(&self) -> Option<AlphaVantageConfig> {
        self.api_key.as_ref().map(|key| {
            AlphaVantageConfig::new(key)
                .with_base_url(self.base_url.clone())
                .with_timeout(Duration::from_secs(self.timeout_secs))
        })
    }
}

impl DaemonConfig {
    /// 사이클 실행 주기를 Duration으로 반환
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

/// 빈 문자열은 미설정으로 취급
fn api_key_from(value: Option<String>) -> Option<SecretString> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 bool 값 파싱
fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}
