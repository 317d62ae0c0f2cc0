//! Alpha Vantage API 클라이언트.
//!
//! ETF 프로필과 월간 수정종가 시계열 두 가지 엔드포인트만 사용합니다.
//!
//! # 엔드포인트
//!
//! - `function=ETF_PROFILE`: 순 총보수, 구성종목/비중
//! - `function=TIME_SERIES_MONTHLY_ADJUSTED`: 월간 수정종가
//!
//! 두 요청 모두 `symbol`, `apikey` 쿼리 파라미터가 필요합니다.
//! 재시도는 하지 않습니다. 실패한 심볼은 다음 사이클에서 다시 선택됩니다.
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use etf_data::provider::AlphaVantageClient;
//! use secrecy::SecretString;
//!
//! let key = SecretString::from(std::env::var("ALPHA_VANTAGE_API_KEY")?);
//! let client = AlphaVantageClient::new(&key)?;
//!
//! let profile = client.fetch_etf_profile("SPY").await?;
//! let series = client.fetch_monthly_adjusted("SPY").await?;
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{parse_decimal, EtfDataSource, EtfProfile, Holding, PriceSeries};
use crate::error::{DataError, Result};

/// Alpha Vantage 기본 URL.
pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

const FUNCTION_ETF_PROFILE: &str = "ETF_PROFILE";
const FUNCTION_MONTHLY_ADJUSTED: &str = "TIME_SERIES_MONTHLY_ADJUSTED";

/// Alpha Vantage 클라이언트 설정.
#[derive(Debug)]
pub struct AlphaVantageConfig {
    /// API 키
    pub api_key: SecretString,
    /// 기본 URL (테스트 시 mock 서버 주소로 교체)
    pub base_url: String,
    /// 요청 타임아웃
    pub timeout: Duration,
}

impl AlphaVantageConfig {
    pub fn new(api_key: &SecretString) -> Self {
        Self {
            api_key: SecretString::from(api_key.expose_secret().to_owned()),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Alpha Vantage API 클라이언트.
pub struct AlphaVantageClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

// ==================== 응답 구조 ====================

#[derive(Debug, Deserialize)]
struct RawEtfProfile {
    #[serde(default)]
    net_expense_ratio: Option<String>,
    holdings: Vec<RawHolding>,
}

#[derive(Debug, Deserialize)]
struct RawHolding {
    symbol: String,
    #[serde(default)]
    weight: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMonthlySeries {
    #[serde(rename = "Meta Data", default)]
    meta: Option<RawMeta>,
    #[serde(rename = "Monthly Adjusted Time Series")]
    series: HashMap<String, RawMonthlyBar>,
}

#[derive(Debug, Deserialize)]
struct RawMeta {
    #[serde(rename = "2. Symbol", default)]
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMonthlyBar {
    #[serde(rename = "5. adjusted close")]
    adjusted_close: String,
}

impl AlphaVantageClient {
    /// 기본 설정으로 클라이언트 생성.
    pub fn new(api_key: &SecretString) -> Result<Self> {
        Self::with_config(AlphaVantageConfig::new(api_key))
    }

    /// 설정을 지정하여 클라이언트 생성.
    pub fn with_config(config: AlphaVantageConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DataError::ConnectionError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// ETF 프로필 조회.
    pub async fn fetch_etf_profile(&self, symbol: &str) -> Result<EtfProfile> {
        let raw: RawEtfProfile = self.query(FUNCTION_ETF_PROFILE, symbol).await?;

        let net_expense_ratio = raw.net_expense_ratio.as_deref().and_then(parse_decimal);
        if net_expense_ratio.is_none() {
            debug!(symbol = symbol, value = ?raw.net_expense_ratio, "총보수 파싱 불가");
        }

        let holdings = raw
            .holdings
            .into_iter()
            .map(|h| Holding {
                weight: h.weight.as_deref().and_then(parse_decimal),
                symbol: h.symbol,
            })
            .collect::<Vec<_>>();

        debug!(
            symbol = symbol,
            expense_ratio = ?net_expense_ratio,
            holdings = holdings.len(),
            "ETF 프로필 조회 완료"
        );

        Ok(EtfProfile {
            net_expense_ratio,
            holdings,
        })
    }

    /// 월간 수정종가 시계열 조회.
    ///
    /// 날짜를 파싱할 수 없는 항목은 제외되고, 가격을 파싱할 수 없는 월은 `None`으로 남습니다.
    pub async fn fetch_monthly_adjusted(&self, symbol: &str) -> Result<PriceSeries> {
        let raw: RawMonthlySeries = self.query(FUNCTION_MONTHLY_ADJUSTED, symbol).await?;

        let echoed = raw.meta.and_then(|m| m.symbol);
        if let Some(ref echoed) = echoed {
            if !echoed.eq_ignore_ascii_case(symbol) {
                warn!(symbol = symbol, echoed = %echoed, "응답 심볼 불일치");
            }
        }

        let mut series = PriceSeries {
            symbol: echoed,
            ..Default::default()
        };

        for (date, bar) in raw.series {
            let Ok(date) = NaiveDate::parse_from_str(&date, "%Y-%m-%d") else {
                debug!(symbol = symbol, date = %date, "날짜 파싱 불가, 건너뜀");
                continue;
            };
            let price = parse_decimal(&bar.adjusted_close);
            if price.is_none() {
                debug!(symbol = symbol, %date, value = %bar.adjusted_close, "수정종가 파싱 불가");
            }
            series.insert(date, price);
        }

        debug!(symbol = symbol, months = series.len(), "월간 시계열 조회 완료");

        Ok(series)
    }

    /// API 요청 실행.
    ///
    /// 비정상 HTTP 상태는 `FetchError`, 디코딩 불가 응답은 `ParseError`.
    /// 오류 메시지에는 API 키가 포함된 URL을 남기지 않습니다.
    async fn query<T: DeserializeOwned>(&self, function: &str, symbol: &str) -> Result<T> {
        let url = format!("{}/query", self.base_url);

        debug!(function = function, symbol = symbol, "Alpha Vantage API 요청");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("function", function),
                ("symbol", symbol),
                ("apikey", self.api_key.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| DataError::from(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DataError::FetchError(format!(
                "Alpha Vantage 오류 [{} {}]: {} - {}",
                function, symbol, status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DataError::from(e.without_url()))?;

        serde_json::from_str::<T>(&body).map_err(|e| match provider_message(&body) {
            Some(message) => DataError::FetchError(format!(
                "Alpha Vantage 응답 [{} {}]: {}",
                function, symbol, message
            )),
            None => DataError::ParseError(format!("{} {}: {}", function, symbol, e)),
        })
    }
}

/// 정상 상태(200)로 돌아온 안내/오류 메시지 추출.
///
/// 호출 한도 초과("Note", "Information")나 잘못된 심볼("Error Message")은
/// 본문에 데이터 대신 메시지만 담겨 옵니다.
fn provider_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["Error Message", "Note", "Information"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
}

#[async_trait]
impl EtfDataSource for AlphaVantageClient {
    fn name(&self) -> &str {
        "alpha_vantage"
    }

    async fn fetch_profile(&self, symbol: &str) -> Result<EtfProfile> {
        self.fetch_etf_profile(symbol).await
    }

    async fn fetch_monthly_series(&self, symbol: &str) -> Result<PriceSeries> {
        self.fetch_monthly_adjusted(symbol).await
    }
}
