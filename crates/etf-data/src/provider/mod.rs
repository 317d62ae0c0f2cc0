//! 데이터 Provider 모듈.
//!
//! ETF 참조 데이터를 외부 소스에서 가져오는 Provider를 정의합니다.
//!
//! ## Alpha Vantage
//! - `AlphaVantageClient`: Alpha Vantage API 클라이언트 (API 키 필요)
//! - ETF 프로필 (총보수, 구성종목/비중)
//! - 월간 수정종가 시계열 (CAGR 계산용)

pub mod alpha_vantage;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use alpha_vantage::{AlphaVantageClient, AlphaVantageConfig};

/// ETF 구성종목.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// 구성종목 심볼
    pub symbol: String,
    /// 비중 (0.05 = 5%). 파싱 불가 시 None
    pub weight: Option<Decimal>,
}

/// ETF 프로필.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EtfProfile {
    /// 순 총보수 (0.0009 = 0.09%)
    pub net_expense_ratio: Option<Decimal>,
    /// 구성종목 목록 (소스가 제공한 순서 유지)
    pub holdings: Vec<Holding>,
}

/// 월간 수정종가 시계열.
///
/// 날짜는 월 단위 데이터의 기준일(보통 월말)이며, 달력 순서로 정렬됩니다.
/// 가격을 파싱할 수 없는 월도 `None`으로 자리를 유지하므로 월 인덱스가 밀리지 않습니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    /// 응답에 포함된 심볼 (있을 경우)
    pub symbol: Option<String>,
    /// 날짜 → 수정종가 (파싱 불가 시 None)
    pub points: BTreeMap<NaiveDate, Option<Decimal>>,
}

impl PriceSeries {
    /// (날짜, 가격) 목록으로 시계열 생성.
    pub fn from_points(points: impl IntoIterator<Item = (NaiveDate, Decimal)>) -> Self {
        Self {
            symbol: None,
            points: points
                .into_iter()
                .map(|(date, price)| (date, Some(price)))
                .collect(),
        }
    }

    /// 한 달 데이터 추가 (같은 날짜면 덮어씀).
    pub fn insert(&mut self, date: NaiveDate, price: Option<Decimal>) {
        self.points.insert(date, price);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 가장 최근 날짜부터 정렬된 가격 목록.
    pub fn latest_first(&self) -> Vec<Option<Decimal>> {
        self.points.values().rev().copied().collect()
    }
}

/// ETF 데이터 Provider trait.
///
/// 조회 실패(전송 오류, 비정상 HTTP 상태, 파싱 불가 응답)는 모두 `Err`로 반환되며,
/// 호출자는 해당 심볼만 건너뛰고 다음 심볼을 계속 처리합니다.
#[async_trait]
pub trait EtfDataSource: Send + Sync {
    /// Provider 이름.
    fn name(&self) -> &str;

    /// ETF 프로필 (총보수 + 구성종목) 조회.
    async fn fetch_profile(&self, symbol: &str) -> Result<EtfProfile>;

    /// 월간 수정종가 시계열 조회.
    async fn fetch_monthly_series(&self, symbol: &str) -> Result<PriceSeries>;
}

/// 문자열을 Decimal로 파싱 (쉼표, 퍼센트 기호 제거).
///
/// "n/a", 빈 문자열 등 숫자가 아닌 값은 None.
pub(crate) fn parse_decimal(s: &str) -> Option<Decimal> {
    let cleaned = s.trim().replace(',', "").replace('%', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned
        .parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(&cleaned).ok())
}
