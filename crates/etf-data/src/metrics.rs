//! 월간 수정종가 기반 CAGR 계산.
//!
//! 가장 최근 월(인덱스 0)을 기준으로 `years * 12` 번째 월의 가격과 비교합니다.
//! 실제 경과 기간이 아닌 월 인덱스를 사용하므로, 소스에서 월이 누락되면
//! 비교 시점도 그만큼 과거로 밀립니다. 가격만 누락된 월은 자리를 유지합니다.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::provider::PriceSeries;

/// CAGR 계산 대상 기간 (년).
pub const CAGR_HORIZONS: [u32; 3] = [1, 3, 5];

/// 1년당 월 수.
const MONTHS_PER_YEAR: usize = 12;

/// 1/3/5년 CAGR (0.12 = 12%).
///
/// 과거 데이터가 부족한 기간은 0.0으로 기록됩니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CagrSet {
    pub one_year: f64,
    pub three_year: f64,
    pub five_year: f64,
}

/// 시계열에서 1/3/5년 CAGR 계산.
///
/// 빈 시계열이거나 최신 월 가격이 없으면 모두 0.0.
pub fn calculate_cagrs(series: &PriceSeries) -> CagrSet {
    let prices = series.latest_first();
    if !matches!(prices.first(), Some(Some(_))) {
        return CagrSet::default();
    }

    let [one, three, five] = CAGR_HORIZONS.map(|years| cagr_for_horizon(&prices, years).unwrap_or(0.0));

    CagrSet {
        one_year: one,
        three_year: three,
        five_year: five,
    }
}

/// 단일 기간 CAGR.
///
/// `prices`는 최신 월부터 정렬되어 있어야 합니다.
/// 다음 경우 None:
/// - `years`가 0
/// - 최신 월 또는 `years * 12` 번째 월의 가격이 없음 (범위 밖 포함)
/// - 과거 가격이 0
/// - 결과가 유한한 수가 아님
pub fn cagr_for_horizon(prices: &[Option<Decimal>], years: u32) -> Option<f64> {
    if years == 0 {
        return None;
    }

    let latest = (*prices.first()?)?.to_f64()?;
    let past = (*prices.get(years as usize * MONTHS_PER_YEAR)?)?;
    if past.is_zero() {
        return None;
    }
    let past = past.to_f64()?;

    let cagr = (latest / past).powf(1.0 / years as f64) - 1.0;
    cagr.is_finite().then_some(cagr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Months, NaiveDate};
    use rust_decimal_macros::dec;

    /// 최신 월부터 주어진 가격으로 월간 시계열 생성.
    fn monthly_series(latest_first: &[Decimal]) -> PriceSeries {
        PriceSeries::from_points(
            latest_first
                .iter()
                .enumerate()
                .map(|(i, price)| (month(i as u32), *price)),
        )
    }

    /// 기준월(2024-06-01)에서 `back`개월 전 날짜.
    fn month(back: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap() - Months::new(back)
    }

    fn series_prices(prices: &[Decimal]) -> Vec<Option<Decimal>> {
        prices.iter().copied().map(Some).collect()
    }

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_one_year_doubling() {
        let mut prices = vec![dec!(100)];
        prices.extend(std::iter::repeat(dec!(75)).take(11));
        prices.push(dec!(50));

        let cagrs = calculate_cagrs(&monthly_series(&prices));

        assert!(approx_eq(cagrs.one_year, 1.0));
        assert_eq!(cagrs.three_year, 0.0);
        assert_eq!(cagrs.five_year, 0.0);
    }

    #[test]
    fn test_insufficient_history_is_zero() {
        let prices = vec![dec!(100); 12];
        let cagrs = calculate_cagrs(&monthly_series(&prices));

        assert_eq!(cagrs, CagrSet::default());
        assert_eq!(cagr_for_horizon(&series_prices(&prices), 1), None);
    }

    #[test]
    fn test_empty_series() {
        assert_eq!(calculate_cagrs(&PriceSeries::default()), CagrSet::default());
    }

    #[test]
    fn test_three_and_five_year() {
        // 61개월: 5년 전 100 → 3년 전 125 → 현재 200
        let mut prices = vec![dec!(150); 61];
        prices[0] = dec!(200);
        prices[36] = dec!(125);
        prices[60] = dec!(100);

        let cagrs = calculate_cagrs(&monthly_series(&prices));

        assert!(approx_eq(cagrs.one_year, 200.0 / 150.0 - 1.0));
        assert!(approx_eq(cagrs.three_year, 1.6f64.powf(1.0 / 3.0) - 1.0));
        assert!(approx_eq(cagrs.five_year, 2.0f64.powf(0.2) - 1.0));
    }

    #[test]
    fn test_zero_past_price_is_zero() {
        let mut prices = vec![dec!(100); 13];
        prices[12] = Decimal::ZERO;

        assert_eq!(cagr_for_horizon(&series_prices(&prices), 1), None);
        assert_eq!(calculate_cagrs(&monthly_series(&prices)).one_year, 0.0);
    }

    #[test]
    fn test_negative_growth() {
        let mut prices = vec![dec!(80); 13];
        prices[12] = dec!(100);

        let cagr = cagr_for_horizon(&series_prices(&prices), 1).unwrap();
        assert!(approx_eq(cagr, -0.2));
    }

    #[test]
    fn test_missing_past_price_is_zero() {
        // 12번째 월 가격 누락: 13번째 월로 밀려 비교하지 않음
        let mut prices = vec![dec!(100); 14];
        prices[0] = dec!(200);
        prices[13] = dec!(50);
        let mut series = monthly_series(&prices);
        series.insert(month(12), None);

        let latest_first = series.latest_first();
        assert_eq!(latest_first.len(), 14);
        assert_eq!(latest_first[12], None);
        assert_eq!(cagr_for_horizon(&latest_first, 1), None);
        assert_eq!(calculate_cagrs(&series).one_year, 0.0);
    }

    #[test]
    fn test_missing_latest_price_is_all_zero() {
        let mut prices = vec![dec!(100); 61];
        prices[60] = dec!(50);
        let mut series = monthly_series(&prices);
        series.insert(month(0), None);

        assert_eq!(calculate_cagrs(&series), CagrSet::default());
    }

    #[test]
    fn test_zero_years_is_none() {
        let prices = series_prices(&[dec!(100); 13]);

        assert_eq!(cagr_for_horizon(&prices, 0), None);
    }

    #[test]
    fn test_dates_sorted_by_calendar() {
        // 입력 순서와 무관하게 달력상 최신 월이 기준
        let latest = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let mut points: Vec<(NaiveDate, Decimal)> = (1..=11)
            .map(|i| (latest - Months::new(i), dec!(70)))
            .collect();
        points.push((latest - Months::new(12), dec!(60)));
        points.reverse();
        points.push((latest, dec!(120)));

        let series = PriceSeries::from_points(points);
        let cagrs = calculate_cagrs(&series);

        assert_eq!(series.len(), 13);
        assert!(approx_eq(cagrs.one_year, 1.0));
    }
}
