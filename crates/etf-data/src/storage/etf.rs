//! SQLite 기반 ETF 저장소.
//!
//! 테이블 구성:
//! - `etfs`: ETF 레지스트리 (외부에서 등록, `last_updated`만 갱신)
//! - `etf_fundamentals`: ETF별 총보수 및 1/3/5년 CAGR (1행/ETF, upsert)
//! - `etf_holdings`: ETF 구성종목 (매 사이클 삭제 후 재삽입)
//!
//! `last_updated`는 epoch 밀리초(INTEGER)로 저장하며, NULL은 한 번도 갱신되지 않은 ETF입니다.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use tracing::{debug, info, instrument};

use crate::error::{DataError, Result};
use crate::metrics::CagrSet;
use crate::provider::{EtfProfile, Holding};

/// 구성종목 일괄 삽입 시 청크 크기 (행당 바인드 3개, SQLite 기본 바인드 한도 999 이하).
const HOLDINGS_INSERT_CHUNK: usize = 300;

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 데이터베이스 URL (sqlite://etf.db?mode=rwc)
    pub url: String,
    /// 풀의 최대 연결 수
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    30
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// ETF 레지스트리 레코드.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct EtfRegistryRecord {
    pub symbol: String,
    /// epoch 밀리초
    pub last_updated: Option<i64>,
}

impl EtfRegistryRecord {
    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        self.last_updated.and_then(DateTime::from_timestamp_millis)
    }
}

/// ETF 펀더멘털 레코드.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct EtfFundamentalsRecord {
    pub etf: String,
    pub expense_ratio: Option<f64>,
    pub cagr_1yr: Option<f64>,
    pub cagr_3yr: Option<f64>,
    pub cagr_5yr: Option<f64>,
}

/// ETF 구성종목 레코드.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct HoldingRecord {
    pub etf: String,
    pub holding: String,
    pub weight: Option<f64>,
}

/// ETF 저장소 (SQLite 연결 풀 래퍼).
#[derive(Clone)]
pub struct EtfStore {
    pool: SqlitePool,
}

impl EtfStore {
    /// 새로운 연결 풀을 생성합니다.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| DataError::ConnectionError(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(options)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// 마이그레이션이 적용된 인메모리 저장소를 생성합니다.
    ///
    /// 인메모리 DB는 연결마다 별개이므로 단일 연결을 유지합니다.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DataError::ConnectionError(e.to_string()))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// 내부 연결 풀을 반환합니다.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 데이터베이스 마이그레이션을 실행합니다.
    pub async fn migrate(&self) -> Result<()> {
        debug!("Running database migrations...");

        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DataError::MigrationError(e.to_string()))?;

        debug!("Migrations completed successfully");
        Ok(())
    }

    /// 데이터베이스 상태를 확인합니다.
    pub async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// 갱신이 가장 오래된 ETF 심볼을 최대 `limit`개 조회합니다.
    ///
    /// 한 번도 갱신되지 않은(NULL) 심볼이 항상 먼저 선택됩니다.
    pub async fn select_stale_symbols(&self, limit: i64) -> Result<Vec<String>> {
        let symbols: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT symbol
            FROM etfs
            ORDER BY COALESCE(last_updated, 0) ASC, symbol ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(symbols)
    }

    /// 갱신 시각을 기록합니다 (epoch 밀리초).
    pub async fn mark_updated(&self, symbol: &str, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE etfs SET last_updated = ? WHERE symbol = ?")
            .bind(at.timestamp_millis())
            .bind(symbol)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DataError::NotFound(format!("등록되지 않은 ETF: {}", symbol)));
        }
        Ok(())
    }

    /// 레지스트리 전체를 갱신 순서(오래된 순)로 조회합니다.
    pub async fn list_registry(&self) -> Result<Vec<EtfRegistryRecord>> {
        sqlx::query_as(
            r#"
            SELECT symbol, last_updated
            FROM etfs
            ORDER BY COALESCE(last_updated, 0) ASC, symbol ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    /// 단일 ETF의 레지스트리 레코드를 조회합니다.
    pub async fn get_registry(&self, symbol: &str) -> Result<Option<EtfRegistryRecord>> {
        sqlx::query_as("SELECT symbol, last_updated FROM etfs WHERE symbol = ?")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    // =========================================================================
    // Fundamentals / Holdings
    // =========================================================================

    /// 프로필과 CAGR을 저장합니다 (펀더멘털 upsert + 구성종목 교체).
    ///
    /// 반환값은 저장된 구성종목 수.
    #[instrument(skip(self, profile, cagrs), fields(holdings = profile.holdings.len()))]
    pub async fn store_etf_data(
        &self,
        symbol: &str,
        profile: &EtfProfile,
        cagrs: &CagrSet,
    ) -> Result<usize> {
        self.upsert_fundamentals(symbol, profile, cagrs).await?;
        self.replace_holdings(symbol, &profile.holdings).await
    }

    /// 펀더멘털을 upsert 합니다. 충돌 시 네 개 수치 컬럼을 모두 덮어씁니다.
    pub async fn upsert_fundamentals(
        &self,
        symbol: &str,
        profile: &EtfProfile,
        cagrs: &CagrSet,
    ) -> Result<()> {
        let expense_ratio = profile.net_expense_ratio.and_then(|r| r.to_f64());

        sqlx::query(
            r#"
            INSERT INTO etf_fundamentals (etf, expense_ratio, "1yr_cagr", "3yr_cagr", "5yr_cagr")
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (etf) DO UPDATE SET
                expense_ratio = excluded.expense_ratio,
                "1yr_cagr" = excluded."1yr_cagr",
                "3yr_cagr" = excluded."3yr_cagr",
                "5yr_cagr" = excluded."5yr_cagr"
            "#,
        )
        .bind(symbol)
        .bind(expense_ratio)
        .bind(cagrs.one_year)
        .bind(cagrs.three_year)
        .bind(cagrs.five_year)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 구성종목을 교체합니다.
    ///
    /// 기존 행 삭제와 신규 행 삽입을 하나의 트랜잭션으로 처리하므로,
    /// 중간 실패 시 이전 구성종목이 그대로 남습니다.
    /// 빈 목록이면 삭제만 수행합니다.
    pub async fn replace_holdings(&self, symbol: &str, holdings: &[Holding]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM etf_holdings WHERE etf = ?")
            .bind(symbol)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for chunk in holdings.chunks(HOLDINGS_INSERT_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO etf_holdings (etf, holding, weight) ");
            builder.push_values(chunk, |mut row, holding| {
                row.push_bind(symbol)
                    .push_bind(holding.symbol.as_str())
                    .push_bind(holding.weight.and_then(|w| w.to_f64()));
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        debug!(
            symbol = symbol,
            deleted = deleted,
            inserted = holdings.len(),
            "구성종목 교체 완료"
        );

        Ok(holdings.len())
    }

    /// 펀더멘털을 조회합니다.
    pub async fn get_fundamentals(&self, symbol: &str) -> Result<Option<EtfFundamentalsRecord>> {
        sqlx::query_as(
            r#"
            SELECT etf, expense_ratio,
                   "1yr_cagr" AS cagr_1yr,
                   "3yr_cagr" AS cagr_3yr,
                   "5yr_cagr" AS cagr_5yr
            FROM etf_fundamentals
            WHERE etf = ?
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    /// 구성종목을 조회합니다 (삽입 순서).
    pub async fn get_holdings(&self, symbol: &str) -> Result<Vec<HoldingRecord>> {
        sqlx::query_as(
            r#"
            SELECT etf, holding, weight
            FROM etf_holdings
            WHERE etf = ?
            ORDER BY rowid
            "#,
        )
        .bind(symbol)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn store_with(symbols: &[&str]) -> EtfStore {
        let store = EtfStore::connect_in_memory().await.unwrap();
        for symbol in symbols {
            sqlx::query("INSERT INTO etfs (symbol) VALUES (?)")
                .bind(*symbol)
                .execute(store.pool())
                .await
                .unwrap();
        }
        store
    }

    async fn set_last_updated(store: &EtfStore, symbol: &str, millis: i64) {
        sqlx::query("UPDATE etfs SET last_updated = ? WHERE symbol = ?")
            .bind(millis)
            .bind(symbol)
            .execute(store.pool())
            .await
            .unwrap();
    }

    fn profile(expense_ratio: rust_decimal::Decimal, holdings: &[(&str, rust_decimal::Decimal)]) -> EtfProfile {
        EtfProfile {
            net_expense_ratio: Some(expense_ratio),
            holdings: holdings
                .iter()
                .map(|(symbol, weight)| Holding {
                    symbol: symbol.to_string(),
                    weight: Some(*weight),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_select_stale_symbols_nulls_first() {
        let store = store_with(&["AAA", "BBB", "CCC", "DDD", "EEE", "FFF", "GGG"]).await;
        set_last_updated(&store, "AAA", 1_000).await;
        set_last_updated(&store, "BBB", 500).await;

        let selected = store.select_stale_symbols(5).await.unwrap();

        assert_eq!(selected, vec!["CCC", "DDD", "EEE", "FFF", "GGG"]);
    }

    #[tokio::test]
    async fn test_select_stale_symbols_orders_by_age() {
        let store = store_with(&["AAA", "BBB", "CCC"]).await;
        set_last_updated(&store, "AAA", 3_000).await;
        set_last_updated(&store, "BBB", 1_000).await;

        let selected = store.select_stale_symbols(5).await.unwrap();

        assert_eq!(selected, vec!["CCC", "BBB", "AAA"]);
    }

    #[tokio::test]
    async fn test_select_stale_symbols_empty_registry() {
        let store = store_with(&[]).await;
        assert!(store.select_stale_symbols(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_fundamentals_overwrites() {
        let store = store_with(&["SPY"]).await;
        let cagrs = CagrSet {
            one_year: 0.1,
            three_year: 0.2,
            five_year: 0.3,
        };

        store
            .store_etf_data("SPY", &profile(dec!(0.0945), &[]), &cagrs)
            .await
            .unwrap();
        store
            .store_etf_data("SPY", &profile(dec!(0.0009), &[]), &CagrSet::default())
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM etf_fundamentals WHERE etf = 'SPY'")
            .fetch_one(store.pool())
            .await
            .unwrap();
        let row = store.get_fundamentals("SPY").await.unwrap().unwrap();

        assert_eq!(count, 1);
        assert_eq!(row.expense_ratio, Some(0.0009));
        assert_eq!(row.cagr_1yr, Some(0.0));
        assert_eq!(row.cagr_3yr, Some(0.0));
        assert_eq!(row.cagr_5yr, Some(0.0));
    }

    #[tokio::test]
    async fn test_replace_holdings_leaves_no_stale_rows() {
        let store = store_with(&["SPY"]).await;

        store
            .replace_holdings("SPY", &profile(dec!(0), &[("A", dec!(0.5)), ("B", dec!(0.5))]).holdings)
            .await
            .unwrap();
        store
            .replace_holdings("SPY", &profile(dec!(0), &[("C", dec!(1.0))]).holdings)
            .await
            .unwrap();

        let holdings = store.get_holdings("SPY").await.unwrap();
        assert_eq!(
            holdings,
            vec![HoldingRecord {
                etf: "SPY".to_string(),
                holding: "C".to_string(),
                weight: Some(1.0),
            }]
        );
    }

    #[tokio::test]
    async fn test_replace_holdings_with_empty_list_clears() {
        let store = store_with(&["SPY", "QQQ"]).await;
        store
            .replace_holdings("SPY", &profile(dec!(0), &[("A", dec!(1))]).holdings)
            .await
            .unwrap();
        store
            .replace_holdings("QQQ", &profile(dec!(0), &[("B", dec!(1))]).holdings)
            .await
            .unwrap();

        let inserted = store.replace_holdings("SPY", &[]).await.unwrap();

        assert_eq!(inserted, 0);
        assert!(store.get_holdings("SPY").await.unwrap().is_empty());
        assert_eq!(store.get_holdings("QQQ").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_holdings_large_list_is_chunked() {
        let store = store_with(&["VTI"]).await;
        let holdings: Vec<Holding> = (0..1_234)
            .map(|i| Holding {
                symbol: format!("H{i:04}"),
                weight: None,
            })
            .collect();

        let inserted = store.replace_holdings("VTI", &holdings).await.unwrap();
        let stored = store.get_holdings("VTI").await.unwrap();

        assert_eq!(inserted, 1_234);
        assert_eq!(stored.len(), 1_234);
        assert_eq!(stored[0].holding, "H0000");
        assert_eq!(stored[0].weight, None);
    }

    #[tokio::test]
    async fn test_mark_updated() {
        let store = store_with(&["SPY"]).await;
        let at = DateTime::from_timestamp_millis(1_717_171_717_000).unwrap();

        store.mark_updated("SPY", at).await.unwrap();

        let record = store.get_registry("SPY").await.unwrap().unwrap();
        assert_eq!(record.last_updated, Some(1_717_171_717_000));
        assert_eq!(record.last_updated_at(), Some(at));
    }

    #[tokio::test]
    async fn test_mark_updated_unknown_symbol() {
        let store = store_with(&[]).await;
        let err = store.mark_updated("NOPE", Utc::now()).await.unwrap_err();
        assert!(matches!(err, DataError::NotFound(_)));
    }
}
