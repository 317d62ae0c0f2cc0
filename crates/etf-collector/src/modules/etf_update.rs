//! ETF 펀더멘털 업데이트 사이클.
//!
//! 한 사이클은 다음 순서로 진행됩니다:
//! 1. 갱신이 가장 오래된 ETF를 최대 `batch_size`개 선택 (NULL 우선)
//! 2. 심볼마다 프로필과 월간 시계열을 동시에 조회
//! 3. 1/3/5년 CAGR 계산
//! 4. 펀더멘털 upsert + 구성종목 교체
//! 5. `last_updated` 갱신
//!
//! 심볼 단위 실패는 로그만 남기고 다음 심볼로 넘어갑니다. 실패한 심볼은
//! `last_updated`가 그대로이므로 다음 사이클에서 다시 선택됩니다.

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use etf_data::{calculate_cagrs, AlphaVantageClient, DataError, EtfDataSource, EtfStore};

use crate::error::CollectorError;
use crate::{CollectionStats, CollectorConfig, Result};

/// 심볼 단위 실패 구분.
#[derive(Debug)]
enum SymbolFailure {
    /// 프로필 또는 시계열 조회 실패
    Fetch(DataError),
    /// 계산 이후 저장 단계 실패
    Store(DataError),
}

/// 저장소 연결, 상태 확인, (설정 시) 마이그레이션 적용.
pub async fn open_store(config: &CollectorConfig) -> Result<EtfStore> {
    let store = EtfStore::connect(&config.database).await?;
    store.health_check().await?;
    if config.run_migrations {
        store.migrate().await?;
    }
    Ok(store)
}

/// 스케줄 트리거 1회: 저장소를 열고 사이클을 실행한 뒤 연결을 닫습니다.
///
/// API 키가 없으면 저장소에 접근하지 않고 종료합니다.
/// 저장소 연결 실패도 에러 로그만 남기고 빈 통계를 반환합니다.
pub async fn run_scheduled_cycle(config: &CollectorConfig) -> CollectionStats {
    if config.alpha_vantage.api_key.is_none() {
        error!("ALPHA_VANTAGE_API_KEY 환경변수가 설정되지 않았습니다. 사이클을 건너뜁니다.");
        return CollectionStats::new();
    }

    let store = match open_store(config).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "ETF 레지스트리 연결 실패, 사이클을 건너뜁니다");
            return CollectionStats::new();
        }
    };

    let stats = run_update_cycle(&store, config).await;
    store.pool().close().await;
    stats
}

/// 열린 저장소로 한 번의 업데이트 사이클 실행.
///
/// 어떤 실패도 호출자에게 전파하지 않습니다.
/// - API 키 미설정: 에러 로그 후 작업 없이 종료
/// - 후보 선택 실패 (DB 접근 불가 등): 에러 로그 후 종료
pub async fn run_update_cycle(store: &EtfStore, config: &CollectorConfig) -> CollectionStats {
    let Some(client_config) = config.alpha_vantage.client_config() else {
        error!("ALPHA_VANTAGE_API_KEY 환경변수가 설정되지 않았습니다. 사이클을 건너뜁니다.");
        return CollectionStats::new();
    };

    let client = match AlphaVantageClient::with_config(client_config) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Alpha Vantage 클라이언트 생성 실패");
            return CollectionStats::new();
        }
    };

    match update_batch(store, &client, config.etf_update.batch_size).await {
        Ok(stats) => stats,
        Err(e) => {
            error!(error = %e, "ETF 업데이트 사이클 실패");
            CollectionStats::new()
        }
    }
}

/// 오래된 순으로 ETF 배치를 갱신합니다.
///
/// 심볼은 순차 처리되며, 한 심볼 안에서만 두 요청이 동시에 진행됩니다.
/// 후보 선택 실패만 `Err`로 반환됩니다.
pub async fn update_batch<S>(
    store: &EtfStore,
    source: &S,
    batch_size: i64,
) -> Result<CollectionStats>
where
    S: EtfDataSource + ?Sized,
{
    let start = Instant::now();
    let mut stats = CollectionStats::new();

    let symbols = store.select_stale_symbols(batch_size).await?;

    if symbols.is_empty() {
        info!("갱신할 ETF가 없습니다");
        stats.elapsed = start.elapsed();
        return Ok(stats);
    }

    info!(
        count = symbols.len(),
        source = source.name(),
        "ETF 배치 업데이트 시작"
    );

    for (idx, symbol) in symbols.iter().enumerate() {
        stats.total += 1;

        debug!(
            symbol = %symbol,
            progress = format!("{}/{}", idx + 1, symbols.len()),
            "처리 시작"
        );

        match update_symbol(store, source, symbol).await {
            Ok(holdings) => {
                stats.success += 1;
                stats.holdings_stored += holdings;
                info!(symbol = %symbol, holdings, "ETF 데이터 갱신 완료");
            }
            Err(SymbolFailure::Fetch(e)) => {
                stats.fetch_failed += 1;
                warn!(symbol = %symbol, error = %e, "ETF 데이터 조회 실패, 다음 사이클에 재시도");
            }
            Err(SymbolFailure::Store(e)) => {
                stats.errors += 1;
                error!(symbol = %symbol, error = %e, "ETF 데이터 처리 실패");
            }
        }
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}

/// 레지스트리에 등록된 단일 ETF를 순서와 무관하게 즉시 갱신합니다.
///
/// 반환값은 저장된 구성종목 수.
pub async fn update_single<S>(store: &EtfStore, source: &S, symbol: &str) -> Result<usize>
where
    S: EtfDataSource + ?Sized,
{
    if store.get_registry(symbol).await?.is_none() {
        return Err(CollectorError::DataSource(DataError::NotFound(format!(
            "등록되지 않은 ETF: {}",
            symbol
        ))));
    }

    match update_symbol(store, source, symbol).await {
        Ok(holdings) => {
            info!(symbol = symbol, holdings, "ETF 데이터 갱신 완료");
            Ok(holdings)
        }
        Err(SymbolFailure::Fetch(e)) | Err(SymbolFailure::Store(e)) => Err(e.into()),
    }
}

/// 단일 심볼 처리: 동시 조회 → CAGR 계산 → 저장 → 갱신 시각 기록.
async fn update_symbol<S>(
    store: &EtfStore,
    source: &S,
    symbol: &str,
) -> std::result::Result<usize, SymbolFailure>
where
    S: EtfDataSource + ?Sized,
{
    let (profile, series) = tokio::join!(
        source.fetch_profile(symbol),
        source.fetch_monthly_series(symbol)
    );

    let (profile, series) = match (profile, series) {
        (Ok(profile), Ok(series)) => (profile, series),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => return Err(SymbolFailure::Fetch(e)),
        (Err(profile_err), Err(series_err)) => {
            debug!(symbol = symbol, error = %series_err, "월간 시계열 조회도 실패");
            return Err(SymbolFailure::Fetch(profile_err));
        }
    };

    let cagrs = calculate_cagrs(&series);

    debug!(
        symbol = symbol,
        months = series.len(),
        cagr_1yr = cagrs.one_year,
        cagr_3yr = cagrs.three_year,
        cagr_5yr = cagrs.five_year,
        "CAGR 계산 완료"
    );

    let holdings = store
        .store_etf_data(symbol, &profile, &cagrs)
        .await
        .map_err(SymbolFailure::Store)?;

    store
        .mark_updated(symbol, Utc::now())
        .await
        .map_err(SymbolFailure::Store)?;

    Ok(holdings)
}
