//! Scheduled ETF fundamentals collector CLI.

use clap::{Parser, Subcommand};
use etf_collector::{modules, CollectorConfig};
use etf_data::AlphaVantageClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "etf-collector")]
#[command(about = "ETF Fundamentals Collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 업데이트 사이클 1회 실행 (스케줄러 트리거용)
    RunOnce,

    /// 데몬 모드: 주기적으로 업데이트 사이클 실행
    Daemon,

    /// 등록된 단일 ETF 즉시 갱신
    Update {
        /// ETF 심볼 (예: "SPY")
        #[arg(long)]
        symbol: String,
    },

    /// ETF 레지스트리 갱신 상태 조회
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "etf_collector={level},etf_data={level}",
                    level = cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("ETF Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env()?;
    tracing::debug!(database_url = %config.database.url, "설정 로드 완료");

    // 명령 실행
    match cli.command {
        Commands::RunOnce => {
            let stats = modules::run_scheduled_cycle(&config).await;
            stats.log_summary("ETF 업데이트");
        }
        Commands::Daemon => {
            tracing::info!(
                "=== 데몬 모드 시작 (주기: {}분) ===",
                config.daemon.interval_minutes
            );

            let mut interval = tokio::time::interval(config.daemon.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("종료 신호 수신, 데몬 종료 중...");
                        break;
                    }
                    _ = interval.tick() => {
                        let stats = modules::run_scheduled_cycle(&config).await;
                        stats.log_summary("ETF 업데이트");

                        tracing::info!(
                            "=== 사이클 완료, 다음 실행: {}분 후 ===",
                            config.daemon.interval_minutes
                        );
                    }
                }
            }
        }
        Commands::Update { symbol } => {
            let client_config = config.alpha_vantage.client_config().ok_or(
                "ALPHA_VANTAGE_API_KEY 환경변수가 설정되지 않았습니다",
            )?;
            let client = AlphaVantageClient::with_config(client_config)?;

            let store = modules::open_store(&config).await?;
            tracing::info!("데이터베이스 연결 성공");

            let result = modules::update_single(&store, &client, &symbol).await;
            store.pool().close().await;

            let holdings = result?;
            tracing::info!(symbol = %symbol, holdings, "단건 갱신 완료");
        }
        Commands::Status => {
            let store = modules::open_store(&config).await?;
            let registry = store.list_registry().await;
            store.pool().close().await;

            let registry = registry?;
            println!("{:<10} {}", "SYMBOL", "LAST_UPDATED");
            for record in &registry {
                let last_updated = record
                    .last_updated_at()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<10} {}", record.symbol, last_updated);
            }
            tracing::info!(count = registry.len(), "레지스트리 조회 완료");
        }
    }

    tracing::info!("ETF Collector 종료");

    Ok(())
}
