//! 데이터 수집 모듈.

pub mod etf_update;

pub use etf_update::{open_store, run_scheduled_cycle, run_update_cycle, update_batch, update_single};
