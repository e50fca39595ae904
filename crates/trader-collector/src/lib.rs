//! 일봉 시세 수집기.
//!
//! 관심종목의 일봉을 한국투자증권(KIS) Open API에서 받아 저장합니다:
//! - 일일 수집: 백필이 끝난 종목의 당일 시세
//! - 백필: 신규 종목의 과거 전체 시세 (커서 기반 페이지네이션)
//!
//! 두 작업 모두 작업 이름 단위 분산 잠금으로 보호됩니다.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod lock;
pub mod persist;
pub mod runner;
pub mod scheduler;
pub mod stats;
pub mod strategy;

pub use config::CollectorConfig;
pub use context::CollectorContext;
pub use engine::{BackfillEngine, BackfillProgress, PageSink, PageSource};
pub use error::{CollectorError, DispatchError, FailureKind, Result};
pub use lock::{run_locked, JobRun, LocalRunLockProvider, LockedJobs};
pub use persist::DedupSink;
pub use runner::{BatchRunner, JobKind};
pub use stats::BatchOutcome;
pub use strategy::{DailyPriceStrategy, PriceStrategy, StrategyRegistry};
