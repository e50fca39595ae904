//! 커서 기반 일봉 수집/백필 엔진.
//!
//! 증권사는 종료일 기준으로 최대 `page_size`개의 행을 돌려주며 정렬을
//! 보장하지 않습니다. 백필은 페이지의 가장 오래된 날짜 하루 전을 다음
//! 종료일로 삼아 과거로 걸어갑니다.
//!
//! 종료 조건:
//! - 빈 페이지
//! - `page_size`보다 짧은 페이지 (더 이상 과거 데이터 없음)
//! - 다음 종료일이 시작일보다 앞섬

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use tracing::debug;

use crate::Result;

/// 페이지 단위 조회 기능.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Row: Send + Sync;

    /// `[start, end]` 구간 한 페이지 조회. 에러는 그대로 전달됩니다.
    async fn fetch_page(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Self::Row>>;

    /// 행의 영업일.
    fn row_date(&self, row: &Self::Row) -> NaiveDate;
}

/// 페이지 저장 기능. 저장된 행 수를 반환합니다.
#[async_trait]
pub trait PageSink<R: Send + Sync>: Send {
    async fn persist(&mut self, page: &[R]) -> Result<usize>;
}

/// 백필 진행 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillProgress {
    /// 조회한 페이지 수
    pub pages: usize,
    /// 저장된 행 수
    pub saved: usize,
}

/// 모든 자산 유형이 공유하는 페이지네이션 엔진.
#[derive(Debug, Clone, Copy)]
pub struct BackfillEngine {
    page_size: usize,
}

impl BackfillEngine {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// `[start, end]` 한 페이지만 조회해 저장합니다.
    pub async fn collect<S, K>(
        &self,
        source: &S,
        sink: &mut K,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<usize>
    where
        S: PageSource,
        K: PageSink<S::Row>,
    {
        let page = source.fetch_page(start, end).await?;
        if page.is_empty() {
            return Ok(0);
        }
        sink.persist(&page).await
    }

    /// `end`부터 `start`까지 과거로 페이지를 넘기며 저장합니다.
    pub async fn backfill<S, K>(
        &self,
        source: &S,
        sink: &mut K,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BackfillProgress>
    where
        S: PageSource,
        K: PageSink<S::Row>,
    {
        let mut progress = BackfillProgress::default();
        let mut cursor_end = end;

        loop {
            let page = source.fetch_page(start, cursor_end).await?;
            progress.pages += 1;

            if page.is_empty() {
                break;
            }

            progress.saved += sink.persist(&page).await?;

            if page.len() < self.page_size {
                break;
            }

            let Some(next_end) = next_cursor(source, &page) else {
                break;
            };
            debug!(%cursor_end, %next_end, rows = page.len(), "Advancing backfill cursor");

            // 증권사가 같은 구간을 반복해서 돌려주면 진행하지 않음
            if next_end >= cursor_end {
                break;
            }
            cursor_end = next_end;

            if cursor_end < start {
                break;
            }
        }

        Ok(progress)
    }
}

/// 페이지의 가장 오래된 날짜 하루 전.
fn next_cursor<S: PageSource>(source: &S, page: &[S::Row]) -> Option<NaiveDate> {
    page.iter()
        .map(|row| source.row_date(row))
        .min()?
        .checked_sub_days(Days::new(1))
}
