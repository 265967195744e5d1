//! The poll-fetch-write loop.
//!
//! Each cycle reads the sentinel cell. If its value differs from the last
//! one observed, the populated listing cells are snapshotted and every row
//! is fetched from the catalog and written back. Row failures are written
//! inline and never abort the batch; cycle failures are reported in the
//! status cell and only end the loop after too many in a row.

use std::thread;
use std::time::Duration;

use crate::address::{CellRef, Range};
use crate::catalog::CatalogSource;
use crate::config::{SyncConfig, ERROR_PREFIX, STATUS_REFRESHING, STATUS_WAITING};
use crate::error::{Result, SyncError};
use crate::models::{Cell, FetchMode, ListingId};
use crate::sheets::{SheetGateway, Worksheet};

// ---------------------------------------------------------------------------
// State and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Waiting for the sentinel to change.
    Idle,
    /// Working through a batch of rows.
    Refreshing,
    /// Gave up after too many consecutive cycle failures.
    Failed,
}

/// What the loop carries from one cycle to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollState {
    /// Sentinel value seen at the last refresh (or at priming).
    pub last_sentinel: Option<String>,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub row: u32,
    pub listing: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub rows_written: usize,
    pub row_errors: Vec<RowError>,
}

impl BatchReport {
    pub fn rows_attempted(&self) -> usize {
        self.rows_written + self.row_errors.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Sentinel unchanged; nothing fetched.
    Waiting,
    Refreshed(BatchReport),
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

struct Layout {
    sentinel: CellRef,
    listings: Range,
}

/// Drives the sheet from a [`Worksheet`] and a [`CatalogSource`].
pub struct Poller<W, C> {
    gateway: SheetGateway<W>,
    catalog: C,
    layout: Layout,
    mode: FetchMode,
    row_delay: Duration,
    poll_delay: Duration,
    max_consecutive_failures: u32,
    state: PollState,
    loop_state: LoopState,
}

impl<W: Worksheet, C: CatalogSource> Poller<W, C> {
    /// Build a poller using the cell layout, pacing and failure policy in `config`.
    pub fn new(worksheet: W, catalog: C, config: &SyncConfig) -> Result<Self> {
        let status = CellRef::from_a1(&config.status_cell)?;
        let layout = Layout {
            sentinel: CellRef::from_a1(&config.sentinel_cell)?,
            listings: Range::from_a1(&config.listing_range)?,
        };
        Ok(Self {
            gateway: SheetGateway::new(worksheet, status),
            catalog,
            layout,
            mode: config.fetch_mode,
            row_delay: config.row_delay,
            poll_delay: config.poll_delay,
            max_consecutive_failures: config.max_consecutive_failures,
            state: PollState::default(),
            loop_state: LoopState::Idle,
        })
    }

    pub fn gateway(&self) -> &SheetGateway<W> {
        &self.gateway
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn poll_state(&self) -> &PollState {
        &self.state
    }

    pub fn state(&self) -> LoopState {
        self.loop_state
    }

    /// Pause between poll cycles.
    pub fn poll_delay(&self) -> Duration {
        self.poll_delay
    }

    /// Record the current sentinel value as the baseline without refreshing.
    ///
    /// Without priming, the first cycle always refreshes.
    pub fn prime(&mut self) -> Result<()> {
        let current = self.gateway.worksheet().read_cell(self.layout.sentinel)?;
        log::info!("Sentinel baseline is {:?}", current);
        self.state.last_sentinel = Some(current);
        Ok(())
    }

    /// Run one poll cycle. Errors here are cycle-level: sentinel or listing reads.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let current = self.gateway.worksheet().read_cell(self.layout.sentinel)?;
        if self.state.last_sentinel.as_deref() == Some(current.as_str()) {
            self.report_status(STATUS_WAITING);
            return Ok(CycleOutcome::Waiting);
        }

        log::info!(
            "Sentinel changed from {:?} to {:?}; refreshing",
            self.state.last_sentinel,
            current
        );
        self.loop_state = LoopState::Refreshing;
        self.report_status(STATUS_REFRESHING);

        let listings = match self.gateway.populated_cells(&self.layout.listings) {
            Ok(cells) => cells,
            Err(e) => {
                self.loop_state = LoopState::Idle;
                return Err(e);
            }
        };
        self.state.last_sentinel = Some(current);

        let report = self.refresh_rows(&listings);
        log::info!(
            "Refresh finished: {} rows written, {} errors",
            report.rows_written,
            report.row_errors.len()
        );

        self.loop_state = LoopState::Idle;
        self.report_status(STATUS_WAITING);
        Ok(CycleOutcome::Refreshed(report))
    }

    /// Run one cycle and apply the failure policy.
    ///
    /// A cycle error is reported in the status cell and counted; `Ok(None)` is
    /// returned until the count reaches the configured limit, at which point
    /// the loop moves to [`LoopState::Failed`] and
    /// [`SyncError::TooManyFailures`] is returned.
    pub fn step(&mut self) -> Result<Option<CycleOutcome>> {
        match self.run_cycle() {
            Ok(outcome) => {
                self.state.consecutive_failures = 0;
                Ok(Some(outcome))
            }
            Err(e) => {
                self.state.consecutive_failures += 1;
                log::error!(
                    "Poll cycle failed ({} in a row): {}",
                    self.state.consecutive_failures,
                    e
                );
                self.report_status(&format!("{}{}", ERROR_PREFIX, e));

                let max = self.max_consecutive_failures;
                if max > 0 && self.state.consecutive_failures >= max {
                    self.loop_state = LoopState::Failed;
                    return Err(SyncError::TooManyFailures {
                        failures: self.state.consecutive_failures,
                        last: e.to_string(),
                    });
                }
                Ok(None)
            }
        }
    }

    /// Poll forever, sleeping the poll delay after every cycle.
    ///
    /// Only returns when the consecutive failure limit is reached.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.step()?;
            pause(self.poll_delay);
        }
    }

    fn refresh_rows(&mut self, listings: &[Cell]) -> BatchReport {
        let total = listings.len();
        let mut report = BatchReport::default();

        for (i, cell) in listings.iter().enumerate() {
            self.report_status(&format!("{} ({}/{})", STATUS_REFRESHING, i + 1, total));

            let row = cell.row();
            match self.sync_row(cell) {
                Ok(()) => report.rows_written += 1,
                Err(e) => {
                    let message = e.to_string();
                    log::warn!("Row {} ({}) failed: {}", row, cell.text(), message);
                    if let Err(write_err) = self.gateway.write_error(row, &message) {
                        log::warn!("Could not mark row {} as failed: {}", row, write_err);
                    }
                    report.row_errors.push(RowError {
                        row,
                        listing: cell.text(),
                        message,
                    });
                }
            }

            pause(self.row_delay);
        }

        report
    }

    fn sync_row(&self, cell: &Cell) -> Result<()> {
        let id = ListingId::new(&cell.text()).ok_or_else(|| {
            SyncError::Payload(format!("row {} has no listing id", cell.row()))
        })?;
        let listing = self.catalog.fetch(&id)?;
        self.gateway.write_row(cell.row(), &listing, self.mode)
    }

    /// Status writes are informational; a failure is logged and ignored.
    fn report_status(&self, text: &str) {
        if let Err(e) = self.gateway.write_status(text) {
            log::warn!("Could not write status {:?}: {}", text, e);
        }
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
