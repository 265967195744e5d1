//! Keeps a Google Sheets card collection priced from the TCGplayer catalog.
//!
//! Users type TCGplayer listing ids into a column of the sheet and change a
//! sentinel cell to ask for a refresh. The poller notices the change, looks
//! every listing up in the catalog API, and writes name, colour, mana value,
//! type, market price (and foil price) back into the row, reporting progress
//! in a status cell.
//!
//! # Quick start
//!
//! ```no_run
//! use card_sheet_sync::{SheetSync, SyncConfig};
//!
//! let mut sync = SheetSync::builder()
//!     .config(SyncConfig::from_env())
//!     .build()
//!     .unwrap();
//!
//! sync.prime().unwrap();
//! sync.run().unwrap();
//! ```

#[cfg(feature = "async")]
pub mod async_client;
pub mod address;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod poller;
pub mod sheets;

pub use address::{CellRef, Range};
#[cfg(feature = "async")]
pub use async_client::AsyncPoller;
pub use auth::{ServiceAccountKey, TokenProvider};
pub use catalog::{CatalogClient, CatalogSource};
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use models::{CardListing, Cell, CellValue, FetchMode, ListingId};
pub use poller::{BatchReport, CycleOutcome, LoopState, PollState, Poller, RowError};
pub use sheets::{GoogleWorksheet, SheetGateway, ValueInput, Worksheet};

use std::fmt;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;

// ---------------------------------------------------------------------------
// SheetSyncBuilder
// ---------------------------------------------------------------------------

/// Builder for a [`SheetSync`] connected to a real spreadsheet.
///
/// Starts from [`SyncConfig::default()`]; individual settings can be
/// overridden before calling [`build()`](SheetSyncBuilder::build).
#[derive(Default)]
pub struct SheetSyncBuilder {
    config: SyncConfig,
    sheets_timeout: Option<Duration>,
    catalog_timeout: Option<Duration>,
}

impl SheetSyncBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Path to the service-account JSON key.
    pub fn credentials<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.credentials_path = path.as_ref().to_path_buf();
        self
    }

    /// Title of the spreadsheet to open.
    pub fn document(mut self, name: &str) -> Self {
        self.config.document_name = name.to_string();
        self
    }

    pub fn fetch_mode(mut self, mode: FetchMode) -> Self {
        self.config.fetch_mode = mode;
        self
    }

    /// Pause after each row; rate-limits the catalog API.
    pub fn row_delay(mut self, delay: Duration) -> Self {
        self.config.row_delay = delay;
        self
    }

    /// Pause after each poll cycle.
    pub fn poll_delay(mut self, delay: Duration) -> Self {
        self.config.poll_delay = delay;
        self
    }

    /// Consecutive failed cycles before [`SheetSync::run`] gives up (`0` = never).
    pub fn max_consecutive_failures(mut self, max: u32) -> Self {
        self.config.max_consecutive_failures = max;
        self
    }

    /// Append a fixed query parameter to every catalog request.
    pub fn catalog_query_param(mut self, key: &str, value: &str) -> Self {
        self.config
            .catalog_query
            .push((key.to_string(), value.to_string()));
        self
    }

    /// Timeout for Google API calls. Defaults to the HTTP library default.
    pub fn sheets_timeout(mut self, timeout: Duration) -> Self {
        self.sheets_timeout = Some(timeout);
        self
    }

    /// Timeout for catalog API calls. Defaults to the HTTP library default.
    pub fn catalog_timeout(mut self, timeout: Duration) -> Self {
        self.catalog_timeout = Some(timeout);
        self
    }

    /// Load credentials, authenticate, open the worksheet and build the poller.
    ///
    /// Fails if the credentials file is missing or invalid, or the named
    /// spreadsheet is not reachable by the service account.
    pub fn build(self) -> Result<SheetSync> {
        let config = self.config;
        let key = ServiceAccountKey::from_file(&config.credentials_path)?;

        let mut http = Client::builder();
        if let Some(timeout) = self.sheets_timeout {
            http = http.timeout(timeout);
        }
        let client = http.build()?;

        let tokens = TokenProvider::new(key, crate::config::SHEETS_SCOPES, client.clone())?;
        let worksheet = GoogleWorksheet::connect(&config, tokens, client)?;

        let mut catalog = match self.catalog_timeout {
            Some(timeout) => {
                CatalogClient::with_timeout(&config.catalog_api_base, config.fetch_mode, timeout)?
            }
            None => CatalogClient::new(&config.catalog_api_base, config.fetch_mode)?,
        };
        for (key, value) in &config.catalog_query {
            catalog = catalog.query_param(key, value);
        }

        let poller = Poller::new(worksheet, catalog, &config)?;
        Ok(SheetSync { poller, config })
    }
}

// ---------------------------------------------------------------------------
// SheetSync
// ---------------------------------------------------------------------------

/// A [`Poller`] wired to Google Sheets and the TCGplayer API.
pub struct SheetSync {
    poller: Poller<GoogleWorksheet, CatalogClient>,
    config: SyncConfig,
}

impl SheetSync {
    pub fn builder() -> SheetSyncBuilder {
        SheetSyncBuilder::default()
    }

    /// Take the current sentinel value as the baseline.
    pub fn prime(&mut self) -> Result<()> {
        self.poller.prime()
    }

    /// One poll cycle; see [`Poller::run_cycle`].
    pub fn run_cycle(&mut self) -> Result<CycleOutcome> {
        self.poller.run_cycle()
    }

    /// Poll until the consecutive failure limit is hit.
    pub fn run(&mut self) -> Result<()> {
        self.poller.run()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn poller(&self) -> &Poller<GoogleWorksheet, CatalogClient> {
        &self.poller
    }

    pub fn into_poller(self) -> Poller<GoogleWorksheet, CatalogClient> {
        self.poller
    }
}

impl fmt::Display for SheetSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sheet = self.poller.gateway().worksheet();
        write!(
            f,
            "SheetSync(document={:?}, worksheet={:?}, mode={}, state={:?})",
            self.config.document_name,
            sheet.title(),
            self.config.fetch_mode,
            self.poller.state()
        )
    }
}
