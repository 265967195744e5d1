use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::FetchMode;

pub const CATALOG_API_BASE: &str = "https://mpapi.tcgplayer.com";
pub const PRODUCT_URL_BASE: &str = "https://www.tcgplayer.com/product";

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

pub const SHEETS_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.readonly",
];

/// Cell whose value change requests a refresh.
pub const SENTINEL_CELL: &str = "A1";
/// Column of user-entered listing ids.
pub const LISTING_ID_RANGE: &str = "A3:A1000";
pub const STATUS_CELL: &str = "J1";

pub const STATUS_WAITING: &str = "Waiting...";
pub const STATUS_REFRESHING: &str = "Refreshing...";
pub const ERROR_PREFIX: &str = "ERROR: ";

pub const DEFAULT_CREDENTIALS_FILE: &str = "creds.json";
pub const DEFAULT_DOCUMENT_NAME: &str = "MTG Card Collection";

pub const DEFAULT_ROW_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Runtime settings for the sync daemon.
///
/// Defaults match the layout of the collection sheet; [`SyncConfig::from_env`]
/// overlays any `CARD_SHEET_*` variables that are set.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub credentials_path: PathBuf,
    pub document_name: String,
    pub worksheet_index: usize,
    pub fetch_mode: FetchMode,
    pub sentinel_cell: String,
    pub listing_range: String,
    pub status_cell: String,
    pub row_delay: Duration,
    pub poll_delay: Duration,
    /// Consecutive failed cycles tolerated before the loop gives up. `0` never gives up.
    pub max_consecutive_failures: u32,
    pub catalog_api_base: String,
    /// Fixed query parameters appended to every catalog request.
    pub catalog_query: Vec<(String, String)>,
    pub sheets_api_base: String,
    pub drive_api_base: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            document_name: DEFAULT_DOCUMENT_NAME.to_string(),
            worksheet_index: 0,
            fetch_mode: FetchMode::default(),
            sentinel_cell: SENTINEL_CELL.to_string(),
            listing_range: LISTING_ID_RANGE.to_string(),
            status_cell: STATUS_CELL.to_string(),
            row_delay: DEFAULT_ROW_DELAY,
            poll_delay: DEFAULT_POLL_DELAY,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            catalog_api_base: CATALOG_API_BASE.to_string(),
            catalog_query: Vec::new(),
            sheets_api_base: SHEETS_API_BASE.to_string(),
            drive_api_base: DRIVE_API_BASE.to_string(),
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.update_from_env();
        config
    }

    fn update_from_env(&mut self) {
        if let Ok(path) = env::var("CARD_SHEET_CREDENTIALS") {
            if !path.is_empty() {
                self.credentials_path = PathBuf::from(path);
            }
        }
        if let Ok(name) = env::var("CARD_SHEET_DOCUMENT") {
            if !name.is_empty() {
                self.document_name = name;
            }
        }
        if let Some(index) = parsed_var("CARD_SHEET_WORKSHEET") {
            self.worksheet_index = index;
        }
        if let Some(ms) = parsed_var::<u64>("CARD_SHEET_ROW_DELAY_MS") {
            self.row_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parsed_var::<u64>("CARD_SHEET_POLL_DELAY_MS") {
            self.poll_delay = Duration::from_millis(ms);
        }
        if let Some(max) = parsed_var("CARD_SHEET_MAX_FAILURES") {
            self.max_consecutive_failures = max;
        }
        if let Ok(raw) = env::var("CARD_SHEET_CATALOG_QUERY") {
            self.catalog_query = parse_query(&raw);
        }
        if let Ok(mode) = env::var("CARD_SHEET_MODE") {
            match mode.parse::<FetchMode>() {
                Ok(mode) => self.fetch_mode = mode,
                Err(e) => log::error!("Ignoring CARD_SHEET_MODE: {}", e),
            }
        }
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::error!("Ignoring {}: could not parse {:?}", name, raw);
            None
        }
    }
}

/// `key=value&key2=value2` pairs; entries without `=` are logged and skipped.
fn parse_query(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Some((key.trim().to_string(), value.trim().to_string()))
            }
            _ => {
                log::error!("Ignoring catalog query entry {:?}", pair);
                None
            }
        })
        .collect()
}

/// `creds.json` in the working directory if present, else the per-user config dir.
pub fn default_credentials_path() -> PathBuf {
    let local = PathBuf::from(DEFAULT_CREDENTIALS_FILE);
    if local.exists() {
        return local;
    }
    match dirs::config_dir() {
        Some(dir) => dir.join("card-sheet-sync").join(DEFAULT_CREDENTIALS_FILE),
        None => local,
    }
}
