//! Spreadsheet access.
//!
//! [`Worksheet`] is the storage seam: three primitive operations over a
//! single worksheet. [`GoogleWorksheet`] implements it against the Google
//! Sheets v4 REST API; [`SheetGateway`] layers the collection-specific
//! reads and writes (record rows, status cell, inline errors) on top of any
//! implementation.

use reqwest::blocking::{Client, Response};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::address::{CellRef, Range};
use crate::auth::TokenProvider;
use crate::config::{SyncConfig, ERROR_PREFIX};
use crate::error::{Result, SyncError};
use crate::models::{CardListing, Cell, CellValue, FetchMode};

/// Column that receives a row's inline error (the first column after the listing id).
const ERROR_COLUMN: u32 = 2;

/// How the spreadsheet interprets written values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueInput {
    /// Stored exactly as sent; text starting with `=` or `+` stays text.
    Raw,
    /// Parsed as if typed into the UI (formulas, dates, numbers).
    UserEntered,
}

impl ValueInput {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueInput::Raw => "RAW",
            ValueInput::UserEntered => "USER_ENTERED",
        }
    }
}

/// A single worksheet addressed by A1 cells and ranges.
///
/// No transactional guarantee is offered across calls: a human may edit the
/// sheet between a read and a later write.
pub trait Worksheet {
    /// Every cell of `range` in row-major order; cells past the end of the
    /// stored data come back empty.
    fn read_range(&self, range: &Range) -> Result<Vec<Cell>>;

    /// Write all `cells` in one batched call, interpreted per `input`.
    fn update_cells(&self, cells: &[Cell], input: ValueInput) -> Result<()>;

    /// Current text of a single cell (empty if unset).
    fn read_cell(&self, at: CellRef) -> Result<String> {
        let cells = self.read_range(&Range::from(at))?;
        Ok(cells.first().map(Cell::text).unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// SheetGateway
// ---------------------------------------------------------------------------

/// Collection-sheet operations over a [`Worksheet`].
pub struct SheetGateway<W> {
    worksheet: W,
    status_cell: CellRef,
}

impl<W: Worksheet> SheetGateway<W> {
    pub fn new(worksheet: W, status_cell: CellRef) -> Self {
        Self {
            worksheet,
            status_cell,
        }
    }

    pub fn worksheet(&self) -> &W {
        &self.worksheet
    }

    pub fn into_inner(self) -> W {
        self.worksheet
    }

    /// Text of the cell at an A1 label such as `"A1"`.
    pub fn read_cell(&self, label: &str) -> Result<String> {
        self.worksheet.read_cell(CellRef::from_a1(label)?)
    }

    /// All cells of an A1 range such as `"A3:A1000"`.
    pub fn read_range(&self, label: &str) -> Result<Vec<Cell>> {
        self.worksheet.read_range(&Range::from_a1(label)?)
    }

    /// Cells of `range` holding a non-blank value, in sheet order.
    pub fn populated_cells(&self, range: &Range) -> Result<Vec<Cell>> {
        let cells = self.worksheet.read_range(range)?;
        Ok(cells.into_iter().filter(|c| !c.is_empty()).collect())
    }

    /// Write `listing` across `A{row}` onwards, one field per column, in one call.
    pub fn write_row(&self, row: u32, listing: &CardListing, mode: FetchMode) -> Result<()> {
        let values = listing.to_cells(mode);
        let span = Range::row_span(row, 1, values.len() as u32);
        let cells: Vec<Cell> = span
            .cells()
            .zip(values)
            .map(|(at, value)| Cell { at, value })
            .collect();
        self.worksheet.update_cells(&cells, ValueInput::Raw)
    }

    pub fn write_status(&self, text: &str) -> Result<()> {
        self.worksheet
            .update_cells(&[Cell::new(self.status_cell, text)], ValueInput::UserEntered)
    }

    /// Replace the row's first data cell with `ERROR: <message>`.
    pub fn write_error(&self, row: u32, message: &str) -> Result<()> {
        let at = CellRef::new(row, ERROR_COLUMN);
        self.worksheet
            .update_cells(
                &[Cell::new(at, format!("{}{}", ERROR_PREFIX, message))],
                ValueInput::Raw,
            )
    }
}

// ---------------------------------------------------------------------------
// GoogleWorksheet
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
    #[serde(default)]
    index: usize,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// One worksheet of a Google spreadsheet, accessed over the Sheets v4 API.
pub struct GoogleWorksheet {
    client: Client,
    tokens: TokenProvider,
    sheets_base: Url,
    spreadsheet_id: String,
    title: String,
}

impl GoogleWorksheet {
    /// Resolve the spreadsheet named in `config` and open its configured worksheet.
    pub fn connect(config: &SyncConfig, tokens: TokenProvider, client: Client) -> Result<Self> {
        let drive_base = parse_base(&config.drive_api_base)?;
        let spreadsheet_id = find_spreadsheet(&client, &tokens, &drive_base, &config.document_name)?;
        Self::open(
            client,
            tokens,
            &config.sheets_api_base,
            &spreadsheet_id,
            config.worksheet_index,
        )
    }

    /// Open the worksheet at `index` (0 = first tab) of a known spreadsheet id.
    pub fn open(
        client: Client,
        tokens: TokenProvider,
        sheets_base: &str,
        spreadsheet_id: &str,
        index: usize,
    ) -> Result<Self> {
        let sheets_base = parse_base(sheets_base)?;
        let mut url = sheets_base.clone();
        push_segments(&mut url, &["spreadsheets", spreadsheet_id]);
        url.query_pairs_mut().append_pair("fields", "sheets.properties");

        log::debug!("GET {}", url);
        let resp = client.get(url).bearer_auth(tokens.access_token()?).send()?;
        let meta: SpreadsheetMeta = check(resp, &tokens)?.json()?;

        let mut sheets: Vec<SheetProperties> =
            meta.sheets.into_iter().map(|s| s.properties).collect();
        sheets.sort_by_key(|p| p.index);
        let title = sheets
            .into_iter()
            .nth(index)
            .map(|p| p.title)
            .ok_or_else(|| {
                SyncError::NotFound(format!(
                    "spreadsheet {} has no worksheet at index {}",
                    spreadsheet_id, index
                ))
            })?;

        log::info!("Opened worksheet {:?} of spreadsheet {}", title, spreadsheet_id);
        Ok(Self {
            client,
            tokens,
            sheets_base,
            spreadsheet_id: spreadsheet_id.to_string(),
            title,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// `'Sheet Title'!A1:B2`, with embedded quotes doubled.
    pub fn qualified(&self, range: &Range) -> String {
        format!("'{}'!{}", self.title.replace('\'', "''"), range)
    }

    fn values_url(&self, tail: &str) -> Url {
        let mut url = self.sheets_base.clone();
        push_segments(&mut url, &["spreadsheets", self.spreadsheet_id.as_str(), tail]);
        url
    }
}

impl Worksheet for GoogleWorksheet {
    fn read_range(&self, range: &Range) -> Result<Vec<Cell>> {
        let mut url = self.values_url("values");
        push_segments(&mut url, &[self.qualified(range).as_str()]);
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "FORMATTED_VALUE");

        log::debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .bearer_auth(self.tokens.access_token()?)
            .send()?;
        let data: ValueRange = check(resp, &self.tokens)?.json()?;

        let cells = range
            .cells()
            .map(|at| {
                let r = (at.row - range.start.row) as usize;
                let c = (at.col - range.start.col) as usize;
                let value = data
                    .values
                    .get(r)
                    .and_then(|row| row.get(c))
                    .map(cell_value_from_json)
                    .unwrap_or_default();
                Cell { at, value }
            })
            .collect();
        Ok(cells)
    }

    fn update_cells(&self, cells: &[Cell], input: ValueInput) -> Result<()> {
        if cells.is_empty() {
            return Ok(());
        }

        let data: Vec<Value> = row_segments(cells)
            .into_iter()
            .map(|segment| {
                let first = segment[0].at;
                let last = segment[segment.len() - 1].at;
                let values: Vec<Value> = segment.iter().map(|c| c.value.to_json()).collect();
                json!({
                    "range": self.qualified(&Range::new(first, last)),
                    "majorDimension": "ROWS",
                    "values": [values],
                })
            })
            .collect();

        let body = json!({
            "valueInputOption": input.as_str(),
            "data": data,
        });

        let url = self.values_url("values:batchUpdate");
        log::debug!("POST {} ({} cells)", url, cells.len());
        let resp = self
            .client
            .post(url)
            .bearer_auth(self.tokens.access_token()?)
            .json(&body)
            .send()?;
        check(resp, &self.tokens)?;
        Ok(())
    }
}

/// Look up a spreadsheet id by exact title through the Drive files list.
fn find_spreadsheet(
    client: &Client,
    tokens: &TokenProvider,
    drive_base: &Url,
    name: &str,
) -> Result<String> {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    let query = format!(
        "name = '{}' and mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false",
        escaped
    );

    let mut url = drive_base.clone();
    push_segments(&mut url, &["files"]);
    url.query_pairs_mut()
        .append_pair("q", &query)
        .append_pair("fields", "files(id,name)")
        .append_pair("supportsAllDrives", "true")
        .append_pair("includeItemsFromAllDrives", "true");

    log::debug!("GET {}", url);
    let resp = client.get(url).bearer_auth(tokens.access_token()?).send()?;
    let list: DriveFileList = check(resp, tokens)?.json()?;

    list.files
        .into_iter()
        .next()
        .map(|f| f.id)
        .ok_or_else(|| {
            SyncError::NotFound(format!(
                "no spreadsheet named {:?} is shared with {}",
                name,
                tokens.client_email()
            ))
        })
}

/// Split cells into runs that share a row and have consecutive columns.
fn row_segments(cells: &[Cell]) -> Vec<Vec<&Cell>> {
    let mut sorted: Vec<&Cell> = cells.iter().collect();
    sorted.sort_by_key(|c| c.at);

    let mut segments: Vec<Vec<&Cell>> = Vec::new();
    for cell in sorted {
        let continues = segments.last().map_or(false, |seg| {
            let prev = seg[seg.len() - 1].at;
            prev.row == cell.at.row && prev.col + 1 == cell.at.col
        });
        match segments.last_mut() {
            Some(seg) if continues => seg.push(cell),
            _ => segments.push(vec![cell]),
        }
    }
    segments
}

fn cell_value_from_json(v: &Value) -> CellValue {
    match v {
        Value::Null => CellValue::Empty,
        Value::String(s) => CellValue::from(s.as_str()),
        Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
        other => CellValue::Text(other.to_string()),
    }
}

/// Turn a non-2xx response into a [`SyncError::Sheets`] carrying the API's message.
///
/// A 401 drops the cached token so the next call signs in again.
fn check(resp: Response, tokens: &TokenProvider) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED {
        log::warn!("Access token rejected; discarding it");
        tokens.invalidate();
    }
    let body = resp.text().unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(body);
    Err(SyncError::Sheets(format!("{}: {}", status, message.trim())))
}

fn parse_base(base: &str) -> Result<Url> {
    let url = Url::parse(base)
        .map_err(|e| SyncError::Config(format!("invalid API base {:?}: {}", base, e)))?;
    if url.cannot_be_a_base() {
        return Err(SyncError::Config(format!("API base {} cannot carry a path", url)));
    }
    Ok(url)
}

fn push_segments(url: &mut Url, segments: &[&str]) {
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
}

