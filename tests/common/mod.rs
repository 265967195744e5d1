//! Shared fixtures for the integration tests.
//!
//! Provides an in-memory [`Worksheet`] that records every batched write, a
//! scripted [`CatalogSource`], and helpers for service-account key files.

#![allow(dead_code)]

use std::cell::{Cell as StdCell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::io::{Error as IoError, ErrorKind};
use std::time::Duration;

use card_sheet_sync::{
    CardListing, CatalogSource, Cell, CellRef, CellValue, ListingId, Range, Result, SyncConfig,
    SyncError, ValueInput, Worksheet,
};

pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/service_account_key.pem");

// ---------------------------------------------------------------------------
// MemoryWorksheet
// ---------------------------------------------------------------------------

/// A worksheet backed by a map, logging every `update_cells` call.
#[derive(Default)]
pub struct MemoryWorksheet {
    cells: RefCell<BTreeMap<CellRef, CellValue>>,
    writes: RefCell<Vec<Vec<Cell>>>,
    inputs: RefCell<Vec<ValueInput>>,
    reads: StdCell<usize>,
    fail_reads: RefCell<Option<String>>,
    fail_range_reads: RefCell<Option<String>>,
    fail_writes_to: RefCell<Option<CellRef>>,
}

impl MemoryWorksheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cell by A1 label without recording a write.
    pub fn set(&self, label: &str, value: &str) {
        let at = CellRef::from_a1(label).unwrap();
        self.cells.borrow_mut().insert(at, CellValue::from(value));
    }

    pub fn get(&self, label: &str) -> String {
        let at = CellRef::from_a1(label).unwrap();
        self.cells
            .borrow()
            .get(&at)
            .map(CellValue::to_text)
            .unwrap_or_default()
    }

    pub fn value(&self, label: &str) -> CellValue {
        let at = CellRef::from_a1(label).unwrap();
        self.cells.borrow().get(&at).cloned().unwrap_or_default()
    }

    /// Every batched write, in order.
    pub fn writes(&self) -> Vec<Vec<Cell>> {
        self.writes.borrow().clone()
    }

    /// Value input option of every batched write, in order.
    pub fn inputs(&self) -> Vec<ValueInput> {
        self.inputs.borrow().clone()
    }

    /// Batched writes that do not touch `status` (i.e. row and error writes).
    pub fn writes_excluding(&self, status: &str) -> Vec<Vec<Cell>> {
        let status = CellRef::from_a1(status).unwrap();
        self.writes()
            .into_iter()
            .filter(|w| !w.iter().any(|c| c.at == status))
            .collect()
    }

    /// Values written to `label`, in order.
    pub fn history(&self, label: &str) -> Vec<String> {
        let at = CellRef::from_a1(label).unwrap();
        self.writes
            .borrow()
            .iter()
            .flatten()
            .filter(|c| c.at == at)
            .map(Cell::text)
            .collect()
    }

    pub fn read_count(&self) -> usize {
        self.reads.get()
    }

    /// Make every subsequent read fail with `message`.
    pub fn fail_reads(&self, message: &str) {
        *self.fail_reads.borrow_mut() = Some(message.to_string());
    }

    /// Make reads of multi-cell ranges fail while single cells still succeed.
    pub fn fail_range_reads(&self, message: &str) {
        *self.fail_range_reads.borrow_mut() = Some(message.to_string());
    }

    pub fn heal_reads(&self) {
        self.fail_reads.borrow_mut().take();
        self.fail_range_reads.borrow_mut().take();
    }

    /// Make writes that include `label` fail.
    pub fn fail_writes_to(&self, label: &str) {
        *self.fail_writes_to.borrow_mut() = Some(CellRef::from_a1(label).unwrap());
    }
}

impl Worksheet for MemoryWorksheet {
    fn read_range(&self, range: &Range) -> Result<Vec<Cell>> {
        self.reads.set(self.reads.get() + 1);
        if let Some(message) = self.fail_reads.borrow().as_ref() {
            return Err(SyncError::Sheets(message.clone()));
        }
        if !range.is_single_cell() {
            if let Some(message) = self.fail_range_reads.borrow().as_ref() {
                return Err(SyncError::Sheets(message.clone()));
            }
        }
        let cells = self.cells.borrow();
        Ok(range
            .cells()
            .map(|at| Cell {
                at,
                value: cells.get(&at).cloned().unwrap_or_default(),
            })
            .collect())
    }

    fn update_cells(&self, cells: &[Cell], input: ValueInput) -> Result<()> {
        if let Some(blocked) = *self.fail_writes_to.borrow() {
            if cells.iter().any(|c| c.at == blocked) {
                return Err(SyncError::Sheets(format!("write to {} rejected", blocked)));
            }
        }
        let mut store = self.cells.borrow_mut();
        for cell in cells {
            store.insert(cell.at, cell.value.clone());
        }
        self.writes.borrow_mut().push(cells.to_vec());
        self.inputs.borrow_mut().push(input);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedCatalog
// ---------------------------------------------------------------------------

pub enum Scripted {
    Listing(CardListing),
    ConnectionError,
}

/// A catalog that answers from a fixed script and records every lookup.
#[derive(Default)]
pub struct ScriptedCatalog {
    answers: HashMap<String, Scripted>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_card(mut self, id: &str, name: &str, price: f64) -> Self {
        let mut listing = CardListing::new(ListingId::new(id).unwrap());
        listing.name = Some(name.to_string());
        listing.color = Some(vec!["Red".to_string()]);
        listing.cmc = Some(1.0);
        listing.type_field = Some("Instant".to_string());
        listing.price = Some(price);
        listing.foil_price = Some(price * 2.0);
        self.answers.insert(id.to_string(), Scripted::Listing(listing));
        self
    }

    pub fn with_connection_error(mut self, id: &str) -> Self {
        self.answers.insert(id.to_string(), Scripted::ConnectionError);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl CatalogSource for ScriptedCatalog {
    fn fetch(&self, id: &ListingId) -> Result<CardListing> {
        self.calls.borrow_mut().push(id.to_string());
        match self.answers.get(id.as_str()) {
            Some(Scripted::Listing(listing)) => Ok(listing.clone()),
            Some(Scripted::ConnectionError) => Err(SyncError::Io(IoError::new(
                ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
            None => Err(SyncError::NotFound(format!("listing {}", id))),
        }
    }
}

// ---------------------------------------------------------------------------
// Config and credentials
// ---------------------------------------------------------------------------

/// Default layout with no pacing, so loops run instantly.
pub fn test_config() -> SyncConfig {
    SyncConfig {
        row_delay: Duration::ZERO,
        poll_delay: Duration::ZERO,
        ..SyncConfig::default()
    }
}

pub fn service_account_json(token_uri: &str) -> String {
    serde_json::json!({
        "type": "service_account",
        "project_id": "card-sheet-test",
        "private_key_id": "test-key-1",
        "private_key": TEST_PRIVATE_KEY,
        "client_email": "sync@card-sheet-test.iam.gserviceaccount.com",
        "client_id": "1234567890",
        "token_uri": token_uri,
    })
    .to_string()
}
