use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::PRODUCT_URL_BASE;
use crate::error::SyncError;
use crate::models::cell::CellValue;

// ---------------------------------------------------------------------------
// ListingId — User-entered catalog product identifier
// ---------------------------------------------------------------------------

/// The catalog identifier typed into the listing column.
///
/// Kept as the trimmed text the user entered; the catalog API is the only
/// judge of whether it names a real product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(String);

impl ListingId {
    /// Returns `None` for blank input.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Public product page for this listing.
    pub fn product_url(&self) -> String {
        format!("{}/{}", PRODUCT_URL_BASE, self.0)
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// FetchMode — Which catalog endpoints feed a record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Product details only; the record spans `A:G`.
    DetailsOnly,
    /// Details plus the price-points endpoint; adds a foil price column (`A:H`).
    #[default]
    WithPricePoints,
}

impl FetchMode {
    /// Number of columns a record occupies, starting at column A.
    pub fn row_width(self) -> u32 {
        match self {
            FetchMode::DetailsOnly => 7,
            FetchMode::WithPricePoints => 8,
        }
    }
}

impl FromStr for FetchMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "details" | "details-only" => Ok(FetchMode::DetailsOnly),
            "pricepoints" | "price-points" => Ok(FetchMode::WithPricePoints),
            other => Err(SyncError::Config(format!(
                "unknown fetch mode {:?} (expected \"details\" or \"pricepoints\")",
                other
            ))),
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMode::DetailsOnly => f.write_str("details"),
            FetchMode::WithPricePoints => f.write_str("pricepoints"),
        }
    }
}

// ---------------------------------------------------------------------------
// CardListing — One catalog lookup, shaped for a sheet row
// ---------------------------------------------------------------------------

/// A catalog lookup result. Every field is either a value or explicitly
/// absent; an unknown price is `None`, never a magic number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardListing {
    pub listing_id: ListingId,
    pub name: Option<String>,
    pub color: Option<Vec<String>>,
    pub cmc: Option<f64>,
    #[serde(rename = "type")]
    pub type_field: Option<String>,
    pub price: Option<f64>,
    pub foil_price: Option<f64>,
    pub url: String,
}

impl CardListing {
    /// An empty record for `listing_id`; only the URL is filled in.
    pub fn new(listing_id: ListingId) -> Self {
        let url = listing_id.product_url();
        Self {
            listing_id,
            name: None,
            color: None,
            cmc: None,
            type_field: None,
            price: None,
            foil_price: None,
            url,
        }
    }

    /// Field values in column order for the given mode.
    ///
    /// `listing_id, name, color, cmc, type, price[, foilPrice], url`
    pub fn to_cells(&self, mode: FetchMode) -> Vec<CellValue> {
        let mut cells = vec![
            CellValue::Text(self.listing_id.to_string()),
            CellValue::from(self.name.clone()),
            CellValue::from(self.color.clone()),
            CellValue::from(self.cmc),
            CellValue::from(self.type_field.clone()),
            CellValue::from(self.price),
        ];
        if mode == FetchMode::WithPricePoints {
            cells.push(CellValue::from(self.foil_price));
        }
        cells.push(CellValue::Text(self.url.clone()));
        cells
    }
}
