//! TCGplayer catalog lookups.
//!
//! Fetches the product details (and, in [`FetchMode::WithPricePoints`], the
//! per-printing price points) for one listing and folds them into a
//! [`CardListing`]. Every nested lookup is optional: a missing key yields an
//! absent field, never an error. Network and decoding failures propagate.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;
use serde_json::Value;

use crate::error::{Result, SyncError};
use crate::models::{CardListing, FetchMode, ListingId};

/// Anything that can turn a listing id into a [`CardListing`].
pub trait CatalogSource {
    fn fetch(&self, id: &ListingId) -> Result<CardListing>;
}

// ---------------------------------------------------------------------------
// CatalogClient
// ---------------------------------------------------------------------------

/// Blocking HTTP client for the TCGplayer marketplace API.
pub struct CatalogClient {
    client: Client,
    api_base: Url,
    query: Vec<(String, String)>,
    mode: FetchMode,
}

impl CatalogClient {
    /// Create a client against `api_base` (e.g. [`crate::config::CATALOG_API_BASE`]).
    ///
    /// Requests use the HTTP library's default timeout.
    pub fn new(api_base: &str, mode: FetchMode) -> Result<Self> {
        Self::with_client(Client::new(), api_base, mode)
    }

    /// Create a client whose requests give up after `timeout`.
    pub fn with_timeout(api_base: &str, mode: FetchMode, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(client, api_base, mode)
    }

    pub fn with_client(client: Client, api_base: &str, mode: FetchMode) -> Result<Self> {
        let api_base = Url::parse(api_base)
            .map_err(|e| SyncError::Config(format!("invalid catalog API base {:?}: {}", api_base, e)))?;
        if api_base.cannot_be_a_base() {
            return Err(SyncError::Config(format!(
                "catalog API base {} cannot carry a path",
                api_base
            )));
        }
        Ok(Self {
            client,
            api_base,
            query: Vec::new(),
            mode,
        })
    }

    /// Append a fixed query parameter to every catalog request.
    pub fn query_param(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    /// `{api_base}/v2/product/{id}/{endpoint}`, with `id` percent-encoded.
    fn endpoint(&self, id: &ListingId, endpoint: &str) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v2", "product", id.as_str(), endpoint]);
        }
        url
    }

    fn get_json(&self, url: Url) -> Result<Value> {
        log::debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .query(&self.query)
            .send()?
            .error_for_status()?;
        let body = resp.text()?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Raw product details payload.
    pub fn details(&self, id: &ListingId) -> Result<Value> {
        self.get_json(self.endpoint(id, "details"))
    }

    /// Raw price-points payload.
    pub fn price_points(&self, id: &ListingId) -> Result<Value> {
        self.get_json(self.endpoint(id, "pricepoints"))
    }
}

impl CatalogSource for CatalogClient {
    fn fetch(&self, id: &ListingId) -> Result<CardListing> {
        let details = self.details(id)?;
        let mut listing = parse_details(id, &details)?;

        if self.mode == FetchMode::WithPricePoints {
            let points = self.price_points(id)?;
            let (price, foil_price) = resolve_prices(&details, &points);
            listing.price = price;
            listing.foil_price = foil_price;
        }

        log::debug!("Fetched {}: {:?}", id, listing.name);
        Ok(listing)
    }
}

// ---------------------------------------------------------------------------
// Payload extraction
// ---------------------------------------------------------------------------

/// Build a record from a details payload.
///
/// `price` is the top-level `marketPrice`; `foil_price` is left absent.
pub fn parse_details(id: &ListingId, details: &Value) -> Result<CardListing> {
    if !details.is_object() {
        return Err(SyncError::Payload(format!(
            "details for listing {} is not a JSON object",
            id
        )));
    }

    let attrs = details.get("customAttributes").filter(|v| v.is_object());
    let attr = |key: &str| attrs.and_then(|a| a.get(key));

    let mut listing = CardListing::new(id.clone());
    listing.name = details.get("productName").and_then(as_text);
    listing.color = attr("color").and_then(as_text_list);
    listing.cmc = attr("convertedCost").and_then(as_number);
    listing.type_field = attr("fullType").and_then(as_text);
    listing.price = details.get("marketPrice").and_then(as_number);
    Ok(listing)
}

/// Resolve `(price, foil_price)` from the details and price-points payloads.
///
/// A `"Normal"` or `"Foil"` entry with no usable `marketPrice` resolves that
/// printing to unknown. A printing with no entry at all falls back:
/// standard takes the foil entry's price, then the details `marketPrice`;
/// foil takes the resolved standard price.
pub fn resolve_prices(details: &Value, price_points: &Value) -> (Option<f64>, Option<f64>) {
    let mut normal: Option<Option<f64>> = None;
    let mut foil: Option<Option<f64>> = None;

    for entry in price_points.as_array().into_iter().flatten() {
        let price = entry.get("marketPrice").and_then(as_number);
        match entry.get("printingType").and_then(Value::as_str) {
            Some("Normal") => normal = Some(price),
            Some("Foil") => foil = Some(price),
            _ => {}
        }
    }

    let standard = match normal {
        Some(price) => price,
        None => foil
            .flatten()
            .or_else(|| details.get("marketPrice").and_then(as_number)),
    };
    let foil = foil.unwrap_or(standard);

    (standard, foil)
}

fn as_text(v: &Value) -> Option<String> {
    v.as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A string or an array of strings, as a list.
fn as_text_list(v: &Value) -> Option<Vec<String>> {
    let items: Vec<String> = match v {
        Value::String(_) => as_text(v).into_iter().collect(),
        Value::Array(arr) => arr.iter().filter_map(as_text).collect(),
        _ => Vec::new(),
    };
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// A JSON number, or a string holding one.
fn as_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}
