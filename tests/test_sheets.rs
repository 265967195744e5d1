//! Spreadsheet gateway tests: collection operations over an in-memory sheet,
//! and the Google Sheets client against a mock API.

mod common;

use card_sheet_sync::config::{SHEETS_SCOPES, STATUS_CELL};
use card_sheet_sync::{
    CardListing, Cell, CellRef, CellValue, FetchMode, GoogleWorksheet, ListingId, Range,
    ServiceAccountKey, SheetGateway, SyncConfig, SyncError, TokenProvider, ValueInput,
    Worksheet,
};
use common::MemoryWorksheet;
use mockito::{Matcher, Mock, ServerGuard};
use reqwest::blocking::Client;
use serde_json::json;

fn gateway() -> SheetGateway<MemoryWorksheet> {
    SheetGateway::new(MemoryWorksheet::new(), CellRef::from_a1(STATUS_CELL).unwrap())
}

fn bolt() -> CardListing {
    let mut listing = CardListing::new(ListingId::new("1001").unwrap());
    listing.name = Some("Lightning Bolt".to_string());
    listing.color = Some(vec!["Red".to_string()]);
    listing.cmc = Some(1.0);
    listing.type_field = Some("Instant".to_string());
    listing.price = Some(2.5);
    listing.foil_price = Some(5.0);
    listing
}

// ---------------------------------------------------------------------------
// SheetGateway
// ---------------------------------------------------------------------------

#[test]
fn read_cell_and_range_by_label() {
    let gw = gateway();
    gw.worksheet().set("A1", "7");
    gw.worksheet().set("A4", "1002");

    assert_eq!(gw.read_cell("A1").unwrap(), "7");
    assert_eq!(gw.read_cell("B1").unwrap(), "");

    let cells = gw.read_range("A3:A5").unwrap();
    let text: Vec<String> = cells.iter().map(Cell::text).collect();
    assert_eq!(text, vec!["", "1002", ""]);
    assert_eq!(cells[1].row(), 4);
}

#[test]
fn populated_cells_skip_blank_rows() {
    let gw = gateway();
    gw.worksheet().set("A3", "1001");
    gw.worksheet().set("A4", "   ");
    gw.worksheet().set("A6", "1003");

    let range = Range::from_a1("A3:A1000").unwrap();
    let rows: Vec<u32> = gw
        .populated_cells(&range)
        .unwrap()
        .iter()
        .map(Cell::row)
        .collect();
    assert_eq!(rows, vec![3, 6]);
}

#[test]
fn write_row_is_one_batched_update_across_the_span() {
    let gw = gateway();
    gw.write_row(5, &bolt(), FetchMode::WithPricePoints).unwrap();

    let writes = gw.worksheet().writes();
    assert_eq!(writes.len(), 1);
    let labels: Vec<String> = writes[0].iter().map(|c| c.at.to_a1()).collect();
    assert_eq!(labels, vec!["A5", "B5", "C5", "D5", "E5", "F5", "G5", "H5"]);
    assert_eq!(gw.worksheet().get("C5"), "Red");
    assert_eq!(gw.worksheet().value("F5"), CellValue::Number(2.5));
    assert_eq!(gw.worksheet().get("H5"), "https://www.tcgplayer.com/product/1001");
}

#[test]
fn details_only_row_stops_at_column_g() {
    let gw = gateway();
    gw.write_row(3, &bolt(), FetchMode::DetailsOnly).unwrap();

    let writes = gw.worksheet().writes();
    assert_eq!(writes[0].len(), 7);
    assert_eq!(gw.worksheet().get("G3"), "https://www.tcgplayer.com/product/1001");
    assert_eq!(gw.worksheet().get("H3"), "");
}

#[test]
fn write_status_and_error_target_single_cells() {
    let gw = gateway();
    gw.write_status("Waiting...").unwrap();
    gw.write_error(8, "HTTP error: 500").unwrap();

    assert_eq!(gw.worksheet().get("J1"), "Waiting...");
    assert_eq!(gw.worksheet().get("B8"), "ERROR: HTTP error: 500");
    assert!(gw.worksheet().writes().iter().all(|w| w.len() == 1));
}

#[test]
fn only_the_status_cell_is_user_entered() {
    let gw = gateway();
    gw.write_row(3, &bolt(), FetchMode::WithPricePoints).unwrap();
    gw.write_error(4, "boom").unwrap();
    gw.write_status("Waiting...").unwrap();

    assert_eq!(
        gw.worksheet().inputs(),
        vec![ValueInput::Raw, ValueInput::Raw, ValueInput::UserEntered]
    );
}

// ---------------------------------------------------------------------------
// GoogleWorksheet
// ---------------------------------------------------------------------------

struct MockGoogle {
    server: ServerGuard,
    _token: Mock,
}

fn mock_google() -> MockGoogle {
    let mut server = mockito::Server::new();
    let token = server
        .mock("POST", "/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"ya29.test","expires_in":3600,"token_type":"Bearer"}"#)
        .create();
    MockGoogle {
        server,
        _token: token,
    }
}

fn tokens(server: &ServerGuard) -> TokenProvider {
    let token_uri = format!("{}/token", server.url());
    let key = ServiceAccountKey::from_json(&common::service_account_json(&token_uri)).unwrap();
    TokenProvider::new(key, SHEETS_SCOPES, Client::new()).unwrap()
}

fn config_for(server: &ServerGuard) -> SyncConfig {
    SyncConfig {
        drive_api_base: format!("{}/drive/v3", server.url()),
        sheets_api_base: format!("{}/v4", server.url()),
        ..common::test_config()
    }
}

fn mock_metadata(server: &mut ServerGuard, titles: &[&str]) -> Mock {
    let sheets: Vec<_> = titles
        .iter()
        .enumerate()
        .map(|(i, t)| json!({ "properties": { "sheetId": i, "title": t, "index": i } }))
        .collect();
    server
        .mock("GET", "/v4/spreadsheets/sheet123")
        .match_query(Matcher::UrlEncoded("fields".into(), "sheets.properties".into()))
        .match_header("authorization", "Bearer ya29.test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "sheets": sheets }).to_string())
        .create()
}

fn open(server: &ServerGuard, index: usize) -> GoogleWorksheet {
    GoogleWorksheet::open(
        Client::new(),
        tokens(server),
        &format!("{}/v4", server.url()),
        "sheet123",
        index,
    )
    .unwrap()
}

#[test]
fn connect_resolves_spreadsheet_by_title() {
    let mut google = mock_google();
    let drive = google
        .server
        .mock("GET", "/drive/v3/files")
        .match_query(Matcher::UrlEncoded(
            "q".into(),
            "name = 'MTG Card Collection' and mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false"
                .into(),
        ))
        .with_status(200)
        .with_body(r#"{"files":[{"id":"sheet123","name":"MTG Card Collection"}]}"#)
        .create();
    let meta = mock_metadata(&mut google.server, &["Collection", "Archive"]);

    let config = config_for(&google.server);
    let sheet = GoogleWorksheet::connect(&config, tokens(&google.server), Client::new()).unwrap();

    drive.assert();
    meta.assert();
    assert_eq!(sheet.spreadsheet_id(), "sheet123");
    assert_eq!(sheet.title(), "Collection");
}

#[test]
fn connect_fails_when_no_spreadsheet_matches() {
    let mut google = mock_google();
    let _mock = google
        .server
        .mock("GET", "/drive/v3/files")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"files":[]}"#)
        .create();

    let config = config_for(&google.server);
    let err = GoogleWorksheet::connect(&config, tokens(&google.server), Client::new())
        .err()
        .unwrap();
    assert!(matches!(err, SyncError::NotFound(_)));
}

#[test]
fn open_selects_worksheet_by_index() {
    let mut google = mock_google();
    let _meta = mock_metadata(&mut google.server, &["Collection", "Archive"]);

    let sheet = open(&google.server, 1);
    assert_eq!(sheet.title(), "Archive");
}

#[test]
fn open_rejects_missing_worksheet_index() {
    let mut google = mock_google();
    let _meta = mock_metadata(&mut google.server, &["Collection"]);

    let err = GoogleWorksheet::open(
        Client::new(),
        tokens(&google.server),
        &format!("{}/v4", google.server.url()),
        "sheet123",
        3,
    )
    .err()
    .unwrap();
    assert!(matches!(err, SyncError::NotFound(_)));
}

#[test]
fn qualified_ranges_escape_quotes_in_titles() {
    let mut google = mock_google();
    let _meta = mock_metadata(&mut google.server, &["Bob's Cards"]);

    let sheet = open(&google.server, 0);
    let range = Range::from_a1("A3:A1000").unwrap();
    assert_eq!(sheet.qualified(&range), "'Bob''s Cards'!A3:A1000");
}

#[test]
fn read_range_pads_ragged_values() {
    let mut google = mock_google();
    let _meta = mock_metadata(&mut google.server, &["Collection"]);
    let values = google
        .server
        .mock("GET", Matcher::Regex(r"^/v4/spreadsheets/sheet123/values/.+".into()))
        .match_query(Matcher::UrlEncoded(
            "valueRenderOption".into(),
            "FORMATTED_VALUE".into(),
        ))
        .with_status(200)
        .with_body(
            r#"{"range":"Collection!A3:A6","majorDimension":"ROWS","values":[["1001"],[],["1003"]]}"#,
        )
        .create();

    let sheet = open(&google.server, 0);
    let cells = sheet.read_range(&Range::from_a1("A3:A6").unwrap()).unwrap();

    values.assert();
    let text: Vec<String> = cells.iter().map(Cell::text).collect();
    assert_eq!(text, vec!["1001", "", "1003", ""]);
    assert_eq!(cells[2].at, CellRef::new(5, 1));
}

#[test]
fn read_cell_of_empty_range_is_blank() {
    let mut google = mock_google();
    let _meta = mock_metadata(&mut google.server, &["Collection"]);
    let _mock = google
        .server
        .mock("GET", Matcher::Regex(r"^/v4/spreadsheets/sheet123/values/.+".into()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"range":"Collection!A1","majorDimension":"ROWS"}"#)
        .create();

    let sheet = open(&google.server, 0);
    assert_eq!(sheet.read_cell(CellRef::new(1, 1)).unwrap(), "");
}

#[test]
fn record_rows_are_written_raw_in_one_batch() {
    let mut google = mock_google();
    let _meta = mock_metadata(&mut google.server, &["Collection"]);
    let expected = json!({
        "valueInputOption": "RAW",
        "data": [{
            "range": "'Collection'!A7:H7",
            "majorDimension": "ROWS",
            "values": [[
                "1001", "+2 Mace", "Red", 1.0, "Instant", 2.5, 5.0,
                "https://www.tcgplayer.com/product/1001"
            ]]
        }]
    });
    let batch = google
        .server
        .mock(
            "POST",
            Matcher::Regex(r"^/v4/spreadsheets/sheet123/values(:|%3A)batchUpdate$".into()),
        )
        .match_header("authorization", "Bearer ya29.test")
        .match_body(Matcher::Json(expected))
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create();

    let mut listing = bolt();
    listing.name = Some("+2 Mace".to_string());
    let gw = SheetGateway::new(open(&google.server, 0), CellRef::new(1, 10));
    gw.write_row(7, &listing, FetchMode::WithPricePoints).unwrap();
    batch.assert();
}

#[test]
fn scattered_cells_become_separate_ranges_in_one_batch() {
    let mut google = mock_google();
    let _meta = mock_metadata(&mut google.server, &["Collection"]);
    let expected = json!({
        "valueInputOption": "USER_ENTERED",
        "data": [
            { "range": "'Collection'!J1", "majorDimension": "ROWS", "values": [["Waiting..."]] },
            { "range": "'Collection'!A2:B2", "majorDimension": "ROWS", "values": [["x", "y"]] }
        ]
    });
    let batch = google
        .server
        .mock(
            "POST",
            Matcher::Regex(r"^/v4/spreadsheets/sheet123/values(:|%3A)batchUpdate$".into()),
        )
        .match_body(Matcher::Json(expected))
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create();

    let sheet = open(&google.server, 0);
    sheet
        .update_cells(
            &[
                Cell::new(CellRef::new(2, 2), "y"),
                Cell::new(CellRef::new(1, 10), "Waiting..."),
                Cell::new(CellRef::new(2, 1), "x"),
            ],
            ValueInput::UserEntered,
        )
        .unwrap();
    batch.assert();
}

#[test]
fn api_errors_carry_the_google_message() {
    let mut google = mock_google();
    let _meta = mock_metadata(&mut google.server, &["Collection"]);
    let _mock = google
        .server
        .mock("GET", Matcher::Regex(r"^/v4/spreadsheets/sheet123/values/.+".into()))
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(r#"{"error":{"code":403,"message":"The caller does not have permission","status":"PERMISSION_DENIED"}}"#)
        .create();

    let sheet = open(&google.server, 0);
    match sheet.read_cell(CellRef::new(1, 1)).unwrap_err() {
        SyncError::Sheets(msg) => {
            assert!(msg.contains("403"));
            assert!(msg.contains("The caller does not have permission"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn unauthorized_response_discards_the_cached_token() {
    let mut server = mockito::Server::new();
    let exchange = server
        .mock("POST", "/token")
        .with_status(200)
        .with_body(r#"{"access_token":"ya29.test","expires_in":3600,"token_type":"Bearer"}"#)
        .expect(2)
        .create();
    let _meta = mock_metadata(&mut server, &["Collection"]);
    let _mock = server
        .mock("GET", Matcher::Regex(r"^/v4/spreadsheets/sheet123/values/.+".into()))
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"error":{"code":401,"message":"Request had invalid authentication credentials.","status":"UNAUTHENTICATED"}}"#)
        .create();

    // Opening signs in once; the rejected read forces a fresh exchange next time.
    let sheet = open(&server, 0);
    assert!(sheet.read_cell(CellRef::new(1, 1)).is_err());
    assert!(sheet.read_cell(CellRef::new(1, 1)).is_err());
    exchange.assert();
}
