//! Flat tabular form of the price book, for spreadsheet round trips
//!
//! Rows are plain string cells in the column order of [`HEADER`]. Import only
//! edits existing items; rows with an unknown id are skipped, and a bad row
//! is reported without aborting the rest of the batch.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::pricing::{validate_item, FormulaType, PriceCategory, MAX_BASE_PRICE};

pub const HEADER: [&str; 8] = [
    "Category",
    "Item ID",
    "Option ID",
    "Name",
    "Formula Type",
    "Formula",
    "Constant",
    "Base Price",
];

/// A row that could not be applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    /// 1-based row number in the submitted table
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub errors: Vec<RowError>,
}

/// Values parsed from one import row
#[derive(Debug, Clone, PartialEq)]
struct ParsedRow {
    id: String,
    name: String,
    formula_type: FormulaType,
    formula_string: String,
    constant: f64,
    base_price: u64,
}

/// Export the price book as a header row plus one row per item
pub fn export_rows(price_book: &[PriceCategory]) -> Vec<Vec<String>> {
    let mut rows = vec![HEADER.iter().map(|h| h.to_string()).collect()];

    for category in price_book {
        for item in &category.items {
            rows.push(vec![
                category.name.clone(),
                item.id.clone(),
                item.option_id.clone(),
                item.name.clone(),
                item.formula_type.to_string(),
                item.formula_string.clone(),
                item.constant.to_string(),
                item.base_price.to_string(),
            ]);
        }
    }

    rows
}

/// Apply edited rows to a copy of the price book
pub fn import_rows(
    price_book: &[PriceCategory],
    rows: &[Vec<String>],
) -> (Vec<PriceCategory>, ImportReport) {
    let mut updated = price_book.to_vec();
    let mut report = ImportReport::default();

    // item id -> (category index, item index), first occurrence wins
    let mut index: HashMap<String, (usize, usize)> = HashMap::new();
    for (ci, category) in updated.iter().enumerate() {
        for (ii, item) in category.items.iter().enumerate() {
            index.entry(item.id.clone()).or_insert((ci, ii));
        }
    }

    for (i, row) in rows.iter().enumerate() {
        let row_number = i + 1;
        if i == 0 && is_header(row) {
            continue;
        }
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let parsed = match parse_row(row) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Import row {} rejected: {}", row_number, e);
                report.errors.push(RowError {
                    row: row_number,
                    message: e.to_string(),
                });
                continue;
            }
        };

        let Some(&(ci, ii)) = index.get(&parsed.id) else {
            report.skipped += 1;
            continue;
        };

        let item = &mut updated[ci].items[ii];
        let mut candidate = item.clone();
        candidate.name = parsed.name;
        candidate.formula_type = parsed.formula_type;
        candidate.formula_string = parsed.formula_string;
        candidate.constant = parsed.constant;
        candidate.base_price = parsed.base_price;

        if candidate == *item {
            report.unchanged += 1;
            continue;
        }

        // the item stays as it was when the edited version is inconsistent
        if let Err(e) = validate_item(&candidate) {
            warn!("Import row {} rejected: {}", row_number, e);
            report.errors.push(RowError {
                row: row_number,
                message: e.to_string(),
            });
            continue;
        }

        *item = candidate;
        report.updated += 1;
    }

    info!(
        "Import finished: {} updated, {} unchanged, {} skipped, {} errors",
        report.updated,
        report.unchanged,
        report.skipped,
        report.errors.len()
    );

    (updated, report)
}

fn is_header(row: &[String]) -> bool {
    row.first()
        .map(|cell| cell.trim().eq_ignore_ascii_case(HEADER[0]))
        .unwrap_or(false)
}

fn parse_row(row: &[String]) -> Result<ParsedRow> {
    if row.len() < HEADER.len() {
        return Err(Error::validation(format!(
            "expected {} columns, found {}",
            HEADER.len(),
            row.len()
        )));
    }

    let id = row[1].trim();
    if id.is_empty() {
        return Err(Error::validation("missing item id"));
    }

    // text cells are kept verbatim so an unedited export imports as unchanged
    Ok(ParsedRow {
        id: id.to_string(),
        name: row[3].clone(),
        formula_type: row[4].parse()?,
        formula_string: row[5].clone(),
        constant: parse_constant(&row[6])?,
        base_price: parse_price(&row[7])?,
    })
}

/// Parse a decimal constant, ignoring anything that isn't part of a number
pub fn parse_constant(cell: &str) -> Result<f64> {
    let cleaned: String = cell
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | 'e' | 'E'))
        .collect();
    if cleaned.is_empty() {
        return Err(Error::validation(format!("constant `{}` is not a number", cell)));
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::validation(format!("constant `{}` is not a number", cell)))
}

/// Parse a currency-like price such as `₩9,700`, `9,700원` or `9,700.00`.
///
/// Currency symbols, thousands separators and unit suffixes are dropped.
/// Negative amounts and non-zero fractions are rejected rather than guessed.
pub fn parse_price(cell: &str) -> Result<u64> {
    let first_digit = cell
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| Error::validation(format!("base price `{}` is not a number", cell)))?;
    if cell[..first_digit].contains('-') {
        return Err(Error::validation(format!(
            "base price `{}` must not be negative",
            cell
        )));
    }

    let number = &cell[first_digit..];
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if fraction.chars().any(|c| c.is_ascii_digit() && c != '0') {
        return Err(Error::validation(format!(
            "base price `{}` must be a whole amount",
            cell
        )));
    }

    let digits: String = whole.chars().filter(|c| c.is_ascii_digit()).collect();
    digits
        .parse::<u64>()
        .ok()
        .filter(|&v| v <= MAX_BASE_PRICE)
        .ok_or_else(|| Error::validation(format!("base price `{}` is out of range", cell)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_book::default_price_book;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_export_shape() {
        let book = default_price_book();
        let rows = export_rows(&book);
        let item_count: usize = book.iter().map(|c| c.items.len()).sum();

        assert_eq!(rows.len(), item_count + 1);
        assert_eq!(rows[0][0], "Category");
        assert!(rows.iter().all(|r| r.len() == HEADER.len()));
        assert_eq!(rows[1][1], "core-soft-200");
        assert_eq!(rows[1][6], "0.0003266");
        assert_eq!(rows[1][7], "9700");
    }

    #[test]
    fn test_unmodified_round_trip_changes_nothing() {
        let book = default_price_book();
        let (imported, report) = import_rows(&book, &export_rows(&book));

        assert_eq!(imported, book);
        assert_eq!(report.updated, 0);
        assert_eq!(report.skipped, 0);
        assert!(report.errors.is_empty());
        assert_eq!(report.unchanged, export_rows(&book).len() - 1);
    }

    #[test]
    fn test_import_applies_changes_tolerantly() {
        let book = default_price_book();
        let rows = vec![
            cells(&HEADER),
            cells(&[
                "Core",
                "core-soft-200",
                "core_soft_200",
                "Soft core 200",
                "volume",
                "W×D×H×0.00035 + 10,000",
                " 0.00035 ",
                "₩10,000",
            ]),
        ];

        let (imported, report) = import_rows(&book, &rows);
        assert_eq!(report.updated, 1);

        let item = &imported[0].items[0];
        assert_eq!(item.constant, 0.00035);
        assert_eq!(item.base_price, 10000);
        assert_eq!(item.formula_string, "W×D×H×0.00035 + 10,000");
        // input untouched
        assert_eq!(book[0].items[0].base_price, 9700);
    }

    #[test]
    fn test_import_collects_row_errors() {
        let book = default_price_book();
        let rows = vec![
            cells(&["Core", "core-soft-200", "core_soft_200", "Soft", "AREA", "", "1", "1"]),
            cells(&["Core", "core-firm-250", "core_firm_250", "Firm", "VOLUME", "", "n/a", "1"]),
            cells(&["Core", "core-firm-250"]),
            cells(&["Packaging", "pack-box", "pack_box", "Flat box", "FIXED", "", "0", "16,000원"]),
        ];

        let (imported, report) = import_rows(&book, &rows);
        assert_eq!(report.errors.len(), 3);
        assert_eq!(
            report.errors.iter().map(|e| e.row).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(report.errors[0].message.contains("AREA"));
        assert_eq!(report.updated, 1);
        assert_eq!(imported[4].items[1].base_price, 16000);
        assert_eq!(imported[0].items[0], book[0].items[0]);
    }

    #[test]
    fn test_unknown_ids_are_skipped() {
        let book = default_price_book();
        let rows = vec![
            cells(&["Core", "core-new", "core_new", "New", "FIXED", "", "0", "100"]),
            cells(&["", "", "", "", "", "", "", ""]),
        ];
        let (imported, report) = import_rows(&book, &rows);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.updated, 0);
        assert!(report.errors.is_empty());
        assert_eq!(imported, book);
    }

    #[test]
    fn test_tolerant_number_parsing() {
        assert_eq!(parse_price("9,700").unwrap(), 9700);
        assert_eq!(parse_price("₩ 12,000").unwrap(), 12000);
        assert_eq!(parse_price("9,700.00").unwrap(), 9700);
        assert_eq!(parse_price("$1,250.0 USD").unwrap(), 1250);
        assert!(parse_price("free").is_err());
        assert!(parse_price("-500").is_err());
        assert!(parse_price("₩-500").is_err());
        assert!(parse_price("12.50").is_err());
        assert!(parse_price("99999999999999999999").is_err());
        assert_eq!(parse_constant("0.0003266").unwrap(), 0.0003266);
        assert_eq!(parse_constant("3.266e-4").unwrap(), 0.0003266);
        assert!(parse_constant("").is_err());
        assert!(parse_constant("-.-").is_err());
    }

    #[test]
    fn test_padded_text_survives_round_trip() {
        let book = crate::pricing::update_item(
            &default_price_book(),
            "pack-roll",
            0.0,
            8000,
            " 8,000 flat ",
        )
        .unwrap();
        let (imported, report) = import_rows(&book, &export_rows(&book));

        assert_eq!(report.updated, 0);
        assert_eq!(imported, book);
        assert_eq!(imported[4].items[0].formula_string, " 8,000 flat ");
    }

    #[test]
    fn test_import_rejects_width_step_without_table() {
        let book = default_price_book();
        let rows = vec![
            cells(&["Packaging", "pack-roll", "pack_roll", "Roll pack", "WIDTH_STEP", "", "0", "8000"]),
            cells(&["Packaging", "pack-box", "pack_box", "Flat box", "FIXED", "", "0", "16000"]),
        ];

        let (imported, report) = import_rows(&book, &rows);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].row, 1);
        assert!(report.errors[0].message.contains("pack-roll"));
        assert_eq!(report.updated, 1);
        assert_eq!(imported[4].items[0], book[4].items[0]);
        assert_eq!(imported[4].items[1].base_price, 16000);
        assert!(crate::pricing::validate_price_book(&imported).is_ok());
    }

    #[test]
    fn test_import_reports_bad_prices() {
        let book = default_price_book();
        let rows = vec![
            cells(&["Packaging", "pack-roll", "pack_roll", "Roll pack", "FIXED", "", "0", "-500"]),
            cells(&["Packaging", "pack-box", "pack_box", "Flat box", "FIXED", "15000 flat", "0", "15,000.00원"]),
        ];

        let (imported, report) = import_rows(&book, &rows);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("negative"));
        assert_eq!(report.unchanged, 1);
        assert_eq!(imported, book);
    }
}
