//! Spreadsheet normalizer: parses the first sheet of an uploaded workbook
//! into `NormalizedRecord`s, tolerant of heterogeneous column naming.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::errors::ServiceError;
use crate::models::NormalizedRecord;

/// Accepted column names per logical field, matched case-insensitively
/// against the sheet's header row. First match wins. Externalized so a
/// deployment can extend the table without a rebuild.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnSynonyms {
    pub barcode: Vec<String>,
    pub item_name: Vec<String>,
    pub status: Vec<String>,
    pub color: Vec<String>,
    pub brand: Vec<String>,
    pub price: Vec<String>,
    pub item_type: Vec<String>,
}

impl Default for ColumnSynonyms {
    fn default() -> Self {
        fn list(names: &[&str]) -> Vec<String> {
            names.iter().map(|s| s.to_string()).collect()
        }
        Self {
            barcode: list(&["barcode", "bar code", "kode", "sku"]),
            item_name: list(&["item name", "name", "nama barang", "nama"]),
            status: list(&["status"]),
            color: list(&["color", "colour", "warna"]),
            brand: list(&["brand", "merk"]),
            price: list(&["price", "harga"]),
            item_type: list(&["type", "category", "tipe"]),
        }
    }
}

/// Resolved header indices for one sheet.
struct FieldIndices {
    barcode: Option<usize>,
    item_name: Option<usize>,
    status: Option<usize>,
    color: Option<usize>,
    brand: Option<usize>,
    price: Option<usize>,
    item_type: Option<usize>,
}

impl FieldIndices {
    fn resolve(header: &[Data], synonyms: &ColumnSynonyms) -> Self {
        let names: Vec<String> = header
            .iter()
            .map(|cell| cell_string(cell).trim().to_lowercase())
            .collect();

        let find = |accepted: &[String]| {
            accepted
                .iter()
                .find_map(|wanted| names.iter().position(|name| name == &wanted.to_lowercase()))
        };

        Self {
            barcode: find(&synonyms.barcode),
            item_name: find(&synonyms.item_name),
            status: find(&synonyms.status),
            color: find(&synonyms.color),
            brand: find(&synonyms.brand),
            price: find(&synonyms.price),
            item_type: find(&synonyms.item_type),
        }
    }
}

/// Parses workbook bytes (first sheet only) into normalized records.
///
/// Fails with `EmptyFile` when the sheet has no data rows and `NoValidRows`
/// when every row was rejected; both are terminal, the caller must not
/// attempt a partial import.
#[instrument(skip(bytes, synonyms), fields(bytes = bytes.len()))]
pub fn normalize_workbook(
    bytes: &[u8],
    synonyms: &ColumnSynonyms,
) -> Result<Vec<NormalizedRecord>, ServiceError> {
    let cursor = Cursor::new(bytes);
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| ServiceError::InvalidInput(format!("unreadable spreadsheet: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ServiceError::EmptyFile)?
        .map_err(|e| ServiceError::InvalidInput(format!("unreadable sheet: {}", e)))?;

    let mut rows = range.rows();
    let header = rows.next().ok_or(ServiceError::EmptyFile)?;

    normalize_rows(header, rows, synonyms)
}

/// Core of the normalizer, split from workbook I/O so it can be exercised
/// directly on in-memory rows.
fn normalize_rows<'a, I>(
    header: &[Data],
    rows: I,
    synonyms: &ColumnSynonyms,
) -> Result<Vec<NormalizedRecord>, ServiceError>
where
    I: Iterator<Item = &'a [Data]>,
{
    let indices = FieldIndices::resolve(header, synonyms);

    let mut seen = 0usize;
    let mut records = Vec::new();

    for row in rows {
        seen += 1;

        let barcode = field(row, indices.barcode, "");
        // Rows without a usable business key are dropped silently.
        if barcode.is_empty() || barcode == "undefined" {
            debug!(row = seen, "Dropping row without a usable barcode");
            continue;
        }

        records.push(NormalizedRecord {
            barcode,
            item_name: field(row, indices.item_name, "No Name"),
            status: field(row, indices.status, "-"),
            color: field(row, indices.color, "-"),
            brand: field(row, indices.brand, "-"),
            price: indices
                .price
                .and_then(|i| row.get(i))
                .map(parse_price)
                .unwrap_or(Decimal::ZERO),
            item_type: field(row, indices.item_type, "-"),
        });
    }

    if seen == 0 {
        return Err(ServiceError::EmptyFile);
    }
    if records.is_empty() {
        return Err(ServiceError::NoValidRows);
    }

    Ok(records)
}

fn field(row: &[Data], index: Option<usize>, default: &str) -> String {
    let value = index
        .and_then(|i| row.get(i))
        .map(cell_string)
        .unwrap_or_default();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

fn cell_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Barcodes read as numeric cells must not grow a trailing ".0"
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Int(i) => i.to_string(),
        other => other.to_string(),
    }
}

/// Coerces locale-formatted price input ("Rp 250,000", "1,234.50") to a
/// non-negative decimal. Unparsable input yields 0.
fn parse_price(cell: &Data) -> Decimal {
    match cell {
        Data::Int(i) => Decimal::from(*i).max(Decimal::ZERO),
        Data::Float(f) => Decimal::from_f64_retain(*f)
            .unwrap_or(Decimal::ZERO)
            .max(Decimal::ZERO),
        Data::String(s) => parse_price_str(s),
        _ => Decimal::ZERO,
    }
}

fn parse_price_str(raw: &str) -> Decimal {
    // Strip currency symbols and thousands separators, keep digits and dots.
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if let Ok(value) = cleaned.parse::<Decimal>() {
        return value.max(Decimal::ZERO);
    }

    // Fall back to the longest valid numeric prefix (one decimal point),
    // so "1.250.000" still yields a number instead of failing outright.
    let mut prefix = String::new();
    let mut seen_dot = false;
    for c in cleaned.chars() {
        match c {
            '.' if !seen_dot => {
                seen_dot = true;
                prefix.push(c);
            }
            '.' => break,
            digit => prefix.push(digit),
        }
    }

    prefix
        .parse::<Decimal>()
        .map(|v| v.max(Decimal::ZERO))
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn s(value: &str) -> Data {
        Data::String(value.to_string())
    }

    fn normalize(
        header: Vec<Data>,
        rows: Vec<Vec<Data>>,
    ) -> Result<Vec<NormalizedRecord>, ServiceError> {
        let synonyms = ColumnSynonyms::default();
        normalize_rows(&header, rows.iter().map(|r| r.as_slice()), &synonyms)
    }

    #[test]
    fn resolves_documented_example_sheet() {
        let records = normalize(
            vec![s("Barcode"), s("Item Name"), s("Price")],
            vec![vec![s("123"), s("Widget"), s("10000")]],
        )
        .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.barcode, "123");
        assert_eq!(record.item_name, "Widget");
        assert_eq!(record.price, dec!(10000));
        assert_eq!(record.status, "-");
    }

    #[rstest]
    #[case("KODE")]
    #[case("Bar Code")]
    #[case("sku")]
    fn barcode_column_synonyms_are_case_insensitive(#[case] header_name: &str) {
        let records = normalize(
            vec![s(header_name), s("Name")],
            vec![vec![s("A-1"), s("Thing")]],
        )
        .unwrap();
        assert_eq!(records[0].barcode, "A-1");
    }

    #[test]
    fn first_matching_synonym_wins() {
        // Both "Item Name" and "Name" present; "item name" is listed first.
        let records = normalize(
            vec![s("Barcode"), s("Name"), s("Item Name")],
            vec![vec![s("1"), s("short"), s("long name")]],
        )
        .unwrap();
        assert_eq!(records[0].item_name, "long name");
    }

    #[test]
    fn numeric_barcode_cells_do_not_grow_a_decimal_suffix() {
        let records = normalize(
            vec![s("Barcode")],
            vec![vec![Data::Float(8991234567890.0)]],
        )
        .unwrap();
        assert_eq!(records[0].barcode, "8991234567890");
    }

    #[rstest]
    #[case("Rp 250,000", dec!(250000))]
    #[case("1,234.50", dec!(1234.50))]
    #[case("$99", dec!(99))]
    #[case("free", dec!(0))]
    #[case("", dec!(0))]
    fn price_parsing_tolerates_locale_formatting(#[case] raw: &str, #[case] expected: Decimal) {
        let records = normalize(
            vec![s("Barcode"), s("Price")],
            vec![vec![s("1"), s(raw)]],
        )
        .unwrap();
        assert_eq!(records[0].price, expected);
    }

    #[test]
    fn rows_without_barcode_are_dropped_silently() {
        let records = normalize(
            vec![s("Barcode"), s("Name")],
            vec![
                vec![s(""), s("X")],
                vec![s("undefined"), s("Y")],
                vec![s("  77  "), s("Z")],
            ],
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].barcode, "77");
    }

    #[test]
    fn all_rows_rejected_is_terminal() {
        let result = normalize(
            vec![s("Barcode"), s("Name")],
            vec![vec![s(""), s("X")]],
        );
        assert_matches!(result, Err(ServiceError::NoValidRows));
    }

    #[test]
    fn zero_data_rows_is_terminal() {
        let result = normalize(vec![s("Barcode")], vec![]);
        assert_matches!(result, Err(ServiceError::EmptyFile));
    }

    #[test]
    fn string_fields_are_trimmed_and_defaulted() {
        let records = normalize(
            vec![s("Barcode"), s("Brand"), s("Color")],
            vec![vec![s("5"), s("  Acme  "), s("   ")]],
        )
        .unwrap();
        assert_eq!(records[0].brand, "Acme");
        assert_eq!(records[0].color, "-");
        assert_eq!(records[0].item_name, "No Name");
    }
}
