use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One spreadsheet row after normalization: descriptive fields only, always
/// pending. Scan state is never sourced from a sheet, so re-importing a file
/// cannot erase audit progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NormalizedRecord {
    pub barcode: String,
    pub item_name: String,
    pub status: String,
    pub color: String,
    pub brand: String,
    pub price: Decimal,
    pub item_type: String,
}

/// Progress counters for the running audit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockStats {
    pub total: u64,
    pub scanned: u64,
    pub pending: u64,
}

impl StockStats {
    pub fn new(total: u64, scanned: u64) -> Self {
        Self {
            total,
            scanned,
            pending: total.saturating_sub(scanned),
        }
    }
}

/// Summary returned when a bulk import completes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImportSummary {
    pub rows: u64,
    pub chunks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_derive_pending_from_total_and_scanned() {
        let stats = StockStats::new(120, 45);
        assert_eq!(stats.pending, 75);

        // Stale counts must not underflow
        let stats = StockStats::new(10, 12);
        assert_eq!(stats.pending, 0);
    }
}
