//! Read-only views over the loaded records for list screens.

use crate::market_data::types::MarketRecord;

const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    MarketCap,
    PriceChange24h,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

fn matches(record: &MarketRecord, query: &str) -> bool {
    record.name.to_lowercase().contains(query) || record.symbol.to_lowercase().contains(query)
}

/// Case-insensitive substring match on name or symbol. A blank query keeps
/// everything.
pub fn search(records: &[MarketRecord], query: &str) -> Vec<MarketRecord> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return records.to_vec();
    }

    records.iter().filter(|r| matches(r, &query)).cloned().collect()
}

/// First few search hits for a type-ahead list. A blank query suggests nothing.
pub fn suggestions(records: &[MarketRecord], query: &str) -> Vec<MarketRecord> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    records
        .iter()
        .filter(|r| matches(r, &query))
        .take(MAX_SUGGESTIONS)
        .cloned()
        .collect()
}

/// Stable sort, so equal keys keep provider order.
pub fn sorted(records: &[MarketRecord], key: SortKey, order: SortOrder) -> Vec<MarketRecord> {
    let mut out = records.to_vec();
    out.sort_by(|a, b| {
        let ordering = match key {
            SortKey::MarketCap => a.market_cap.cmp(&b.market_cap),
            SortKey::PriceChange24h => a.price_change_percentage_24h.cmp(&b.price_change_percentage_24h),
        };
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    out
}
