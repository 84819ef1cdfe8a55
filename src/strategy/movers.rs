use crate::market_data::types::MarketRecord;

/// Biggest 24h gainers and losers among the loaded records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Movers {
    /// Positive change only, largest first.
    pub gainers: Vec<MarketRecord>,
    /// Negative change only, steepest drop first.
    pub losers: Vec<MarketRecord>,
}

pub fn top_movers(records: &[MarketRecord], limit: usize) -> Movers {
    let mut gainers: Vec<MarketRecord> = records
        .iter()
        .filter(|r| r.price_change_percentage_24h.is_sign_positive() && !r.price_change_percentage_24h.is_zero())
        .cloned()
        .collect();
    gainers.sort_by(|a, b| b.price_change_percentage_24h.cmp(&a.price_change_percentage_24h));
    gainers.truncate(limit);

    let mut losers: Vec<MarketRecord> = records
        .iter()
        .filter(|r| r.price_change_percentage_24h.is_sign_negative() && !r.price_change_percentage_24h.is_zero())
        .cloned()
        .collect();
    losers.sort_by(|a, b| a.price_change_percentage_24h.cmp(&b.price_change_percentage_24h));
    losers.truncate(limit);

    Movers { gainers, losers }
}
