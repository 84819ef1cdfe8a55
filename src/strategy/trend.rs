use rust_decimal::Decimal;

use crate::market_data::types::MarketRecord;

/// Coarse market direction derived from the loaded records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    #[default]
    Neutral,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Neutral => "neutral",
        }
    }
}

/// Mean 24h change (percent) beyond which the market counts as moving.
const TREND_THRESHOLD: Decimal = Decimal::ONE;

/// Averages the 24h change over whatever is loaded right now, which may be
/// only the first pages of the market.
pub fn market_trend(records: &[MarketRecord]) -> Trend {
    if records.is_empty() {
        return Trend::Neutral;
    }

    let total: Decimal = records.iter().map(|r| r.price_change_percentage_24h).sum();
    let mean = total / Decimal::from(records.len());

    if mean > TREND_THRESHOLD {
        Trend::Up
    } else if mean < -TREND_THRESHOLD {
        Trend::Down
    } else {
        Trend::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::adapters::fixture::{page, record};

    #[test]
    fn empty_market_is_neutral() {
        assert_eq!(market_trend(&[]), Trend::Neutral);
    }

    #[test]
    fn thresholds() {
        assert_eq!(market_trend(&page("a", 4, 15)), Trend::Up);
        assert_eq!(market_trend(&page("a", 4, -20)), Trend::Down);
        assert_eq!(market_trend(&page("a", 4, 3)), Trend::Neutral);
    }

    #[test]
    fn exactly_one_percent_stays_neutral() {
        assert_eq!(market_trend(&page("a", 3, 10)), Trend::Neutral);
        assert_eq!(market_trend(&page("a", 3, -10)), Trend::Neutral);
    }

    #[test]
    fn uses_mean_not_majority() {
        // two small gainers and one heavy loser: mean is (0.5 + 0.5 - 6.0) / 3
        let records = vec![record("a", 5), record("b", 5), record("c", -60)];
        assert_eq!(market_trend(&records), Trend::Down);
    }
}
