use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

/// One asset snapshot as returned by the markets endpoint.
///
/// Records are never edited in place: a refresh replaces the whole
/// collection and load-more appends new records after the existing ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(with = "decimal_or_zero", default)]
    pub current_price: Decimal,
    #[serde(with = "decimal_or_zero", default)]
    pub price_change_percentage_24h: Decimal,
    #[serde(with = "decimal_or_zero", default)]
    pub market_cap: Decimal,
    #[serde(with = "decimal_or_zero", default)]
    pub total_volume: Decimal,
}

/// One decoded response page.
///
/// `returned` counts the entries the provider sent, including ones that
/// failed to decode, so a page with a bad entry still reads as full.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketPage {
    pub records: Vec<MarketRecord>,
    pub returned: usize,
}

impl From<Vec<MarketRecord>> for MarketPage {
    fn from(records: Vec<MarketRecord>) -> Self {
        let returned = records.len();
        Self { records, returned }
    }
}

/// Why a fetch was requested. Decides throttling and how the page merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMode {
    Initial,
    Refresh,
    LoadMore,
}

impl FetchMode {
    /// Forced fetches skip the minimum-interval check.
    pub fn is_forced(self) -> bool {
        matches!(self, FetchMode::Refresh)
    }

    /// Initial and refresh both reload page 1 and replace the records.
    pub fn is_full_reload(self) -> bool {
        !matches!(self, FetchMode::LoadMore)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FetchMode::Initial => "initial",
            FetchMode::Refresh => "refresh",
            FetchMode::LoadMore => "load_more",
        }
    }
}

/// The provider sends plain JSON numbers and occasionally `null` for fields
/// it has no value for. Missing values count as zero; finite values outside
/// the `Decimal` range saturate instead of collapsing to zero.
mod decimal_or_zero {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.to_f64().unwrap_or_default())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let raw = Option::<f64>::deserialize(deserializer)?;
        Ok(raw.map(from_f64_saturating).unwrap_or_default())
    }

    pub(super) fn from_f64_saturating(raw: f64) -> Decimal {
        if let Some(value) = Decimal::from_f64(raw) {
            return value;
        }
        if !raw.is_finite() {
            return Decimal::ZERO;
        }

        warn!(value = raw, "market value out of decimal range, saturating");
        if raw.is_sign_negative() { Decimal::MIN } else { Decimal::MAX }
    }
}
