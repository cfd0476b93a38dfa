//! Trading range: the support/resistance box a structure builds cause in.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::event::MarketContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingRange {
    pub support: f64,
    pub resistance: f64,
    /// Timestamp of the climax that started the structure.
    pub start_timestamp: NaiveDateTime,
    /// Set when the context resets; `None` while the range is open.
    pub end_timestamp: Option<NaiveDateTime>,
    pub context: MarketContext,
}

impl TradingRange {
    /// Open a range. Returns `None` unless `support < resistance`.
    pub fn open(
        support: f64,
        resistance: f64,
        start_timestamp: NaiveDateTime,
        context: MarketContext,
    ) -> Option<Self> {
        (support < resistance).then_some(Self {
            support,
            resistance,
            start_timestamp,
            end_timestamp: None,
            context,
        })
    }

    pub fn is_open(&self) -> bool {
        self.end_timestamp.is_none()
    }

    pub fn close(&mut self, at: NaiveDateTime) {
        self.end_timestamp = Some(at);
    }

    pub fn height(&self) -> f64 {
        self.resistance - self.support
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.support && price <= self.resistance
    }
}
