//! Domain types for the Wyckoff structure engine.

pub mod bar;
pub mod event;
pub mod phase;
pub mod range;

pub use bar::{Bar, BarError, BarSeries};
pub use event::{Event, EventKind, MarketContext, SpringQuality};
pub use phase::Phase;
pub use range::TradingRange;
