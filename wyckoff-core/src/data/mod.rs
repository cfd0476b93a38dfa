//! Columnar bar data: canonical schema and DataFrame conversions.

pub mod frame;
pub mod schema;

pub use frame::{annotated_frame, bars_from_frame, FrameError};
pub use schema::{BarSchema, SchemaError};
