use polars::prelude::*;

/// Canonical OHLCV frame layout consumed by the engine.
pub struct BarSchema;

impl BarSchema {
    pub const TIMESTAMP: &'static str = "timestamp";
    pub const PRICE_COLUMNS: [&'static str; 5] = ["open", "high", "low", "close", "volume"];

    /// Get the canonical bar schema
    pub fn schema() -> Schema {
        let mut fields = vec![Field::new(
            Self::TIMESTAMP.into(),
            DataType::Datetime(TimeUnit::Milliseconds, None),
        )];
        fields.extend(
            Self::PRICE_COLUMNS
                .iter()
                .map(|name| Field::new((*name).into(), DataType::Float64)),
        );
        Schema::from_iter(fields)
    }

    /// Every canonical column is present; types are not checked.
    pub fn require_columns(df: &DataFrame) -> Result<(), SchemaError> {
        let actual = df.schema();
        for field in Self::schema().iter_fields() {
            if !actual.contains(field.name()) {
                return Err(SchemaError::MissingColumn(field.name().to_string()));
            }
        }
        Ok(())
    }

    /// Strict check: every canonical column is present with its exact type.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        Self::require_columns(df)?;

        let actual = df.schema();
        for field in Self::schema().iter_fields() {
            let actual_dtype = actual
                .get(field.name())
                .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;
            if actual_dtype != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual_dtype.clone(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}
