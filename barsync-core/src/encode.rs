//! Columnar payload encoding.
//!
//! A history is shipped over the wire as an in-memory Parquet blob with
//! the fixed schema `date, open, high, low, close, volume, amount`.
//! Encoding is lossless: `decode(encode(bars))` reproduces the input
//! bars exactly, including row order. A zero-row history encodes to a
//! valid payload carrying schema only.

use crate::bar::Bar;
use chrono::NaiveDate;
use polars::prelude::*;
use std::io::Cursor;
use thiserror::Error;

/// Errors from payload encoding or decoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("dataframe: {0}")]
    Frame(String),
    #[error("parquet: {0}")]
    Parquet(String),
    #[error("schema: {0}")]
    Schema(String),
}

/// An encoded history payload.
///
/// The row count is captured at encode time so emptiness checks do not
/// require re-parsing the blob.
#[derive(Debug, Clone)]
pub struct EncodedHistory {
    bytes: Vec<u8>,
    rows: usize,
}

impl EncodedHistory {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// True if the payload carries no bar rows (schema only).
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

/// Encode a history into a Parquet payload.
pub fn encode(bars: &[Bar]) -> Result<EncodedHistory, EncodeError> {
    let mut df = history_to_dataframe(bars)?;
    let mut bytes = Vec::new();
    ParquetWriter::new(&mut bytes)
        .finish(&mut df)
        .map_err(|e| EncodeError::Parquet(format!("write: {e}")))?;
    Ok(EncodedHistory {
        bytes,
        rows: bars.len(),
    })
}

/// Decode a Parquet payload back into bars.
///
/// Validates the expected column set before conversion; a zero-row
/// payload is valid and decodes to an empty history.
pub fn decode(bytes: &[u8]) -> Result<Vec<Bar>, EncodeError> {
    let df = ParquetReader::new(Cursor::new(bytes))
        .finish()
        .map_err(|e| EncodeError::Parquet(format!("read: {e}")))?;

    for col_name in EXPECTED_COLUMNS {
        if df.column(col_name).is_err() {
            return Err(EncodeError::Schema(format!("missing column '{col_name}'")));
        }
    }

    dataframe_to_history(&df)
}

const EXPECTED_COLUMNS: [&str; 7] = ["date", "open", "high", "low", "close", "volume", "amount"];

// ── DataFrame conversion helpers ────────────────────────────────────

fn history_to_dataframe(bars: &[Bar]) -> Result<DataFrame, EncodeError> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let dates: Vec<i32> = bars
        .iter()
        .map(|b| (b.date - epoch).num_days() as i32)
        .collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();
    let amounts: Vec<f64> = bars.iter().map(|b| b.amount).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| EncodeError::Frame(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
        Column::new("amount".into(), amounts),
    ])
    .map_err(|e| EncodeError::Frame(format!("dataframe creation: {e}")))
}

fn dataframe_to_history(df: &DataFrame) -> Result<Vec<Bar>, EncodeError> {
    let map_err = |e: PolarsError| EncodeError::Parquet(format!("column read: {e}"));

    let date_ca = df
        .column("date")
        .map_err(map_err)?
        .date()
        .map_err(|e| EncodeError::Schema(format!("date column type: {e}")))?;
    let open_ca = df
        .column("open")
        .map_err(map_err)?
        .f64()
        .map_err(|e| EncodeError::Schema(format!("open column type: {e}")))?;
    let high_ca = df
        .column("high")
        .map_err(map_err)?
        .f64()
        .map_err(|e| EncodeError::Schema(format!("high column type: {e}")))?;
    let low_ca = df
        .column("low")
        .map_err(map_err)?
        .f64()
        .map_err(|e| EncodeError::Schema(format!("low column type: {e}")))?;
    let close_ca = df
        .column("close")
        .map_err(map_err)?
        .f64()
        .map_err(|e| EncodeError::Schema(format!("close column type: {e}")))?;
    let vol_ca = df
        .column("volume")
        .map_err(map_err)?
        .u64()
        .map_err(|e| EncodeError::Schema(format!("volume column type: {e}")))?;
    let amount_ca = df
        .column("amount")
        .map_err(map_err)?
        .f64()
        .map_err(|e| EncodeError::Schema(format!("amount column type: {e}")))?;

    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let n = df.height();
    let mut bars = Vec::with_capacity(n);

    for i in 0..n {
        let date_days = date_ca
            .get(i)
            .ok_or_else(|| EncodeError::Parquet(format!("null date at row {i}")))?;
        let date = epoch + chrono::Duration::days(date_days as i64);

        bars.push(Bar {
            date,
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(0),
            amount: amount_ca.get(i).unwrap_or(f64::NAN),
        });
    }

    Ok(bars)
}
