//! Property tests for payload encoding.
//!
//! Uses proptest to verify the encoder's core guarantee: for any history,
//! decode(encode(H)) == H with values, schema, and row order preserved.

use barsync_core::bar::Bar;
use barsync_core::encode::{decode, encode};
use chrono::NaiveDate;
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (0.01..10_000.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

/// Chronological daily histories with sane OHLC ordering.
fn arb_history(max_len: usize) -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec(
        (
            1i64..20,
            arb_price(),
            arb_price(),
            arb_price(),
            arb_price(),
            0u64..10_000_000,
            (0.0..1e9_f64).prop_map(|a| (a * 100.0).round() / 100.0),
        ),
        0..max_len,
    )
    .prop_map(|rows| {
        let mut date = NaiveDate::from_ymd_opt(2008, 1, 1).unwrap();
        rows.into_iter()
            .map(|(gap, p1, p2, p3, p4, volume, amount)| {
                date += chrono::Duration::days(gap);
                let mut prices = [p1, p2, p3, p4];
                prices.sort_by(f64::total_cmp);
                Bar {
                    date,
                    open: prices[1],
                    high: prices[3],
                    low: prices[0],
                    close: prices[2],
                    volume,
                    amount,
                }
            })
            .collect()
    })
}

// ── Round-trip fidelity ──────────────────────────────────────────────

proptest! {
    /// decode(encode(H)) reproduces H exactly, empty histories included.
    #[test]
    fn round_trip_preserves_history(history in arb_history(60)) {
        let payload = encode(&history).unwrap();
        let decoded = decode(payload.bytes()).unwrap();
        prop_assert_eq!(decoded, history);
    }

    /// The payload's row count always matches the input length.
    #[test]
    fn encoded_row_count_matches_input(history in arb_history(60)) {
        let payload = encode(&history).unwrap();
        prop_assert_eq!(payload.rows(), history.len());
        prop_assert_eq!(payload.is_empty(), history.is_empty());
    }

    /// Row order is preserved verbatim, not normalized: a reversed
    /// history comes back reversed.
    #[test]
    fn round_trip_preserves_row_order(history in arb_history(30)) {
        let mut reversed = history;
        reversed.reverse();
        let decoded = decode(encode(&reversed).unwrap().bytes()).unwrap();
        prop_assert_eq!(decoded, reversed);
    }
}
