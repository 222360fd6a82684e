//! Feature matrix construction from an indicator frame.

use crate::indicators::{Indicator, IndicatorFrame, IndicatorSpec};

/// Lags of returns and volume offered as features.
pub const LAGS: [usize; 5] = [1, 2, 3, 5, 10];

/// Indicators computed for the ML feature set. Every column this produces
/// (plus the raw OHLCV columns) may be named in `feature_columns`.
pub fn feature_spec() -> IndicatorSpec {
    IndicatorSpec::default()
        .with(Indicator::Returns {
            volatility_period: 20,
        })
        .with(Indicator::Rsi { period: 14 })
        .with(Indicator::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        })
        .with(Indicator::Bollinger {
            period: 20,
            std_dev: 2.0,
        })
        .with(Indicator::VolumeRatio { period: 20 })
        .with(Indicator::PricePosition { period: 20 })
        .with(Indicator::Lags {
            lags: LAGS.to_vec(),
        })
}

/// Requested columns the frame actually provides, in request order.
pub fn known_columns(frame: &IndicatorFrame, requested: &[String]) -> Vec<String> {
    let mut known: Vec<String> = Vec::with_capacity(requested.len());
    for name in requested {
        if frame.column(name).is_some() && !known.contains(name) {
            known.push(name.clone());
        }
    }
    known
}

/// Labelled rows for supervised training, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    pub rows: Vec<Vec<f64>>,
    /// 1 when the close `horizon` bars later is strictly higher.
    pub labels: Vec<u8>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Chronological split: the last `test_fraction` of rows are held out.
    pub fn split(self, test_fraction: f64) -> (TrainingSet, TrainingSet) {
        let n = self.rows.len();
        let n_test = ((n as f64 * test_fraction).round() as usize)
            .max(1)
            .min(n.saturating_sub(1));
        let cut = n - n_test;

        let mut rows = self.rows;
        let mut labels = self.labels;
        let test = TrainingSet {
            rows: rows.split_off(cut),
            labels: labels.split_off(cut),
        };
        (TrainingSet { rows, labels }, test)
    }
}

/// Rows whose features are all defined and whose label is known.
///
/// Rows within `horizon` bars of the end have no future close and are
/// dropped rather than labelled.
pub fn training_set(frame: &IndicatorFrame, columns: &[String], horizon: usize) -> TrainingSet {
    let mut set = TrainingSet::default();
    let Some(close) = frame.column("close") else {
        return set;
    };

    for i in 0..frame.len().saturating_sub(horizon) {
        let (now, later) = (close[i], close[i + horizon]);
        if !(now.is_finite() && later.is_finite()) {
            continue;
        }
        if let Some(row) = row_at(frame, columns, i) {
            set.rows.push(row);
            set.labels.push(u8::from(later > now));
        }
    }
    set
}

/// Feature vector at `index`, or `None` if any feature is undefined there.
pub fn row_at(frame: &IndicatorFrame, columns: &[String], index: usize) -> Option<Vec<f64>> {
    columns
        .iter()
        .map(|name| frame.value_at(name, index))
        .collect()
}

/// Feature vector of the last candle.
pub fn latest_row(frame: &IndicatorFrame, columns: &[String]) -> Option<Vec<f64>> {
    frame
        .len()
        .checked_sub(1)
        .and_then(|i| row_at(frame, columns, i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::compute;
    use chrono::{Duration, TimeZone, Utc};
    use common::Candle;

    fn candles(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                open_time: start + Duration::minutes(i as i64),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 5.0 + (i % 3) as f64,
                quote_volume: 0.0,
                trades: 0,
            })
            .collect()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unknown_columns_are_skipped() {
        let frame = compute(&candles(&[1.0, 2.0, 3.0]), &feature_spec());
        let known = known_columns(&frame, &cols(&["close", "nope", "rsi", "close", "volume_lag_5"]));
        assert_eq!(known, cols(&["close", "rsi", "volume_lag_5"]));
    }

    #[test]
    fn labels_look_ahead_by_horizon_and_tail_is_dropped() {
        let closes = [1.0, 2.0, 1.5, 3.0, 2.0, 2.5];
        let frame = compute(&candles(&closes), &IndicatorSpec::default());
        let set = training_set(&frame, &cols(&["close", "volume"]), 2);
        // rows 0..4 have a close two bars ahead
        assert_eq!(set.len(), 4);
        assert_eq!(set.labels, vec![1, 1, 1, 0]);
        assert_eq!(set.rows[0], vec![1.0, 5.0]);
    }

    #[test]
    fn warmup_rows_are_dropped() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin()).collect();
        let frame = compute(&candles(&closes), &feature_spec());
        let set = training_set(&frame, &cols(&["close", "rsi", "macd"]), 5);
        // MACD line defined from index 25, rsi from 14; labels need i + 5 < 60
        assert_eq!(set.len(), 60 - 5 - 25);
        assert!(set.rows.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn split_is_chronological() {
        let set = TrainingSet {
            rows: (0..10).map(|i| vec![i as f64]).collect(),
            labels: vec![0; 10],
        };
        let (train, test) = set.split(0.2);
        assert_eq!(train.len(), 8);
        assert_eq!(test.rows, vec![vec![8.0], vec![9.0]]);
    }
}
