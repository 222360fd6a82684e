use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use common::{Candle, SignalType};
use strategy::indicators::{compute, Indicator, IndicatorSpec};
use strategy::Strategy as _;
use strategy::{MeanReversionStrategy, ParamValue, Params, SignalInput, TrendFollowingStrategy};

fn to_candles(bars: &[(f64, f64, f64)]) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut close = 100.0;
    bars.iter()
        .enumerate()
        .map(|(i, &(change_pct, wick_pct, volume))| {
            let open = close;
            close = (close * (1.0 + change_pct / 100.0)).max(0.01);
            let high = open.max(close) * (1.0 + wick_pct / 100.0);
            let low = open.min(close) * (1.0 - wick_pct / 100.0);
            Candle {
                open_time: start + Duration::minutes(i as i64),
                open,
                high,
                low,
                close,
                volume,
                quote_volume: volume * close,
                trades: 1,
            }
        })
        .collect()
}

/// Random walk of `len` candles: per-bar % change, wick %, volume.
fn window(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<Candle>> {
    prop::collection::vec((-8.0f64..8.0, 0.0f64..3.0, 0.0f64..5_000.0), len)
        .prop_map(|bars| to_candles(&bars))
}

fn assert_consistent(kind: SignalType, strength: f64, confidence: f64) {
    assert!((0.0..=1.0).contains(&confidence), "confidence {confidence}");
    assert!((-1.0..=1.0).contains(&strength), "strength {strength}");
    match kind {
        SignalType::Buy => assert!(strength >= 0.0),
        SignalType::Sell => assert!(strength <= 0.0),
        SignalType::Hold | SignalType::Exit => assert_eq!(strength, 0.0),
    }
}

fn mean_reversion() -> MeanReversionStrategy {
    let params = Params::from([("lookback".to_string(), ParamValue::Int(20))]);
    MeanReversionStrategy::new("mr", &params).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(10_000))]

    /// Mean-reversion signals stay within bounds on arbitrary windows.
    #[test]
    fn mean_reversion_signals_are_bounded(candles in window(20..60)) {
        let mut s = mean_reversion();
        let last = candles.last().map(|c| c.close).unwrap_or(1.0);
        let signal = s
            .generate_signal(&SignalInput::new("FUZZ", last).with_history(&candles))
            .expect("window satisfies lookback");
        assert_consistent(signal.kind, signal.strength, signal.confidence);
        prop_assert!(signal.indicators.values().all(|v| v.is_finite()));
    }

    /// Trend-following signals stay within bounds on arbitrary windows.
    #[test]
    fn trend_following_signals_are_bounded(candles in window(100..140)) {
        let mut s = TrendFollowingStrategy::new("tf", &Params::new()).unwrap();
        let last = candles.last().map(|c| c.close).unwrap_or(1.0);
        let signal = s
            .generate_signal(&SignalInput::new("FUZZ", last).with_history(&candles))
            .expect("window satisfies lookback");
        assert_consistent(signal.kind, signal.strength, signal.confidence);
        prop_assert_eq!(s.get_status().signals_generated, 1);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1_000))]

    /// Windows below the minimum never produce a signal or touch state.
    #[test]
    fn short_windows_leave_state_untouched(candles in window(0..20)) {
        let mut mr = mean_reversion();
        let mut tf = TrendFollowingStrategy::new("tf", &Params::new()).unwrap();
        let input = SignalInput::new("FUZZ", 1.0).with_history(&candles);
        prop_assert!(mr.generate_signal(&input).is_none());
        prop_assert!(tf.generate_signal(&input).is_none());
        prop_assert_eq!(mr.get_status().signals_generated, 0);
        prop_assert!(tf.get_status().last_signal.is_none());
    }

    /// Computing twice gives bit-identical columns.
    #[test]
    fn indicators_are_pure(candles in window(1..80)) {
        let spec = IndicatorSpec::default()
            .with(Indicator::Bollinger { period: 20, std_dev: 2.0 })
            .with(Indicator::Rsi { period: 14 })
            .with(Indicator::Macd { fast: 12, slow: 26, signal: 9 })
            .with(Indicator::Dmi { period: 14 })
            .with(Indicator::Atr { period: 14 });
        let (a, b) = (compute(&candles, &spec), compute(&candles, &spec));
        for name in a.names() {
            let bits = |col: &[f64]| col.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
            prop_assert_eq!(bits(a.column(name).unwrap()), bits(b.column(name).unwrap()));
        }
    }

    /// Band width is never negative where it is defined.
    #[test]
    fn band_width_is_non_negative(candles in window(20..80)) {
        let spec = IndicatorSpec::default().with(Indicator::Bollinger { period: 20, std_dev: 2.0 });
        let frame = compute(&candles, &spec);
        for w in frame.column("bb_width").unwrap().iter().filter(|w| !w.is_nan()) {
            prop_assert!(*w >= 0.0);
        }
    }

    /// A non-decreasing close series saturates RSI at exactly 100.
    #[test]
    fn rsi_saturates_on_rising_closes(steps in prop::collection::vec(0.0f64..5.0, 15..40)) {
        let bars: Vec<(f64, f64, f64)> = steps.iter().map(|s| (*s, 0.5, 10.0)).collect();
        let candles = to_candles(&bars);
        let frame = compute(&candles, &IndicatorSpec::default().with(Indicator::Rsi { period: 14 }));
        prop_assert_eq!(frame.last("rsi"), Some(100.0));
    }
}
