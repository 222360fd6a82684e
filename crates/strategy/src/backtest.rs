//! Walk-forward replay of one strategy over a candle series.
//!
//! Long-only, all-in: a positive-strength signal while flat buys with the
//! whole capital at that bar's close, a negative-strength signal while long
//! sells everything. An open position is closed at the final close.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use common::{Candle, Error, Result};

use crate::base::SignalInput;
use crate::Strategy;

/// Annualisation factor for the Sharpe ratio.
const PERIODS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub side: TradeSide,
    pub price: f64,
    pub quantity: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub symbol: String,
    pub strategy: String,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_return_pct: f64,
    pub total_trades: usize,
    /// Largest peak-to-trough fall of the equity curve, as a percentage ≤ 0.
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    /// Share of winning round trips, in percent.
    pub win_rate: f64,
    /// Gross profit / gross loss over round trips; `None` without losses.
    pub profit_factor: Option<f64>,
    pub trades: Vec<Trade>,
    /// Equity before the first bar, then after every replayed bar.
    pub equity_curve: Vec<f64>,
}

/// Replay `candles` through `strategy`. At step `i` the strategy sees
/// `candles[..i]` and the current price is `candles[i].close`.
pub fn run(
    strategy: &mut dyn Strategy,
    symbol: &str,
    candles: &[Candle],
    initial_capital: f64,
) -> Result<BacktestReport> {
    if !(initial_capital.is_finite() && initial_capital > 0.0) {
        return Err(Error::invalid_parameter(
            "initial_capital",
            format!("must be a positive number, got {initial_capital}"),
        ));
    }
    let Some(last) = candles.last() else {
        return Err(Error::MarketData(format!("no candles for {symbol}")));
    };

    info!(strategy = %strategy.name(), symbol = %symbol, candles = candles.len(), "Starting backtest");

    let mut capital = initial_capital;
    let mut position = 0.0;
    let mut trades = Vec::new();
    let mut equity_curve = Vec::with_capacity(candles.len());
    equity_curve.push(capital);

    for i in 1..candles.len() {
        let bar = &candles[i];
        let price = bar.close;
        let input = SignalInput::new(symbol, price)
            .with_history(&candles[..i])
            .at(bar.open_time);

        if let Some(signal) = strategy.generate_signal(&input) {
            if signal.strength > 0.0 && position == 0.0 && price > 0.0 {
                position = capital / price;
                capital = 0.0;
                trades.push(Trade {
                    side: TradeSide::Buy,
                    price,
                    quantity: position,
                    timestamp: bar.open_time,
                });
                debug!(price, quantity = position, "Backtest buy");
            } else if signal.strength < 0.0 && position > 0.0 {
                capital = position * price;
                trades.push(Trade {
                    side: TradeSide::Sell,
                    price,
                    quantity: position,
                    timestamp: bar.open_time,
                });
                debug!(price, quantity = position, "Backtest sell");
                position = 0.0;
            }
        }
        equity_curve.push(capital + position * price);
    }

    if position > 0.0 {
        capital = position * last.close;
        trades.push(Trade {
            side: TradeSide::Sell,
            price: last.close,
            quantity: position,
            timestamp: last.open_time,
        });
    }

    let (win_rate, profit_factor) = round_trip_stats(&trades);
    let report = BacktestReport {
        symbol: symbol.to_string(),
        strategy: strategy.name().to_string(),
        initial_capital,
        final_capital: capital,
        total_return_pct: (capital - initial_capital) / initial_capital * 100.0,
        total_trades: trades.len(),
        max_drawdown_pct: max_drawdown_pct(&equity_curve),
        sharpe_ratio: sharpe_ratio(&equity_curve),
        win_rate,
        profit_factor,
        trades,
        equity_curve,
    };

    info!(
        strategy = %report.strategy,
        symbol = %symbol,
        total_return_pct = report.total_return_pct,
        trades = report.total_trades,
        "Backtest complete"
    );
    Ok(report)
}

fn max_drawdown_pct(equity: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst: f64 = 0.0;
    for &e in equity {
        peak = peak.max(e);
        if peak > 0.0 {
            worst = worst.min((e - peak) / peak * 100.0);
        }
    }
    worst
}

fn sharpe_ratio(equity: &[f64]) -> f64 {
    let returns: Vec<f64> = equity
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = var.sqrt();
    if std > 0.0 && std.is_finite() {
        mean / std * PERIODS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}

/// (win rate %, profit factor) over consecutive buy/sell pairs.
fn round_trip_stats(trades: &[Trade]) -> (f64, Option<f64>) {
    let pnl: Vec<f64> = trades
        .chunks_exact(2)
        .filter(|pair| pair[0].side == TradeSide::Buy && pair[1].side == TradeSide::Sell)
        .map(|pair| (pair[1].price - pair[0].price) * pair[0].quantity)
        .collect();
    if pnl.is_empty() {
        return (0.0, None);
    }

    let wins = pnl.iter().filter(|p| **p > 0.0).count();
    let gross_profit: f64 = pnl.iter().filter(|p| **p > 0.0).sum();
    let gross_loss: f64 = -pnl.iter().filter(|p| **p < 0.0).sum::<f64>();
    let win_rate = wins as f64 / pnl.len() as f64 * 100.0;
    let profit_factor = (gross_loss > 0.0).then(|| gross_profit / gross_loss);
    (win_rate, profit_factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{candles, Scripted};
    use crate::{MeanReversionStrategy, Params};
    use common::SignalType;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn replays_round_trips() {
        let series = candles(&[100.0, 100.0, 110.0, 120.0, 90.0, 80.0, 100.0]);
        // window length n means the trade executes at close[n]
        let mut strategy = Scripted::at_length(&[
            (1, SignalType::Buy),
            (3, SignalType::Sell),
            (4, SignalType::Buy),
            (5, SignalType::Sell),
        ]);
        let report = run(&mut strategy, "BTCUSDT", &series, 10_000.0).unwrap();

        assert_eq!(report.total_trades, 4);
        assert_eq!(report.trades[0].side, TradeSide::Buy);
        assert!(close(report.trades[0].quantity, 100.0));
        assert!(close(report.final_capital, 12_000.0 / 90.0 * 80.0));
        assert!(close(report.total_return_pct, (report.final_capital / 10_000.0 - 1.0) * 100.0));
        assert_eq!(report.win_rate, 50.0);
        assert!(close(report.profit_factor.unwrap(), 2_000.0 / (12_000.0 - report.final_capital)));

        assert_eq!(report.equity_curve.len(), series.len());
        assert!(close(report.equity_curve[2], 11_000.0));
        assert!(close(report.max_drawdown_pct, (report.final_capital - 12_000.0) / 12_000.0 * 100.0));
        assert!(report.max_drawdown_pct < 0.0);
    }

    #[test]
    fn closes_open_position_at_last_close() {
        let series = candles(&[100.0, 100.0, 150.0]);
        let mut strategy = Scripted::at_length(&[(1, SignalType::Buy)]);
        let report = run(&mut strategy, "BTCUSDT", &series, 1_000.0).unwrap();

        assert_eq!(report.total_trades, 2);
        assert_eq!(report.trades[1].side, TradeSide::Sell);
        assert!(close(report.final_capital, 1_500.0));
        assert_eq!(report.win_rate, 100.0);
        assert_eq!(report.profit_factor, None);
        assert_eq!(report.max_drawdown_pct, 0.0);
    }

    #[test]
    fn long_only_ignores_sells_when_flat_and_zero_strength() {
        let series = candles(&[100.0, 90.0, 80.0, 70.0]);
        let mut strategy = Scripted::cycle(&[SignalType::Sell, SignalType::Exit, SignalType::Hold]);
        let report = run(&mut strategy, "BTCUSDT", &series, 1_000.0).unwrap();

        assert!(report.trades.is_empty());
        assert_eq!(report.final_capital, 1_000.0);
        assert_eq!(report.sharpe_ratio, 0.0);
        assert!(report.equity_curve.iter().all(|e| *e == 1_000.0));
    }

    #[test]
    fn rejects_bad_inputs() {
        let mut strategy = Scripted::cycle(&[SignalType::Hold]);
        assert!(matches!(
            run(&mut strategy, "BTCUSDT", &[], 1_000.0),
            Err(Error::MarketData(_))
        ));
        assert!(matches!(
            run(&mut strategy, "BTCUSDT", &candles(&[1.0, 2.0]), 0.0),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn short_series_with_a_real_strategy_is_flat() {
        let mut strategy = MeanReversionStrategy::new("mr", &Params::new()).unwrap();
        let report = run(&mut strategy, "BTCUSDT", &candles(&[100.0; 40]), 5_000.0).unwrap();
        assert_eq!(report.total_trades, 0);
        assert_eq!(report.total_return_pct, 0.0);
        assert_eq!(strategy.get_status().signals_generated, 0);
    }
}
