mod source;

use std::collections::BTreeMap;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{Candle, Config, EngineState, Error, MarketDataSource, MarketEvent, Result};
use strategy::backtest;
use strategy::{SignalRunner, Strategy as _, StrategyFileConfig, StrategyRegistry};

use source::FileSource;

#[tokio::main]
async fn main() -> ExitCode {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "backtest".to_string());
    let outcome = match command.as_str() {
        "list" => list(),
        "backtest" => run_backtests().await,
        "replay" => replay().await,
        other => Err(Error::Other(format!(
            "unknown command '{other}' (expected list, backtest or replay)"
        ))),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(command = %command, error = %e, "signalctl failed");
            ExitCode::FAILURE
        }
    }
}

fn list() -> Result<()> {
    let registry = StrategyRegistry::new();
    println!("{}", serde_json::to_string_pretty(registry.list_available())?);
    Ok(())
}

/// Config, strategy file and candle source shared by the data commands.
fn setup() -> Result<(Config, StrategyFileConfig, FileSource)> {
    let cfg = Config::from_env()?;
    let strategies = StrategyFileConfig::load(&cfg.strategy_config_path)?;
    info!(
        strategies = strategies.strategies.len(),
        path = %cfg.strategy_config_path.display(),
        "Loaded strategy config"
    );
    let source = FileSource::new(&cfg.candles_dir);
    Ok((cfg, strategies, source))
}

async fn run_backtests() -> Result<()> {
    let (cfg, file, source) = setup()?;
    let mut registry = StrategyRegistry::new();

    for entry in &file.strategies {
        let Some(mut strategy) = registry.create_from_config(entry) else {
            warn!(name = %entry.name, "Strategy unavailable, skipping");
            continue;
        };
        let candles = match source.candles(&entry.symbol, usize::MAX).await {
            Ok(candles) => candles,
            Err(e) => {
                warn!(symbol = %entry.symbol, error = %e, "No market data, skipping");
                continue;
            }
        };
        if candles.len() <= strategy.min_history() {
            warn!(
                name = %entry.name,
                candles = candles.len(),
                needed = strategy.min_history() + 1,
                "Not enough data yet"
            );
            continue;
        }

        let report = backtest::run(strategy.as_mut(), &entry.symbol, &candles, cfg.initial_capital)?;
        info!(
            name = %entry.name,
            symbol = %entry.symbol,
            final_capital = report.final_capital,
            total_return_pct = report.total_return_pct,
            max_drawdown_pct = report.max_drawdown_pct,
            sharpe = report.sharpe_ratio,
            win_rate = report.win_rate,
            trades = report.total_trades,
            "Backtest report"
        );
    }
    Ok(())
}

async fn replay() -> Result<()> {
    let (cfg, file, source) = setup()?;
    let mut registry = StrategyRegistry::new();
    let runner = SignalRunner::from_config(&file, &mut registry, cfg.max_history);
    if runner.is_empty() {
        warn!("No strategy could be built, nothing to replay");
        return Ok(());
    }

    // Merge every symbol's candles into one time-ordered stream.
    let mut by_symbol: BTreeMap<&str, Vec<Candle>> = BTreeMap::new();
    for entry in &file.strategies {
        if by_symbol.contains_key(entry.symbol.as_str()) {
            continue;
        }
        match source.candles(&entry.symbol, usize::MAX).await {
            Ok(candles) => {
                by_symbol.insert(&entry.symbol, candles);
            }
            Err(e) => warn!(symbol = %entry.symbol, error = %e, "No market data, skipping"),
        }
    }
    let mut events: Vec<MarketEvent> = by_symbol
        .into_iter()
        .flat_map(|(symbol, candles)| {
            candles.into_iter().map(move |candle| MarketEvent {
                symbol: symbol.to_string(),
                price: candle.close,
                candle,
                is_candle_closed: true,
            })
        })
        .collect();
    events.sort_by_key(|e| e.candle.open_time);

    let (market_tx, market_rx) = broadcast::channel(events.len().max(1));
    let (signal_tx, mut signal_rx) = mpsc::channel(128);
    let engine_state = Arc::new(RwLock::new(EngineState::Running));
    let runner_handle = tokio::spawn(runner.run(market_rx, signal_tx, engine_state));

    info!(events = events.len(), "Replaying market events");
    for event in events {
        if market_tx.send(event).is_err() {
            break;
        }
    }
    drop(market_tx);

    let mut emitted = 0usize;
    while let Some(signal) = signal_rx.recv().await {
        emitted += 1;
        info!(
            symbol = %signal.symbol,
            kind = %signal.kind,
            strength = signal.strength,
            confidence = signal.confidence,
            price = signal.price,
            at = %signal.timestamp,
            rationale = %signal.rationale,
            "Signal"
        );
    }
    runner_handle
        .await
        .map_err(|e| Error::Other(format!("runner task failed: {e}")))?;
    info!(signals = emitted, "Replay complete");
    Ok(())
}
