use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use common::{Candle, EngineState, MarketEvent, Signal};

use crate::base::{SignalInput, StrategyStatus};
use crate::config::StrategyFileConfig;
use crate::registry::StrategyRegistry;
use crate::Strategy;

struct Session {
    symbol: String,
    strategy: Box<dyn Strategy>,
}

/// Holds the active strategy instances and dispatches market events to them.
///
/// Every instance is driven only from the task that owns the runner.
pub struct SignalRunner {
    sessions: Vec<Session>,
    /// Per-symbol rolling window of closed candles, oldest first.
    history: HashMap<String, Vec<Candle>>,
    max_history: usize,
}

impl Default for SignalRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalRunner {
    pub const DEFAULT_MAX_HISTORY: usize = 1000;

    pub fn new() -> Self {
        Self::with_max_history(Self::DEFAULT_MAX_HISTORY)
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            sessions: Vec::new(),
            history: HashMap::new(),
            max_history: max_history.max(1),
        }
    }

    /// Build a runner from a strategy file. Entries the registry cannot build
    /// are skipped; the registry logs why.
    pub fn from_config(
        file_cfg: &StrategyFileConfig,
        registry: &mut StrategyRegistry,
        max_history: usize,
    ) -> Self {
        let mut runner = Self::with_max_history(max_history);
        for cfg in &file_cfg.strategies {
            if let Some(strategy) = registry.create_from_config(cfg) {
                runner.add(&cfg.symbol, strategy);
            }
        }
        runner
    }

    /// Bind a strategy instance to `symbol`. The history cap grows to what
    /// the strategy needs to reach full operation.
    pub fn add(&mut self, symbol: &str, strategy: Box<dyn Strategy>) {
        info!(name = %strategy.name(), kind = %strategy.kind(), symbol = %symbol, "Registered strategy");
        let needed = strategy.required_history();
        if needed > self.max_history {
            info!(
                name = %strategy.name(),
                from = self.max_history,
                to = needed,
                "Raising candle history cap"
            );
            self.max_history = needed;
        }
        self.sessions.push(Session {
            symbol: symbol.to_string(),
            strategy,
        });
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Replace the stored history of `symbol` with the tail of `candles`.
    pub fn seed(&mut self, symbol: &str, candles: &[Candle]) {
        let start = candles.len().saturating_sub(self.max_history);
        self.history.insert(symbol.to_string(), candles[start..].to_vec());
        debug!(symbol = %symbol, candles = candles.len() - start, "Seeded candle history");
    }

    pub fn history(&self, symbol: &str) -> &[Candle] {
        self.history.get(symbol).map_or(&[], Vec::as_slice)
    }

    /// (symbol, status) of every registered instance.
    pub fn statuses(&self) -> Vec<(String, StrategyStatus)> {
        self.sessions
            .iter()
            .map(|s| (s.symbol.clone(), s.strategy.get_status()))
            .collect()
    }

    /// Process one market event. Returns the actionable signals (Buy, Sell,
    /// Exit) of every enabled strategy bound to the event's symbol.
    ///
    /// A closed candle that is not newer than the stored tail is rejected and
    /// nothing is evaluated.
    pub fn process(&mut self, event: &MarketEvent) -> Vec<Signal> {
        let history = self.history.entry(event.symbol.clone()).or_default();

        if event.is_candle_closed {
            if let Some(last) = history.last() {
                if event.candle.open_time <= last.open_time {
                    warn!(
                        symbol = %event.symbol,
                        open_time = %event.candle.open_time,
                        last = %last.open_time,
                        "Rejecting stale candle"
                    );
                    return Vec::new();
                }
            }
            history.push(event.candle.clone());
            if history.len() > self.max_history {
                let excess = history.len() - self.max_history;
                history.drain(..excess);
            }
        }

        let input = SignalInput::new(&event.symbol, event.price)
            .with_history(history.as_slice())
            .at(event.candle.open_time);

        self.sessions
            .iter_mut()
            .filter(|s| s.symbol == event.symbol && s.strategy.is_enabled())
            .filter_map(|s| s.strategy.generate_signal(&input))
            .filter(|signal| signal.kind.is_actionable())
            .collect()
    }

    /// Run the strategy dispatch loop.
    /// Reads from `market_rx`, pushes signals to `signal_tx`.
    /// Events are dropped unless the engine is running.
    pub async fn run(
        mut self,
        mut market_rx: broadcast::Receiver<MarketEvent>,
        signal_tx: mpsc::Sender<Signal>,
        engine_state: Arc<tokio::sync::RwLock<EngineState>>,
    ) {
        info!(strategies = self.sessions.len(), "SignalRunner running");
        loop {
            match market_rx.recv().await {
                Ok(event) => {
                    let state = *engine_state.read().await;
                    if state != EngineState::Running {
                        continue;
                    }

                    for signal in self.process(&event) {
                        if signal_tx.send(signal).await.is_err() {
                            warn!("Signal channel closed, stopping runner");
                            return;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(dropped = n, "SignalRunner lagged, dropped market events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Market channel closed, stopping runner");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{candle, t, Scripted};
    use common::SignalType;

    fn event(symbol: &str, i: i64, closed: bool) -> MarketEvent {
        MarketEvent {
            symbol: symbol.into(),
            price: 100.0 + i as f64,
            candle: candle(i, 100.0 + i as f64),
            is_candle_closed: closed,
        }
    }

    #[test]
    fn forwards_only_actionable_signals() {
        let mut runner = SignalRunner::new();
        runner.add(
            "BTCUSDT",
            Scripted::cycle(&[SignalType::Hold, SignalType::Buy, SignalType::Exit]).boxed(),
        );

        assert!(runner.process(&event("BTCUSDT", 0, true)).is_empty());
        let buy = runner.process(&event("BTCUSDT", 1, true));
        assert_eq!(buy.len(), 1);
        assert_eq!(buy[0].kind, SignalType::Buy);
        assert_eq!(buy[0].timestamp, t(1));
        assert_eq!(runner.process(&event("BTCUSDT", 2, true))[0].kind, SignalType::Exit);
    }

    #[test]
    fn rejects_stale_candles() {
        let mut runner = SignalRunner::new();
        runner.add("BTCUSDT", Scripted::cycle(&[SignalType::Buy]).boxed());

        assert_eq!(runner.process(&event("BTCUSDT", 5, true)).len(), 1);
        assert!(runner.process(&event("BTCUSDT", 5, true)).is_empty());
        assert!(runner.process(&event("BTCUSDT", 3, true)).is_empty());
        assert_eq!(runner.history("BTCUSDT").len(), 1);

        // an in-progress candle neither extends history nor is rejected
        assert_eq!(runner.process(&event("BTCUSDT", 5, false)).len(), 1);
        assert_eq!(runner.history("BTCUSDT").len(), 1);
    }

    #[test]
    fn routes_by_symbol_and_skips_disabled() {
        let mut runner = SignalRunner::new();
        runner.add("BTCUSDT", Scripted::cycle(&[SignalType::Buy]).boxed());
        runner.add("ETHUSDT", Scripted::cycle(&[SignalType::Sell]).boxed());
        runner.add("ETHUSDT", Scripted::cycle(&[SignalType::Buy]).disabled().boxed());

        let signals = runner.process(&event("ETHUSDT", 0, true));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].kind, SignalType::Sell);
        assert_eq!(signals[0].symbol, "ETHUSDT");
        assert!(runner.history("BTCUSDT").is_empty());

        let calls: Vec<u64> = runner.statuses().iter().map(|(_, s)| s.signals_generated).collect();
        assert_eq!(calls, [0, 1, 0]);
    }

    #[test]
    fn caps_history() {
        let mut runner = SignalRunner::with_max_history(3);
        for i in 0..10 {
            runner.process(&event("BTCUSDT", i, true));
        }
        let history = runner.history("BTCUSDT");
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].open_time, t(7));

        let seed: Vec<Candle> = (20..30).map(|i| candle(i, 1.0)).collect();
        runner.seed("X", &seed);
        assert_eq!(runner.history("X").len(), 3);
        assert_eq!(runner.history("X")[2].open_time, t(29));
    }

    #[test]
    fn cap_grows_to_fit_a_training_strategy() {
        let params = crate::params::Params::from([(
            "n_estimators".to_string(),
            crate::params::ParamValue::Int(5),
        )]);
        let ml = crate::MlStrategy::new("ml", &params).unwrap();
        let needed = ml.required_history();
        assert!(needed > SignalRunner::DEFAULT_MAX_HISTORY);

        let mut runner = SignalRunner::new();
        runner.add("BTCUSDT", Box::new(ml));
        for i in 0..1150 {
            let close = 100.0 + 10.0 * (i as f64 * 0.13).sin();
            runner.process(&MarketEvent {
                symbol: "BTCUSDT".into(),
                price: close,
                candle: candle(i, close),
                is_candle_closed: true,
            });
        }

        assert_eq!(runner.history("BTCUSDT").len(), needed);
        let (_, status) = &runner.statuses()[0];
        assert!(status.ready);
        assert!(status.signals_generated > 0);
    }

    #[test]
    fn builds_from_config() {
        let cfg = StrategyFileConfig::from_toml(
            r#"
            [[strategy]]
            type = "mean_reversion"
            name = "mr"
            symbol = "BTCUSDT"

            [[strategy]]
            type = "martingale"
            name = "nope"
            symbol = "BTCUSDT"
            "#,
        )
        .unwrap();
        let mut registry = StrategyRegistry::new();
        let runner = SignalRunner::from_config(&cfg, &mut registry, 500);
        assert_eq!(runner.len(), 1);
        assert!(registry.last_error().unwrap().contains("martingale"));
    }

    #[tokio::test]
    async fn run_loop_respects_engine_state() {
        let mut runner = SignalRunner::new();
        runner.add("BTCUSDT", Scripted::cycle(&[SignalType::Buy]).boxed());

        let (market_tx, market_rx) = broadcast::channel(16);
        let (signal_tx, mut signal_rx) = mpsc::channel(16);
        let state = Arc::new(tokio::sync::RwLock::new(EngineState::Paused));
        let handle = tokio::spawn(runner.run(market_rx, signal_tx, state.clone()));

        market_tx.send(event("BTCUSDT", 0, true)).unwrap();
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        *state.write().await = EngineState::Running;
        market_tx.send(event("BTCUSDT", 1, true)).unwrap();

        let signal = signal_rx.recv().await.unwrap();
        assert_eq!(signal.kind, SignalType::Buy);
        assert_eq!(signal.timestamp, t(1));

        drop(market_tx);
        handle.await.unwrap();
        assert!(signal_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn stops_when_signal_consumer_goes_away() {
        let mut runner = SignalRunner::new();
        runner.add("BTCUSDT", Scripted::cycle(&[SignalType::Sell]).boxed());

        let (market_tx, market_rx) = broadcast::channel(16);
        let (signal_tx, signal_rx) = mpsc::channel(1);
        drop(signal_rx);
        let state = Arc::new(tokio::sync::RwLock::new(EngineState::Running));
        let handle = tokio::spawn(runner.run(market_rx, signal_tx, state));

        market_tx.send(event("BTCUSDT", 0, true)).unwrap();
        handle.await.unwrap();
    }
}
