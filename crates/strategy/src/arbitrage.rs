//! Triangular arbitrage scanner over a map of pair prices.
//!
//! A pair key is the concatenation of its two assets (`"ETHBTC"`), and its
//! price is the amount of the second asset received per unit of the first.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbitrageConfig {
    /// Net profit (after slippage) an opportunity must exceed, in percent.
    pub min_profit_pct: f64,
    /// Slippage charged once per leg, in percent.
    pub slippage_pct: f64,
    /// Exchange fee charged on every leg, in percent.
    pub fee_pct: f64,
    pub triangles: Vec<[String; 3]>,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        let triangle = |a: &str, b: &str, c: &str| [a.to_string(), b.to_string(), c.to_string()];
        Self {
            min_profit_pct: 0.5,
            slippage_pct: 0.1,
            fee_pct: 0.1,
            triangles: vec![triangle("BTC", "USDT", "ETH"), triangle("ETH", "USDT", "BNB")],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub triangle: [String; 3],
    /// Pairs traded, in order.
    pub path: [String; 3],
    pub rates: [f64; 3],
    /// Round-trip gain after fees, in percent.
    pub profit_pct: f64,
    /// `profit_pct` minus three legs of slippage.
    pub net_profit_pct: f64,
}

/// Opportunities across every configured triangle, best first.
///
/// Each triangle `[a, b, c]` is checked forward (`ab`, `bc`, `ca`) and in
/// reverse (`ac`, `cb`, `ba`); a direction is skipped when any of its pairs
/// has no usable price.
pub fn find_opportunities(prices: &HashMap<String, f64>, config: &ArbitrageConfig) -> Vec<Opportunity> {
    let mut found: Vec<Opportunity> = config
        .triangles
        .iter()
        .flat_map(|[a, b, c]| {
            let forward = [format!("{a}{b}"), format!("{b}{c}"), format!("{c}{a}")];
            let reverse = [format!("{a}{c}"), format!("{c}{b}"), format!("{b}{a}")];
            [forward, reverse]
                .into_iter()
                .filter_map(|path| evaluate(prices, config, [a, b, c], path))
                .collect::<Vec<_>>()
        })
        .collect();

    found.sort_by(|x, y| y.net_profit_pct.total_cmp(&x.net_profit_pct));
    found
}

fn evaluate(
    prices: &HashMap<String, f64>,
    config: &ArbitrageConfig,
    triangle: [&String; 3],
    path: [String; 3],
) -> Option<Opportunity> {
    let mut rates = [0.0; 3];
    for (rate, pair) in rates.iter_mut().zip(&path) {
        *rate = prices.get(pair).copied().filter(|p| p.is_finite() && *p > 0.0)?;
    }

    let keep = 1.0 - config.fee_pct / 100.0;
    let final_amount = rates.iter().fold(1.0, |amount, rate| amount * rate * keep);
    let profit_pct = (final_amount - 1.0) * 100.0;
    let net_profit_pct = profit_pct - 3.0 * config.slippage_pct;

    if net_profit_pct <= config.min_profit_pct {
        return None;
    }
    debug!(path = ?path, net_profit_pct, "Arbitrage opportunity");
    Some(Opportunity {
        triangle: triangle.map(String::clone),
        path,
        rates,
        profit_pct,
        net_profit_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn finds_a_mispriced_triangle() {
        // 50_000 × (1 / 2_400) × 0.05 ≈ 1.0417 before fees
        let p = prices(&[("BTCUSDT", 50_000.0), ("USDTETH", 1.0 / 2_400.0), ("ETHBTC", 0.05)]);
        let found = find_opportunities(&p, &ArbitrageConfig::default());

        assert_eq!(found.len(), 1);
        let o = &found[0];
        assert_eq!(o.path, ["BTCUSDT", "USDTETH", "ETHBTC"].map(String::from));
        let expected = (50_000.0 / 2_400.0 * 0.05 * 0.999f64.powi(3) - 1.0) * 100.0;
        assert!((o.profit_pct - expected).abs() < 1e-9);
        assert!((o.net_profit_pct - (expected - 0.3)).abs() < 1e-9);
    }

    #[test]
    fn fair_prices_yield_nothing() {
        let p = prices(&[("BTCUSDT", 48_000.0), ("USDTETH", 1.0 / 2_400.0), ("ETHBTC", 0.05)]);
        assert!(find_opportunities(&p, &ArbitrageConfig::default()).is_empty());
    }

    #[test]
    fn checks_the_reverse_path_and_sorts() {
        let p = prices(&[
            // reverse of [BTC, USDT, ETH]: BTCETH, ETHUSDT, USDTBTC ≈ 1.02
            ("BTCETH", 20.0),
            ("ETHUSDT", 2_550.0),
            ("USDTBTC", 1.0 / 50_000.0),
            // forward of [ETH, USDT, BNB]: ETHUSDT, USDTBNB, BNBETH ≈ 1.0625
            ("USDTBNB", 1.0 / 600.0),
            ("BNBETH", 0.25),
        ]);
        let found = find_opportunities(&p, &ArbitrageConfig::default());

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].triangle, ["ETH", "USDT", "BNB"].map(String::from));
        assert_eq!(found[1].path, ["BTCETH", "ETHUSDT", "USDTBTC"].map(String::from));
        assert!(found[0].net_profit_pct > found[1].net_profit_pct);
    }

    #[test]
    fn ignores_missing_and_invalid_prices() {
        let p = prices(&[("BTCUSDT", 50_000.0), ("USDTETH", f64::NAN), ("ETHBTC", 0.05)]);
        assert!(find_opportunities(&p, &ArbitrageConfig::default()).is_empty());
        assert!(find_opportunities(&HashMap::new(), &ArbitrageConfig::default()).is_empty());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: ArbitrageConfig = toml::from_str("min_profit_pct = 1.0").unwrap();
        assert_eq!(cfg.min_profit_pct, 1.0);
        assert_eq!(cfg.triangles.len(), 2);
    }
}
