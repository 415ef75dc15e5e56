//! The strategic asset allocation model.
//!
//! Macro conditions (growth, inflation, rates, volatility) drive the
//! performance of three asset classes. The investor picks one allocation
//! knowing only their own risk tolerance; the portfolio outcome follows from
//! the asset outcomes and the allocation, and the investor's utility depends
//! on the outcome and their risk tolerance.
//!
//! Every table is built the way a model author writes it: a default row
//! replicated with `fill_uniform`, then `set_slice` overrides from broad
//! (one parent fixed) to narrow (all parents fixed). Later slices win.

use serde::Serialize;

use sa_common::Result;

use super::diagram::InfluenceDiagram;

pub const MODEL_NAME: &str = "strategic_asset_allocation";

pub const GDP_TREND: &str = "GDP_Trend";
pub const INFLATION_ENV: &str = "Inflation_Env";
pub const INTEREST_RATE: &str = "Interest_Rate";
pub const MARKET_VOL: &str = "Market_Vol";
pub const STOCK_PERF: &str = "Stock_Perf";
pub const BOND_PERF: &str = "Bond_Perf";
pub const CRYPTO_PERF: &str = "Crypto_Perf";
pub const RISK_TOL: &str = "Risk_Tol";
pub const INVEST_IN: &str = "Invest_In";
pub const PORTFOLIO_OUT: &str = "Portfolio_Out";
pub const UTILITY: &str = "Utility";

/// Shared ladder of the performance variables, worst first.
pub const PERFORMANCE: [&str; 5] = [
    "Strong_Loss",
    "Minor_Loss",
    "Neutral",
    "Minor_Gain",
    "Strong_Gain",
];

/// Score of each performance label, aligned with [`PERFORMANCE`].
const SCORES: [f64; 5] = [-2.0, -1.0, 0.0, 1.0, 2.0];

/// Allocation weights (stock, bond, crypto, cash) per investment choice.
const ALLOCATIONS: [(&str, [f64; 4]); 4] = [
    ("Stocks", [0.7, 0.2, 0.1, 0.0]),
    ("Bonds", [0.2, 0.7, 0.1, 0.0]),
    ("Crypto", [0.2, 0.1, 0.7, 0.0]),
    ("Cash", [0.0, 0.0, 0.0, 1.0]),
];

/// Outcome of the cash share: flat with a little noise.
const CASH_OUTCOME: [f64; 5] = [0.0, 0.05, 0.90, 0.05, 0.0];

/// A named set of observations run as one independent query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub evidence: Vec<(&'static str, &'static str)>,
}

/// The built-in macro scenarios.
pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "Stagflation",
            description: "Stalled growth with high inflation, moderate investor",
            evidence: vec![
                (GDP_TREND, "Stagnant"),
                (INFLATION_ENV, "High"),
                (RISK_TOL, "Moderate"),
            ],
        },
        Scenario {
            name: "Goldilocks",
            description: "Strong growth with low inflation, moderate investor",
            evidence: vec![
                (GDP_TREND, "Strong"),
                (INFLATION_ENV, "Low"),
                (RISK_TOL, "Moderate"),
            ],
        },
        Scenario {
            name: "Deflationary_Bust",
            description: "Recession with falling prices, conservative investor",
            evidence: vec![
                (GDP_TREND, "Recession"),
                (INFLATION_ENV, "Deflationary"),
                (RISK_TOL, "Conservative"),
            ],
        },
    ]
}

/// Look up a built-in scenario by name, ignoring case.
pub fn scenario(name: &str) -> Option<Scenario> {
    scenarios()
        .into_iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
}

/// Build the complete, populated allocation diagram.
pub fn build_allocation_model() -> Result<InfluenceDiagram> {
    let mut d = InfluenceDiagram::new(MODEL_NAME);

    d.add_chance(GDP_TREND, "GDP Trend", ["Recession", "Stagnant", "Moderate", "Strong"])?;
    d.add_chance(INFLATION_ENV, "Inflation Environment", ["Deflationary", "Low", "High"])?;
    d.add_chance(INTEREST_RATE, "Interest Rate Trajectory", ["Cutting", "Holding", "Hiking"])?;
    d.add_chance(MARKET_VOL, "Market Volatility", ["Low", "Normal", "High"])?;
    d.add_chance(STOCK_PERF, "Stock Performance", PERFORMANCE)?;
    d.add_chance(BOND_PERF, "Bond Performance", PERFORMANCE)?;
    d.add_chance(CRYPTO_PERF, "Crypto Performance", PERFORMANCE)?;
    d.add_chance(RISK_TOL, "Investor Risk Tolerance", ["Conservative", "Moderate", "Aggressive"])?;
    d.add_decision(INVEST_IN, "Investment Choice", ALLOCATIONS.map(|(name, _)| name))?;
    d.add_chance(PORTFOLIO_OUT, "Portfolio Outcome", PERFORMANCE)?;
    d.add_utility(UTILITY, "Investor Utility")?;

    d.add_arc(INFLATION_ENV, INTEREST_RATE)?;
    for parent in [GDP_TREND, INFLATION_ENV, INTEREST_RATE, MARKET_VOL] {
        d.add_arc(parent, STOCK_PERF)?;
    }
    for child in [BOND_PERF, CRYPTO_PERF] {
        for parent in [INFLATION_ENV, INTEREST_RATE, MARKET_VOL] {
            d.add_arc(parent, child)?;
        }
    }
    for parent in [STOCK_PERF, BOND_PERF, CRYPTO_PERF, INVEST_IN] {
        d.add_arc(parent, PORTFOLIO_OUT)?;
    }
    d.add_arc(RISK_TOL, INVEST_IN)?;
    d.add_arc(PORTFOLIO_OUT, UTILITY)?;
    d.add_arc(RISK_TOL, UTILITY)?;

    d.allocate_tables()?;
    populate_macro(&mut d)?;
    populate_assets(&mut d)?;
    populate_portfolio(&mut d)?;
    populate_utility(&mut d)?;

    tracing::debug!(
        event = crate::logging::event_names::MODEL_BUILT,
        model = MODEL_NAME,
        nodes = d.nodes().len(),
        "allocation model built"
    );
    Ok(d)
}

fn populate_macro(d: &mut InfluenceDiagram) -> Result<()> {
    d.table_mut(GDP_TREND)?.fill_uniform(&[0.10, 0.15, 0.60, 0.15])?;
    d.table_mut(INFLATION_ENV)?.fill_uniform(&[0.05, 0.50, 0.45])?;
    d.table_mut(MARKET_VOL)?.fill_uniform(&[0.30, 0.50, 0.20])?;
    d.table_mut(RISK_TOL)?.fill_uniform(&[0.33, 0.34, 0.33])?;

    let rates = d.table_mut(INTEREST_RATE)?;
    rates.set_slice([(INFLATION_ENV, "Deflationary")], &[0.70, 0.25, 0.05])?;
    rates.set_slice([(INFLATION_ENV, "Low")], &[0.30, 0.50, 0.20])?;
    rates.set_slice([(INFLATION_ENV, "High")], &[0.05, 0.15, 0.80])?;
    Ok(())
}

fn populate_assets(d: &mut InfluenceDiagram) -> Result<()> {
    let stocks = d.table_mut(STOCK_PERF)?;
    stocks.fill_uniform(&[0.15, 0.20, 0.30, 0.25, 0.10])?;
    stocks.set_slice([(GDP_TREND, "Recession")], &[0.30, 0.30, 0.25, 0.10, 0.05])?;
    stocks.set_slice([(GDP_TREND, "Stagnant")], &[0.25, 0.30, 0.25, 0.15, 0.05])?;
    stocks.set_slice([(GDP_TREND, "Strong")], &[0.05, 0.10, 0.25, 0.35, 0.25])?;
    stocks.set_slice(
        [(GDP_TREND, "Strong"), (INFLATION_ENV, "Low")],
        &[0.03, 0.07, 0.20, 0.40, 0.30],
    )?;
    stocks.set_slice(
        [(GDP_TREND, "Stagnant"), (INFLATION_ENV, "High")],
        &[0.35, 0.30, 0.20, 0.10, 0.05],
    )?;
    stocks.set_slice(
        [
            (GDP_TREND, "Strong"),
            (INFLATION_ENV, "Low"),
            (INTEREST_RATE, "Holding"),
            (MARKET_VOL, "Low"),
        ],
        &[0.01, 0.04, 0.10, 0.35, 0.50],
    )?;
    stocks.set_slice(
        [
            (GDP_TREND, "Recession"),
            (INFLATION_ENV, "High"),
            (INTEREST_RATE, "Hiking"),
            (MARKET_VOL, "High"),
        ],
        &[0.50, 0.30, 0.12, 0.06, 0.02],
    )?;

    let bonds = d.table_mut(BOND_PERF)?;
    bonds.fill_uniform(&[0.15, 0.20, 0.30, 0.25, 0.10])?;
    bonds.set_slice([(INFLATION_ENV, "High")], &[0.20, 0.30, 0.30, 0.15, 0.05])?;
    bonds.set_slice([(INTEREST_RATE, "Cutting")], &[0.05, 0.10, 0.30, 0.35, 0.20])?;
    bonds.set_slice(
        [
            (INFLATION_ENV, "Low"),
            (INTEREST_RATE, "Cutting"),
            (MARKET_VOL, "Low"),
        ],
        &[0.02, 0.08, 0.20, 0.50, 0.20],
    )?;
    bonds.set_slice(
        [
            (INFLATION_ENV, "High"),
            (INTEREST_RATE, "Hiking"),
            (MARKET_VOL, "High"),
        ],
        &[0.60, 0.25, 0.10, 0.04, 0.01],
    )?;

    let crypto = d.table_mut(CRYPTO_PERF)?;
    crypto.fill_uniform(&[0.20, 0.25, 0.30, 0.15, 0.10])?;
    crypto.set_slice([(MARKET_VOL, "High")], &[0.35, 0.30, 0.20, 0.10, 0.05])?;
    crypto.set_slice([(INFLATION_ENV, "High")], &[0.30, 0.30, 0.20, 0.12, 0.08])?;
    crypto.set_slice(
        [
            (INFLATION_ENV, "High"),
            (INTEREST_RATE, "Hiking"),
            (MARKET_VOL, "High"),
        ],
        &[0.45, 0.30, 0.15, 0.08, 0.02],
    )?;
    crypto.set_slice(
        [
            (INFLATION_ENV, "Low"),
            (INTEREST_RATE, "Cutting"),
            (MARKET_VOL, "Low"),
        ],
        &[0.05, 0.10, 0.20, 0.30, 0.35],
    )?;
    Ok(())
}

/// Outcome distribution of the risky share given its weighted score.
fn risky_outcome(score: f64) -> [f64; 5] {
    if score > 1.25 {
        [0.0, 0.0, 0.1, 0.3, 0.6]
    } else if score > 0.5 {
        [0.0, 0.1, 0.3, 0.5, 0.1]
    } else if score > -0.5 {
        [0.1, 0.2, 0.4, 0.2, 0.1]
    } else if score > -1.25 {
        [0.1, 0.5, 0.3, 0.1, 0.0]
    } else {
        [0.6, 0.3, 0.1, 0.0, 0.0]
    }
}

/// Portfolio outcome for asset outcome indices and allocation weights.
fn portfolio_outcome(stock: usize, bond: usize, crypto: usize, weights: [f64; 4]) -> [f64; 5] {
    let [ws, wb, wc, cash] = weights;
    let risky = ws + wb + wc;
    if risky == 0.0 {
        return CASH_OUTCOME;
    }
    let score = (SCORES[stock] * ws + SCORES[bond] * wb + SCORES[crypto] * wc) / risky;
    let bucket = risky_outcome(score);
    let mut out = [0.0; 5];
    for (k, slot) in out.iter_mut().enumerate() {
        *slot = cash * CASH_OUTCOME[k] + risky * bucket[k];
    }
    out
}

fn populate_portfolio(d: &mut InfluenceDiagram) -> Result<()> {
    let table = d.table_mut(PORTFOLIO_OUT)?;
    for (choice, weights) in ALLOCATIONS {
        for (s, stock) in PERFORMANCE.iter().enumerate() {
            for (b, bond) in PERFORMANCE.iter().enumerate() {
                for (c, crypto) in PERFORMANCE.iter().enumerate() {
                    table.set_slice(
                        [
                            (STOCK_PERF, *stock),
                            (BOND_PERF, *bond),
                            (CRYPTO_PERF, *crypto),
                            (INVEST_IN, choice),
                        ],
                        &portfolio_outcome(s, b, c, weights),
                    )?;
                }
            }
        }
    }
    Ok(())
}

fn populate_utility(d: &mut InfluenceDiagram) -> Result<()> {
    let utility = d.table_mut(UTILITY)?;
    let payoffs = [
        ("Conservative", [-150.0, -60.0, 10.0, 30.0, 50.0]),
        ("Moderate", [-100.0, -35.0, 0.0, 35.0, 70.0]),
        ("Aggressive", [-60.0, -20.0, 0.0, 45.0, 100.0]),
    ];
    for (tolerance, row) in payoffs {
        for (outcome, value) in PERFORMANCE.iter().zip(row) {
            utility.set_utility([(PORTFOLIO_OUT, *outcome), (RISK_TOL, tolerance)], value)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_is_complete() {
        let d = build_allocation_model().unwrap();
        assert_eq!(d.nodes().len(), 11);
        assert_eq!(d.arcs().len(), 18);
        assert!(d.validate().is_empty(), "{:?}", d.validate());
    }

    #[test]
    fn table_sizes_follow_parents() {
        let d = build_allocation_model().unwrap();
        assert_eq!(d.table(STOCK_PERF).unwrap().len(), 4 * 3 * 3 * 3 * 5);
        assert_eq!(d.table(BOND_PERF).unwrap().len(), 3 * 3 * 3 * 5);
        assert_eq!(d.table(PORTFOLIO_OUT).unwrap().len(), 5 * 5 * 5 * 4 * 5);
        assert_eq!(d.table(UTILITY).unwrap().len(), 15);
        assert!(d.table(INVEST_IN).is_none());
    }

    #[test]
    fn narrow_slices_override_broad_ones() {
        let d = build_allocation_model().unwrap();
        let stocks = d.table(STOCK_PERF).unwrap();
        let row = stocks
            .get_distribution([
                (GDP_TREND, "Strong"),
                (INFLATION_ENV, "Low"),
                (INTEREST_RATE, "Holding"),
                (MARKET_VOL, "Low"),
            ])
            .unwrap();
        assert_eq!(row, &[0.01, 0.04, 0.10, 0.35, 0.50]);
        let row = stocks
            .get_distribution([
                (GDP_TREND, "Strong"),
                (INFLATION_ENV, "Low"),
                (INTEREST_RATE, "Hiking"),
                (MARKET_VOL, "Low"),
            ])
            .unwrap();
        assert_eq!(row, &[0.03, 0.07, 0.20, 0.40, 0.30]);

        let bonds = d.table(BOND_PERF).unwrap();
        let row = bonds
            .get_distribution([
                (INFLATION_ENV, "High"),
                (INTEREST_RATE, "Cutting"),
                (MARKET_VOL, "Normal"),
            ])
            .unwrap();
        assert_eq!(row, &[0.05, 0.10, 0.30, 0.35, 0.20]);
    }

    #[test]
    fn cash_is_insensitive_to_markets() {
        let d = build_allocation_model().unwrap();
        let table = d.table(PORTFOLIO_OUT).unwrap();
        let row = table
            .get_distribution([
                (STOCK_PERF, "Strong_Loss"),
                (BOND_PERF, "Strong_Gain"),
                (CRYPTO_PERF, "Neutral"),
                (INVEST_IN, "Cash"),
            ])
            .unwrap();
        assert_eq!(row, &CASH_OUTCOME);
    }

    fn assert_close(actual: [f64; 5], expected: [f64; 5]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn risky_buckets() {
        assert_close(portfolio_outcome(4, 4, 4, ALLOCATIONS[0].1), [0.0, 0.0, 0.1, 0.3, 0.6]);
        assert_close(portfolio_outcome(0, 0, 0, ALLOCATIONS[1].1), [0.6, 0.3, 0.1, 0.0, 0.0]);
        assert_close(portfolio_outcome(2, 2, 2, ALLOCATIONS[2].1), [0.1, 0.2, 0.4, 0.2, 0.1]);
    }

    #[test]
    fn scenario_lookup() {
        assert_eq!(scenarios().len(), 3);
        let s = scenario("stagflation").unwrap();
        assert_eq!(s.name, "Stagflation");
        assert!(s.evidence.contains(&(INFLATION_ENV, "High")));
        assert!(scenario("Boom").is_none());
    }
}
