//! End-to-end checks of the built-in allocation model through the engine API.

use sa_common::QueryError;
use sa_config::{EngineSettings, StrategyKind};
use sa_core::inference::{EngineState, InferenceEngine};
use sa_core::model::{build_allocation_model, scenario, scenarios, InfluenceDiagram};

const STRATEGIES: [StrategyKind; 2] = [StrategyKind::Enumeration, StrategyKind::VariableElimination];

fn settings(strategy: StrategyKind) -> EngineSettings {
    EngineSettings {
        strategy,
        ..EngineSettings::default()
    }
}

fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() < tolerance,
        "expected {expected}, got {actual}"
    );
}

fn utilities_under(
    diagram: &InfluenceDiagram,
    strategy: StrategyKind,
    evidence: &[(&str, &str)],
) -> Vec<(String, f64)> {
    let mut engine = InferenceEngine::new(diagram, settings(strategy));
    engine.set_evidence(evidence.iter().copied()).unwrap();
    engine.infer().unwrap();
    engine.posterior_utility("Invest_In").unwrap()
}

// ============================================================================
// Built-in scenarios
// ============================================================================

#[test]
fn stagflation_ranks_cash_first() {
    let diagram = build_allocation_model().unwrap();
    let stagflation = scenario("stagflation").unwrap();
    for strategy in STRATEGIES {
        let eu = utilities_under(&diagram, strategy, &stagflation.evidence);
        let labels: Vec<&str> = eu.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["Stocks", "Bonds", "Crypto", "Cash"]);
        assert_close(eu[0].1, -29.456, 1e-3);
        assert_close(eu[1].1, -24.402, 1e-3);
        assert_close(eu[2].1, -27.409, 1e-3);
        assert_close(eu[3].1, 0.0, 1e-9);

        let mut engine = InferenceEngine::new(&diagram, settings(strategy));
        engine.set_evidence(stagflation.evidence.iter().copied()).unwrap();
        engine.infer().unwrap();
        let rec = engine.recommend("Invest_In").unwrap();
        let ranking: Vec<&str> = rec.ranking.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(ranking, vec!["Cash", "Bonds", "Crypto", "Stocks"]);
    }
}

#[test]
fn goldilocks_ranks_stocks_first() {
    let diagram = build_allocation_model().unwrap();
    let goldilocks = scenario("Goldilocks").unwrap();
    for strategy in STRATEGIES {
        let eu = utilities_under(&diagram, strategy, &goldilocks.evidence);
        assert_close(eu[0].1, 16.136, 1e-3);
        assert_close(eu[1].1, 3.681, 1e-3);
        assert_close(eu[2].1, -3.456, 1e-3);
        assert_close(eu[3].1, 0.0, 1e-9);

        let mut engine = InferenceEngine::new(&diagram, settings(strategy));
        engine.set_evidence(goldilocks.evidence.iter().copied()).unwrap();
        engine.infer().unwrap();
        let (label, meu) = engine.best_choice("Invest_In").unwrap();
        assert_eq!(label, "Stocks");
        assert_close(meu, 16.136, 1e-3);
    }
}

#[test]
fn prior_utilities_without_evidence() {
    let diagram = build_allocation_model().unwrap();
    let eu = utilities_under(&diagram, StrategyKind::VariableElimination, &[]);
    assert_close(eu[0].1, -8.90, 1e-2);
    assert_close(eu[1].1, -10.06, 1e-2);
    assert_close(eu[2].1, -16.07, 1e-2);
    assert_close(eu[3].1, 2.89, 1e-2);
}

#[test]
fn every_scenario_agrees_across_strategies() {
    let diagram = build_allocation_model().unwrap();
    for s in scenarios() {
        let enumerated = utilities_under(&diagram, StrategyKind::Enumeration, &s.evidence);
        let eliminated = utilities_under(&diagram, StrategyKind::VariableElimination, &s.evidence);
        for ((la, a), (lb, b)) in enumerated.iter().zip(&eliminated) {
            assert_eq!(la, lb);
            assert_close(*a, *b, 1e-9);
        }
    }
}

#[test]
fn observed_marginal_is_a_point_mass() {
    let diagram = build_allocation_model().unwrap();
    let mut engine = InferenceEngine::new(&diagram, EngineSettings::default());
    engine
        .set_evidence([("GDP_Trend", "Recession"), ("Risk_Tol", "Conservative")])
        .unwrap();
    engine.infer().unwrap();
    let gdp = engine.posterior("Invest_In", "Bonds", "GDP_Trend").unwrap();
    assert!(gdp.observed);
    let recession = gdp.labels.iter().position(|l| l == "Recession").unwrap();
    for (i, p) in gdp.probabilities.iter().enumerate() {
        assert_close(*p, if i == recession { 1.0 } else { 0.0 }, 1e-12);
    }
    let rates = engine.posterior("Invest_In", "Bonds", "Interest_Rate").unwrap();
    assert!(!rates.observed);
    assert_close(rates.probabilities.iter().sum(), 1.0, 1e-9);
}

// ============================================================================
// Engine lifecycle on the built-in model
// ============================================================================

#[test]
fn clear_evidence_is_idempotent() {
    let diagram = build_allocation_model().unwrap();
    let mut engine = InferenceEngine::new(&diagram, settings(StrategyKind::VariableElimination));
    engine.clear_evidence();
    engine.clear_evidence();
    assert_eq!(engine.state(), EngineState::Idle);

    engine.set_evidence([("Inflation_Env", "High")]).unwrap();
    engine.clear_evidence();
    engine.clear_evidence();
    assert_eq!(engine.state(), EngineState::Idle);
    assert!(engine.evidence().is_empty());
}

#[test]
fn reuse_after_clear_matches_fresh_engine() {
    let diagram = build_allocation_model().unwrap();
    let goldilocks = scenario("Goldilocks").unwrap();
    let stagflation = scenario("Stagflation").unwrap();

    let mut engine = InferenceEngine::new(&diagram, settings(StrategyKind::VariableElimination));
    engine.set_evidence(stagflation.evidence.iter().copied()).unwrap();
    engine.infer().unwrap();
    engine.clear_evidence();
    engine.set_evidence(goldilocks.evidence.iter().copied()).unwrap();
    engine.infer().unwrap();
    let reused = engine.posterior_utility("Invest_In").unwrap();

    let fresh = utilities_under(&diagram, StrategyKind::VariableElimination, &goldilocks.evidence);
    assert_eq!(reused, fresh);
}

#[test]
fn queries_before_inference_are_state_errors() {
    let diagram = build_allocation_model().unwrap();
    let mut engine = InferenceEngine::new(&diagram, EngineSettings::default());
    assert!(matches!(
        engine.meu("Invest_In"),
        Err(QueryError::State { .. })
    ));
    engine.set_evidence([("GDP_Trend", "Strong")]).unwrap();
    match engine.best_choice("Invest_In") {
        Err(QueryError::State { expected, actual }) => {
            assert_eq!(expected, "inferred");
            assert_eq!(actual, "evidence_set");
        }
        other => panic!("expected state error, got {other:?}"),
    }
}

#[test]
fn scenarios_run_in_parallel() {
    let diagram = build_allocation_model().unwrap();
    let all = scenarios();
    let results: Vec<(String, String)> = std::thread::scope(|scope| {
        let handles: Vec<_> = all
            .iter()
            .map(|s| {
                let diagram = &diagram;
                scope.spawn(move || {
                    let mut engine = InferenceEngine::new(diagram, EngineSettings::default());
                    engine.set_evidence(s.evidence.iter().copied()).unwrap();
                    engine.infer().unwrap();
                    let (label, _) = engine.best_choice("Invest_In").unwrap();
                    (s.name.to_string(), label)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (name, label) in results {
        let s = scenario(&name).unwrap();
        let sequential = utilities_under(&diagram, StrategyKind::Enumeration, &s.evidence);
        let best = sequential
            .iter()
            .fold(None::<&(String, f64)>, |best, cur| match best {
                Some(b) if b.1 >= cur.1 => Some(b),
                _ => Some(cur),
            })
            .unwrap();
        assert_eq!(label, best.0, "scenario {name}");
    }
}

// ============================================================================
// Multiple utility nodes
// ============================================================================

/// Coin -> Payoff <- Bet, Bet -> Fee.
fn coin_with_fee() -> InfluenceDiagram {
    let mut d = InfluenceDiagram::new("coin");
    d.add_chance("Coin", "", ["Heads", "Tails"]).unwrap();
    d.add_decision("Bet", "", ["Heads", "Tails"]).unwrap();
    d.add_utility("Payoff", "").unwrap();
    d.add_utility("Fee", "").unwrap();
    d.add_arc("Coin", "Payoff").unwrap();
    d.add_arc("Bet", "Payoff").unwrap();
    d.add_arc("Bet", "Fee").unwrap();
    d.allocate_tables().unwrap();
    d.table_mut("Coin").unwrap().fill_uniform(&[0.6, 0.4]).unwrap();
    d.table_mut("Payoff")
        .unwrap()
        .set_values(vec![1.0, -1.0, -1.0, 1.0])
        .unwrap();
    let fee = d.table_mut("Fee").unwrap();
    fee.set_utility([("Bet", "Heads")], -0.1).unwrap();
    fee.set_utility([("Bet", "Tails")], 0.0).unwrap();
    d
}

#[test]
fn utility_nodes_are_additive() {
    let diagram = coin_with_fee();
    for strategy in STRATEGIES {
        let mut engine = InferenceEngine::new(&diagram, settings(strategy));
        engine.infer().unwrap();
        let eu = engine.posterior_utility("Bet").unwrap();
        // Heads: 0.6 - 0.4 - 0.1; Tails: 0.4 - 0.6
        assert_close(eu[0].1, 0.1, 1e-12);
        assert_close(eu[1].1, -0.2, 1e-12);

        let heads = &engine.result().unwrap().decisions[0].options[0];
        let terms: Vec<(&str, f64)> = heads
            .utilities
            .iter()
            .map(|t| (t.node.as_str(), t.expected))
            .collect();
        assert_eq!(terms.len(), 2);
        let payoff = terms.iter().find(|(n, _)| *n == "Payoff").unwrap().1;
        let fee = terms.iter().find(|(n, _)| *n == "Fee").unwrap().1;
        assert_close(payoff, 0.2, 1e-12);
        assert_close(fee, -0.1, 1e-12);
        assert_close(heads.expected_utility, payoff + fee, 1e-12);
    }
}

#[test]
fn equal_utilities_tie_to_first_label() {
    let mut diagram = coin_with_fee();
    diagram
        .table_mut("Coin")
        .unwrap()
        .fill_uniform(&[0.5, 0.5])
        .unwrap();
    let fee = diagram.table_mut("Fee").unwrap();
    fee.set_utility([("Bet", "Heads")], 0.0).unwrap();

    let mut engine = InferenceEngine::new(&diagram, EngineSettings::default());
    engine.infer().unwrap();
    let rec = engine.recommend("Bet").unwrap();
    assert_eq!(rec.label, "Heads");
    assert!(rec.tie_break);
}
