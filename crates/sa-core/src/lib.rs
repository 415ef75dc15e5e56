//! Strategic Allocation Core Library
//!
//! Influence-diagram modelling and maximum-expected-utility inference:
//! - Variable registry and flattened CPT / utility tables
//! - Influence diagram assembly and validation
//! - Evidence and inference engine with swappable exact strategies
//! - Decision ranking and tie-breaking
//! - The built-in strategic asset allocation model and scenarios
//! - Structured logging, exit codes and report rendering for the CLI
//!
//! The binary entry point is in `main.rs`.
//!
//! # Example
//!
//! ```
//! use sa_core::inference::InferenceEngine;
//! use sa_core::model::build_allocation_model;
//! use sa_config::EngineSettings;
//!
//! let diagram = build_allocation_model().unwrap();
//! let mut engine = InferenceEngine::new(&diagram, EngineSettings::default());
//! engine
//!     .set_evidence([
//!         ("GDP_Trend", "Strong"),
//!         ("Inflation_Env", "Low"),
//!         ("Risk_Tol", "Moderate"),
//!     ])
//!     .unwrap();
//! engine.infer().unwrap();
//! let (label, _meu) = engine.best_choice("Invest_In").unwrap();
//! assert_eq!(label, "Stocks");
//! ```

pub mod decision;
pub mod exit_codes;
pub mod inference;
pub mod logging;
pub mod model;
pub mod output;
