//! Fuzz target for model definition loading.
//!
//! Arbitrary JSON must either fail to load or produce a diagram that
//! validates and answers queries without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sa_config::{parse_definition, DefinitionFormat, EngineSettings};
use sa_core::inference::InferenceEngine;
use sa_core::model::InfluenceDiagram;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(def) = parse_definition(text, DefinitionFormat::Json) else {
        return;
    };
    let Ok(diagram) = InfluenceDiagram::from_definition(&def) else {
        return;
    };
    let settings = EngineSettings {
        max_assignments: Some(100_000),
        ..EngineSettings::default()
    };
    let mut engine = InferenceEngine::new(&diagram, settings);
    let _ = engine.infer();
});
