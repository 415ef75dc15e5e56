//! Fuzz target for YAML model definitions.
//!
//! Only parsing and semantic validation; inference is covered by
//! `fuzz_model_definition`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sa_config::{parse_definition, DefinitionFormat};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = parse_definition(text, DefinitionFormat::Yaml);
    }
});
