//! Integration tests - exercise the public API end to end against the YAML
//! fixtures under `tests/fixtures/`.

mod common;
mod evaluation_tests;
mod model_loading_tests;
mod pass_through_tests;
mod rewrite_tests;
