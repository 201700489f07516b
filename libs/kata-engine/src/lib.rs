//! Kata execution and grading engine.
//!
//! Runs a learner's submission against a kata's public or hidden tests with
//! the language's native toolchain, parses what the tests print, and folds
//! public and hidden runs into one weighted verdict.

pub mod cases;
pub mod config;
pub mod engine;
pub mod evaluator;
pub mod executor;
pub mod parser;
pub mod runner;
pub mod syntax;
pub mod workspace;

#[cfg(test)]
mod test_utils;

pub use config::{LanguageConfig, LanguageConfigManager};
pub use engine::Engine;
pub use executor::{execute_code, grade};
pub use runner::{CommandRunner, CommandSpec, ProcessRunner, RunOutput, RunStatus};
pub use syntax::SyntaxValidator;
