pub mod config;
pub mod error;
pub mod evaluator;
pub mod harness;
pub mod parser;
pub mod sandbox;
pub mod suite;
pub mod verdict;
