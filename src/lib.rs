//! SHARPEDGE: quantitative sports betting decision engine.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod engine;
pub mod history;
pub mod math;
pub mod model;
pub mod strategy;
pub mod types;
