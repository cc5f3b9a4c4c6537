//! Batch engine: concurrent analysis of many games.

pub mod cache;
pub mod runner;
pub mod source;

pub use cache::AnalysisCache;
pub use runner::{AnalysisRequest, BatchReport, BatchRunner, GameReport};
pub use source::{FactorSource, StaticFactors};
