pub mod analyzer;
pub mod metrics;
