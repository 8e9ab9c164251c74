pub mod broker;
pub mod config;
pub mod errors;
pub mod market;
pub mod models;
pub mod risk;
pub mod strategies;
