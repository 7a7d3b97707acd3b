pub mod api;
pub mod config;
pub mod downstream;
pub mod error;
pub mod health;
pub mod logging;
pub mod observability;
pub mod resilience;
