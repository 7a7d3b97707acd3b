pub mod circuit_breaker;
pub mod clock;
pub mod executor;
pub mod metrics;
pub mod retry;

pub use circuit_breaker::*;
pub use clock::*;
pub use executor::*;
pub use metrics::*;
pub use retry::*;
