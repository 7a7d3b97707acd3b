pub mod health;
pub mod metrics;
pub mod temperature;

pub use health::*;
pub use metrics::*;
pub use temperature::*;
