use serde::{Deserialize, Serialize};

/// Current temperature reported by the temperature service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub location: String,
    pub temperature_c: f64,
    #[serde(default)]
    pub summary: Option<String>,
}

impl Temperature {
    pub fn temperature_f(&self) -> f64 {
        32.0 + self.temperature_c * 9.0 / 5.0
    }
}
