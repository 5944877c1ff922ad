//! Contract-level policy for what happens when validation fails.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverProfile {
    /// Log the violation, allow the request/response through unchanged.
    Observe,
    /// Block with the violation envelope. Reserved as a distinct variant
    /// from `Strict` for a future degraded-response mode; today it behaves
    /// identically.
    Balanced,
    /// Block with the violation envelope.
    Strict,
}

impl FailoverProfile {
    /// Whether a violation under this profile should block the request.
    pub fn blocks_on_violation(&self) -> bool {
        matches!(self, FailoverProfile::Balanced | FailoverProfile::Strict)
    }
}

impl Default for FailoverProfile {
    fn default() -> Self {
        FailoverProfile::Strict
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Suite {
    S0,
    S1,
    S2,
}

impl Default for Suite {
    fn default() -> Self {
        Suite::S0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_never_blocks() {
        assert!(!FailoverProfile::Observe.blocks_on_violation());
    }

    #[test]
    fn balanced_and_strict_block() {
        assert!(FailoverProfile::Balanced.blocks_on_violation());
        assert!(FailoverProfile::Strict.blocks_on_violation());
    }
}
