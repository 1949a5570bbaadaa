//! BUGGIFY Configuration
//!
//! Defines fault probabilities and provides preset configurations for different
//! testing scenarios (calm, moderate, chaos).

use super::faults;
use std::collections::HashMap;

/// Configuration for fault injection probabilities
#[derive(Debug, Clone)]
pub struct FaultConfig {
    /// Whether BUGGIFY is enabled at all
    pub enabled: bool,
    /// Per-fault probabilities (0.0 to 1.0)
    pub probabilities: HashMap<&'static str, f64>,
    /// Global probability multiplier
    pub global_multiplier: f64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl FaultConfig {
    /// Create a new empty config (all faults at zero)
    pub fn new() -> Self {
        FaultConfig {
            enabled: true,
            probabilities: HashMap::new(),
            global_multiplier: 1.0,
        }
    }

    /// Disabled - no fault injection
    pub fn disabled() -> Self {
        FaultConfig {
            enabled: false,
            probabilities: HashMap::new(),
            global_multiplier: 0.0,
        }
    }

    /// Calm - rare send failures, reconnects always succeed
    pub fn calm() -> Self {
        let mut config = Self::new();
        config.set(faults::transport::SEND_FAIL, 0.01);
        config
    }

    /// Moderate - balanced fault injection for regular testing
    pub fn moderate() -> Self {
        let mut config = Self::new();
        config.set(faults::transport::SEND_FAIL, 0.05); // 5%
        config.set(faults::transport::CONNECTION_RESET, 0.01); // 1%
        config.set(faults::transport::RECONNECT_FAIL, 0.10); // 10%
        config
    }

    /// Chaos - aggressive fault injection for stress testing
    pub fn chaos() -> Self {
        let mut config = Self::new();
        config.global_multiplier = 3.0;
        config.set(faults::transport::SEND_FAIL, 0.10); // 30% effective
        config.set(faults::transport::CONNECTION_RESET, 0.05); // 15% effective
        config.set(faults::transport::RECONNECT_FAIL, 0.15); // 45% effective
        config
    }

    /// Set probability for a specific fault
    pub fn set(&mut self, fault_id: &'static str, probability: f64) -> &mut Self {
        self.probabilities
            .insert(fault_id, probability.clamp(0.0, 1.0));
        self
    }

    /// Get probability for a fault (returns 0.0 if not set)
    pub fn get(&self, fault_id: &str) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        let base = self.probabilities.get(fault_id).copied().unwrap_or(0.0);
        (base * self.global_multiplier).clamp(0.0, 1.0)
    }

    /// Check if a fault should trigger given its probability
    pub fn should_trigger(&self, fault_id: &str, random_value: f64) -> bool {
        random_value < self.get(fault_id)
    }

    /// Builder pattern - set one fault probability
    pub fn with_fault(mut self, fault_id: &'static str, probability: f64) -> Self {
        self.set(fault_id, probability);
        self
    }

    /// Builder pattern - set global multiplier
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.global_multiplier = multiplier.max(0.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_config() {
        let config = FaultConfig::disabled();
        assert_eq!(config.get(faults::transport::SEND_FAIL), 0.0);
        assert!(!config.should_trigger(faults::transport::SEND_FAIL, 0.0));
    }

    #[test]
    fn test_moderate_config() {
        let config = FaultConfig::moderate();
        assert!(config.get(faults::transport::SEND_FAIL) > 0.0);
        assert!(config.get(faults::transport::SEND_FAIL) <= 1.0);
    }

    #[test]
    fn test_chaos_higher_than_moderate() {
        let moderate = FaultConfig::moderate();
        let chaos = FaultConfig::chaos();

        for fault in faults::ALL_FAULTS {
            assert!(chaos.get(fault) > moderate.get(fault), "{}", fault);
        }
    }

    #[test]
    fn test_should_trigger() {
        let config = FaultConfig::moderate();
        let prob = config.get(faults::transport::SEND_FAIL);

        // Value below probability should trigger
        assert!(config.should_trigger(faults::transport::SEND_FAIL, prob - 0.001));
        // Value above probability should not trigger
        assert!(!config.should_trigger(faults::transport::SEND_FAIL, prob + 0.001));
    }

    #[test]
    fn test_builder_pattern() {
        let config = FaultConfig::new()
            .with_fault(faults::transport::RECONNECT_FAIL, 0.2)
            .with_multiplier(2.0);

        assert!((config.get(faults::transport::RECONNECT_FAIL) - 0.4).abs() < 1e-9);
        assert_eq!(config.get(faults::transport::SEND_FAIL), 0.0);
        assert_eq!(config.global_multiplier, 2.0);
    }
}
