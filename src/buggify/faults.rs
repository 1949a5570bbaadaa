//! Fault Catalog for Transport Simulation
//!
//! Injectable transport faults. Each fault has a unique identifier used for
//! configuration and tracking.

/// Transport faults - delivery and connection chaos
pub mod transport {
    /// Send fails with a broken pipe, connection stays up (5% moderate)
    pub const SEND_FAIL: &str = "transport.send_fail";
    /// Peer resets the connection; sends fail until a reconnect (1% moderate)
    pub const CONNECTION_RESET: &str = "transport.connection_reset";
    /// Reconnect attempt is refused (10% moderate)
    pub const RECONNECT_FAIL: &str = "transport.reconnect_fail";
}

/// All fault identifiers for iteration
pub const ALL_FAULTS: &[&str] = &[
    transport::SEND_FAIL,
    transport::CONNECTION_RESET,
    transport::RECONNECT_FAIL,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_faults_unique() {
        let mut seen = std::collections::HashSet::new();
        for fault in ALL_FAULTS {
            assert!(seen.insert(*fault), "Duplicate fault: {}", fault);
        }
    }

    #[test]
    fn test_fault_ids_are_namespaced() {
        for fault in ALL_FAULTS {
            assert!(fault.starts_with("transport."), "unexpected id {}", fault);
        }
    }
}
