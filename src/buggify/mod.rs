//! BUGGIFY - Fault Injection for Transport Simulation
//!
//! Probabilistic, seed-reproducible fault injection used by
//! [`SimulatedTransport`](crate::transport::SimulatedTransport). Each
//! injection site checks a named fault against a [`FaultConfig`] with a
//! random draw from the simulation's seeded RNG, so a failing seed replays
//! the exact same fault sequence.

pub mod config;
pub mod faults;

pub use config::FaultConfig;
pub use faults::ALL_FAULTS;
