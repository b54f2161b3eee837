//! Scenario tests for the world core
//!
//! These tests drive whole maps through their tick and read the result back the way
//! a client would, by decoding every packet the map hands to its transport:
//! - Replication round trips and dirty-mask behavior
//! - Grid streaming (load, unload, reload) as seen by a connected player
//! - Visibility edges (distance, far visibility, phases, stealth)
//! - Deferred removal during cell visits

#[cfg(test)]
pub mod support;

#[cfg(test)]
pub mod replication_test;
