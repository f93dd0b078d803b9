//! Netweave CLI support library
//!
//! Holds the built-in demo topology so both the binary and the integration
//! tests can build the same graph.

pub mod topology;
