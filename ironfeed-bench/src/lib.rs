//! # IronFeed Bench
//!
//! Deterministic fixtures shared by the IronFeed benchmarks.

pub mod fixtures;
