//! Core deterministic primitives.
//!
//! Everything here is integer-only and produces identical results on any
//! platform. The simulation engine draws all of its randomness from this
//! module.

pub mod rng;

pub use rng::Mulberry32;
