//! # Refuge Core
//!
//! Shared logic for Refuge: entity models, tag normalization, geo math,
//! the store abstraction, the embedding contract, and the hybrid retrieval
//! orchestrator.
//!
//! This crate performs no network or filesystem I/O. Connectors, the SQLite
//! store, and concrete embedding providers live in the `refuge` app crate.

pub mod embedding;
pub mod error;
pub mod geo;
pub mod models;
pub mod normalize;
pub mod retrieval;
pub mod store;
