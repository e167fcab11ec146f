//! Floodgate - Distributed Sliding-Window Rate Limiting
//!
//! This crate implements admission control shared across multiple process
//! instances through an external key-value store. The limiter estimates a
//! trailing-window request count from two adjacent fixed-window counters
//! and updates them atomically, so concurrent callers on the same key
//! never over-admit. Store access sits behind a small capability trait;
//! any backend with get, set-with-expiry, and an atomic conditional
//! update can serve.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod store;
